//! SQLite-backed persistence for accounts, transactions and the category tree.

mod categories;
mod error;
mod transactions;

pub use error::StoreError;

use rusqlite::Connection;
use std::path::Path;
use std::time::Duration;

/// Date-time column format; naive local timestamps, second precision.
pub(crate) const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens (or creates) the database file and installs the schema.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        if let Some(dir) = path.as_ref().parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir)?;
            }
        }
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// In-memory store, used by tests and dry-run imports.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        install_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn install_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS category (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            lft INTEGER NOT NULL,
            rgt INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS category_lft_idx ON category(lft);
        CREATE INDEX IF NOT EXISTS category_rgt_idx ON category(rgt);

        CREATE TABLE IF NOT EXISTS attribute (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS category_attribute (
            category_id INTEGER NOT NULL REFERENCES category(id) ON DELETE CASCADE,
            attribute_id INTEGER NOT NULL REFERENCES attribute(id) ON DELETE CASCADE,
            PRIMARY KEY (category_id, attribute_id)
        );

        CREATE TABLE IF NOT EXISTS account (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL UNIQUE,
            kind TEXT NOT NULL DEFAULT 'Cash',
            currency TEXT NOT NULL DEFAULT 'USD'
        );

        CREATE TABLE IF NOT EXISTS txn (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            date TEXT NOT NULL,
            account_id INTEGER NOT NULL REFERENCES account(id),
            category_id INTEGER NOT NULL DEFAULT 0 REFERENCES category(id),
            amount INTEGER NOT NULL,
            payee TEXT NOT NULL DEFAULT '',
            note TEXT,
            to_account_id INTEGER REFERENCES account(id),
            to_amount INTEGER,
            scheduled INTEGER NOT NULL DEFAULT 0,
            recurrence TEXT,
            last_occurrence TEXT
        );
        CREATE INDEX IF NOT EXISTS txn_account_idx ON txn(account_id);
        CREATE INDEX IF NOT EXISTS txn_category_idx ON txn(category_id);

        CREATE TABLE IF NOT EXISTS txn_split (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            txn_id INTEGER NOT NULL REFERENCES txn(id) ON DELETE CASCADE,
            category_id INTEGER NOT NULL DEFAULT 0 REFERENCES category(id),
            amount INTEGER NOT NULL,
            note TEXT
        );
        CREATE INDEX IF NOT EXISTS txn_split_txn_idx ON txn_split(txn_id);

        CREATE VIEW IF NOT EXISTS v_category AS
            SELECT node.id AS id,
                   node.title AS title,
                   node.lft AS lft,
                   node.rgt AS rgt,
                   COUNT(parent.id) - 1 AS level
            FROM category AS node, category AS parent
            WHERE node.lft BETWEEN parent.lft AND parent.rgt
            GROUP BY node.id;
        "#,
    )?;
    // Seed the "no category" sentinel that anchors the nested-set intervals.
    conn.execute(
        "INSERT INTO category (id, title, lft, rgt)
         SELECT 0, '<NO_CATEGORY>', 0, 1
         WHERE NOT EXISTS (SELECT 1 FROM category WHERE id = 0)",
        [],
    )?;
    Ok(())
}
