//! Accounts and transactions, including scheduled templates.

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::{OptionalExtension, Row, params};
use tracing::debug;

use super::{DATETIME_FORMAT, SqliteStore, StoreError};
use crate::core::recurrence::ScheduledTransaction;
use crate::core::{Account, Split, Transaction};

const TXN_COLUMNS: &str =
    "id, date, account_id, category_id, amount, payee, note, to_account_id, to_amount";

impl SqliteStore {
    pub fn create_account(
        &mut self,
        title: &str,
        kind: &str,
        currency: &str,
    ) -> Result<i64, StoreError> {
        self.conn.execute(
            "INSERT INTO account (title, kind, currency) VALUES (?1, ?2, ?3)",
            params![title, kind, currency],
        )?;
        let id = self.conn.last_insert_rowid();
        debug!(id, title, kind, "Created account");
        Ok(id)
    }

    pub fn account(&self, id: i64) -> Result<Account, StoreError> {
        self.conn
            .query_row(
                "SELECT id, title, kind, currency FROM account WHERE id = ?1",
                params![id],
                account_from_row,
            )
            .optional()?
            .ok_or(StoreError::AccountNotFound(id))
    }

    pub fn account_by_title(&self, title: &str) -> Result<Option<Account>, StoreError> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, title, kind, currency FROM account WHERE title = ?1",
                params![title],
                account_from_row,
            )
            .optional()?)
    }

    pub fn all_accounts(&self) -> Result<Vec<Account>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, title, kind, currency FROM account ORDER BY title")?;
        let rows = stmt.query_map([], account_from_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Finds an account by title, creating it when missing.
    pub fn ensure_account(
        &mut self,
        title: &str,
        kind: &str,
        currency: &str,
    ) -> Result<i64, StoreError> {
        if let Some(existing) = self.account_by_title(title)? {
            return Ok(existing.id);
        }
        self.create_account(title, kind, currency)
    }

    /// Inserts a transaction and its splits in one transaction; returns the
    /// new row id.
    pub fn insert_transaction(&mut self, txn: &Transaction) -> Result<i64, StoreError> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO txn (date, account_id, category_id, amount, payee, note,
                              to_account_id, to_amount)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                txn.date.format(DATETIME_FORMAT).to_string(),
                txn.account_id,
                txn.category_id,
                txn.amount,
                txn.payee,
                txn.note,
                txn.to_account_id,
                txn.to_amount,
            ],
        )?;
        let id = tx.last_insert_rowid();
        {
            let mut stmt = tx.prepare(
                "INSERT INTO txn_split (txn_id, category_id, amount, note)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for split in &txn.splits {
                stmt.execute(params![id, split.category_id, split.amount, split.note])?;
            }
        }
        tx.commit()?;
        Ok(id)
    }

    pub fn transaction(&self, id: i64) -> Result<Option<Transaction>, StoreError> {
        let found = self
            .conn
            .query_row(
                &format!("SELECT {TXN_COLUMNS} FROM txn WHERE id = ?1"),
                params![id],
                transaction_from_row,
            )
            .optional()?;
        match found {
            Some(mut txn) => {
                txn.splits = self.splits_for(txn.id)?;
                Ok(Some(txn))
            }
            None => Ok(None),
        }
    }

    /// Non-scheduled transactions in date order, splits attached.
    pub fn all_transactions(&self) -> Result<Vec<Transaction>, StoreError> {
        self.transactions_where("scheduled = 0", &[])
    }

    pub fn transactions_for_account(&self, account_id: i64) -> Result<Vec<Transaction>, StoreError> {
        self.transactions_where("scheduled = 0 AND account_id = ?1", &[&account_id])
    }

    fn transactions_where(
        &self,
        filter: &str,
        params: &[&dyn rusqlite::ToSql],
    ) -> Result<Vec<Transaction>, StoreError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {TXN_COLUMNS} FROM txn WHERE {filter} ORDER BY date, id"
        ))?;
        let rows = stmt.query_map(params, transaction_from_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        for txn in &mut out {
            txn.splits = self.splits_for(txn.id)?;
        }
        Ok(out)
    }

    fn splits_for(&self, txn_id: i64) -> Result<Vec<Split>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT category_id, amount, note FROM txn_split WHERE txn_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![txn_id], |row| {
            Ok(Split {
                category_id: row.get(0)?,
                amount: row.get(1)?,
                note: row.get(2)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Stores a scheduled template; `recurrence` is a cron expression, or
    /// `None` for a one-shot.
    pub fn insert_scheduled_transaction(
        &mut self,
        txn: &Transaction,
        recurrence: Option<&str>,
    ) -> Result<i64, StoreError> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO txn (date, account_id, category_id, amount, payee, note,
                              scheduled, recurrence)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7)",
            params![
                txn.date.format(DATETIME_FORMAT).to_string(),
                txn.account_id,
                txn.category_id,
                txn.amount,
                txn.payee,
                txn.note,
                recurrence,
            ],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;
        debug!(id, recurrence, "Stored scheduled transaction");
        Ok(id)
    }

    pub fn scheduled_transactions(&self) -> Result<Vec<ScheduledTransaction>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, date, recurrence, last_occurrence FROM txn
             WHERE scheduled = 1 ORDER BY id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, Option<String>>(3)?,
            ))
        })?;
        let mut out = Vec::new();
        for row in rows {
            let (id, date, recurrence, last) = row?;
            out.push(ScheduledTransaction {
                id,
                start: parse_utc(&date)?,
                recurrence,
                last_occurrence: last.as_deref().map(parse_utc).transpose()?,
            });
        }
        Ok(out)
    }

    /// Materializes one firing of a scheduled template: copies the template
    /// (and splits) as a regular transaction dated `at`, and records the
    /// occurrence on the template. One transaction.
    pub fn fire_scheduled_transaction(
        &mut self,
        template_id: i64,
        at: DateTime<Utc>,
    ) -> Result<i64, StoreError> {
        let date = at.naive_utc().format(DATETIME_FORMAT).to_string();
        let tx = self.conn.transaction()?;
        let copied = tx.execute(
            "INSERT INTO txn (date, account_id, category_id, amount, payee, note,
                              to_account_id, to_amount)
             SELECT ?1, account_id, category_id, amount, payee, note,
                    to_account_id, to_amount
             FROM txn WHERE id = ?2 AND scheduled = 1",
            params![date, template_id],
        )?;
        if copied == 0 {
            return Err(StoreError::InvalidInput("no such scheduled transaction"));
        }
        let id = tx.last_insert_rowid();
        tx.execute(
            "INSERT INTO txn_split (txn_id, category_id, amount, note)
             SELECT ?1, category_id, amount, note FROM txn_split WHERE txn_id = ?2",
            params![id, template_id],
        )?;
        tx.execute(
            "UPDATE txn SET last_occurrence = ?1 WHERE id = ?2",
            params![date, template_id],
        )?;
        tx.commit()?;
        debug!(template_id, id, %at, "Fired scheduled transaction");
        Ok(id)
    }
}

fn account_from_row(row: &Row<'_>) -> rusqlite::Result<Account> {
    Ok(Account {
        id: row.get(0)?,
        title: row.get(1)?,
        kind: row.get(2)?,
        currency: row.get(3)?,
    })
}

fn transaction_from_row(row: &Row<'_>) -> rusqlite::Result<Transaction> {
    let date: String = row.get(1)?;
    let date = NaiveDateTime::parse_from_str(&date, DATETIME_FORMAT).map_err(|err| {
        rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(err))
    })?;
    Ok(Transaction {
        id: row.get(0)?,
        date,
        account_id: row.get(2)?,
        category_id: row.get(3)?,
        amount: row.get(4)?,
        payee: row.get(5)?,
        note: row.get(6)?,
        to_account_id: row.get(7)?,
        to_amount: row.get(8)?,
        splits: Vec::new(),
    })
}

fn parse_utc(s: &str) -> Result<DateTime<Utc>, StoreError> {
    NaiveDateTime::parse_from_str(s, DATETIME_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|_| StoreError::InvalidInput("malformed datetime column"))
}
