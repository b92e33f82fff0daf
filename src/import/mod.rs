//! Statement import: parsing QIF/CSV files and writing them into the store.

use std::path::Path;

use chrono::NaiveDate;
use tracing::info;

use crate::core::{CategoryPath, Transaction};
use crate::store::{SqliteStore, StoreError};

pub mod csv;
pub mod qif;

#[derive(Debug)]
pub enum ImportError {
    Io(std::io::Error),
    Parse(String),
    Store(StoreError),
}

impl std::fmt::Display for ImportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImportError::Io(e) => write!(f, "io error: {e}"),
            ImportError::Parse(e) => write!(f, "parse error: {e}"),
            ImportError::Store(e) => write!(f, "store error: {e}"),
        }
    }
}

impl std::error::Error for ImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ImportError::Io(e) => Some(e),
            ImportError::Store(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ImportError {
    fn from(e: std::io::Error) -> Self {
        ImportError::Io(e)
    }
}

impl From<StoreError> for ImportError {
    fn from(e: StoreError) -> Self {
        ImportError::Store(e)
    }
}

/// A parsed statement file: accounts with their transactions, plus any
/// category declarations the file carried.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Statement {
    pub accounts: Vec<StatementAccount>,
    pub categories: Vec<StatementCategory>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementAccount {
    pub name: String,
    pub kind: String,
    pub transactions: Vec<StatementTransaction>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementCategory {
    pub path: CategoryPath,
    pub is_income: bool,
}

/// One allocation of a parsed split transaction.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StatementSplit {
    pub category: Option<CategoryPath>,
    pub transfer_to: Option<String>,
    /// Minor currency units (cents).
    pub amount: i64,
    pub memo: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementTransaction {
    pub date: NaiveDate,
    /// Minor currency units (cents).
    pub amount: i64,
    pub payee: Option<String>,
    pub memo: Option<String>,
    pub category: Option<CategoryPath>,
    /// Target account name for `[Account]` transfer lines.
    pub transfer_to: Option<String>,
    pub splits: Vec<StatementSplit>,
}

impl StatementTransaction {
    pub fn is_transfer(&self) -> bool {
        self.transfer_to.is_some()
    }

    pub fn is_split(&self) -> bool {
        !self.splits.is_empty()
    }
}

/// Parses a statement file into the common model.
pub trait StatementImporter {
    fn parse(path: &Path) -> Result<Statement, ImportError>;
}

/// Counts reported after applying a statement to the store.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ImportSummary {
    pub accounts: usize,
    pub categories: usize,
    pub transactions: usize,
}

/// Writes a parsed statement into the store: declared category paths first,
/// then accounts, then transactions (with splits and transfer links).
/// Missing accounts and category paths are created on the fly, with
/// `currency` as their currency.
pub fn apply(
    store: &mut SqliteStore,
    statement: &Statement,
    currency: &str,
) -> Result<ImportSummary, ImportError> {
    let mut summary = ImportSummary::default();
    for category in &statement.categories {
        store.ensure_category_path(&category.path)?;
        summary.categories += 1;
    }
    for account in &statement.accounts {
        let kind = if account.kind.is_empty() {
            "Cash"
        } else {
            account.kind.as_str()
        };
        let account_id = store.ensure_account(&account.name, kind, currency)?;
        summary.accounts += 1;
        for parsed in &account.transactions {
            let date = parsed
                .date
                .and_hms_opt(0, 0, 0)
                .ok_or_else(|| ImportError::Parse("unrepresentable date".into()))?;
            let mut txn = Transaction::new(date, account_id, parsed.amount);
            txn.payee = parsed.payee.clone().unwrap_or_default();
            txn.note = parsed.memo.clone();
            if let Some(path) = &parsed.category {
                txn.category_id = store.ensure_category_path(path)?;
            }
            if let Some(target) = &parsed.transfer_to {
                let target_id = store.ensure_account(target, kind, currency)?;
                txn.to_account_id = Some(target_id);
                txn.to_amount = Some(-parsed.amount);
            }
            for split in &parsed.splits {
                let category_id = match &split.category {
                    Some(path) => store.ensure_category_path(path)?,
                    None => crate::core::NO_CATEGORY_ID,
                };
                txn.splits.push(crate::core::Split {
                    category_id,
                    amount: split.amount,
                    note: split.memo.clone(),
                });
            }
            store.insert_transaction(&txn)?;
            summary.transactions += 1;
        }
    }
    info!(
        accounts = summary.accounts,
        categories = summary.categories,
        transactions = summary.transactions,
        "Statement applied"
    );
    Ok(summary)
}
