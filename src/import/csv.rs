use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

use chrono::NaiveDate;
use csv::Reader;
use serde::Deserialize;

use super::{
    ImportError, Statement, StatementAccount, StatementImporter, StatementTransaction,
    qif::parse_money,
};
use crate::core::CategoryPath;

// A currency column, if present, is ignored: accounts own their currency.
#[derive(Deserialize)]
struct CsvRow {
    date: String,
    account: String,
    amount: String,
    #[serde(default)]
    category: String,
    #[serde(default)]
    payee: String,
    #[serde(default)]
    note: String,
}

/// Maps custom CSV headers onto the expected columns.
#[derive(Debug, Clone)]
pub struct CsvMapping {
    pub date: String,
    pub account: String,
    pub amount: String,
    pub category: String,
    pub payee: String,
    pub note: String,
}

pub struct CsvImporter;

impl CsvImporter {
    fn parse_internal(path: &Path) -> Result<Statement, ImportError> {
        let mut rdr = Reader::from_path(path).map_err(|e| ImportError::Parse(e.to_string()))?;
        let mut rows = Vec::new();
        for result in rdr.deserialize() {
            let row: CsvRow = result.map_err(|e| ImportError::Parse(e.to_string()))?;
            rows.push(row);
        }
        build_statement(rows)
    }
}

impl StatementImporter for CsvImporter {
    fn parse(path: &Path) -> Result<Statement, ImportError> {
        Self::parse_internal(path)
    }
}

pub fn parse(path: &Path) -> Result<Statement, ImportError> {
    CsvImporter::parse(path)
}

/// Parses a CSV whose headers differ from the defaults.
pub fn parse_with_mapping(path: &Path, mapping: &CsvMapping) -> Result<Statement, ImportError> {
    let mut rdr = Reader::from_path(path).map_err(|e| ImportError::Parse(e.to_string()))?;
    let headers = rdr
        .headers()
        .map_err(|e| ImportError::Parse(e.to_string()))?
        .clone();
    let index = |name: &str| headers.iter().position(|h| h == name);
    let date_idx = index(&mapping.date)
        .ok_or_else(|| ImportError::Parse(format!("missing column: {}", mapping.date)))?;
    let account_idx = index(&mapping.account)
        .ok_or_else(|| ImportError::Parse(format!("missing column: {}", mapping.account)))?;
    let amount_idx = index(&mapping.amount)
        .ok_or_else(|| ImportError::Parse(format!("missing column: {}", mapping.amount)))?;
    let category_idx = index(&mapping.category);
    let payee_idx = index(&mapping.payee);
    let note_idx = index(&mapping.note);

    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result.map_err(|e| ImportError::Parse(e.to_string()))?;
        let field = |idx: Option<usize>| {
            idx.and_then(|i| record.get(i))
                .unwrap_or_default()
                .to_string()
        };
        rows.push(CsvRow {
            date: field(Some(date_idx)),
            account: field(Some(account_idx)),
            amount: field(Some(amount_idx)),
            category: field(category_idx),
            payee: field(payee_idx),
            note: field(note_idx),
        });
    }
    build_statement(rows)
}

fn build_statement(rows: Vec<CsvRow>) -> Result<Statement, ImportError> {
    let mut statement = Statement::default();
    let mut by_name: HashMap<String, usize> = HashMap::new();
    for row in rows {
        let date = NaiveDate::parse_from_str(&row.date, "%Y-%m-%d")
            .map_err(|_| ImportError::Parse(format!("bad date: {}", row.date)))?;
        let amount = parse_money(&row.amount)?;
        let index = *by_name.entry(row.account.clone()).or_insert_with(|| {
            statement.accounts.push(StatementAccount {
                name: row.account.clone(),
                kind: "Bank".to_string(),
                transactions: Vec::new(),
            });
            statement.accounts.len() - 1
        });
        let category = if row.category.is_empty() {
            None
        } else {
            CategoryPath::from_str(&row.category).ok()
        };
        statement.accounts[index].transactions.push(StatementTransaction {
            date,
            amount,
            payee: (!row.payee.is_empty()).then_some(row.payee),
            memo: (!row.note.is_empty()).then_some(row.note),
            category,
            transfer_to: None,
            splits: Vec::new(),
        });
    }
    Ok(statement)
}
