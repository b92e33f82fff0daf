//! QIF writer, the mirror of [`crate::import::qif`].

use std::collections::HashMap;
use std::io::Write;

use tracing::info;

use super::{ExportError, category_paths};
use crate::core::{CategoryPath, NO_CATEGORY_ID, Transaction, cents_to_string};
use crate::import::qif::QifDateFormat;
use crate::store::SqliteStore;

#[derive(Debug, Clone, Copy, Default)]
pub struct QifExportOptions {
    pub date_format: QifDateFormat,
}

/// Writes the whole store as QIF: the category list first, then every
/// account with its transactions.
pub fn write_qif<W: Write>(
    store: &SqliteStore,
    out: &mut W,
    options: &QifExportOptions,
) -> Result<(), ExportError> {
    let paths = category_paths(store)?;
    let accounts = store.all_accounts()?;
    let account_titles: HashMap<i64, String> =
        accounts.iter().map(|a| (a.id, a.title.clone())).collect();

    if !paths.is_empty() {
        writeln!(out, "!Type:Cat")?;
        let mut sorted: Vec<_> = paths.values().collect();
        sorted.sort_by_key(|p| p.to_string());
        for path in sorted {
            writeln!(out, "N{path}")?;
            writeln!(out, "E")?;
            writeln!(out, "^")?;
        }
    }

    let mut written = 0usize;
    for account in &accounts {
        writeln!(out, "!Account")?;
        writeln!(out, "N{}", account.title)?;
        writeln!(out, "T{}", account.kind)?;
        writeln!(out, "^")?;
        let transactions = store.transactions_for_account(account.id)?;
        if transactions.is_empty() {
            continue;
        }
        writeln!(out, "!Type:{}", account.kind)?;
        for txn in &transactions {
            write_transaction(out, txn, &paths, &account_titles, options)?;
            written += 1;
        }
    }
    info!(
        accounts = accounts.len(),
        transactions = written,
        "QIF export complete"
    );
    Ok(())
}

fn write_transaction<W: Write>(
    out: &mut W,
    txn: &Transaction,
    paths: &HashMap<i64, CategoryPath>,
    account_titles: &HashMap<i64, String>,
    options: &QifExportOptions,
) -> Result<(), ExportError> {
    writeln!(out, "D{}", format_date(txn, options))?;
    writeln!(out, "T{}", cents_to_string(txn.amount))?;
    if let Some(target) = txn.to_account_id.and_then(|id| account_titles.get(&id)) {
        writeln!(out, "L[{target}]")?;
    } else if let Some(path) = paths.get(&txn.category_id) {
        writeln!(out, "L{path}")?;
    }
    if !txn.payee.is_empty() {
        writeln!(out, "P{}", txn.payee)?;
    }
    if let Some(note) = txn.note.as_deref().filter(|n| !n.is_empty()) {
        writeln!(out, "M{note}")?;
    }
    for split in &txn.splits {
        match paths.get(&split.category_id) {
            Some(path) if split.category_id != NO_CATEGORY_ID => writeln!(out, "S{path}")?,
            _ => writeln!(out, "S<NO_CATEGORY>")?,
        }
        writeln!(out, "${}", cents_to_string(split.amount))?;
        if let Some(memo) = split.note.as_deref().filter(|n| !n.is_empty()) {
            writeln!(out, "E{memo}")?;
        }
    }
    writeln!(out, "^")?;
    Ok(())
}

fn format_date(txn: &Transaction, options: &QifExportOptions) -> String {
    let pattern = match options.date_format {
        QifDateFormat::DayMonth => "%d/%m/%Y",
        QifDateFormat::MonthDay => "%m/%d/%Y",
    };
    txn.date.format(pattern).to_string()
}
