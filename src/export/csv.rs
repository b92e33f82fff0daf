//! CSV export of the transaction blotter.

use std::collections::HashMap;
use std::io::Write;

use csv::WriterBuilder;
use tracing::info;

use super::{ExportError, category_paths};
use crate::core::{Account, Category, CategoryPath, cents_to_string};
use crate::store::{SqliteStore, StoreError};

const HEADER: [&str; 8] = [
    "date", "account", "amount", "currency", "category", "parent", "payee", "note",
];

/// Writes every transaction as one CSV row; split transactions produce one
/// row per split, transfers one row per side.
pub fn write_csv<W: Write>(
    store: &SqliteStore,
    out: W,
    include_header: bool,
) -> Result<(), ExportError> {
    let mut w = WriterBuilder::new().from_writer(out);
    if include_header {
        w.write_record(HEADER)?;
    }
    let categories = store.category_map(false)?;
    let paths = category_paths(store)?;
    let accounts: HashMap<i64, Account> = store
        .all_accounts()?
        .into_iter()
        .map(|a| (a.id, a))
        .collect();

    let mut rows = 0usize;
    for txn in store.all_transactions()? {
        let date = txn.date.format("%Y-%m-%d").to_string();
        let account = accounts
            .get(&txn.account_id)
            .ok_or(StoreError::AccountNotFound(txn.account_id))?;
        if let Some(to_id) = txn.to_account_id {
            let to_account = accounts.get(&to_id).ok_or(StoreError::AccountNotFound(to_id))?;
            let to_amount = txn.to_amount.unwrap_or(-txn.amount);
            write_row(
                &mut w,
                &date,
                &account.title,
                txn.amount,
                &account.currency,
                categories.get(&txn.category_id),
                &paths,
                "Transfer Out",
                txn.note.as_deref(),
            )?;
            write_row(
                &mut w,
                &date,
                &to_account.title,
                to_amount,
                &to_account.currency,
                categories.get(&txn.category_id),
                &paths,
                "Transfer In",
                txn.note.as_deref(),
            )?;
            rows += 2;
        } else if txn.is_split() {
            for split in &txn.splits {
                write_row(
                    &mut w,
                    &date,
                    &account.title,
                    split.amount,
                    &account.currency,
                    categories.get(&split.category_id),
                    &paths,
                    &txn.payee,
                    split.note.as_deref().or(txn.note.as_deref()),
                )?;
                rows += 1;
            }
        } else {
            write_row(
                &mut w,
                &date,
                &account.title,
                txn.amount,
                &account.currency,
                categories.get(&txn.category_id),
                &paths,
                &txn.payee,
                txn.note.as_deref(),
            )?;
            rows += 1;
        }
    }
    w.flush()?;
    info!(rows, "CSV export complete");
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn write_row<W: Write>(
    w: &mut csv::Writer<W>,
    date: &str,
    account: &str,
    amount: i64,
    currency: &str,
    category: Option<&Category>,
    paths: &HashMap<i64, CategoryPath>,
    payee: &str,
    note: Option<&str>,
) -> Result<(), ExportError> {
    let title = category.map(|c| c.title.as_str()).unwrap_or("");
    let parent = category
        .and_then(|c| paths.get(&c.id))
        .and_then(|p| p.parent())
        .map(|p| p.to_string())
        .unwrap_or_default();
    w.write_record([
        date,
        account,
        &cents_to_string(amount),
        currency,
        title,
        &parent,
        payee,
        note.unwrap_or(""),
    ])?;
    Ok(())
}
