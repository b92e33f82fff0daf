//! Statement export: rendering the store back into QIF/CSV files.

use std::collections::HashMap;

use crate::core::CategoryPath;
use crate::core::tree::CategoryNode;
use crate::store::{SqliteStore, StoreError};

pub mod csv;
pub mod qif;

#[derive(Debug)]
pub enum ExportError {
    Io(std::io::Error),
    Csv(::csv::Error),
    Store(StoreError),
}

impl std::fmt::Display for ExportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExportError::Io(e) => write!(f, "io error: {e}"),
            ExportError::Csv(e) => write!(f, "csv error: {e}"),
            ExportError::Store(e) => write!(f, "store error: {e}"),
        }
    }
}

impl std::error::Error for ExportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExportError::Io(e) => Some(e),
            ExportError::Csv(e) => Some(e),
            ExportError::Store(e) => Some(e),
        }
    }
}

impl From<std::io::Error> for ExportError {
    fn from(e: std::io::Error) -> Self {
        ExportError::Io(e)
    }
}

impl From<::csv::Error> for ExportError {
    fn from(e: ::csv::Error) -> Self {
        ExportError::Csv(e)
    }
}

impl From<StoreError> for ExportError {
    fn from(e: StoreError) -> Self {
        ExportError::Store(e)
    }
}

/// Full `parent:child` path for every category, derived from one tree read
/// instead of per-row ancestor queries.
pub fn category_paths(store: &SqliteStore) -> Result<HashMap<i64, CategoryPath>, StoreError> {
    let tree = store.category_tree(false)?;
    let mut out = HashMap::new();
    walk(&tree.roots, None, &mut out);
    Ok(out)
}

fn walk(
    nodes: &[CategoryNode],
    prefix: Option<&CategoryPath>,
    out: &mut HashMap<i64, CategoryPath>,
) {
    for node in nodes {
        let path = match prefix {
            Some(p) => p.child(&node.category.title),
            None => CategoryPath::from(node.category.title.as_str()),
        };
        out.insert(node.category.id, path.clone());
        walk(&node.children, Some(&path), out);
    }
}
