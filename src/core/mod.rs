//! Core model types for the personal-finance store.

pub mod budget;
pub mod path;
pub mod recurrence;
pub mod tree;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

pub use path::CategoryPath;
pub use tree::CategoryTree;

/// Reserved id of the "no category" root sentinel row.
pub const NO_CATEGORY_ID: i64 = 0;

/// Id carried by the empty node a missed lookup returns.
pub const EMPTY_NODE_ID: i64 = -1;

/// A node of the category hierarchy.
///
/// `left` and `right` are the nested-set interval bounds: every descendant's
/// interval lies strictly inside `(left, right)`, and sibling intervals never
/// overlap. `level` and `parent_id` are derived from the bounds, not stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub title: String,
    pub left: i64,
    pub right: i64,
    #[serde(default)]
    pub level: i64,
    #[serde(default)]
    pub parent_id: Option<i64>,
}

impl Category {
    /// The empty node returned when a lookup finds no row.
    pub fn empty() -> Self {
        Self {
            id: EMPTY_NODE_ID,
            title: String::new(),
            left: 0,
            right: 0,
            level: 0,
            parent_id: None,
        }
    }

    pub fn is_empty_node(&self) -> bool {
        self.id == EMPTY_NODE_ID
    }

    pub fn is_sentinel(&self) -> bool {
        self.id == NO_CATEGORY_ID
    }

    /// Interval containment test: does this node enclose `other`?
    pub fn contains(&self, other: &Category) -> bool {
        self.left < other.left && other.right < self.right
    }

    /// Interval width in bound units, `right - left + 1`.
    pub fn width(&self) -> i64 {
        self.right - self.left + 1
    }
}

/// Draft passed to insert-or-update: `id == EMPTY_NODE_ID` means "new node".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryDraft {
    pub id: i64,
    pub parent_id: i64,
    pub title: String,
}

impl CategoryDraft {
    pub fn new(parent_id: i64, title: impl Into<String>) -> Self {
        Self {
            id: EMPTY_NODE_ID,
            parent_id,
            title: title.into(),
        }
    }

    pub fn existing(id: i64, parent_id: i64, title: impl Into<String>) -> Self {
        Self {
            id,
            parent_id,
            title: title.into(),
        }
    }

    pub fn is_new(&self) -> bool {
        self.id == EMPTY_NODE_ID
    }
}

/// User-defined attribute attachable to categories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub id: i64,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    pub title: String,
    /// QIF account type, e.g. `Cash` or `Bank`.
    pub kind: String,
    pub currency: String,
}

/// One allocation of a split transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Split {
    pub category_id: i64,
    /// Minor currency units (cents).
    pub amount: i64,
    pub note: Option<String>,
}

/// A financial transaction. Amounts are minor currency units (cents).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(default = "default_transaction_id")]
    pub id: i64,
    pub date: NaiveDateTime,
    pub account_id: i64,
    pub category_id: i64,
    pub amount: i64,
    #[serde(default)]
    pub payee: String,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub to_account_id: Option<i64>,
    #[serde(default)]
    pub to_amount: Option<i64>,
    #[serde(default)]
    pub splits: Vec<Split>,
}

fn default_transaction_id() -> i64 {
    EMPTY_NODE_ID
}

impl Transaction {
    pub fn new(date: NaiveDateTime, account_id: i64, amount: i64) -> Self {
        Self {
            id: EMPTY_NODE_ID,
            date,
            account_id,
            category_id: NO_CATEGORY_ID,
            amount,
            payee: String::new(),
            note: None,
            to_account_id: None,
            to_amount: None,
            splits: Vec::new(),
        }
    }

    pub fn is_transfer(&self) -> bool {
        self.to_account_id.is_some()
    }

    pub fn is_split(&self) -> bool {
        !self.splits.is_empty()
    }

    /// Serializes the transaction to a JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserializes a transaction from a JSON string.
    pub fn from_json(input: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(input)
    }
}

/// Renders cents as a plain decimal string, e.g. `-260066` -> `-2600.66`.
pub fn cents_to_string(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{sign}{}.{:02}", abs / 100, abs % 100)
}
