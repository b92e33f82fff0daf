//! Tallybook
//!
//! Personal-finance tracking core: a SQLite-backed store with a nested-set
//! category hierarchy, a recurrence engine for scheduled transactions, and
//! QIF/CSV import and export.

pub mod core;
pub mod export;
pub mod import;
pub mod store;
