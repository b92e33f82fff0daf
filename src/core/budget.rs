use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::Transaction;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum Period {
    Monthly,
    Yearly,
}

/// A spending limit for one category over one period.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Budget {
    pub category_id: i64,
    /// Minor currency units (cents).
    pub amount: i64,
    pub period: Period,
}

/// Budgets keyed by category and calendar period.
#[derive(Default, Debug, Clone, Serialize, Deserialize)]
pub struct BudgetBook {
    monthly: HashMap<(i64, i32, u32), Budget>,
    yearly: HashMap<(i64, i32), Budget>,
}

impl BudgetBook {
    pub fn add(&mut self, budget: Budget, year: i32, month: Option<u32>) {
        match budget.period {
            Period::Monthly => {
                let m = month.unwrap_or(1);
                self.monthly.insert((budget.category_id, year, m), budget);
            }
            Period::Yearly => {
                self.yearly.insert((budget.category_id, year), budget);
            }
        }
    }

    /// Remaining budget for the month, or `None` if no budget is set.
    /// Negative means overspent.
    pub fn compare_month(
        &self,
        transactions: &[Transaction],
        category_id: i64,
        year: i32,
        month: u32,
    ) -> Option<i64> {
        let b = self.monthly.get(&(category_id, year, month))?;
        let start = NaiveDate::from_ymd_opt(year, month, 1)?;
        let (next_y, next_m) = if month == 12 {
            (year + 1, 1)
        } else {
            (year, month + 1)
        };
        let end = NaiveDate::from_ymd_opt(next_y, next_m, 1)?.pred_opt()?;
        Some(b.amount - spent(transactions, category_id, start, end))
    }

    /// Remaining budget for the year, or `None` if no budget is set.
    pub fn compare_year(
        &self,
        transactions: &[Transaction],
        category_id: i64,
        year: i32,
    ) -> Option<i64> {
        let b = self.yearly.get(&(category_id, year))?;
        let start = NaiveDate::from_ymd_opt(year, 1, 1)?;
        let end = NaiveDate::from_ymd_opt(year, 12, 31)?;
        Some(b.amount - spent(transactions, category_id, start, end))
    }
}

fn spent(transactions: &[Transaction], category_id: i64, start: NaiveDate, end: NaiveDate) -> i64 {
    transactions.iter().fold(0, |mut acc, t| {
        let date = t.date.date();
        if date < start || date > end {
            return acc;
        }
        if t.is_split() {
            for s in &t.splits {
                if s.category_id == category_id {
                    acc += s.amount.abs();
                }
            }
        } else if t.category_id == category_id {
            acc += t.amount.abs();
        }
        acc
    })
}
