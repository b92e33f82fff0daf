//! QIF statement parsing.
//!
//! QIF is a line protocol: one-letter prefixes, records terminated by `^`.
//! `!Account` blocks declare accounts, `!Type:Cat` blocks declare the
//! category list, any other `!Type:` header starts transactions for the most
//! recently declared account. Splits arrive as repeated `S`/`$`/`E` lines
//! inside a transaction record.

use std::iter::Peekable;
use std::path::Path;
use std::str::FromStr;

use chrono::NaiveDate;

use super::{
    ImportError, Statement, StatementAccount, StatementCategory, StatementImporter,
    StatementSplit, StatementTransaction,
};
use crate::core::CategoryPath;

/// Field order of QIF dates; the format itself does not say.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QifDateFormat {
    /// `31/12/2011` and `31.12.2011`.
    #[default]
    DayMonth,
    /// `12/31/2011`.
    MonthDay,
}

/// Name used when transactions appear before any `!Account` block.
const IMPLICIT_ACCOUNT: &str = "Imported";

/// Category marker QIF uses for uncategorized split lines.
const NO_CATEGORY_MARKER: &str = "<NO_CATEGORY>";

pub struct QifImporter;

impl QifImporter {
    pub fn parse_str(input: &str, date_format: QifDateFormat) -> Result<Statement, ImportError> {
        let mut statement = Statement::default();
        let mut lines = input.lines().map(|l| l.trim_end_matches('\r')).peekable();
        while let Some(line) = lines.next() {
            if line.is_empty() {
                continue;
            }
            if line == "!Account" {
                statement.accounts.push(parse_account_block(&mut lines));
            } else if line == "!Type:Cat" {
                parse_category_blocks(&mut lines, &mut statement.categories);
            } else if let Some(kind) = line.strip_prefix("!Type:") {
                // !Type:Cash, !Type:Bank, ... - transactions for the current account
                if statement.accounts.is_empty() {
                    statement.accounts.push(StatementAccount {
                        name: IMPLICIT_ACCOUNT.to_string(),
                        kind: kind.to_string(),
                        transactions: Vec::new(),
                    });
                }
                parse_transaction_blocks(&mut lines, date_format, &mut statement)?;
            }
            // other ! directives (!Option:..., !Clear:...) are skipped
        }
        Ok(statement)
    }
}

impl StatementImporter for QifImporter {
    fn parse(path: &Path) -> Result<Statement, ImportError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse_str(&content, QifDateFormat::default())
    }
}

pub fn parse(path: &Path) -> Result<Statement, ImportError> {
    QifImporter::parse(path)
}

pub fn parse_with_format(path: &Path, date_format: QifDateFormat) -> Result<Statement, ImportError> {
    let content = std::fs::read_to_string(path)?;
    QifImporter::parse_str(&content, date_format)
}

fn parse_account_block<'a, I>(lines: &mut Peekable<I>) -> StatementAccount
where
    I: Iterator<Item = &'a str>,
{
    let mut account = StatementAccount {
        name: String::new(),
        kind: String::new(),
        transactions: Vec::new(),
    };
    for line in lines.by_ref() {
        if line.starts_with('^') {
            break;
        }
        if let Some(rest) = line.strip_prefix('N') {
            account.name = rest.trim().to_string();
        } else if let Some(rest) = line.strip_prefix('T') {
            account.kind = rest.trim().to_string();
        }
    }
    account
}

fn parse_category_blocks<'a, I>(lines: &mut Peekable<I>, out: &mut Vec<StatementCategory>)
where
    I: Iterator<Item = &'a str>,
{
    let mut path: Option<CategoryPath> = None;
    let mut is_income = false;
    while let Some(peeked) = lines.peek() {
        if peeked.starts_with('!') {
            break;
        }
        let line = lines.next().unwrap_or_default();
        if line.starts_with('^') {
            if let Some(path) = path.take() {
                out.push(StatementCategory { path, is_income });
            }
            is_income = false;
        } else if let Some(rest) = line.strip_prefix('N') {
            path = CategoryPath::from_str(rest.trim()).ok();
        } else if line.starts_with('I') {
            is_income = true;
        } else if line.starts_with('E') {
            is_income = false;
        }
    }
}

fn parse_transaction_blocks<'a, I>(
    lines: &mut Peekable<I>,
    date_format: QifDateFormat,
    statement: &mut Statement,
) -> Result<(), ImportError>
where
    I: Iterator<Item = &'a str>,
{
    while let Some(peeked) = lines.peek() {
        if peeked.starts_with('!') {
            return Ok(());
        }
        if let Some(txn) = parse_transaction_block(lines, date_format)? {
            if let Some(account) = statement.accounts.last_mut() {
                account.transactions.push(txn);
            }
        }
    }
    Ok(())
}

fn parse_transaction_block<'a, I>(
    lines: &mut Peekable<I>,
    date_format: QifDateFormat,
) -> Result<Option<StatementTransaction>, ImportError>
where
    I: Iterator<Item = &'a str>,
{
    let mut date: Option<NaiveDate> = None;
    let mut amount: i64 = 0;
    let mut payee: Option<String> = None;
    let mut memo: Option<String> = None;
    let mut category: Option<CategoryPath> = None;
    let mut transfer_to: Option<String> = None;
    let mut splits: Vec<StatementSplit> = Vec::new();
    let mut split: Option<StatementSplit> = None;
    let mut seen_field = false;

    for line in lines.by_ref() {
        if line.starts_with('^') {
            break;
        }
        if line.is_empty() {
            continue;
        }
        seen_field = true;
        if let Some(rest) = line.strip_prefix('D') {
            date = Some(parse_date(rest.trim(), date_format)?);
        } else if let Some(rest) = line.strip_prefix('T') {
            amount = parse_money(rest.trim())?;
        } else if let Some(rest) = line.strip_prefix('P') {
            payee = Some(rest.trim().to_string());
        } else if let Some(rest) = line.strip_prefix('M') {
            memo = Some(rest.trim().to_string());
        } else if let Some(rest) = line.strip_prefix('L') {
            let value = rest.trim();
            if let Some(target) = transfer_target(value) {
                transfer_to = Some(target);
            } else {
                category = CategoryPath::from_str(value).ok();
            }
        } else if let Some(rest) = line.strip_prefix('S') {
            if let Some(done) = split.take() {
                splits.push(done);
            }
            let value = rest.trim();
            let mut next = StatementSplit::default();
            if let Some(target) = transfer_target(value) {
                next.transfer_to = Some(target);
            } else if value != NO_CATEGORY_MARKER {
                next.category = CategoryPath::from_str(value).ok();
            }
            split = Some(next);
        } else if let Some(rest) = line.strip_prefix('$') {
            if let Some(split) = split.as_mut() {
                split.amount = parse_money(rest.trim())?;
            }
        } else if let Some(rest) = line.strip_prefix('E') {
            if let Some(split) = split.as_mut() {
                split.memo = Some(rest.trim().to_string());
            }
        }
        // other prefixes (cleared flag, check number, address) are skipped
    }
    if let Some(done) = split.take() {
        splits.push(done);
    }
    if !seen_field {
        return Ok(None);
    }
    let date = date.ok_or_else(|| ImportError::Parse("transaction record without a date".into()))?;
    Ok(Some(StatementTransaction {
        date,
        amount,
        payee,
        memo,
        category,
        transfer_to,
        splits,
    }))
}

/// `[Account]` transfer notation on `L` and `S` lines.
fn transfer_target(value: &str) -> Option<String> {
    let inner = value.strip_prefix('[')?.strip_suffix(']')?;
    Some(inner.to_string())
}

/// Parses a QIF decimal amount into cents; group separators are dropped.
pub fn parse_money(value: &str) -> Result<i64, ImportError> {
    let cleaned = value.replace(',', "").replace(' ', "");
    if cleaned.is_empty() {
        return Err(ImportError::Parse("empty amount".into()));
    }
    let (sign, digits) = match cleaned.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, cleaned.strip_prefix('+').unwrap_or(&cleaned)),
    };
    let (whole, frac) = match digits.split_once('.') {
        Some((w, f)) => (w, f),
        None => (digits, ""),
    };
    let whole: i64 = if whole.is_empty() {
        0
    } else {
        whole
            .parse()
            .map_err(|_| ImportError::Parse(format!("bad amount: {value}")))?
    };
    let mut frac = frac.to_string();
    frac.truncate(2);
    while frac.len() < 2 {
        frac.push('0');
    }
    let frac: i64 = frac
        .parse()
        .map_err(|_| ImportError::Parse(format!("bad amount: {value}")))?;
    Ok(sign * (whole * 100 + frac))
}

/// Parses `dd/mm/yyyy` or `mm/dd/yyyy` (also with `.` or `-` separators).
pub fn parse_date(value: &str, format: QifDateFormat) -> Result<NaiveDate, ImportError> {
    let parts: Vec<&str> = value
        .split(['/', '.', '-'])
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect();
    if parts.len() != 3 {
        return Err(ImportError::Parse(format!("bad date: {value}")));
    }
    let nums: Vec<u32> = parts
        .iter()
        .map(|p| p.parse::<u32>())
        .collect::<Result<_, _>>()
        .map_err(|_| ImportError::Parse(format!("bad date: {value}")))?;
    let (day, month) = match format {
        QifDateFormat::DayMonth => (nums[0], nums[1]),
        QifDateFormat::MonthDay => (nums[1], nums[0]),
    };
    let year = if nums[2] < 100 { nums[2] + 2000 } else { nums[2] };
    NaiveDate::from_ymd_opt(year as i32, month, day)
        .ok_or_else(|| ImportError::Parse(format!("bad date: {value}")))
}
