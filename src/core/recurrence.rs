use chrono::{DateTime, Utc};
use cron::Schedule;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::debug;

/// Upper bound on restored occurrences; the most recent ones win.
pub const MAX_RESTORED: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecurrenceError {
    /// The stored recurrence rule does not parse as a cron expression.
    InvalidRule(String),
}

impl std::fmt::Display for RecurrenceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecurrenceError::InvalidRule(r) => write!(f, "invalid recurrence rule: {r}"),
        }
    }
}

impl std::error::Error for RecurrenceError {}

/// A scheduled transaction template.
///
/// `recurrence` holds a cron expression; a template without one fires exactly
/// once at `start`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledTransaction {
    pub id: i64,
    pub start: DateTime<Utc>,
    pub recurrence: Option<String>,
    pub last_occurrence: Option<DateTime<Utc>>,
}

/// A concrete firing of a schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Occurrence {
    pub transaction_id: i64,
    pub at: DateTime<Utc>,
}

/// A schedule paired with its computed next firing, for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpcomingSchedule {
    pub schedule: ScheduledTransaction,
    pub next: Option<DateTime<Utc>>,
}

/// First occurrence strictly after `now`, or `None` for an exhausted one-shot.
pub fn next_occurrence(
    schedule: &ScheduledTransaction,
    now: DateTime<Utc>,
) -> Result<Option<DateTime<Utc>>, RecurrenceError> {
    match &schedule.recurrence {
        Some(rule) => {
            let parsed =
                Schedule::from_str(rule).map_err(|e| RecurrenceError::InvalidRule(e.to_string()))?;
            Ok(parsed.after(&now).next())
        }
        None => Ok((schedule.start > now).then_some(schedule.start)),
    }
}

/// Occurrences missed between each schedule's recorded `last_occurrence` and
/// `now`. One-shot templates whose date has passed without a recorded firing
/// contribute that date.
///
/// Capped at [`MAX_RESTORED`], keeping the most recent entries, so a template
/// that was dormant for years cannot flood the store on restore.
pub fn missed_occurrences(
    schedules: &[ScheduledTransaction],
    now: DateTime<Utc>,
) -> Vec<Occurrence> {
    let mut restored = Vec::new();
    for schedule in schedules {
        match &schedule.recurrence {
            Some(rule) => {
                let Some(last) = schedule.last_occurrence else {
                    continue;
                };
                let parsed = match Schedule::from_str(rule) {
                    Ok(p) => p,
                    Err(err) => {
                        debug!(id = schedule.id, %err, "Skipping unparsable recurrence rule");
                        continue;
                    }
                };
                for at in parsed.after(&last).take_while(|d| *d <= now) {
                    restored.push(Occurrence {
                        transaction_id: schedule.id,
                        at,
                    });
                }
            }
            None => {
                if schedule.last_occurrence.is_none() && schedule.start < now {
                    restored.push(Occurrence {
                        transaction_id: schedule.id,
                        at: schedule.start,
                    });
                }
            }
        }
    }
    if restored.len() > MAX_RESTORED {
        restored.sort_by(|a, b| b.at.cmp(&a.at));
        restored.truncate(MAX_RESTORED);
    }
    restored
}

/// Whether an alarm should be armed: a next firing exists and is still ahead.
pub fn should_fire(next: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    next.is_some_and(|at| at > now)
}

/// Computes next firings and orders schedules for display: upcoming firings
/// ascending, then past ones descending. An exhausted schedule sorts by its
/// own template date, in the past group.
pub fn sorted_schedules(
    schedules: Vec<ScheduledTransaction>,
    now: DateTime<Utc>,
) -> Vec<UpcomingSchedule> {
    let mut out: Vec<UpcomingSchedule> = schedules
        .into_iter()
        .map(|schedule| {
            let next = next_occurrence(&schedule, now).unwrap_or(None);
            UpcomingSchedule { schedule, next }
        })
        .collect();
    out.sort_by(|a, b| {
        let da = a.next.unwrap_or(a.schedule.start);
        let db = b.next.unwrap_or(b.schedule.start);
        match (da > now, db > now) {
            (true, true) => da.cmp(&db),
            (true, false) => std::cmp::Ordering::Less,
            (false, true) => std::cmp::Ordering::Greater,
            (false, false) => db.cmp(&da),
        }
    });
    out
}
