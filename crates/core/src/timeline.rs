//! Reconciliation of an edited progress history.
//!
//! The editor works on [`HistoryItem`]s holding the raw text of each field.
//! [`reconcile`] validates every row first and only then rebuilds the running
//! totals, so a rejected edit never produces a partially rewritten timeline.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::{Cohort, RequirementId, TimelineEntry};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

/// Problem with a single field of a history row.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum FieldError {
    #[error("This field is required")]
    Required,
    #[error("This field must be a non-zero integer")]
    NonZeroInteger,
    #[error("This field must be an integer")]
    Integer,
    #[error("This value is too large")]
    TooLarge,
}

/// Field errors for one history row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HistoryItemErrors {
    pub date: Option<FieldError>,
    pub count: Option<FieldError>,
    pub hours: Option<FieldError>,
    pub minutes: Option<FieldError>,
}

impl HistoryItemErrors {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.date.is_none() && self.count.is_none() && self.hours.is_none() && self.minutes.is_none()
    }
}

/// Validation failures keyed by row index.
#[derive(Debug, Error, Clone, Default, PartialEq, Eq)]
#[error("{} history row(s) failed validation", .rows.len())]
pub struct TimelineErrors {
    pub rows: BTreeMap<usize, HistoryItemErrors>,
}

impl TimelineErrors {
    #[must_use]
    pub fn row(&self, index: usize) -> Option<&HistoryItemErrors> {
        self.rows.get(&index)
    }
}

//
// ─── HISTORY ITEMS ─────────────────────────────────────────────────────────────
//

/// One editable row of a requirement's progress history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryItem {
    pub date: Option<DateTime<Utc>>,
    pub count: String,
    pub hours: String,
    pub minutes: String,
    pub entry: TimelineEntry,
}

impl HistoryItem {
    /// Editable row prefilled from a stored entry.
    #[must_use]
    pub fn from_entry(entry: &TimelineEntry) -> Self {
        Self {
            date: Some(entry.created_at),
            count: entry.increment().to_string(),
            hours: (entry.minutes_spent / 60).to_string(),
            minutes: (entry.minutes_spent % 60).to_string(),
            entry: entry.clone(),
        }
    }

    /// Parsed `(count, minutes_spent)`, or every field problem of the row.
    fn parse(&self) -> Result<(i64, i64), HistoryItemErrors> {
        let mut errors = HistoryItemErrors {
            date: self.date.is_none().then_some(FieldError::Required),
            ..HistoryItemErrors::default()
        };
        let count = parse_count(&self.count).map_err(|e| errors.count = Some(e));
        let hours = parse_duration_part(&self.hours).map_err(|e| errors.hours = Some(e));
        let minutes = parse_duration_part(&self.minutes).map_err(|e| errors.minutes = Some(e));

        let minutes_spent = match (hours, minutes) {
            (Ok(hours), Ok(minutes)) => hours
                .checked_mul(60)
                .and_then(|m| m.checked_add(minutes))
                .ok_or_else(|| errors.hours = Some(FieldError::TooLarge)),
            _ => Err(()),
        };
        match (count, minutes_spent) {
            (Ok(count), Ok(minutes_spent)) if errors.is_empty() => Ok((count, minutes_spent)),
            _ => Err(errors),
        }
    }
}

/// Editable rows for one requirement in one cohort, in stored order.
#[must_use]
pub fn history_items(
    timeline: &[TimelineEntry],
    requirement_id: &RequirementId,
    cohort: &Cohort,
) -> Vec<HistoryItem> {
    timeline
        .iter()
        .filter(|entry| entry.belongs_to(requirement_id, cohort))
        .map(HistoryItem::from_entry)
        .collect()
}

/// Totals shown while the user is still editing.
///
/// Unparsable fields are skipped rather than reported. Sums saturate.
#[must_use]
pub fn running_totals(items: &[HistoryItem]) -> (i64, i64) {
    items.iter().fold((0, 0), |(count, minutes), item| {
        let count = count.saturating_add(parse_count(&item.count).unwrap_or(0));
        let hours = parse_duration_part(&item.hours).unwrap_or(0);
        let mins = parse_duration_part(&item.minutes).unwrap_or(0);
        let row_minutes = hours.saturating_mul(60).saturating_add(mins);
        (count, minutes.saturating_add(row_minutes))
    })
}

fn parse_count(raw: &str) -> Result<i64, FieldError> {
    match raw.trim().parse::<i64>() {
        Ok(0) | Err(_) => Err(FieldError::NonZeroInteger),
        Ok(value) => Ok(value),
    }
}

fn parse_duration_part(raw: &str) -> Result<i64, FieldError> {
    if raw.is_empty() {
        return Ok(0);
    }
    if !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(FieldError::Integer);
    }
    raw.parse::<i64>().map_err(|_| FieldError::Integer)
}

//
// ─── RECONCILIATION ────────────────────────────────────────────────────────────
//

/// A complete replacement for one requirement's timeline in one cohort.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelineUpdate {
    pub requirement_id: RequirementId,
    pub cohort: Cohort,
    pub entries: Vec<TimelineEntry>,
    pub total_count: i64,
    pub total_minutes: i64,
}

/// Validates every row, then rebuilds the running totals in input order.
///
/// # Errors
///
/// Returns `TimelineErrors` holding every field error when any row is
/// invalid, including rows whose values overflow the running totals.
/// Nothing is rebuilt in that case.
pub fn reconcile(
    items: &[HistoryItem],
    requirement_id: &RequirementId,
    cohort: &Cohort,
) -> Result<TimelineUpdate, TimelineErrors> {
    let mut rows = BTreeMap::new();
    let mut entries = Vec::with_capacity(items.len());
    let mut running = 0_i64;
    let mut total_minutes = 0_i64;

    for (idx, item) in items.iter().enumerate() {
        let (count, minutes_spent) = match item.parse() {
            Ok(parsed) => parsed,
            Err(errors) => {
                rows.insert(idx, errors);
                continue;
            }
        };
        let new_count = running.checked_add(count);
        let minutes = total_minutes.checked_add(minutes_spent);
        let (Some(new_count), Some(minutes)) = (new_count, minutes) else {
            rows.insert(
                idx,
                HistoryItemErrors {
                    count: new_count.is_none().then_some(FieldError::TooLarge),
                    hours: minutes.is_none().then_some(FieldError::TooLarge),
                    ..HistoryItemErrors::default()
                },
            );
            continue;
        };

        entries.push(TimelineEntry {
            requirement_id: requirement_id.clone(),
            cohort: cohort.clone(),
            previous_count: running,
            new_count,
            minutes_spent,
            created_at: item.date.unwrap_or(item.entry.created_at),
            ..item.entry.clone()
        });
        running = new_count;
        total_minutes = minutes;
    }

    if !rows.is_empty() {
        return Err(TimelineErrors { rows });
    }
    Ok(TimelineUpdate {
        requirement_id: requirement_id.clone(),
        cohort: cohort.clone(),
        entries,
        total_count: running,
        total_minutes,
    })
}
