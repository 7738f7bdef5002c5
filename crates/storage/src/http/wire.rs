//! Request and error bodies exchanged with the REST backend.

use serde::{Deserialize, Serialize};
use tracker_core::model::{Cohort, RequirementId, TimelineEntry};
use tracker_core::timeline::TimelineUpdate;

use crate::repository::ProgressUpdate;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct ProgressRequest<'a> {
    cohort: &'a Cohort,
    requirement_id: &'a RequirementId,
    incremental_count: i64,
    incremental_minutes_spent: i64,
}

impl<'a> From<&'a ProgressUpdate> for ProgressRequest<'a> {
    fn from(update: &'a ProgressUpdate) -> Self {
        Self {
            cohort: &update.cohort,
            requirement_id: &update.requirement_id,
            incremental_count: update.incremental_count,
            incremental_minutes_spent: update.incremental_minutes,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct TimelineRequest<'a> {
    requirement_id: &'a RequirementId,
    cohort: &'a Cohort,
    entries: &'a [TimelineEntry],
    count: i64,
    minutes_spent: i64,
}

impl<'a> From<&'a TimelineUpdate> for TimelineRequest<'a> {
    fn from(update: &'a TimelineUpdate) -> Self {
        Self {
            requirement_id: &update.requirement_id,
            cohort: &update.cohort,
            entries: &update.entries,
            count: update.total_count,
            minutes_spent: update.total_minutes,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}

/// The `message` field of a JSON error body, if the body has one.
pub(super) fn error_message(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.message)
        .filter(|m| !m.trim().is_empty())
}
