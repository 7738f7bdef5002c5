use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::cohort::{Cohort, Counts};
use crate::model::ids::RequirementId;

/// A user's accumulated progress on one requirement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequirementProgress {
    pub requirement_id: RequirementId,
    #[serde(default)]
    pub counts: Counts,
    #[serde(default)]
    pub minutes_spent: Counts,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl RequirementProgress {
    #[must_use]
    pub fn new(requirement_id: RequirementId, counts: Counts) -> Self {
        Self {
            requirement_id,
            counts,
            minutes_spent: Counts::new(),
            updated_at: None,
        }
    }
}

/// One historical increment of progress toward a requirement.
///
/// Entries for the same `(requirement_id, cohort)` pair chain their running
/// totals: each `previous_count` equals the prior entry's `new_count`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEntry {
    pub requirement_id: RequirementId,
    #[serde(default)]
    pub requirement_name: String,
    #[serde(default)]
    pub requirement_category: String,
    pub cohort: Cohort,
    pub previous_count: i64,
    pub new_count: i64,
    #[serde(default)]
    pub minutes_spent: i64,
    pub created_at: DateTime<Utc>,
}

impl TimelineEntry {
    /// Incremental contribution of this entry.
    #[must_use]
    pub fn increment(&self) -> i64 {
        self.new_count - self.previous_count
    }

    #[must_use]
    pub fn belongs_to(&self, requirement_id: &RequirementId, cohort: &Cohort) -> bool {
        &self.requirement_id == requirement_id && &self.cohort == cohort
    }
}

/// Anything that carries per-requirement progress and can be scored.
pub trait ProgressHolder {
    fn progress_for(&self, requirement_id: &RequirementId) -> Option<&RequirementProgress>;
}
