use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::cohort::Cohort;
use crate::model::ids::{RequirementId, Username};
use crate::model::progress::{ProgressHolder, RequirementProgress};
use crate::model::user::RatingSystem;

/// Snapshot taken when a user graduates from one cohort to the next.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Graduation {
    pub username: Username,
    #[serde(default)]
    pub display_name: String,
    pub previous_cohort: Cohort,
    pub new_cohort: Cohort,
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub rating_system: RatingSystem,
    #[serde(default)]
    pub start_rating: i64,
    #[serde(default)]
    pub current_rating: i64,
    #[serde(default)]
    pub comments: String,
    #[serde(default)]
    pub progress: HashMap<RequirementId, RequirementProgress>,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Graduation {
    #[must_use]
    pub fn rating_change(&self) -> i64 {
        self.current_rating - self.start_rating
    }
}

impl ProgressHolder for Graduation {
    fn progress_for(&self, requirement_id: &RequirementId) -> Option<&RequirementProgress> {
        self.progress.get(requirement_id)
    }
}
