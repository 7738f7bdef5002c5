use serde::{Deserialize, Serialize};

use crate::model::cohort::{Cohort, Counts};
use crate::model::ids::RequirementId;

/// Category display order on the scoreboard and the requirement lists.
///
/// Categories missing from this list sort after all known ones.
pub const CATEGORY_PRIORITY: &[&str] = &[
    "Welcome to the Dojo",
    "Games + Analysis",
    "Tactics",
    "Middlegames + Strategy",
    "Endgame",
    "Opening",
    "Graduation",
    "Non-Dojo",
];

/// How a requirement is rendered on the cohort scoreboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScoreboardDisplay {
    Hidden,
    Checkbox,
    ProgressBar,
    #[default]
    #[serde(other)]
    Unspecified,
}

/// A curriculum task with per-cohort (or global) target counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Requirement {
    pub id: RequirementId,
    pub name: String,
    pub category: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub scoreboard_display: ScoreboardDisplay,
    #[serde(default)]
    pub counts: Counts,
}

impl Requirement {
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        category: impl Into<String>,
        scoreboard_display: ScoreboardDisplay,
        counts: Counts,
    ) -> Self {
        Self {
            id: RequirementId::new(id),
            name: name.into(),
            category: category.into(),
            description: String::new(),
            scoreboard_display,
            counts,
        }
    }

    /// A requirement applies to a cohort when it carries a global target or
    /// a target keyed by that cohort.
    #[must_use]
    pub fn applies_to(&self, cohort: &Cohort) -> bool {
        self.counts.covers(cohort)
    }

    #[must_use]
    pub fn is_hidden(&self) -> bool {
        self.scoreboard_display == ScoreboardDisplay::Hidden
    }

    /// Position of this requirement's category in [`CATEGORY_PRIORITY`].
    #[must_use]
    pub fn category_rank(&self) -> usize {
        category_rank(&self.category)
    }
}

#[must_use]
pub fn category_rank(category: &str) -> usize {
    CATEGORY_PRIORITY
        .iter()
        .position(|known| *known == category)
        .unwrap_or(CATEGORY_PRIORITY.len())
}
