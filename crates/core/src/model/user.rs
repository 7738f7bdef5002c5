use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::model::cohort::{Cohort, optional_cohort};
use crate::model::ids::{RequirementId, Username};
use crate::model::progress::{ProgressHolder, RequirementProgress, TimelineEntry};

/// Rating platform a user reports their progress with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RatingSystem {
    Chesscom,
    Lichess,
    Fide,
    Uscf,
    #[default]
    #[serde(other)]
    Unknown,
}

impl RatingSystem {
    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            RatingSystem::Chesscom => "Chess.com",
            RatingSystem::Lichess => "Lichess",
            RatingSystem::Fide => "FIDE",
            RatingSystem::Uscf => "USCF",
            RatingSystem::Unknown => "Unknown",
        }
    }
}

/// Start and current rating for every supported platform.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Ratings {
    pub start_chesscom_rating: i64,
    pub current_chesscom_rating: i64,
    pub start_lichess_rating: i64,
    pub current_lichess_rating: i64,
    pub start_fide_rating: i64,
    pub current_fide_rating: i64,
    pub start_uscf_rating: i64,
    pub current_uscf_rating: i64,
}

impl Ratings {
    #[must_use]
    pub fn start(&self, system: RatingSystem) -> i64 {
        match system {
            RatingSystem::Chesscom => self.start_chesscom_rating,
            RatingSystem::Lichess => self.start_lichess_rating,
            RatingSystem::Fide => self.start_fide_rating,
            RatingSystem::Uscf => self.start_uscf_rating,
            RatingSystem::Unknown => 0,
        }
    }

    #[must_use]
    pub fn current(&self, system: RatingSystem) -> i64 {
        match system {
            RatingSystem::Chesscom => self.current_chesscom_rating,
            RatingSystem::Lichess => self.current_lichess_rating,
            RatingSystem::Fide => self.current_fide_rating,
            RatingSystem::Uscf => self.current_uscf_rating,
            RatingSystem::Unknown => 0,
        }
    }
}

/// A member of the training program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub username: Username,
    #[serde(default)]
    pub display_name: String,
    /// Absent until the user picks a cohort.
    #[serde(default, deserialize_with = "optional_cohort")]
    pub dojo_cohort: Option<Cohort>,
    #[serde(default, deserialize_with = "optional_cohort")]
    pub previous_cohort: Option<Cohort>,
    #[serde(default)]
    pub graduation_cohorts: Vec<Cohort>,
    #[serde(default)]
    pub rating_system: RatingSystem,
    #[serde(flatten)]
    pub ratings: Ratings,
    #[serde(default)]
    pub progress: HashMap<RequirementId, RequirementProgress>,
    #[serde(default)]
    pub timeline: Vec<TimelineEntry>,
}

impl User {
    #[must_use]
    pub fn new(username: impl Into<String>, display_name: impl Into<String>, cohort: Cohort) -> Self {
        Self {
            username: Username::new(username),
            display_name: display_name.into(),
            dojo_cohort: Some(cohort),
            previous_cohort: None,
            graduation_cohorts: Vec::new(),
            rating_system: RatingSystem::default(),
            ratings: Ratings::default(),
            progress: HashMap::new(),
            timeline: Vec::new(),
        }
    }

    #[must_use]
    pub fn is_member_of(&self, cohort: &Cohort) -> bool {
        self.dojo_cohort.as_ref() == Some(cohort)
    }

    #[must_use]
    pub fn start_rating(&self) -> i64 {
        self.ratings.start(self.rating_system)
    }

    #[must_use]
    pub fn current_rating(&self) -> i64 {
        self.ratings.current(self.rating_system)
    }

    #[must_use]
    pub fn rating_change(&self) -> i64 {
        self.current_rating() - self.start_rating()
    }

    /// Timeline entries for one requirement in one cohort, in stored order.
    pub fn timeline_for<'a>(
        &'a self,
        requirement_id: &'a RequirementId,
        cohort: &'a Cohort,
    ) -> impl Iterator<Item = &'a TimelineEntry> + 'a {
        self.timeline
            .iter()
            .filter(move |entry| entry.belongs_to(requirement_id, cohort))
    }
}

impl ProgressHolder for User {
    fn progress_for(&self, requirement_id: &RequirementId) -> Option<&RequirementProgress> {
        self.progress.get(requirement_id)
    }
}
