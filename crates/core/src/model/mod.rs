mod cohort;
mod event;
mod graduation;
mod ids;
mod progress;
mod requirement;
mod user;

pub use cohort::{ALL_COHORTS, Cohort, CohortError, Counts, ScoreKey};
pub use event::{AvailabilityStatus, AvailabilityType, Event, EventType, Participant};
pub use graduation::Graduation;
pub use ids::{EventId, ParseIdError, RequirementId, Username};
pub use progress::{ProgressHolder, RequirementProgress, TimelineEntry};
pub use requirement::{CATEGORY_PRIORITY, Requirement, ScoreboardDisplay, category_rank};
pub use user::{RatingSystem, Ratings, User};
