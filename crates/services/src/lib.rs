#![forbid(unsafe_code)]

pub mod app_services;
pub mod config;
pub mod error;
pub mod events;
pub mod loader;
pub mod partition;
pub mod progress;
pub mod request;
pub mod requirements;
pub mod scoreboard;

pub use tracker_core::Clock;

pub use app_services::AppServices;
pub use config::ApiConfig;
pub use error::{ConfigError, ServiceError};
pub use events::{AllEvents, EventService};
pub use loader::{LoadOutcome, PartitionedLoader};
pub use progress::ProgressService;
pub use request::{AsyncOperation, Notice, RequestError, RequestStatus};
pub use requirements::RequirementService;
pub use scoreboard::{Scoreboard, ScoreboardService};
