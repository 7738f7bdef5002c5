use std::sync::Arc;

use storage::Storage;
use tracker_core::model::{User, Username};

use crate::Clock;
use crate::config::ApiConfig;
use crate::error::ServiceError;
use crate::events::EventService;
use crate::progress::ProgressService;
use crate::requirements::RequirementService;
use crate::scoreboard::ScoreboardService;

/// Assembles app-facing services over one storage backend.
#[derive(Clone)]
pub struct AppServices {
    storage: Storage,
    requirements: Arc<RequirementService>,
    events: Arc<EventService>,
    scoreboard: Arc<ScoreboardService>,
    progress: Arc<ProgressService>,
}

impl AppServices {
    #[must_use]
    pub fn new(storage: Storage, clock: Clock) -> Self {
        let requirements = Arc::new(RequirementService::new(Arc::clone(&storage.requirements)));
        let events = Arc::new(EventService::new(clock, Arc::clone(&storage.events)));
        let scoreboard = Arc::new(ScoreboardService::new(
            Arc::clone(&requirements),
            Arc::clone(&storage.users),
            Arc::clone(&storage.graduations),
        ));
        let progress = Arc::new(ProgressService::new(Arc::clone(&storage.users)));
        Self {
            storage,
            requirements,
            events,
            scoreboard,
            progress,
        }
    }

    /// Build services backed by the REST API.
    #[must_use]
    pub fn from_config(config: &ApiConfig, clock: Clock) -> Self {
        Self::new(Storage::http(config.backend()), clock)
    }

    /// The signed-in user.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Storage` if the user cannot be fetched.
    pub async fn current_user(&self) -> Result<User, ServiceError> {
        Ok(self.storage.users.get_user().await?)
    }

    /// Another user's public profile.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Storage` if the user cannot be fetched.
    pub async fn public_user(&self, username: &Username) -> Result<User, ServiceError> {
        Ok(self.storage.users.get_user_public(username).await?)
    }

    #[must_use]
    pub fn requirements(&self) -> Arc<RequirementService> {
        Arc::clone(&self.requirements)
    }

    #[must_use]
    pub fn events(&self) -> Arc<EventService> {
        Arc::clone(&self.events)
    }

    #[must_use]
    pub fn scoreboard(&self) -> Arc<ScoreboardService> {
        Arc::clone(&self.scoreboard)
    }

    #[must_use]
    pub fn progress(&self) -> Arc<ProgressService> {
        Arc::clone(&self.progress)
    }
}
