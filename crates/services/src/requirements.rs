use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use storage::RequirementRepository;
use tracker_core::model::{Cohort, Requirement, RequirementId};
use tracker_core::score::compare_requirements;

use crate::error::ServiceError;
use crate::loader::{LoadOutcome, PartitionedLoader};
use crate::request::{AsyncOperation, RequestError, RequestStatus};

/// Requirement catalog, cached per cohort.
pub struct RequirementService {
    repository: Arc<dyn RequirementRepository>,
    loader: PartitionedLoader<Requirement, Cohort>,
    singles: Mutex<HashMap<RequirementId, AsyncOperation<()>>>,
}

impl RequirementService {
    #[must_use]
    pub fn new(repository: Arc<dyn RequirementRepository>) -> Self {
        Self {
            repository,
            loader: PartitionedLoader::new("requirements"),
            singles: Mutex::new(HashMap::new()),
        }
    }

    /// Selects `cohort` and fetches its requirements unless already cached.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Storage` if any page fails to load.
    pub async fn load(&self, cohort: &Cohort) -> Result<LoadOutcome, ServiceError> {
        self.loader.select(cohort.clone());
        self.loader
            .ensure(cohort.clone(), |start_key| {
                self.repository.list_requirements(cohort, start_key)
            })
            .await
    }

    /// Cached requirements that apply to `cohort`, in display order.
    ///
    /// With `scoreboard_only`, requirements hidden from the scoreboard are left out.
    #[must_use]
    pub fn requirements(&self, cohort: &Cohort, scoreboard_only: bool) -> Vec<Requirement> {
        self.loader.list(
            |r| r.applies_to(cohort) && !(scoreboard_only && r.is_hidden()),
            compare_requirements,
        )
    }

    /// Loads the cohort if needed, then lists it.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Storage` if any page fails to load.
    pub async fn fetch_requirements(
        &self,
        cohort: &Cohort,
        scoreboard_only: bool,
    ) -> Result<Vec<Requirement>, ServiceError> {
        self.load(cohort).await?;
        Ok(self.requirements(cohort, scoreboard_only))
    }

    /// A single requirement, from the cache or fetched once by ID.
    ///
    /// Returns `Ok(None)` while a fetch for the same ID is outstanding, or
    /// after an earlier fetch for it failed; [`Self::reset_requirement`]
    /// allows a retry.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Storage` if the fetch fails.
    pub async fn requirement(&self, id: &RequirementId) -> Result<Option<Requirement>, ServiceError> {
        if let Some(requirement) = self.loader.get(id) {
            return Ok(Some(requirement));
        }
        {
            let mut singles = self.singles();
            let operation = singles.entry(id.clone()).or_default();
            if operation.is_sent() {
                debug!(requirement = %id, status = %operation.status(), "requirement already requested");
                return Ok(None);
            }
            operation.start();
        }

        let result = self.repository.get_requirement(id).await;
        let mut singles = self.singles();
        let operation = singles.entry(id.clone()).or_default();
        match result {
            Ok(requirement) => {
                operation.succeed(());
                self.loader.put(requirement.clone());
                Ok(Some(requirement))
            }
            Err(err) => {
                warn!(requirement = %id, error = %err, "requirement fetch failed");
                operation.fail(RequestError::from(&err));
                Err(err.into())
            }
        }
    }

    /// Clears the single-fetch tracker for `id` so the next call refetches.
    pub fn reset_requirement(&self, id: &RequirementId) {
        if let Some(operation) = self.singles().get_mut(id) {
            operation.reset();
        }
    }

    #[must_use]
    pub fn status(&self, cohort: &Cohort) -> RequestStatus {
        self.loader.status(cohort)
    }

    #[must_use]
    pub fn error(&self, cohort: &Cohort) -> Option<RequestError> {
        self.loader.error(cohort)
    }

    /// Forces the next `load` of `cohort` to refetch.
    pub fn invalidate(&self, cohort: &Cohort) -> bool {
        self.loader.invalidate(cohort)
    }

    fn singles(&self) -> MutexGuard<'_, HashMap<RequirementId, AsyncOperation<()>>> {
        self.singles.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
