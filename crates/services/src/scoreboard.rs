//! Cohort scoreboard assembly.
//!
//! Rows are derived on every call from the cached members, graduations and
//! requirement catalog; nothing derived is stored.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use storage::{GraduationRepository, UserRepository, collect_pages};
use tracker_core::model::{Cohort, Graduation, User};
use tracker_core::score::{
    ColumnGroup, ScoreColumn, ScoreboardRow, column_groups, columns_for, default_column_groups,
};

use crate::error::ServiceError;
use crate::loader::{LoadOutcome, PartitionedLoader};
use crate::request::{AsyncOperation, RequestError, RequestStatus};
use crate::requirements::RequirementService;

/// Everything needed to render one cohort's scoreboard.
#[derive(Debug, Clone, PartialEq)]
pub struct Scoreboard {
    pub cohort: Cohort,
    pub columns: Vec<ScoreColumn>,
    /// Default groups followed by one group per requirement category.
    pub groups: Vec<ColumnGroup>,
    pub members: Vec<ScoreboardRow>,
    pub graduations: Vec<ScoreboardRow>,
}

pub struct ScoreboardService {
    requirements: Arc<RequirementService>,
    users: Arc<dyn UserRepository>,
    graduation_repository: Arc<dyn GraduationRepository>,
    members: PartitionedLoader<User, Cohort>,
    graduations: Mutex<HashMap<Cohort, AsyncOperation<Vec<Graduation>>>>,
}

impl ScoreboardService {
    #[must_use]
    pub fn new(
        requirements: Arc<RequirementService>,
        users: Arc<dyn UserRepository>,
        graduation_repository: Arc<dyn GraduationRepository>,
    ) -> Self {
        Self {
            requirements,
            users,
            graduation_repository,
            members: PartitionedLoader::new("members"),
            graduations: Mutex::new(HashMap::new()),
        }
    }

    /// Loads requirements, members and graduations for `cohort`, skipping
    /// whatever is already cached or in flight.
    ///
    /// # Errors
    ///
    /// Returns the first `ServiceError` raised by any of the three loads.
    pub async fn load(&self, cohort: &Cohort) -> Result<(), ServiceError> {
        self.requirements.load(cohort).await?;
        self.load_members(cohort).await?;
        self.load_graduations(cohort).await
    }

    /// # Errors
    ///
    /// Returns `ServiceError::Storage` if any page fails to load.
    pub async fn load_members(&self, cohort: &Cohort) -> Result<LoadOutcome, ServiceError> {
        self.members.select(cohort.clone());
        self.members
            .ensure(cohort.clone(), |start_key| {
                self.users.list_users_by_cohort(cohort, start_key)
            })
            .await
    }

    /// Fetches graduations into `cohort` once; later calls are no-ops until
    /// [`Self::invalidate`].
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Storage` if any page fails to load.
    pub async fn load_graduations(&self, cohort: &Cohort) -> Result<(), ServiceError> {
        {
            let mut graduations = self.graduation_requests();
            let operation = graduations.entry(cohort.clone()).or_default();
            if operation.is_sent() {
                return Ok(());
            }
            operation.start();
        }

        let result = collect_pages(|start_key| {
            self.graduation_repository
                .list_graduations_by_cohort(cohort, start_key)
        })
        .await;

        let mut graduations = self.graduation_requests();
        let operation = graduations.entry(cohort.clone()).or_default();
        if !operation.is_loading() {
            debug!(%cohort, "graduation request was reset during fetch");
            return Ok(());
        }
        match result {
            Ok(items) => {
                debug!(%cohort, items = items.len(), "graduations loaded");
                operation.succeed(items);
                Ok(())
            }
            Err(err) => {
                warn!(%cohort, error = %err, "graduation fetch failed");
                operation.fail(RequestError::from(&err));
                Err(err.into())
            }
        }
    }

    /// Cached members of `cohort`, by display name.
    #[must_use]
    pub fn members(&self, cohort: &Cohort) -> Vec<User> {
        self.members.list(
            |u| u.is_member_of(cohort),
            |a, b| {
                a.display_name
                    .cmp(&b.display_name)
                    .then_with(|| a.username.cmp(&b.username))
            },
        )
    }

    /// Replaces a cached member, e.g. with the user returned by a progress update.
    pub fn put_member(&self, user: User) {
        self.members.put(user);
    }

    #[must_use]
    pub fn graduations(&self, cohort: &Cohort) -> Vec<Graduation> {
        self.graduation_requests()
            .get(cohort)
            .and_then(AsyncOperation::data)
            .cloned()
            .unwrap_or_default()
    }

    #[must_use]
    pub fn members_status(&self, cohort: &Cohort) -> RequestStatus {
        self.members.status(cohort)
    }

    #[must_use]
    pub fn graduations_status(&self, cohort: &Cohort) -> RequestStatus {
        self.graduation_requests()
            .get(cohort)
            .map_or(RequestStatus::NotSent, AsyncOperation::status)
    }

    /// Forgets the members and graduations of `cohort` so the next load refetches.
    pub fn invalidate(&self, cohort: &Cohort) {
        self.members.invalidate(cohort);
        if let Some(operation) = self.graduation_requests().get_mut(cohort) {
            operation.reset();
        }
    }

    /// Builds the scoreboard from whatever is cached.
    ///
    /// When `viewer` belongs to `cohort` they are listed first, and their own
    /// record replaces the cached one.
    #[must_use]
    pub fn build(&self, viewer: Option<&User>, cohort: &Cohort) -> Scoreboard {
        let requirements = self.requirements.requirements(cohort, true);
        let columns = columns_for(&requirements, cohort);
        let mut groups = default_column_groups();
        groups.extend(column_groups(&columns));

        let viewer = viewer.filter(|v| v.is_member_of(cohort));
        let mut users: Vec<User> = viewer.into_iter().cloned().collect();
        users.extend(
            self.members(cohort)
                .into_iter()
                .filter(|u| viewer.is_none_or(|v| v.username != u.username)),
        );

        let members = users
            .iter()
            .map(|u| ScoreboardRow::from_user(u, cohort, &requirements))
            .collect();
        let graduations = self
            .graduations(cohort)
            .iter()
            .map(|g| ScoreboardRow::from_graduation(g, cohort, &requirements))
            .collect();

        Scoreboard {
            cohort: cohort.clone(),
            columns,
            groups,
            members,
            graduations,
        }
    }

    /// Loads what is missing for `cohort`, then builds its scoreboard.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError` if any load fails.
    pub async fn scoreboard(
        &self,
        viewer: Option<&User>,
        cohort: &Cohort,
    ) -> Result<Scoreboard, ServiceError> {
        self.load(cohort).await?;
        Ok(self.build(viewer, cohort))
    }

    fn graduation_requests(
        &self,
    ) -> MutexGuard<'_, HashMap<Cohort, AsyncOperation<Vec<Graduation>>>> {
        self.graduations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
