use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{info, warn};

use storage::{ProgressUpdate, StorageError, UserRepository};
use tracker_core::model::{Cohort, RequirementId, User};
use tracker_core::timeline::{HistoryItem, TimelineUpdate, reconcile};

use crate::error::ServiceError;
use crate::request::{AsyncOperation, RequestError};

/// Records progress for the signed-in user.
///
/// Both calls share one request tracker, the way a single progress dialog
/// would. Validation failures never reach the tracker or the backend.
pub struct ProgressService {
    users: Arc<dyn UserRepository>,
    request: Mutex<AsyncOperation<User>>,
}

impl ProgressService {
    #[must_use]
    pub fn new(users: Arc<dyn UserRepository>) -> Self {
        Self {
            users,
            request: Mutex::new(AsyncOperation::new()),
        }
    }

    /// Posts an increment for one requirement and returns the updated user.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::InFlight` while another update is pending, or
    /// `ServiceError::Storage` if the backend rejects the update.
    pub async fn record_progress(
        &self,
        cohort: &Cohort,
        requirement_id: &RequirementId,
        incremental_count: i64,
        incremental_minutes: i64,
    ) -> Result<User, ServiceError> {
        let update = ProgressUpdate {
            requirement_id: requirement_id.clone(),
            cohort: cohort.clone(),
            incremental_count,
            incremental_minutes,
        };
        self.begin()?;
        let result = self.users.update_progress(&update).await;
        self.finish(result, "progress recorded")
    }

    /// Validates the edited history and replaces the requirement's timeline
    /// for `cohort` in one update.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Timeline` with per-row field errors when any
    /// row is invalid; nothing is sent in that case. Returns
    /// `ServiceError::InFlight` while another update is pending, or
    /// `ServiceError::Storage` if the backend rejects the update.
    pub async fn save_timeline(
        &self,
        items: &[HistoryItem],
        requirement_id: &RequirementId,
        cohort: &Cohort,
    ) -> Result<User, ServiceError> {
        let update: TimelineUpdate = reconcile(items, requirement_id, cohort)?;
        self.begin()?;
        let result = self.users.update_timeline(&update).await;
        self.finish(result, "timeline saved")
    }

    /// Snapshot of the shared request tracker.
    #[must_use]
    pub fn status(&self) -> AsyncOperation<User> {
        self.request().clone()
    }

    /// Dismisses the current notice.
    pub fn reset(&self) {
        self.request().reset();
    }

    fn begin(&self) -> Result<(), ServiceError> {
        let mut request = self.request();
        if request.is_loading() {
            warn!("progress update already in flight");
            return Err(ServiceError::InFlight);
        }
        request.start();
        Ok(())
    }

    fn finish(
        &self,
        result: Result<User, StorageError>,
        action: &'static str,
    ) -> Result<User, ServiceError> {
        let mut request = self.request();
        match result {
            Ok(user) => {
                info!(user = %user.username, "{action}");
                request.succeed(user.clone());
                Ok(user)
            }
            Err(err) => {
                warn!(error = %err, "{action} failed");
                let err = ServiceError::from(err);
                request.fail(RequestError::from(&err));
                Err(err)
            }
        }
    }

    fn request(&self) -> MutexGuard<'_, AsyncOperation<User>> {
        self.request.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::RequestStatus;
    use storage::InMemoryRepository;
    use tracker_core::model::{Counts, Requirement, ScoreboardDisplay, Username};
    use tracker_core::time::{fixed_clock, fixed_now};
    use tracker_core::timeline::history_items;

    fn cohort() -> Cohort {
        Cohort::new("1500-1600").unwrap()
    }

    fn seeded() -> InMemoryRepository {
        let repo = InMemoryRepository::new().with_clock(fixed_clock());
        repo.insert_requirement(Requirement::new(
            "games",
            "Play games",
            "Games + Analysis",
            ScoreboardDisplay::ProgressBar,
            Counts::new().with(cohort(), 10),
        ))
        .unwrap();
        repo.insert_user(User::new("alice", "Alice", cohort())).unwrap();
        repo.sign_in(Username::new("alice")).unwrap();
        repo
    }

    #[tokio::test]
    async fn edits_history_and_saves_running_totals() {
        let service = ProgressService::new(Arc::new(seeded()));
        let games = RequirementId::new("games");
        for count in [3, 2] {
            service
                .record_progress(&cohort(), &games, count, 30)
                .await
                .unwrap();
        }
        let user = service.status().data().cloned().unwrap();
        let mut items = history_items(&user.timeline, &games, &cohort());
        assert_eq!(items.len(), 2);

        items[0].count = "4".into();
        items[1].count = "-1".into();
        items[1].hours = "1".into();
        let user = service.save_timeline(&items, &games, &cohort()).await.unwrap();

        let counts: Vec<_> = user.timeline.iter().map(|e| e.new_count).collect();
        assert_eq!(counts, vec![4, 3]);
        let progress = &user.progress[&games];
        assert_eq!(progress.counts.resolve(&cohort()), Some(3));
        assert_eq!(progress.minutes_spent.resolve(&cohort()), Some(120));
        assert_eq!(service.status().status(), RequestStatus::Success);
    }

    #[tokio::test]
    async fn invalid_rows_are_not_sent() {
        let service = ProgressService::new(Arc::new(seeded()));
        let games = RequirementId::new("games");
        let user = service
            .record_progress(&cohort(), &games, 3, 0)
            .await
            .unwrap();
        service.reset();

        let mut items = history_items(&user.timeline, &games, &cohort());
        items[0].count = "0".into();
        items[0].date = None;
        let err = service
            .save_timeline(&items, &games, &cohort())
            .await
            .unwrap_err();

        let ServiceError::Timeline(errors) = err else {
            panic!("expected timeline errors, got {err:?}");
        };
        assert_eq!(errors.rows.len(), 1);
        assert_eq!(service.status().status(), RequestStatus::Reset);
        assert_eq!(items[0].entry.created_at, fixed_now());
    }

    #[tokio::test]
    async fn rejected_update_is_tracked() {
        let repo = InMemoryRepository::new();
        let service = ProgressService::new(Arc::new(repo));
        let result = service
            .record_progress(&cohort(), &RequirementId::new("games"), 1, 0)
            .await;

        assert!(matches!(
            result,
            Err(ServiceError::Storage(StorageError::Unauthorized { .. }))
        ));
        let status = service.status();
        assert_eq!(status.status(), RequestStatus::Failure);
        assert_eq!(status.error().and_then(RequestError::status), Some(401));
    }

    struct SlowUsers(InMemoryRepository);

    #[async_trait::async_trait]
    impl UserRepository for SlowUsers {
        async fn get_user(&self) -> Result<User, StorageError> {
            self.0.get_user().await
        }

        async fn get_user_public(&self, username: &Username) -> Result<User, StorageError> {
            self.0.get_user_public(username).await
        }

        async fn list_users_by_cohort(
            &self,
            cohort: &Cohort,
            start_key: Option<String>,
        ) -> Result<storage::Page<User>, StorageError> {
            self.0.list_users_by_cohort(cohort, start_key).await
        }

        async fn update_progress(&self, update: &ProgressUpdate) -> Result<User, StorageError> {
            tokio::task::yield_now().await;
            self.0.update_progress(update).await
        }

        async fn update_timeline(&self, update: &TimelineUpdate) -> Result<User, StorageError> {
            tokio::task::yield_now().await;
            self.0.update_timeline(update).await
        }
    }

    #[tokio::test]
    async fn overlapping_updates_are_refused() {
        let service = ProgressService::new(Arc::new(SlowUsers(seeded())));
        let games = RequirementId::new("games");
        let cohort = cohort();

        let (first, second) = tokio::join!(
            service.record_progress(&cohort, &games, 1, 10),
            service.record_progress(&cohort, &games, 2, 20),
        );

        assert_eq!(first.unwrap().progress[&games].counts.resolve(&cohort), Some(1));
        assert!(matches!(second, Err(ServiceError::InFlight)));
        assert_eq!(service.status().status(), RequestStatus::Success);

        // the tracker is free again once the first update lands
        service.record_progress(&cohort, &games, 2, 20).await.unwrap();
    }
}
