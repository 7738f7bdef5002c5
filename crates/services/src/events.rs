use std::sync::Arc;

use chrono::Duration;

use storage::EventRepository;
use tracker_core::Clock;
use tracker_core::model::{Event, Username};

use crate::error::ServiceError;
use crate::loader::{LoadOutcome, PartitionedLoader};
use crate::request::{RequestError, RequestStatus};

/// The calendar is fetched as a single partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AllEvents;

/// Meetings that ended less than this many minutes ago still count as upcoming.
const MEETING_GRACE_MINUTES: i64 = 60;

/// Calendar events and the derived meeting count.
pub struct EventService {
    clock: Clock,
    repository: Arc<dyn EventRepository>,
    loader: PartitionedLoader<Event, AllEvents>,
}

impl EventService {
    #[must_use]
    pub fn new(clock: Clock, repository: Arc<dyn EventRepository>) -> Self {
        Self {
            clock,
            repository,
            loader: PartitionedLoader::new("events"),
        }
    }

    /// Fetches every event unless already cached.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Storage` if any page fails to load.
    pub async fn load(&self) -> Result<LoadOutcome, ServiceError> {
        self.loader
            .ensure(AllEvents, |start_key| self.repository.list_events(start_key))
            .await
    }

    /// Cached events ordered by start time.
    #[must_use]
    pub fn events(&self) -> Vec<Event> {
        self.loader.list(
            |_| true,
            |a, b| a.start_time.cmp(&b.start_time).then_with(|| a.id.cmp(&b.id)),
        )
    }

    /// Upserts an event, e.g. after booking or editing it.
    pub fn put(&self, event: Event) {
        self.loader.put(event);
    }

    /// Booked, non-canceled meetings involving `username` that have not
    /// ended more than an hour ago.
    #[must_use]
    pub fn upcoming_meetings(&self, username: &Username) -> usize {
        let not_before = self.clock.now() - Duration::minutes(MEETING_GRACE_MINUTES);
        self.loader
            .list(
                |e| e.involves(username) && e.is_active_meeting(not_before),
                |_, _| std::cmp::Ordering::Equal,
            )
            .len()
    }

    #[must_use]
    pub fn status(&self) -> RequestStatus {
        self.loader.status(&AllEvents)
    }

    #[must_use]
    pub fn error(&self) -> Option<RequestError> {
        self.loader.error(&AllEvents)
    }

    pub fn invalidate(&self) -> bool {
        self.loader.invalidate(&AllEvents)
    }
}
