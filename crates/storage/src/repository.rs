use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tracker_core::Clock;
use tracker_core::model::{
    Cohort, Counts, Event, EventId, Graduation, Requirement, RequirementId, RequirementProgress,
    ScoreKey, TimelineEntry, User, Username,
};
use tracker_core::timeline::TimelineUpdate;

use crate::pagination::Page;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound { message: Option<String> },

    #[error("not authorized")]
    Unauthorized { message: Option<String> },

    #[error("request failed with status {status}")]
    HttpStatus {
        status: u16,
        message: Option<String>,
    },

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("credentials unavailable: {0}")]
    Credentials(String),
}

impl StorageError {
    /// A 404 without a server explanation.
    #[must_use]
    pub fn not_found() -> Self {
        Self::NotFound { message: None }
    }

    /// A 401 without a server explanation.
    #[must_use]
    pub fn unauthorized() -> Self {
        Self::Unauthorized { message: None }
    }

    /// HTTP status the error corresponds to, when it came from the server.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::NotFound { .. } => Some(404),
            Self::Unauthorized { .. } => Some(401),
            Self::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Message supplied by the server in the error body, if any.
    #[must_use]
    pub fn server_message(&self) -> Option<&str> {
        match self {
            Self::NotFound { message }
            | Self::Unauthorized { message }
            | Self::HttpStatus { message, .. } => message.as_deref(),
            _ => None,
        }
    }
}

/// Incremental progress posted for the signed-in user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressUpdate {
    pub requirement_id: RequirementId,
    pub cohort: Cohort,
    pub incremental_count: i64,
    pub incremental_minutes: i64,
}

//
// ─── REPOSITORY CONTRACTS ──────────────────────────────────────────────────────
//

#[async_trait]
pub trait RequirementRepository: Send + Sync {
    /// Fetch one page of the requirements that apply to a cohort.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the page cannot be retrieved.
    async fn list_requirements(
        &self,
        cohort: &Cohort,
        start_key: Option<String>,
    ) -> Result<Page<Requirement>, StorageError>;

    /// Fetch a single requirement by ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_requirement(&self, id: &RequirementId) -> Result<Requirement, StorageError>;
}

#[async_trait]
pub trait EventRepository: Send + Sync {
    /// Fetch one page of calendar events.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the page cannot be retrieved.
    async fn list_events(&self, start_key: Option<String>) -> Result<Page<Event>, StorageError>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Fetch the signed-in user.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Unauthorized` when nobody is signed in.
    async fn get_user(&self) -> Result<User, StorageError>;

    /// Fetch another user's public profile.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_user_public(&self, username: &Username) -> Result<User, StorageError>;

    /// Fetch one page of the members of a cohort.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the page cannot be retrieved.
    async fn list_users_by_cohort(
        &self,
        cohort: &Cohort,
        start_key: Option<String>,
    ) -> Result<Page<User>, StorageError>;

    /// Apply an increment to the signed-in user's progress and return the updated user.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the update is rejected.
    async fn update_progress(&self, update: &ProgressUpdate) -> Result<User, StorageError>;

    /// Replace one requirement's timeline slice for the signed-in user.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the update is rejected.
    async fn update_timeline(&self, update: &TimelineUpdate) -> Result<User, StorageError>;
}

#[async_trait]
pub trait GraduationRepository: Send + Sync {
    /// Fetch one page of graduations into a cohort.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the page cannot be retrieved.
    async fn list_graduations_by_cohort(
        &self,
        cohort: &Cohort,
        start_key: Option<String>,
    ) -> Result<Page<Graduation>, StorageError>;
}

//
// ─── IN-MEMORY BACKEND ─────────────────────────────────────────────────────────
//

const DEFAULT_PAGE_SIZE: usize = 25;

/// Simple in-memory repository implementation for testing and prototyping.
///
/// List endpoints paginate by key order with a configurable page size, so
/// callers exercise the same continuation-cursor loop as against the server.
#[derive(Clone)]
pub struct InMemoryRepository {
    requirements: Arc<Mutex<HashMap<RequirementId, Requirement>>>,
    events: Arc<Mutex<HashMap<EventId, Event>>>,
    users: Arc<Mutex<HashMap<Username, User>>>,
    graduations: Arc<Mutex<Vec<Graduation>>>,
    signed_in: Arc<Mutex<Option<Username>>>,
    page_requests: Arc<AtomicUsize>,
    page_size: usize,
    clock: Clock,
}

impl Default for InMemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self {
            requirements: Arc::new(Mutex::new(HashMap::new())),
            events: Arc::new(Mutex::new(HashMap::new())),
            users: Arc::new(Mutex::new(HashMap::new())),
            graduations: Arc::new(Mutex::new(Vec::new())),
            signed_in: Arc::new(Mutex::new(None)),
            page_requests: Arc::new(AtomicUsize::new(0)),
            page_size: DEFAULT_PAGE_SIZE,
            clock: Clock::default(),
        }
    }

    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Number of list pages served so far, across all endpoints.
    #[must_use]
    pub fn page_requests(&self) -> usize {
        self.page_requests.load(Ordering::SeqCst)
    }

    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the store lock is poisoned.
    pub fn insert_requirement(&self, requirement: Requirement) -> Result<(), StorageError> {
        lock(&self.requirements)?.insert(requirement.id.clone(), requirement);
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the store lock is poisoned.
    pub fn insert_event(&self, event: Event) -> Result<(), StorageError> {
        lock(&self.events)?.insert(event.id.clone(), event);
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the store lock is poisoned.
    pub fn insert_user(&self, user: User) -> Result<(), StorageError> {
        lock(&self.users)?.insert(user.username.clone(), user);
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the store lock is poisoned.
    pub fn insert_graduation(&self, graduation: Graduation) -> Result<(), StorageError> {
        lock(&self.graduations)?.push(graduation);
        Ok(())
    }

    /// Makes `username` the user behind `get_user` and the update calls.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the store lock is poisoned.
    pub fn sign_in(&self, username: Username) -> Result<(), StorageError> {
        *lock(&self.signed_in)? = Some(username);
        Ok(())
    }

    fn page<T>(&self, mut keyed: Vec<(String, T)>, start_key: Option<&str>) -> Page<T> {
        self.page_requests.fetch_add(1, Ordering::SeqCst);
        keyed.sort_by(|a, b| a.0.cmp(&b.0));
        let mut remaining = keyed
            .into_iter()
            .filter(|(key, _)| start_key.is_none_or(|start| key.as_str() > start))
            .peekable();

        let mut items = Vec::new();
        let mut last_key = None;
        while items.len() < self.page_size {
            let Some((key, item)) = remaining.next() else {
                break;
            };
            items.push(item);
            last_key = Some(key);
        }

        Page {
            items,
            last_evaluated_key: remaining.peek().and(last_key),
        }
    }

    // Resolve the signed-in user and the requirement, then mutate the stored
    // user in place.
    fn update_signed_in<F>(
        &self,
        requirement_id: &RequirementId,
        apply: F,
    ) -> Result<User, StorageError>
    where
        F: FnOnce(&mut User, &Requirement),
    {
        let username = lock(&self.signed_in)?
            .clone()
            .ok_or_else(StorageError::unauthorized)?;
        let requirement = lock(&self.requirements)?
            .get(requirement_id)
            .cloned()
            .ok_or_else(StorageError::not_found)?;
        let mut users = lock(&self.users)?;
        let user = users.get_mut(&username).ok_or_else(StorageError::not_found)?;
        apply(user, &requirement);
        Ok(user.clone())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, StorageError> {
    mutex
        .lock()
        .map_err(|e| StorageError::Connection(e.to_string()))
}

/// Counter a requirement's progress is recorded under: the global counter for
/// requirements with a global target, otherwise the cohort's own.
fn progress_key(requirement: &Requirement, cohort: &Cohort) -> ScoreKey {
    if requirement.counts.get(&ScoreKey::Global).is_some() {
        ScoreKey::Global
    } else {
        ScoreKey::Cohort(cohort.clone())
    }
}

fn progress_entry<'a>(user: &'a mut User, requirement: &Requirement) -> &'a mut RequirementProgress {
    user.progress
        .entry(requirement.id.clone())
        .or_insert_with(|| RequirementProgress::new(requirement.id.clone(), Counts::new()))
}

#[async_trait]
impl RequirementRepository for InMemoryRepository {
    async fn list_requirements(
        &self,
        cohort: &Cohort,
        start_key: Option<String>,
    ) -> Result<Page<Requirement>, StorageError> {
        let keyed = lock(&self.requirements)?
            .values()
            .filter(|r| r.applies_to(cohort))
            .map(|r| (r.id.as_str().to_owned(), r.clone()))
            .collect();
        Ok(self.page(keyed, start_key.as_deref()))
    }

    async fn get_requirement(&self, id: &RequirementId) -> Result<Requirement, StorageError> {
        lock(&self.requirements)?
            .get(id)
            .cloned()
            .ok_or_else(StorageError::not_found)
    }
}

#[async_trait]
impl EventRepository for InMemoryRepository {
    async fn list_events(&self, start_key: Option<String>) -> Result<Page<Event>, StorageError> {
        let keyed = lock(&self.events)?
            .values()
            .map(|e| (e.id.as_str().to_owned(), e.clone()))
            .collect();
        Ok(self.page(keyed, start_key.as_deref()))
    }
}

#[async_trait]
impl UserRepository for InMemoryRepository {
    async fn get_user(&self) -> Result<User, StorageError> {
        let username = lock(&self.signed_in)?
            .clone()
            .ok_or_else(StorageError::unauthorized)?;
        self.get_user_public(&username).await
    }

    async fn get_user_public(&self, username: &Username) -> Result<User, StorageError> {
        lock(&self.users)?
            .get(username)
            .cloned()
            .ok_or_else(StorageError::not_found)
    }

    async fn list_users_by_cohort(
        &self,
        cohort: &Cohort,
        start_key: Option<String>,
    ) -> Result<Page<User>, StorageError> {
        let keyed = lock(&self.users)?
            .values()
            .filter(|u| u.is_member_of(cohort))
            .map(|u| (u.username.as_str().to_owned(), u.clone()))
            .collect();
        Ok(self.page(keyed, start_key.as_deref()))
    }

    async fn update_progress(&self, update: &ProgressUpdate) -> Result<User, StorageError> {
        let now = self.clock.now();
        self.update_signed_in(&update.requirement_id, |user, requirement| {
            let key = progress_key(requirement, &update.cohort);
            let minutes_key = ScoreKey::Cohort(update.cohort.clone());

            let progress = progress_entry(user, requirement);
            let previous_count = progress.counts.get(&key).unwrap_or(0);
            let new_count = previous_count + update.incremental_count;
            let minutes = progress.minutes_spent.get(&minutes_key).unwrap_or(0);
            progress.counts.insert(key, new_count);
            progress
                .minutes_spent
                .insert(minutes_key, minutes + update.incremental_minutes);
            progress.updated_at = Some(now);

            user.timeline.push(TimelineEntry {
                requirement_id: requirement.id.clone(),
                requirement_name: requirement.name.clone(),
                requirement_category: requirement.category.clone(),
                cohort: update.cohort.clone(),
                previous_count,
                new_count,
                minutes_spent: update.incremental_minutes,
                created_at: now,
            });
        })
    }

    async fn update_timeline(&self, update: &TimelineUpdate) -> Result<User, StorageError> {
        let now = self.clock.now();
        self.update_signed_in(&update.requirement_id, |user, requirement| {
            user.timeline
                .retain(|entry| !entry.belongs_to(&update.requirement_id, &update.cohort));
            user.timeline.extend(update.entries.iter().cloned());

            let key = progress_key(requirement, &update.cohort);
            let progress = progress_entry(user, requirement);
            progress.counts.insert(key, update.total_count);
            progress
                .minutes_spent
                .insert(update.cohort.clone(), update.total_minutes);
            progress.updated_at = Some(now);
        })
    }
}

#[async_trait]
impl GraduationRepository for InMemoryRepository {
    async fn list_graduations_by_cohort(
        &self,
        cohort: &Cohort,
        start_key: Option<String>,
    ) -> Result<Page<Graduation>, StorageError> {
        let keyed = lock(&self.graduations)?
            .iter()
            .filter(|g| &g.new_cohort == cohort)
            .map(|g| (g.username.as_str().to_owned(), g.clone()))
            .collect();
        Ok(self.page(keyed, start_key.as_deref()))
    }
}

/// Aggregates the repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub requirements: Arc<dyn RequirementRepository>,
    pub events: Arc<dyn EventRepository>,
    pub users: Arc<dyn UserRepository>,
    pub graduations: Arc<dyn GraduationRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_repository(InMemoryRepository::new())
    }

    /// Uses one backend for every repository.
    #[must_use]
    pub fn from_repository<R>(repo: R) -> Self
    where
        R: RequirementRepository
            + EventRepository
            + UserRepository
            + GraduationRepository
            + Clone
            + 'static,
    {
        let requirements: Arc<dyn RequirementRepository> = Arc::new(repo.clone());
        let events: Arc<dyn EventRepository> = Arc::new(repo.clone());
        let users: Arc<dyn UserRepository> = Arc::new(repo.clone());
        let graduations: Arc<dyn GraduationRepository> = Arc::new(repo);
        Self {
            requirements,
            events,
            users,
            graduations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tracker_core::model::{Counts, ScoreboardDisplay};
    use tracker_core::time::{fixed_clock, fixed_now};

    fn cohort(name: &str) -> Cohort {
        Cohort::new(name).unwrap()
    }

    fn seeded() -> InMemoryRepository {
        let repo = InMemoryRepository::new()
            .with_page_size(2)
            .with_clock(fixed_clock());
        repo.insert_requirement(Requirement::new(
            "global",
            "Read a book",
            "Opening",
            ScoreboardDisplay::ProgressBar,
            Counts::global(3),
        ))
        .unwrap();
        repo.insert_requirement(Requirement::new(
            "games",
            "Play games",
            "Games + Analysis",
            ScoreboardDisplay::ProgressBar,
            Counts::new().with(cohort("1500-1600"), 10),
        ))
        .unwrap();
        let user = User::new("alice", "Alice", cohort("1500-1600"));
        repo.insert_user(user).unwrap();
        repo.sign_in(Username::new("alice")).unwrap();
        repo
    }

    #[tokio::test]
    async fn lists_paginate_in_key_order() {
        let repo = InMemoryRepository::new().with_page_size(2);
        for name in ["c", "a", "d", "b", "e"] {
            repo.insert_user(User::new(name, name, cohort("0-300"))).unwrap();
        }
        repo.insert_user(User::new("z", "z", cohort("300-400"))).unwrap();

        let first = repo.list_users_by_cohort(&cohort("0-300"), None).await.unwrap();
        assert_eq!(first.items.len(), 2);
        assert_eq!(first.next_key(), Some("b"));

        let second = repo
            .list_users_by_cohort(&cohort("0-300"), Some("b".into()))
            .await
            .unwrap();
        let third = repo
            .list_users_by_cohort(&cohort("0-300"), second.last_evaluated_key.clone())
            .await
            .unwrap();
        assert_eq!(third.items.len(), 1);
        assert_eq!(third.items[0].username.as_str(), "e");
        assert_eq!(third.next_key(), None);
        assert_eq!(repo.page_requests(), 3);
    }

    #[tokio::test]
    async fn members_without_a_cohort_are_not_listed() {
        let repo = InMemoryRepository::new();
        repo.insert_user(User::new("a", "A", cohort("0-300"))).unwrap();
        let mut pending = User::new("new", "New", cohort("0-300"));
        pending.dojo_cohort = None;
        repo.insert_user(pending).unwrap();
        repo.sign_in(Username::new("new")).unwrap();

        let page = repo.list_users_by_cohort(&cohort("0-300"), None).await.unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(repo.get_user().await.unwrap().dojo_cohort, None);
    }

    #[tokio::test]
    async fn requirement_listing_applies_cohort_filter() {
        let repo = seeded();
        let page = repo
            .list_requirements(&cohort("0-300"), None)
            .await
            .unwrap();
        let ids: Vec<_> = page.items.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["global"]);
    }

    #[tokio::test]
    async fn progress_goes_to_global_counter_when_target_is_global() {
        let repo = seeded();
        let update = ProgressUpdate {
            requirement_id: RequirementId::new("global"),
            cohort: cohort("1500-1600"),
            incremental_count: 2,
            incremental_minutes: 45,
        };
        repo.update_progress(&update).await.unwrap();
        let user = repo.update_progress(&update).await.unwrap();

        let progress = &user.progress[&RequirementId::new("global")];
        assert_eq!(progress.counts.get(&ScoreKey::Global), Some(4));
        assert_eq!(progress.minutes_spent.resolve(&cohort("1500-1600")), Some(90));
        assert_eq!(user.timeline.len(), 2);
        assert_eq!(user.timeline[1].previous_count, 2);
        assert_eq!(user.timeline[1].new_count, 4);
        assert_eq!(user.timeline[1].created_at, fixed_now());
    }

    #[tokio::test]
    async fn timeline_update_replaces_only_its_slice() {
        let repo = seeded();
        let games = RequirementId::new("games");
        for cohort_name in ["1500-1600", "1400-1500"] {
            repo.update_progress(&ProgressUpdate {
                requirement_id: games.clone(),
                cohort: cohort(cohort_name),
                incremental_count: 1,
                incremental_minutes: 10,
            })
            .await
            .unwrap();
        }

        let entry = TimelineEntry {
            requirement_id: games.clone(),
            requirement_name: "Play games".into(),
            requirement_category: "Games + Analysis".into(),
            cohort: cohort("1500-1600"),
            previous_count: 0,
            new_count: 6,
            minutes_spent: 30,
            created_at: fixed_now() - Duration::days(1),
        };
        let user = repo
            .update_timeline(&TimelineUpdate {
                requirement_id: games.clone(),
                cohort: cohort("1500-1600"),
                entries: vec![entry.clone()],
                total_count: 6,
                total_minutes: 30,
            })
            .await
            .unwrap();

        assert_eq!(user.timeline.len(), 2);
        assert!(user.timeline.contains(&entry));
        assert!(user.timeline.iter().any(|e| e.cohort == cohort("1400-1500")));
        let progress = &user.progress[&games];
        assert_eq!(progress.counts.resolve(&cohort("1500-1600")), Some(6));
        assert_eq!(progress.counts.resolve(&cohort("1400-1500")), Some(1));
        assert_eq!(progress.minutes_spent.resolve(&cohort("1500-1600")), Some(30));
    }

    #[tokio::test]
    async fn updates_require_a_signed_in_user() {
        let repo = InMemoryRepository::new();
        assert!(matches!(repo.get_user().await, Err(StorageError::Unauthorized { .. })));

        let repo = seeded();
        let missing = ProgressUpdate {
            requirement_id: RequirementId::new("nope"),
            cohort: cohort("1500-1600"),
            incremental_count: 1,
            incremental_minutes: 0,
        };
        assert!(matches!(
            repo.update_progress(&missing).await,
            Err(StorageError::NotFound { .. })
        ));
    }

    #[test]
    fn storage_errors_expose_status() {
        let err = StorageError::HttpStatus {
            status: 500,
            message: Some("boom".into()),
        };
        assert_eq!(err.status(), Some(500));
        assert_eq!(err.server_message(), Some("boom"));
        assert_eq!(StorageError::unauthorized().status(), Some(401));
        assert_eq!(StorageError::Connection("x".into()).status(), None);
    }
}
