//! Partition loading on top of an [`EntityCache`].
//!
//! A [`PartitionedLoader`] owns one cache and the per-partition request
//! trackers. [`PartitionedLoader::ensure`] starts at most one fetch per
//! partition, follows every page, and only then merges the result and marks
//! the partition fetched.

use std::cmp::Ordering;
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use storage::{EntityCache, Keyed, Page, StorageError, collect_pages};

use crate::error::ServiceError;
use crate::partition::PartitionRequests;
use crate::request::{RequestError, RequestStatus};

/// What [`PartitionedLoader::ensure`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The partition was already fetched; nothing was requested.
    Cached,
    /// Another fetch for the partition is outstanding; nothing was requested.
    InFlight,
    /// Every page was merged and the partition is now fetched.
    Loaded { items: usize },
    /// Merged, but the view had moved to another partition meanwhile.
    Abandoned { items: usize },
    /// The partition was invalidated mid-fetch; items were upserted but the
    /// partition stays unfetched.
    Superseded,
}

struct LoaderState<V: Keyed, P> {
    cache: EntityCache<V, P>,
    requests: PartitionRequests<P>,
}

pub struct PartitionedLoader<V: Keyed, P> {
    kind: &'static str,
    state: Mutex<LoaderState<V, P>>,
}

impl<V, P> PartitionedLoader<V, P>
where
    V: Keyed + Clone,
    P: Clone + Eq + Hash + fmt::Debug,
{
    /// `kind` names the entity in log output.
    #[must_use]
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            state: Mutex::new(LoaderState {
                cache: EntityCache::new(),
                requests: PartitionRequests::new(),
            }),
        }
    }

    // Cache mutations are idempotent upserts, so a poisoned lock is still usable.
    fn state(&self) -> MutexGuard<'_, LoaderState<V, P>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Makes `partition` the one whose results the view shows.
    pub fn select(&self, partition: P) -> bool {
        let changed = self.state().requests.select(partition.clone());
        if changed {
            debug!(kind = self.kind, ?partition, "partition selected");
        }
        changed
    }

    #[must_use]
    pub fn current(&self) -> Option<P> {
        self.state().requests.current().cloned()
    }

    /// Fetches `partition` unless it is already fetched or being fetched.
    ///
    /// `fetch` is called once per page with the continuation cursor.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Storage` when any page fails. The partition's
    /// tracker records the failure and nothing is merged.
    pub async fn ensure<F, Fut>(&self, partition: P, fetch: F) -> Result<LoadOutcome, ServiceError>
    where
        F: FnMut(Option<String>) -> Fut,
        Fut: Future<Output = Result<Page<V>, StorageError>>,
    {
        let ticket = {
            let mut state = self.state();
            if state.cache.is_fetched(&partition) {
                return Ok(LoadOutcome::Cached);
            }
            match state.requests.begin(partition.clone()) {
                Some(ticket) => ticket,
                None => {
                    debug!(kind = self.kind, ?partition, "fetch already in flight");
                    return Ok(LoadOutcome::InFlight);
                }
            }
        };

        debug!(kind = self.kind, ?partition, "fetching partition");
        let result = collect_pages(fetch).await;

        let mut state = self.state();
        match result {
            Ok(items) => {
                let count = items.len();
                if !state.requests.succeed(&ticket) {
                    debug!(kind = self.kind, ?partition, "partition invalidated during fetch");
                    state.cache.put_many(items);
                    return Ok(LoadOutcome::Superseded);
                }
                state.cache.merge_partition(partition.clone(), items);
                if state.requests.is_current(&partition) {
                    info!(kind = self.kind, ?partition, items = count, "partition loaded");
                    Ok(LoadOutcome::Loaded { items: count })
                } else {
                    debug!(kind = self.kind, ?partition, "result for abandoned partition");
                    Ok(LoadOutcome::Abandoned { items: count })
                }
            }
            Err(err) => {
                warn!(kind = self.kind, ?partition, error = %err, "partition fetch failed");
                state.requests.fail(&ticket, RequestError::from(&err));
                Err(err.into())
            }
        }
    }

    #[must_use]
    pub fn is_fetched(&self, partition: &P) -> bool {
        self.state().cache.is_fetched(partition)
    }

    #[must_use]
    pub fn status(&self, partition: &P) -> RequestStatus {
        self.state().requests.status(partition)
    }

    /// Last recorded failure for the partition, if its latest fetch failed.
    #[must_use]
    pub fn error(&self, partition: &P) -> Option<RequestError> {
        self.state()
            .requests
            .operation(partition)
            .and_then(|op| op.error().cloned())
    }

    /// Forces the next `ensure` for `partition` to refetch.
    ///
    /// Cached items stay readable until the refetch replaces them.
    pub fn invalidate(&self, partition: &P) -> bool {
        let mut state = self.state();
        state.requests.forget(partition);
        let was_fetched = state.cache.invalidate(partition);
        debug!(kind = self.kind, ?partition, was_fetched, "partition invalidated");
        was_fetched
    }

    #[must_use]
    pub fn get(&self, key: &V::Key) -> Option<V> {
        self.state().cache.get(key).cloned()
    }

    pub fn put(&self, value: V) {
        self.state().cache.put(value);
    }

    /// Filtered, sorted snapshot of the cached items.
    pub fn list<F, C>(&self, filter: F, compare: C) -> Vec<V>
    where
        F: FnMut(&V) -> bool,
        C: FnMut(&V, &V) -> Ordering,
    {
        self.state()
            .cache
            .list(filter, compare)
            .into_iter()
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
    use tracker_core::model::{Cohort, Counts, Requirement, ScoreboardDisplay};

    fn cohort(name: &str) -> Cohort {
        Cohort::new(name).unwrap()
    }

    fn requirement(id: &str) -> Requirement {
        Requirement::new(id, id, "Tactics", ScoreboardDisplay::Checkbox, Counts::global(1))
    }

    fn two_pages(
        calls: &AtomicUsize,
        start_key: Option<String>,
    ) -> impl Future<Output = Result<Page<Requirement>, StorageError>> {
        calls.fetch_add(1, AtomicOrdering::SeqCst);
        let page = match start_key {
            None => Page {
                items: vec![requirement("a")],
                last_evaluated_key: Some("a".into()),
            },
            Some(_) => Page::last(vec![requirement("b")]),
        };
        async move {
            tokio::task::yield_now().await;
            Ok(page)
        }
    }

    #[tokio::test]
    async fn concurrent_ensures_start_one_fetch() {
        let loader: PartitionedLoader<Requirement, Cohort> = PartitionedLoader::new("requirements");
        let calls = AtomicUsize::new(0);
        let p = cohort("1500-1600");

        let (first, second) = tokio::join!(
            loader.ensure(p.clone(), |key| two_pages(&calls, key)),
            loader.ensure(p.clone(), |key| two_pages(&calls, key)),
        );

        let outcomes = [first.unwrap(), second.unwrap()];
        assert!(outcomes.contains(&LoadOutcome::Loaded { items: 2 }));
        assert!(outcomes.contains(&LoadOutcome::InFlight));
        assert_eq!(calls.load(AtomicOrdering::SeqCst), 2);
        assert!(loader.is_fetched(&p));
        assert_eq!(loader.status(&p), RequestStatus::Success);

        let again = loader
            .ensure(p.clone(), |key| two_pages(&calls, key))
            .await
            .unwrap();
        assert_eq!(again, LoadOutcome::Cached);
        assert_eq!(calls.load(AtomicOrdering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failure_is_recorded_and_nothing_is_marked() {
        let loader: PartitionedLoader<Requirement, Cohort> = PartitionedLoader::new("requirements");
        let p = cohort("0-300");
        let result = loader
            .ensure(p.clone(), |key| async move {
                match key {
                    None => Ok(Page {
                        items: vec![requirement("a")],
                        last_evaluated_key: Some("a".into()),
                    }),
                    Some(_) => Err(StorageError::HttpStatus {
                        status: 500,
                        message: Some("db down".into()),
                    }),
                }
            })
            .await;

        assert!(matches!(result, Err(ServiceError::Storage(_))));
        assert!(!loader.is_fetched(&p));
        assert!(loader.get(&requirement("a").id).is_none());
        assert_eq!(loader.status(&p), RequestStatus::Failure);
        assert_eq!(
            loader.error(&p).and_then(|e| e.server_message().map(str::to_owned)),
            Some("db down".to_owned())
        );
    }

    #[tokio::test]
    async fn switching_partition_abandons_the_old_result() {
        let loader: PartitionedLoader<Requirement, Cohort> = PartitionedLoader::new("requirements");
        let old = cohort("0-300");
        loader.select(old.clone());

        let outcome = loader
            .ensure(old.clone(), |_| {
                // the user switches cohort while the request is outstanding
                loader.select(cohort("300-400"));
                async { Ok(Page::last(vec![requirement("a")])) }
            })
            .await
            .unwrap();

        assert_eq!(outcome, LoadOutcome::Abandoned { items: 1 });
        assert!(loader.is_fetched(&old));
        assert_eq!(loader.current(), Some(cohort("300-400")));
    }

    #[tokio::test]
    async fn invalidation_mid_fetch_keeps_partition_unfetched() {
        let loader: PartitionedLoader<Requirement, Cohort> = PartitionedLoader::new("requirements");
        let p = cohort("0-300");

        let outcome = loader
            .ensure(p.clone(), |_| {
                loader.invalidate(&cohort("0-300"));
                async { Ok(Page::last(vec![requirement("a")])) }
            })
            .await
            .unwrap();

        assert_eq!(outcome, LoadOutcome::Superseded);
        assert!(!loader.is_fetched(&p));
        assert!(loader.get(&requirement("a").id).is_some());
        assert_eq!(loader.status(&p), RequestStatus::NotSent);
    }
}
