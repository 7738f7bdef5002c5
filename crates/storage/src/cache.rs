//! In-memory entity cache with partition-level freshness tracking.
//!
//! One `EntityCache` exists per entity kind. Items are upserted by key; a
//! partition (usually a cohort) is only marked fetched once every page of its
//! query has been merged, see [`EntityCache::merge_partition`].

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::hash::Hash;

use tracker_core::model::{Cohort, Event, EventId, Requirement, RequirementId, User, Username};

/// An entity that knows its own cache key.
pub trait Keyed {
    type Key: Clone + Eq + Hash;

    fn key(&self) -> Self::Key;
}

impl Keyed for Requirement {
    type Key = RequirementId;

    fn key(&self) -> Self::Key {
        self.id.clone()
    }
}

impl Keyed for Event {
    type Key = EventId;

    fn key(&self) -> Self::Key {
        self.id.clone()
    }
}

impl Keyed for User {
    type Key = Username;

    fn key(&self) -> Self::Key {
        self.username.clone()
    }
}

/// Keyed store plus the set of partitions known to be exhaustively fetched.
pub struct EntityCache<V: Keyed, P = Cohort> {
    items: HashMap<V::Key, V>,
    fetched: HashSet<P>,
}

impl<V: Keyed, P: Eq + Hash> Default for EntityCache<V, P> {
    fn default() -> Self {
        Self {
            items: HashMap::new(),
            fetched: HashSet::new(),
        }
    }
}

impl<V: Keyed, P: Eq + Hash> EntityCache<V, P> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, key: &V::Key) -> Option<&V> {
        self.items.get(key)
    }

    /// Upserts one value. Partition marks are left untouched.
    pub fn put(&mut self, value: V) {
        self.items.insert(value.key(), value);
    }

    /// Upserts many values; last write wins per key.
    pub fn put_many(&mut self, values: impl IntoIterator<Item = V>) {
        for value in values {
            self.put(value);
        }
    }

    #[must_use]
    pub fn is_fetched(&self, partition: &P) -> bool {
        self.fetched.contains(partition)
    }

    /// Marks a partition as exhaustively retrieved. Idempotent.
    pub fn mark_fetched(&mut self, partition: P) {
        self.fetched.insert(partition);
    }

    /// Merges the complete result of a partition query and marks it fetched.
    pub fn merge_partition(&mut self, partition: P, values: impl IntoIterator<Item = V>) {
        self.put_many(values);
        self.mark_fetched(partition);
    }

    /// Unmarks a partition so the next read refetches it.
    ///
    /// Items stay cached; returns whether the partition had been marked.
    pub fn invalidate(&mut self, partition: &P) -> bool {
        self.fetched.remove(partition)
    }

    pub fn invalidate_all(&mut self) {
        self.fetched.clear();
    }

    /// Filtered, sorted view recomputed on every call.
    pub fn list<F, C>(&self, mut filter: F, mut compare: C) -> Vec<&V>
    where
        F: FnMut(&V) -> bool,
        C: FnMut(&V, &V) -> Ordering,
    {
        let mut values: Vec<&V> = self.items.values().filter(|v| filter(*v)).collect();
        values.sort_by(|a, b| compare(a, b));
        values
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracker_core::model::{Counts, ScoreboardDisplay};
    use tracker_core::score::compare_requirements;

    fn cohort(name: &str) -> Cohort {
        Cohort::new(name).unwrap()
    }

    fn requirement(id: &str, name: &str, counts: Counts) -> Requirement {
        Requirement::new(id, name, "Tactics", ScoreboardDisplay::ProgressBar, counts)
    }

    #[test]
    fn put_many_is_idempotent() {
        let payload = vec![
            requirement("a", "A", Counts::global(1)),
            requirement("b", "B", Counts::global(2)),
        ];
        let mut once: EntityCache<Requirement> = EntityCache::new();
        once.put_many(payload.clone());

        let mut twice: EntityCache<Requirement> = EntityCache::new();
        twice.put_many(payload.clone());
        twice.put_many(payload);

        assert_eq!(once.len(), 2);
        assert_eq!(twice.len(), 2);
        for id in ["a", "b"] {
            let key = RequirementId::new(id);
            assert_eq!(once.get(&key), twice.get(&key));
        }
    }

    #[test]
    fn put_does_not_mark_partitions() {
        let mut cache: EntityCache<Requirement> = EntityCache::new();
        cache.put(requirement("a", "A", Counts::global(1)));
        assert!(!cache.is_fetched(&cohort("A")));
    }

    #[test]
    fn last_write_wins() {
        let mut cache: EntityCache<Requirement> = EntityCache::new();
        cache.put(requirement("a", "Old", Counts::global(1)));
        cache.put(requirement("a", "New", Counts::global(1)));
        assert_eq!(cache.get(&RequirementId::new("a")).unwrap().name, "New");
    }

    #[test]
    fn merge_marks_and_invalidate_unmarks() {
        let mut cache: EntityCache<Requirement> = EntityCache::new();
        cache.merge_partition(cohort("A"), vec![requirement("a", "A", Counts::global(1))]);
        assert!(cache.is_fetched(&cohort("A")));

        assert!(cache.invalidate(&cohort("A")));
        assert!(!cache.is_fetched(&cohort("A")));
        assert!(!cache.invalidate(&cohort("A")));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn list_recomputes_filter_and_order() {
        let mut cache: EntityCache<Requirement> = EntityCache::new();
        cache.put_many(vec![
            requirement("b", "Beta", Counts::new().with(cohort("A"), 1)),
            requirement("a", "Alpha", Counts::global(1)),
            requirement("c", "Gamma", Counts::new().with(cohort("B"), 1)),
        ]);
        let a = cohort("A");
        let names: Vec<&str> = cache
            .list(|r| r.applies_to(&a), compare_requirements)
            .iter()
            .map(|r| r.name.as_str())
            .collect();
        assert_eq!(names, vec!["Alpha", "Beta"]);

        cache.put(requirement("d", "Delta", Counts::new().with(cohort("A"), 1)));
        assert_eq!(cache.list(|r| r.applies_to(&a), compare_requirements).len(), 3);
    }
}
