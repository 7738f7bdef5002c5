//! One request tracker per query partition.
//!
//! Switching the selected partition leaves the old tracker alone; its fetch
//! still resolves, but the result is recognised as belonging to a partition
//! the view no longer shows. Forgetting a partition makes any fetch still in
//! flight for it stale.

use std::collections::HashMap;
use std::hash::Hash;

use crate::request::{AsyncOperation, RequestError, RequestStatus};

/// Handed out when a fetch starts; identifies that particular fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket<P> {
    partition: P,
    epoch: u64,
}

impl<P> Ticket<P> {
    #[must_use]
    pub fn partition(&self) -> &P {
        &self.partition
    }
}

#[derive(Debug, Default)]
struct Tracked {
    epoch: u64,
    operation: AsyncOperation<()>,
}

#[derive(Debug)]
pub struct PartitionRequests<P> {
    requests: HashMap<P, Tracked>,
    current: Option<P>,
    next_epoch: u64,
}

impl<P> Default for PartitionRequests<P> {
    fn default() -> Self {
        Self {
            requests: HashMap::new(),
            current: None,
            next_epoch: 0,
        }
    }
}

impl<P: Clone + Eq + Hash> PartitionRequests<P> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `partition` the one the view shows. Returns whether it changed.
    pub fn select(&mut self, partition: P) -> bool {
        if self.current.as_ref() == Some(&partition) {
            return false;
        }
        self.current = Some(partition);
        true
    }

    #[must_use]
    pub fn current(&self) -> Option<&P> {
        self.current.as_ref()
    }

    /// True for the selected partition, or for any partition when none is selected.
    #[must_use]
    pub fn is_current(&self, partition: &P) -> bool {
        self.current.as_ref().is_none_or(|c| c == partition)
    }

    #[must_use]
    pub fn operation(&self, partition: &P) -> Option<&AsyncOperation<()>> {
        self.requests.get(partition).map(|t| &t.operation)
    }

    #[must_use]
    pub fn status(&self, partition: &P) -> RequestStatus {
        self.operation(partition)
            .map_or(RequestStatus::NotSent, AsyncOperation::status)
    }

    #[must_use]
    pub fn is_loading(&self, partition: &P) -> bool {
        self.operation(partition)
            .is_some_and(AsyncOperation::is_loading)
    }

    /// Starts tracking a fetch, unless one is already in flight for the partition.
    pub fn begin(&mut self, partition: P) -> Option<Ticket<P>> {
        if self.is_loading(&partition) {
            return None;
        }
        self.next_epoch += 1;
        let tracked = self.requests.entry(partition.clone()).or_default();
        tracked.epoch = self.next_epoch;
        tracked.operation.start();
        Some(Ticket {
            partition,
            epoch: self.next_epoch,
        })
    }

    /// True while the ticket belongs to the partition's latest fetch.
    #[must_use]
    pub fn is_live(&self, ticket: &Ticket<P>) -> bool {
        self.requests
            .get(&ticket.partition)
            .is_some_and(|t| t.epoch == ticket.epoch)
    }

    /// Records success for a live ticket. Returns `false` for a stale one.
    pub fn succeed(&mut self, ticket: &Ticket<P>) -> bool {
        match self.live_mut(ticket) {
            Some(operation) => {
                operation.succeed(());
                true
            }
            None => false,
        }
    }

    /// Records failure for a live ticket. Returns `false` for a stale one.
    pub fn fail(&mut self, ticket: &Ticket<P>, error: RequestError) -> bool {
        match self.live_mut(ticket) {
            Some(operation) => {
                operation.fail(error);
                true
            }
            None => false,
        }
    }

    /// Drops the partition's tracker. A fetch still in flight becomes stale.
    pub fn forget(&mut self, partition: &P) {
        self.requests.remove(partition);
    }

    fn live_mut(&mut self, ticket: &Ticket<P>) -> Option<&mut AsyncOperation<()>> {
        self.requests
            .get_mut(&ticket.partition)
            .filter(|t| t.epoch == ticket.epoch)
            .map(|t| &mut t.operation)
    }
}
