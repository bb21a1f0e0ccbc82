//! Operation outcome observation.
//!
//! Every engine operation reports a tagged outcome through a
//! [`CacheObserver`]. The default observer is a no-op; [`CacheStatistics`]
//! aggregates outcomes into atomic counters.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GetOutcome {
    Hit,
    Miss,
    Failure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    Put,
    Noop,
    Failure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    Success,
    Noop,
    Failure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutIfAbsentOutcome {
    Put,
    Hit,
    Failure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionalRemoveOutcome {
    Success,
    FailureKeyPresent,
    FailureKeyMissing,
    Failure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplaceOutcome {
    Hit,
    MissPresent,
    MissNotPresent,
    Failure,
}

/// Sink for operation outcomes. All methods default to no-ops.
pub trait CacheObserver: Send + Sync {
    fn get(&self, _outcome: GetOutcome) {}
    fn put(&self, _outcome: PutOutcome) {}
    fn remove(&self, _outcome: RemoveOutcome) {}
    fn put_if_absent(&self, _outcome: PutIfAbsentOutcome) {}
    fn conditional_remove(&self, _outcome: ConditionalRemoveOutcome) {}
    fn replace(&self, _outcome: ReplaceOutcome) {}
    fn get_all(&self, _hits: u64, _misses: u64) {}
    fn put_all(&self, _installed: u64) {}
    fn remove_all(&self, _removed: u64) {}
}

/// Observer that discards every outcome.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl CacheObserver for NoopObserver {}

impl<T: CacheObserver + ?Sized> CacheObserver for std::sync::Arc<T> {
    fn get(&self, outcome: GetOutcome) {
        (**self).get(outcome)
    }

    fn put(&self, outcome: PutOutcome) {
        (**self).put(outcome)
    }

    fn remove(&self, outcome: RemoveOutcome) {
        (**self).remove(outcome)
    }

    fn put_if_absent(&self, outcome: PutIfAbsentOutcome) {
        (**self).put_if_absent(outcome)
    }

    fn conditional_remove(&self, outcome: ConditionalRemoveOutcome) {
        (**self).conditional_remove(outcome)
    }

    fn replace(&self, outcome: ReplaceOutcome) {
        (**self).replace(outcome)
    }

    fn get_all(&self, hits: u64, misses: u64) {
        (**self).get_all(hits, misses)
    }

    fn put_all(&self, installed: u64) {
        (**self).put_all(installed)
    }

    fn remove_all(&self, removed: u64) {
        (**self).remove_all(removed)
    }
}

/// Atomic outcome counters.
///
/// Counters are updated with relaxed ordering; readers get values that are
/// individually accurate but not a consistent cross-counter snapshot.
#[derive(Debug, Default)]
pub struct CacheStatistics {
    hits: AtomicU64,
    misses: AtomicU64,
    puts: AtomicU64,
    removals: AtomicU64,
    failures: AtomicU64,
}

impl CacheStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn puts(&self) -> u64 {
        self.puts.load(Ordering::Relaxed)
    }

    pub fn removals(&self) -> u64 {
        self.removals.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    fn add(counter: &AtomicU64, amount: u64) {
        counter.fetch_add(amount, Ordering::Relaxed);
    }
}

impl CacheObserver for CacheStatistics {
    fn get(&self, outcome: GetOutcome) {
        match outcome {
            GetOutcome::Hit => Self::add(&self.hits, 1),
            GetOutcome::Miss => Self::add(&self.misses, 1),
            GetOutcome::Failure => Self::add(&self.failures, 1),
        }
    }

    fn put(&self, outcome: PutOutcome) {
        match outcome {
            PutOutcome::Put => Self::add(&self.puts, 1),
            PutOutcome::Noop => {}
            PutOutcome::Failure => Self::add(&self.failures, 1),
        }
    }

    fn remove(&self, outcome: RemoveOutcome) {
        match outcome {
            RemoveOutcome::Success => Self::add(&self.removals, 1),
            RemoveOutcome::Noop => {}
            RemoveOutcome::Failure => Self::add(&self.failures, 1),
        }
    }

    fn put_if_absent(&self, outcome: PutIfAbsentOutcome) {
        match outcome {
            PutIfAbsentOutcome::Put => Self::add(&self.puts, 1),
            PutIfAbsentOutcome::Hit => Self::add(&self.hits, 1),
            PutIfAbsentOutcome::Failure => Self::add(&self.failures, 1),
        }
    }

    fn conditional_remove(&self, outcome: ConditionalRemoveOutcome) {
        match outcome {
            ConditionalRemoveOutcome::Success => Self::add(&self.removals, 1),
            ConditionalRemoveOutcome::FailureKeyPresent
            | ConditionalRemoveOutcome::FailureKeyMissing => {}
            ConditionalRemoveOutcome::Failure => Self::add(&self.failures, 1),
        }
    }

    fn replace(&self, outcome: ReplaceOutcome) {
        match outcome {
            ReplaceOutcome::Hit => Self::add(&self.puts, 1),
            ReplaceOutcome::MissPresent | ReplaceOutcome::MissNotPresent => {}
            ReplaceOutcome::Failure => Self::add(&self.failures, 1),
        }
    }

    fn get_all(&self, hits: u64, misses: u64) {
        Self::add(&self.hits, hits);
        Self::add(&self.misses, misses);
    }

    fn put_all(&self, installed: u64) {
        Self::add(&self.puts, installed);
    }

    fn remove_all(&self, removed: u64) {
        Self::add(&self.removals, removed);
    }
}
