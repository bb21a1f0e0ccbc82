//! Crate-wide error taxonomy.
//!
//! Loader and writer failures are reference-counted (`SourceError`) so a
//! single cause can be recorded in a per-call record, carried through the
//! store's compute channel, and surfaced to the caller as one chain.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::cache::LifecycleError;

/// Boxed failure as produced by loader/writer and store implementations.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Shared failure cause, cloneable across the record and the error channel.
pub type SourceError = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// A loader/writer failure carried through the store's compute boundary.
///
/// Compute closures return this on their `Err` channel instead of raising
/// through the store; the store hands the variant back to the engine
/// untouched, so the failure category is already on the returned value.
#[derive(Debug, Clone)]
pub enum SourceFault {
    /// The loader failed while producing a value.
    Loading(SourceError),
    /// The writer failed while absorbing a mutation.
    Writing(SourceError),
}

impl SourceFault {
    pub fn loading(cause: BoxError) -> Self {
        SourceFault::Loading(Arc::from(cause))
    }

    pub fn writing(cause: BoxError) -> Self {
        SourceFault::Writing(Arc::from(cause))
    }

    /// The underlying cause, regardless of category.
    pub fn cause(&self) -> &SourceError {
        match self {
            SourceFault::Loading(cause) | SourceFault::Writing(cause) => cause,
        }
    }
}

impl fmt::Display for SourceFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceFault::Loading(cause) => write!(f, "loader failure: {}", cause),
            SourceFault::Writing(cause) => write!(f, "writer failure: {}", cause),
        }
    }
}

/// Failure raised by the storage tier itself.
///
/// Never surfaced raw to callers: the engine always routes it through the
/// resilience strategy, except for the diagnostic [`Rethrow`] variant whose
/// cause the strategy's error filter passes straight through.
///
/// [`Rethrow`]: StoreAccessError::Rethrow
#[derive(Debug, Error, Clone)]
pub enum StoreAccessError {
    #[error("store access failure: {0}")]
    Failure(#[source] SourceError),
    /// Diagnostic variant used by failure injection; recovery is skipped
    /// and the wrapped cause reaches the caller unchanged.
    #[error("rethrowing store access failure: {0}")]
    Rethrow(#[source] SourceError),
}

impl StoreAccessError {
    pub fn new(cause: BoxError) -> Self {
        StoreAccessError::Failure(Arc::from(cause))
    }

    pub fn rethrowing(cause: BoxError) -> Self {
        StoreAccessError::Rethrow(Arc::from(cause))
    }

    pub fn cause(&self) -> &SourceError {
        match self {
            StoreAccessError::Failure(cause) | StoreAccessError::Rethrow(cause) => cause,
        }
    }
}

/// Per-key outcome payload of a failed bulk load.
#[derive(Debug, Clone)]
pub struct BulkLoadFailure<K, V> {
    /// Values obtained before or despite the failure (explicit `None` for
    /// keys the source reported as missing).
    pub successes: HashMap<K, Option<V>>,
    /// Keys that could not be loaded, with their causes.
    pub failures: HashMap<K, SourceError>,
}

impl<K, V> Default for BulkLoadFailure<K, V> {
    fn default() -> Self {
        Self {
            successes: HashMap::new(),
            failures: HashMap::new(),
        }
    }
}

impl<K, V> fmt::Display for BulkLoadFailure<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "bulk load failure: {} keys failed, {} succeeded",
            self.failures.len(),
            self.successes.len()
        )
    }
}

/// Per-key outcome payload of a failed bulk write or delete.
#[derive(Debug, Clone)]
pub struct BulkWriteFailure<K> {
    /// Keys whose mutation reached the source.
    pub successes: HashSet<K>,
    /// Keys whose mutation failed, with their causes.
    pub failures: HashMap<K, SourceError>,
}

impl<K> Default for BulkWriteFailure<K> {
    fn default() -> Self {
        Self {
            successes: HashSet::new(),
            failures: HashMap::new(),
        }
    }
}

impl<K> fmt::Display for BulkWriteFailure<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "bulk write failure: {} keys failed, {} succeeded",
            self.failures.len(),
            self.successes.len()
        )
    }
}

/// Failure surfaced by cache operations.
#[derive(Debug, Error)]
pub enum CacheError<K, V> {
    /// The operation was invoked while the cache was not available.
    #[error("lifecycle violation: {0}")]
    Lifecycle(#[from] LifecycleError),
    /// The external source could not produce a value.
    #[error("loading failed: {0}")]
    Loading(#[source] SourceError),
    /// The external source could not absorb a mutation.
    #[error("writing failed: {0}")]
    Writing(#[source] SourceError),
    /// A bulk load failed for part of the requested keys.
    #[error("bulk loading failed for part of the requested keys")]
    BulkLoading(BulkLoadFailure<K, V>),
    /// A bulk write or delete failed for part of the requested keys.
    #[error("bulk writing failed for part of the requested keys")]
    BulkWriting(BulkWriteFailure<K>),
    /// Diagnostic rethrow of a store failure cause, produced only by the
    /// resilience strategy's error filter.
    #[error("store failure: {0}")]
    Store(#[source] SourceError),
}

impl<K, V> From<SourceFault> for CacheError<K, V> {
    fn from(fault: SourceFault) -> Self {
        match fault {
            SourceFault::Loading(cause) => CacheError::Loading(cause),
            SourceFault::Writing(cause) => CacheError::Writing(cause),
        }
    }
}

pub type CacheResult<T, K, V> = Result<T, CacheError<K, V>>;
