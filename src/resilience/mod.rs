//! Recovery layer for store failures.
//!
//! When the store raises a [`StoreAccessError`] the engine hands the
//! operation to a [`ResilienceStrategy`], together with a
//! [`SourceProgress`] describing how far the per-call closure got against
//! the loader/writer. The strategy makes the cache state safe and, where
//! possible, satisfies the caller directly from the external source, which
//! remains authoritative even while the cache is unusable.

mod robust;

pub use robust::RobustResilienceStrategy;

use std::collections::HashMap;

use crate::errors::{CacheError, CacheResult, SourceFault, StoreAccessError};

/// How far the per-call closure got before the store failed.
///
/// Derived from the call record, never by re-running the closure, so the
/// external source sees no duplicate side effects from classification.
#[derive(Debug)]
pub enum SourceProgress<R> {
    /// The closure never ran; the loader/writer was not consulted.
    Untouched,
    /// The closure completed its loader/writer interaction and settled on
    /// this result before the store failed to install it.
    Completed(R),
    /// The loader/writer itself failed inside the closure.
    Faulted(SourceFault),
}

/// Per-operation recovery entry points.
///
/// Every entry point is expected to invalidate the affected store entries
/// best-effort before doing anything else, so a possibly inconsistent
/// cached mapping can never outlive the failure that produced it.
pub trait ResilienceStrategy<K, V>: Send + Sync {
    fn get_failure(
        &self,
        key: &K,
        error: StoreAccessError,
        progress: SourceProgress<Option<V>>,
    ) -> CacheResult<Option<V>, K, V>;

    fn contains_key_failure(&self, key: &K, error: StoreAccessError) -> bool;

    fn put_failure(
        &self,
        key: &K,
        value: &V,
        error: StoreAccessError,
        progress: SourceProgress<()>,
    ) -> CacheResult<(), K, V>;

    fn remove_failure(
        &self,
        key: &K,
        error: StoreAccessError,
        progress: SourceProgress<()>,
    ) -> CacheResult<(), K, V>;

    fn clear_failure(&self, error: StoreAccessError) -> CacheResult<(), K, V>;

    /// `Completed(None)` means the closure wrote the argument value;
    /// `Completed(Some(_))` means the source already had a value.
    fn put_if_absent_failure(
        &self,
        key: &K,
        value: &V,
        error: StoreAccessError,
        progress: SourceProgress<Option<V>>,
    ) -> CacheResult<Option<V>, K, V>;

    fn conditional_remove_failure(
        &self,
        key: &K,
        expected: &V,
        error: StoreAccessError,
        progress: SourceProgress<bool>,
    ) -> CacheResult<bool, K, V>;

    fn replace_failure(
        &self,
        key: &K,
        value: &V,
        error: StoreAccessError,
        progress: SourceProgress<Option<V>>,
    ) -> CacheResult<Option<V>, K, V>;

    fn conditional_replace_failure(
        &self,
        key: &K,
        expected: &V,
        value: &V,
        error: StoreAccessError,
        progress: SourceProgress<bool>,
    ) -> CacheResult<bool, K, V>;

    fn get_all_failure(
        &self,
        keys: &[K],
        error: StoreAccessError,
    ) -> CacheResult<HashMap<K, Option<V>>, K, V>;

    fn put_all_failure(&self, entries: &[(K, V)], error: StoreAccessError)
        -> CacheResult<(), K, V>;

    fn remove_all_failure(&self, keys: &[K], error: StoreAccessError) -> CacheResult<(), K, V>;

    /// Diagnostic escape hatch, applied by the engine before dispatching
    /// to a recovery entry point: the cause of a rethrowing store failure
    /// reaches the caller unchanged, everything else enters recovery.
    fn filter_error(&self, error: StoreAccessError) -> Result<StoreAccessError, CacheError<K, V>> {
        match error {
            StoreAccessError::Rethrow(cause) => Err(CacheError::Store(cause)),
            other => Ok(other),
        }
    }
}
