//! Default resilience strategy.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use crate::errors::{CacheError, CacheResult, StoreAccessError};
use crate::loader::{CacheLoaderWriter, LoadAllError, WriteAllError};
use crate::store::Store;

use super::{ResilienceStrategy, SourceProgress};

/// Recovery strategy that treats the loader/writer as the surviving source
/// of truth.
///
/// Every entry point invalidates the affected cached entries first
/// (swallowing invalidation failures), then performs the operation the
/// caller intended directly against the loader/writer. Progress already
/// made by the failed store call is honored: a completed side effect is
/// not repeated, and a recorded loader/writer fault is translated with its
/// cause preserved.
pub struct RobustResilienceStrategy<K, V>
where
    K: Clone + Eq + Hash + 'static,
    V: 'static,
{
    store: Arc<dyn Store<K, V>>,
    loader_writer: Arc<dyn CacheLoaderWriter<K, V>>,
}

impl<K, V> RobustResilienceStrategy<K, V>
where
    K: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static,
    V: Clone + PartialEq + Send + Sync + 'static,
{
    pub fn new(
        store: Arc<dyn Store<K, V>>,
        loader_writer: Arc<dyn CacheLoaderWriter<K, V>>,
    ) -> Self {
        Self {
            store,
            loader_writer,
        }
    }

    fn invalidate(&self, key: &K, error: &StoreAccessError) {
        log::error!(
            "store failure on key {:?}, invalidating cached entry: {}",
            key,
            error
        );
        if let Err(invalidation) = self.store.remove(key) {
            log::warn!(
                "could not invalidate key {:?} after store failure: {}",
                key,
                invalidation
            );
        }
    }

    fn invalidate_all(&self, keys: &[K], error: &StoreAccessError) {
        log::error!(
            "store failure on a batch of {} keys, invalidating cached entries: {}",
            keys.len(),
            error
        );
        for key in keys {
            if let Err(invalidation) = self.store.remove(key) {
                log::warn!(
                    "could not invalidate key {:?} after store failure: {}",
                    key,
                    invalidation
                );
            }
        }
    }

    fn load(&self, key: &K) -> CacheResult<Option<V>, K, V> {
        self.loader_writer
            .load(key)
            .map_err(|cause| CacheError::Loading(Arc::from(cause)))
    }

    fn write(&self, key: &K, value: &V) -> CacheResult<(), K, V> {
        self.loader_writer
            .write(key, value)
            .map_err(|cause| CacheError::Writing(Arc::from(cause)))
    }

    fn delete(&self, key: &K) -> CacheResult<(), K, V> {
        self.loader_writer
            .delete(key)
            .map_err(|cause| CacheError::Writing(Arc::from(cause)))
    }
}

impl<K, V> ResilienceStrategy<K, V> for RobustResilienceStrategy<K, V>
where
    K: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static,
    V: Clone + PartialEq + Send + Sync + 'static,
{
    fn get_failure(
        &self,
        key: &K,
        error: StoreAccessError,
        progress: SourceProgress<Option<V>>,
    ) -> CacheResult<Option<V>, K, V> {
        self.invalidate(key, &error);
        match progress {
            SourceProgress::Faulted(fault) => Err(fault.into()),
            SourceProgress::Completed(value) => Ok(value),
            SourceProgress::Untouched => self.load(key),
        }
    }

    fn contains_key_failure(&self, key: &K, error: StoreAccessError) -> bool {
        self.invalidate(key, &error);
        false
    }

    fn put_failure(
        &self,
        key: &K,
        value: &V,
        error: StoreAccessError,
        progress: SourceProgress<()>,
    ) -> CacheResult<(), K, V> {
        self.invalidate(key, &error);
        match progress {
            SourceProgress::Faulted(fault) => Err(fault.into()),
            SourceProgress::Completed(()) => Ok(()),
            SourceProgress::Untouched => self.write(key, value),
        }
    }

    fn remove_failure(
        &self,
        key: &K,
        error: StoreAccessError,
        progress: SourceProgress<()>,
    ) -> CacheResult<(), K, V> {
        self.invalidate(key, &error);
        match progress {
            SourceProgress::Faulted(fault) => Err(fault.into()),
            SourceProgress::Completed(()) => Ok(()),
            SourceProgress::Untouched => self.delete(key),
        }
    }

    fn clear_failure(&self, error: StoreAccessError) -> CacheResult<(), K, V> {
        log::error!("store failure on clear, retrying invalidation: {}", error);
        if let Err(invalidation) = self.store.clear() {
            log::warn!("could not clear store after failure: {}", invalidation);
        }
        Ok(())
    }

    fn put_if_absent_failure(
        &self,
        key: &K,
        value: &V,
        error: StoreAccessError,
        progress: SourceProgress<Option<V>>,
    ) -> CacheResult<Option<V>, K, V> {
        self.invalidate(key, &error);
        match progress {
            SourceProgress::Faulted(fault) => Err(fault.into()),
            SourceProgress::Completed(result) => Ok(result),
            SourceProgress::Untouched => match self.load(key)? {
                Some(present) => Ok(Some(present)),
                None => {
                    self.write(key, value)?;
                    Ok(None)
                }
            },
        }
    }

    fn conditional_remove_failure(
        &self,
        key: &K,
        expected: &V,
        error: StoreAccessError,
        progress: SourceProgress<bool>,
    ) -> CacheResult<bool, K, V> {
        self.invalidate(key, &error);
        match progress {
            SourceProgress::Faulted(fault) => Err(fault.into()),
            SourceProgress::Completed(removed) => Ok(removed),
            SourceProgress::Untouched => match self.load(key)? {
                Some(current) if current == *expected => {
                    self.delete(key)?;
                    Ok(true)
                }
                _ => Ok(false),
            },
        }
    }

    fn replace_failure(
        &self,
        key: &K,
        value: &V,
        error: StoreAccessError,
        progress: SourceProgress<Option<V>>,
    ) -> CacheResult<Option<V>, K, V> {
        self.invalidate(key, &error);
        match progress {
            SourceProgress::Faulted(fault) => Err(fault.into()),
            SourceProgress::Completed(previous) => Ok(previous),
            SourceProgress::Untouched => match self.load(key)? {
                Some(previous) => {
                    self.write(key, value)?;
                    Ok(Some(previous))
                }
                None => Ok(None),
            },
        }
    }

    fn conditional_replace_failure(
        &self,
        key: &K,
        expected: &V,
        value: &V,
        error: StoreAccessError,
        progress: SourceProgress<bool>,
    ) -> CacheResult<bool, K, V> {
        self.invalidate(key, &error);
        match progress {
            SourceProgress::Faulted(fault) => Err(fault.into()),
            SourceProgress::Completed(replaced) => Ok(replaced),
            SourceProgress::Untouched => match self.load(key)? {
                Some(current) if current == *expected => {
                    self.write(key, value)?;
                    Ok(true)
                }
                _ => Ok(false),
            },
        }
    }

    fn get_all_failure(
        &self,
        keys: &[K],
        error: StoreAccessError,
    ) -> CacheResult<HashMap<K, Option<V>>, K, V> {
        self.invalidate_all(keys, &error);
        match self.loader_writer.load_all(keys) {
            Ok(mut loaded) => {
                for key in keys {
                    loaded.entry(key.clone()).or_insert(None);
                }
                Ok(loaded)
            }
            Err(LoadAllError::Bulk(failure)) => Err(CacheError::BulkLoading(failure)),
            Err(LoadAllError::Other(cause)) => Err(CacheError::Loading(Arc::from(cause))),
        }
    }

    fn put_all_failure(
        &self,
        entries: &[(K, V)],
        error: StoreAccessError,
    ) -> CacheResult<(), K, V> {
        let keys: Vec<K> = entries.iter().map(|(key, _)| key.clone()).collect();
        self.invalidate_all(&keys, &error);
        match self.loader_writer.write_all(entries) {
            Ok(()) => Ok(()),
            Err(WriteAllError::Bulk(failure)) => Err(CacheError::BulkWriting(failure)),
            Err(WriteAllError::Other(cause)) => Err(CacheError::Writing(Arc::from(cause))),
        }
    }

    fn remove_all_failure(&self, keys: &[K], error: StoreAccessError) -> CacheResult<(), K, V> {
        self.invalidate_all(keys, &error);
        match self.loader_writer.delete_all(keys) {
            Ok(()) => Ok(()),
            Err(WriteAllError::Bulk(failure)) => Err(CacheError::BulkWriting(failure)),
            Err(WriteAllError::Other(cause)) => Err(CacheError::Writing(Arc::from(cause))),
        }
    }
}
