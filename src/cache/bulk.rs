//! Bulk operations.
//!
//! Bulk calls drive the store's batch computes. The store may split a
//! request into several disjoint sub-batches; the accumulators that track
//! per-key successes and failures live for one call and are drained as
//! batches are processed. A key ends up in the successes or the failures
//! of a call, never both.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use crate::errors::{
    BulkLoadFailure, BulkWriteFailure, CacheError, CacheResult, SourceError,
};
use crate::expiry::ExpiryPolicy;
use crate::loader::{CacheLoaderWriter, LoadAllError, WriteAllError};
use crate::resilience::ResilienceStrategy;
use crate::stats::CacheObserver;
use crate::store::Store;

use super::engine::Cache;

/// Input keys in first-seen order, duplicates dropped.
fn distinct_keys<K, I>(keys: I) -> Vec<K>
where
    K: Clone + Eq + Hash,
    I: IntoIterator<Item = K>,
{
    let mut seen = HashSet::new();
    let mut distinct = Vec::new();
    for key in keys {
        if seen.insert(key.clone()) {
            distinct.push(key);
        }
    }
    distinct
}

impl<K, V> Cache<K, V>
where
    K: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static,
    V: Clone + PartialEq + fmt::Debug + Send + Sync + 'static,
{
    /// Values for a batch of keys, loading misses through to the source.
    ///
    /// With `include_nulls`, keys that have no value anywhere appear in
    /// the result mapped to `None`; otherwise they are omitted. A partial
    /// loading failure surfaces as a bulk loading error carrying the
    /// values obtained so far next to the per-key causes.
    pub fn get_all<I>(
        &self,
        keys: I,
        include_nulls: bool,
    ) -> CacheResult<HashMap<K, Option<V>>, K, V>
    where
        I: IntoIterator<Item = K>,
    {
        self.gate().check_available()?;
        let keys = distinct_keys(keys);
        if keys.is_empty() {
            return Ok(HashMap::new());
        }

        let mut successes: HashMap<K, Option<V>> = HashMap::new();
        let mut failures: HashMap<K, SourceError> = HashMap::new();
        let loader_writer = self.loader_writer();
        let computed = self.store().bulk_compute_if_absent(&keys, &mut |absent| {
            match loader_writer.load_all(absent) {
                Ok(loaded) => absent
                    .iter()
                    .map(|key| (key.clone(), loaded.get(key).cloned().flatten()))
                    .collect(),
                Err(LoadAllError::Bulk(partial)) => {
                    let decisions: Vec<(K, Option<V>)> = absent
                        .iter()
                        .map(|key| (key.clone(), partial.successes.get(key).cloned().flatten()))
                        .collect();
                    successes.extend(partial.successes);
                    failures.extend(partial.failures);
                    decisions
                }
                Err(LoadAllError::Other(cause)) => {
                    let shared: SourceError = Arc::from(cause);
                    for key in absent {
                        failures.insert(key.clone(), shared.clone());
                    }
                    absent.iter().map(|key| (key.clone(), None)).collect()
                }
            }
        });

        match computed {
            Ok(entries) => {
                let mut result = HashMap::with_capacity(entries.len());
                let mut hits: u64 = 0;
                let mut misses: u64 = 0;
                for (key, holder) in entries {
                    match holder {
                        Some(holder) => {
                            hits += 1;
                            result.insert(key, Some(holder.into_value()));
                        }
                        None => {
                            misses += 1;
                            if include_nulls && failures.is_empty() {
                                result.insert(key, None);
                            }
                        }
                    }
                }
                self.observer().get_all(hits, misses);
                if failures.is_empty() {
                    Ok(result)
                } else {
                    let mut combined = successes;
                    for (key, value) in result {
                        combined.insert(key, value);
                    }
                    Err(CacheError::BulkLoading(BulkLoadFailure {
                        successes: combined,
                        failures,
                    }))
                }
            }
            Err(error) => {
                let error = self.resilience().filter_error(error)?;
                self.resilience().get_all_failure(&keys, error)
            }
        }
    }

    /// Installs a batch of mappings, writing each sub-batch through to the
    /// source before installation.
    ///
    /// Keys whose write failed keep their previous cached value; a partial
    /// failure surfaces as a bulk writing error carrying the written and
    /// failed key sets.
    pub fn put_all<I>(&self, entries: I) -> CacheResult<(), K, V>
    where
        I: IntoIterator<Item = (K, V)>,
    {
        self.gate().check_available()?;
        let mut entries_to_remap: HashMap<K, V> = entries.into_iter().collect();
        if entries_to_remap.is_empty() {
            return Ok(());
        }
        let all_entries: Vec<(K, V)> = entries_to_remap
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        let keys: Vec<K> = entries_to_remap.keys().cloned().collect();

        let mut successes: HashSet<K> = HashSet::new();
        let mut failures: HashMap<K, SourceError> = HashMap::new();
        let mut installed: u64 = 0;
        let loader_writer = self.loader_writer();
        let expiry = self.expiry();
        let computed = self.store().bulk_compute(&keys, &mut |batch| {
            // Only write keys this batch still owns; another sub-batch may
            // have handled a re-presented key already.
            let to_write: Vec<(K, V)> = batch
                .iter()
                .filter_map(|(key, _)| {
                    entries_to_remap
                        .get(key)
                        .map(|value| (key.clone(), value.clone()))
                })
                .collect();
            if !to_write.is_empty() {
                match loader_writer.write_all(&to_write) {
                    Ok(()) => {
                        successes.extend(to_write.iter().map(|(key, _)| key.clone()));
                    }
                    Err(WriteAllError::Bulk(partial)) => {
                        successes.extend(partial.successes);
                        failures.extend(partial.failures);
                    }
                    Err(WriteAllError::Other(cause)) => {
                        let shared: SourceError = Arc::from(cause);
                        for (key, _) in &to_write {
                            failures.insert(key.clone(), shared.clone());
                        }
                    }
                }
            }
            batch
                .iter()
                .map(|(key, current)| match entries_to_remap.remove(key) {
                    Some(value) => {
                        let expired = match current {
                            Some(old) => expiry.expires_on_update(key, old, &value),
                            None => expiry.expires_on_creation(key, &value),
                        };
                        if expired {
                            (key.clone(), None)
                        } else if successes.contains(key) {
                            installed += 1;
                            (key.clone(), Some(value))
                        } else {
                            (key.clone(), current.clone())
                        }
                    }
                    None => (key.clone(), current.clone()),
                })
                .collect()
        });

        match computed {
            Ok(_) => {
                self.observer().put_all(installed);
                if failures.is_empty() {
                    Ok(())
                } else {
                    Err(CacheError::BulkWriting(BulkWriteFailure {
                        successes,
                        failures,
                    }))
                }
            }
            Err(error) => {
                let error = self.resilience().filter_error(error)?;
                self.resilience().put_all_failure(&all_entries, error)
            }
        }
    }

    /// Removes a batch of mappings, deleting each sub-batch from the
    /// source before invalidation.
    ///
    /// Keys whose deletion outcome is unknown are invalidated anyway, so a
    /// possibly stale entry cannot survive. A partial failure surfaces as
    /// a bulk writing error.
    pub fn remove_all<I>(&self, keys: I) -> CacheResult<(), K, V>
    where
        I: IntoIterator<Item = K>,
    {
        self.gate().check_available()?;
        let keys = distinct_keys(keys);
        if keys.is_empty() {
            return Ok(());
        }

        let mut to_remove: HashSet<K> = keys.iter().cloned().collect();
        let mut successes: HashSet<K> = HashSet::new();
        let mut failures: HashMap<K, SourceError> = HashMap::new();
        let mut unknowns: HashSet<K> = HashSet::new();
        let mut removed: u64 = 0;
        let loader_writer = self.loader_writer();
        let computed = self.store().bulk_compute(&keys, &mut |batch| {
            let to_delete: Vec<K> = batch
                .iter()
                .map(|(key, _)| key)
                .filter(|key| to_remove.contains(*key))
                .cloned()
                .collect();
            if !to_delete.is_empty() {
                match loader_writer.delete_all(&to_delete) {
                    Ok(()) => {
                        successes.extend(to_delete.iter().cloned());
                    }
                    Err(WriteAllError::Bulk(partial)) => {
                        successes.extend(partial.successes);
                        failures.extend(partial.failures);
                    }
                    Err(WriteAllError::Other(cause)) => {
                        // State of the whole sub-batch is undetermined.
                        let shared: SourceError = Arc::from(cause);
                        for key in &to_delete {
                            failures.insert(key.clone(), shared.clone());
                            unknowns.insert(key.clone());
                        }
                    }
                }
            }
            batch
                .iter()
                .map(|(key, current)| {
                    if successes.contains(key) {
                        if to_remove.remove(key) {
                            removed += 1;
                        }
                        (key.clone(), None)
                    } else if unknowns.contains(key) {
                        (key.clone(), None)
                    } else {
                        (key.clone(), current.clone())
                    }
                })
                .collect()
        });

        match computed {
            Ok(_) => {
                self.observer().remove_all(removed);
                if failures.is_empty() {
                    Ok(())
                } else {
                    Err(CacheError::BulkWriting(BulkWriteFailure {
                        successes,
                        failures,
                    }))
                }
            }
            Err(error) => {
                let error = self.resilience().filter_error(error)?;
                self.resilience().remove_all_failure(&keys, error)
            }
        }
    }
}
