//! Loader/writer-integrated cache engine.
//!
//! Every operation follows one skeleton: check the status gate, build a
//! per-call closure over the loader/writer, hand it to the store's atomic
//! compute, and interpret the outcome. The writer is always invoked inside
//! the closure, before the store installs the new value; the loader is
//! invoked before a loaded value becomes observable. When the store itself
//! fails, the per-call record decides how the resilience strategy recovers.

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use crate::config::CacheConfig;
use crate::errors::{BoxError, CacheResult, SourceFault};
use crate::expiry::ExpiryPolicy;
use crate::loader::CacheLoaderWriter;
use crate::resilience::{ResilienceStrategy, SourceProgress};
use crate::stats::{
    CacheObserver, ConditionalRemoveOutcome, GetOutcome, PutIfAbsentOutcome, PutOutcome,
    RemoveOutcome, ReplaceOutcome,
};
use crate::store::{ComputeError, Store, ValueHolder};

use super::status::{Status, StatusGate};

/// Flags captured by a per-call closure, read once the store call returns.
///
/// The store's per-key linearization is the only synchronization these
/// need: the closure runs on the calling thread under the store's per-key
/// lock equivalent, and the record is consulted strictly after the store
/// call returns.
#[derive(Debug)]
pub(super) struct CallRecord<V> {
    /// A mapping (in cache or per the source of truth) was found.
    pub hit: bool,
    /// The store held a mapping that this call changed or removed.
    pub modified: bool,
    /// The operation's decisive action (write, delete) took place.
    pub success: bool,
    /// Value observed before the operation took effect, when relevant.
    pub old_value: Option<V>,
    /// The closure ran to completion, loader/writer calls included.
    pub completed: bool,
    /// Loader/writer failure captured inside the closure.
    pub fault: Option<SourceFault>,
}

impl<V> CallRecord<V> {
    pub fn new() -> Self {
        Self {
            hit: false,
            modified: false,
            success: false,
            old_value: None,
            completed: false,
            fault: None,
        }
    }

    /// Records a fault and hands it back for the closure's `Err` channel.
    pub fn record_fault(&mut self, fault: SourceFault) -> SourceFault {
        self.fault = Some(fault.clone());
        fault
    }

    /// Progress to hand the resilience strategy, mapping a completed call
    /// to `result`.
    pub fn progress<R>(self, result: R) -> SourceProgress<R> {
        match self.fault {
            Some(fault) => SourceProgress::Faulted(fault),
            None if self.completed => SourceProgress::Completed(result),
            None => SourceProgress::Untouched,
        }
    }
}

/// In-process key/value cache over an external source of truth.
///
/// Reads fall through to the loader on a miss; every mutation reaches the
/// writer before the store installs it. When the store fails, the injected
/// [`ResilienceStrategy`] keeps the source-of-truth contract intact.
pub struct Cache<K, V>
where
    K: Clone + Eq + Hash + 'static,
    V: 'static,
{
    config: CacheConfig,
    store: Arc<dyn Store<K, V>>,
    loader_writer: Arc<dyn CacheLoaderWriter<K, V>>,
    resilience: Arc<dyn ResilienceStrategy<K, V>>,
    expiry: Arc<dyn ExpiryPolicy<K, V>>,
    observer: Arc<dyn CacheObserver>,
    status: StatusGate,
}

/// Current value for an atomic operation: the cached mapping when present,
/// otherwise the loader's answer when the configuration says to consult it.
fn current_or_loaded<K, V>(
    loader_writer: &dyn CacheLoaderWriter<K, V>,
    use_loader: bool,
    key: &K,
    current: Option<&V>,
) -> Result<Option<V>, BoxError>
where
    K: Clone + Eq + Hash,
    V: Clone,
{
    match current {
        Some(value) => Ok(Some(value.clone())),
        None if use_loader => loader_writer.load(key),
        None => Ok(None),
    }
}

impl<K, V> Cache<K, V>
where
    K: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static,
    V: Clone + PartialEq + fmt::Debug + Send + Sync + 'static,
{
    pub(super) fn from_parts(
        config: CacheConfig,
        store: Arc<dyn Store<K, V>>,
        loader_writer: Arc<dyn CacheLoaderWriter<K, V>>,
        resilience: Arc<dyn ResilienceStrategy<K, V>>,
        expiry: Arc<dyn ExpiryPolicy<K, V>>,
        observer: Arc<dyn CacheObserver>,
    ) -> Self {
        Self {
            config,
            store,
            loader_writer,
            resilience,
            expiry,
            observer,
            status: StatusGate::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn status(&self) -> Status {
        self.status.status()
    }

    /// Moves the cache to available. Operations fail until this succeeds.
    pub fn init(&self) -> CacheResult<(), K, V> {
        self.status.init()?;
        log::debug!("cache '{}' initialized", self.config.name);
        Ok(())
    }

    /// Moves the cache to closed. There is no reopen.
    pub fn close(&self) -> CacheResult<(), K, V> {
        self.status.close()?;
        log::debug!("cache '{}' closed", self.config.name);
        Ok(())
    }

    /// Value for `key`, loading through to the source on a miss.
    ///
    /// A loaded value is installed atomically before it becomes
    /// observable; a `None` from the loader leaves the mapping absent.
    pub fn get(&self, key: &K) -> CacheResult<Option<V>, K, V> {
        self.status.check_available()?;
        let mut record: CallRecord<V> = CallRecord::new();
        let loader_writer = &self.loader_writer;
        let outcome = self.store.compute_if_absent(key, &mut |k| {
            match loader_writer.load(k) {
                Ok(loaded) => {
                    record.completed = true;
                    record.hit = loaded.is_some();
                    record.old_value = loaded.clone();
                    Ok(loaded)
                }
                Err(cause) => Err(record.record_fault(SourceFault::loading(cause))),
            }
        });
        match outcome {
            Ok(holder) => {
                let value = holder.map(ValueHolder::into_value);
                self.observer.get(if value.is_some() {
                    GetOutcome::Hit
                } else {
                    GetOutcome::Miss
                });
                Ok(value)
            }
            Err(ComputeError::Fault(fault)) => {
                self.observer.get(GetOutcome::Failure);
                Err(fault.into())
            }
            Err(ComputeError::Access(error)) => {
                self.observer.get(GetOutcome::Failure);
                let error = self.resilience.filter_error(error)?;
                let loaded = record.old_value.take();
                self.resilience.get_failure(key, error, record.progress(loaded))
            }
        }
    }

    /// Installs `value` for `key`, writing through to the source first.
    pub fn put(&self, key: K, value: V) -> CacheResult<(), K, V> {
        self.status.check_available()?;
        let mut record: CallRecord<V> = CallRecord::new();
        let loader_writer = &self.loader_writer;
        let outcome = self.store.compute(
            &key,
            &mut |k, _current| match loader_writer.write(k, &value) {
                Ok(()) => {
                    record.completed = true;
                    record.success = true;
                    Ok(Some(value.clone()))
                }
                Err(cause) => Err(record.record_fault(SourceFault::writing(cause))),
            },
            true,
        );
        match outcome {
            Ok(_) => {
                self.observer.put(PutOutcome::Put);
                Ok(())
            }
            Err(ComputeError::Fault(fault)) => {
                self.observer.put(PutOutcome::Failure);
                Err(fault.into())
            }
            Err(ComputeError::Access(error)) => {
                self.observer.put(PutOutcome::Failure);
                let error = self.resilience.filter_error(error)?;
                self.resilience
                    .put_failure(&key, &value, error, record.progress(()))
            }
        }
    }

    /// Removes the mapping for `key`, deleting from the source first.
    pub fn remove(&self, key: &K) -> CacheResult<(), K, V> {
        self.status.check_available()?;
        let mut record: CallRecord<V> = CallRecord::new();
        let loader_writer = &self.loader_writer;
        let outcome = self.store.compute(
            key,
            &mut |k, current| {
                record.modified = current.is_some();
                match loader_writer.delete(k) {
                    Ok(()) => {
                        record.completed = true;
                        record.success = true;
                        Ok(None)
                    }
                    Err(cause) => Err(record.record_fault(SourceFault::writing(cause))),
                }
            },
            true,
        );
        match outcome {
            Ok(_) => {
                self.observer.remove(if record.modified {
                    RemoveOutcome::Success
                } else {
                    RemoveOutcome::Noop
                });
                Ok(())
            }
            Err(ComputeError::Fault(fault)) => {
                self.observer.remove(RemoveOutcome::Failure);
                Err(fault.into())
            }
            Err(ComputeError::Access(error)) => {
                self.observer.remove(RemoveOutcome::Failure);
                let error = self.resilience.filter_error(error)?;
                self.resilience
                    .remove_failure(key, error, record.progress(()))
            }
        }
    }

    /// Installs `value` only when `key` has no mapping.
    ///
    /// With `use_loader_in_atomics`, the loader is consulted first: a
    /// non-`None` load means the source of truth already has the entry, so
    /// it is installed and the writer is *not* invoked. Returns the value
    /// that was present (or loaded); `None` means this call wrote and
    /// installed `value`.
    pub fn put_if_absent(&self, key: K, value: V) -> CacheResult<Option<V>, K, V> {
        self.status.check_available()?;
        let use_loader = self.config.use_loader_in_atomics;
        let mut record: CallRecord<V> = CallRecord::new();
        let loader_writer = &self.loader_writer;
        let outcome = self.store.compute_if_absent(&key, &mut |k| {
            if use_loader {
                match loader_writer.load(k) {
                    Ok(Some(loaded)) => {
                        record.completed = true;
                        record.hit = true;
                        record.old_value = Some(loaded.clone());
                        return Ok(Some(loaded));
                    }
                    Ok(None) => {}
                    Err(cause) => return Err(record.record_fault(SourceFault::loading(cause))),
                }
            }
            match loader_writer.write(k, &value) {
                Ok(()) => {
                    record.completed = true;
                    record.success = true;
                    Ok(Some(value.clone()))
                }
                Err(cause) => Err(record.record_fault(SourceFault::writing(cause))),
            }
        });
        match outcome {
            Ok(holder) => {
                if record.success {
                    self.observer.put_if_absent(PutIfAbsentOutcome::Put);
                    Ok(None)
                } else {
                    self.observer.put_if_absent(PutIfAbsentOutcome::Hit);
                    Ok(holder.map(ValueHolder::into_value))
                }
            }
            Err(ComputeError::Fault(fault)) => {
                self.observer.put_if_absent(PutIfAbsentOutcome::Failure);
                Err(fault.into())
            }
            Err(ComputeError::Access(error)) => {
                self.observer.put_if_absent(PutIfAbsentOutcome::Failure);
                let error = self.resilience.filter_error(error)?;
                let result = if record.success {
                    None
                } else {
                    record.old_value.take()
                };
                self.resilience
                    .put_if_absent_failure(&key, &value, error, record.progress(result))
            }
        }
    }

    /// Removes the mapping for `key` only when its value equals
    /// `expected`. Returns whether the removal happened.
    pub fn remove_if_equals(&self, key: &K, expected: &V) -> CacheResult<bool, K, V> {
        self.status.check_available()?;
        let use_loader = self.config.use_loader_in_atomics;
        let mut record: CallRecord<V> = CallRecord::new();
        let loader_writer = &self.loader_writer;
        let outcome = self.store.compute(
            key,
            &mut |k, current| {
                let in_cache =
                    match current_or_loaded(loader_writer.as_ref(), use_loader, k, current) {
                        Ok(value) => value,
                        Err(cause) => {
                            return Err(record.record_fault(SourceFault::loading(cause)))
                        }
                    };
                match in_cache {
                    None => {
                        record.completed = true;
                        Ok(None)
                    }
                    Some(found) if found == *expected => match loader_writer.delete(k) {
                        Ok(()) => {
                            record.completed = true;
                            record.success = true;
                            record.modified = true;
                            Ok(None)
                        }
                        Err(cause) => Err(record.record_fault(SourceFault::writing(cause))),
                    },
                    Some(found) => {
                        record.completed = true;
                        record.hit = true;
                        Ok(Some(found))
                    }
                }
            },
            false,
        );
        match outcome {
            Ok(_) => {
                self.observer.conditional_remove(if record.success {
                    ConditionalRemoveOutcome::Success
                } else if record.hit {
                    ConditionalRemoveOutcome::FailureKeyPresent
                } else {
                    ConditionalRemoveOutcome::FailureKeyMissing
                });
                Ok(record.success)
            }
            Err(ComputeError::Fault(fault)) => {
                self.observer
                    .conditional_remove(ConditionalRemoveOutcome::Failure);
                Err(fault.into())
            }
            Err(ComputeError::Access(error)) => {
                self.observer
                    .conditional_remove(ConditionalRemoveOutcome::Failure);
                let error = self.resilience.filter_error(error)?;
                let removed = record.success;
                self.resilience.conditional_remove_failure(
                    key,
                    expected,
                    error,
                    record.progress(removed),
                )
            }
        }
    }

    /// Replaces the value for `key` when a mapping exists, returning the
    /// prior value.
    pub fn replace(&self, key: &K, value: V) -> CacheResult<Option<V>, K, V> {
        self.status.check_available()?;
        let use_loader = self.config.use_loader_in_atomics;
        let mut record: CallRecord<V> = CallRecord::new();
        let loader_writer = &self.loader_writer;
        let expiry = &self.expiry;
        let outcome = self.store.compute(
            key,
            &mut |k, current| {
                let in_cache =
                    match current_or_loaded(loader_writer.as_ref(), use_loader, k, current) {
                        Ok(found) => found,
                        Err(cause) => {
                            return Err(record.record_fault(SourceFault::loading(cause)))
                        }
                    };
                match in_cache {
                    None => {
                        record.completed = true;
                        Ok(None)
                    }
                    Some(old) => match loader_writer.write(k, &value) {
                        Ok(()) => {
                            record.completed = true;
                            record.hit = true;
                            record.success = true;
                            let expired = expiry.expires_on_update(k, &old, &value);
                            record.old_value = Some(old);
                            if expired {
                                Ok(None)
                            } else {
                                Ok(Some(value.clone()))
                            }
                        }
                        Err(cause) => Err(record.record_fault(SourceFault::writing(cause))),
                    },
                }
            },
            true,
        );
        match outcome {
            Ok(_) => {
                self.observer.replace(if record.hit {
                    ReplaceOutcome::Hit
                } else {
                    ReplaceOutcome::MissNotPresent
                });
                Ok(record.old_value)
            }
            Err(ComputeError::Fault(fault)) => {
                self.observer.replace(ReplaceOutcome::Failure);
                Err(fault.into())
            }
            Err(ComputeError::Access(error)) => {
                self.observer.replace(ReplaceOutcome::Failure);
                let error = self.resilience.filter_error(error)?;
                let previous = record.old_value.take();
                self.resilience
                    .replace_failure(key, &value, error, record.progress(previous))
            }
        }
    }

    /// Replaces the value for `key` only when its current value equals
    /// `expected`. Returns whether the replacement happened.
    pub fn replace_if_equals(
        &self,
        key: &K,
        expected: &V,
        value: V,
    ) -> CacheResult<bool, K, V> {
        self.status.check_available()?;
        let use_loader = self.config.use_loader_in_atomics;
        let mut record: CallRecord<V> = CallRecord::new();
        let loader_writer = &self.loader_writer;
        let expiry = &self.expiry;
        let outcome = self.store.compute(
            key,
            &mut |k, current| {
                let in_cache =
                    match current_or_loaded(loader_writer.as_ref(), use_loader, k, current) {
                        Ok(found) => found,
                        Err(cause) => {
                            return Err(record.record_fault(SourceFault::loading(cause)))
                        }
                    };
                match in_cache {
                    None => {
                        record.completed = true;
                        Ok(None)
                    }
                    Some(old) if old == *expected => match loader_writer.write(k, &value) {
                        Ok(()) => {
                            record.completed = true;
                            record.hit = true;
                            record.success = true;
                            if expiry.expires_on_update(k, &old, &value) {
                                Ok(None)
                            } else {
                                Ok(Some(value.clone()))
                            }
                        }
                        Err(cause) => Err(record.record_fault(SourceFault::writing(cause))),
                    },
                    Some(old) => {
                        record.completed = true;
                        record.hit = true;
                        Ok(Some(old))
                    }
                }
            },
            false,
        );
        match outcome {
            Ok(_) => {
                self.observer.replace(if record.success {
                    ReplaceOutcome::Hit
                } else if record.hit {
                    ReplaceOutcome::MissPresent
                } else {
                    ReplaceOutcome::MissNotPresent
                });
                Ok(record.success)
            }
            Err(ComputeError::Fault(fault)) => {
                self.observer.replace(ReplaceOutcome::Failure);
                Err(fault.into())
            }
            Err(ComputeError::Access(error)) => {
                self.observer.replace(ReplaceOutcome::Failure);
                let error = self.resilience.filter_error(error)?;
                let replaced = record.success;
                self.resilience.conditional_replace_failure(
                    key,
                    expected,
                    &value,
                    error,
                    record.progress(replaced),
                )
            }
        }
    }

    /// Whether the store currently has a mapping for `key`. Never consults
    /// the loader.
    pub fn contains_key(&self, key: &K) -> CacheResult<bool, K, V> {
        self.status.check_available()?;
        match self.store.contains(key) {
            Ok(present) => Ok(present),
            Err(error) => {
                let error = self.resilience.filter_error(error)?;
                Ok(self.resilience.contains_key_failure(key, error))
            }
        }
    }

    /// Drops every cached mapping. The source of truth is untouched.
    pub fn clear(&self) -> CacheResult<(), K, V> {
        self.status.check_available()?;
        match self.store.clear() {
            Ok(()) => Ok(()),
            Err(error) => {
                let error = self.resilience.filter_error(error)?;
                self.resilience.clear_failure(error)
            }
        }
    }

    pub(super) fn store(&self) -> &Arc<dyn Store<K, V>> {
        &self.store
    }

    pub(super) fn loader_writer(&self) -> &Arc<dyn CacheLoaderWriter<K, V>> {
        &self.loader_writer
    }

    pub(super) fn resilience(&self) -> &Arc<dyn ResilienceStrategy<K, V>> {
        &self.resilience
    }

    pub(super) fn expiry(&self) -> &Arc<dyn ExpiryPolicy<K, V>> {
        &self.expiry
    }

    pub(super) fn observer(&self) -> &Arc<dyn CacheObserver> {
        &self.observer
    }

    pub(super) fn gate(&self) -> &StatusGate {
        &self.status
    }
}
