//! Test doubles shared by the integration suites: a recording source of
//! truth with programmable per-key failures, and a store wrapper that
//! injects access failures around a real sharded store.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;

use rust_cache::{
    BoxError, BulkFillFn, BulkRemapFn, CacheLoaderWriter, ComputeError, FillFn, LoadAllError,
    RemapFn, ShardedStore, Store, StoreAccessError, ValueHolder, WriteAllError,
};

fn io_error(message: &str) -> BoxError {
    Box::new(std::io::Error::new(
        std::io::ErrorKind::Other,
        message.to_string(),
    ))
}

#[derive(Default)]
struct SourceState {
    entries: HashMap<u32, String>,
    loads: Vec<u32>,
    writes: Vec<(u32, String)>,
    deletes: Vec<u32>,
    failing_loads: HashSet<u32>,
    failing_writes: HashSet<u32>,
    failing_deletes: HashSet<u32>,
    fail_load_all: bool,
    fail_delete_all: bool,
}

/// Recording loader/writer backed by an in-memory map.
///
/// Clones share state, so a test can keep a handle while the cache owns
/// another.
#[derive(Clone, Default)]
pub struct RecordingSource {
    state: Arc<Mutex<SourceState>>,
}

impl RecordingSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, key: u32, value: &str) {
        self.state.lock().entries.insert(key, value.to_string());
    }

    pub fn entry(&self, key: u32) -> Option<String> {
        self.state.lock().entries.get(&key).cloned()
    }

    pub fn loads(&self) -> Vec<u32> {
        self.state.lock().loads.clone()
    }

    pub fn writes(&self) -> Vec<(u32, String)> {
        self.state.lock().writes.clone()
    }

    pub fn deletes(&self) -> Vec<u32> {
        self.state.lock().deletes.clone()
    }

    pub fn fail_load(&self, key: u32) {
        self.state.lock().failing_loads.insert(key);
    }

    pub fn fail_write(&self, key: u32) {
        self.state.lock().failing_writes.insert(key);
    }

    pub fn fail_delete(&self, key: u32) {
        self.state.lock().failing_deletes.insert(key);
    }

    pub fn fail_load_all(&self) {
        self.state.lock().fail_load_all = true;
    }

    pub fn fail_delete_all(&self) {
        self.state.lock().fail_delete_all = true;
    }
}

impl CacheLoaderWriter<u32, String> for RecordingSource {
    fn load(&self, key: &u32) -> Result<Option<String>, BoxError> {
        let mut state = self.state.lock();
        state.loads.push(*key);
        if state.failing_loads.contains(key) {
            return Err(io_error("load refused"));
        }
        Ok(state.entries.get(key).cloned())
    }

    fn write(&self, key: &u32, value: &String) -> Result<(), BoxError> {
        let mut state = self.state.lock();
        state.writes.push((*key, value.clone()));
        if state.failing_writes.contains(key) {
            return Err(io_error("write refused"));
        }
        state.entries.insert(*key, value.clone());
        Ok(())
    }

    fn delete(&self, key: &u32) -> Result<(), BoxError> {
        let mut state = self.state.lock();
        state.deletes.push(*key);
        if state.failing_deletes.contains(key) {
            return Err(io_error("delete refused"));
        }
        state.entries.remove(key);
        Ok(())
    }

    fn load_all(&self, keys: &[u32]) -> Result<HashMap<u32, Option<String>>, LoadAllError<u32, String>> {
        if self.state.lock().fail_load_all {
            return Err(LoadAllError::Other(io_error("batch load refused")));
        }
        let mut failure = rust_cache::BulkLoadFailure::default();
        for key in keys {
            match self.load(key) {
                Ok(value) => {
                    failure.successes.insert(*key, value);
                }
                Err(cause) => {
                    failure.failures.insert(*key, Arc::from(cause));
                }
            }
        }
        if failure.failures.is_empty() {
            Ok(failure.successes)
        } else {
            Err(LoadAllError::Bulk(failure))
        }
    }

    fn delete_all(&self, keys: &[u32]) -> Result<(), WriteAllError<u32>> {
        if self.state.lock().fail_delete_all {
            return Err(WriteAllError::Other(io_error("batch delete refused")));
        }
        let mut failure = rust_cache::BulkWriteFailure::default();
        for key in keys {
            match self.delete(key) {
                Ok(()) => {
                    failure.successes.insert(*key);
                }
                Err(cause) => {
                    failure.failures.insert(*key, Arc::from(cause));
                }
            }
        }
        if failure.failures.is_empty() {
            Ok(())
        } else {
            Err(WriteAllError::Bulk(failure))
        }
    }
}

/// When the wrapped store should raise an access failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureMode {
    /// Behave normally.
    None,
    /// Fail before invoking any closure; mappings are untouched.
    Before,
    /// Run the operation against the delegate, then report failure anyway
    /// (models a store that applied the closure but failed on install).
    After,
    /// Fail with the diagnostic rethrowing error.
    Rethrow,
}

struct FailingState {
    mode: FailureMode,
    removes: Vec<u32>,
    clears: usize,
}

/// Store wrapper injecting [`StoreAccessError`]s around a [`ShardedStore`].
///
/// Invalidation (`remove`) always succeeds and is recorded, so tests can
/// assert that recovery invalidated the affected keys.
#[derive(Clone)]
pub struct FailingStore {
    delegate: Arc<ShardedStore<u32, String>>,
    state: Arc<Mutex<FailingState>>,
}

impl FailingStore {
    pub fn new() -> Self {
        Self {
            delegate: Arc::new(ShardedStore::with_shards(2)),
            state: Arc::new(Mutex::new(FailingState {
                mode: FailureMode::None,
                removes: Vec::new(),
                clears: 0,
            })),
        }
    }

    pub fn set_mode(&self, mode: FailureMode) {
        self.state.lock().mode = mode;
    }

    pub fn removes(&self) -> Vec<u32> {
        self.state.lock().removes.clone()
    }

    pub fn clears(&self) -> usize {
        self.state.lock().clears
    }

    fn mode(&self) -> FailureMode {
        self.state.lock().mode
    }

    fn error(&self) -> StoreAccessError {
        match self.mode() {
            FailureMode::Rethrow => StoreAccessError::rethrowing(io_error("injected rethrow")),
            _ => StoreAccessError::new(io_error("injected store failure")),
        }
    }
}

impl Default for FailingStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Store<u32, String> for FailingStore {
    fn get(&self, key: &u32) -> Result<Option<ValueHolder<String>>, StoreAccessError> {
        match self.mode() {
            FailureMode::None => self.delegate.get(key),
            _ => Err(self.error()),
        }
    }

    fn contains(&self, key: &u32) -> Result<bool, StoreAccessError> {
        match self.mode() {
            FailureMode::None => self.delegate.contains(key),
            _ => Err(self.error()),
        }
    }

    fn compute(
        &self,
        key: &u32,
        remap: &mut RemapFn<'_, u32, String>,
        replace_equal: bool,
    ) -> Result<Option<ValueHolder<String>>, ComputeError> {
        match self.mode() {
            FailureMode::None => self.delegate.compute(key, remap, replace_equal),
            FailureMode::Before | FailureMode::Rethrow => Err(ComputeError::Access(self.error())),
            FailureMode::After => {
                let _ = self.delegate.compute(key, remap, replace_equal);
                Err(ComputeError::Access(self.error()))
            }
        }
    }

    fn compute_if_absent(
        &self,
        key: &u32,
        fill: &mut FillFn<'_, u32, String>,
    ) -> Result<Option<ValueHolder<String>>, ComputeError> {
        match self.mode() {
            FailureMode::None => self.delegate.compute_if_absent(key, fill),
            FailureMode::Before | FailureMode::Rethrow => Err(ComputeError::Access(self.error())),
            FailureMode::After => {
                let _ = self.delegate.compute_if_absent(key, fill);
                Err(ComputeError::Access(self.error()))
            }
        }
    }

    fn bulk_compute(
        &self,
        keys: &[u32],
        remap: &mut BulkRemapFn<'_, u32, String>,
    ) -> Result<Vec<(u32, Option<ValueHolder<String>>)>, StoreAccessError> {
        match self.mode() {
            FailureMode::None => self.delegate.bulk_compute(keys, remap),
            _ => Err(self.error()),
        }
    }

    fn bulk_compute_if_absent(
        &self,
        keys: &[u32],
        fill: &mut BulkFillFn<'_, u32, String>,
    ) -> Result<Vec<(u32, Option<ValueHolder<String>>)>, StoreAccessError> {
        match self.mode() {
            FailureMode::None => self.delegate.bulk_compute_if_absent(keys, fill),
            _ => Err(self.error()),
        }
    }

    fn remove(&self, key: &u32) -> Result<(), StoreAccessError> {
        self.state.lock().removes.push(*key);
        self.delegate.remove(key)
    }

    fn clear(&self) -> Result<(), StoreAccessError> {
        let mode = {
            let mut state = self.state.lock();
            state.clears += 1;
            state.mode
        };
        match mode {
            FailureMode::None => self.delegate.clear(),
            _ => Err(self.error()),
        }
    }
}
