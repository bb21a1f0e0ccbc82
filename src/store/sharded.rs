//! In-memory sharded store.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use parking_lot::Mutex;

use crate::errors::StoreAccessError;

use super::{BulkFillFn, BulkRemapFn, ComputeError, FillFn, RemapFn, Store, ValueHolder};

/// Hash-sharded in-memory [`Store`].
///
/// Each shard is a mutex-guarded map; holding the shard lock across a remap
/// invocation provides the per-key linearization the store contract
/// requires. Bulk operations group keys by shard and present each group as
/// one sub-batch.
#[derive(Debug)]
pub struct ShardedStore<K, V> {
    shards: Vec<Mutex<HashMap<K, ValueHolder<V>>>>,
    mask: usize,
}

impl<K, V> ShardedStore<K, V> {
    /// A store with one shard per available core, rounded up to a power of
    /// two.
    pub fn new() -> Self {
        Self::with_shards(num_cpus::get())
    }

    /// A store with at least `shards` shards (rounded up to a power of two).
    pub fn with_shards(shards: usize) -> Self {
        let count = shards.max(1).next_power_of_two();
        let shards = (0..count).map(|_| Mutex::new(HashMap::new())).collect();
        Self {
            shards,
            mask: count - 1,
        }
    }

    /// Number of mappings across all shards.
    pub fn len(&self) -> usize {
        self.shards.iter().map(|shard| shard.lock().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K, V> Default for ShardedStore<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> ShardedStore<K, V>
where
    K: Eq + Hash,
{
    fn shard_index(&self, key: &K) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() as usize) & self.mask
    }

    fn shard(&self, key: &K) -> &Mutex<HashMap<K, ValueHolder<V>>> {
        &self.shards[self.shard_index(key)]
    }
}

impl<K, V> Store<K, V> for ShardedStore<K, V>
where
    K: Clone + Eq + Hash + Send + Sync,
    V: Clone + PartialEq + Send + Sync,
{
    fn get(&self, key: &K) -> Result<Option<ValueHolder<V>>, StoreAccessError> {
        Ok(self.shard(key).lock().get(key).cloned())
    }

    fn contains(&self, key: &K) -> Result<bool, StoreAccessError> {
        Ok(self.shard(key).lock().contains_key(key))
    }

    fn compute(
        &self,
        key: &K,
        remap: &mut RemapFn<'_, K, V>,
        replace_equal: bool,
    ) -> Result<Option<ValueHolder<V>>, ComputeError> {
        let mut shard = self.shard(key).lock();
        let existing = shard.get(key).cloned();
        let next = remap(key, existing.as_ref().map(ValueHolder::value))
            .map_err(ComputeError::Fault)?;
        match next {
            None => {
                shard.remove(key);
                Ok(None)
            }
            Some(value) => {
                if !replace_equal {
                    if let Some(holder) = existing {
                        if *holder.value() == value {
                            return Ok(Some(holder));
                        }
                    }
                }
                let holder = ValueHolder::new(value);
                shard.insert(key.clone(), holder.clone());
                Ok(Some(holder))
            }
        }
    }

    fn compute_if_absent(
        &self,
        key: &K,
        fill: &mut FillFn<'_, K, V>,
    ) -> Result<Option<ValueHolder<V>>, ComputeError> {
        let mut shard = self.shard(key).lock();
        if let Some(holder) = shard.get(key) {
            return Ok(Some(holder.clone()));
        }
        match fill(key).map_err(ComputeError::Fault)? {
            Some(value) => {
                let holder = ValueHolder::new(value);
                shard.insert(key.clone(), holder.clone());
                Ok(Some(holder))
            }
            None => Ok(None),
        }
    }

    fn bulk_compute(
        &self,
        keys: &[K],
        remap: &mut BulkRemapFn<'_, K, V>,
    ) -> Result<Vec<(K, Option<ValueHolder<V>>)>, StoreAccessError> {
        let mut groups: Vec<Vec<K>> = vec![Vec::new(); self.shards.len()];
        for key in keys {
            groups[self.shard_index(key)].push(key.clone());
        }

        let mut outcomes: HashMap<K, Option<ValueHolder<V>>> = HashMap::with_capacity(keys.len());
        for (index, group) in groups.iter().enumerate() {
            if group.is_empty() {
                continue;
            }
            let mut shard = self.shards[index].lock();
            let batch: Vec<(K, Option<V>)> = group
                .iter()
                .map(|key| (key.clone(), shard.get(key).map(|h| h.value().clone())))
                .collect();
            for (key, decision) in remap(&batch) {
                match decision {
                    Some(value) => {
                        // An unchanged value keeps its holder.
                        if let Some(holder) = shard.get(&key) {
                            if *holder.value() == value {
                                outcomes.insert(key, Some(holder.clone()));
                                continue;
                            }
                        }
                        let holder = ValueHolder::new(value);
                        shard.insert(key.clone(), holder.clone());
                        outcomes.insert(key, Some(holder));
                    }
                    None => {
                        shard.remove(&key);
                        outcomes.insert(key, None);
                    }
                }
            }
        }

        Ok(keys
            .iter()
            .map(|key| (key.clone(), outcomes.get(key).cloned().flatten()))
            .collect())
    }

    fn bulk_compute_if_absent(
        &self,
        keys: &[K],
        fill: &mut BulkFillFn<'_, K, V>,
    ) -> Result<Vec<(K, Option<ValueHolder<V>>)>, StoreAccessError> {
        let mut groups: Vec<Vec<K>> = vec![Vec::new(); self.shards.len()];
        for key in keys {
            groups[self.shard_index(key)].push(key.clone());
        }

        let mut outcomes: HashMap<K, Option<ValueHolder<V>>> = HashMap::with_capacity(keys.len());
        for (index, group) in groups.iter().enumerate() {
            if group.is_empty() {
                continue;
            }
            let mut shard = self.shards[index].lock();
            let mut absent: Vec<K> = Vec::new();
            for key in group {
                match shard.get(key) {
                    Some(holder) => {
                        outcomes.insert(key.clone(), Some(holder.clone()));
                    }
                    None => absent.push(key.clone()),
                }
            }
            if absent.is_empty() {
                continue;
            }
            for (key, loaded) in fill(&absent) {
                match loaded {
                    Some(value) => {
                        let holder = ValueHolder::new(value);
                        shard.insert(key.clone(), holder.clone());
                        outcomes.insert(key, Some(holder));
                    }
                    None => {
                        outcomes.insert(key, None);
                    }
                }
            }
        }

        Ok(keys
            .iter()
            .map(|key| (key.clone(), outcomes.get(key).cloned().flatten()))
            .collect())
    }

    fn remove(&self, key: &K) -> Result<(), StoreAccessError> {
        self.shard(key).lock().remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreAccessError> {
        for shard in &self.shards {
            shard.lock().clear();
        }
        Ok(())
    }
}
