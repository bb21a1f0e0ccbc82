//! Storage tier abstraction.
//!
//! A store is an atomic per-key mapping primitive: it runs caller-supplied
//! remap functions under its own per-key linearization and reports its own
//! failures as [`StoreAccessError`]. Loader/writer failures raised inside a
//! remap function travel back on a typed channel ([`ComputeError::Fault`])
//! rather than masquerading as store failures.

mod sharded;

pub use sharded::ShardedStore;

use chrono::{DateTime, Utc};

use crate::errors::{SourceFault, StoreAccessError};

/// Immutable wrapper around a stored value.
///
/// Carries the metadata the store attaches to a mapping; the engine only
/// ever reads the value out of it.
#[derive(Debug, Clone)]
pub struct ValueHolder<V> {
    value: V,
    created_at: DateTime<Utc>,
}

impl<V> ValueHolder<V> {
    pub fn new(value: V) -> Self {
        Self {
            value,
            created_at: Utc::now(),
        }
    }

    pub fn value(&self) -> &V {
        &self.value
    }

    pub fn into_value(self) -> V {
        self.value
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Outcome channel of a per-key compute.
#[derive(Debug)]
pub enum ComputeError {
    /// The store itself failed; the state of the mapping is undetermined.
    Access(StoreAccessError),
    /// The remap function refused the computation; the mapping is untouched.
    Fault(SourceFault),
}

impl From<StoreAccessError> for ComputeError {
    fn from(error: StoreAccessError) -> Self {
        ComputeError::Access(error)
    }
}

/// Per-key remap function: `(key, current value) -> new value`, where
/// `None` means absent on both sides.
pub type RemapFn<'a, K, V> = dyn FnMut(&K, Option<&V>) -> Result<Option<V>, SourceFault> + 'a;

/// Fill function invoked only when the key has no mapping.
pub type FillFn<'a, K, V> = dyn FnMut(&K) -> Result<Option<V>, SourceFault> + 'a;

/// Batch remap over `(key, current value)` entries. Returns the
/// installation decision for every entry of the batch, in batch order.
pub type BulkRemapFn<'a, K, V> = dyn FnMut(&[(K, Option<V>)]) -> Vec<(K, Option<V>)> + 'a;

/// Batch fill over absent keys.
pub type BulkFillFn<'a, K, V> = dyn FnMut(&[K]) -> Vec<(K, Option<V>)> + 'a;

/// Atomic per-key mapping primitive.
///
/// Implementations linearize remap invocations per key: two computes for
/// the same key never run concurrently, and each observes the state left by
/// the previous one. Batch functions take `&mut` receivers, so invocations
/// within a single bulk call are serial by construction; sub-batches are
/// disjoint.
pub trait Store<K, V>: Send + Sync {
    /// Current holder for `key`.
    fn get(&self, key: &K) -> Result<Option<ValueHolder<V>>, StoreAccessError>;

    /// Whether `key` currently has a mapping.
    fn contains(&self, key: &K) -> Result<bool, StoreAccessError>;

    /// Atomically remaps `key`, installing the returned value (or removing
    /// the mapping on `None`) and returning the resulting holder.
    ///
    /// With `replace_equal` false, a returned value equal to the current
    /// one keeps the existing holder instead of reinstalling.
    fn compute(
        &self,
        key: &K,
        remap: &mut RemapFn<'_, K, V>,
        replace_equal: bool,
    ) -> Result<Option<ValueHolder<V>>, ComputeError>;

    /// Runs `fill` only when `key` is absent, installing a `Some` result.
    fn compute_if_absent(
        &self,
        key: &K,
        fill: &mut FillFn<'_, K, V>,
    ) -> Result<Option<ValueHolder<V>>, ComputeError>;

    /// Remaps a batch of keys. `remap` may be invoked several times over
    /// disjoint sub-batches; the result carries an entry per input key, in
    /// input order.
    fn bulk_compute(
        &self,
        keys: &[K],
        remap: &mut BulkRemapFn<'_, K, V>,
    ) -> Result<Vec<(K, Option<ValueHolder<V>>)>, StoreAccessError>;

    /// Like [`bulk_compute`](Store::bulk_compute) but `fill` only sees the
    /// keys that currently have no mapping.
    fn bulk_compute_if_absent(
        &self,
        keys: &[K],
        fill: &mut BulkFillFn<'_, K, V>,
    ) -> Result<Vec<(K, Option<ValueHolder<V>>)>, StoreAccessError>;

    /// Best-effort invalidation of a single mapping.
    fn remove(&self, key: &K) -> Result<(), StoreAccessError>;

    /// Drops every mapping.
    fn clear(&self) -> Result<(), StoreAccessError>;
}
