//! rust_cache - loader/writer-integrated key/value cache.
//!
//! An in-process cache whose mutations are routed through a user-supplied
//! external source of truth: reads fall through to the loader on a miss,
//! writes and removals reach the writer before the store installs them,
//! and a resilience strategy keeps the source-of-truth contract intact
//! when the storage tier itself fails.
//!
//! The engine runs on the calling thread; atomicity comes from the store's
//! per-key linearization. Cross-key atomicity is not provided: a bulk
//! operation is a set of independent per-key atomic effects.

pub mod cache;
pub mod config;
pub mod errors;
pub mod expiry;
pub mod loader;
pub mod resilience;
pub mod stats;
pub mod store;

pub use cache::{Cache, CacheBuilder, LifecycleError, Status, StatusGate};
pub use config::CacheConfig;
pub use errors::{
    BoxError, BulkLoadFailure, BulkWriteFailure, CacheError, CacheResult, SourceError,
    SourceFault, StoreAccessError,
};
pub use expiry::{ExpiryPolicy, NoExpiry};
pub use loader::{CacheLoaderWriter, LoadAllError, WriteAllError};
pub use resilience::{ResilienceStrategy, RobustResilienceStrategy, SourceProgress};
pub use stats::{
    CacheObserver, CacheStatistics, ConditionalRemoveOutcome, GetOutcome, NoopObserver,
    PutIfAbsentOutcome, PutOutcome, RemoveOutcome, ReplaceOutcome,
};
pub use store::{
    BulkFillFn, BulkRemapFn, ComputeError, FillFn, RemapFn, ShardedStore, Store, ValueHolder,
};
