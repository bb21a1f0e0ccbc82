//! Cache assembly.

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use crate::config::CacheConfig;
use crate::expiry::{ExpiryPolicy, NoExpiry};
use crate::loader::CacheLoaderWriter;
use crate::resilience::{ResilienceStrategy, RobustResilienceStrategy};
use crate::stats::{CacheObserver, NoopObserver};
use crate::store::{ShardedStore, Store};

use super::engine::Cache;

/// Consuming builder for a [`Cache`].
///
/// Only the loader/writer is mandatory; the store defaults to a
/// [`ShardedStore`] and the resilience strategy to a
/// [`RobustResilienceStrategy`] over the same store and loader/writer.
/// Construction is bottom-up: collaborators are built first and the engine
/// holds non-owning handles to them.
pub struct CacheBuilder<K, V>
where
    K: Clone + Eq + Hash + 'static,
    V: 'static,
{
    config: CacheConfig,
    store: Option<Arc<dyn Store<K, V>>>,
    loader_writer: Arc<dyn CacheLoaderWriter<K, V>>,
    resilience: Option<Arc<dyn ResilienceStrategy<K, V>>>,
    expiry: Arc<dyn ExpiryPolicy<K, V>>,
    observer: Arc<dyn CacheObserver>,
}

impl<K, V> CacheBuilder<K, V>
where
    K: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static,
    V: Clone + PartialEq + fmt::Debug + Send + Sync + 'static,
{
    /// Starts a builder around the external source of truth.
    pub fn new<L>(loader_writer: L) -> Self
    where
        L: CacheLoaderWriter<K, V> + 'static,
    {
        Self {
            config: CacheConfig::default(),
            store: None,
            loader_writer: Arc::new(loader_writer),
            resilience: None,
            expiry: Arc::new(NoExpiry),
            observer: Arc::new(NoopObserver),
        }
    }

    pub fn config(mut self, config: CacheConfig) -> Self {
        self.config = config;
        self
    }

    pub fn store<S>(mut self, store: S) -> Self
    where
        S: Store<K, V> + 'static,
    {
        self.store = Some(Arc::new(store));
        self
    }

    pub fn resilience<R>(mut self, resilience: R) -> Self
    where
        R: ResilienceStrategy<K, V> + 'static,
    {
        self.resilience = Some(Arc::new(resilience));
        self
    }

    pub fn expiry<E>(mut self, expiry: E) -> Self
    where
        E: ExpiryPolicy<K, V> + 'static,
    {
        self.expiry = Arc::new(expiry);
        self
    }

    pub fn observer<O>(mut self, observer: O) -> Self
    where
        O: CacheObserver + 'static,
    {
        self.observer = Arc::new(observer);
        self
    }

    /// Assembles the cache. The result still needs [`Cache::init`] before
    /// it accepts operations.
    pub fn build(self) -> Cache<K, V> {
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(ShardedStore::new()));
        let resilience = self.resilience.unwrap_or_else(|| {
            Arc::new(RobustResilienceStrategy::new(
                store.clone(),
                self.loader_writer.clone(),
            ))
        });
        Cache::from_parts(
            self.config,
            store,
            self.loader_writer,
            resilience,
            self.expiry,
            self.observer,
        )
    }
}
