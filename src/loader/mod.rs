//! External source-of-truth abstraction.
//!
//! The cache is a cache *of* this interface: reads fall through to
//! [`CacheLoaderWriter::load`], and every mutation is propagated to the
//! writer before the store installs it.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use crate::errors::{BoxError, BulkLoadFailure, BulkWriteFailure};

/// Failure of a bulk load.
#[derive(Debug)]
pub enum LoadAllError<K, V> {
    /// Part of the batch loaded; the payload carries per-key outcomes.
    Bulk(BulkLoadFailure<K, V>),
    /// The batch failed as a whole; no per-key information is available.
    Other(BoxError),
}

/// Failure of a bulk write or delete.
#[derive(Debug)]
pub enum WriteAllError<K> {
    /// Part of the batch was written; the payload carries per-key outcomes.
    Bulk(BulkWriteFailure<K>),
    /// The batch failed as a whole; the state of every key is undetermined.
    Other(BoxError),
}

/// Read/write access to the authoritative copy of the data.
///
/// The bulk methods have default implementations in terms of the per-key
/// ones, collecting per-key outcomes into the structured bulk failures.
/// Sources with a native batch API should override them.
pub trait CacheLoaderWriter<K, V>: Send + Sync
where
    K: Clone + Eq + Hash,
{
    /// Authoritative value for `key`; `None` when the source has no entry.
    fn load(&self, key: &K) -> Result<Option<V>, BoxError>;

    /// Propagates a new mapping to the source.
    fn write(&self, key: &K, value: &V) -> Result<(), BoxError>;

    /// Removes a mapping from the source.
    fn delete(&self, key: &K) -> Result<(), BoxError>;

    /// Authoritative values for a batch of keys. Keys may be omitted from
    /// the result or mapped to `None`; both mean the source has no entry.
    fn load_all(&self, keys: &[K]) -> Result<HashMap<K, Option<V>>, LoadAllError<K, V>> {
        let mut failure = BulkLoadFailure::default();
        for key in keys {
            match self.load(key) {
                Ok(value) => {
                    failure.successes.insert(key.clone(), value);
                }
                Err(cause) => {
                    failure.failures.insert(key.clone(), Arc::from(cause));
                }
            }
        }
        if failure.failures.is_empty() {
            Ok(failure.successes)
        } else {
            Err(LoadAllError::Bulk(failure))
        }
    }

    /// Propagates a batch of mappings to the source.
    fn write_all(&self, entries: &[(K, V)]) -> Result<(), WriteAllError<K>> {
        let mut failure = BulkWriteFailure::default();
        for (key, value) in entries {
            match self.write(key, value) {
                Ok(()) => {
                    failure.successes.insert(key.clone());
                }
                Err(cause) => {
                    failure.failures.insert(key.clone(), Arc::from(cause));
                }
            }
        }
        if failure.failures.is_empty() {
            Ok(())
        } else {
            Err(WriteAllError::Bulk(failure))
        }
    }

    /// Removes a batch of mappings from the source.
    fn delete_all(&self, keys: &[K]) -> Result<(), WriteAllError<K>> {
        let mut failure = BulkWriteFailure::default();
        for key in keys {
            match self.delete(key) {
                Ok(()) => {
                    failure.successes.insert(key.clone());
                }
                Err(cause) => {
                    failure.failures.insert(key.clone(), Arc::from(cause));
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

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct FlakyBackend {
        bad_key: u32,
        deleted: Mutex<Vec<u32>>,
    }

    impl CacheLoaderWriter<u32, String> for FlakyBackend {
        fn load(&self, key: &u32) -> Result<Option<String>, BoxError> {
            if *key == self.bad_key {
                Err(Box::new(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "unreachable key",
                )))
            } else {
                Ok(Some(format!("value-{}", key)))
            }
        }

        fn write(&self, key: &u32, _value: &String) -> Result<(), BoxError> {
            if *key == self.bad_key {
                Err(Box::new(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "unreachable key",
                )))
            } else {
                Ok(())
            }
        }

        fn delete(&self, key: &u32) -> Result<(), BoxError> {
            self.deleted.lock().push(*key);
            Ok(())
        }
    }

    #[test]
    fn test_default_load_all_collects_per_key_outcomes() {
        let backend = FlakyBackend {
            bad_key: 2,
            deleted: Mutex::new(Vec::new()),
        };
        let error = backend.load_all(&[1, 2, 3]).unwrap_err();
        match error {
            LoadAllError::Bulk(failure) => {
                assert_eq!(failure.successes.len(), 2);
                assert_eq!(
                    failure.successes.get(&1),
                    Some(&Some("value-1".to_string()))
                );
                assert!(failure.failures.contains_key(&2));
            }
            LoadAllError::Other(_) => panic!("expected per-key outcomes"),
        }
    }

    #[test]
    fn test_default_write_all_reports_written_keys() {
        let backend = FlakyBackend {
            bad_key: 9,
            deleted: Mutex::new(Vec::new()),
        };
        let error = backend
            .write_all(&[(8, "a".to_string()), (9, "b".to_string())])
            .unwrap_err();
        match error {
            WriteAllError::Bulk(failure) => {
                assert!(failure.successes.contains(&8));
                assert!(failure.failures.contains_key(&9));
            }
            WriteAllError::Other(_) => panic!("expected per-key outcomes"),
        }
    }

    #[test]
    fn test_default_delete_all_visits_every_key() {
        let backend = FlakyBackend {
            bad_key: 0,
            deleted: Mutex::new(Vec::new()),
        };
        backend.delete_all(&[4, 5]).unwrap();
        assert_eq!(*backend.deleted.lock(), vec![4, 5]);
    }
}
