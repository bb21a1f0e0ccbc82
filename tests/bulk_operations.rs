//! Integration tests for bulk operations.
//!
//! Bulk calls are sets of independent per-key atomic effects: these tests
//! pin down the success/failure accounting across batches, the propagation
//! of partial bulk failures, and the empty-input short circuits.

mod common;

use std::collections::HashMap;

use common::RecordingSource;
use rust_cache::{Cache, CacheBuilder, CacheError, ExpiryPolicy};

fn cache_over(source: &RecordingSource) -> Cache<u32, String> {
    let cache = CacheBuilder::new(source.clone()).build();
    cache.init().unwrap();
    cache
}

#[test]
fn test_get_all_mixes_cached_and_loaded_entries() {
    let source = RecordingSource::new();
    source.insert(2, "loaded");
    let cache = cache_over(&source);
    cache.put(1, "cached".to_string()).unwrap();

    let result = cache.get_all(vec![1, 2, 3], true).unwrap();

    assert_eq!(result.len(), 3);
    assert_eq!(result.get(&1), Some(&Some("cached".to_string())));
    assert_eq!(result.get(&2), Some(&Some("loaded".to_string())));
    assert_eq!(result.get(&3), Some(&None));

    let mut loads = source.loads();
    loads.sort_unstable();
    assert_eq!(loads, vec![2, 3]);

    // Loaded values are installed; a second call produces no new loads.
    cache.get_all(vec![1, 2], true).unwrap();
    assert_eq!(source.loads().len(), 2);
}

#[test]
fn test_get_all_without_nulls_omits_missing_keys() {
    let source = RecordingSource::new();
    source.insert(1, "one");
    let cache = cache_over(&source);

    let result = cache.get_all(vec![1, 2], false).unwrap();
    assert_eq!(result.len(), 1);
    assert_eq!(result.get(&1), Some(&Some("one".to_string())));
    assert!(!result.contains_key(&2));
}

#[test]
fn test_get_all_empty_keys_is_a_no_op() {
    let source = RecordingSource::new();
    let cache = cache_over(&source);

    let result = cache.get_all(Vec::new(), true).unwrap();
    assert!(result.is_empty());
    assert!(source.loads().is_empty());
}

#[test]
fn test_get_all_partial_load_failure_carries_outcomes() {
    let source = RecordingSource::new();
    source.insert(1, "one");
    source.fail_load(2);
    let cache = cache_over(&source);

    let error = cache.get_all(vec![1, 2], true).unwrap_err();
    match error {
        CacheError::BulkLoading(failure) => {
            assert_eq!(
                failure.successes.get(&1),
                Some(&Some("one".to_string()))
            );
            assert!(failure.failures.contains_key(&2));
            assert!(!failure.failures.contains_key(&1));
        }
        other => panic!("expected bulk loading failure, got {:?}", other),
    }
    // The loadable key was still installed.
    assert!(cache.contains_key(&1).unwrap());
    assert!(!cache.contains_key(&2).unwrap());
}

#[test]
fn test_get_all_generic_load_failure_fails_every_key() {
    let source = RecordingSource::new();
    source.fail_load_all();
    let cache = cache_over(&source);

    let error = cache.get_all(vec![1, 2], true).unwrap_err();
    match error {
        CacheError::BulkLoading(failure) => {
            assert!(failure.successes.is_empty());
            assert_eq!(failure.failures.len(), 2);
        }
        other => panic!("expected bulk loading failure, got {:?}", other),
    }
}

#[test]
fn test_put_all_then_get_all_round_trip() {
    let source = RecordingSource::new();
    let cache = cache_over(&source);

    let entries: HashMap<u32, String> = (1..=3)
        .map(|key| (key, format!("value-{}", key)))
        .collect();
    cache.put_all(entries.clone()).unwrap();

    assert_eq!(source.writes().len(), 3);
    for (key, value) in &entries {
        assert_eq!(source.entry(*key), Some(value.clone()));
    }

    let result = cache.get_all(entries.keys().copied(), true).unwrap();
    assert_eq!(result.len(), 3);
    for (key, value) in entries {
        assert_eq!(result.get(&key), Some(&Some(value)));
    }
    assert!(source.loads().is_empty());
}

#[test]
fn test_put_all_partial_write_failure_keeps_failed_key_out() {
    let source = RecordingSource::new();
    source.fail_write(2);
    let cache = cache_over(&source);

    let error = cache
        .put_all(vec![(1, "1".to_string()), (2, "2".to_string())])
        .unwrap_err();
    match error {
        CacheError::BulkWriting(failure) => {
            assert!(failure.successes.contains(&1));
            assert_eq!(failure.successes.len(), 1);
            assert!(failure.failures.contains_key(&2));
            assert_eq!(failure.failures.len(), 1);
        }
        other => panic!("expected bulk writing failure, got {:?}", other),
    }

    assert!(cache.contains_key(&1).unwrap());
    assert!(!cache.contains_key(&2).unwrap());
    assert_eq!(source.entry(1), Some("1".to_string()));
    assert_eq!(source.entry(2), None);
}

#[test]
fn test_put_all_empty_is_a_no_op() {
    let source = RecordingSource::new();
    let cache = cache_over(&source);

    cache.put_all(Vec::new()).unwrap();
    assert!(source.writes().is_empty());
}

struct RejectCreations;

impl ExpiryPolicy<u32, String> for RejectCreations {
    fn expires_on_creation(&self, _key: &u32, _value: &String) -> bool {
        true
    }
}

#[test]
fn test_put_all_expired_values_are_written_but_not_installed() {
    let source = RecordingSource::new();
    let cache = CacheBuilder::new(source.clone())
        .expiry(RejectCreations)
        .build();
    cache.init().unwrap();

    cache.put_all(vec![(1, "one".to_string())]).unwrap();
    assert_eq!(source.entry(1), Some("one".to_string()));
    assert!(!cache.contains_key(&1).unwrap());
}

#[test]
fn test_remove_all_deletes_from_source_and_store() {
    let source = RecordingSource::new();
    let cache = cache_over(&source);
    cache.put(1, "one".to_string()).unwrap();
    cache.put(2, "two".to_string()).unwrap();

    cache.remove_all(vec![1, 2]).unwrap();

    let mut deletes = source.deletes();
    deletes.sort_unstable();
    assert_eq!(deletes, vec![1, 2]);
    assert!(!cache.contains_key(&1).unwrap());
    assert!(!cache.contains_key(&2).unwrap());
    assert_eq!(source.entry(1), None);
    assert_eq!(source.entry(2), None);
}

#[test]
fn test_remove_all_partial_delete_failure_keeps_failed_value_cached() {
    let source = RecordingSource::new();
    source.fail_delete(2);
    let cache = cache_over(&source);
    cache.put(1, "one".to_string()).unwrap();
    cache.put(2, "two".to_string()).unwrap();

    let error = cache.remove_all(vec![1, 2]).unwrap_err();
    match error {
        CacheError::BulkWriting(failure) => {
            assert!(failure.successes.contains(&1));
            assert!(failure.failures.contains_key(&2));
        }
        other => panic!("expected bulk writing failure, got {:?}", other),
    }

    assert!(!cache.contains_key(&1).unwrap());
    // The delete failed cleanly, so the cached entry is still trusted.
    assert_eq!(cache.get(&2).unwrap(), Some("two".to_string()));
}

#[test]
fn test_remove_all_generic_failure_invalidates_unknown_state_keys() {
    let source = RecordingSource::new();
    source.fail_delete_all();
    let cache = cache_over(&source);
    cache.put(1, "one".to_string()).unwrap();

    let error = cache.remove_all(vec![1]).unwrap_err();
    match error {
        CacheError::BulkWriting(failure) => {
            assert!(failure.successes.is_empty());
            assert!(failure.failures.contains_key(&1));
        }
        other => panic!("expected bulk writing failure, got {:?}", other),
    }
    // Deletion state is unknown, so the possibly stale entry is dropped.
    assert!(!cache.contains_key(&1).unwrap());
}

#[test]
fn test_remove_all_empty_is_a_no_op() {
    let source = RecordingSource::new();
    let cache = cache_over(&source);

    cache.remove_all(Vec::new()).unwrap();
    assert!(source.deletes().is_empty());
}

#[test]
fn test_bulk_calls_deduplicate_keys() {
    let source = RecordingSource::new();
    source.insert(1, "one");
    let cache = cache_over(&source);

    let result = cache.get_all(vec![1, 1, 1], true).unwrap();
    assert_eq!(result.len(), 1);
    assert_eq!(source.loads(), vec![1]);
}
