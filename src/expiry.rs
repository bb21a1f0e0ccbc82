//! Expiration admission seam.
//!
//! The engine consults this policy before installing a value produced by a
//! replace or a bulk put; a value that is already expired at install time
//! is turned into an absent mapping instead. Time-based eviction itself
//! belongs to the storage tier.

/// Decides whether a value produced by an operation is still live.
pub trait ExpiryPolicy<K, V>: Send + Sync {
    /// True when a mapping created with `value` would already be expired.
    fn expires_on_creation(&self, _key: &K, _value: &V) -> bool {
        false
    }

    /// True when replacing `old` with `new` would install an already
    /// expired mapping.
    fn expires_on_update(&self, _key: &K, _old: &V, _new: &V) -> bool {
        false
    }
}

/// Keeps every mapping.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoExpiry;

impl<K, V> ExpiryPolicy<K, V> for NoExpiry {}
