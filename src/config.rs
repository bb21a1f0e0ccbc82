//! Cache configuration.

/// Configuration for a loader/writer-integrated cache.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CacheConfig {
    /// Name used in diagnostics.
    pub name: String,
    /// Whether atomic operations (put-if-absent, conditional remove and
    /// replace) consult the loader for the current value before deciding.
    pub use_loader_in_atomics: bool,
}

impl CacheConfig {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            name: String::from("cache"),
            use_loader_in_atomics: true,
        }
    }
}
