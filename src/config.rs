//! Cache configuration shared by the storage backends.

use serde::Deserialize;
use time::Duration;

// Default values for cache configuration
const DEFAULT_NAMESPACE: &str = "sfoglia";
const DEFAULT_LOCK_TTL_SECS: u64 = 60;

/// Backend-level settings.
///
/// The lock TTL bounds worst-case stampede-lock starvation: a regeneration
/// that never settles leaves the key locked only until the marker expires.
/// It applies uniformly to every backend.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Namespace prefixed to every physical storage key.
    pub namespace: String,
    /// Lifetime of advisory lock markers, in seconds.
    pub lock_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            lock_ttl_secs: DEFAULT_LOCK_TTL_SECS,
        }
    }
}

impl CacheConfig {
    /// Create a config with a custom namespace and default lock TTL.
    pub fn with_namespace(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            ..Self::default()
        }
    }

    pub fn lock_ttl(&self) -> Duration {
        Duration::seconds(self.lock_ttl_secs as i64)
    }
}
