//! Storage backend adapters.
//!
//! Every backend is a dumb key→record store with TTL and an advisory lock
//! flag, behind one uniform capability set. The policy engine never knows
//! which medium it is talking to.
//!
//! # Available backends
//!
//! - [`Memory`](memory::Memory) — in-process store (always available)
//! - [`Generational`](generational::Generational) — prefix-delete emulation
//!   wrapper for stores without key enumeration
//! - `Redis` — networked store (feature `redis-backend`)

use async_trait::async_trait;

use crate::error::CacheError;
use crate::record::CacheRecord;

pub mod generational;
pub mod memory;

#[cfg(feature = "redis-backend")]
pub mod redis;

/// Uniform capability set over one storage medium.
///
/// Keys are already normalized when they reach a backend; backends only add
/// their own namespace prefix (and the `_lock` suffix for lock markers).
///
/// `delete` removes the key, its lock marker, and every logical sub-key.
/// Lock markers are written with the backend's configured TTL; an expired
/// marker reads as unlocked.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Short name for diagnostics.
    fn name(&self) -> &'static str;

    /// Whether this adapter can operate in the current environment.
    ///
    /// Adapters reporting `false` are silently dropped at pool construction;
    /// absence of a capability is not exceptional.
    fn available(&self) -> bool {
        true
    }

    async fn get(&self, key: &str) -> Result<Option<CacheRecord>, CacheError>;

    async fn put(&self, key: &str, record: CacheRecord) -> Result<(), CacheError>;

    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    /// Clear the entire namespace.
    async fn flush(&self) -> Result<(), CacheError>;

    async fn lock(&self, key: &str) -> Result<(), CacheError>;

    async fn unlock(&self, key: &str) -> Result<(), CacheError>;

    async fn is_locked(&self, key: &str) -> Result<bool, CacheError>;
}
