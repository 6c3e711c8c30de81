//! Per-key cache handle.
//!
//! An [`Item`] owns the decision logic for staleness, locking, and the
//! read/write protocol across the backend chain. Handles are cheap and
//! ephemeral: one is created per `Pool::get_item`/`Pool::get` call, with no
//! I/O until the first read.
//!
//! Handle state is explicit rather than sentinel-based: `snapshot` is `None`
//! until the first load, and `locked` is `None` until the lock state has been
//! checked once. Both are memoized for the handle's lifetime; `clear` resets
//! them to unknown.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::backend::Backend;
use crate::error::CacheError;
use crate::key::CacheKey;
use crate::policy::{CachePolicy, PolicyData};
use crate::record::{CacheRecord, Expiration, Expiry, now_ms};

const SOURCE: &str = "sfoglia::item";

/// Last-loaded record state, kept for the handle's lifetime.
#[derive(Debug, Clone, PartialEq)]
struct Snapshot {
    value: Option<Value>,
    expiration: Expiration,
}

/// Handle for a single normalized key over a pool's backend chain.
pub struct Item {
    key: CacheKey,
    backends: Arc<Vec<Arc<dyn Backend>>>,
    snapshot: Option<Snapshot>,
    locked: Option<bool>,
    policy: CachePolicy,
    policy_data: PolicyData,
}

impl fmt::Debug for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Item")
            .field("key", &self.key)
            .field("loaded", &self.snapshot.is_some())
            .field("locked", &self.locked)
            .field("policy", &self.policy)
            .finish()
    }
}

impl Item {
    pub(crate) fn new(key: CacheKey, backends: Arc<Vec<Arc<dyn Backend>>>) -> Self {
        Self {
            key,
            backends,
            snapshot: None,
            locked: None,
            policy: CachePolicy::NONE,
            policy_data: PolicyData::None,
        }
    }

    pub fn key(&self) -> &str {
        self.key.as_str()
    }

    /// The last-loaded value, if this handle has loaded one.
    pub fn value(&self) -> Option<&Value> {
        self.snapshot.as_ref().and_then(|snapshot| snapshot.value.as_ref())
    }

    /// The last-loaded expiration, if this handle has loaded one.
    pub fn expiration(&self) -> Option<Expiration> {
        self.snapshot.as_ref().map(|snapshot| snapshot.expiration)
    }

    /// Query backends in priority order and take the first non-null record.
    ///
    /// Tier priority reflects configuration, not recency; a back tier is not
    /// consulted once a front tier answers.
    async fn load(&self) -> Result<Option<CacheRecord>, CacheError> {
        for backend in self.backends.iter() {
            if let Some(record) = backend.get(self.key.as_str()).await? {
                debug!(
                    key = self.key.as_str(),
                    backend = backend.name(),
                    target_module = SOURCE,
                    "Cache record found"
                );
                return Ok(Some(record));
            }
        }
        Ok(None)
    }

    /// Write to every backend, most-durable tier first, so a reader racing
    /// the write never observes the front tier populated before the backing
    /// tiers. A mid-write failure leaves already-written tiers in place.
    async fn write(&self, record: &CacheRecord) -> Result<(), CacheError> {
        for backend in self.backends.iter().rev() {
            backend.put(self.key.as_str(), record.clone()).await?;
        }
        Ok(())
    }

    async fn ensure_loaded(&mut self) -> Result<(), CacheError> {
        if self.snapshot.is_some() {
            return Ok(());
        }
        let snapshot = match self.load().await? {
            Some(record) => Snapshot {
                value: Some(record.value),
                expiration: record.expiration,
            },
            None => Snapshot {
                value: None,
                expiration: Expiration::Never,
            },
        };
        self.snapshot = Some(snapshot);
        Ok(())
    }

    /// Read the value under the given policy.
    ///
    /// With [`CachePolicy::VALUE`] and a locked key this returns the
    /// fallback from `policy_data` immediately, without touching storage.
    /// Otherwise the record is loaded (once per handle) and its value
    /// returned, or `None` when every backend misses.
    pub async fn get(
        &mut self,
        policy: CachePolicy,
        policy_data: PolicyData,
    ) -> Result<Option<Value>, CacheError> {
        self.policy = policy;
        self.policy_data = policy_data;

        if self.policy.contains(CachePolicy::VALUE) && self.is_locked().await? {
            return Ok(self.policy_data.fallback().cloned());
        }

        self.ensure_loaded().await?;
        Ok(self
            .snapshot
            .as_ref()
            .and_then(|snapshot| snapshot.value.clone()))
    }

    /// Persist `value` under this key.
    ///
    /// Serializes the value (failing with `Validation` before anything is
    /// written), computes the absolute expiration, unconditionally unlocks
    /// the key, then writes through every tier.
    pub async fn set(&mut self, value: impl Serialize, expiry: Expiry) -> Result<(), CacheError> {
        let value = serde_json::to_value(value).map_err(CacheError::validation)?;
        let expiration = expiry.resolve(now_ms());

        self.snapshot = Some(Snapshot {
            value: Some(value.clone()),
            expiration,
        });

        self.unlock().await?;
        self.write(&CacheRecord::new(value, expiration)).await
    }

    /// Delete this key from every backend and reset the handle to unknown.
    pub async fn clear(&mut self) -> Result<(), CacheError> {
        self.snapshot = None;
        self.locked = None;
        for backend in self.backends.iter() {
            backend.delete(self.key.as_str()).await?;
        }
        Ok(())
    }

    /// Classify the current state as hit or miss under the active policy.
    ///
    /// Evaluation order (first match wins):
    /// 1. locked + `OLD` ⇒ hit: serve the stale value while another party
    ///    regenerates it;
    /// 2. unlocked + `PRECOMPUTE`, within the precompute window of a numeric
    ///    expiration ⇒ miss: regenerate before the hard cutover;
    /// 3. otherwise miss iff the value is absent or the expiration has
    ///    passed.
    pub async fn is_miss(&mut self) -> Result<bool, CacheError> {
        self.ensure_loaded().await?;
        let locked = self.is_locked().await?;
        let now = now_ms();

        let Some(snapshot) = self.snapshot.as_ref() else {
            return Ok(true);
        };

        if locked && self.policy.contains(CachePolicy::OLD) {
            return Ok(false);
        }

        if !locked && self.policy.contains(CachePolicy::PRECOMPUTE) {
            if let (Some(window), Some(remaining)) = (
                self.policy_data.precompute_window_ms(),
                snapshot.expiration.remaining_ms(now),
            ) {
                if window >= remaining {
                    return Ok(true);
                }
            }
        }

        Ok(snapshot.value.is_none() || snapshot.expiration.is_past(now))
    }

    /// Acquire the advisory lock on every backend. Best-effort: there is no
    /// compare-and-swap between observing unlocked and locking, so two racing
    /// callers may both believe they hold it. No-op when already known-locked.
    pub async fn lock(&mut self) -> Result<(), CacheError> {
        if self.locked == Some(true) {
            return Ok(());
        }
        self.locked = Some(true);
        for backend in self.backends.iter() {
            backend.lock(self.key.as_str()).await?;
        }
        Ok(())
    }

    /// Release the advisory lock on every backend. No-op when already
    /// known-unlocked.
    pub async fn unlock(&mut self) -> Result<(), CacheError> {
        if self.locked == Some(false) {
            return Ok(());
        }
        self.locked = Some(false);
        for backend in self.backends.iter() {
            backend.unlock(self.key.as_str()).await?;
        }
        Ok(())
    }

    /// Whether any backend holds a live lock marker for this key. Memoized
    /// per handle once a definitive answer is known.
    pub async fn is_locked(&mut self) -> Result<bool, CacheError> {
        if let Some(locked) = self.locked {
            return Ok(locked);
        }
        for backend in self.backends.iter() {
            if backend.is_locked(self.key.as_str()).await? {
                self.locked = Some(true);
                return Ok(true);
            }
        }
        self.locked = Some(false);
        Ok(false)
    }
}
