//! Backend tier ownership and the get-or-populate contract.

use std::future::Future;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::backend::Backend;
use crate::backend::memory::Memory;
use crate::error::CacheError;
use crate::item::Item;
use crate::key::CacheKey;
use crate::policy::{CachePolicy, PolicyData};
use crate::record::Expiry;

const SOURCE: &str = "sfoglia::pool";

/// Ordered set of backend tiers, read front-to-back and written back-to-front.
///
/// Construction filters out adapters that report themselves unavailable in
/// this environment; that is never an error. A pool built with no adapters at
/// all falls back to a single in-process [`Memory`] tier.
#[derive(Clone)]
pub struct Pool {
    backends: Arc<Vec<Arc<dyn Backend>>>,
}

impl Pool {
    pub fn new(backends: Vec<Arc<dyn Backend>>) -> Self {
        if backends.is_empty() {
            return Self::default();
        }
        let available: Vec<Arc<dyn Backend>> = backends
            .into_iter()
            .filter(|backend| {
                let available = backend.available();
                if !available {
                    debug!(
                        backend = backend.name(),
                        target_module = SOURCE,
                        "Dropping unavailable backend"
                    );
                }
                available
            })
            .collect();
        Self {
            backends: Arc::new(available),
        }
    }

    /// Convenience constructor for a single-tier pool.
    pub fn with_backend(backend: impl Backend + 'static) -> Self {
        Self::new(vec![Arc::new(backend)])
    }

    /// Number of tiers that survived the availability filter.
    pub fn tier_count(&self) -> usize {
        self.backends.len()
    }

    /// Issue a handle for `key`. Cheap; no I/O until the first read.
    pub fn get_item(&self, key: impl Into<CacheKey>) -> Item {
        Item::new(key.into(), Arc::clone(&self.backends))
    }

    /// Read `key` under the given policy, or fail with a recoverable
    /// [`CacheError::Miss`] carrying the locked handle so the caller can
    /// populate the key out of band via `Item::set`.
    ///
    /// The policy read and the miss classification share one load.
    pub async fn get(
        &self,
        key: impl Into<CacheKey>,
        policy: CachePolicy,
        policy_data: PolicyData,
    ) -> Result<Value, CacheError> {
        let mut item = self.get_item(key);
        let value = item.get(policy, policy_data).await?;
        if item.is_miss().await? {
            item.lock().await?;
            debug!(
                key = item.key(),
                target_module = SOURCE,
                "Cache miss; key locked for regeneration"
            );
            return Err(CacheError::miss(item));
        }
        Ok(value.unwrap_or(Value::Null))
    }

    /// Read `key`, regenerating it through `generator` on a miss.
    ///
    /// On a miss the key is locked best-effort before the generator runs. A
    /// successful generation is persisted with `expiry` (which also unlocks
    /// the key) and returned; a failed generation unlocks the key so a future
    /// caller may retry, and the generator's error propagates unchanged.
    pub async fn get_with<F, Fut>(
        &self,
        key: impl Into<CacheKey>,
        policy: CachePolicy,
        policy_data: PolicyData,
        expiry: Expiry,
        generator: F,
    ) -> Result<Value, CacheError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value, CacheError>>,
    {
        let mut item = self.get_item(key);
        let value = item.get(policy, policy_data).await?;
        if !item.is_miss().await? {
            return Ok(value.unwrap_or(Value::Null));
        }

        item.lock().await?;
        debug!(
            key = item.key(),
            target_module = SOURCE,
            "Cache miss; regenerating"
        );
        match generator().await {
            Ok(fresh) => {
                item.set(fresh.clone(), expiry).await?;
                Ok(fresh)
            }
            Err(err) => {
                item.unlock().await?;
                Err(err)
            }
        }
    }

    /// Clear every tier's entire namespace.
    pub async fn flush(&self) -> Result<(), CacheError> {
        for backend in self.backends.iter() {
            backend.flush().await?;
        }
        Ok(())
    }
}

impl Default for Pool {
    fn default() -> Self {
        Self {
            backends: Arc::new(vec![Arc::new(Memory::new())]),
        }
    }
}
