//! In-process backend.
//!
//! Stores assembled JSON records in a concurrent map, so the serialization
//! contract is exercised exactly as it is against a durable store. Always
//! available; typically the front tier of a pool.

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::json;

use crate::backend::Backend;
use crate::config::CacheConfig;
use crate::error::CacheError;
use crate::key::LOCK_SUFFIX;
use crate::record::{CacheRecord, Expiration, now_ms};

const NAME: &str = "memory";

pub struct Memory {
    entries: DashMap<String, String>,
    namespace: String,
    lock_ttl_ms: i64,
}

impl Memory {
    pub fn new() -> Self {
        Self::with_config(&CacheConfig::default())
    }

    pub fn with_config(config: &CacheConfig) -> Self {
        Self {
            entries: DashMap::new(),
            namespace: config.namespace.clone(),
            lock_ttl_ms: config.lock_ttl().whole_milliseconds() as i64,
        }
    }

    fn physical(&self, key: &str) -> String {
        if key.is_empty() {
            self.namespace.clone()
        } else {
            format!("{}/{}", self.namespace, key)
        }
    }

    fn decode(key: &str, raw: &str) -> Result<CacheRecord, CacheError> {
        serde_json::from_str(raw).map_err(|err| CacheError::codec(key, err))
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Backend for Memory {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn get(&self, key: &str) -> Result<Option<CacheRecord>, CacheError> {
        let physical = self.physical(key);
        match self.entries.get(&physical) {
            Some(raw) => Ok(Some(Self::decode(key, raw.value())?)),
            None => Ok(None),
        }
    }

    async fn put(&self, key: &str, record: CacheRecord) -> Result<(), CacheError> {
        let raw = serde_json::to_string(&record).map_err(|err| CacheError::backend(NAME, err))?;
        self.entries.insert(self.physical(key), raw);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let physical = self.physical(key);
        let child_prefix = format!("{physical}/");
        let lock_key = format!("{physical}{LOCK_SUFFIX}");
        self.entries
            .retain(|stored, _| *stored != physical && *stored != lock_key && !stored.starts_with(&child_prefix));
        Ok(())
    }

    async fn flush(&self) -> Result<(), CacheError> {
        self.entries.clear();
        Ok(())
    }

    async fn lock(&self, key: &str) -> Result<(), CacheError> {
        let marker = CacheRecord::new(json!(1), Expiration::At(now_ms() + self.lock_ttl_ms));
        let raw = serde_json::to_string(&marker).map_err(|err| CacheError::backend(NAME, err))?;
        self.entries
            .insert(format!("{}{}", self.physical(key), LOCK_SUFFIX), raw);
        Ok(())
    }

    async fn unlock(&self, key: &str) -> Result<(), CacheError> {
        self.entries
            .remove(&format!("{}{}", self.physical(key), LOCK_SUFFIX));
        Ok(())
    }

    async fn is_locked(&self, key: &str) -> Result<bool, CacheError> {
        let lock_key = format!("{}{}", self.physical(key), LOCK_SUFFIX);
        {
            let Some(raw) = self.entries.get(&lock_key) else {
                return Ok(false);
            };
            let marker = Self::decode(key, raw.value())?;
            if !marker.expiration.is_past(now_ms()) {
                return Ok(true);
            }
        }
        // Expired marker: reap it so later reads stay cheap.
        self.entries.remove(&lock_key);
        Ok(false)
    }
}
