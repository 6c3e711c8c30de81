//! Redis-backed adapter (feature `redis-backend`).
//!
//! A thin client over `redis::aio::ConnectionManager`: records are stored as
//! assembled JSON strings under `<namespace>/<key>`, prefix deletes are
//! served by key enumeration (`KEYS <prefix>/*`), and lock markers get a
//! server-side TTL via `SET .. EX`.

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

use crate::backend::Backend;
use crate::config::CacheConfig;
use crate::error::CacheError;
use crate::key::LOCK_SUFFIX;
use crate::record::CacheRecord;

const NAME: &str = "redis";

pub struct Redis {
    conn: ConnectionManager,
    namespace: String,
    lock_ttl_secs: u64,
}

impl Redis {
    /// Connect with default configuration.
    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        Self::connect_with_config(url, &CacheConfig::default()).await
    }

    /// Connect to `url` (e.g. `redis://127.0.0.1:6379/0`).
    ///
    /// A pool should treat a connection failure here as the adapter being
    /// unavailable and construct without it.
    pub async fn connect_with_config(url: &str, config: &CacheConfig) -> Result<Self, CacheError> {
        let client = redis::Client::open(url).map_err(|err| CacheError::backend(NAME, err))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|err| CacheError::backend(NAME, err))?;
        Ok(Self {
            conn,
            namespace: config.namespace.clone(),
            lock_ttl_secs: config.lock_ttl_secs,
        })
    }

    fn physical(&self, key: &str) -> String {
        if key.is_empty() {
            self.namespace.clone()
        } else {
            format!("{}/{}", self.namespace, key)
        }
    }

    fn lock_key(&self, key: &str) -> String {
        format!("{}{}", self.physical(key), LOCK_SUFFIX)
    }
}

#[async_trait]
impl Backend for Redis {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn get(&self, key: &str) -> Result<Option<CacheRecord>, CacheError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn
            .get(self.physical(key))
            .await
            .map_err(|err| CacheError::backend(NAME, err))?;
        match raw {
            Some(raw) => Ok(Some(
                serde_json::from_str(&raw).map_err(|err| CacheError::codec(key, err))?,
            )),
            None => Ok(None),
        }
    }

    async fn put(&self, key: &str, record: CacheRecord) -> Result<(), CacheError> {
        let raw = serde_json::to_string(&record).map_err(|err| CacheError::backend(NAME, err))?;
        let mut conn = self.conn.clone();
        conn.set::<_, _, ()>(self.physical(key), raw)
            .await
            .map_err(|err| CacheError::backend(NAME, err))
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let physical = self.physical(key);
        let mut conn = self.conn.clone();

        let mut doomed: Vec<String> = conn
            .keys(format!("{physical}/*"))
            .await
            .map_err(|err| CacheError::backend(NAME, err))?;
        doomed.push(physical.clone());
        doomed.push(format!("{physical}{LOCK_SUFFIX}"));

        conn.del::<_, ()>(doomed)
            .await
            .map_err(|err| CacheError::backend(NAME, err))
    }

    async fn flush(&self) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let doomed: Vec<String> = conn
            .keys(format!("{}/*", self.namespace))
            .await
            .map_err(|err| CacheError::backend(NAME, err))?;
        if doomed.is_empty() {
            return Ok(());
        }
        conn.del::<_, ()>(doomed)
            .await
            .map_err(|err| CacheError::backend(NAME, err))
    }

    async fn lock(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(self.lock_key(key), 1, self.lock_ttl_secs)
            .await
            .map_err(|err| CacheError::backend(NAME, err))
    }

    async fn unlock(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(self.lock_key(key))
            .await
            .map_err(|err| CacheError::backend(NAME, err))
    }

    async fn is_locked(&self, key: &str) -> Result<bool, CacheError> {
        let mut conn = self.conn.clone();
        conn.exists(self.lock_key(key))
            .await
            .map_err(|err| CacheError::backend(NAME, err))
    }
}
