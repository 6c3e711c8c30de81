//! Generational invalidation wrapper.
//!
//! Some stores cannot enumerate keys, so prefix deletes cannot be emulated by
//! scanning. This wrapper makes them work anyway: per path segment it keeps an
//! incrementing generation counter under `<prefix>/<segment>_ns`, and folds
//! the current counters into the physical key (`<segment><generation>`).
//! Deleting a prefix bumps that prefix's counter, which makes every prior
//! value under it unreachable. Nothing is physically removed; this is
//! epoch-style invalidation, not deletion.

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use crate::backend::Backend;
use crate::error::CacheError;
use crate::record::{CacheRecord, Expiration, now_ms};

const SOURCE: &str = "backend::generational";
const COUNTER_SUFFIX: &str = "_ns";

/// Wraps any backend, rewriting logical keys into generation-stamped physical
/// keys so `delete` can be served without key enumeration.
pub struct Generational<B> {
    inner: B,
}

impl<B: Backend> Generational<B> {
    pub fn new(inner: B) -> Self {
        Self { inner }
    }

    fn counter_key(parent_physical: &str, segment: &str) -> String {
        if parent_physical.is_empty() {
            format!("{segment}{COUNTER_SUFFIX}")
        } else {
            format!("{parent_physical}/{segment}{COUNTER_SUFFIX}")
        }
    }

    async fn generation(&self, counter_key: &str) -> Result<Option<i64>, CacheError> {
        Ok(self
            .inner
            .get(counter_key)
            .await?
            .and_then(|record| record.value.as_i64()))
    }

    async fn seed_generation(&self, counter_key: &str, generation: i64) -> Result<(), CacheError> {
        debug!(
            counter = counter_key,
            generation,
            target_module = SOURCE,
            "Seeding namespace generation counter"
        );
        self.inner
            .put(
                counter_key,
                CacheRecord::new(json!(generation), Expiration::Never),
            )
            .await
    }

    /// Fold the current generation counters along the path into the physical
    /// key. Missing counters are seeded with the current epoch-ms so a fresh
    /// path never collides with a previously invalidated one.
    async fn physical_key(&self, key: &str) -> Result<String, CacheError> {
        let mut path = String::new();
        for segment in key.split('/').filter(|segment| !segment.is_empty()) {
            let counter_key = Self::counter_key(&path, segment);
            let generation = match self.generation(&counter_key).await? {
                Some(generation) => generation,
                None => {
                    let generation = now_ms();
                    self.seed_generation(&counter_key, generation).await?;
                    generation
                }
            };
            if !path.is_empty() {
                path.push('/');
            }
            path.push_str(segment);
            path.push_str(&generation.to_string());
        }
        Ok(path)
    }

    /// Physical location of the counter governing `key`'s last segment.
    async fn own_counter_key(&self, key: &str) -> Result<Option<String>, CacheError> {
        let segments: Vec<&str> = key.split('/').filter(|segment| !segment.is_empty()).collect();
        let Some((last, parents)) = segments.split_last() else {
            return Ok(None);
        };
        let parent_physical = self.physical_key(&parents.join("/")).await?;
        Ok(Some(Self::counter_key(&parent_physical, last)))
    }
}

#[async_trait]
impl<B: Backend> Backend for Generational<B> {
    fn name(&self) -> &'static str {
        "generational"
    }

    fn available(&self) -> bool {
        self.inner.available()
    }

    async fn get(&self, key: &str) -> Result<Option<CacheRecord>, CacheError> {
        let physical = self.physical_key(key).await?;
        self.inner.get(&physical).await
    }

    async fn put(&self, key: &str, record: CacheRecord) -> Result<(), CacheError> {
        let physical = self.physical_key(key).await?;
        self.inner.put(&physical, record).await
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let Some(counter_key) = self.own_counter_key(key).await? else {
            return self.inner.flush().await;
        };
        let next = match self.generation(&counter_key).await? {
            Some(generation) => generation + 1,
            // No counter means nothing was ever stored under this prefix;
            // seed a fresh generation all the same.
            None => now_ms(),
        };
        debug!(
            key,
            generation = next,
            target_module = SOURCE,
            "Bumping namespace generation"
        );
        self.inner
            .put(&counter_key, CacheRecord::new(json!(next), Expiration::Never))
            .await
    }

    async fn flush(&self) -> Result<(), CacheError> {
        self.inner.flush().await
    }

    async fn lock(&self, key: &str) -> Result<(), CacheError> {
        let physical = self.physical_key(key).await?;
        self.inner.lock(&physical).await
    }

    async fn unlock(&self, key: &str) -> Result<(), CacheError> {
        let physical = self.physical_key(key).await?;
        self.inner.unlock(&physical).await
    }

    async fn is_locked(&self, key: &str) -> Result<bool, CacheError> {
        let physical = self.physical_key(key).await?;
        self.inner.is_locked(&physical).await
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::backend::memory::Memory;
    use crate::record::Expiration;

    use super::*;

    fn record(value: serde_json::Value) -> CacheRecord {
        CacheRecord::new(value, Expiration::Never)
    }

    #[tokio::test]
    async fn round_trip_through_physical_keys() {
        let backend = Generational::new(Memory::new());
        backend.put("a/b/c", record(json!("x"))).await.expect("put");

        let stored = backend.get("a/b/c").await.expect("get").expect("record");
        assert_eq!(stored.value, json!("x"));
    }

    #[tokio::test]
    async fn delete_makes_prior_sub_keys_unreachable() {
        let backend = Generational::new(Memory::new());
        backend.put("a/b/c", record(json!("x"))).await.expect("put");
        backend.put("a/other", record(json!("y"))).await.expect("put");

        backend.delete("a/b").await.expect("delete");

        assert!(backend.get("a/b/c").await.expect("get").is_none());
        assert!(backend.get("a/b").await.expect("get").is_none());
        // Unrelated sibling under the same parent survives.
        let sibling = backend.get("a/other").await.expect("get").expect("record");
        assert_eq!(sibling.value, json!("y"));
    }

    #[tokio::test]
    async fn writes_after_delete_land_in_the_new_generation() {
        let backend = Generational::new(Memory::new());
        backend.put("a/b", record(json!(1))).await.expect("put");
        backend.delete("a/b").await.expect("delete");
        backend.put("a/b", record(json!(2))).await.expect("put");

        let stored = backend.get("a/b").await.expect("get").expect("record");
        assert_eq!(stored.value, json!(2));
    }

    #[tokio::test]
    async fn locks_travel_with_the_generation() {
        let backend = Generational::new(Memory::new());
        backend.lock("a/b").await.expect("lock");
        assert!(backend.is_locked("a/b").await.expect("is_locked"));

        backend.unlock("a/b").await.expect("unlock");
        assert!(!backend.is_locked("a/b").await.expect("is_locked"));
    }

    #[tokio::test]
    async fn delete_of_empty_prefix_flushes() {
        let backend = Generational::new(Memory::new());
        backend.put("a", record(json!(1))).await.expect("put");
        backend.delete("").await.expect("delete");
        assert!(backend.get("a").await.expect("get").is_none());
    }
}
