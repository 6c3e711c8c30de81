//! sfoglia — a tiered cache-aside layer with stampede protection.
//!
//! Given a key, the pool returns a cached value if fresh, or signals a miss
//! so the caller can compute and store a fresh one, while an advisory per-key
//! lock keeps concurrent callers from recomputing the same missing key.
//! Policy logic is backend-agnostic: the same engine runs over an in-process
//! map, a generational store, or a networked key-value store.
//!
//! - **Backends** implement the uniform [`Backend`] contract (get/put/delete/
//!   flush plus the lock triplet) and are layered into a [`Pool`]: read
//!   front-to-back, written back-to-front.
//! - **[`Item`]** is the per-key handle owning the hit/stale/miss decision
//!   under a [`CachePolicy`] bitmask (`OLD`, `PRECOMPUTE`, `VALUE`).
//! - **[`Pool::get_with`]** turns a miss into an exclusive-regeneration
//!   contract: lock, generate, persist (which unlocks), or unlock on failure.
//!
//! ```no_run
//! use serde_json::json;
//! use sfoglia::{CachePolicy, Expiry, PolicyData, Pool};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), sfoglia::CacheError> {
//!     let pool = Pool::default();
//!
//!     let value = pool
//!         .get_with(
//!             "users/42",
//!             CachePolicy::OLD,
//!             PolicyData::None,
//!             Expiry::seconds(300),
//!             || async { Ok(json!({"name": "ada"})) },
//!         )
//!         .await?;
//!
//!     assert_eq!(value["name"], "ada");
//!     Ok(())
//! }
//! ```
//!
//! Locks are advisory and best-effort: stampede *reduction*, not a
//! correctness guarantee against duplicate regeneration. Lock markers carry a
//! bounded TTL (60 s by default) so an abandoned regeneration cannot starve a
//! key forever.

pub mod backend;
mod config;
mod error;
mod item;
mod key;
mod policy;
mod pool;
mod record;

pub use backend::Backend;
pub use backend::generational::Generational;
pub use backend::memory::Memory;
pub use config::CacheConfig;
pub use error::CacheError;
pub use item::Item;
pub use key::CacheKey;
pub use policy::{CachePolicy, PolicyData};
pub use pool::Pool;
pub use record::{CacheRecord, Expiration, Expiry};

#[cfg(feature = "redis-backend")]
pub use backend::redis::Redis;
