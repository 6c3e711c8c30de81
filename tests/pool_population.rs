//! The get-or-populate contract: miss handling, stampede locking, and
//! regeneration through caller-supplied generators.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde_json::{Value, json};

use sfoglia::{CacheError, CacheKey, CachePolicy, Expiry, PolicyData, Pool};

#[tokio::test]
async fn hit_returns_the_stored_value() {
    let pool = Pool::default();
    let mut item = pool.get_item("k");
    item.set(json!({"n": 7}), Expiry::Never).await.expect("set");

    let value = pool
        .get("k", CachePolicy::NONE, PolicyData::None)
        .await
        .expect("hit");
    assert_eq!(value, json!({"n": 7}));
}

#[tokio::test]
async fn miss_locks_the_key_and_carries_a_settable_handle() {
    let pool = Pool::default();

    let err = pool
        .get("absent", CachePolicy::NONE, PolicyData::None)
        .await
        .expect_err("miss");

    let CacheError::Miss { key, item } = err else {
        panic!("expected a miss, got another error");
    };
    assert_eq!(key, "absent");

    // The miss already locked the key for this caller.
    let mut observer = pool.get_item("absent");
    assert!(observer.is_locked().await.expect("is_locked"));

    // Populating through the carried handle unlocks and stores.
    let mut item = *item;
    item.set(json!("filled"), Expiry::Never).await.expect("set");

    let value = pool
        .get("absent", CachePolicy::NONE, PolicyData::None)
        .await
        .expect("hit after set");
    assert_eq!(value, json!("filled"));

    let mut after = pool.get_item("absent");
    assert!(!after.is_locked().await.expect("is_locked"));
}

#[tokio::test]
async fn generator_success_persists_and_unlocks() {
    let pool = Pool::default();

    let value = pool
        .get_with(
            "users/9",
            CachePolicy::NONE,
            PolicyData::None,
            Expiry::seconds(300),
            || async { Ok(json!("generated")) },
        )
        .await
        .expect("generated");
    assert_eq!(value, json!("generated"));

    let mut item = pool.get_item("users/9");
    assert!(!item.is_locked().await.expect("is_locked"));

    let cached = pool
        .get("users/9", CachePolicy::NONE, PolicyData::None)
        .await
        .expect("hit");
    assert_eq!(cached, json!("generated"));
}

#[tokio::test]
async fn generator_failure_unlocks_and_propagates() {
    let pool = Pool::default();

    let err = pool
        .get_with(
            "flaky",
            CachePolicy::NONE,
            PolicyData::None,
            Expiry::Never,
            || async { Err(CacheError::generation("origin down")) },
        )
        .await
        .expect_err("generator error");
    assert!(matches!(err, CacheError::Generation(_)));

    // Unlocked, so a later caller can retry.
    let mut item = pool.get_item("flaky");
    assert!(!item.is_locked().await.expect("is_locked"));

    let value = pool
        .get_with(
            "flaky",
            CachePolicy::NONE,
            PolicyData::None,
            Expiry::Never,
            || async { Ok(json!("recovered")) },
        )
        .await
        .expect("retry succeeds");
    assert_eq!(value, json!("recovered"));
}

#[tokio::test]
async fn generator_is_skipped_on_a_hit() {
    let pool = Pool::default();
    let mut item = pool.get_item("k");
    item.set(json!("cached"), Expiry::seconds(100)).await.expect("set");

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let value = pool
        .get_with(
            "k",
            CachePolicy::NONE,
            PolicyData::None,
            Expiry::Never,
            move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(json!("fresh"))
            },
        )
        .await
        .expect("hit");

    assert_eq!(value, json!("cached"));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn concurrent_population_settles_on_a_consistent_value() {
    let pool = Pool::default();
    let calls = Arc::new(AtomicUsize::new(0));

    let generate = |pool: Pool, calls: Arc<AtomicUsize>| async move {
        pool.get_with(
            "hot",
            CachePolicy::NONE,
            PolicyData::None,
            Expiry::seconds(300),
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<Value, CacheError>(json!("hot-value"))
            },
        )
        .await
    };

    let (a, b) = tokio::join!(
        generate(pool.clone(), Arc::clone(&calls)),
        generate(pool.clone(), Arc::clone(&calls)),
    );
    assert_eq!(a.expect("first caller"), json!("hot-value"));
    assert_eq!(b.expect("second caller"), json!("hot-value"));

    // The lock is advisory: at least one generation ran, and the key ends
    // populated and unlocked either way.
    assert!(calls.load(Ordering::SeqCst) >= 1);
    let mut item = pool.get_item("hot");
    assert!(!item.is_locked().await.expect("is_locked"));
}

#[tokio::test]
async fn stale_key_with_old_policy_serves_while_other_caller_holds_lock() {
    let pool = Pool::default();
    let mut writer = pool.get_item("report");
    writer.set(json!("yesterday"), Expiry::seconds(-1)).await.expect("set");

    // First caller observes the expired key and takes the lock.
    let err = pool
        .get("report", CachePolicy::NONE, PolicyData::None)
        .await
        .expect_err("expired key misses");
    assert!(matches!(err, CacheError::Miss { .. }));

    // A stale-tolerant caller keeps being served while regeneration runs.
    let value = pool
        .get("report", CachePolicy::OLD, PolicyData::None)
        .await
        .expect("stale hit");
    assert_eq!(value, json!("yesterday"));
}

#[tokio::test]
async fn value_policy_returns_fallback_while_locked() {
    let pool = Pool::default();
    let mut holder = pool.get_item("slow");
    holder.lock().await.expect("lock");

    let mut reader = pool.get_item("slow");
    let value = reader
        .get(CachePolicy::VALUE, PolicyData::fallback_value("placeholder"))
        .await
        .expect("get");
    assert_eq!(value, Some(json!("placeholder")));
}

#[tokio::test]
async fn prefix_delete_removes_nested_keys() {
    let pool = Pool::default();

    let mut nested = pool.get_item("a/b/c");
    nested.set(json!("x"), Expiry::Never).await.expect("set");
    let mut sibling = pool.get_item("a/bc");
    sibling.set(json!("y"), Expiry::Never).await.expect("set");

    let mut prefix = pool.get_item("a/b");
    prefix.clear().await.expect("clear");

    let err = pool
        .get("a/b/c", CachePolicy::NONE, PolicyData::None)
        .await
        .expect_err("deleted with prefix");
    assert!(matches!(err, CacheError::Miss { .. }));

    let survivor = pool
        .get("a/bc", CachePolicy::NONE, PolicyData::None)
        .await
        .expect("sibling untouched");
    assert_eq!(survivor, json!("y"));
}

#[tokio::test]
async fn segment_keys_normalize_like_path_keys() {
    let pool = Pool::default();

    let mut item = pool.get_item(CacheKey::from_segments("products", ["1", "specs"]));
    item.set(json!("spec-sheet"), Expiry::Never).await.expect("set");

    let value = pool
        .get("products/1/specs", CachePolicy::NONE, PolicyData::None)
        .await
        .expect("hit");
    assert_eq!(value, json!("spec-sheet"));
}
