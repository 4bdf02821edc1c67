//! Integration tests for response caching over the in-memory store.

#![cfg(feature = "memory")]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use quotagate::store::MemoryStore;
use quotagate::{CacheStatus, ResponseCache, cache_key};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct NewsPayload {
    articles: Vec<String>,
    total_results: u32,
}

fn payload() -> NewsPayload {
    NewsPayload {
        articles: vec!["a".into(), "b".into()],
        total_results: 2,
    }
}

#[tokio::test]
async fn test_set_then_get_roundtrip() {
    let cache = ResponseCache::new(MemoryStore::new());

    assert!(cache.set("api:news", &payload(), Duration::from_secs(60)).await);
    let cached: Option<NewsPayload> = cache.get("api:news").await;
    assert_eq!(cached, Some(payload()));
}

#[tokio::test]
async fn test_get_after_ttl_is_absent() {
    let cache = ResponseCache::new(MemoryStore::new());

    cache.set("api:news", &payload(), Duration::from_millis(50)).await;
    let cached: Option<NewsPayload> = cache.get("api:news").await;
    assert!(cached.is_some());

    tokio::time::sleep(Duration::from_millis(80)).await;
    let cached: Option<NewsPayload> = cache.get("api:news").await;
    assert!(cached.is_none());
}

#[tokio::test]
async fn test_get_missing_key_is_absent() {
    let cache = ResponseCache::new(MemoryStore::new());
    let cached: Option<NewsPayload> = cache.get("api:absent").await;
    assert!(cached.is_none());
}

#[tokio::test]
async fn test_set_replaces_whole_value() {
    let cache = ResponseCache::new(MemoryStore::new());

    cache.set("api:news", &payload(), Duration::from_secs(60)).await;
    let updated = NewsPayload {
        articles: vec!["c".into()],
        total_results: 1,
    };
    cache.set("api:news", &updated, Duration::from_secs(60)).await;

    let cached: Option<NewsPayload> = cache.get("api:news").await;
    assert_eq!(cached, Some(updated));
}

#[tokio::test]
async fn test_key_determinism_across_insertion_orders() {
    let mut first = HashMap::new();
    first.insert("country", "us");
    first.insert("category", "tech");

    let mut second = HashMap::new();
    second.insert("category", "tech");
    second.insert("country", "us");

    assert_eq!(cache_key("news", first), cache_key("news", second));
}

#[tokio::test]
async fn test_key_without_params_is_bare_namespace() {
    let params: [(&str, &str); 0] = [];
    assert_eq!(cache_key("news", params), "api:news");
}

#[tokio::test]
async fn test_fetch_with_miss_then_hit() {
    let cache = ResponseCache::new(MemoryStore::new());
    let fetches = AtomicUsize::new(0);

    let key = cache_key("news", [("country", "us")]);

    let (value, status) = cache
        .fetch_with(&key, || async {
            fetches.fetch_add(1, Ordering::SeqCst);
            Ok::<_, String>(payload())
        })
        .await
        .unwrap();
    assert_eq!(status, CacheStatus::Miss);
    assert_eq!(value, payload());

    let (value, status) = cache
        .fetch_with(&key, || async {
            fetches.fetch_add(1, Ordering::SeqCst);
            Ok::<_, String>(payload())
        })
        .await
        .unwrap();
    assert_eq!(status, CacheStatus::Hit);
    assert_eq!(value, payload());
    assert_eq!(fetches.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_fetch_failure_propagates_and_caches_nothing() {
    let cache = ResponseCache::new(MemoryStore::new());
    let fetches = AtomicUsize::new(0);

    let err = cache
        .fetch_with::<NewsPayload, _, _, _>("api:news", || async {
            fetches.fetch_add(1, Ordering::SeqCst);
            Err("upstream 500".to_string())
        })
        .await
        .unwrap_err();
    assert_eq!(err, "upstream 500");

    // The failure was not cached; the next call fetches again.
    let (_, status) = cache
        .fetch_with("api:news", || async {
            fetches.fetch_add(1, Ordering::SeqCst);
            Ok::<_, String>(payload())
        })
        .await
        .unwrap();
    assert_eq!(status, CacheStatus::Miss);
    assert_eq!(fetches.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_unavailable_store_always_misses() {
    let store = MemoryStore::new();
    store.set_available(false);
    let cache = ResponseCache::new(store);

    assert!(!cache.set("api:news", &payload(), Duration::from_secs(60)).await);
    let cached: Option<NewsPayload> = cache.get("api:news").await;
    assert!(cached.is_none());
}

#[tokio::test]
async fn test_outage_mid_flight_degrades_to_fetching() {
    use std::sync::Arc;

    let store = Arc::new(MemoryStore::new());
    let cache = ResponseCache::new(store.clone());

    cache.set("api:news", &payload(), Duration::from_secs(60)).await;
    store.set_available(false);

    // Cached value present but unreachable: every call fetches upstream.
    let (_, status) = cache
        .fetch_with("api:news", || async { Ok::<_, String>(payload()) })
        .await
        .unwrap();
    assert_eq!(status, CacheStatus::Miss);

    // Store recovers and the original entry is visible again.
    store.set_available(true);
    let cached: Option<NewsPayload> = cache.get("api:news").await;
    assert!(cached.is_some());
}

#[tokio::test]
async fn test_custom_ttl_applies_to_fetch_with() {
    let cache = ResponseCache::new(MemoryStore::new()).with_ttl(Duration::from_millis(50));

    cache
        .fetch_with("api:news", || async { Ok::<_, String>(payload()) })
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(80)).await;

    let (_, status) = cache
        .fetch_with("api:news", || async { Ok::<_, String>(payload()) })
        .await
        .unwrap();
    assert_eq!(status, CacheStatus::Miss);
}
