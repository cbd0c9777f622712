use std::{sync::Arc, time::Duration};

use redis_replica::key_value_store::KeyValueStore;
use tokio::time::Instant;

#[tokio::test]
async fn test_set_then_get() {
    let store = KeyValueStore::new();

    store.set("k".to_string(), "v".to_string(), None).await;
    assert_eq!(store.get("k").await, Some("v".to_string()));

    store.set("k".to_string(), "w".to_string(), None).await;
    assert_eq!(store.get("k").await, Some("w".to_string()));
    assert_eq!(store.len().await, 1);
}

#[tokio::test]
async fn test_get_missing_key_leaves_store_untouched() {
    let store = KeyValueStore::new();
    store.set("k".to_string(), "v".to_string(), None).await;

    assert_eq!(store.len().await, 1);
    assert_eq!(store.get("missing").await, None);
    assert_eq!(store.len().await, 1);
    assert_eq!(store.get("k").await, Some("v".to_string()));
}

#[tokio::test]
async fn test_unrepresentable_ttl_never_expires() {
    let store = KeyValueStore::new();

    store
        .set("k".to_string(), "v".to_string(), Some(Duration::MAX))
        .await;

    assert_eq!(store.entry("k").await.unwrap().expiration, None);
    assert_eq!(store.get("k").await, Some("v".to_string()));
}

#[tokio::test(start_paused = true)]
async fn test_expired_key_is_evicted_on_read() {
    let store = KeyValueStore::new();

    store
        .set("k".to_string(), "v".to_string(), Some(Duration::from_millis(100)))
        .await;

    tokio::time::advance(Duration::from_millis(100)).await;
    assert_eq!(store.get("k").await, Some("v".to_string()));

    tokio::time::advance(Duration::from_millis(1)).await;
    assert_eq!(store.len().await, 1);
    assert_eq!(store.get("k").await, None);
    assert!(store.is_empty().await);
}

#[tokio::test(start_paused = true)]
async fn test_set_clears_previous_expiration() {
    let store = KeyValueStore::new();

    store
        .set("k".to_string(), "v".to_string(), Some(Duration::from_millis(10)))
        .await;
    store.set("k".to_string(), "v2".to_string(), None).await;

    tokio::time::advance(Duration::from_secs(60)).await;
    assert_eq!(store.get("k").await, Some("v2".to_string()));
}

#[tokio::test(start_paused = true)]
async fn test_set_expiring_at_deadline() {
    let store = KeyValueStore::new();
    let deadline = Instant::now() + Duration::from_millis(50);

    store
        .set_expiring_at("k".to_string(), "v".to_string(), deadline)
        .await;
    assert_eq!(store.entry("k").await.unwrap().expiration, Some(deadline));

    tokio::time::advance(Duration::from_millis(51)).await;
    assert_eq!(store.get("k").await, None);
}

#[tokio::test]
async fn test_concurrent_writers_and_readers() {
    let store = Arc::new(KeyValueStore::new());
    let mut handles = Vec::new();

    for i in 0..20 {
        let store = Arc::clone(&store);

        handles.push(tokio::spawn(async move {
            let key = format!("key{}", i);
            store.set(key.clone(), i.to_string(), None).await;
            store.get(&key).await
        }));
    }

    for (i, handle) in handles.into_iter().enumerate() {
        assert_eq!(handle.await.unwrap(), Some(i.to_string()));
    }

    assert_eq!(store.len().await, 20);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_readers_of_expired_key() {
    let store = Arc::new(KeyValueStore::new());
    store
        .set("k".to_string(), "v".to_string(), Some(Duration::from_millis(5)))
        .await;
    tokio::time::advance(Duration::from_millis(10)).await;

    let readers: Vec<_> = (0..8)
        .map(|_| {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.get("k").await })
        })
        .collect();

    for reader in readers {
        assert_eq!(reader.await.unwrap(), None);
    }

    assert!(store.is_empty().await);
}
