use std::{collections::HashMap, time::Duration};

use tokio::{sync::RwLock, time::Instant};

#[derive(Debug, Clone, PartialEq)]
pub struct Value {
    pub data: String,
    pub expiration: Option<Instant>,
}

impl Value {
    pub fn is_expired(&self) -> bool {
        self.expiration
            .is_some_and(|expiration| Instant::now() > expiration)
    }
}

/// String keys to string values with optional absolute expiry.
///
/// Expired entries are evicted lazily by [`KeyValueStore::get`]; there is no background
/// sweep. Reads share the lock, writes and evictions take it exclusively.
#[derive(Debug, Default)]
pub struct KeyValueStore {
    entries: RwLock<HashMap<String, Value>>,
}

impl KeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` under `key`, replacing any previous value and expiry.
    ///
    /// A `ttl` of `None` or zero stores the key without expiry, and so does a `ttl` too
    /// large for the monotonic clock to represent.
    pub async fn set(&self, key: String, value: String, ttl: Option<Duration>) {
        let expiration = ttl
            .filter(|ttl| !ttl.is_zero())
            .and_then(|ttl| Instant::now().checked_add(ttl));

        self.insert(key, value, expiration).await;
    }

    pub async fn set_expiring_at(&self, key: String, value: String, deadline: Instant) {
        self.insert(key, value, Some(deadline)).await;
    }

    /// Returns the value stored under `key` unless it is absent or expired.
    ///
    /// An expired entry is removed as a side effect. The removal re-checks the expiry
    /// under the write lock, so a concurrent `set` that refreshed the key in between is
    /// left alone and concurrent readers may race to evict the same key harmlessly.
    pub async fn get(&self, key: &str) -> Option<String> {
        {
            let entries = self.entries.read().await;

            match entries.get(key) {
                None => return None,
                Some(value) if !value.is_expired() => return Some(value.data.clone()),
                Some(_) => (),
            }
        }

        let mut entries = self.entries.write().await;

        if entries.get(key).is_some_and(Value::is_expired) {
            entries.remove(key);
        }

        None
    }

    /// Raw entry lookup without expiry handling.
    pub async fn entry(&self, key: &str) -> Option<Value> {
        self.entries.read().await.get(key).cloned()
    }

    /// Number of entries held, including expired ones not evicted yet.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    async fn insert(&self, key: String, value: String, expiration: Option<Instant>) {
        self.entries.write().await.insert(
            key,
            Value {
                data: value,
                expiration,
            },
        );
    }
}
