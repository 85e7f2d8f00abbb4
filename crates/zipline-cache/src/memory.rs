use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use zipline_core::{CacheResult, KvCache};

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| now >= deadline)
    }
}

/// An in-memory implementation of [`KvCache`].
///
/// Backs the `in-memory` storage mode and every test that would otherwise
/// need a live Redis. All operations, including `compare_and_delete`, are
/// atomic under one mutex, so the lock semantics tests exercise the same
/// guarantees the Redis implementation provides via Lua.
#[derive(Debug, Default)]
pub struct InMemoryKvCache {
    items: Mutex<HashMap<String, Entry>>,
}

impl InMemoryKvCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn live_value(items: &mut HashMap<String, Entry>, key: &str) -> Option<String> {
        let now = Instant::now();
        match items.get(key) {
            Some(entry) if entry.is_expired(now) => {
                items.remove(key);
                None
            }
            Some(entry) => Some(entry.value.clone()),
            None => None,
        }
    }

    fn deadline(ttl_secs: u64) -> Option<Instant> {
        (ttl_secs > 0).then(|| Instant::now() + Duration::from_secs(ttl_secs))
    }
}

#[async_trait]
impl KvCache for InMemoryKvCache {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let mut items = self.items.lock();
        Ok(Self::live_value(&mut items, key))
    }

    async fn set(&self, key: &str, value: &str, ttl_secs: u64) -> CacheResult<()> {
        let mut items = self.items.lock();
        items.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Self::deadline(ttl_secs),
            },
        );
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl_secs: u64) -> CacheResult<bool> {
        let mut items = self.items.lock();
        if Self::live_value(&mut items, key).is_some() {
            return Ok(false);
        }
        items.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Self::deadline(ttl_secs),
            },
        );
        Ok(true)
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        let mut items = self.items.lock();
        Ok(Self::live_value(&mut items, key).is_some())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        let mut items = self.items.lock();
        items.remove(key);
        Ok(())
    }

    async fn compare_and_delete(&self, key: &str, expected: &str) -> CacheResult<bool> {
        let mut items = self.items.lock();
        match Self::live_value(&mut items, key) {
            Some(current) if current == expected => {
                items.remove(key);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_missing_key_is_none() {
        let kv = InMemoryKvCache::new();
        assert_eq!(kv.get("nope").await.unwrap(), None);
    }

    #[tokio::test]
    async fn set_and_get_roundtrip() {
        let kv = InMemoryKvCache::new();
        kv.set("k", "v", 60).await.unwrap();
        assert_eq!(kv.get("k").await.unwrap(), Some("v".to_string()));
        assert!(kv.exists("k").await.unwrap());
    }

    #[tokio::test]
    async fn zero_ttl_never_expires() {
        let kv = InMemoryKvCache::new();
        kv.set("k", "v", 0).await.unwrap();
        assert_eq!(kv.get("k").await.unwrap(), Some("v".to_string()));
    }

    #[tokio::test]
    async fn expired_entry_reads_as_missing() {
        let kv = InMemoryKvCache::new();
        kv.set("k", "v", 60).await.unwrap();
        // Force the deadline into the past.
        {
            let mut items = kv.items.lock();
            items.get_mut("k").unwrap().expires_at = Some(Instant::now() - Duration::from_secs(1));
        }
        assert_eq!(kv.get("k").await.unwrap(), None);
        assert!(!kv.exists("k").await.unwrap());
    }

    #[tokio::test]
    async fn set_if_absent_wins_only_once() {
        let kv = InMemoryKvCache::new();
        assert!(kv.set_if_absent("k", "first", 60).await.unwrap());
        assert!(!kv.set_if_absent("k", "second", 60).await.unwrap());
        assert_eq!(kv.get("k").await.unwrap(), Some("first".to_string()));
    }

    #[tokio::test]
    async fn set_if_absent_succeeds_after_expiry() {
        let kv = InMemoryKvCache::new();
        kv.set("k", "stale", 60).await.unwrap();
        {
            let mut items = kv.items.lock();
            items.get_mut("k").unwrap().expires_at = Some(Instant::now() - Duration::from_secs(1));
        }
        assert!(kv.set_if_absent("k", "fresh", 60).await.unwrap());
        assert_eq!(kv.get("k").await.unwrap(), Some("fresh".to_string()));
    }

    #[tokio::test]
    async fn compare_and_delete_requires_matching_value() {
        let kv = InMemoryKvCache::new();
        kv.set("k", "token-a", 60).await.unwrap();

        assert!(!kv.compare_and_delete("k", "token-b").await.unwrap());
        assert_eq!(kv.get("k").await.unwrap(), Some("token-a".to_string()));

        assert!(kv.compare_and_delete("k", "token-a").await.unwrap());
        assert_eq!(kv.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let kv = InMemoryKvCache::new();
        kv.delete("missing").await.unwrap();
        kv.set("k", "v", 0).await.unwrap();
        kv.delete("k").await.unwrap();
        kv.delete("k").await.unwrap();
        assert_eq!(kv.get("k").await.unwrap(), None);
    }
}
