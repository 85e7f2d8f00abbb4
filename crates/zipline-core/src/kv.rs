use crate::error::CacheResult;
use async_trait::async_trait;
use std::sync::Arc;

/// A string-valued key/value cache with per-key TTLs.
///
/// This is the seam between the resolution pipeline and the distributed
/// store. Implementations namespace keys with the service prefix where
/// appropriate; callers pass logical keys only.
///
/// TTLs are in whole seconds. A TTL of zero means "no expiry" (the entry
/// lives until it is deleted or the backend evicts it).
#[async_trait]
pub trait KvCache: Send + Sync + 'static {
    /// Fetches a value. A missing key is `Ok(None)`, not an error.
    async fn get(&self, key: &str) -> CacheResult<Option<String>>;

    /// Stores a value with the given TTL.
    async fn set(&self, key: &str, value: &str, ttl_secs: u64) -> CacheResult<()>;

    /// Stores a value only if the key does not already exist.
    ///
    /// Returns whether the write happened. This is the mutual-exclusion
    /// primitive the distributed lock acquires through.
    async fn set_if_absent(&self, key: &str, value: &str, ttl_secs: u64) -> CacheResult<bool>;

    /// Reports whether the key currently exists.
    async fn exists(&self, key: &str) -> CacheResult<bool>;

    /// Removes a key. Removing a missing key is not an error.
    async fn delete(&self, key: &str) -> CacheResult<()>;

    /// Atomically deletes `key` only if its current value equals `expected`.
    ///
    /// Returns whether the delete happened. Implementations must make the
    /// compare and the delete a single atomic step against the backend; the
    /// distributed lock's owner-token release depends on it.
    async fn compare_and_delete(&self, key: &str, expected: &str) -> CacheResult<bool>;
}

#[async_trait]
impl<T: KvCache + ?Sized> KvCache for Arc<T> {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, value: &str, ttl_secs: u64) -> CacheResult<()> {
        (**self).set(key, value, ttl_secs).await
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl_secs: u64) -> CacheResult<bool> {
        (**self).set_if_absent(key, value, ttl_secs).await
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        (**self).exists(key).await
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        (**self).delete(key).await
    }

    async fn compare_and_delete(&self, key: &str, expected: &str) -> CacheResult<bool> {
        (**self).compare_and_delete(key, expected).await
    }
}
