use crate::jitter::jitter;
use crate::local::LocalCache;
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, trace};
use zipline_core::{CacheResult, KvCache};

/// A two-level cache composing the in-process tier over a distributed tier.
///
/// # Operation strategy
///
/// - **Get**: probe the local tier first; on a miss, probe the distributed
///   tier and backfill the local tier with a jittered TTL of the configured
///   default.
/// - **Set**: write the distributed tier with exactly the requested TTL,
///   then the local tier with a jittered TTL derived from it.
/// - **Everything else** (`exists`, `set_if_absent`, `delete`,
///   `compare_and_delete`) must be cluster-visible, so it goes to the
///   distributed tier; `delete` also clears the local entry.
///
/// The jitter at the local tier de-synchronises expirations across
/// processes; the distributed tier already receives jittered TTLs from the
/// resolver's own protection layer.
#[derive(Debug, Clone)]
pub struct TwoLevelCache<C> {
    local: LocalCache,
    distributed: C,
    default_ttl_secs: u64,
}

impl<C> TwoLevelCache<C> {
    /// Creates a two-level cache.
    ///
    /// `default_ttl_secs` is the base TTL used to backfill the local tier
    /// when a distributed hit carries no TTL information of its own.
    pub fn new(local: LocalCache, distributed: C, default_ttl_secs: u64) -> Self {
        Self {
            local,
            distributed,
            default_ttl_secs,
        }
    }

    /// Returns a reference to the local tier.
    pub fn local(&self) -> &LocalCache {
        &self.local
    }

    /// Returns a reference to the distributed tier.
    pub fn distributed(&self) -> &C {
        &self.distributed
    }
}

#[async_trait]
impl<C: KvCache> KvCache for TwoLevelCache<C> {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        if let Some(value) = self.local.get(key) {
            trace!(key = %key, "local tier hit");
            return Ok(Some(value));
        }

        let value = self.distributed.get(key).await?;

        if let Some(ref v) = value {
            if !v.is_empty() {
                debug!(key = %key, "distributed tier hit, backfilling local tier");
                let ttl = Duration::from_secs(jitter(self.default_ttl_secs));
                self.local.set(key, v.clone(), ttl);
            }
        }

        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl_secs: u64) -> CacheResult<()> {
        // Distributed first; a local-only entry that outlives a failed
        // distributed write would serve phantom hits on this process alone.
        self.distributed.set(key, value, ttl_secs).await?;

        let local_ttl = Duration::from_secs(jitter(ttl_secs));
        self.local.set(key, value, local_ttl);
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl_secs: u64) -> CacheResult<bool> {
        self.distributed.set_if_absent(key, value, ttl_secs).await
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        self.distributed.exists(key).await
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.local.delete(key);
        self.distributed.delete(key).await
    }

    async fn compare_and_delete(&self, key: &str, expected: &str) -> CacheResult<bool> {
        self.distributed.compare_and_delete(key, expected).await
    }
}
