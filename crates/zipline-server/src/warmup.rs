use crate::error::ServiceResult;
use crate::service::ServiceConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use zipline_cache::{jitter, KvBloomFilter};
use zipline_core::{KvCache, Scope, UrlMapStore};

/// How many records each scope warms per pass.
const PUBLIC_WARM_LIMIT: u32 = 100;
const PRIVATE_WARM_LIMIT: u32 = 50;

/// Interval between periodic warming passes.
pub const WARM_INTERVAL: Duration = Duration::from_secs(6 * 60 * 60);

/// Pre-populates the cache and bloom filters with the most accessed
/// mappings.
///
/// A pass runs once at startup and then on a fixed schedule. Per-record
/// failures are logged and skipped so a single bad row never aborts the
/// pass; the bloom additions double as the repair mechanism for bits lost
/// to concurrent writes.
#[derive(Debug)]
pub struct CacheWarmer<S, C, K> {
    store: Arc<S>,
    cache: Arc<C>,
    public_bloom: KvBloomFilter<Arc<K>>,
    private_bloom: KvBloomFilter<Arc<K>>,
    default_ttl_secs: u64,
}

impl<S, C, K> Clone for CacheWarmer<S, C, K> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            cache: Arc::clone(&self.cache),
            public_bloom: self.public_bloom.clone(),
            private_bloom: self.private_bloom.clone(),
            default_ttl_secs: self.default_ttl_secs,
        }
    }
}

impl<S, C, K> CacheWarmer<S, C, K>
where
    S: UrlMapStore,
    C: KvCache,
    K: KvCache,
{
    pub fn new(
        store: Arc<S>,
        cache: Arc<C>,
        distributed: Arc<K>,
        config: &ServiceConfig,
    ) -> Self {
        let public_bloom = KvBloomFilter::new(
            Arc::clone(&distributed),
            Scope::Public.bloom_key(),
            config.bloom_expected_items,
            config.bloom_false_positive_rate,
        );
        let private_bloom = KvBloomFilter::new(
            Arc::clone(&distributed),
            Scope::Private.bloom_key(),
            config.bloom_expected_items,
            config.bloom_false_positive_rate,
        );

        Self {
            store,
            cache,
            public_bloom,
            private_bloom,
            default_ttl_secs: config.default_ttl_secs,
        }
    }

    /// Runs one full warming pass over both scopes.
    pub async fn warmup(&self) -> ServiceResult<()> {
        info!("starting cache warmup");
        self.warm_scope(Scope::Public, PUBLIC_WARM_LIMIT).await?;
        self.warm_scope(Scope::Private, PRIVATE_WARM_LIMIT).await?;
        info!("cache warmup finished");
        Ok(())
    }

    async fn warm_scope(&self, scope: Scope, limit: u32) -> ServiceResult<()> {
        let records = self.store.top_by_times(scope, limit).await?;
        debug!(?scope, count = records.len(), "warming records");

        for record in records {
            let key = scope.cache_key(&record.short_key);
            if let Err(e) = self
                .cache
                .set(&key, &record.original_url, jitter(self.default_ttl_secs))
                .await
            {
                warn!(key = %key, error = %e, "failed to warm cache entry, skipping");
                continue;
            }

            let bloom = match scope {
                Scope::Public => &self.public_bloom,
                Scope::Private => &self.private_bloom,
            };
            if let Err(e) = bloom.add(&record.id.to_string()).await {
                warn!(id = record.id, error = %e, "failed to warm bloom filter entry");
            }
        }

        Ok(())
    }

    /// Spawns the periodic warming task.
    ///
    /// The returned handle cancels the task cleanly at shutdown. The first
    /// pass runs one full interval after the call; run [`warmup`] directly
    /// for the startup pass.
    ///
    /// [`warmup`]: CacheWarmer::warmup
    pub fn spawn_periodic(&self, interval: Duration) -> WarmupHandle {
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let warmer = self.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = warmer.warmup().await {
                            warn!(error = %e, "periodic cache warmup failed");
                        }
                    }
                    _ = stop_rx.changed() => {
                        debug!("periodic cache warmup stopped");
                        return;
                    }
                }
            }
        });

        WarmupHandle { stop_tx }
    }
}

/// Stops the periodic warming task when asked or dropped.
#[derive(Debug)]
pub struct WarmupHandle {
    stop_tx: watch::Sender<bool>,
}

impl WarmupHandle {
    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
    }
}
