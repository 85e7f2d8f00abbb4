use jiff::{Span, Zoned};
use std::sync::Arc;
use tracing::{error, info};
use zipline_cache::KvBloomFilter;
use zipline_core::{KvCache, Scope, UrlMapStore};

/// Guard values outlive many publication cycles; they are refreshed daily
/// and only need to survive publisher outages.
const GUARD_TTL_SECS: u64 = 30 * 86_400;

/// Bloom sizing must match the serving side, which reads the same filters.
const BLOOM_EXPECTED_ITEMS: usize = 100_000;
const BLOOM_FALSE_POSITIVE_RATE: f64 = 0.01;

/// Publishes each scope's `max(id)` to the KV store and rebuilds the bloom
/// filters from the full ID list.
///
/// The max-ID values are the resolver's first-line filter against
/// enumeration probes; the bloom rebuild repairs bits lost to the
/// last-writer-wins races of concurrent `add`s. Per-table failures are
/// logged and skipped so one bad table never blocks the other.
pub struct MaxIdPublisher<S, K> {
    store: Arc<S>,
    kv: Arc<K>,
    public_bloom: KvBloomFilter<Arc<K>>,
    private_bloom: KvBloomFilter<Arc<K>>,
}

impl<S, K> MaxIdPublisher<S, K>
where
    S: UrlMapStore,
    K: KvCache,
{
    pub fn new(store: Arc<S>, kv: Arc<K>) -> Self {
        let public_bloom = KvBloomFilter::new(
            Arc::clone(&kv),
            Scope::Public.bloom_key(),
            BLOOM_EXPECTED_ITEMS,
            BLOOM_FALSE_POSITIVE_RATE,
        );
        let private_bloom = KvBloomFilter::new(
            Arc::clone(&kv),
            Scope::Private.bloom_key(),
            BLOOM_EXPECTED_ITEMS,
            BLOOM_FALSE_POSITIVE_RATE,
        );

        Self {
            store,
            kv,
            public_bloom,
            private_bloom,
        }
    }

    /// Runs one publication pass over both scopes.
    pub async fn publish_once(&self) {
        for scope in [Scope::Public, Scope::Private] {
            let max_id = match self.store.max_id(scope).await {
                Ok(max_id) => max_id,
                Err(e) => {
                    error!(?scope, error = %e, "failed to read max id, skipping table");
                    continue;
                }
            };

            let key = scope.max_id_key();
            match self.kv.set(key, &max_id.to_string(), GUARD_TTL_SECS).await {
                Ok(()) => info!(key = %key, max_id, "published max-id guard"),
                Err(e) => error!(key = %key, error = %e, "failed to publish max-id guard"),
            }
        }
    }

    /// Rebuilds each scope's bloom filter from the full ID list.
    pub async fn rebuild_blooms(&self) {
        for scope in [Scope::Public, Scope::Private] {
            let ids = match self.store.list_ids(scope).await {
                Ok(ids) => ids,
                Err(e) => {
                    error!(?scope, error = %e, "failed to list ids, skipping bloom rebuild");
                    continue;
                }
            };

            let bloom = match scope {
                Scope::Public => &self.public_bloom,
                Scope::Private => &self.private_bloom,
            };
            let values: Vec<String> = ids.iter().map(ToString::to_string).collect();
            match bloom.rebuild(values.iter().map(String::as_str)).await {
                Ok(()) => info!(?scope, entries = values.len(), "rebuilt bloom filter"),
                Err(e) => error!(?scope, error = %e, "failed to rebuild bloom filter"),
            }
        }
    }

    /// Runs forever: one pass immediately, then one every day at the given
    /// local hour.
    pub async fn run_daily(&self, hour: i8) {
        self.publish_once().await;
        self.rebuild_blooms().await;

        loop {
            let wait_secs = seconds_until_next(hour);
            info!(wait_secs, "sleeping until next publication");
            tokio::time::sleep(std::time::Duration::from_secs(wait_secs)).await;

            self.publish_once().await;
            self.rebuild_blooms().await;
        }
    }
}

/// Seconds from now until the next local occurrence of `hour:00:00`.
fn seconds_until_next(hour: i8) -> u64 {
    let now = Zoned::now();
    let today = now
        .with()
        .hour(hour)
        .minute(0)
        .second(0)
        .subsec_nanosecond(0)
        .build();

    let next = match today {
        Ok(at_hour) if at_hour > now => at_hour,
        Ok(at_hour) => match at_hour.checked_add(Span::new().days(1)) {
            Ok(tomorrow) => tomorrow,
            Err(_) => return 86_400,
        },
        Err(_) => return 86_400,
    };

    (next.timestamp().as_second() - now.timestamp().as_second()).max(1) as u64
}
