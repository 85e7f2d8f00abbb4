use crate::error::{ServiceError, ServiceResult};
use crate::guard;
use jiff::Timestamp;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace, warn};
use typed_builder::TypedBuilder;
use zipline_cache::{jitter, KvBloomFilter, KvLock};
use zipline_core::{base62, is_url, KvCache, Scope, UrlMapStore};

/// TTL of the cache-fill lock. Must exceed the worst case of one database
/// read plus one cache write.
const LOCK_TTL_SECS: u64 = 5;

/// Base delay between attempts when the lock is contended; attempt `n`
/// waits `n` times this.
const LOCK_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Lock acquisition attempts before falling through to a direct database
/// read. Bounded so a wedged lock holder cannot starve resolvers.
const LOCK_MAX_ATTEMPTS: u32 = 5;

/// Service settings.
#[derive(Debug, Clone, TypedBuilder)]
pub struct ServiceConfig {
    /// Domain prepended to public short keys, e.g. `https://s.zipline.dev/`.
    #[builder(setter(into))]
    pub short_domain: String,
    /// Domain prepended to private short keys.
    #[builder(setter(into))]
    pub user_short_domain: String,
    /// Base TTL for cached mappings; every write jitters it. The negative
    /// sentinel uses half of it.
    #[builder(default = 3600)]
    pub default_ttl_secs: u64,
    /// Expected cardinality of each scope's bloom filter.
    #[builder(default = 100_000)]
    pub bloom_expected_items: usize,
    /// Target false-positive rate of each scope's bloom filter.
    #[builder(default = 0.01)]
    pub bloom_false_positive_rate: f64,
}

/// The short-URL generator/resolver.
///
/// # Type parameters
///
/// * `S` - The origin store (MySQL in production)
/// * `C` - The read/write cache for mappings and sentinels (the two-level
///   cache in production)
/// * `K` - The distributed KV tier backing the lock, the bloom filters, and
///   the max-ID guard; these must be cluster-visible, so they never go
///   through the local tier
#[derive(Debug)]
pub struct ShortUrlService<S, C, K> {
    store: Arc<S>,
    cache: Arc<C>,
    distributed: Arc<K>,
    lock: KvLock<K>,
    public_bloom: KvBloomFilter<Arc<K>>,
    private_bloom: KvBloomFilter<Arc<K>>,
    config: ServiceConfig,
}

fn now_unix_seconds() -> i64 {
    Timestamp::now().as_second()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

impl<S, C, K> ShortUrlService<S, C, K>
where
    S: UrlMapStore,
    C: KvCache,
    K: KvCache,
{
    pub fn new(store: Arc<S>, cache: Arc<C>, distributed: Arc<K>, config: ServiceConfig) -> Self {
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
            lock: KvLock::new(Arc::clone(&distributed)),
            cache,
            distributed,
            public_bloom,
            private_bloom,
            config,
        }
    }

    fn bloom(&self, scope: Scope) -> &KvBloomFilter<Arc<K>> {
        match scope {
            Scope::Public => &self.public_bloom,
            Scope::Private => &self.private_bloom,
        }
    }

    fn domain(&self, scope: Scope) -> &str {
        match scope {
            Scope::Public => &self.config.short_domain,
            Scope::Private => &self.config.user_short_domain,
        }
    }

    /// Generates (or returns the existing) short URL for `original_url`.
    ///
    /// Existing mappings are deduplicated by original URL within the scope;
    /// new ones allocate an ID, encode it, and finalise the row. Either way
    /// the mapping is written through to the cache and the ID registered in
    /// the scope's bloom filter before the full short URL is returned.
    pub async fn shorten(
        &self,
        original_url: &str,
        user_id: i64,
        is_public: bool,
    ) -> ServiceResult<String> {
        let scope = Scope::derive(user_id, is_public);

        if original_url.is_empty() || !is_url(original_url) {
            return Err(ServiceError::InvalidArgument(format!(
                "not a valid original url: '{original_url}'"
            )));
        }

        let existing = self.store.get_by_original(scope, original_url).await?;
        let (id, short_key) = match existing {
            Some(record) if !record.short_key.is_empty() => {
                trace!(short_key = %record.short_key, "existing mapping reused");
                (record.id, record.short_key)
            }
            // Absent, or a bare row another writer allocated and never
            // finalised; either way this call allocates its own ID.
            _ => {
                let now = now_unix_seconds();
                let id = self.store.allocate_id(scope, user_id, now).await?;
                let short_key = base62::encode(id);
                self.store
                    .update_mapping(scope, id, &short_key, original_url, now)
                    .await?;
                debug!(id, short_key = %short_key, "new mapping created");
                (id, short_key)
            }
        };

        let key = scope.cache_key(&short_key);
        self.cache
            .set(&key, original_url, jitter(self.config.default_ttl_secs))
            .await?;

        if let Err(e) = self.bloom(scope).add(&id.to_string()).await {
            warn!(id, error = %e, "failed to register id in bloom filter");
        }

        Ok(format!("{}{}", self.domain(scope), short_key))
    }

    /// Resolves a short key back to its original URL.
    ///
    /// The read path walks the protection layers in order: two-level cache,
    /// negative sentinel, bloom filter, max-ID guard, then the cache-fill
    /// critical section under a distributed lock. Lock contention retries
    /// from the cache probe with linear backoff, and after the final
    /// attempt falls through to an unlocked database read rather than
    /// starving behind a wedged holder.
    pub async fn resolve(
        &self,
        short_key: &str,
        user_id: i64,
        is_public: bool,
    ) -> ServiceResult<String> {
        let scope = Scope::derive(user_id, is_public);

        if short_key.is_empty() {
            return Err(ServiceError::InvalidArgument("empty short key".to_string()));
        }
        let id = base62::decode(short_key);
        if id == 0 {
            return Err(ServiceError::InvalidArgument(format!(
                "short key '{short_key}' does not decode to an id"
            )));
        }

        let key = scope.cache_key(short_key);
        let sentinel_key = format!("{key}:empty");
        let lock_key = format!("lock:{key}");
        let id_str = id.to_string();

        let mut attempt: u32 = 0;
        let original_url = loop {
            if let Some(url) = non_empty(self.cache.get(&key).await?) {
                trace!(key = %key, "cache hit");
                break url;
            }

            if self.cache.exists(&sentinel_key).await? {
                debug!(key = %key, "negative sentinel hit");
                return Err(ServiceError::NotFound);
            }

            match self.bloom(scope).contains(&id_str).await {
                Ok(false) => {
                    debug!(id, "bloom filter definite negative");
                    return Err(ServiceError::NotFound);
                }
                Ok(true) => {}
                Err(e) => {
                    warn!(id, error = %e, "bloom filter check failed, proceeding");
                }
            }

            if !guard::admits_id(&self.distributed, scope, id).await? {
                debug!(id, "id exceeds max-id guard");
                return Err(ServiceError::InvalidShortLink);
            }

            match self.lock.acquire(&lock_key, LOCK_TTL_SECS).await {
                Ok(Some(lease)) => {
                    let filled = self.fill_from_store(scope, id, &key, &sentinel_key).await;
                    if let Err(e) = self.lock.release(lease).await {
                        warn!(key = %lock_key, error = %e, "failed to release cache-fill lock");
                    }
                    match filled? {
                        Some(url) => break url,
                        None => return Err(ServiceError::NotFound),
                    }
                }
                Ok(None) => {
                    attempt += 1;
                    if attempt < LOCK_MAX_ATTEMPTS {
                        trace!(key = %lock_key, attempt, "lock contended, backing off");
                        tokio::time::sleep(LOCK_RETRY_DELAY * attempt).await;
                        continue;
                    }
                    // Retries exhausted; the holder may be wedged. Read the
                    // database directly rather than wait forever.
                    debug!(key = %lock_key, "lock retries exhausted, reading store unlocked");
                    match self.fill_from_store(scope, id, &key, &sentinel_key).await? {
                        Some(url) => break url,
                        None => return Err(ServiceError::NotFound),
                    }
                }
                Err(e) => {
                    warn!(key = %lock_key, error = %e, "lock acquisition failed, reading store unlocked");
                    match self.fill_from_store(scope, id, &key, &sentinel_key).await? {
                        Some(url) => break url,
                        None => return Err(ServiceError::NotFound),
                    }
                }
            }
        };

        if let Err(e) = self
            .store
            .increment_times(scope, id, 1, now_unix_seconds())
            .await
        {
            warn!(id, error = %e, "failed to increment access counter");
        }

        Ok(original_url)
    }

    /// The cache-fill critical section: recheck the cache, then read the
    /// store and write back either the mapping or the negative sentinel.
    async fn fill_from_store(
        &self,
        scope: Scope,
        id: i64,
        key: &str,
        sentinel_key: &str,
    ) -> ServiceResult<Option<String>> {
        // Another resolver may have filled the cache while we waited on the
        // lock.
        if let Some(url) = non_empty(self.cache.get(key).await?) {
            trace!(key = %key, "cache filled while acquiring lock");
            return Ok(Some(url));
        }

        match self.store.get_by_id(scope, id).await? {
            Some(record) if !record.original_url.is_empty() => {
                self.cache
                    .set(key, &record.original_url, jitter(self.config.default_ttl_secs))
                    .await?;
                debug!(id, key = %key, "cache filled from store");
                Ok(Some(record.original_url))
            }
            _ => {
                // Known-missing: a short-lived sentinel absorbs repeat
                // probes for the same id without touching the database.
                let sentinel_ttl = self.config.default_ttl_secs / 2;
                if let Err(e) = self.cache.set(sentinel_key, "", sentinel_ttl).await {
                    warn!(key = %sentinel_key, error = %e, "failed to write negative sentinel");
                }
                debug!(id, "id absent from store, negative sentinel written");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use zipline_cache::{InMemoryKvCache, LocalCache, TwoLevelCache};
    use zipline_core::{StorageResult, UrlMapping};
    use zipline_storage::InMemoryUrlMapStore;

    /// Store wrapper that counts `get_by_id` calls, so tests can assert how
    /// often the database was actually touched.
    #[derive(Debug, Default)]
    struct CountingStore {
        inner: InMemoryUrlMapStore,
        get_by_id_calls: AtomicUsize,
    }

    impl CountingStore {
        fn db_reads(&self) -> usize {
            self.get_by_id_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl UrlMapStore for CountingStore {
        async fn allocate_id(&self, scope: Scope, user_id: i64, now: i64) -> StorageResult<i64> {
            self.inner.allocate_id(scope, user_id, now).await
        }

        async fn update_mapping(
            &self,
            scope: Scope,
            id: i64,
            short_key: &str,
            original_url: &str,
            now: i64,
        ) -> StorageResult<()> {
            self.inner
                .update_mapping(scope, id, short_key, original_url, now)
                .await
        }

        async fn get_by_id(&self, scope: Scope, id: i64) -> StorageResult<Option<UrlMapping>> {
            self.get_by_id_calls.fetch_add(1, Ordering::SeqCst);
            self.inner.get_by_id(scope, id).await
        }

        async fn get_by_original(
            &self,
            scope: Scope,
            original_url: &str,
        ) -> StorageResult<Option<UrlMapping>> {
            self.inner.get_by_original(scope, original_url).await
        }

        async fn increment_times(
            &self,
            scope: Scope,
            id: i64,
            delta: i64,
            now: i64,
        ) -> StorageResult<()> {
            self.inner.increment_times(scope, id, delta, now).await
        }

        async fn top_by_times(&self, scope: Scope, limit: u32) -> StorageResult<Vec<UrlMapping>> {
            self.inner.top_by_times(scope, limit).await
        }

        async fn max_id(&self, scope: Scope) -> StorageResult<i64> {
            self.inner.max_id(scope).await
        }

        async fn list_ids(&self, scope: Scope) -> StorageResult<Vec<i64>> {
            self.inner.list_ids(scope).await
        }
    }

    type TestService =
        ShortUrlService<CountingStore, TwoLevelCache<Arc<InMemoryKvCache>>, InMemoryKvCache>;

    const PUBLIC_DOMAIN: &str = "https://s.zipline.test/";
    const PRIVATE_DOMAIN: &str = "https://u.zipline.test/";

    fn test_config() -> ServiceConfig {
        ServiceConfig::builder()
            .short_domain(PUBLIC_DOMAIN)
            .user_short_domain(PRIVATE_DOMAIN)
            .build()
    }

    fn test_service() -> (Arc<TestService>, Arc<CountingStore>, Arc<InMemoryKvCache>) {
        let store = Arc::new(CountingStore::default());
        let kv = Arc::new(InMemoryKvCache::new());
        let cache = Arc::new(TwoLevelCache::new(
            LocalCache::new(),
            Arc::clone(&kv),
            3600,
        ));
        let service = Arc::new(ShortUrlService::new(
            Arc::clone(&store),
            cache,
            Arc::clone(&kv),
            test_config(),
        ));
        (service, store, kv)
    }

    fn key_of(short_url: &str, domain: &str) -> String {
        short_url
            .strip_prefix(domain)
            .expect("short url must carry the scope domain")
            .to_string()
    }

    /// Inserts a finalised record directly, bypassing the generator's
    /// write-through, so resolve tests start from a cold cache.
    async fn insert_cold_record(
        service: &TestService,
        store: &CountingStore,
        scope: Scope,
        url: &str,
    ) -> (i64, String) {
        let now = 1_700_000_000;
        let user_id = match scope {
            Scope::Public => 0,
            Scope::Private => 7,
        };
        let id = store.inner.allocate_id(scope, user_id, now).await.unwrap();
        let short_key = base62::encode(id);
        store
            .inner
            .update_mapping(scope, id, &short_key, url, now)
            .await
            .unwrap();
        service
            .bloom(scope)
            .add(&id.to_string())
            .await
            .unwrap();
        (id, short_key)
    }

    #[tokio::test]
    async fn shorten_then_resolve_roundtrip() {
        let (service, _, _) = test_service();

        let short_url = service
            .shorten("https://a.test/x", 0, true)
            .await
            .unwrap();
        assert!(short_url.starts_with(PUBLIC_DOMAIN));

        let key = key_of(&short_url, PUBLIC_DOMAIN);
        assert_eq!(key, base62::encode(1));

        let resolved = service.resolve(&key, 0, true).await.unwrap();
        assert_eq!(resolved, "https://a.test/x");
    }

    #[tokio::test]
    async fn shorten_rejects_empty_and_malformed_urls() {
        let (service, _, _) = test_service();

        for bad in ["", "not-a-url", "ftp://a.test/x", "https://nohost"] {
            let err = service.shorten(bad, 0, true).await.unwrap_err();
            assert!(
                matches!(err, ServiceError::InvalidArgument(_)),
                "expected InvalidArgument for '{bad}'"
            );
        }
    }

    #[tokio::test]
    async fn shorten_is_idempotent_per_scope() {
        let (service, store, _) = test_service();

        let first = service
            .shorten("https://a.test/x", 0, true)
            .await
            .unwrap();
        let second = service
            .shorten("https://a.test/x", 0, true)
            .await
            .unwrap();

        assert_eq!(first, second);
        // Exactly one row was created.
        assert_eq!(store.inner.list_ids(Scope::Public).await.unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn scopes_are_disjoint_namespaces() {
        let (service, _, _) = test_service();
        let url = "https://a.test/x";

        let public = service.shorten(url, 0, true).await.unwrap();
        let private = service.shorten(url, 7, true).await.unwrap();

        assert!(public.starts_with(PUBLIC_DOMAIN));
        assert!(private.starts_with(PRIVATE_DOMAIN));
        // Both scopes allocated id 1, so the keys collide in string form
        // while denoting different records.
        assert_eq!(
            key_of(&public, PUBLIC_DOMAIN),
            key_of(&private, PRIVATE_DOMAIN)
        );

        let public_key = key_of(&public, PUBLIC_DOMAIN);
        assert_eq!(service.resolve(&public_key, 0, true).await.unwrap(), url);
        let private_key = key_of(&private, PRIVATE_DOMAIN);
        assert_eq!(service.resolve(&private_key, 7, true).await.unwrap(), url);
    }

    #[tokio::test]
    async fn resolve_rejects_empty_and_undecodable_keys() {
        let (service, _, _) = test_service();

        let err = service.resolve("", 0, true).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidArgument(_)));

        // "!" is off-alphabet, so the key decodes to 0.
        let err = service.resolve("!", 0, true).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn bloom_negative_short_circuits_before_database() {
        let (service, store, _) = test_service();

        // Nothing was ever added to the bloom filter, so the probe is a
        // definite negative.
        let err = service
            .resolve(&base62::encode(12345), 0, true)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound));
        assert_eq!(store.db_reads(), 0);
    }

    #[tokio::test]
    async fn guard_rejects_out_of_range_id_without_database() {
        let (service, store, kv) = test_service();

        let id = 99_999i64;
        // The bloom filter admits the id (false positives behave the same),
        // so the guard is what must stop the probe.
        service.bloom(Scope::Public).add(&id.to_string()).await.unwrap();
        kv.set(Scope::Public.max_id_key(), "10", 0).await.unwrap();

        let err = service
            .resolve(&base62::encode(id), 0, true)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidShortLink));
        assert_eq!(store.db_reads(), 0);
    }

    #[tokio::test]
    async fn cache_hit_short_circuits_bloom_and_guard() {
        let (service, store, kv) = test_service();

        let short_url = service.shorten("https://a.test/x", 0, true).await.unwrap();
        let key = key_of(&short_url, PUBLIC_DOMAIN);

        // A guard that would reject the id is never consulted on a cache
        // hit.
        kv.set(Scope::Public.max_id_key(), "0", 0).await.unwrap();

        let resolved = service.resolve(&key, 0, true).await.unwrap();
        assert_eq!(resolved, "https://a.test/x");
        assert_eq!(store.db_reads(), 0);
    }

    #[tokio::test]
    async fn missing_id_is_negatively_cached() {
        let (service, store, _) = test_service();

        let id = 57i64;
        // Pretend the id leaked into the bloom filter (e.g. a lost row);
        // the store has no such record.
        service.bloom(Scope::Public).add(&id.to_string()).await.unwrap();

        let key = base62::encode(id);
        let err = service.resolve(&key, 0, true).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound));
        assert_eq!(store.db_reads(), 1);

        // The second probe hits the sentinel; the database stays cold.
        let err = service.resolve(&key, 0, true).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound));
        assert_eq!(store.db_reads(), 1);
    }

    #[tokio::test]
    async fn unfinalised_row_resolves_as_not_found() {
        let (service, store, _) = test_service();

        let id = store
            .inner
            .allocate_id(Scope::Public, 0, 1_700_000_000)
            .await
            .unwrap();
        service.bloom(Scope::Public).add(&id.to_string()).await.unwrap();

        let err = service
            .resolve(&base62::encode(id), 0, true)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound));
    }

    #[tokio::test]
    async fn cold_resolve_reads_database_once_then_serves_from_cache() {
        let (service, store, _) = test_service();
        let (_, short_key) =
            insert_cold_record(&service, &store, Scope::Public, "https://a.test/x").await;

        assert_eq!(
            service.resolve(&short_key, 0, true).await.unwrap(),
            "https://a.test/x"
        );
        assert_eq!(store.db_reads(), 1);

        assert_eq!(
            service.resolve(&short_key, 0, true).await.unwrap(),
            "https://a.test/x"
        );
        assert_eq!(store.db_reads(), 1);
    }

    #[tokio::test]
    async fn thundering_herd_performs_at_most_one_database_read() {
        let (service, store, _) = test_service();
        let (_, short_key) =
            insert_cold_record(&service, &store, Scope::Public, "https://a.test/herd").await;

        let mut handles = Vec::new();
        for _ in 0..50 {
            let service = Arc::clone(&service);
            let short_key = short_key.clone();
            handles.push(tokio::spawn(async move {
                service.resolve(&short_key, 0, true).await
            }));
        }

        for handle in handles {
            let url = handle.await.unwrap().unwrap();
            assert_eq!(url, "https://a.test/herd");
        }

        assert!(
            store.db_reads() <= 1,
            "expected at most one database read, saw {}",
            store.db_reads()
        );
    }

    #[tokio::test]
    async fn times_counter_is_monotonic_across_resolves() {
        let (service, store, _) = test_service();
        let (id, short_key) =
            insert_cold_record(&service, &store, Scope::Public, "https://a.test/x").await;

        let mut last = 0;
        for _ in 0..3 {
            service.resolve(&short_key, 0, true).await.unwrap();
            let times = store
                .inner
                .get_by_id(Scope::Public, id)
                .await
                .unwrap()
                .unwrap()
                .times;
            assert!(times >= last);
            last = times;
        }
        assert_eq!(last, 3);
    }

    #[tokio::test]
    async fn private_resolution_does_not_see_public_records() {
        let (service, store, _) = test_service();
        let (_, short_key) =
            insert_cold_record(&service, &store, Scope::Public, "https://a.test/x").await;

        // Same key string, private scope: the private bloom filter was
        // never touched, so this is a definite negative.
        let err = service.resolve(&short_key, 7, false).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound));
    }
}
