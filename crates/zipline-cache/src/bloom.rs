use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bloomfilter::Bloom;
use tracing::{debug, trace};
use zipline_core::{CacheError, CacheResult, KvCache};

/// Seed for the filter's hash functions.
///
/// Fixed so that every process derives the same bit positions for the same
/// value; a filter serialized by one process must test correctly in another.
const FILTER_SEED: [u8; 32] = *b"zipline.shorturl.bloom.filter.v1";

/// A bloom filter persisted as a serialized bit-array in the KV store.
///
/// `contains` fetches and deserializes the filter on every call, treating an
/// absent key as the empty filter; `add` performs a fetch, sets the bits,
/// and writes the whole array back. The read-modify-write is not atomic:
/// concurrent adds race and the last writer wins. Callers therefore treat
/// the filter as a best-effort negative oracle only, and the periodic cache
/// warming rewrites it from the database to repair any drift.
#[derive(Debug, Clone)]
pub struct KvBloomFilter<C> {
    kv: C,
    key: String,
    expected_items: usize,
    false_positive_rate: f64,
}

impl<C: KvCache> KvBloomFilter<C> {
    /// Creates a filter handle.
    ///
    /// # Arguments
    ///
    /// * `kv` - The KV store holding the serialized bit-array
    /// * `key` - The filter's KV key (one filter per scope)
    /// * `expected_items` - Expected cardinality; sizes the bit-array
    /// * `false_positive_rate` - Target false-positive probability
    pub fn new(
        kv: C,
        key: impl Into<String>,
        expected_items: usize,
        false_positive_rate: f64,
    ) -> Self {
        Self {
            kv,
            key: key.into(),
            expected_items,
            false_positive_rate,
        }
    }

    /// Tests whether `value` may have been added.
    ///
    /// `false` is definitive; `true` may be a false positive. An absent
    /// filter in KV means nothing was ever added, so every probe is a
    /// definitive negative.
    pub async fn contains(&self, value: &str) -> CacheResult<bool> {
        match self.fetch().await? {
            Some(bloom) => Ok(bloom.check(&value.to_string())),
            None => {
                trace!(key = %self.key, "bloom filter absent, definite negative");
                Ok(false)
            }
        }
    }

    /// Adds `value` and writes the whole filter back.
    pub async fn add(&self, value: &str) -> CacheResult<()> {
        let mut bloom = match self.fetch().await? {
            Some(bloom) => bloom,
            None => self.empty_filter()?,
        };

        bloom.set(&value.to_string());
        let encoded = BASE64.encode(bloom.to_bytes());
        // TTL 0: the filter only ever grows and is rewritten by warming,
        // never expired away.
        self.kv.set(&self.key, &encoded, 0).await?;
        debug!(key = %self.key, "bloom filter updated");
        Ok(())
    }

    /// Replaces the persisted filter with one containing exactly `values`.
    ///
    /// Used by the cache warmer's full rewrite.
    pub async fn rebuild<'a>(&self, values: impl IntoIterator<Item = &'a str>) -> CacheResult<()> {
        let mut bloom = self.empty_filter()?;
        let mut count = 0usize;
        for value in values {
            bloom.set(&value.to_string());
            count += 1;
        }

        let encoded = BASE64.encode(bloom.to_bytes());
        self.kv.set(&self.key, &encoded, 0).await?;
        debug!(key = %self.key, entries = count, "bloom filter rebuilt");
        Ok(())
    }

    async fn fetch(&self) -> CacheResult<Option<Bloom<String>>> {
        let Some(encoded) = self.kv.get(&self.key).await? else {
            return Ok(None);
        };

        let bytes = BASE64.decode(encoded.as_bytes()).map_err(|e| {
            CacheError::InvalidData(format!("bloom filter for '{}' is not base64: {e}", self.key))
        })?;
        let bloom = Bloom::from_bytes(bytes).map_err(|e| {
            CacheError::InvalidData(format!("bloom filter for '{}' is corrupt: {e}", self.key))
        })?;
        Ok(Some(bloom))
    }

    fn empty_filter(&self) -> CacheResult<Bloom<String>> {
        Bloom::new_for_fp_rate_with_seed(
            self.expected_items,
            self.false_positive_rate,
            &FILTER_SEED,
        )
        .map_err(|e| CacheError::Serialization(format!("bloom filter sizing failed: {e}")))
    }
}
