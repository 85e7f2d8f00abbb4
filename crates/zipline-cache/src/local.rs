use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, trace};

/// How often the background reaper sweeps expired entries.
const SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

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

/// The in-process tier of the two-level cache.
///
/// A TTL map guarded by a readers-writer lock. Reads lazily evict expired
/// entries; a background reaper sweeps the whole map every five minutes so
/// entries that are never read again do not pin memory. The lock is never
/// held across an await point.
#[derive(Debug, Clone)]
pub struct LocalCache {
    inner: Arc<RwLock<HashMap<String, Entry>>>,
    sweep_interval: Duration,
}

impl LocalCache {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
            sweep_interval: SWEEP_INTERVAL,
        }
    }

    /// Creates a cache with a custom sweep interval (tests only need this).
    pub fn with_sweep_interval(sweep_interval: Duration) -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
            sweep_interval,
        }
    }

    /// Fetches a value, lazily evicting it if its TTL has elapsed.
    pub fn get(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        {
            let map = self.inner.read();
            match map.get(key) {
                Some(entry) if !entry.is_expired(now) => return Some(entry.value.clone()),
                Some(_) => {}
                None => return None,
            }
        }

        // The entry exists but has expired; take the write lock and evict,
        // re-checking because another writer may have replaced it meanwhile.
        let mut map = self.inner.write();
        if map.get(key).is_some_and(|entry| entry.is_expired(now)) {
            map.remove(key);
        }
        None
    }

    /// Stores a value. A zero TTL means the entry never expires.
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>, ttl: Duration) {
        let expires_at = (!ttl.is_zero()).then(|| Instant::now() + ttl);
        let mut map = self.inner.write();
        map.insert(
            key.into(),
            Entry {
                value: value.into(),
                expires_at,
            },
        );
    }

    /// Removes a single entry.
    pub fn delete(&self, key: &str) {
        self.inner.write().remove(key);
    }

    /// Drops every entry.
    pub fn clear(&self) {
        self.inner.write().clear();
    }

    /// Number of entries currently held, expired or not.
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// Removes every expired entry. Called by the reaper; exposed so tests
    /// can drive a sweep deterministically.
    pub fn sweep(&self) {
        let now = Instant::now();
        let mut map = self.inner.write();
        let before = map.len();
        map.retain(|_, entry| !entry.is_expired(now));
        let evicted = before - map.len();
        if evicted > 0 {
            debug!(evicted, remaining = map.len(), "local cache sweep evicted entries");
        }
    }

    /// Spawns the background reaper task.
    ///
    /// The returned handle stops the task when asked (or when dropped along
    /// with its sender at process shutdown).
    pub fn spawn_reaper(&self) -> ReaperHandle {
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let cache = self.clone();
        let interval = self.sweep_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick fires immediately; skip it so the first sweep
            // happens one full interval after startup.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        trace!("local cache reaper sweeping");
                        cache.sweep();
                    }
                    _ = stop_rx.changed() => {
                        debug!("local cache reaper stopped");
                        return;
                    }
                }
            }
        });

        ReaperHandle { stop_tx }
    }
}

impl Default for LocalCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Stops the background reaper when asked or dropped.
#[derive(Debug)]
pub struct ReaperHandle {
    stop_tx: watch::Sender<bool>,
}

impl ReaperHandle {
    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
    }
}
