use rand::Rng;
use std::sync::Arc;
use tracing::{debug, warn};
use zipline_core::{CacheResult, KvCache};

const TOKEN_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const TOKEN_LEN: usize = 16;

/// An acquired lease on a named distributed lock.
///
/// The lease remembers the random owner token written at acquisition; only
/// the holder of the matching token can release the lock.
#[derive(Debug)]
pub struct LockLease {
    key: String,
    token: String,
}

impl LockLease {
    pub fn key(&self) -> &str {
        &self.key
    }
}

/// A distributed lock built on a [`KvCache`] primitive.
///
/// Acquisition is a single atomic `set_if_absent`; release is a single
/// atomic `compare_and_delete` of the remembered owner token, so an expired
/// lease can never delete a successor's lock. The lock is non-reentrant and
/// non-renewable: callers size the TTL to exceed the critical section's
/// worst-case duration.
#[derive(Debug)]
pub struct KvLock<C> {
    kv: Arc<C>,
}

impl<C> Clone for KvLock<C> {
    fn clone(&self) -> Self {
        Self {
            kv: Arc::clone(&self.kv),
        }
    }
}

impl<C: KvCache> KvLock<C> {
    pub fn new(kv: Arc<C>) -> Self {
        Self { kv }
    }

    /// Tries to acquire the lock once.
    ///
    /// Returns `Ok(None)` when another owner currently holds the key. On
    /// success, an `_owner` companion key is written with the same TTL as a
    /// recovery aid for operators; correctness relies only on the primary
    /// key.
    pub async fn acquire(&self, key: &str, ttl_secs: u64) -> CacheResult<Option<LockLease>> {
        let token = generate_token();

        if !self.kv.set_if_absent(key, &token, ttl_secs).await? {
            return Ok(None);
        }

        debug!(key = %key, "acquired distributed lock");

        let owner_key = format!("{key}_owner");
        if let Err(e) = self.kv.set(&owner_key, &token, ttl_secs).await {
            warn!(key = %key, error = %e, "failed to write lock owner key");
        }

        Ok(Some(LockLease {
            key: key.to_string(),
            token,
        }))
    }

    /// Releases a held lease.
    ///
    /// Returns whether the lock was still ours to delete. A lease whose TTL
    /// already elapsed (and whose key may now belong to another owner) is
    /// left untouched.
    pub async fn release(&self, lease: LockLease) -> CacheResult<bool> {
        let released = self.kv.compare_and_delete(&lease.key, &lease.token).await?;
        if released {
            debug!(key = %lease.key, "released distributed lock");
        } else {
            warn!(key = %lease.key, "lock was no longer held by this lease");
        }

        let owner_key = format!("{}_owner", lease.key);
        if let Err(e) = self.kv.delete(&owner_key).await {
            warn!(key = %lease.key, error = %e, "failed to delete lock owner key");
        }

        Ok(released)
    }
}

fn generate_token() -> String {
    let mut rng = rand::thread_rng();
    (0..TOKEN_LEN)
        .map(|_| TOKEN_CHARSET[rng.gen_range(0..TOKEN_CHARSET.len())] as char)
        .collect()
}
