//! Cache implementations shared across Zipline services.
//!
//! The resolution pipeline layers several protections over the origin
//! database: an in-process TTL map ([`LocalCache`]), a distributed KV tier
//! ([`RedisKvCache`]) composed with the local tier ([`TwoLevelCache`]), a
//! KV-persisted bloom filter for negative lookups ([`KvBloomFilter`]), and a
//! distributed lock for cache-fill mutual exclusion ([`KvLock`]).

pub mod bloom;
pub mod jitter;
pub mod local;
pub mod lock;
pub mod memory;
pub mod redis;
pub mod two_level;

pub use bloom::KvBloomFilter;
pub use jitter::jitter;
pub use local::LocalCache;
pub use lock::{KvLock, LockLease};
pub use memory::InMemoryKvCache;
pub use redis::RedisKvCache;
pub use two_level::TwoLevelCache;
