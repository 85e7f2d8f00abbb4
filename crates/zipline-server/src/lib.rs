//! The Zipline short-URL gRPC service.
//!
//! [`ShortUrlService`] orchestrates the layered read path (local cache,
//! distributed cache, negative sentinel, bloom filter, max-ID guard,
//! distributed lock, origin database) and the write-through creation path.
//! [`CacheWarmer`] pre-populates the cache and bloom filters from the most
//! accessed records, at startup and periodically.

pub mod auth;
pub mod error;
pub mod guard;
pub mod service;
pub mod warmup;

pub use auth::BearerAuth;
pub use error::{ServiceError, ServiceResult};
pub use service::{ServiceConfig, ShortUrlService};
pub use warmup::{CacheWarmer, WarmupHandle};
