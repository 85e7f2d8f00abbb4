//! Core types and traits for the Zipline short-URL platform.
//!
//! This crate provides the shared vocabulary used by the generator/resolver
//! service, the redirection edge, and the max-ID publisher: the Base62 codec,
//! the mapping record and its scope, and the cache/storage trait seams.

pub mod base62;
pub mod error;
pub mod kv;
pub mod record;
pub mod store;
pub mod url;

pub use error::{CacheError, CacheResult, StorageError, StorageResult};
pub use kv::KvCache;
pub use record::{Scope, UrlMapping};
pub use store::UrlMapStore;
pub use url::is_url;
