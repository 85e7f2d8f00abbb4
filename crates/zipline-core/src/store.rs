use crate::error::StorageResult;
use crate::record::{Scope, UrlMapping};
use async_trait::async_trait;
use std::sync::Arc;

/// Persistent store of URL mappings, one table per scope.
///
/// Records are created in two steps: `allocate_id` inserts a bare row to
/// obtain the auto-assigned ID (the authoritative ID-issuance primitive),
/// and `update_mapping` finalises it with the encoded short key and the
/// original URL. Records are never deleted.
#[async_trait]
pub trait UrlMapStore: Send + Sync + 'static {
    /// Inserts a bare row and returns the assigned ID.
    ///
    /// `user_id` is only recorded when non-zero; `now` is Unix seconds and
    /// stamps both `create_at` and `update_at`.
    async fn allocate_id(&self, scope: Scope, user_id: i64, now: i64) -> StorageResult<i64>;

    /// Writes the short key and original URL onto a previously allocated row.
    async fn update_mapping(
        &self,
        scope: Scope,
        id: i64,
        short_key: &str,
        original_url: &str,
        now: i64,
    ) -> StorageResult<()>;

    /// Looks a mapping up by ID. Absent rows are `Ok(None)`.
    async fn get_by_id(&self, scope: Scope, id: i64) -> StorageResult<Option<UrlMapping>>;

    /// Looks a mapping up by its original URL.
    ///
    /// A returned record with an empty `short_key` is a row that was
    /// allocated but never finalised; callers treat it the same as absent
    /// for dedup purposes.
    async fn get_by_original(
        &self,
        scope: Scope,
        original_url: &str,
    ) -> StorageResult<Option<UrlMapping>>;

    /// Adds `delta` to a record's access counter. Best-effort at call sites:
    /// the resolver logs and swallows failures.
    async fn increment_times(
        &self,
        scope: Scope,
        id: i64,
        delta: i64,
        now: i64,
    ) -> StorageResult<()>;

    /// Returns the most accessed finalised mappings, ordered by `times`
    /// descending. Feeds the cache warmer.
    async fn top_by_times(&self, scope: Scope, limit: u32) -> StorageResult<Vec<UrlMapping>>;

    /// Returns the largest issued ID, or 0 for an empty table. Feeds the
    /// max-ID guard publisher.
    async fn max_id(&self, scope: Scope) -> StorageResult<i64>;

    /// Returns every issued ID in the table. Feeds the periodic bloom-filter
    /// rebuild that repairs drift from lost concurrent writes.
    async fn list_ids(&self, scope: Scope) -> StorageResult<Vec<i64>>;
}

#[async_trait]
impl<T: UrlMapStore + ?Sized> UrlMapStore for Arc<T> {
    async fn allocate_id(&self, scope: Scope, user_id: i64, now: i64) -> StorageResult<i64> {
        (**self).allocate_id(scope, user_id, now).await
    }

    async fn update_mapping(
        &self,
        scope: Scope,
        id: i64,
        short_key: &str,
        original_url: &str,
        now: i64,
    ) -> StorageResult<()> {
        (**self)
            .update_mapping(scope, id, short_key, original_url, now)
            .await
    }

    async fn get_by_id(&self, scope: Scope, id: i64) -> StorageResult<Option<UrlMapping>> {
        (**self).get_by_id(scope, id).await
    }

    async fn get_by_original(
        &self,
        scope: Scope,
        original_url: &str,
    ) -> StorageResult<Option<UrlMapping>> {
        (**self).get_by_original(scope, original_url).await
    }

    async fn increment_times(
        &self,
        scope: Scope,
        id: i64,
        delta: i64,
        now: i64,
    ) -> StorageResult<()> {
        (**self).increment_times(scope, id, delta, now).await
    }

    async fn top_by_times(&self, scope: Scope, limit: u32) -> StorageResult<Vec<UrlMapping>> {
        (**self).top_by_times(scope, limit).await
    }

    async fn max_id(&self, scope: Scope) -> StorageResult<i64> {
        (**self).max_id(scope).await
    }

    async fn list_ids(&self, scope: Scope) -> StorageResult<Vec<i64>> {
        (**self).list_ids(scope).await
    }
}
