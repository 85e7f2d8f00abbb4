use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use zipline_core::{Scope, StorageResult, UrlMapStore, UrlMapping};

/// In-memory implementation of [`UrlMapStore`].
///
/// Backs the `in-memory` storage mode and every test that would otherwise
/// need a live MySQL. Each scope gets its own map and its own ID counter,
/// matching the two independent auto-increment tables of the MySQL store.
#[derive(Debug, Default)]
pub struct InMemoryUrlMapStore {
    public: ScopeTable,
    private: ScopeTable,
}

#[derive(Debug, Default)]
struct ScopeTable {
    rows: DashMap<i64, UrlMapping>,
    next_id: AtomicI64,
}

impl ScopeTable {
    fn allocate(&self, user_id: i64, now: i64) -> i64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.rows.insert(
            id,
            UrlMapping {
                id,
                user_id,
                create_at: now,
                update_at: now,
                ..UrlMapping::default()
            },
        );
        id
    }
}

impl InMemoryUrlMapStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self, scope: Scope) -> &ScopeTable {
        match scope {
            Scope::Public => &self.public,
            Scope::Private => &self.private,
        }
    }
}

#[async_trait]
impl UrlMapStore for InMemoryUrlMapStore {
    async fn allocate_id(&self, scope: Scope, user_id: i64, now: i64) -> StorageResult<i64> {
        Ok(self.table(scope).allocate(user_id, now))
    }

    async fn update_mapping(
        &self,
        scope: Scope,
        id: i64,
        short_key: &str,
        original_url: &str,
        now: i64,
    ) -> StorageResult<()> {
        if let Some(mut row) = self.table(scope).rows.get_mut(&id) {
            row.short_key = short_key.to_string();
            row.original_url = original_url.to_string();
            row.update_at = now;
        }
        Ok(())
    }

    async fn get_by_id(&self, scope: Scope, id: i64) -> StorageResult<Option<UrlMapping>> {
        Ok(self.table(scope).rows.get(&id).map(|row| row.clone()))
    }

    async fn get_by_original(
        &self,
        scope: Scope,
        original_url: &str,
    ) -> StorageResult<Option<UrlMapping>> {
        // Lowest id wins so duplicate rows from racing generators resolve
        // to a stable winner, as in the MySQL store.
        let mut found: Option<UrlMapping> = None;
        for row in self.table(scope).rows.iter() {
            if row.original_url == original_url
                && found.as_ref().is_none_or(|best| row.id < best.id)
            {
                found = Some(row.clone());
            }
        }
        Ok(found)
    }

    async fn increment_times(
        &self,
        scope: Scope,
        id: i64,
        delta: i64,
        now: i64,
    ) -> StorageResult<()> {
        if let Some(mut row) = self.table(scope).rows.get_mut(&id) {
            row.times += delta;
            row.update_at = now;
        }
        Ok(())
    }

    async fn top_by_times(&self, scope: Scope, limit: u32) -> StorageResult<Vec<UrlMapping>> {
        let mut rows: Vec<UrlMapping> = self
            .table(scope)
            .rows
            .iter()
            .filter(|row| !row.short_key.is_empty())
            .map(|row| row.clone())
            .collect();
        rows.sort_by(|a, b| b.times.cmp(&a.times).then(a.id.cmp(&b.id)));
        rows.truncate(limit as usize);
        Ok(rows)
    }

    async fn max_id(&self, scope: Scope) -> StorageResult<i64> {
        Ok(self.table(scope).next_id.load(Ordering::SeqCst))
    }

    async fn list_ids(&self, scope: Scope) -> StorageResult<Vec<i64>> {
        let mut ids: Vec<i64> = self.table(scope).rows.iter().map(|row| row.id).collect();
        ids.sort_unstable();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000;

    #[tokio::test]
    async fn allocate_id_is_monotonic_from_one() {
        let store = InMemoryUrlMapStore::new();
        assert_eq!(store.allocate_id(Scope::Public, 0, NOW).await.unwrap(), 1);
        assert_eq!(store.allocate_id(Scope::Public, 0, NOW).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn scopes_have_independent_id_spaces() {
        let store = InMemoryUrlMapStore::new();
        assert_eq!(store.allocate_id(Scope::Public, 0, NOW).await.unwrap(), 1);
        assert_eq!(store.allocate_id(Scope::Private, 7, NOW).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn allocated_row_is_bare_until_finalised() {
        let store = InMemoryUrlMapStore::new();
        let id = store.allocate_id(Scope::Public, 0, NOW).await.unwrap();

        let row = store.get_by_id(Scope::Public, id).await.unwrap().unwrap();
        assert_eq!(row.short_key, "");
        assert_eq!(row.original_url, "");
        assert_eq!(row.create_at, NOW);

        store
            .update_mapping(Scope::Public, id, "a1B", "https://a.test/x", NOW + 1)
            .await
            .unwrap();

        let row = store.get_by_id(Scope::Public, id).await.unwrap().unwrap();
        assert_eq!(row.short_key, "a1B");
        assert_eq!(row.original_url, "https://a.test/x");
        assert_eq!(row.update_at, NOW + 1);
    }

    #[tokio::test]
    async fn get_by_original_prefers_lowest_id() {
        let store = InMemoryUrlMapStore::new();
        for _ in 0..2 {
            let id = store.allocate_id(Scope::Public, 0, NOW).await.unwrap();
            store
                .update_mapping(Scope::Public, id, &format!("k{id}"), "https://dup.test/", NOW)
                .await
                .unwrap();
        }

        let row = store
            .get_by_original(Scope::Public, "https://dup.test/")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.id, 1);
    }

    #[tokio::test]
    async fn get_by_original_missing_is_none() {
        let store = InMemoryUrlMapStore::new();
        assert!(store
            .get_by_original(Scope::Public, "https://nope.test/")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn increment_times_accumulates() {
        let store = InMemoryUrlMapStore::new();
        let id = store.allocate_id(Scope::Public, 0, NOW).await.unwrap();

        store
            .increment_times(Scope::Public, id, 1, NOW)
            .await
            .unwrap();
        store
            .increment_times(Scope::Public, id, 2, NOW)
            .await
            .unwrap();

        let row = store.get_by_id(Scope::Public, id).await.unwrap().unwrap();
        assert_eq!(row.times, 3);
    }

    #[tokio::test]
    async fn top_by_times_orders_and_skips_unfinalised() {
        let store = InMemoryUrlMapStore::new();
        for (times, finalise) in [(5, true), (9, true), (100, false), (1, true)] {
            let id = store.allocate_id(Scope::Public, 0, NOW).await.unwrap();
            if finalise {
                store
                    .update_mapping(Scope::Public, id, &format!("k{id}"), "https://t.test/", NOW)
                    .await
                    .unwrap();
            }
            store
                .increment_times(Scope::Public, id, times, NOW)
                .await
                .unwrap();
        }

        let top = store.top_by_times(Scope::Public, 2).await.unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].times, 9);
        assert_eq!(top[1].times, 5);
    }

    #[tokio::test]
    async fn max_id_tracks_allocations() {
        let store = InMemoryUrlMapStore::new();
        assert_eq!(store.max_id(Scope::Public).await.unwrap(), 0);

        store.allocate_id(Scope::Public, 0, NOW).await.unwrap();
        store.allocate_id(Scope::Public, 0, NOW).await.unwrap();
        assert_eq!(store.max_id(Scope::Public).await.unwrap(), 2);
        assert_eq!(store.max_id(Scope::Private).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn list_ids_returns_all_in_order() {
        let store = InMemoryUrlMapStore::new();
        for _ in 0..3 {
            store.allocate_id(Scope::Private, 7, NOW).await.unwrap();
        }
        assert_eq!(store.list_ids(Scope::Private).await.unwrap(), vec![1, 2, 3]);
    }
}
