use async_trait::async_trait;
use sqlx::mysql::MySqlPoolOptions;
use sqlx::{MySqlPool, Row};
use std::time::Duration;
use zipline_core::{Scope, StorageError, StorageResult, UrlMapStore, UrlMapping};

/// Connection-pool settings for the MySQL store.
///
/// Mirrors the deployment's `mysql` configuration block: DSN plus pool
/// sizing knobs.
#[derive(Debug, Clone)]
pub struct MySqlPoolConfig {
    pub dsn: String,
    pub max_open_conns: u32,
    pub max_idle_conns: u32,
    pub max_lifetime_secs: u64,
}

/// MySQL implementation of [`UrlMapStore`].
///
/// One table per scope (`url_map` / `url_map_user`). Rows are created bare
/// by `allocate_id` to obtain the auto-increment ID, then finalised by
/// `update_mapping`; `short_key` and `original_url` are therefore nullable
/// and read back as empty strings until finalised.
#[derive(Debug, Clone)]
pub struct MySqlUrlMapStore {
    pool: MySqlPool,
}

impl MySqlUrlMapStore {
    /// Creates a store from an existing MySQL connection pool.
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Creates a store by opening a new pool with the given settings.
    pub async fn connect(config: &MySqlPoolConfig) -> StorageResult<Self> {
        let pool = MySqlPoolOptions::new()
            .max_connections(config.max_open_conns)
            .min_connections(config.max_idle_conns)
            .max_lifetime(Duration::from_secs(config.max_lifetime_secs))
            .connect(&config.dsn)
            .await
            .map_err(map_sqlx_error)?;
        Ok(Self::new(pool))
    }

    /// Returns a reference to the underlying pool.
    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }
}

fn map_sqlx_error(err: sqlx::Error) -> StorageError {
    let message = err.to_string();

    match err {
        sqlx::Error::PoolTimedOut => StorageError::Timeout(message),
        sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_) => StorageError::Unavailable(message),
        sqlx::Error::ColumnIndexOutOfBounds { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::TypeNotFound { .. }
        | sqlx::Error::Decode(_)
        | sqlx::Error::RowNotFound => StorageError::InvalidData(message),
        _ => StorageError::Query(message),
    }
}

fn mapping_from_row(row: &sqlx::mysql::MySqlRow) -> StorageResult<UrlMapping> {
    let short_key: Option<String> = row.try_get("short_key").map_err(map_sqlx_error)?;
    let original_url: Option<String> = row.try_get("original_url").map_err(map_sqlx_error)?;

    Ok(UrlMapping {
        id: row.try_get("id").map_err(map_sqlx_error)?,
        user_id: row.try_get("user_id").map_err(map_sqlx_error)?,
        short_key: short_key.unwrap_or_default(),
        original_url: original_url.unwrap_or_default(),
        times: row.try_get("times").map_err(map_sqlx_error)?,
        create_at: row.try_get("create_at").map_err(map_sqlx_error)?,
        update_at: row.try_get("update_at").map_err(map_sqlx_error)?,
    })
}

#[async_trait]
impl UrlMapStore for MySqlUrlMapStore {
    async fn allocate_id(&self, scope: Scope, user_id: i64, now: i64) -> StorageResult<i64> {
        // Table names come from the scope enum, never from input.
        let result = if user_id != 0 {
            let sql = format!(
                "INSERT INTO {} (user_id, create_at, update_at) VALUES (?, ?, ?)",
                scope.table()
            );
            sqlx::query(&sql)
                .bind(user_id)
                .bind(now)
                .bind(now)
                .execute(&self.pool)
                .await
        } else {
            let sql = format!(
                "INSERT INTO {} (create_at, update_at) VALUES (?, ?)",
                scope.table()
            );
            sqlx::query(&sql)
                .bind(now)
                .bind(now)
                .execute(&self.pool)
                .await
        };

        let result = result.map_err(map_sqlx_error)?;
        Ok(result.last_insert_id() as i64)
    }

    async fn update_mapping(
        &self,
        scope: Scope,
        id: i64,
        short_key: &str,
        original_url: &str,
        now: i64,
    ) -> StorageResult<()> {
        let sql = format!(
            "UPDATE {} SET short_key = ?, original_url = ?, update_at = ? WHERE id = ?",
            scope.table()
        );
        sqlx::query(&sql)
            .bind(short_key)
            .bind(original_url)
            .bind(now)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn get_by_id(&self, scope: Scope, id: i64) -> StorageResult<Option<UrlMapping>> {
        let sql = format!(
            "SELECT id, user_id, short_key, original_url, times, create_at, update_at \
             FROM {} WHERE id = ?",
            scope.table()
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        row.as_ref().map(mapping_from_row).transpose()
    }

    async fn get_by_original(
        &self,
        scope: Scope,
        original_url: &str,
    ) -> StorageResult<Option<UrlMapping>> {
        // Order by id so duplicate rows from racing generators resolve to a
        // stable winner.
        let sql = format!(
            "SELECT id, user_id, short_key, original_url, times, create_at, update_at \
             FROM {} WHERE original_url = ? ORDER BY id ASC LIMIT 1",
            scope.table()
        );
        let row = sqlx::query(&sql)
            .bind(original_url)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        row.as_ref().map(mapping_from_row).transpose()
    }

    async fn increment_times(
        &self,
        scope: Scope,
        id: i64,
        delta: i64,
        now: i64,
    ) -> StorageResult<()> {
        let sql = format!(
            "UPDATE {} SET times = times + ?, update_at = ? WHERE id = ?",
            scope.table()
        );
        sqlx::query(&sql)
            .bind(delta)
            .bind(now)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn top_by_times(&self, scope: Scope, limit: u32) -> StorageResult<Vec<UrlMapping>> {
        let sql = format!(
            "SELECT id, user_id, short_key, original_url, times, create_at, update_at \
             FROM {} WHERE short_key IS NOT NULL AND short_key != '' \
             ORDER BY times DESC LIMIT ?",
            scope.table()
        );
        let rows = sqlx::query(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        rows.iter().map(mapping_from_row).collect()
    }

    async fn max_id(&self, scope: Scope) -> StorageResult<i64> {
        let sql = format!("SELECT MAX(id) AS max_id FROM {}", scope.table());
        let row = sqlx::query(&sql)
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        let max_id: Option<i64> = row.try_get("max_id").map_err(map_sqlx_error)?;
        Ok(max_id.unwrap_or(0))
    }

    async fn list_ids(&self, scope: Scope) -> StorageResult<Vec<i64>> {
        let sql = format!("SELECT id FROM {} ORDER BY id ASC", scope.table());
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        rows.iter()
            .map(|row| row.try_get::<i64, _>("id").map_err(map_sqlx_error))
            .collect()
    }
}
