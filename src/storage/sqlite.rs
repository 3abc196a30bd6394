//! SQLite storage backend implementation
//!
//! This module provides a SQLite-based implementation of the target, history
//! and admin stores.
//!
//! ## Features
//!
//! - **Embedded**: No separate database server required
//! - **WAL mode**: Better concurrency for reads during writes
//! - **Connection pooling**: Probe tasks write concurrently through the pool
//! - **Migrations**: Automatic schema versioning with sqlx
//!
//! Timestamps are stored as Unix milliseconds.

use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};
use sqlx::{Pool, Row, Sqlite};
use tracing::{debug, info, instrument, warn};

use super::backend::{AdminStore, HealthStatus, HistoryStore, StorageBackend, TargetStore};
use super::error::{StorageError, StorageResult};
use super::schema::{
    Admin, HistoryRecord, Identity, NewTarget, Target, TargetId, TargetStatus, UptimeStats,
};

const TARGET_COLUMNS: &str =
    "id, name, address, interval_minutes, status, last_probed, owner, created_at";

/// SQLite storage backend
pub struct SqliteBackend {
    pool: Pool<Sqlite>,
    db_path: String,
}

impl SqliteBackend {
    /// Open (or create) the database file at `db_path` and run migrations
    ///
    /// ## Example
    ///
    /// ```no_run
    /// # use keepalive_monitor::storage::sqlite::SqliteBackend;
    /// # async fn example() -> anyhow::Result<()> {
    /// let backend = SqliteBackend::new("./keepalive.db").await?;
    /// # Ok(())
    /// # }
    /// ```
    #[instrument(skip_all)]
    pub async fn new(db_path: impl AsRef<Path>) -> StorageResult<Self> {
        let db_path_str = db_path.as_ref().to_string_lossy().to_string();
        let options = SqliteConnectOptions::new()
            .filename(&db_path_str)
            .create_if_missing(true);

        Self::with_options(options, db_path_str).await
    }

    /// Open the database described by a `sqlite://` connection URL
    #[instrument(skip_all)]
    pub async fn connect(url: &str) -> StorageResult<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| StorageError::InvalidConfig(format!("{url}: {e}")))?
            .create_if_missing(true);
        let db_path = options.get_filename().to_string_lossy().to_string();

        Self::with_options(options, db_path).await
    }

    async fn with_options(options: SqliteConnectOptions, db_path: String) -> StorageResult<Self> {
        info!("initializing SQLite backend at: {}", db_path);

        let options = options
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;

        debug!("running database migrations");
        sqlx::migrate!("./migrations").run(&pool).await?;
        info!("database migrations complete");

        Ok(Self { pool, db_path })
    }

    fn timestamp_to_millis(dt: &DateTime<Utc>) -> i64 {
        dt.timestamp_millis()
    }

    fn millis_to_timestamp(millis: i64) -> StorageResult<DateTime<Utc>> {
        DateTime::from_timestamp_millis(millis)
            .ok_or_else(|| StorageError::InvalidRow(format!("timestamp out of range: {millis}")))
    }

    fn target_from_row(row: &SqliteRow) -> StorageResult<Target> {
        let interval: i64 = row.try_get("interval_minutes")?;
        let interval_minutes = u32::try_from(interval)
            .ok()
            .filter(|interval| *interval >= 1)
            .ok_or_else(|| StorageError::InvalidRow(format!("invalid interval: {interval}")))?;
        let status: String = row.try_get("status")?;

        Ok(Target {
            id: TargetId(row.try_get("id")?),
            name: row.try_get("name")?,
            address: row.try_get("address")?,
            interval_minutes,
            status: TargetStatus::parse(&status),
            last_probed: Self::millis_to_timestamp(row.try_get("last_probed")?)?,
            owner: Identity(row.try_get("owner")?),
            created_at: Self::millis_to_timestamp(row.try_get("created_at")?)?,
        })
    }

    fn admin_from_row(row: &SqliteRow) -> StorageResult<Admin> {
        Ok(Admin {
            identity: Identity(row.try_get("identity")?),
            username: row.try_get("username")?,
            joined_at: Self::millis_to_timestamp(row.try_get("joined_at")?)?,
        })
    }
}

#[async_trait]
impl TargetStore for SqliteBackend {
    #[instrument(skip(self))]
    async fn list_targets(&self) -> StorageResult<Vec<Target>> {
        let sql = format!("SELECT {TARGET_COLUMNS} FROM targets ORDER BY id ASC");
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;

        let targets = rows
            .iter()
            .map(Self::target_from_row)
            .collect::<StorageResult<Vec<_>>>()?;
        debug!("loaded {} targets", targets.len());
        Ok(targets)
    }

    #[instrument(skip(self))]
    async fn get_target_by_name(&self, name: &str) -> StorageResult<Option<Target>> {
        let sql = format!("SELECT {TARGET_COLUMNS} FROM targets WHERE name = ?");
        let row = sqlx::query(&sql)
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::target_from_row).transpose()
    }

    #[instrument(skip(self, target), fields(name = %target.name))]
    async fn insert_target_if_absent(
        &self,
        target: NewTarget,
        created_at: DateTime<Utc>,
    ) -> StorageResult<Option<Target>> {
        let created_millis = Self::timestamp_to_millis(&created_at);

        let row = sqlx::query(
            r#"
            INSERT INTO targets (
                name, address, interval_minutes, status, last_probed, owner, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (name) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(&target.name)
        .bind(&target.address)
        .bind(i64::from(target.interval_minutes))
        .bind(TargetStatus::Unknown.as_str())
        .bind(created_millis)
        .bind(target.owner.0)
        .bind(created_millis)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            debug!("target already exists");
            return Ok(None);
        };

        let id = TargetId(row.try_get("id")?);
        info!("inserted target {}", id);
        // Round-trip through millis so the returned value matches what a read gives back
        let created_at = Self::millis_to_timestamp(created_millis)?;
        Ok(Some(target.into_target(id, created_at)))
    }

    #[instrument(skip(self))]
    async fn delete_target_by_name(&self, name: &str) -> StorageResult<bool> {
        let result = sqlx::query("DELETE FROM targets WHERE name = ?")
            .bind(name)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    async fn update_status(
        &self,
        id: TargetId,
        status: TargetStatus,
        probed_at: DateTime<Utc>,
    ) -> StorageResult<()> {
        let result = sqlx::query("UPDATE targets SET status = ?, last_probed = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(Self::timestamp_to_millis(&probed_at))
            .bind(id.0)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            debug!("target {id} vanished before its status update");
        }
        Ok(())
    }
}

#[async_trait]
impl HistoryStore for SqliteBackend {
    #[instrument(skip(self), fields(target_id = %record.target_id))]
    async fn append_history(&self, record: HistoryRecord) -> StorageResult<()> {
        sqlx::query("INSERT INTO probe_history (target_id, timestamp, success) VALUES (?, ?, ?)")
            .bind(record.target_id.0)
            .bind(Self::timestamp_to_millis(&record.timestamp))
            .bind(record.success)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn count_total(&self, target_id: TargetId) -> StorageResult<u64> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM probe_history WHERE target_id = ?")
                .bind(target_id.0)
                .fetch_one(&self.pool)
                .await?;
        Ok(count.max(0) as u64)
    }

    async fn count_successful(&self, target_id: TargetId) -> StorageResult<u64> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM probe_history WHERE target_id = ? AND success = 1",
        )
        .bind(target_id.0)
        .fetch_one(&self.pool)
        .await?;
        Ok(count.max(0) as u64)
    }

    async fn uptime(&self, target_id: TargetId) -> StorageResult<UptimeStats> {
        let (total, successful): (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COALESCE(SUM(success), 0) FROM probe_history WHERE target_id = ?",
        )
        .bind(target_id.0)
        .fetch_one(&self.pool)
        .await?;
        Ok(UptimeStats::new(successful.max(0) as u64, total.max(0) as u64))
    }
}

#[async_trait]
impl AdminStore for SqliteBackend {
    async fn list_admins(&self) -> StorageResult<Vec<Admin>> {
        let rows = sqlx::query(
            "SELECT identity, username, joined_at FROM admins ORDER BY joined_at",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::admin_from_row).collect()
    }

    async fn find_admin(&self, identity: Identity) -> StorageResult<Option<Admin>> {
        let row = sqlx::query("SELECT identity, username, joined_at FROM admins WHERE identity = ?")
            .bind(identity.0)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::admin_from_row).transpose()
    }

    #[instrument(skip(self))]
    async fn insert_admin_if_absent(
        &self,
        identity: Identity,
        username: Option<String>,
    ) -> StorageResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO admins (identity, username, joined_at)
            VALUES (?, ?, ?)
            ON CONFLICT (identity) DO NOTHING
            "#,
        )
        .bind(identity.0)
        .bind(username)
        .bind(Self::timestamp_to_millis(&Utc::now()))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl StorageBackend for SqliteBackend {
    #[instrument(skip(self))]
    async fn health_check(&self) -> StorageResult<HealthStatus> {
        match sqlx::query("SELECT 1").fetch_one(&self.pool).await {
            Ok(_) => {
                let mut metadata = HashMap::new();
                metadata.insert("backend".to_string(), "sqlite".to_string());
                metadata.insert("db_path".to_string(), self.db_path.clone());

                Ok(HealthStatus {
                    healthy: true,
                    message: "SQLite backend operational".to_string(),
                    metadata,
                })
            }
            Err(e) => {
                warn!("health check failed: {}", e);
                Ok(HealthStatus {
                    healthy: false,
                    message: format!("health check failed: {}", e),
                    metadata: HashMap::new(),
                })
            }
        }
    }

    async fn close(&self) -> StorageResult<()> {
        info!("closing SQLite backend");
        self.pool.close().await;
        Ok(())
    }
}
