//! Storage trait definitions
//!
//! The monitoring core only talks to storage through these traits. Each
//! concern gets its own trait so that the scheduler, the status updater and
//! the alert dispatcher only see the operations they need.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::error::StorageResult;
use super::schema::{
    Admin, HistoryRecord, Identity, NewTarget, Target, TargetId, TargetStatus, UptimeStats,
};

/// Health status of the storage backend
#[derive(Debug, Clone)]
pub struct HealthStatus {
    /// Is the backend operational?
    pub healthy: bool,

    /// Human-readable status message
    pub message: String,

    /// Additional backend-specific metadata
    pub metadata: HashMap<String, String>,
}

/// Durable collection of watched targets and their live status
///
/// Implementations must be safe to call from many probe tasks at once; the
/// monitoring core adds no locking of its own.
#[async_trait]
pub trait TargetStore: Send + Sync {
    /// All targets in scan order
    async fn list_targets(&self) -> StorageResult<Vec<Target>>;

    async fn get_target_by_name(&self, name: &str) -> StorageResult<Option<Target>>;

    /// Insert a target unless one with the same name exists
    ///
    /// Returns `None` when the name is already taken.
    async fn insert_target_if_absent(
        &self,
        target: NewTarget,
        created_at: DateTime<Utc>,
    ) -> StorageResult<Option<Target>>;

    /// Returns whether a target was removed
    async fn delete_target_by_name(&self, name: &str) -> StorageResult<bool>;

    /// Record the result of a probe on the target row
    ///
    /// Updating a target that no longer exists is not an error.
    async fn update_status(
        &self,
        id: TargetId,
        status: TargetStatus,
        probed_at: DateTime<Utc>,
    ) -> StorageResult<()>;
}

/// Append-only log of probe outcomes
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn append_history(&self, record: HistoryRecord) -> StorageResult<()>;

    async fn count_total(&self, target_id: TargetId) -> StorageResult<u64>;

    async fn count_successful(&self, target_id: TargetId) -> StorageResult<u64>;

    /// Uptime statistics from a single consistent read of both counters
    async fn uptime(&self, target_id: TargetId) -> StorageResult<UptimeStats>;
}

/// Durable set of authorized identities
#[async_trait]
pub trait AdminStore: Send + Sync {
    async fn list_admins(&self) -> StorageResult<Vec<Admin>>;

    async fn find_admin(&self, identity: Identity) -> StorageResult<Option<Admin>>;

    /// Returns `true` if the admin was newly inserted
    async fn insert_admin_if_absent(
        &self,
        identity: Identity,
        username: Option<String>,
    ) -> StorageResult<bool>;
}

/// Lifecycle operations shared by every backend
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Performs a lightweight operation to verify the backend is operational
    async fn health_check(&self) -> StorageResult<HealthStatus>;

    /// Close the backend and release resources
    async fn close(&self) -> StorageResult<()>;
}
