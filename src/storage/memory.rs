//! In-memory storage backend (no persistence)
//!
//! This backend keeps targets, history and admins behind a single
//! `RwLock`. It's useful for:
//! - Testing without database dependencies
//! - Running the monitor without a database (`"backend": "none"`)
//!
//! ## Limitations
//!
//! - **No persistence**: All data lost on restart
//! - **Unbounded history**: Every probe outcome is kept

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use super::backend::{AdminStore, HealthStatus, HistoryStore, StorageBackend, TargetStore};
use super::error::StorageResult;
use super::schema::{
    Admin, HistoryRecord, Identity, NewTarget, Target, TargetId, TargetStatus, UptimeStats,
};

#[derive(Debug, Default)]
struct MemoryState {
    /// Targets in insertion order
    targets: Vec<Target>,
    next_id: i64,
    history: Vec<HistoryRecord>,
    admins: BTreeMap<Identity, Admin>,
}

/// In-memory storage backend
#[derive(Debug, Default)]
pub struct MemoryBackend {
    state: RwLock<MemoryState>,
}

impl MemoryBackend {
    /// Create a new in-memory backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the full history, oldest first
    pub async fn history(&self) -> Vec<HistoryRecord> {
        self.state.read().await.history.clone()
    }
}

#[async_trait]
impl TargetStore for MemoryBackend {
    async fn list_targets(&self) -> StorageResult<Vec<Target>> {
        Ok(self.state.read().await.targets.clone())
    }

    async fn get_target_by_name(&self, name: &str) -> StorageResult<Option<Target>> {
        let state = self.state.read().await;
        Ok(state.targets.iter().find(|t| t.name == name).cloned())
    }

    async fn insert_target_if_absent(
        &self,
        target: NewTarget,
        created_at: DateTime<Utc>,
    ) -> StorageResult<Option<Target>> {
        let mut state = self.state.write().await;
        if state.targets.iter().any(|t| t.name == target.name) {
            debug!("target {} already exists", target.name);
            return Ok(None);
        }

        state.next_id += 1;
        let target = target.into_target(TargetId(state.next_id), created_at);
        state.targets.push(target.clone());
        Ok(Some(target))
    }

    async fn delete_target_by_name(&self, name: &str) -> StorageResult<bool> {
        let mut state = self.state.write().await;
        let before = state.targets.len();
        state.targets.retain(|t| t.name != name);
        Ok(state.targets.len() != before)
    }

    async fn update_status(
        &self,
        id: TargetId,
        status: TargetStatus,
        probed_at: DateTime<Utc>,
    ) -> StorageResult<()> {
        let mut state = self.state.write().await;
        match state.targets.iter_mut().find(|t| t.id == id) {
            Some(target) => {
                target.status = status;
                target.last_probed = probed_at;
            }
            None => debug!("target {id} vanished before its status update"),
        }
        Ok(())
    }
}

#[async_trait]
impl HistoryStore for MemoryBackend {
    async fn append_history(&self, record: HistoryRecord) -> StorageResult<()> {
        self.state.write().await.history.push(record);
        Ok(())
    }

    async fn count_total(&self, target_id: TargetId) -> StorageResult<u64> {
        let state = self.state.read().await;
        Ok(state
            .history
            .iter()
            .filter(|r| r.target_id == target_id)
            .count() as u64)
    }

    async fn count_successful(&self, target_id: TargetId) -> StorageResult<u64> {
        let state = self.state.read().await;
        Ok(state
            .history
            .iter()
            .filter(|r| r.target_id == target_id && r.success)
            .count() as u64)
    }

    async fn uptime(&self, target_id: TargetId) -> StorageResult<UptimeStats> {
        let state = self.state.read().await;
        let (total, successful) = state
            .history
            .iter()
            .filter(|r| r.target_id == target_id)
            .fold((0u64, 0u64), |(total, successful), r| {
                (total + 1, successful + u64::from(r.success))
            });
        Ok(UptimeStats::new(successful, total))
    }
}

#[async_trait]
impl AdminStore for MemoryBackend {
    async fn list_admins(&self) -> StorageResult<Vec<Admin>> {
        Ok(self.state.read().await.admins.values().cloned().collect())
    }

    async fn find_admin(&self, identity: Identity) -> StorageResult<Option<Admin>> {
        Ok(self.state.read().await.admins.get(&identity).cloned())
    }

    async fn insert_admin_if_absent(
        &self,
        identity: Identity,
        username: Option<String>,
    ) -> StorageResult<bool> {
        let mut state = self.state.write().await;
        if state.admins.contains_key(&identity) {
            return Ok(false);
        }
        state.admins.insert(
            identity,
            Admin {
                identity,
                username,
                joined_at: Utc::now(),
            },
        );
        Ok(true)
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn health_check(&self) -> StorageResult<HealthStatus> {
        let state = self.state.read().await;
        Ok(HealthStatus {
            healthy: true,
            message: "In-memory storage operational".to_string(),
            metadata: HashMap::from([
                ("backend".to_string(), "memory".to_string()),
                ("targets".to_string(), state.targets.len().to_string()),
                ("history".to_string(), state.history.len().to_string()),
            ]),
        })
    }

    async fn close(&self) -> StorageResult<()> {
        debug!("closing in-memory backend (no-op)");
        Ok(())
    }
}
