//! Storage backends for targets, probe history and admins
//!
//! This module provides trait-based abstractions over the three durable
//! collections the monitor needs.
//!
//! ## Design
//!
//! - **Trait-based**: `TargetStore`, `HistoryStore` and `AdminStore` can be
//!   backed by different implementations
//! - **Async**: All operations are async for compatibility with Tokio tasks
//! - **Concurrent**: Backends handle their own synchronisation
//!
//! ## Backends
//!
//! - **SQLite** (default): Embedded database via sqlx, with migrations
//! - **In-Memory** (fallback): No persistence, for testing
//!
//! ## Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use keepalive_monitor::storage::{Stores, sqlite::SqliteBackend};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let backend = Arc::new(SqliteBackend::new("./keepalive.db").await?);
//!     let stores = Stores::from_backend(backend);
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use chrono::Utc;
use tracing::info;

pub mod backend;
pub mod error;
pub mod memory;
pub mod schema;
#[cfg(feature = "storage-sqlite")]
pub mod sqlite;

pub use backend::{AdminStore, HealthStatus, HistoryStore, StorageBackend, TargetStore};
pub use error::{StorageError, StorageResult};
pub use schema::{
    Admin, HistoryRecord, Identity, NewTarget, Target, TargetId, TargetStatus, UptimeStats,
};

/// Handles to every store, shared between the scheduler, commands and alerts
#[derive(Clone)]
pub struct Stores {
    pub targets: Arc<dyn TargetStore>,
    pub history: Arc<dyn HistoryStore>,
    pub admins: Arc<dyn AdminStore>,
}

impl Stores {
    /// Use a single backend for all three stores
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: TargetStore + HistoryStore + AdminStore + 'static,
    {
        Self {
            targets: backend.clone(),
            history: backend.clone(),
            admins: backend,
        }
    }

    /// Insert `targets` that are not stored yet; returns how many were added
    pub async fn seed_targets(&self, targets: Vec<NewTarget>) -> StorageResult<usize> {
        let mut added = 0;
        for target in targets {
            if let Some(target) = self
                .targets
                .insert_target_if_absent(target, Utc::now())
                .await?
            {
                info!("registered target {} from config", target.name);
                added += 1;
            }
        }
        Ok(added)
    }
}
