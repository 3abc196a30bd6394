//! Records the result of a probe
//!
//! Each probe produces two writes: the target's status and probe time, and
//! one history record. The writes are independent; a failure in one is
//! logged and does not prevent the other.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error, instrument};

use crate::storage::{HistoryRecord, HistoryStore, Target, TargetId, TargetStatus, TargetStore};

use super::probe::ProbeOutcome;

/// What a status update changed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusUpdate {
    pub target_id: TargetId,

    /// Status from the snapshot the probe was started with
    pub previous: TargetStatus,

    pub current: TargetStatus,
    pub probed_at: DateTime<Utc>,

    pub status_persisted: bool,
    pub history_persisted: bool,
}

impl StatusUpdate {
    pub fn is_transition(&self) -> bool {
        self.previous != self.current
    }
}

#[derive(Clone)]
pub struct StatusUpdater {
    targets: Arc<dyn TargetStore>,
    history: Arc<dyn HistoryStore>,
}

impl StatusUpdater {
    pub fn new(targets: Arc<dyn TargetStore>, history: Arc<dyn HistoryStore>) -> Self {
        Self { targets, history }
    }

    /// Record `outcome` for `target`, stamped with the current time
    pub async fn apply(&self, target: &Target, outcome: &ProbeOutcome) -> StatusUpdate {
        self.apply_at(target, outcome.success, Utc::now()).await
    }

    #[instrument(skip(self, target), fields(target = %target.name))]
    pub async fn apply_at(
        &self,
        target: &Target,
        success: bool,
        probed_at: DateTime<Utc>,
    ) -> StatusUpdate {
        let current = TargetStatus::from_outcome(success);

        let status_persisted = match self
            .targets
            .update_status(target.id, current, probed_at)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                error!("failed to update target status: {e}");
                false
            }
        };

        let record = HistoryRecord {
            target_id: target.id,
            timestamp: probed_at,
            success,
        };
        let history_persisted = match self.history.append_history(record).await {
            Ok(()) => true,
            Err(e) => {
                error!("failed to append probe history: {e}");
                false
            }
        };

        if target.status != current {
            debug!("status changed {} -> {}", target.status, current);
        }

        StatusUpdate {
            target_id: target.id,
            previous: target.status,
            current,
            probed_at,
            status_persisted,
            history_persisted,
        }
    }
}
