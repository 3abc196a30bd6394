use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, error, info, instrument, warn};

use crate::monitors::status::StatusUpdate;
use crate::notify::Notifier;
use crate::storage::{AdminStore, Identity, Target, TargetStatus};

/// When a failed probe produces an alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertMode {
    /// Alert on every failed probe, including repeated failures of a target
    /// that is already offline
    #[default]
    EveryFailure,

    /// Alert only when a target enters the offline state
    OnTransition,
}

impl AlertMode {
    pub fn should_alert(&self, previous: TargetStatus, current: TargetStatus) -> bool {
        if current != TargetStatus::Offline {
            return false;
        }

        match self {
            AlertMode::EveryFailure => true,
            AlertMode::OnTransition => previous != TargetStatus::Offline,
        }
    }
}

/// What happened to an alert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertOutcome {
    /// Notification handed to the channel
    Sent(Identity),

    /// The owner is not a known admin, nothing was sent
    OwnerUnknown,

    /// Owner lookup or delivery failed (already logged)
    Failed,
}

/// Notifies a target's owner when the target goes offline
#[derive(Clone)]
pub struct AlertDispatcher {
    admins: Arc<dyn AdminStore>,
    notifier: Arc<dyn Notifier>,
    mode: AlertMode,
}

impl AlertDispatcher {
    pub fn new(admins: Arc<dyn AdminStore>, notifier: Arc<dyn Notifier>, mode: AlertMode) -> Self {
        Self {
            admins,
            notifier,
            mode,
        }
    }

    pub fn should_alert(&self, update: &StatusUpdate) -> bool {
        self.mode.should_alert(update.previous, update.current)
    }

    /// Send the offline alert for `target` to its owner
    ///
    /// `target` is the snapshot taken before the probe, so its `last_probed`
    /// is the previous probe time. Failures never propagate.
    #[instrument(skip(self, target), fields(target = %target.name, owner = %target.owner))]
    pub async fn dispatch(&self, target: &Target) -> AlertOutcome {
        let owner = match self.admins.find_admin(target.owner).await {
            Ok(Some(admin)) => admin.identity,
            Ok(None) => {
                debug!("owner is not a known admin, skipping alert");
                return AlertOutcome::OwnerUnknown;
            }
            Err(e) => {
                warn!("failed to resolve alert recipient: {e}");
                return AlertOutcome::Failed;
            }
        };

        let message = format_offline_message(target);
        match self.notifier.send(owner, &message).await {
            Ok(()) => {
                info!("sent offline alert");
                AlertOutcome::Sent(owner)
            }
            Err(e) => {
                error!("failed to send offline alert: {e:#}");
                AlertOutcome::Failed
            }
        }
    }
}

pub fn format_offline_message(target: &Target) -> String {
    format!(
        "⚠️ Alert: {} is OFFLINE!\n\nURL: {}\nLast probe: {}",
        target.name,
        target.address,
        target.last_probed.format("%d %b %Y %H:%M UTC")
    )
}
