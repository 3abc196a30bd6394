//! Probe execution
//!
//! ```text
//! Target snapshot → Prober (GET) → StatusUpdater (status + history) → AlertDispatcher
//! ```
//!
//! The pipeline runs once per due target. Nothing in it returns an error:
//! probe failures are a status, and storage or delivery failures are logged.

use tracing::{info, instrument};

use crate::alerts::{AlertDispatcher, AlertOutcome};
use crate::storage::Target;

pub mod probe;
pub mod status;

pub use probe::{ProbeOutcome, Prober};
pub use status::{StatusUpdate, StatusUpdater};

/// Everything that happened while handling one due target
#[derive(Debug, Clone)]
pub struct ProbeReport {
    pub target: Target,
    pub outcome: ProbeOutcome,
    pub update: StatusUpdate,

    /// `None` when the probe did not warrant an alert
    pub alert: Option<AlertOutcome>,
}

pub struct ProbePipeline {
    prober: Prober,
    updater: StatusUpdater,
    alerts: AlertDispatcher,
}

impl ProbePipeline {
    pub fn new(prober: Prober, updater: StatusUpdater, alerts: AlertDispatcher) -> Self {
        Self {
            prober,
            updater,
            alerts,
        }
    }

    /// Probe, record, and alert for a single target snapshot
    #[instrument(skip_all, fields(target = %target.name))]
    pub async fn run(&self, target: Target) -> ProbeReport {
        info!("probing {} at {}", target.name, target.address);

        let outcome = self.prober.probe(&target.address).await;
        let update = self.updater.apply(&target, &outcome).await;

        if outcome.success {
            info!("{} is online ({})", target.name, outcome.diagnostic());
        } else {
            info!("{} is offline ({})", target.name, outcome.diagnostic());
        }

        // Alerts go out even if the status writes failed
        let alert = if self.alerts.should_alert(&update) {
            Some(self.alerts.dispatch(&target).await)
        } else {
            None
        };

        ProbeReport {
            target,
            outcome,
            update,
            alert,
        }
    }
}
