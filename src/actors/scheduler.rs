//! SchedulerActor - Dispatches probes for due targets
//!
//! Every tick the actor reads all targets, keeps the ones whose interval has
//! elapsed since their last probe, and spawns one probe pipeline per due
//! target. Spawned probes are detached: the tick never waits for them.
//!
//! ## Message Flow
//!
//! ```text
//! Timer tick → list targets → filter due → spawn ProbePipeline::run (one task each)
//!     ↑
//!     └─── Commands (TickNow, Shutdown)
//! ```
//!
//! A target whose probe is still in flight when the next tick comes around is
//! still due (its last probe time has not moved), so it can be probed again.
//! With a one-minute tick and a 30 second probe timeout this does not happen
//! in practice.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, error, info, instrument, warn};

use crate::monitors::{ProbePipeline, ProbeReport};
use crate::storage::{StorageResult, Target, TargetStore};

use super::messages::SchedulerCommand;

/// Cadence of due checks
pub const TICK_INTERVAL: Duration = Duration::from_secs(60);

/// Keep the targets due at `now`, in their original order
pub fn select_due(targets: Vec<Target>, now: DateTime<Utc>) -> Vec<Target> {
    targets.into_iter().filter(|t| t.is_due(now)).collect()
}

/// Due-check logic, independent of the timer
#[derive(Clone)]
pub struct Scheduler {
    targets: Arc<dyn TargetStore>,
    pipeline: Arc<ProbePipeline>,
}

impl Scheduler {
    pub fn new(targets: Arc<dyn TargetStore>, pipeline: Arc<ProbePipeline>) -> Self {
        Self { targets, pipeline }
    }

    /// Run one due-check pass
    ///
    /// Spawns a probe for every due target and returns the task handles in
    /// scan order. Dropping the handles detaches the probes. Fails only when
    /// the target list cannot be read, in which case nothing is dispatched.
    #[instrument(skip(self))]
    pub async fn run_due_pass(
        &self,
        now: DateTime<Utc>,
    ) -> StorageResult<Vec<JoinHandle<ProbeReport>>> {
        let targets = self.targets.list_targets().await?;
        let total = targets.len();
        let due = select_due(targets, now);

        debug!("{} of {} targets due", due.len(), total);

        let handles = due
            .into_iter()
            .map(|target| {
                let pipeline = self.pipeline.clone();
                tokio::spawn(async move { pipeline.run(target).await })
            })
            .collect();

        Ok(handles)
    }

    /// Run one due-check pass and wait for every dispatched probe
    ///
    /// Reports come back in scan order. A probe task that panicked is logged
    /// and left out.
    pub async fn run_due_pass_and_wait(
        &self,
        now: DateTime<Utc>,
    ) -> StorageResult<Vec<ProbeReport>> {
        let handles = self.run_due_pass(now).await?;

        let reports = join_all(handles)
            .await
            .into_iter()
            .filter_map(|result| match result {
                Ok(report) => Some(report),
                Err(e) => {
                    error!("probe task failed: {e}");
                    None
                }
            })
            .collect();

        Ok(reports)
    }
}

/// Actor that drives the scheduler on a fixed tick
pub struct SchedulerActor {
    scheduler: Scheduler,

    /// Time between due checks
    tick: Duration,

    command_rx: mpsc::Receiver<SchedulerCommand>,
}

impl SchedulerActor {
    pub fn new(
        scheduler: Scheduler,
        tick: Duration,
        command_rx: mpsc::Receiver<SchedulerCommand>,
    ) -> Self {
        Self {
            scheduler,
            tick,
            command_rx,
        }
    }

    /// Run the actor's main loop
    ///
    /// The first pass happens one full tick after start. Runs until a
    /// Shutdown command is received or the command channel is closed.
    #[instrument(skip(self))]
    pub async fn run(mut self) {
        info!("scheduler started, checking every {:?}", self.tick);

        let mut ticker = interval_at(Instant::now() + self.tick, self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick_once().await;
                }

                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(SchedulerCommand::TickNow { respond_to }) => {
                            debug!("received TickNow command");
                            let result = self
                                .scheduler
                                .run_due_pass(Utc::now())
                                .await
                                .map(|handles| handles.len());
                            let _ = respond_to.send(result);
                        }

                        Some(SchedulerCommand::Shutdown) => {
                            debug!("received shutdown command");
                            break;
                        }

                        None => {
                            warn!("command channel closed, shutting down");
                            break;
                        }
                    }
                }
            }
        }

        info!("scheduler stopped");
    }

    async fn tick_once(&self) {
        match self.scheduler.run_due_pass(Utc::now()).await {
            Ok(handles) => {
                if !handles.is_empty() {
                    debug!("dispatched {} probes", handles.len());
                }
            }
            Err(e) => {
                error!("failed to list targets, skipping tick: {e}");
            }
        }
    }
}

/// Handle for controlling the SchedulerActor
///
/// Dropping the last handle stops the actor.
#[derive(Clone)]
pub struct SchedulerHandle {
    sender: mpsc::Sender<SchedulerCommand>,
}

impl SchedulerHandle {
    /// Spawn the scheduler actor with the given tick
    pub fn spawn(scheduler: Scheduler, tick: Duration) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(32);

        let actor = SchedulerActor::new(scheduler, tick, cmd_rx);
        tokio::spawn(actor.run());

        Self { sender: cmd_tx }
    }

    /// Run a due-check pass now and return how many probes were dispatched
    pub async fn tick_now(&self) -> Result<usize> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(SchedulerCommand::TickNow { respond_to: tx })
            .await
            .context("failed to send TickNow command")?;

        let dispatched = rx.await.context("failed to receive response")??;
        Ok(dispatched)
    }

    /// Stop the scheduler
    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(SchedulerCommand::Shutdown)
            .await
            .context("failed to send Shutdown command")?;
        Ok(())
    }
}
