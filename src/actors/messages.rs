//! Message types for actor communication
//!
//! Each actor owns an mpsc command channel. Requests that need an answer
//! carry a oneshot sender.

use tokio::sync::oneshot;

use crate::storage::StorageResult;

/// Commands that can be sent to the SchedulerActor
#[derive(Debug)]
pub enum SchedulerCommand {
    /// Run a due-check pass immediately, outside the tick cadence
    ///
    /// Responds with the number of probes dispatched.
    TickNow {
        respond_to: oneshot::Sender<StorageResult<usize>>,
    },

    /// Stop ticking
    ///
    /// Probes already dispatched keep running to completion.
    Shutdown,
}

/// Commands that can be sent to the BotActor
#[derive(Debug)]
pub enum BotCommand {
    /// Stop polling for updates
    Shutdown,
}
