//! Long-running actors
//!
//! Each actor runs as an independent tokio task and is controlled through a
//! cloneable handle that sends commands over an mpsc channel.
//!
//! ```text
//!                 ┌──────────────┐
//!                 │  Hub (main)  │
//!                 └──────┬───────┘
//!                        │ spawns
//!           ┌────────────┴────────────┐
//!           │                         │
//!   ┌───────▼────────┐        ┌───────▼──────┐
//!   │ SchedulerActor │        │   BotActor   │
//!   └───────┬────────┘        └───────┬──────┘
//!           │ per due target          │ per command
//!   ┌───────▼────────┐        ┌───────▼────────┐
//!   │ ProbePipeline  │        │ CommandHandler │
//!   │ (tokio task)   │        └────────────────┘
//!   └────────────────┘
//! ```
//!
//! - **SchedulerActor**: ticks once a minute and dispatches probes for due targets
//! - **BotActor**: long-polls the chat API and answers operator commands

pub mod bot;
pub mod messages;
pub mod scheduler;
