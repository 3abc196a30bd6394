//! Notification channels
//!
//! A channel delivers a plain-text message to an identity. Delivery is
//! one-way and best-effort: callers log failures and move on.

use async_trait::async_trait;
use tracing::info;

use crate::storage::Identity;

pub mod telegram;
pub mod webhook;

pub use telegram::TelegramClient;
pub use webhook::WebhookNotifier;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, recipient: Identity, text: &str) -> anyhow::Result<()>;
}

/// Channel that only writes messages to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, recipient: Identity, text: &str) -> anyhow::Result<()> {
        info!(%recipient, "notification: {text}");
        Ok(())
    }
}
