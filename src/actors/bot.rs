//! BotActor - Operator chat interface over Telegram long polling
//!
//! ## Message Flow
//!
//! ```text
//! getUpdates (long poll) → text starting with "/" → CommandHandler → sendMessage (same chat)
//!     ↑
//!     └─── Commands (Shutdown)
//! ```

use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

use crate::commands::CommandHandler;
use crate::notify::TelegramClient;
use crate::notify::telegram::Update;
use crate::storage::Identity;

use super::messages::BotCommand;

/// Long-poll timeout passed to getUpdates
pub const POLL_TIMEOUT_SECS: u64 = 10;

/// Pause after a failed poll before trying again
const POLL_RETRY_DELAY: Duration = Duration::from_secs(5);

pub struct BotActor {
    client: TelegramClient,
    handler: CommandHandler,
    command_rx: mpsc::Receiver<BotCommand>,

    /// Next update id to request; everything before it is acknowledged
    offset: Option<i64>,

    poll_timeout_secs: u64,
}

impl BotActor {
    pub fn new(
        client: TelegramClient,
        handler: CommandHandler,
        command_rx: mpsc::Receiver<BotCommand>,
        poll_timeout_secs: u64,
    ) -> Self {
        Self {
            client,
            handler,
            command_rx,
            offset: None,
            poll_timeout_secs,
        }
    }

    #[instrument(skip(self))]
    pub async fn run(mut self) {
        info!("bot started polling for commands");

        loop {
            let poll = tokio::select! {
                result = self.client.get_updates(self.offset, self.poll_timeout_secs) => result,

                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(BotCommand::Shutdown) => debug!("received shutdown command"),
                        None => warn!("command channel closed, shutting down"),
                    }
                    break;
                }
            };

            match poll {
                Ok(updates) => {
                    for update in updates {
                        self.handle_update(update).await;
                    }
                }
                Err(e) => {
                    warn!("failed to poll updates: {e:#}");
                    tokio::time::sleep(POLL_RETRY_DELAY).await;
                }
            }
        }

        info!("bot stopped");
    }

    async fn handle_update(&mut self, update: Update) {
        self.offset = Some(update.update_id + 1);

        let Some(message) = update.message else {
            return;
        };
        let (Some(from), Some(text)) = (message.from, message.text) else {
            return;
        };

        let Some(reply) = self.handler.handle_message(Identity(from.id), &text).await else {
            return;
        };

        if let Err(e) = self.client.send_message(message.chat.id, &reply).await {
            warn!("failed to send reply to chat {}: {e:#}", message.chat.id);
        }
    }
}

/// Handle for controlling the BotActor
#[derive(Clone)]
pub struct BotHandle {
    sender: mpsc::Sender<BotCommand>,
}

impl BotHandle {
    pub fn spawn(client: TelegramClient, handler: CommandHandler) -> Self {
        Self::spawn_with_timeout(client, handler, POLL_TIMEOUT_SECS)
    }

    pub fn spawn_with_timeout(
        client: TelegramClient,
        handler: CommandHandler,
        poll_timeout_secs: u64,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(8);

        let actor = BotActor::new(client, handler, cmd_rx, poll_timeout_secs);
        tokio::spawn(actor.run());

        Self { sender: cmd_tx }
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(BotCommand::Shutdown)
            .await
            .context("failed to send Shutdown command")?;
        Ok(())
    }
}
