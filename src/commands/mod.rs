//! Operator commands
//!
//! Text commands arrive from the chat interface, are checked against the
//! authorization cache, and produce a single text reply. Store failures are
//! reported to the operator as a generic error and logged.

use std::fmt::Write as _;

use chrono::Utc;
use tracing::{error, info, instrument, warn};

use crate::storage::schema::TargetValidationError;
use crate::storage::{Identity, NewTarget, StorageResult, Stores, TargetStatus};

pub mod auth;

pub use auth::AuthorizationCache;

const WELCOME: &str = "👋 Welcome to the keep-alive monitor!\n\n\
    I probe your services on a schedule and tell you when they go offline.\n\n\
    Use /help to see the available commands.";

const HELP: &str = "📖 Available commands:\n\n\
    /addbot <name> <url> <interval_minutes> - Start monitoring a target\n\
    /removebot <name> - Stop monitoring a target\n\
    /listbots - List monitored targets\n\
    /stats - Show uptime statistics\n\
    /addadmin <user_id> - Authorize another user\n\
    /help - Show this message";

const ADD_USAGE: &str = "❌ Usage: /addbot <name> <url> <interval_minutes>\n\
    Example: /addbot @mybot https://mybot.onrender.com 5";

const REMOVE_USAGE: &str = "❌ Usage: /removebot <name>";

const ADD_ADMIN_USAGE: &str = "❌ Usage: /addadmin <user_id>";

const UNAUTHORIZED: &str = "❌ Unauthorized. This bot is for admins only.";

const STORAGE_FAILURE: &str = "⚠️ Something went wrong while talking to the database. Please try again.";

/// A parsed operator command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    AddTarget {
        name: String,
        address: String,
        interval: String,
    },
    RemoveTarget {
        name: String,
    },
    ListTargets,
    Stats,
    AddAdmin {
        identity: String,
    },

    /// Recognised command with missing arguments; holds the usage text
    Usage(&'static str),

    Unknown(String),
}

impl Command {
    /// Parse a message; `None` if it is not a command
    ///
    /// A `@botname` suffix on the command word is ignored, so `/help@mybot`
    /// parses like `/help`.
    pub fn parse(text: &str) -> Option<Self> {
        let mut words = text.split_whitespace();
        let head = words.next()?.strip_prefix('/')?;
        let name = head.split('@').next().unwrap_or(head);
        let args: Vec<&str> = words.collect();

        let command = match name {
            "start" => Command::Start,
            "help" => Command::Help,
            "addbot" => match args.as_slice() {
                [name, address, interval, ..] => Command::AddTarget {
                    name: name.to_string(),
                    address: address.to_string(),
                    interval: interval.to_string(),
                },
                _ => Command::Usage(ADD_USAGE),
            },
            "removebot" => match args.first() {
                Some(name) => Command::RemoveTarget {
                    name: name.to_string(),
                },
                None => Command::Usage(REMOVE_USAGE),
            },
            "listbots" => Command::ListTargets,
            "stats" => Command::Stats,
            "addadmin" => match args.first() {
                Some(identity) => Command::AddAdmin {
                    identity: identity.to_string(),
                },
                None => Command::Usage(ADD_ADMIN_USAGE),
            },
            other => Command::Unknown(other.to_string()),
        };

        Some(command)
    }
}

fn status_marker(status: TargetStatus) -> &'static str {
    match status {
        TargetStatus::Online => "✅",
        TargetStatus::Offline => "❌",
        TargetStatus::Unknown => "❓",
    }
}

#[derive(Clone)]
pub struct CommandHandler {
    stores: Stores,
    auth: AuthorizationCache,
}

impl CommandHandler {
    pub fn new(stores: Stores, auth: AuthorizationCache) -> Self {
        Self { stores, auth }
    }

    /// Handle a chat message; `None` if the message is not a command
    pub async fn handle_message(&self, sender: Identity, text: &str) -> Option<String> {
        let command = Command::parse(text)?;
        Some(self.handle(sender, command).await)
    }

    /// Run an already parsed command and return the reply
    #[instrument(skip(self))]
    pub async fn handle(&self, sender: Identity, command: Command) -> String {
        if !self.auth.is_authorized(sender).await {
            warn!("rejected command from unauthorized identity");
            return UNAUTHORIZED.to_string();
        }

        match self.execute(sender, command).await {
            Ok(reply) => reply,
            Err(e) => {
                error!("command failed: {e}");
                STORAGE_FAILURE.to_string()
            }
        }
    }

    async fn execute(&self, sender: Identity, command: Command) -> StorageResult<String> {
        match command {
            Command::Start => Ok(WELCOME.to_string()),
            Command::Help => Ok(HELP.to_string()),
            Command::Usage(usage) => Ok(usage.to_string()),
            Command::Unknown(name) => Ok(format!(
                "❓ Unknown command /{name}. Use /help to see the available commands."
            )),
            Command::AddTarget {
                name,
                address,
                interval,
            } => self.add_target(sender, &name, &address, &interval).await,
            Command::RemoveTarget { name } => self.remove_target(&name).await,
            Command::ListTargets => self.list_targets().await,
            Command::Stats => self.stats().await,
            Command::AddAdmin { identity } => self.add_admin(&identity).await,
        }
    }

    async fn add_target(
        &self,
        sender: Identity,
        name: &str,
        address: &str,
        interval: &str,
    ) -> StorageResult<String> {
        let Ok(interval) = interval.parse::<i64>() else {
            return Ok("❌ Invalid interval. Must be a positive number of minutes.".to_string());
        };

        let new_target = match NewTarget::new(name, address, interval, sender) {
            Ok(target) => target,
            Err(TargetValidationError::InvalidInterval(_)) => {
                return Ok(
                    "❌ Invalid interval. Must be a positive number of minutes.".to_string(),
                );
            }
            Err(TargetValidationError::EmptyName) => return Ok(ADD_USAGE.to_string()),
            Err(
                TargetValidationError::InvalidAddress(_)
                | TargetValidationError::UnsupportedScheme(_),
            ) => {
                return Ok("❌ Invalid URL. Must start with http:// or https://".to_string());
            }
        };

        match self
            .stores
            .targets
            .insert_target_if_absent(new_target, Utc::now())
            .await?
        {
            Some(target) => {
                info!("added target {} ({})", target.name, target.address);
                Ok(format!(
                    "✅ {} added to monitoring!\nURL: {}\nProbe interval: {} minutes",
                    target.name, target.address, target.interval_minutes
                ))
            }
            None => Ok("❌ A target with that name is already being monitored.".to_string()),
        }
    }

    async fn remove_target(&self, name: &str) -> StorageResult<String> {
        let name = crate::storage::schema::normalize_name(name);
        if self.stores.targets.delete_target_by_name(name).await? {
            info!("removed target {name}");
            Ok(format!("✅ {name} removed from monitoring."))
        } else {
            Ok(format!("❌ {name} not found."))
        }
    }

    async fn list_targets(&self) -> StorageResult<String> {
        let targets = self.stores.targets.list_targets().await?;
        if targets.is_empty() {
            return Ok("📭 No targets are being monitored yet. Add one with /addbot.".to_string());
        }

        let mut reply = String::from("📋 Monitored targets:\n\n");
        for (i, target) in targets.iter().enumerate() {
            let _ = write!(
                reply,
                "{}. {} {}\n   URL: {}\n   Interval: {} min | Last probe: {}\n\n",
                i + 1,
                target.name,
                status_marker(target.status),
                target.address,
                target.interval_minutes,
                target.last_probed.format("%d %b %H:%M"),
            );
        }

        Ok(reply.trim_end().to_string())
    }

    async fn stats(&self) -> StorageResult<String> {
        let targets = self.stores.targets.list_targets().await?;
        if targets.is_empty() {
            return Ok("📭 No targets are being monitored yet.".to_string());
        }

        let mut reply = String::from("📊 Uptime statistics:\n\n");
        for target in &targets {
            let uptime = self.stores.history.uptime(target.id).await?;
            let _ = write!(
                reply,
                "{} {}\n   Status: {}\n   Uptime: {:.2}%\n   Total probes: {}\n\n",
                status_marker(target.status),
                target.name,
                target.status,
                uptime.percentage,
                uptime.total,
            );
        }

        Ok(reply.trim_end().to_string())
    }

    async fn add_admin(&self, identity: &str) -> StorageResult<String> {
        let Ok(identity) = identity.parse::<Identity>() else {
            return Ok("❌ Invalid user ID. It must be a number.".to_string());
        };

        // Only the id is known here; the username stays empty
        if self.auth.authorize(identity, None).await? {
            info!("authorized new admin {identity}");
            Ok(format!("✅ Admin {identity} added."))
        } else {
            Ok(format!("ℹ️ {identity} is already an admin."))
        }
    }
}
