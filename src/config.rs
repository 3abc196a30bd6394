use std::path::PathBuf;

use anyhow::bail;
use tracing::trace;

use crate::alerts::AlertMode;
use crate::notify::telegram::DEFAULT_API_URL;
use crate::storage::schema::{DEFAULT_INTERVAL_MINUTES, TargetValidationError};
use crate::storage::{Identity, NewTarget};
use crate::util;

/// Liveness port used when neither the config nor `PORT` sets one
pub const DEFAULT_PORT: u16 = 8080;

/// Storage backend configuration
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageConfig {
    /// In-memory storage (no persistence)
    #[serde(rename = "none")]
    None,

    /// SQLite database file (default)
    Sqlite {
        #[serde(default = "default_sqlite_path")]
        path: PathBuf,
    },

    /// SQLite connection URL, e.g. `sqlite://keepalive.db`
    Url { url: String },
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::Sqlite {
            path: default_sqlite_path(),
        }
    }
}

fn default_sqlite_path() -> PathBuf {
    PathBuf::from("./keepalive.db")
}

/// Where offline alerts are delivered
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotifierConfig {
    /// Message the owner through the Telegram bot
    #[default]
    Telegram,

    /// POST alerts to a webhook
    Webhook(Webhook),

    /// Only log alerts
    Log,
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct Webhook {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct Telegram {
    pub token: Option<String>,

    #[serde(default = "default_telegram_api")]
    pub api_url: String,
}

fn default_telegram_api() -> String {
    DEFAULT_API_URL.to_string()
}

/// Target registered at startup if no target with its name exists
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct TargetConfig {
    pub name: String,
    pub url: String,
    #[serde(default = "default_interval")]
    pub interval: i64,
    pub owner: Identity,
}

fn default_interval() -> i64 {
    i64::from(DEFAULT_INTERVAL_MINUTES)
}

impl TargetConfig {
    pub fn to_new_target(&self) -> Result<NewTarget, TargetValidationError> {
        NewTarget::new(&self.name, &self.url, self.interval, self.owner)
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct Config {
    /// Storage configuration (defaults to SQLite at `./keepalive.db`)
    pub storage: Option<StorageConfig>,

    pub telegram: Option<Telegram>,

    pub notifier: Option<NotifierConfig>,

    /// Identities authorized in addition to the stored admins
    #[serde(default)]
    pub admins: Vec<Identity>,

    #[serde(default)]
    pub targets: Vec<TargetConfig>,

    pub port: Option<u16>,

    #[serde(default)]
    pub alert_mode: AlertMode,
}

/// Values read from the process environment
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvOverrides {
    pub database_url: Option<String>,
    pub bot_token: Option<String>,
    pub admin_ids: Vec<Identity>,
    pub port: Option<u16>,
}

impl EnvOverrides {
    pub fn from_env() -> Self {
        Self {
            database_url: util::get_database_url(),
            bot_token: util::get_bot_token(),
            admin_ids: util::get_admin_ids(),
            port: util::get_port(),
        }
    }
}

/// Telegram settings with a known token
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTelegram {
    pub token: String,
    pub api_url: String,
}

/// Configuration after defaults and environment overrides are applied
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    pub storage: StorageConfig,

    /// Present when a bot token is known; enables the command interface
    pub telegram: Option<ResolvedTelegram>,

    pub notifier: NotifierConfig,
    pub admins: Vec<Identity>,
    pub targets: Vec<TargetConfig>,
    pub port: u16,
    pub alert_mode: AlertMode,
}

impl Config {
    /// Apply environment overrides and defaults
    ///
    /// The environment wins over the file. Fails if alerts go through
    /// Telegram but no bot token is known.
    pub fn resolve(self, env: EnvOverrides) -> anyhow::Result<ResolvedConfig> {
        let storage = match env.database_url {
            Some(url) => StorageConfig::Url { url },
            None => self.storage.unwrap_or_default(),
        };

        let api_url = self
            .telegram
            .as_ref()
            .map(|telegram| telegram.api_url.clone())
            .unwrap_or_else(default_telegram_api);
        let token = env
            .bot_token
            .or_else(|| self.telegram.and_then(|telegram| telegram.token));
        let telegram = token.map(|token| ResolvedTelegram { token, api_url });

        let notifier = self.notifier.unwrap_or_default();
        if notifier == NotifierConfig::Telegram && telegram.is_none() {
            bail!("BOT_TOKEN environment variable is required");
        }

        let mut admins = self.admins;
        for id in env.admin_ids {
            if !admins.contains(&id) {
                admins.push(id);
            }
        }

        Ok(ResolvedConfig {
            storage,
            telegram,
            notifier,
            admins,
            targets: self.targets,
            port: env.port.or(self.port).unwrap_or(DEFAULT_PORT),
            alert_mode: self.alert_mode,
        })
    }
}

pub fn read_config_file(path: &str) -> anyhow::Result<Config> {
    let file_content = std::fs::read_to_string(path)?;
    serde_json::from_str(&file_content)
        .map_err(|e| anyhow::anyhow!("Invalid configuration file provided: {e}"))
        .inspect(|config| trace!("loaded config: {config:?}"))
}
