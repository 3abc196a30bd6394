//! Minimal Telegram Bot API client
//!
//! Only the two methods the monitor needs are implemented: `sendMessage` for
//! replies and alerts, and `getUpdates` for long-polling operator commands.

use std::time::Duration;

use anyhow::{Context, bail};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, instrument, trace};

use crate::storage::Identity;

use super::Notifier;

pub const DEFAULT_API_URL: &str = "https://api.telegram.org";

/// Extra time on top of the long-poll timeout before the request is abandoned
const REQUEST_GRACE: Duration = Duration::from_secs(20);

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub from: Option<User>,
    pub chat: Chat,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Clone)]
pub struct TelegramClient {
    client: Client,
    api_url: String,
    token: String,
}

impl std::fmt::Debug for TelegramClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramClient")
            .field("api_url", &self.api_url)
            .finish_non_exhaustive()
    }
}

impl TelegramClient {
    pub fn new(token: impl Into<String>) -> reqwest::Result<Self> {
        Self::with_api_url(token, DEFAULT_API_URL)
    }

    pub fn with_api_url(
        token: impl Into<String>,
        api_url: impl Into<String>,
    ) -> reqwest::Result<Self> {
        Ok(Self {
            client: Client::builder().build()?,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    /// Contains the token; errors must not carry it out of the client
    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_url, self.token, method)
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
        method: &str,
    ) -> anyhow::Result<T> {
        let status = response.status();
        let body: ApiResponse<T> = response
            .json()
            .await
            .map_err(reqwest::Error::without_url)
            .with_context(|| format!("invalid {method} response (HTTP {status})"))?;

        if !body.ok {
            bail!(
                "{method} rejected: {}",
                body.description.unwrap_or_else(|| status.to_string())
            );
        }

        body.result
            .with_context(|| format!("{method} response has no result"))
    }

    /// Send a text message to a chat
    #[instrument(skip(self, text))]
    pub async fn send_message(&self, chat_id: i64, text: &str) -> anyhow::Result<()> {
        let response = self
            .client
            .post(self.method_url("sendMessage"))
            .json(&json!({ "chat_id": chat_id, "text": text }))
            .send()
            .await
            .map_err(reqwest::Error::without_url)
            .context("sendMessage request failed")?;

        Self::parse_response::<serde_json::Value>(response, "sendMessage").await?;
        debug!("message delivered");
        Ok(())
    }

    /// Long-poll for updates after `offset`
    #[instrument(skip(self))]
    pub async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout_secs: u64,
    ) -> anyhow::Result<Vec<Update>> {
        let mut query = vec![("timeout", timeout_secs.to_string())];
        if let Some(offset) = offset {
            query.push(("offset", offset.to_string()));
        }

        let response = self
            .client
            .get(self.method_url("getUpdates"))
            .query(&query)
            .timeout(Duration::from_secs(timeout_secs) + REQUEST_GRACE)
            .send()
            .await
            .map_err(reqwest::Error::without_url)
            .context("getUpdates request failed")?;

        let updates: Vec<Update> = Self::parse_response(response, "getUpdates").await?;
        trace!("received {} updates", updates.len());
        Ok(updates)
    }
}

#[async_trait]
impl Notifier for TelegramClient {
    /// Private chats share their id with the user, so identities are chat ids
    async fn send(&self, recipient: Identity, text: &str) -> anyhow::Result<()> {
        self.send_message(recipient.0, text).await
    }
}
