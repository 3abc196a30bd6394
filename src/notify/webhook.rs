use anyhow::{Context, bail};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde_json::json;
use tracing::{info, instrument};

use crate::storage::Identity;

use super::Notifier;

/// Posts alerts as JSON to a generic webhook
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    #[instrument(skip(self, text))]
    async fn send(&self, recipient: Identity, text: &str) -> anyhow::Result<()> {
        let payload = json!({
            "recipient": recipient,
            "message": text,
            "timestamp": Utc::now().to_rfc3339()
        });

        let response = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .context("webhook request failed")?;

        if !response.status().is_success() {
            bail!("webhook responded with status {}", response.status());
        }

        info!("Successfully sent webhook notification");
        Ok(())
    }
}
