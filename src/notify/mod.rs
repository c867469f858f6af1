//! Notification sinks.
//!
//! Sending never fails loudly: sinks report delivery with a boolean and
//! log their own errors.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{info, warn};

/// Fire-and-report message sink.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver `text`; returns whether delivery succeeded.
    async fn send(&self, text: &str) -> bool;
}

/// Writes notifications to the log only.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, text: &str) -> bool {
        info!(target: "notification", "📣 {}", text);
        true
    }
}

/// Posts `{"text": ...}` to a webhook.
pub struct WebhookNotifier {
    http: Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            http,
            url: url.into(),
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, text: &str) -> bool {
        let body = serde_json::json!({ "text": text });
        match self.http.post(&self.url).json(&body).send().await {
            Ok(resp) if resp.status().is_success() => true,
            Ok(resp) => {
                warn!(status = %resp.status(), "Webhook rejected notification");
                false
            }
            Err(e) => {
                warn!(error = %e, "Webhook delivery failed");
                false
            }
        }
    }
}
