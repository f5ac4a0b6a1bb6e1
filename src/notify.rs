// src/notify.rs
use anyhow::{anyhow, Result};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

/// Delivery channel for rendered messages. One call per message.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, title: &str, text: &str) -> Result<()>;
}

/// Posts `{"text": ...}` to a chat webhook with bounded retries.
#[derive(Clone)]
pub struct WebhookNotifier {
    webhook: String,
    client: Client,
    timeout: Duration,
    max_retries: u8,
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    text: &'a str,
}

impl WebhookNotifier {
    pub fn new(webhook: String) -> Self {
        Self {
            webhook,
            client: Client::new(),
            timeout: Duration::from_secs(5),
            max_retries: 3,
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    pub fn with_retries(mut self, retries: u8) -> Self {
        self.max_retries = retries.max(1);
        self
    }
}

#[async_trait::async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, title: &str, text: &str) -> Result<()> {
        let payload = WebhookPayload { text };

        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            let res = self
                .client
                .post(&self.webhook)
                .timeout(self.timeout)
                .json(&payload)
                .send()
                .await;

            let err = match res {
                Ok(rsp) => match rsp.error_for_status_ref() {
                    Ok(_) => return Ok(()),
                    Err(e) => anyhow!("webhook HTTP error: {e}"),
                },
                Err(e) => anyhow!("webhook request failed: {e}"),
            };

            if attempt >= self.max_retries {
                return Err(err.context(format!("deliver `{title}`")));
            }
            tracing::debug!(target: "notify", attempt, error = %err, "webhook retry");
            tokio::time::sleep(Duration::from_millis(500u64 << (attempt - 1))).await;
        }
    }
}

/// Writes messages to the log. Used when no webhook is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait::async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, title: &str, text: &str) -> Result<()> {
        tracing::info!(target: "notify", %title, "{text}");
        Ok(())
    }
}
