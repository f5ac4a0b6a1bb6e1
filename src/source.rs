// src/source.rs
use anyhow::{Context, Result};
use reqwest::Client;
use std::time::Duration;

use crate::notice::{parse_query_result, Notice};

#[async_trait::async_trait]
pub trait NoticeSource: Send + Sync {
    async fn fetch_latest(&self) -> Result<Vec<Notice>>;
    fn name(&self) -> &'static str;
}

/// Polls the upstream procurement API and parses its JSON envelope.
#[derive(Clone)]
pub struct HttpNoticeSource {
    url: String,
    client: Client,
    timeout: Duration,
}

impl HttpNoticeSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: Client::new(),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }
}

#[async_trait::async_trait]
impl NoticeSource for HttpNoticeSource {
    async fn fetch_latest(&self) -> Result<Vec<Notice>> {
        let resp = self
            .client
            .get(&self.url)
            .timeout(self.timeout)
            .send()
            .await
            .context("fetch notices")?
            .error_for_status()
            .context("notice API non-2xx")?;
        let body = resp.text().await.context("read notice body")?;
        parse_query_result(&body)
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

/// Serves a fixed batch. Used for fixtures and dry runs.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    notices: Vec<Notice>,
}

impl StaticSource {
    pub fn new(notices: Vec<Notice>) -> Self {
        Self { notices }
    }

    /// Build from an upstream-format JSON document.
    pub fn from_fixture(json: &str) -> Result<Self> {
        Ok(Self::new(parse_query_result(json)?))
    }
}

#[async_trait::async_trait]
impl NoticeSource for StaticSource {
    async fn fetch_latest(&self) -> Result<Vec<Notice>> {
        Ok(self.notices.clone())
    }

    fn name(&self) -> &'static str {
        "static"
    }
}
