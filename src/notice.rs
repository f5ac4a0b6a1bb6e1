// src/notice.rs
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// One procurement notice as delivered by the upstream feed.
///
/// Immutable once parsed. `title` is the rendering key; `pageurl` is the
/// stable external reference used by the history cache.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Notice {
    pub notice_time: String, // source-formatted, opaque
    pub open_tender_code: String,
    pub title: String,
    pub content: String,
    pub pageurl: String,
}

impl Notice {
    pub fn new(
        open_tender_code: impl Into<String>,
        title: impl Into<String>,
        content: impl Into<String>,
        pageurl: impl Into<String>,
    ) -> Self {
        Self {
            notice_time: String::new(),
            open_tender_code: open_tender_code.into(),
            title: title.into(),
            content: content.into(),
            pageurl: pageurl.into(),
        }
    }
}

/// Upstream response envelope. Fields we do not use are ignored by serde.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct QueryResult {
    pub msg: String,
    pub total: i64,
    pub code: String,
    pub data: Vec<Notice>,
}

/// Parse the upstream JSON envelope, keeping notices in feed order.
pub fn parse_query_result(body: &str) -> Result<Vec<Notice>> {
    let trimmed = body.trim();
    if trimmed.is_empty() || trimmed == "null" {
        anyhow::bail!("upstream returned an empty body");
    }
    let res: QueryResult =
        serde_json::from_str(trimmed).context("parse upstream notice envelope")?;
    tracing::debug!(
        target: "source",
        total = res.total,
        code = %res.code,
        returned = res.data.len(),
        "parsed notice envelope"
    );
    Ok(res.data)
}
