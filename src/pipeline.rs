// src/pipeline.rs
//! One poll cycle: fetch → classify → render → drop already-seen → deliver → record.

use std::collections::HashSet;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;

use crate::classify::classify_with;
use crate::config::WatchConfig;
use crate::history::{HistoryEntry, HistoryStore};
use crate::matcher::KeywordPattern;
use crate::notify::Notifier;
use crate::render::render_keyed;
use crate::source::NoticeSource;

/// One-time metrics registration (so series show up once a recorder exists).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("notices_fetched_total", "Notices returned by the source.");
        describe_counter!(
            "notices_tender_matched_total",
            "Notices whose tender code is in the target set."
        );
        describe_counter!(
            "notices_keyword_matched_total",
            "Notices whose title contains a keyword."
        );
        describe_counter!(
            "notices_already_seen_total",
            "Rendered notices dropped because the user already saw them."
        );
        describe_counter!("notices_notified_total", "Messages delivered.");
        describe_counter!("notify_errors_total", "Message deliveries that failed.");
        describe_counter!("source_errors_total", "Source fetch/parse errors.");
        describe_counter!("history_evicted_total", "History entries removed by clean.");
        describe_gauge!("pipeline_last_run_ts", "Unix ts when the poll cycle last ran.");
    });
}

/// Match targets for one user, compiled once and reused across cycles.
#[derive(Debug, Clone)]
pub struct Watch {
    pub user_id: i64,
    tender_codes: HashSet<String>,
    pattern: KeywordPattern,
}

impl Watch {
    pub fn new<T, K>(user_id: i64, tender_codes: T, keywords: K) -> crate::error::Result<Self>
    where
        T: IntoIterator,
        T::Item: AsRef<str>,
        K: IntoIterator,
        K::Item: AsRef<str>,
    {
        Ok(Self {
            user_id,
            tender_codes: tender_codes
                .into_iter()
                .map(|c| c.as_ref().to_string())
                .collect(),
            pattern: KeywordPattern::compile(keywords)?,
        })
    }

    pub fn from_config(cfg: &WatchConfig) -> crate::error::Result<Self> {
        Self::new(cfg.user_id, &cfg.tender_codes, &cfg.keywords)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub fetched: usize,
    pub tender_matches: usize,
    pub keyword_matches: usize,
    pub rendered: usize,
    pub already_seen: usize,
    pub notified: usize,
    pub failed: usize,
    pub recorded: usize,
}

/// Run one cycle at `now`.
///
/// A source failure is logged and yields an empty report. A delivery
/// failure leaves the notice unrecorded so the next cycle retries it.
/// History failures are returned.
pub async fn run_once(
    source: &dyn NoticeSource,
    notifier: &dyn Notifier,
    store: &HistoryStore,
    watch: &Watch,
    now: DateTime<Utc>,
) -> Result<CycleReport> {
    ensure_metrics_described();
    gauge!("pipeline_last_run_ts").set(now.timestamp() as f64);

    let batch = match source.fetch_latest().await {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(target: "pipeline", error = ?e, source = source.name(), "source error");
            counter!("source_errors_total").increment(1);
            return Ok(CycleReport::default());
        }
    };

    let mut report = CycleReport {
        fetched: batch.len(),
        ..CycleReport::default()
    };

    let classified = classify_with(batch, &watch.tender_codes, &watch.pattern);
    report.tender_matches = classified.tender_matches.len();
    report.keyword_matches = classified.keyword_matches.len();

    let rendered = render_keyed(&classified.tender_matches, &classified.keyword_matches);
    report.rendered = rendered.len();

    let urls: Vec<String> = rendered
        .values()
        .filter(|r| !r.pageurl.is_empty())
        .map(|r| r.pageurl.clone())
        .collect();
    // rusqlite is synchronous; keep it off the async workers
    let lookup = store.clone();
    let user_id = watch.user_id;
    let unseen: HashSet<String> =
        tokio::task::spawn_blocking(move || lookup.unseen(user_id, &urls))
            .await
            .context("history lookup task")?
            .context("history lookup")?
            .into_iter()
            .collect();

    let mut delivered = Vec::new();
    for (title, r) in &rendered {
        // no page url means no stable key: deliver, never record
        let keyed = !r.pageurl.is_empty();
        if keyed && !unseen.contains(&r.pageurl) {
            report.already_seen += 1;
            continue;
        }
        match notifier.send(title, &r.text).await {
            Ok(()) => {
                report.notified += 1;
                if keyed {
                    delivered.push(HistoryEntry::new(watch.user_id, &r.pageurl, title, now));
                }
            }
            Err(e) => {
                tracing::warn!(target: "pipeline", error = ?e, %title, "delivery failed");
                report.failed += 1;
            }
        }
    }

    let recorder = store.clone();
    report.recorded = tokio::task::spawn_blocking(move || recorder.insert(&delivered))
        .await
        .context("record task")?
        .context("record delivered notices")?;

    counter!("notices_fetched_total").increment(report.fetched as u64);
    counter!("notices_tender_matched_total").increment(report.tender_matches as u64);
    counter!("notices_keyword_matched_total").increment(report.keyword_matches as u64);
    counter!("notices_already_seen_total").increment(report.already_seen as u64);
    counter!("notices_notified_total").increment(report.notified as u64);
    counter!("notify_errors_total").increment(report.failed as u64);

    tracing::info!(
        target: "pipeline",
        fetched = report.fetched,
        tender = report.tender_matches,
        keyword = report.keyword_matches,
        seen = report.already_seen,
        notified = report.notified,
        failed = report.failed,
        "poll cycle"
    );

    Ok(report)
}

/// Eviction sweep with telemetry. Returns the number of evicted entries.
pub fn clean_history(store: &HistoryStore, now: DateTime<Utc>) -> Result<usize> {
    ensure_metrics_described();
    let evicted = store.clean_at(now).context("history clean")?;
    counter!("history_evicted_total").increment(evicted as u64);
    Ok(evicted)
}
