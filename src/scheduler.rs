// src/scheduler.rs
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::history::HistoryStore;
use crate::notify::Notifier;
use crate::pipeline::{clean_history, run_once, Watch};
use crate::source::NoticeSource;

#[derive(Clone, Copy, Debug)]
pub struct SchedulerCfg {
    pub poll_interval_secs: u64,
    pub clean_interval_secs: u64,
}

/// Poll the source every `poll_interval_secs`. Errors are logged; the loop
/// keeps going.
pub fn spawn_poll_task(
    cfg: SchedulerCfg,
    source: Arc<dyn NoticeSource>,
    notifier: Arc<dyn Notifier>,
    store: HistoryStore,
    watch: Watch,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(cfg.poll_interval_secs.max(1)));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let now = chrono::Utc::now();
            if let Err(e) = run_once(source.as_ref(), notifier.as_ref(), &store, &watch, now).await {
                tracing::warn!(target: "pipeline", "poll tick failed: {e:#}");
            }
        }
    })
}

/// Run the history eviction sweep every `clean_interval_secs`.
pub fn spawn_clean_task(cfg: SchedulerCfg, store: HistoryStore) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker =
            tokio::time::interval(Duration::from_secs(cfg.clean_interval_secs.max(1)));
        loop {
            ticker.tick().await;
            let now = chrono::Utc::now();
            let sweep = store.clone();
            match tokio::task::spawn_blocking(move || clean_history(&sweep, now)).await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => tracing::warn!(target: "history", "clean tick failed: {e:#}"),
                Err(e) => tracing::warn!(target: "history", error = %e, "clean task panicked"),
            }
        }
    })
}
