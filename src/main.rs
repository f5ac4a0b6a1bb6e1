//! Tender watcher: binary entrypoint.
//! Loads the watch config, opens the history store, and runs the poll and
//! eviction timers until Ctrl-C.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tender_watch::config::load_config_default;
use tender_watch::history::HistoryStore;
use tender_watch::notify::{LogNotifier, Notifier, WebhookNotifier};
use tender_watch::pipeline::Watch;
use tender_watch::scheduler::{spawn_clean_task, spawn_poll_task, SchedulerCfg};
use tender_watch::source::{HttpNoticeSource, NoticeSource, StaticSource};

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tender_watch=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = load_config_default().context("load watch config")?;
    let watch = Watch::from_config(&cfg).context("compile watch targets")?;

    if let Some(dir) = cfg.db_path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("create state dir {}", dir.display()))?;
    }
    let store = HistoryStore::open(&cfg.db_path)
        .with_context(|| format!("open history db {}", cfg.db_path.display()))?
        .with_retention(cfg.retention());

    let source: Arc<dyn NoticeSource> = match &cfg.source_url {
        Some(url) => Arc::new(HttpNoticeSource::new(url.clone())),
        None => {
            tracing::warn!("no source_url configured; polling an empty static source");
            Arc::new(StaticSource::default())
        }
    };
    let notifier: Arc<dyn Notifier> = match &cfg.webhook_url {
        Some(url) => Arc::new(WebhookNotifier::new(url.clone())),
        None => Arc::new(LogNotifier),
    };

    let sched = SchedulerCfg {
        poll_interval_secs: cfg.poll_interval_secs,
        clean_interval_secs: cfg.clean_interval_secs,
    };
    tracing::info!(
        user_id = cfg.user_id,
        keywords = cfg.keywords.len(),
        tender_codes = cfg.tender_codes.len(),
        poll_secs = sched.poll_interval_secs,
        source = source.name(),
        "tender watch started"
    );

    let poll = spawn_poll_task(sched, source, notifier, store.clone(), watch);
    let clean = spawn_clean_task(sched, store);

    tokio::signal::ctrl_c().await.context("wait for ctrl-c")?;
    tracing::info!("shutting down");
    poll.abort();
    clean.abort();
    Ok(())
}
