//! nrb-watch: one polling pass over the configured NRB pages.
//! Meant to be invoked by an external scheduler (cron, CI schedule).
//!
//! Exit status: 0 when every source was checked, 1 when any source errored,
//! 2 when the run could not start.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use nrb_watch::config::{load_config_default, WatchConfig};
use nrb_watch::fetch::HttpFetcher;
use nrb_watch::metrics::Metrics;
use nrb_watch::notify::{EmailNotifier, NotificationDispatcher};
use nrb_watch::store::FileStateStore;
use nrb_watch::RunCoordinator;

/// Compact text logs by default; `LOG_FORMAT=json` switches to one JSON
/// object per line. Filter comes from `RUST_LOG`.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("nrb_watch=info,warn"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

async fn run(cfg: WatchConfig) -> Result<u8> {
    let metrics = match &cfg.metrics_textfile {
        Some(_) => Some(Metrics::init()?),
        None => None,
    };

    let fetcher = HttpFetcher::new(cfg.http_timeout_secs)?;
    let store =
        FileStateStore::new(cfg.state_dir.clone()).with_legacy_dir(cfg.legacy_state_dir.clone());
    let dispatcher = NotificationDispatcher::new(Arc::new(EmailNotifier::from_env(cfg.smtp.clone())?));

    let report = RunCoordinator::new(&fetcher, &store, &dispatcher)
        .run_all(&cfg.sources)
        .await;

    let summary = report.summary();
    tracing::info!(
        changed = summary.changed,
        unchanged = summary.unchanged,
        errored = summary.errored,
        "run finished"
    );
    println!("{}", serde_json::to_string_pretty(&summary)?);

    if let (Some(m), Some(path)) = (&metrics, &cfg.metrics_textfile) {
        if let Err(e) = m.write_textfile(path) {
            tracing::warn!(error = ?e, "metrics textfile not written");
        }
    }

    Ok(report.exit_code())
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env in local/dev; no-op when the file is absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = match load_config_default() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = ?e, "config load failed");
            return ExitCode::from(2);
        }
    };
    tracing::info!(
        sources = cfg.sources.len(),
        state_dir = %cfg.state_dir.display(),
        "config loaded"
    );

    match run(cfg).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!(error = ?e, "run could not start");
            ExitCode::from(2)
        }
    }
}
