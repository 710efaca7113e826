//! Tweet notifier daemon: resolves the tracked accounts, then polls their
//! timelines forever and emails keyword matches.
//!
//! Usage: `tweet-notifier [ACCOUNTS_FILE]` (defaults to `$TWEET_NOTIFIER_ACCOUNTS`,
//! then `config/accounts.toml`, then `config/accounts.json`).

use std::path::Path;

use anyhow::{bail, Context, Result};
use tweet_notifier::accounts::{load_accounts_default, load_accounts_from};
use tweet_notifier::config::AppConfig;
use tweet_notifier::telemetry::{ensure_metrics_described, init_tracing, install_exporter};
use tweet_notifier::AppContext;

/// Resolves on Ctrl-C or, on unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("ctrl-c handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!("SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = AppConfig::from_env().context("loading configuration")?;
    match cfg.metrics_addr {
        Some(addr) => install_exporter(addr)?,
        None => ensure_metrics_described(),
    }

    let requests = match std::env::args().nth(1) {
        Some(p) => load_accounts_from(Path::new(&p)),
        None => load_accounts_default(),
    }
    .context("loading account list")?;
    if requests.is_empty() {
        bail!("account list is empty, nothing to track");
    }
    tracing::info!(rows = requests.len(), "account list loaded");

    let ctx = AppContext::from_config(&cfg)?;
    let mut poller = ctx.bootstrap(&requests).await?;
    poller.run_until(shutdown_signal()).await;
    Ok(())
}
