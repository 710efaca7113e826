// src/telemetry.rs
use std::net::SocketAddr;

use metrics::{describe_counter, describe_gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::OnceCell;

/// One-time metrics registration (so series show up on /metrics).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("poll_cycles_total", "Completed polling sweeps.");
        describe_counter!(
            "poll_fetch_errors_total",
            "Timeline fetch failures after retries, by kind."
        );
        describe_counter!("poll_fetch_retries_total", "Retried transient failures.");
        describe_counter!("poll_pages_fetched_total", "Timeline pages read while catching up.");
        describe_counter!("poll_posts_fetched_total", "New posts seen across accounts.");
        describe_counter!("poll_matches_total", "Posts that matched an account's keywords.");
        describe_counter!("poll_deliveries_total", "Accepted deliveries (one per account batch).");
        describe_counter!("poll_delivery_errors_total", "Failed deliveries.");
        describe_counter!("identity_lookups_total", "Handle lookup batches sent.");
        describe_gauge!("poll_tracked_accounts", "Accounts currently being polled.");
        describe_gauge!("poll_last_cycle_ts", "Unix ts when the last sweep finished.");
    });
}

/// Install the Prometheus recorder with its own HTTP listener on `addr`.
pub fn install_exporter(addr: SocketAddr) -> anyhow::Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("prometheus exporter on {addr}: {e}"))?;
    ensure_metrics_described();
    tracing::info!(%addr, "prometheus exporter listening");
    Ok(())
}

/// Default filter: our module path plus the explicit log targets used across the crate.
pub const DEFAULT_LOG_FILTER: &str =
    "tweet_notifier=info,poller=info,identity=info,notify=info,retry=info,budget=info,\
timeline=info,tracking=info,accounts=info,warn";

/// Install the global tracing subscriber.
/// `RUST_LOG` overrides the default filter; `LOG_FORMAT=json` switches to JSON lines.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    let res = if json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer().compact()).try_init()
    };
    if let Err(e) = res {
        eprintln!("tracing already initialised: {e}");
    }
}
