//! Dashboard aggregator: binary entrypoint.
//! Boots the Axum HTTP server: dashboard snapshot API, interaction tracking, /metrics.

use dashboard_aggregator::config::DashboardConfig;
use dashboard_aggregator::metrics::Metrics;
use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_LOG_FILTER: &str = "aggregate=info,refresh=info,behavior=info,warn";

fn env_is(key: &str, expected: &str) -> bool {
    std::env::var(key).is_ok_and(|v| v.trim().eq_ignore_ascii_case(expected))
}

/// Debug builds, or SHUTTLE_ENV in {local, development, dev}.
fn is_dev_env() -> bool {
    cfg!(debug_assertions)
        || ["local", "development", "dev"]
            .iter()
            .any(|name| env_is("SHUTTLE_ENV", name))
}

/// Local log output for the aggregate/refresh/behavior targets. Needs DASHBOARD_DEV_LOG=1
/// in a dev environment; DASHBOARD_LOG_FORMAT=json switches to one JSON object per line.
fn enable_dev_tracing() {
    if !(env_is("DASHBOARD_DEV_LOG", "1") && is_dev_env()) {
        return;
    }

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let registry = tracing_subscriber::registry().with(filter);

    // Shuttle may already have installed a subscriber.
    let _ = if env_is("DASHBOARD_LOG_FORMAT", "json") {
        registry.with(fmt::layer().json().with_target(true)).try_init()
    } else {
        registry.with(fmt::layer().compact()).try_init()
    };
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    enable_dev_tracing();

    let cfg = DashboardConfig::load_default()?;
    let metrics = Metrics::init(cfg.provider_timeout_ms, cfg.refresh_interval_secs)?;
    let state = dashboard_aggregator::build_state(&cfg)?;

    let router = dashboard_aggregator::router(state).merge(metrics.router());

    Ok(router.into())
}
