use axum::{extract::State, http::header, response::IntoResponse, routing::get, Router};
use metrics::gauge;
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

/// Upstream fetch latency buckets in ms, bracketing the default 10 s provider timeout.
pub const FETCH_MS_BUCKETS: &[f64] = &[
    25.0, 50.0, 100.0, 250.0, 500.0, 1_000.0, 2_500.0, 5_000.0, 10_000.0,
];

const EXPOSITION_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder and publish the static refresh settings.
    pub fn init(provider_timeout_ms: u64, refresh_interval_secs: u64) -> anyhow::Result<Self> {
        let handle = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Full("aggregate_source_fetch_ms".to_string()),
                FETCH_MS_BUCKETS,
            )
            .map_err(|e| anyhow::anyhow!("prometheus: fetch buckets: {e}"))?
            .install_recorder()
            .map_err(|e| anyhow::anyhow!("prometheus: install recorder: {e}"))?;

        gauge!("dashboard_provider_timeout_ms").set(provider_timeout_ms as f64);
        gauge!("dashboard_refresh_interval_secs").set(refresh_interval_secs as f64);

        Ok(Self { handle })
    }

    /// `/metrics` in the Prometheus text exposition format.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/metrics", get(render))
            .with_state(self.handle.clone())
    }
}

async fn render(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, EXPOSITION_CONTENT_TYPE)],
        handle.render(),
    )
}
