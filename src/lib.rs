// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod aggregate;
pub mod api;
pub mod behavior;
pub mod config;
pub mod metrics;
pub mod refresh;
pub mod session;

use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use crate::aggregate::providers::{FixtureProvider, HttpProvider};
use crate::aggregate::types::SourceProvider;
use crate::behavior::{BehaviorEmitter, BehaviorSink, DisabledBehaviorSink, HttpBehaviorSink};
use crate::config::DashboardConfig;

// ---- Re-exports for stable public API ----
pub use crate::aggregate::snapshot::AggregatedSnapshot;
pub use crate::aggregate::{FetchOrchestrator, OrchestrationError};
pub use crate::api::{router, AppState};
pub use crate::refresh::{RefreshController, RefreshState};
pub use crate::session::UserSession;

/// Wire provider, orchestrator, refresh controller and behavior emitter from config.
/// Spawns background tasks, so it must run inside a Tokio runtime.
pub fn build_state(cfg: &DashboardConfig) -> Result<AppState> {
    let provider: Arc<dyn SourceProvider> = match cfg.upstream_base_url.as_deref() {
        Some(url) => {
            info!(upstream = url, "using upstream gateway");
            Arc::new(HttpProvider::new(url)?)
        }
        None => {
            info!("no upstream configured, serving offline demo data");
            Arc::new(FixtureProvider::offline_demo())
        }
    };

    let orchestrator = FetchOrchestrator::new(cfg.sources(), provider, cfg.provider_timeout())?;
    let controller = Arc::new(RefreshController::new(Arc::new(orchestrator)));

    let sink: Arc<dyn BehaviorSink> = match cfg.behavior_url() {
        Some(url) => Arc::new(HttpBehaviorSink::new(url)?.with_timeout(cfg.behavior_timeout())),
        None => Arc::new(DisabledBehaviorSink),
    };
    let (emitter, _worker) = BehaviorEmitter::spawn(sink, cfg.behavior_queue_capacity);

    if let Some(every) = cfg.refresh_interval() {
        info!(every_secs = every.as_secs(), "periodic refresh enabled");
        refresh::spawn_refresh_scheduler(controller.clone(), every);
    }

    Ok(AppState {
        controller,
        emitter,
    })
}
