// src/aggregate/mod.rs
pub mod adapter;
pub mod provenance;
pub mod providers;
pub mod snapshot;
pub mod sources;
pub mod types;

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use once_cell::sync::OnceCell;
use thiserror::Error;

use crate::aggregate::adapter::ProviderAdapter;
use crate::aggregate::provenance::classify_source;
use crate::aggregate::snapshot::{AggregatedSnapshot, SourceEntry};
use crate::aggregate::types::{Category, FetchError, FetchResult, Source, SourceProvider};
use crate::session::UserSession;

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("aggregate_runs_total", "Fan-out cycles dispatched.");
        describe_counter!(
            "aggregate_source_rejected_total",
            "Sources that settled as rejected (transport, timeout, status, decode)."
        );
        describe_counter!(
            "aggregate_source_fallback_total",
            "Fulfilled sources classified as fallback data."
        );
        describe_counter!(
            "aggregate_shape_mismatch_total",
            "Fulfilled payloads missing their list field."
        );
        describe_histogram!(
            "aggregate_source_fetch_ms",
            "Per-source fetch time in milliseconds."
        );
        describe_histogram!("aggregate_run_ms", "Full fan-out time in milliseconds.");
        describe_gauge!(
            "aggregate_last_run_ts",
            "Unix ts when the last fan-out settled."
        );
    });
}

/// Failure to run the fan-out at all. Individual source failures never end up here.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrchestrationError {
    #[error("session has an empty user id")]
    InvalidSession,
    #[error("no sources configured")]
    NoSources,
    #[error("source {0} configured more than once")]
    DuplicateSource(Category),
    #[error("fan-out task aborted before settling")]
    Aborted,
}

/// Dispatches every configured source concurrently and waits for all of them.
pub struct FetchOrchestrator {
    adapters: Vec<Arc<ProviderAdapter>>,
}

impl FetchOrchestrator {
    pub fn new(
        sources: Vec<Source>,
        provider: Arc<dyn SourceProvider>,
        timeout: Duration,
    ) -> Result<Self, OrchestrationError> {
        if sources.is_empty() {
            return Err(OrchestrationError::NoSources);
        }
        let mut seen = BTreeSet::new();
        for s in &sources {
            if !seen.insert(s.id) {
                return Err(OrchestrationError::DuplicateSource(s.id));
            }
        }
        let adapters = sources
            .into_iter()
            .map(|s| Arc::new(ProviderAdapter::new(s, provider.clone(), timeout)))
            .collect();
        Ok(Self { adapters })
    }

    pub fn categories(&self) -> Vec<Category> {
        self.adapters.iter().map(|a| a.source().id).collect()
    }

    /// Run one cycle for `user`, tagging the snapshot with `generation`.
    ///
    /// Each adapter runs in its own task; the call returns once every task has settled.
    /// A panicking adapter is recorded as an `Aborted` rejection for its source.
    pub async fn run_once(
        &self,
        user: &UserSession,
        generation: u64,
    ) -> Result<AggregatedSnapshot, OrchestrationError> {
        ensure_metrics_described();
        if user.id.trim().is_empty() {
            return Err(OrchestrationError::InvalidSession);
        }

        let t0 = Instant::now();
        let handles = self.adapters.iter().map(|adapter| {
            let adapter = adapter.clone();
            let user = user.clone();
            tokio::spawn(async move { adapter.fetch(&user).await })
        });
        let joined = futures::future::join_all(handles).await;

        let entries = self
            .adapters
            .iter()
            .zip(joined)
            .map(|(adapter, joined)| {
                let source = adapter.source();
                let result = joined.unwrap_or_else(|e| {
                    tracing::error!(
                        target: "aggregate",
                        source = source.id.as_str(),
                        error = %e,
                        "adapter task aborted"
                    );
                    FetchResult::Rejected {
                        failure: FetchError::Aborted {
                            reason: e.to_string(),
                        },
                    }
                });
                let provenance = result
                    .payload()
                    .and_then(|payload| classify_source(source, payload));
                if provenance.as_ref().is_some_and(|p| !p.is_live) {
                    counter!("aggregate_source_fallback_total", "source" => source.id.as_str())
                        .increment(1);
                }
                (source.id, SourceEntry { result, provenance })
            })
            .collect::<Vec<_>>();

        let snapshot = AggregatedSnapshot::assemble(generation, user.id.clone(), entries);

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        counter!("aggregate_runs_total").increment(1);
        histogram!("aggregate_run_ms").record(ms);
        gauge!("aggregate_last_run_ts").set(snapshot.created_at.timestamp() as f64);

        tracing::info!(
            target: "aggregate",
            user = %user.log_id(),
            generation,
            fulfilled = snapshot.fulfilled_count(),
            rejected = snapshot.rejected_count(),
            fallback = snapshot.fallback_count(),
            elapsed_ms = ms as u64,
            "fan-out settled"
        );
        Ok(snapshot)
    }
}
