// src/aggregate/adapter.rs
use std::sync::Arc;
use std::time::{Duration, Instant};

use metrics::{counter, histogram};

use super::types::{Envelope, FetchError, FetchResult, Source, SourceProvider};
use crate::session::UserSession;

/// Wraps one upstream call for one source. Never fails: transport errors, timeouts and
/// bad bodies all settle as `FetchResult::Rejected`.
pub struct ProviderAdapter {
    source: Source,
    provider: Arc<dyn SourceProvider>,
    timeout: Duration,
}

impl ProviderAdapter {
    pub fn new(source: Source, provider: Arc<dyn SourceProvider>, timeout: Duration) -> Self {
        Self {
            source,
            provider,
            timeout,
        }
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    /// Configured timeout in whole milliseconds, saturating at `u64::MAX`.
    pub fn timeout_ms(&self) -> u64 {
        u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX)
    }

    pub async fn fetch(&self, user: &UserSession) -> FetchResult {
        let t0 = Instant::now();
        let category = self.source.id.as_str();

        let settled = tokio::time::timeout(
            self.timeout,
            self.provider.fetch_latest(&self.source, user),
        )
        .await;

        let result = match settled {
            Ok(Ok(body)) => {
                let payload = Envelope::from_json(&self.source, body);
                if payload.is_shape_mismatch() {
                    tracing::debug!(
                        target: "aggregate",
                        source = category,
                        field = self.source.list_field(),
                        "payload missing list field, treating as no data"
                    );
                    counter!("aggregate_shape_mismatch_total", "source" => category).increment(1);
                }
                FetchResult::Fulfilled { payload }
            }
            Ok(Err(failure)) => FetchResult::Rejected { failure },
            Err(_) => FetchResult::Rejected {
                failure: FetchError::Timeout {
                    timeout_ms: self.timeout_ms(),
                },
            },
        };

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("aggregate_source_fetch_ms", "source" => category).record(ms);

        if let Some(failure) = result.failure() {
            tracing::warn!(
                target: "aggregate",
                source = category,
                provider = self.provider.name(),
                error = %failure,
                "source rejected"
            );
            counter!("aggregate_source_rejected_total", "source" => category).increment(1);
        }
        result
    }
}
