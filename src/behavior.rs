// src/behavior.rs
//! Best-effort interaction telemetry.
//!
//! Events go into a bounded queue drained by one background worker. `emit` never waits:
//! when the queue is full the new event is dropped, when the worker is gone every event
//! is dropped. Send failures are logged and counted, never retried, never returned.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;

use crate::aggregate::types::Category;
use crate::session::anon_hash;

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("behavior_events_sent_total", "Events delivered to the sink.");
        describe_counter!(
            "behavior_events_dropped_total",
            "Events dropped before sending (queue full or closed)."
        );
        describe_counter!(
            "behavior_send_errors_total",
            "Events the sink failed to deliver."
        );
    });
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BehaviorEvent {
    pub user_id: String,
    pub action: String,
    pub content_id: String,
    pub category: String,
    pub timestamp: DateTime<Utc>,
}

impl BehaviorEvent {
    pub fn new(
        user_id: impl Into<String>,
        action: impl Into<String>,
        content_id: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            action: action.into(),
            content_id: content_id.into(),
            category: category.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Where behavior events end up.
#[async_trait]
pub trait BehaviorSink: Send + Sync {
    async fn send(&self, ev: &BehaviorEvent) -> Result<()>;
}

/// `POST <base>/api/users/<id>/behavior` with `{action, content_id, category}`.
pub struct HttpBehaviorSink {
    base: Url,
    client: Client,
    timeout: Duration,
}

impl HttpBehaviorSink {
    pub fn new(base_url: &str) -> Result<Self> {
        let base = Url::parse(base_url)
            .with_context(|| format!("parsing behavior base url {base_url:?}"))?;
        Ok(Self {
            base,
            client: Client::new(),
            timeout: Duration::from_secs(5),
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn endpoint(&self, user_id: &str) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("behavior base url cannot carry a path"))?
            .pop_if_empty()
            .extend(["api", "users", user_id, "behavior"]);
        Ok(url)
    }
}

#[derive(Serialize)]
struct BehaviorBody<'a> {
    action: &'a str,
    content_id: &'a str,
    category: &'a str,
}

#[async_trait]
impl BehaviorSink for HttpBehaviorSink {
    async fn send(&self, ev: &BehaviorEvent) -> Result<()> {
        let url = self.endpoint(&ev.user_id)?;
        let body = BehaviorBody {
            action: &ev.action,
            content_id: &ev.content_id,
            category: &ev.category,
        };
        self.client
            .post(url)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .context("behavior post")?
            .error_for_status()
            .context("behavior non-2xx")?;
        Ok(())
    }
}

/// Used when no logging endpoint is configured.
pub struct DisabledBehaviorSink;

#[async_trait]
impl BehaviorSink for DisabledBehaviorSink {
    async fn send(&self, ev: &BehaviorEvent) -> Result<()> {
        tracing::debug!(target: "behavior", action = %ev.action, "behavior logging disabled");
        Ok(())
    }
}

/// Result of handing an event to the emitter. Informational only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitStatus {
    Queued,
    DroppedFull,
    DroppedClosed,
}

/// Cheap to clone; all clones feed the same worker.
#[derive(Clone)]
pub struct BehaviorEmitter {
    tx: mpsc::Sender<BehaviorEvent>,
}

impl BehaviorEmitter {
    /// Start the worker. `capacity` is clamped to at least 1.
    pub fn spawn(sink: Arc<dyn BehaviorSink>, capacity: usize) -> (Self, JoinHandle<()>) {
        ensure_metrics_described();
        let (tx, mut rx) = mpsc::channel::<BehaviorEvent>(capacity.max(1));
        let worker = tokio::spawn(async move {
            while let Some(ev) = rx.recv().await {
                match sink.send(&ev).await {
                    Ok(()) => {
                        counter!("behavior_events_sent_total").increment(1);
                    }
                    Err(e) => {
                        counter!("behavior_send_errors_total").increment(1);
                        tracing::warn!(
                            target: "behavior",
                            error = ?e,
                            user = %anon_hash(&ev.user_id),
                            action = %ev.action,
                            category = %ev.category,
                            "failed to track behavior"
                        );
                    }
                }
            }
            tracing::debug!(target: "behavior", "emitter worker stopped");
        });
        (Self { tx }, worker)
    }

    /// Hand off an event without waiting.
    pub fn emit(&self, ev: BehaviorEvent) -> EmitStatus {
        match self.tx.try_send(ev) {
            Ok(()) => EmitStatus::Queued,
            Err(TrySendError::Full(ev)) => {
                counter!("behavior_events_dropped_total", "reason" => "full").increment(1);
                tracing::debug!(target: "behavior", action = %ev.action, "queue full, event dropped");
                EmitStatus::DroppedFull
            }
            Err(TrySendError::Closed(_)) => {
                counter!("behavior_events_dropped_total", "reason" => "closed").increment(1);
                EmitStatus::DroppedClosed
            }
        }
    }
}

/// Category label recorded for an interaction with an item of `category`. Recommendation
/// items report their own `content_type` instead.
pub fn interaction_category(category: Category, content_type: Option<&str>) -> String {
    match (category, content_type) {
        (Category::Recommendations, Some(ct)) if !ct.is_empty() => ct.to_string(),
        (c, _) => c.as_str().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_path_is_encoded_per_user() {
        let sink = HttpBehaviorSink::new("http://gw.local:8080/").unwrap();
        assert_eq!(
            sink.endpoint("42").unwrap().as_str(),
            "http://gw.local:8080/api/users/42/behavior"
        );
        assert_eq!(
            sink.endpoint("a/b").unwrap().as_str(),
            "http://gw.local:8080/api/users/a%2Fb/behavior"
        );
    }

    #[test]
    fn recommendation_items_keep_their_own_category() {
        assert_eq!(
            interaction_category(Category::Recommendations, Some("videos")),
            "videos"
        );
        assert_eq!(
            interaction_category(Category::Recommendations, None),
            "recommendations"
        );
        assert_eq!(interaction_category(Category::Nft, Some("videos")), "nft");
    }
}
