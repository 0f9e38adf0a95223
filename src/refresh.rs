// src/refresh.rs
//! Refresh lifecycle: when to run the fan-out, and what the view layer currently sees.
//!
//! Every cycle takes a monotonically increasing generation. A cycle publishes only if
//! no newer cycle has started meanwhile; otherwise its result is dropped. Publication
//! swaps the whole snapshot under a write lock, so readers never see two cycles mixed.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use metrics::{counter, gauge};
use serde::Serialize;
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::aggregate::snapshot::AggregatedSnapshot;
use crate::aggregate::{FetchOrchestrator, OrchestrationError};
use crate::session::UserSession;

pub const REFRESH_FAILED_MESSAGE: &str = "Failed to fetch data. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshState {
    Idle,
    Loading,
    Ready,
    /// Ready, but at least one source was rejected.
    Degraded,
    Error,
}

/// What the view layer renders.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardView {
    pub state: RefreshState,
    pub loading: bool,
    pub error: Option<String>,
    pub last_refresh: Option<DateTime<Utc>>,
    /// Generation of the published snapshot (or error), 0 before the first cycle settles.
    pub generation: u64,
    pub user: Option<UserSession>,
    pub snapshot: Option<Arc<AggregatedSnapshot>>,
}

#[derive(Debug, Clone)]
pub enum RefreshOutcome {
    Published(Arc<AggregatedSnapshot>),
    /// A newer cycle started before this one settled; its result was dropped.
    Superseded { generation: u64, latest: u64 },
    Failed {
        generation: u64,
        error: OrchestrationError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RefreshError {
    #[error("no user session; set one before refreshing")]
    NoSession,
}

#[derive(Debug)]
struct Inner {
    session: Option<UserSession>,
    state: RefreshState,
    error: Option<String>,
    snapshot: Option<Arc<AggregatedSnapshot>>,
    last_refresh: Option<DateTime<Utc>>,
    started: u64,
    published: u64,
}

impl Inner {
    /// Claim the next generation. Callers hold the write lock, so the session read
    /// alongside it is the one this cycle belongs to.
    fn begin_cycle(&mut self) -> u64 {
        self.started += 1;
        self.state = RefreshState::Loading;
        self.started
    }

    fn is_current(&self, generation: u64, user_id: &str) -> bool {
        generation == self.started && self.session.as_ref().is_some_and(|s| s.id == user_id)
    }
}

/// Single writer of the published snapshot.
pub struct RefreshController {
    orchestrator: Arc<FetchOrchestrator>,
    inner: Arc<RwLock<Inner>>,
}

impl RefreshController {
    pub fn new(orchestrator: Arc<FetchOrchestrator>) -> Self {
        Self {
            orchestrator,
            inner: Arc::new(RwLock::new(Inner {
                session: None,
                state: RefreshState::Idle,
                error: None,
                snapshot: None,
                last_refresh: None,
                started: 0,
                published: 0,
            })),
        }
    }

    pub fn view(&self) -> DashboardView {
        let g = self.inner.read().expect("refresh state poisoned");
        DashboardView {
            state: g.state,
            loading: g.state == RefreshState::Loading,
            error: g.error.clone(),
            last_refresh: g.last_refresh,
            generation: g.published,
            user: g.session.clone(),
            snapshot: g.snapshot.clone(),
        }
    }

    pub fn state(&self) -> RefreshState {
        self.inner.read().expect("refresh state poisoned").state
    }

    pub fn session(&self) -> Option<UserSession> {
        self.inner
            .read()
            .expect("refresh state poisoned")
            .session
            .clone()
    }

    pub fn snapshot(&self) -> Option<Arc<AggregatedSnapshot>> {
        self.inner
            .read()
            .expect("refresh state poisoned")
            .snapshot
            .clone()
    }

    /// Switch to `user`. A different user id drops the visible snapshot and starts a new
    /// cycle; the same id only updates the stored display name and returns `None`.
    pub async fn set_session(&self, user: UserSession) -> Option<RefreshOutcome> {
        let generation = {
            let mut g = self.inner.write().expect("refresh state poisoned");
            if let Some(current) = g.session.as_mut() {
                if current.same_user(&user) {
                    current.display_name = user.display_name;
                    return None;
                }
            }
            tracing::info!(target: "refresh", user = %user.log_id(), "session changed");
            g.session = Some(user.clone());
            g.snapshot = None;
            g.error = None;
            g.last_refresh = None;
            g.begin_cycle()
        };
        Some(self.run_cycle(user, generation).await)
    }

    /// Re-run the fan-out for the current session.
    pub async fn refresh(&self) -> Result<RefreshOutcome, RefreshError> {
        let (user, generation) = {
            let mut g = self.inner.write().expect("refresh state poisoned");
            let user = g.session.clone().ok_or(RefreshError::NoSession)?;
            (user, g.begin_cycle())
        };
        Ok(self.run_cycle(user, generation).await)
    }

    /// The fan-out and publication run in their own task, so a caller that stops
    /// waiting (client disconnect, timeout) never leaves the controller in `Loading`.
    async fn run_cycle(&self, user: UserSession, generation: u64) -> RefreshOutcome {
        counter!("dashboard_refresh_total").increment(1);
        tracing::debug!(target: "refresh", generation, "cycle started");

        let orchestrator = self.orchestrator.clone();
        let inner = self.inner.clone();
        let user_id = user.id.clone();
        let cycle = tokio::spawn(async move {
            let result = orchestrator.run_once(&user, generation).await;
            settle(&inner, generation, &user.id, result)
        });

        match cycle.await {
            Ok(outcome) => outcome,
            Err(join_err) => {
                tracing::error!(target: "refresh", generation, error = %join_err, "refresh task failed");
                settle(
                    &self.inner,
                    generation,
                    &user_id,
                    Err(OrchestrationError::Aborted),
                )
            }
        }
    }
}

/// Publish `result` if its cycle is still the newest for the current session.
fn settle(
    inner: &RwLock<Inner>,
    generation: u64,
    user_id: &str,
    result: Result<AggregatedSnapshot, OrchestrationError>,
) -> RefreshOutcome {
    let mut g = inner.write().expect("refresh state poisoned");
    if !g.is_current(generation, user_id) {
        counter!("dashboard_refresh_superseded_total").increment(1);
        tracing::debug!(
            target: "refresh",
            generation,
            latest = g.started,
            "stale cycle dropped"
        );
        return RefreshOutcome::Superseded {
            generation,
            latest: g.started,
        };
    }

    g.published = generation;
    match result {
        Ok(snapshot) => {
            let snapshot = Arc::new(snapshot);
            g.state = if snapshot.is_degraded() {
                RefreshState::Degraded
            } else {
                RefreshState::Ready
            };
            g.error = None;
            g.last_refresh = Some(snapshot.created_at);
            g.snapshot = Some(snapshot.clone());
            gauge!("dashboard_last_refresh_ts").set(snapshot.created_at.timestamp() as f64);
            tracing::info!(
                target: "refresh",
                generation,
                state = ?g.state,
                "snapshot published"
            );
            RefreshOutcome::Published(snapshot)
        }
        Err(error) => {
            g.state = RefreshState::Error;
            g.error = Some(REFRESH_FAILED_MESSAGE.to_string());
            counter!("dashboard_refresh_failed_total").increment(1);
            tracing::error!(target: "refresh", generation, error = %error, "refresh failed");
            RefreshOutcome::Failed { generation, error }
        }
    }
}

/// Re-run the refresh every `interval` for whatever session is current.
/// The first tick is skipped; the initial load comes from `set_session`.
pub fn spawn_refresh_scheduler(
    controller: Arc<RefreshController>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match controller.refresh().await {
                Ok(RefreshOutcome::Published(s)) => tracing::debug!(
                    target: "refresh",
                    generation = s.generation,
                    "scheduled refresh published"
                ),
                Ok(_) => {}
                Err(RefreshError::NoSession) => {
                    tracing::trace!(target: "refresh", "scheduled refresh skipped, no session")
                }
            }
        }
    })
}
