//! Clearance relay orchestration.
//!
//! Wires the configured solver to the cookie publisher and exposes one
//! refresh cycle: obtain a clearance token, then forward it downstream.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::config::Settings;
use crate::publisher::{CookiePublisher, PublishError};
use crate::scheduler::{ScheduleError, Scheduler};
use crate::solvers::{ClearanceSolver, SolverError, build_solver};
use crate::transport::{HttpTransport, ReqwestTransport, TransportError};

/// Result alias used across the orchestration layer.
pub type RelayResult<T> = Result<T, RelayError>;

/// High-level error surfaced by a refresh cycle.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("solver error: {0}")]
    Solver(#[from] SolverError),
    #[error("publish failed: {0}")]
    Publish(#[from] PublishError),
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("scheduler error: {0}")]
    Schedule(#[from] ScheduleError),
}

/// What a single refresh cycle achieved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    Published {
        token: String,
        published_at: DateTime<Utc>,
    },
    /// The solver produced no token; nothing was published.
    NoClearance,
}

/// Solver plus publisher, ready to run refresh cycles.
pub struct ClearanceRelay {
    solver: Arc<dyn ClearanceSolver>,
    publisher: CookiePublisher,
}

impl ClearanceRelay {
    pub fn new(solver: Arc<dyn ClearanceSolver>, publisher: CookiePublisher) -> Self {
        Self { solver, publisher }
    }

    /// Production wiring over a reqwest transport.
    pub fn from_settings(settings: &Settings) -> RelayResult<Self> {
        let transport: Arc<dyn HttpTransport> = Arc::new(ReqwestTransport::new()?);
        Ok(Self::with_transport(settings, transport))
    }

    /// Same wiring as [`from_settings`](Self::from_settings) over any transport.
    pub fn with_transport(settings: &Settings, transport: Arc<dyn HttpTransport>) -> Self {
        let solver = build_solver(settings, transport.clone());
        let publisher = CookiePublisher::new(
            transport,
            settings.update_endpoint().clone(),
            settings.endpoint_auth(),
            settings.solver_timeout(),
        );
        Self::new(solver, publisher)
    }

    pub fn solver_name(&self) -> &'static str {
        self.solver.name()
    }

    /// Run one cycle. An empty token skips publishing.
    pub async fn refresh(&self) -> RelayResult<RelayOutcome> {
        let token = self.solver.clearance().await?;
        if token.is_empty() {
            log::error!(
                "{} returned no clearance cookie; the ip may not be challenged or the solver failed",
                self.solver.name()
            );
            return Ok(RelayOutcome::NoClearance);
        }
        log::debug!("obtained clearance cookie: {token}");

        if let Err(err) = self.publisher.publish(&token).await {
            log::error!("update to {} failed: {err}", self.publisher.endpoint());
            return Err(err.into());
        }

        log::info!("clearance cookie updated at {}", self.publisher.endpoint());
        Ok(RelayOutcome::Published {
            token,
            published_at: Utc::now(),
        })
    }

    /// Wrap [`refresh`](Self::refresh) in a [`Scheduler`]. The scheduler is
    /// returned unstarted.
    pub fn into_scheduler(
        self: Arc<Self>,
        interval: Duration,
        min_interval: Duration,
    ) -> RelayResult<Scheduler> {
        let scheduler = Scheduler::new(interval, min_interval, move || {
            let relay = self.clone();
            async move { relay.refresh().await.map(|_| ()) }
        })?;
        Ok(scheduler)
    }
}
