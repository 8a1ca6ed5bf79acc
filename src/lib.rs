//! # clearance-relay
//!
//! Keeps a Cloudflare-protected target reachable by periodically asking a
//! FlareSolverr-compatible solver for a fresh `cf_clearance` cookie and
//! republishing it to a downstream endpoint.
//!
//! ## Features
//!
//! - FlareSolverr and Byparr solvers behind one async trait
//! - Authenticated proxies through short-lived solver sessions that are
//!   always destroyed
//! - Self-throttling scheduler: bounded wake-ups, no overlapping runs,
//!   manual triggers
//! - Pluggable HTTP transport (reqwest by default)
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use clearance_relay::{ClearanceRelay, Settings};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = Settings::from_env()?;
//!     let relay = Arc::new(ClearanceRelay::from_settings(&settings)?);
//!     let outcome = relay.refresh().await?;
//!     println!("{outcome:?}");
//!     Ok(())
//! }
//! ```

mod relay;

pub mod config;
pub mod publisher;
pub mod scheduler;
pub mod solvers;
pub mod transport;

pub use crate::relay::{ClearanceRelay, RelayError, RelayOutcome, RelayResult};

pub use crate::config::{ConfigError, Settings, SettingsBuilder, SolverKind};

pub use crate::publisher::{CookiePublisher, PublishError};

pub use crate::scheduler::{ScheduleError, Scheduler, TaskFuture};

pub use crate::solvers::{
    Byparr,
    CLEARANCE_COOKIE,
    ClearanceSolver,
    FlareSolverr,
    ProxyDescriptor,
    ProxyError,
    SessionError,
    SessionManager,
    SolverClient,
    SolverCommand,
    SolverError,
    SolverResponse,
    SolverResult,
    build_solver,
    extract_clearance,
    resolve_proxy,
};

pub use crate::transport::{HttpTransport, ReqwestTransport, TransportError, TransportResponse};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
