//! Clearance solvers.
//!
//! A solver turns the configured target URL into a `cf_clearance` cookie by
//! delegating the browser challenge to an external FlareSolverr-compatible
//! service. Two flavours exist: [`FlareSolverr`] understands sessions and can
//! route through authenticated proxies, [`Byparr`] only issues plain
//! requests.

pub mod byparr;
pub mod client;
pub mod flaresolverr;
pub mod proxy;
pub mod session;

pub use byparr::Byparr;
pub use client::{
    SolverCallError, SolverClient, SolverCommand, SolverCookie, SolverResponse, Solution,
};
pub use flaresolverr::FlareSolverr;
pub use proxy::{ProxyDescriptor, ProxyEndpoint, ProxyError, resolve_proxy};
pub use session::{SessionError, SessionManager, SolverSession};

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::{Settings, SolverKind};
use crate::transport::HttpTransport;

/// Name of the cookie Cloudflare issues once a challenge is passed.
pub const CLEARANCE_COOKIE: &str = "cf_clearance";

/// Errors a solver propagates instead of folding into an empty token.
#[derive(Debug, Error)]
pub enum SolverError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Proxy(#[from] ProxyError),
}

pub type SolverResult<T> = Result<T, SolverError>;

/// Shared interface implemented by every solver flavour.
///
/// An empty string means no usable token was obtained. Transport failures,
/// unparseable responses and non-`ok` statuses all end up there.
#[async_trait]
pub trait ClearanceSolver: Send + Sync {
    fn name(&self) -> &'static str;
    async fn clearance(&self) -> SolverResult<String>;
}

/// Build the solver selected by `settings` on top of `transport`.
pub fn build_solver(
    settings: &Settings,
    transport: Arc<dyn HttpTransport>,
) -> Arc<dyn ClearanceSolver> {
    let client = SolverClient::new(
        transport,
        settings.solver_url().clone(),
        settings.solver_timeout(),
    );
    match settings.solver_kind() {
        SolverKind::FlareSolverr => Arc::new(FlareSolverr::new(
            client.clone(),
            SessionManager::new(client),
            settings,
        )),
        SolverKind::Byparr => Arc::new(Byparr::new(client, settings)),
    }
}

/// Pull the clearance cookie out of a solver response.
///
/// First cookie with an exact name match wins. Missing responses, non-`ok`
/// statuses and absent cookies all yield an empty string.
pub fn extract_clearance(response: Option<&SolverResponse>) -> String {
    let Some(response) = response else {
        log::warn!("unexpected solver status: no response");
        return String::new();
    };
    if !response.is_ok() {
        log::warn!(
            "unexpected solver status: {} ({})",
            response.status,
            response.message.as_deref().unwrap_or("no message")
        );
        return String::new();
    }

    response
        .solution
        .as_ref()
        .and_then(|solution| {
            solution
                .cookies
                .iter()
                .find(|cookie| cookie.name == CLEARANCE_COOKIE)
        })
        .map(|cookie| cookie.value.clone())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: serde_json::Value) -> SolverResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn extracts_clearance_cookie() {
        let response = parse(json!({
            "status": "ok",
            "solution": { "cookies": [{ "name": "cf_clearance", "value": "abc123" }] }
        }));
        assert_eq!(extract_clearance(Some(&response)), "abc123");
    }

    #[test]
    fn first_matching_cookie_wins() {
        let response = parse(json!({
            "status": "ok",
            "solution": { "cookies": [
                { "name": "__cf_bm", "value": "bm" },
                { "name": "cf_clearance", "value": "first", "domain": ".grok.com" },
                { "name": "cf_clearance", "value": "second" }
            ] }
        }));
        assert_eq!(extract_clearance(Some(&response)), "first");
    }

    #[test]
    fn bad_status_or_missing_cookie_is_empty() {
        assert_eq!(extract_clearance(Some(&parse(json!({ "status": "error" })))), "");
        assert_eq!(extract_clearance(None), "");
        let no_cookie = parse(json!({ "status": "ok", "solution": { "cookies": [] } }));
        assert_eq!(extract_clearance(Some(&no_cookie)), "");
        let no_solution = parse(json!({ "status": "ok" }));
        assert_eq!(extract_clearance(Some(&no_solution)), "");
    }
}
