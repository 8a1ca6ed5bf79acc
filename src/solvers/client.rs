//! Wire protocol and HTTP client for the solver service.
//!
//! The solver speaks JSON over a single POST endpoint. Commands are tagged by
//! `cmd`; responses carry a `status` string and an optional `solution`.

use std::sync::Arc;
use std::time::Duration;

use http::HeaderMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use super::proxy::{ProxyDescriptor, ProxyEndpoint};
use crate::transport::{HttpTransport, TransportError};

const MAX_LOGGED_BODY: usize = 512;

/// Commands understood by FlareSolverr-compatible services.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "cmd")]
pub enum SolverCommand {
    #[serde(rename = "sessions.create")]
    CreateSession {
        #[serde(skip_serializing_if = "Option::is_none")]
        proxy: Option<ProxyDescriptor>,
    },
    #[serde(rename = "sessions.destroy")]
    DestroySession { session: String },
    #[serde(rename = "request.get")]
    Get {
        url: String,
        #[serde(rename = "maxTimeout", skip_serializing_if = "Option::is_none")]
        max_timeout: Option<u64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        session: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        proxy: Option<ProxyEndpoint>,
    },
}

impl SolverCommand {
    /// `request.get` for `url`, with `maxTimeout` in milliseconds.
    pub fn get(url: &Url, max_timeout: Duration) -> Self {
        SolverCommand::Get {
            url: url.to_string(),
            max_timeout: Some(max_timeout.as_millis() as u64),
            session: None,
            proxy: None,
        }
    }

    pub fn with_session(mut self, id: impl Into<String>) -> Self {
        if let SolverCommand::Get { session, .. } = &mut self {
            *session = Some(id.into());
        }
        self
    }

    pub fn with_proxy(mut self, endpoint: ProxyEndpoint) -> Self {
        if let SolverCommand::Get { proxy, .. } = &mut self {
            *proxy = Some(endpoint);
        }
        self
    }

    pub fn name(&self) -> &'static str {
        match self {
            SolverCommand::CreateSession { .. } => "sessions.create",
            SolverCommand::DestroySession { .. } => "sessions.destroy",
            SolverCommand::Get { .. } => "request.get",
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SolverResponse {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub solution: Option<Solution>,
}

impl SolverResponse {
    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Solution {
    #[serde(default)]
    pub session: Option<String>,
    #[serde(default)]
    pub cookies: Vec<SolverCookie>,
    #[serde(default, rename = "userAgent")]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub status: Option<u16>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SolverCookie {
    pub name: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub expires: Option<f64>,
}

#[derive(Debug, Error)]
pub enum SolverCallError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("solver returned http status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("invalid solver response: {reason}")]
    Parse { reason: String, body: String },
}

/// Issues single commands against the solver endpoint.
#[derive(Clone)]
pub struct SolverClient {
    transport: Arc<dyn HttpTransport>,
    endpoint: Url,
    timeout: Duration,
}

impl SolverClient {
    pub fn new(transport: Arc<dyn HttpTransport>, endpoint: Url, timeout: Duration) -> Self {
        Self {
            transport,
            endpoint,
            timeout,
        }
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Send a command and surface every failure to the caller.
    pub async fn send(&self, command: &SolverCommand) -> Result<SolverResponse, SolverCallError> {
        let body = serde_json::to_value(command).map_err(|err| SolverCallError::Parse {
            reason: err.to_string(),
            body: String::new(),
        })?;
        log::debug!("-> solver {} {}", command.name(), self.endpoint);

        let response = self
            .transport
            .post_json(&self.endpoint, &HeaderMap::new(), &body, self.timeout)
            .await?;

        if !response.is_success() {
            return Err(SolverCallError::Status {
                status: response.status,
                body: truncate(&response.text()),
            });
        }

        serde_json::from_slice(&response.body).map_err(|err| SolverCallError::Parse {
            reason: err.to_string(),
            body: truncate(&response.text()),
        })
    }

    /// Send a command, logging and swallowing any failure into `None`.
    pub async fn solve(&self, command: &SolverCommand) -> Option<SolverResponse> {
        match self.send(command).await {
            Ok(response) => Some(response),
            Err(SolverCallError::Parse { reason, body }) => {
                log::error!("invalid solver json ({reason}): {body}");
                None
            }
            Err(err) => {
                log::error!("solver request {} failed: {err}", command.name());
                None
            }
        }
    }
}

fn truncate(body: &str) -> String {
    match body.char_indices().nth(MAX_LOGGED_BODY) {
        Some((idx, _)) => format!("{}…", &body[..idx]),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::testing::ScriptedTransport;
    use serde_json::json;

    fn client(transport: Arc<ScriptedTransport>) -> SolverClient {
        SolverClient::new(
            transport,
            Url::parse("http://localhost:8191/v1").unwrap(),
            Duration::from_secs(60),
        )
    }

    #[test]
    fn get_command_serialises_optional_fields_only_when_set() {
        let target = Url::parse("https://grok.com").unwrap();
        let bare = serde_json::to_value(SolverCommand::get(&target, Duration::from_secs(60))).unwrap();
        assert_eq!(
            bare,
            json!({ "cmd": "request.get", "url": "https://grok.com/", "maxTimeout": 60000 })
        );

        let with_session = SolverCommand::get(&target, Duration::from_secs(1)).with_session("abc");
        assert_eq!(serde_json::to_value(with_session).unwrap()["session"], "abc");

        let proxied = SolverCommand::get(&target, Duration::from_secs(1)).with_proxy(ProxyEndpoint {
            url: "http://proxy:8080".into(),
        });
        assert_eq!(
            serde_json::to_value(proxied).unwrap()["proxy"],
            json!({ "url": "http://proxy:8080" })
        );
    }

    #[test]
    fn session_commands_match_wire_format() {
        assert_eq!(
            serde_json::to_value(SolverCommand::CreateSession { proxy: None }).unwrap(),
            json!({ "cmd": "sessions.create" })
        );
        assert_eq!(
            serde_json::to_value(SolverCommand::DestroySession { session: "s-1".into() }).unwrap(),
            json!({ "cmd": "sessions.destroy", "session": "s-1" })
        );
    }

    #[tokio::test]
    async fn solve_passes_configured_timeout() {
        let transport = Arc::new(ScriptedTransport::new().reply_json(200, json!({ "status": "ok" })));
        let response = client(transport.clone())
            .solve(&SolverCommand::CreateSession { proxy: None })
            .await
            .unwrap();
        assert!(response.is_ok());
        assert_eq!(transport.calls()[0].timeout, Duration::from_secs(60));
    }

    #[tokio::test]
    async fn transport_failure_becomes_none() {
        let transport = Arc::new(
            ScriptedTransport::new().reply_err(TransportError::Transport("connection refused".into())),
        );
        let target = Url::parse("https://grok.com").unwrap();
        let result = client(transport)
            .solve(&SolverCommand::get(&target, Duration::from_secs(1)))
            .await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn error_status_and_garbage_body_become_none() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .reply_raw(500, "internal error")
                .reply_raw(200, "<html>not json</html>"),
        );
        let client = client(transport);
        let command = SolverCommand::CreateSession { proxy: None };
        assert!(client.solve(&command).await.is_none());
        assert!(matches!(
            client.send(&command).await,
            Err(SolverCallError::Parse { .. })
        ));
    }

    #[test]
    fn truncates_long_bodies() {
        let body = "x".repeat(MAX_LOGGED_BODY + 10);
        assert_eq!(truncate(&body).chars().count(), MAX_LOGGED_BODY + 1);
        assert_eq!(truncate("short"), "short");
    }
}
