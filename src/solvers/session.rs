//! Solver session lifecycle.
//!
//! A session pins one proxy configuration (including credentials) on the
//! solver side. Sessions are created per call, never pooled, and always
//! destroyed before the scope that created them ends.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::runtime::Handle;

use super::client::{SolverClient, SolverCommand};
use super::proxy::ProxyDescriptor;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("solver session creation failed: {0}")]
    Creation(String),
}

/// Live solver session. Owned by exactly one scope.
#[derive(Debug)]
pub struct SolverSession {
    id: String,
    timeout: Duration,
    proxy: Option<ProxyDescriptor>,
}

impl SolverSession {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn proxy(&self) -> Option<&ProxyDescriptor> {
        self.proxy.as_ref()
    }
}

/// Creates and destroys sessions against a solver endpoint.
#[derive(Clone)]
pub struct SessionManager {
    client: SolverClient,
}

impl SessionManager {
    pub fn new(client: SolverClient) -> Self {
        Self { client }
    }

    /// Ask the solver for a new session, optionally bound to `proxy`.
    pub async fn create(
        &self,
        proxy: Option<&ProxyDescriptor>,
    ) -> Result<SolverSession, SessionError> {
        let command = SolverCommand::CreateSession {
            proxy: proxy.cloned(),
        };
        let response = self
            .client
            .send(&command)
            .await
            .map_err(|err| SessionError::Creation(err.to_string()))?;

        if !response.is_ok() {
            let message = response
                .message
                .unwrap_or_else(|| format!("status {}", response.status));
            return Err(SessionError::Creation(message));
        }

        let id = response
            .solution
            .and_then(|solution| solution.session)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| SessionError::Creation("response carried no session id".into()))?;

        log::debug!("created solver session {id}");
        Ok(SolverSession {
            id,
            timeout: self.client.timeout(),
            proxy: proxy.cloned(),
        })
    }

    /// Destroy a session. Failures are logged, never returned.
    pub async fn destroy(&self, session: SolverSession) {
        destroy_session(&self.client, &session.id).await;
    }

    /// Run `f` with a fresh session and destroy it on every exit path.
    ///
    /// `f` receives the session id. If the returned future is dropped before
    /// completion the destroy command is spawned on the current runtime.
    pub async fn with_session<F, Fut, T>(
        &self,
        proxy: Option<&ProxyDescriptor>,
        f: F,
    ) -> Result<T, SessionError>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = T>,
    {
        let session = self.create(proxy).await?;
        let mut guard = SessionGuard {
            client: self.client.clone(),
            id: Some(session.id.clone()),
        };

        let output = f(session.id.clone()).await;

        guard.disarm();
        self.destroy(session).await;
        Ok(output)
    }
}

async fn destroy_session(client: &SolverClient, id: &str) {
    let command = SolverCommand::DestroySession {
        session: id.to_string(),
    };
    match client.send(&command).await {
        Ok(response) if response.is_ok() => log::debug!("destroyed solver session {id}"),
        Ok(response) => log::error!(
            "solver session {id} destroy rejected: {}",
            response.message.unwrap_or(response.status)
        ),
        Err(err) => log::error!("solver session {id} destroy failed: {err}"),
    }
}

/// Destroys an abandoned session when the owning future is dropped early.
struct SessionGuard {
    client: SolverClient,
    id: Option<String>,
}

impl SessionGuard {
    fn disarm(&mut self) {
        self.id = None;
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let Some(id) = self.id.take() else {
            return;
        };
        match Handle::try_current() {
            Ok(handle) => {
                let client = self.client.clone();
                handle.spawn(async move {
                    destroy_session(&client, &id).await;
                });
            }
            Err(_) => log::error!("solver session {id} abandoned outside a runtime; not destroyed"),
        }
    }
}
