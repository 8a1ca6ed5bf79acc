//! Downstream publication of the clearance cookie.
//!
//! The sink is a single authenticated endpoint that accepts
//! `{"cf_clearance": "cf_clearance=<token>"}`. Each call is independent and
//! idempotent; failures end the current cycle without retry.

use std::sync::Arc;
use std::time::Duration;

use http::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::Serialize;
use thiserror::Error;
use url::Url;

use crate::solvers::CLEARANCE_COOKIE;
use crate::transport::{HttpTransport, TransportError};

#[derive(Debug, Error)]
pub enum PublishError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("publish endpoint returned http status {status}: {body}")]
    Status { status: u16, body: String },
}

#[derive(Debug, Serialize)]
struct PublishPayload {
    cf_clearance: String,
}

/// Pushes clearance tokens to the configured update endpoint.
#[derive(Clone)]
pub struct CookiePublisher {
    transport: Arc<dyn HttpTransport>,
    endpoint: Url,
    auth_token: String,
    timeout: Duration,
}

impl CookiePublisher {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        endpoint: Url,
        auth_token: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            transport,
            endpoint,
            auth_token: auth_token.into(),
            timeout,
        }
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub async fn publish(&self, token: &str) -> Result<(), PublishError> {
        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.auth_token))
            .map_err(|_| TransportError::InvalidHeader(AUTHORIZATION.to_string()))?;
        headers.insert(AUTHORIZATION, bearer);

        let payload = PublishPayload {
            cf_clearance: format!("{CLEARANCE_COOKIE}={token}"),
        };
        let body = serde_json::to_value(&payload)
            .map_err(|err| TransportError::Transport(err.to_string()))?;

        let response = self
            .transport
            .post_json(&self.endpoint, &headers, &body, self.timeout)
            .await?;

        if !response.is_success() {
            return Err(PublishError::Status {
                status: response.status,
                body: response.text(),
            });
        }
        Ok(())
    }
}
