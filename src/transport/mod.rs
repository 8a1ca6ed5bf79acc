//! HTTP transport abstraction shared by the solver client and the cookie
//! publisher.
//!
//! Everything that leaves the process goes through [`HttpTransport`], which
//! keeps the solver and publish paths independent of the concrete HTTP stack
//! and lets tests substitute a scripted implementation.

pub mod reqwest_client;

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::HeaderMap;
use thiserror::Error;
use url::Url;

pub use reqwest_client::ReqwestTransport;

/// Contract for issuing a single JSON POST with a bounded timeout.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn post_json(
        &self,
        url: &Url,
        headers: &HeaderMap,
        body: &serde_json::Value,
        timeout: Duration,
    ) -> Result<TransportResponse, TransportError>;
}

/// Status and raw body of a completed exchange.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Bytes,
}

impl TransportResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body decoded lossily, for diagnostics.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("http transport error: {0}")]
    Transport(String),
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("failed to convert header '{0}'")]
    InvalidHeader(String),
}
