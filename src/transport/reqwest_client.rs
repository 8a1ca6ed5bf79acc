//! Reqwest-based implementation of the `HttpTransport` trait.
//!
//! Thin adapter around `reqwest::Client` that converts between the `http`
//! header types used by the rest of the crate and the concrete transport.

use std::time::Duration;

use async_trait::async_trait;
use http::HeaderMap as HttpHeaderMap;
use reqwest::{Client, header::HeaderMap};
use url::Url;

use super::{HttpTransport, TransportError, TransportResponse};

/// Reqwest-backed transport used by the solver client and the publisher.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, TransportError> {
        let client = Client::builder()
            .build()
            .map_err(|err| TransportError::Transport(err.to_string()))?;

        Ok(Self { client })
    }

    /// Wrap an existing reqwest client. Per-request timeouts are still
    /// applied on top of whatever the client was configured with.
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn post_json(
        &self,
        url: &Url,
        headers: &HttpHeaderMap,
        body: &serde_json::Value,
        timeout: Duration,
    ) -> Result<TransportResponse, TransportError> {
        let req_headers = convert_headers(headers)?;

        let response = self
            .client
            .post(url.as_str())
            .headers(req_headers)
            .timeout(timeout)
            .json(body)
            .send()
            .await
            .map_err(|err| map_error(err, timeout))?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|err| map_error(err, timeout))?;

        Ok(TransportResponse { status, body })
    }
}

fn map_error(err: reqwest::Error, timeout: Duration) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout(timeout)
    } else {
        TransportError::Transport(err.to_string())
    }
}

fn convert_headers(headers: &HttpHeaderMap) -> Result<HeaderMap, TransportError> {
    let mut map = HeaderMap::new();
    for (name, value) in headers.iter() {
        let name = reqwest::header::HeaderName::from_bytes(name.as_str().as_bytes())
            .map_err(|_| TransportError::InvalidHeader(name.to_string()))?;
        let value = reqwest::header::HeaderValue::from_bytes(value.as_bytes())
            .map_err(|_| TransportError::InvalidHeader(name.to_string()))?;
        map.insert(name, value);
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{HeaderValue, header::AUTHORIZATION};

    #[test]
    fn converts_headers_between_crates() {
        let mut headers = HttpHeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer sk-123456"));
        let converted = convert_headers(&headers).unwrap();
        assert_eq!(
            converted.get("authorization").unwrap().to_str().unwrap(),
            "Bearer sk-123456"
        );
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_transport_error() {
        let transport = ReqwestTransport::new().unwrap();
        let url = Url::parse("http://127.0.0.1:9/v1").unwrap();
        let result = transport
            .post_json(
                &url,
                &HttpHeaderMap::new(),
                &serde_json::json!({}),
                Duration::from_secs(2),
            )
            .await;
        assert!(result.is_err());
    }
}
