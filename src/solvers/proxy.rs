//! Proxy URL resolution for solver requests.
//!
//! Splits a configured proxy URL into the endpoint the solver should dial and
//! the optional credentials it needs to authenticate. Descriptors are cheap
//! and recomputed for every request or session; nothing here is cached.

use serde::Serialize;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProxyError {
    #[error("invalid proxy url: {0}")]
    InvalidProxyUrl(String),
}

/// Endpoint plus optional credentials, serialised the way the solver's
/// `sessions.create` command expects its `proxy` object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProxyDescriptor {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl ProxyDescriptor {
    /// True when the descriptor carries a credential pair and therefore
    /// needs a solver session to be honoured.
    pub fn has_credentials(&self) -> bool {
        self.username.is_some() || self.password.is_some()
    }

    /// Credential-free form attached directly to a `request.get` command.
    pub fn endpoint(&self) -> ProxyEndpoint {
        ProxyEndpoint {
            url: self.url.clone(),
        }
    }
}

/// Bare proxy endpoint, used when no session is involved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProxyEndpoint {
    pub url: String,
}

/// Resolve an optional proxy URL into a descriptor.
///
/// Absent or blank input yields `Ok(None)`. A URL without a scheme or host
/// fails with [`ProxyError::InvalidProxyUrl`]. Userinfo is never embedded in
/// the reconstructed endpoint; when either half is present both descriptor
/// fields are populated, possibly with an empty string.
pub fn resolve_proxy(proxy: Option<&str>) -> Result<Option<ProxyDescriptor>, ProxyError> {
    let Some(raw) = proxy.map(str::trim).filter(|raw| !raw.is_empty()) else {
        return Ok(None);
    };

    let parsed = Url::parse(raw).map_err(|_| ProxyError::InvalidProxyUrl(raw.to_string()))?;
    let host = parsed
        .host_str()
        .filter(|host| !host.is_empty())
        .ok_or_else(|| ProxyError::InvalidProxyUrl(raw.to_string()))?;

    let url = match parsed.port() {
        Some(port) => format!("{}://{}:{}", parsed.scheme(), host, port),
        None => format!("{}://{}", parsed.scheme(), host),
    };

    let username = parsed.username();
    let password = parsed.password();
    let (username, password) = if !username.is_empty() || password.is_some() {
        (
            Some(username.to_string()),
            Some(password.unwrap_or_default().to_string()),
        )
    } else {
        (None, None)
    };

    Ok(Some(ProxyDescriptor {
        url,
        username,
        password,
    }))
}
