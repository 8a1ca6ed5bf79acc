//! Runtime settings for the relay.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use url::Url;

pub const DEFAULT_SOLVER_URL: &str = "http://localhost:8191";
pub const DEFAULT_TARGET_URL: &str = "https://grok.com";
pub const DEFAULT_UPDATE_ENDPOINT: &str = "http://localhost:8000/set/cf_clearance";
pub const DEFAULT_ENDPOINT_AUTH: &str = "sk-123456";
pub const DEFAULT_SOLVER_TIMEOUT: Duration = Duration::from_secs(300);
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(300);
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_secs(10);

/// Smallest accepted spacing between two runs.
pub const MIN_INTERVAL_FLOOR: Duration = Duration::from_secs(1);
const MIN_AUTH_LEN: usize = 6;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid {field} url '{value}': {reason}")]
    InvalidUrl {
        field: &'static str,
        value: String,
        reason: String,
    },
    #[error("unsupported scheme '{scheme}' for {field}")]
    UnsupportedScheme { field: &'static str, scheme: String },
    #[error("unknown solver type '{0}' (expected flaresolverr or byparr)")]
    UnknownSolver(String),
    #[error("invalid value '{value}' for {key}")]
    InvalidNumber { key: &'static str, value: String },
    #[error("solver timeout must be at least one second")]
    InvalidTimeout,
    #[error("endpoint auth must be at least 6 characters")]
    AuthTooShort,
    #[error("min interval {0:?} is below the one second floor")]
    MinIntervalTooSmall(Duration),
    #[error("interval {interval:?} is shorter than min interval {min_interval:?}")]
    IntervalBelowMinimum {
        interval: Duration,
        min_interval: Duration,
    },
    #[error("invalid proxy username or password")]
    InvalidProxyCredentials,
}

/// Which solver service sits behind `solver_url`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SolverKind {
    /// FlareSolverr: session capable, honours authenticated proxies.
    #[default]
    FlareSolverr,
    /// Byparr: plain requests only.
    Byparr,
}

impl FromStr for SolverKind {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "flaresolverr" => Ok(SolverKind::FlareSolverr),
            "byparr" => Ok(SolverKind::Byparr),
            _ => Err(ConfigError::UnknownSolver(value.to_string())),
        }
    }
}

impl fmt::Display for SolverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolverKind::FlareSolverr => f.write_str("flaresolverr"),
            SolverKind::Byparr => f.write_str("byparr"),
        }
    }
}

/// Validated, immutable settings shared by every component.
#[derive(Debug, Clone)]
pub struct Settings {
    solver_url: Url,
    solver_kind: SolverKind,
    target_url: Url,
    solver_timeout: Duration,
    update_endpoint: Url,
    endpoint_auth: String,
    interval: Option<Duration>,
    min_interval: Duration,
    proxy: Option<String>,
}

impl Settings {
    pub fn builder() -> SettingsBuilder {
        SettingsBuilder::new()
    }

    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup. Missing keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = SettingsBuilder::new();

        if let Some(value) = lookup("SOLVER_URL") {
            builder = builder.solver_url(value);
        }
        if let Some(value) = lookup("SOLVER_TYPE") {
            builder = builder.solver_kind(value.parse()?);
        }
        if let Some(value) = lookup("TARGET_URL") {
            builder = builder.target_url(value);
        }
        if let Some(value) = lookup("SOLVER_TIMEOUT") {
            builder = builder.solver_timeout(parse_seconds("SOLVER_TIMEOUT", &value)?);
        }
        if let Some(value) = lookup("UPDATE_ENDPOINT") {
            builder = builder.update_endpoint(value);
        }
        if let Some(value) = lookup("ENDPOINT_AUTH") {
            builder = builder.endpoint_auth(value);
        }
        if let Some(value) = lookup("INTERVAL") {
            builder = match value.trim().to_ascii_lowercase().as_str() {
                "" | "0" | "none" | "off" => builder.disable_interval(),
                _ => builder.interval(parse_seconds("INTERVAL", &value)?),
            };
        }
        if let Some(value) = lookup("MIN_INTERVAL") {
            builder = builder.min_interval(parse_seconds("MIN_INTERVAL", &value)?);
        }
        if let Some(value) = lookup("PROXY").filter(|value| !value.trim().is_empty()) {
            builder = builder.proxy(value);
        }

        builder.build()
    }

    /// Solver endpoint, already suffixed with `/v1`.
    pub fn solver_url(&self) -> &Url {
        &self.solver_url
    }

    pub fn solver_kind(&self) -> SolverKind {
        self.solver_kind
    }

    pub fn target_url(&self) -> &Url {
        &self.target_url
    }

    pub fn solver_timeout(&self) -> Duration {
        self.solver_timeout
    }

    pub fn update_endpoint(&self) -> &Url {
        &self.update_endpoint
    }

    pub fn endpoint_auth(&self) -> &str {
        &self.endpoint_auth
    }

    /// Poll interval; `None` means run once and exit.
    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    pub fn proxy(&self) -> Option<&str> {
        self.proxy.as_deref()
    }
}

/// Fluent builder for [`Settings`].
#[derive(Debug, Clone)]
pub struct SettingsBuilder {
    solver_url: String,
    solver_kind: SolverKind,
    target_url: String,
    solver_timeout: Duration,
    update_endpoint: String,
    endpoint_auth: String,
    interval: Option<Duration>,
    min_interval: Duration,
    proxy: Option<String>,
}

impl SettingsBuilder {
    pub fn new() -> Self {
        Self {
            solver_url: DEFAULT_SOLVER_URL.to_string(),
            solver_kind: SolverKind::default(),
            target_url: DEFAULT_TARGET_URL.to_string(),
            solver_timeout: DEFAULT_SOLVER_TIMEOUT,
            update_endpoint: DEFAULT_UPDATE_ENDPOINT.to_string(),
            endpoint_auth: DEFAULT_ENDPOINT_AUTH.to_string(),
            interval: Some(DEFAULT_INTERVAL),
            min_interval: DEFAULT_MIN_INTERVAL,
            proxy: None,
        }
    }

    pub fn solver_url(mut self, url: impl Into<String>) -> Self {
        self.solver_url = url.into();
        self
    }

    pub fn solver_kind(mut self, kind: SolverKind) -> Self {
        self.solver_kind = kind;
        self
    }

    pub fn target_url(mut self, url: impl Into<String>) -> Self {
        self.target_url = url.into();
        self
    }

    pub fn solver_timeout(mut self, timeout: Duration) -> Self {
        self.solver_timeout = timeout;
        self
    }

    pub fn update_endpoint(mut self, url: impl Into<String>) -> Self {
        self.update_endpoint = url.into();
        self
    }

    pub fn endpoint_auth(mut self, auth: impl Into<String>) -> Self {
        self.endpoint_auth = auth.into();
        self
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    pub fn disable_interval(mut self) -> Self {
        self.interval = None;
        self
    }

    pub fn min_interval(mut self, min_interval: Duration) -> Self {
        self.min_interval = min_interval;
        self
    }

    pub fn proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }

    pub fn build(self) -> Result<Settings, ConfigError> {
        let solver_url = parse_http_url("solver_url", &self.solver_url)?;
        let solver_url = with_api_suffix(&solver_url)?;
        let target_url = parse_http_url("target_url", &self.target_url)?;
        let update_endpoint = parse_http_url("update_endpoint", &self.update_endpoint)?;

        if self.solver_timeout < Duration::from_secs(1) {
            return Err(ConfigError::InvalidTimeout);
        }
        if self.endpoint_auth.chars().count() < MIN_AUTH_LEN {
            return Err(ConfigError::AuthTooShort);
        }
        if self.min_interval < MIN_INTERVAL_FLOOR {
            return Err(ConfigError::MinIntervalTooSmall(self.min_interval));
        }
        if let Some(interval) = self.interval
            && interval < self.min_interval
        {
            return Err(ConfigError::IntervalBelowMinimum {
                interval,
                min_interval: self.min_interval,
            });
        }
        if let Some(proxy) = &self.proxy {
            validate_proxy(proxy)?;
        }

        Ok(Settings {
            solver_url,
            solver_kind: self.solver_kind,
            target_url,
            solver_timeout: self.solver_timeout,
            update_endpoint,
            endpoint_auth: self.endpoint_auth,
            interval: self.interval,
            min_interval: self.min_interval,
            proxy: self.proxy,
        })
    }
}

impl Default for SettingsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_seconds(key: &'static str, value: &str) -> Result<Duration, ConfigError> {
    value
        .trim()
        .parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|_| ConfigError::InvalidNumber {
            key,
            value: value.to_string(),
        })
}

fn parse_url(field: &'static str, value: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(value.trim()).map_err(|err| ConfigError::InvalidUrl {
        field,
        value: value.to_string(),
        reason: err.to_string(),
    })?;
    if url.host_str().is_none_or(str::is_empty) {
        return Err(ConfigError::InvalidUrl {
            field,
            value: value.to_string(),
            reason: "missing host".into(),
        });
    }
    Ok(url)
}

fn parse_http_url(field: &'static str, value: &str) -> Result<Url, ConfigError> {
    let url = parse_url(field, value)?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(ConfigError::UnsupportedScheme {
            field,
            scheme: scheme.to_string(),
        }),
    }
}

fn with_api_suffix(url: &Url) -> Result<Url, ConfigError> {
    let value = url.to_string();
    let mut url = url.clone();
    url.path_segments_mut()
        .map_err(|()| ConfigError::InvalidUrl {
            field: "solver_url",
            value,
            reason: "url cannot carry a path".into(),
        })?
        .pop_if_empty()
        .push("v1");
    Ok(url)
}

fn validate_proxy(proxy: &str) -> Result<(), ConfigError> {
    let url = parse_url("proxy", proxy)?;
    if !matches!(url.scheme(), "http" | "https" | "socks5") {
        return Err(ConfigError::UnsupportedScheme {
            field: "proxy",
            scheme: url.scheme().to_string(),
        });
    }
    let has_userinfo = !url.username().is_empty() || url.password().is_some();
    if has_userinfo && (url.username().is_empty() || url.password().is_none_or(str::is_empty)) {
        return Err(ConfigError::InvalidProxyCredentials);
    }
    Ok(())
}
