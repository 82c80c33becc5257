//! Client configuration (environment first, CLI flags override).

use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::Url;

use crate::error::ConfigError;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080/api/v1";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub const ENV_API_URL: &str = "USERMGR_API_URL";
pub const ENV_SESSION_FILE: &str = "USERMGR_SESSION_FILE";
pub const ENV_TIMEOUT_SECS: &str = "USERMGR_TIMEOUT_SECS";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    base_url: String,
    session_file: Option<PathBuf>,
    timeout: Duration,
}

impl ClientConfig {
    /// Config for `base_url` with in-memory session storage.
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: normalize_base_url(base_url)?,
            session_file: None,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Read `USERMGR_API_URL`, `USERMGR_SESSION_FILE`, `USERMGR_TIMEOUT_SECS`.
    ///
    /// Without `USERMGR_SESSION_FILE` the session lives under the platform
    /// data directory (`<data_dir>/usermgr/session.json`).
    pub fn from_env() -> Result<Self, ConfigError> {
        let base_url =
            std::env::var(ENV_API_URL).unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let mut config = Self::new(&base_url)?;

        config.session_file = match std::env::var_os(ENV_SESSION_FILE) {
            Some(path) => Some(PathBuf::from(path)),
            None => default_session_file(),
        };

        if let Ok(raw) = std::env::var(ENV_TIMEOUT_SECS) {
            config.timeout = parse_timeout(&raw)?;
        }

        Ok(config)
    }

    pub fn with_session_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.session_file = Some(path.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_base_url(mut self, base_url: &str) -> Result<Self, ConfigError> {
        self.base_url = normalize_base_url(base_url)?;
        Ok(self)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn session_file(&self) -> Option<&Path> {
        self.session_file.as_deref()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn http_client(&self) -> Result<reqwest::Client, ConfigError> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))
    }
}

pub fn default_session_file() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join("usermgr").join("session.json"))
}

pub fn parse_timeout(raw: &str) -> Result<Duration, ConfigError> {
    match raw.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(ConfigError::InvalidTimeout(raw.to_string())),
    }
}

fn normalize_base_url(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim().trim_end_matches('/');
    let url = Url::parse(trimmed).map_err(|e| ConfigError::InvalidBaseUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidBaseUrl {
            url: raw.to_string(),
            reason: format!("unsupported scheme '{}'", url.scheme()),
        });
    }
    Ok(trimmed.to_string())
}
