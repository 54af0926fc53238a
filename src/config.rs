//! Client configuration parsed from environment variables.

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;

use std::path::PathBuf;
use std::time::Duration;

use crate::net::client::AuthFailurePolicy;

pub const DEFAULT_API_URL: &str = "http://localhost:8000/api";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_TOAST_DURATION_MS: u64 = 5000;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unknown LITHOVOLT_CLIENT_VARIANT: {0} (expected 'web' or 'mobile')")]
    UnknownVariant(String),
    #[error("invalid {key}: {value}")]
    InvalidNumber { key: &'static str, value: String },
    #[error("no platform data directory; set LITHOVOLT_STORAGE_DIR")]
    NoStorageDir,
}

/// Which Lithovolt client's 401 behavior to reproduce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClientVariant {
    /// Browser dashboard: 401 logs out immediately.
    Web,
    /// Mobile app: 401 triggers one shared refresh and a single retry.
    #[default]
    Mobile,
}

impl ClientVariant {
    #[must_use]
    pub fn auth_failure_policy(self) -> AuthFailurePolicy {
        match self {
            Self::Web => AuthFailurePolicy::Logout,
            Self::Mobile => AuthFailurePolicy::Refresh,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self { request_secs: DEFAULT_REQUEST_TIMEOUT_SECS, connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Backend base URL without a trailing slash, e.g. `http://localhost:8000/api`.
    pub api_url: String,
    pub variant: ClientVariant,
    pub timeouts: Timeouts,
    /// Directory holding the persisted session record.
    pub storage_dir: PathBuf,
    pub toast_duration: Duration,
}

impl ClientConfig {
    /// Config with defaults for everything except the base URL.
    #[must_use]
    pub fn new(api_url: &str) -> Self {
        Self {
            api_url: normalize_url(api_url),
            variant: ClientVariant::default(),
            timeouts: Timeouts::default(),
            storage_dir: std::env::temp_dir().join("lithovolt"),
            toast_duration: Duration::from_millis(DEFAULT_TOAST_DURATION_MS),
        }
    }

    #[must_use]
    pub fn with_variant(mut self, variant: ClientVariant) -> Self {
        self.variant = variant;
        self
    }

    /// Build typed config from environment variables.
    ///
    /// Optional:
    /// - `LITHOVOLT_API_URL`: default `http://localhost:8000/api`
    /// - `LITHOVOLT_CLIENT_VARIANT`: `mobile` (default) or `web`
    /// - `LITHOVOLT_REQUEST_TIMEOUT_SECS`: default 30
    /// - `LITHOVOLT_CONNECT_TIMEOUT_SECS`: default 10
    /// - `LITHOVOLT_STORAGE_DIR`: default `<platform data dir>/lithovolt`
    /// - `LITHOVOLT_TOAST_DURATION_MS`: default 5000
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown variant, a non-numeric number, or when
    /// no storage directory can be determined.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ClientConfig::from_env`] over an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// See [`ClientConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_url = normalize_url(&lookup("LITHOVOLT_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_owned()));
        let variant = parse_variant(lookup("LITHOVOLT_CLIENT_VARIANT").as_deref())?;
        let timeouts = Timeouts {
            request_secs: parse_u64(&lookup, "LITHOVOLT_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS)?,
            connect_secs: parse_u64(&lookup, "LITHOVOLT_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS)?,
        };
        let storage_dir = match lookup("LITHOVOLT_STORAGE_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => dirs::data_dir()
                .map(|d| d.join("lithovolt"))
                .ok_or(ConfigError::NoStorageDir)?,
        };
        let toast_duration =
            Duration::from_millis(parse_u64(&lookup, "LITHOVOLT_TOAST_DURATION_MS", DEFAULT_TOAST_DURATION_MS)?);

        Ok(Self { api_url, variant, timeouts, storage_dir, toast_duration })
    }
}

fn normalize_url(raw: &str) -> String {
    raw.trim().trim_end_matches('/').to_owned()
}

fn parse_variant(raw: Option<&str>) -> Result<ClientVariant, ConfigError> {
    match raw.map(str::trim).unwrap_or("mobile") {
        "mobile" => Ok(ClientVariant::Mobile),
        "web" => Ok(ClientVariant::Web),
        other => Err(ConfigError::UnknownVariant(other.to_owned())),
    }
}

fn parse_u64(lookup: &impl Fn(&str) -> Option<String>, key: &'static str, default: u64) -> Result<u64, ConfigError> {
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidNumber { key, value: raw }),
    }
}
