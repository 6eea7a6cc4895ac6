//! Runtime configuration, read from the environment (and an optional `.env`).
//!
//! Variables:
//! - `FINANZAS_BACKEND`: `local` (default), `remote` or `remote-auth`
//! - `FINANZAS_URL`: project URL, required for the remote backends
//! - `FINANZAS_ANON_KEY`: public API key, required for the remote backends
//! - `FINANZAS_REALTIME_SECS`: change-feed poll interval (default 5)
//! - `FINANZAS_TIMEOUT_SECS`: HTTP request timeout (client default if unset)
//! - `FINANZAS_DATA_DIR`: overrides the platform data directory

use std::path::PathBuf;
use std::time::Duration;

use reqwest::Url;

const DEFAULT_REALTIME_SECS: u64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BackendKind {
    Local,
    Remote,
    RemoteAuthenticated,
}

impl BackendKind {
    fn parse(raw: &str) -> Result<Self, ConfigError> {
        match raw.trim().to_lowercase().as_str() {
            "" | "local" => Ok(Self::Local),
            "remote" => Ok(Self::Remote),
            "remote-auth" | "remote_auth" | "auth" => Ok(Self::RemoteAuthenticated),
            other => Err(ConfigError::UnknownBackend(other.to_string())),
        }
    }

    pub(crate) fn is_remote(self) -> bool {
        !matches!(self, Self::Local)
    }
}

/// Connection details for the hosted backend.
#[derive(Clone)]
pub(crate) struct RemoteConfig {
    pub url: Url,
    pub anon_key: String,
    pub timeout: Option<Duration>,
    pub realtime_interval: Duration,
}

impl std::fmt::Debug for RemoteConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteConfig")
            .field("url", &self.url)
            .field("anon_key", &"[REDACTED]")
            .field("timeout", &self.timeout)
            .field("realtime_interval", &self.realtime_interval)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Config {
    pub backend: BackendKind,
    /// `None` for the local backend.
    pub remote: Option<RemoteConfig>,
    pub data_dir: Option<PathBuf>,
}

impl Config {
    pub(crate) fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let backend = match var("FINANZAS_BACKEND") {
            Some(raw) => BackendKind::parse(&raw)?,
            None => BackendKind::Local,
        };

        let remote = if backend.is_remote() {
            let raw_url = var("FINANZAS_URL").ok_or(ConfigError::Missing("FINANZAS_URL"))?;
            let url = Url::parse(raw_url.trim())
                .map_err(|e| ConfigError::InvalidUrl(raw_url.clone(), e.to_string()))?;
            let anon_key =
                var("FINANZAS_ANON_KEY").ok_or(ConfigError::Missing("FINANZAS_ANON_KEY"))?;
            let timeout = match var("FINANZAS_TIMEOUT_SECS") {
                Some(raw) => Some(Duration::from_secs(secs("FINANZAS_TIMEOUT_SECS", &raw)?)),
                None => None,
            };
            let realtime = match var("FINANZAS_REALTIME_SECS") {
                Some(raw) => secs("FINANZAS_REALTIME_SECS", &raw)?,
                None => DEFAULT_REALTIME_SECS,
            };
            Some(RemoteConfig {
                url,
                anon_key: anon_key.trim().to_string(),
                timeout,
                realtime_interval: Duration::from_secs(realtime),
            })
        } else {
            None
        };

        Ok(Self {
            backend,
            remote,
            data_dir: var("FINANZAS_DATA_DIR").map(PathBuf::from),
        })
    }
}

fn secs(key: &'static str, raw: &str) -> Result<u64, ConfigError> {
    match raw.trim().parse::<u64>() {
        Ok(n) if n >= 1 => Ok(n),
        _ => Err(ConfigError::InvalidSeconds(key, raw.to_string())),
    }
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum ConfigError {
    #[error("unknown backend '{0}' (use local, remote or remote-auth)")]
    UnknownBackend(String),
    #[error("{0} must be set for the remote backends")]
    Missing(&'static str),
    #[error("invalid URL '{0}': {1}")]
    InvalidUrl(String, String),
    #[error("{0} must be a whole number of seconds >= 1, got '{1}'")]
    InvalidSeconds(&'static str, String),
}
