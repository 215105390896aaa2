use std::path::{Path, PathBuf};
use std::time::Duration;
use serde::Deserialize;
use anyhow::{Context, Result};
use reqwest::Url;
use shared::protocol::{ENV_CONFIG_URL, ENV_URL_STYLE, STYLE_DOCKERIZED};
use crate::error::ClientError;

/// Client configuration as written by the user, typically a `[client]` TOML table
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// Base URL of jarvis-config-service. Falls back to `JARVIS_CONFIG_URL`.
    #[serde(default)]
    pub config_url: Option<String>,
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Upper bound on waiting for an in-flight refresh during shutdown
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
    /// "dockerized" asks the service for host.docker.internal URLs.
    /// Falls back to `JARVIS_CONFIG_URL_STYLE`.
    #[serde(default)]
    pub url_style: Option<String>,
    /// SQLite file for the durable snapshot, if any
    #[serde(default)]
    pub db_path: Option<PathBuf>,
}

/// Validated settings the client runs with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Base URL without a trailing slash
    pub endpoint: String,
    pub refresh_interval: Duration,
    pub request_timeout: Duration,
    pub shutdown_timeout: Duration,
    pub dockerized: bool,
}

fn default_refresh_interval() -> u64 {
    300
}

fn default_request_timeout() -> u64 {
    10
}

fn default_shutdown_timeout() -> u64 {
    5
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            config_url: None,
            refresh_interval_secs: default_refresh_interval(),
            request_timeout_secs: default_request_timeout(),
            shutdown_timeout_secs: default_shutdown_timeout(),
            url_style: None,
            db_path: None,
        }
    }
}

impl ClientConfig {
    /// Config pointing at the given service URL, everything else defaulted
    pub fn new(config_url: impl Into<String>) -> Self {
        Self {
            config_url: Some(config_url.into()),
            ..Self::default()
        }
    }

    pub fn with_refresh_interval(mut self, secs: u64) -> Self {
        self.refresh_interval_secs = secs;
        self
    }

    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: ClientConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Validate against the process environment
    pub fn resolve(&self) -> Result<Settings, ClientError> {
        self.resolve_with(|key| std::env::var(key).ok())
    }

    /// Validate, looking up environment fallbacks through `env`
    pub fn resolve_with(&self, env: impl Fn(&str) -> Option<String>) -> Result<Settings, ClientError> {
        let raw = self
            .config_url
            .clone()
            .filter(|url| !url.trim().is_empty())
            .or_else(|| env(ENV_CONFIG_URL).filter(|url| !url.trim().is_empty()))
            .ok_or_else(|| ClientError::Configuration(format!(
                "config_url not provided and {} environment variable not set",
                ENV_CONFIG_URL
            )))?;

        let endpoint = raw.trim().trim_end_matches('/').to_string();
        let parsed = Url::parse(&endpoint)
            .map_err(|e| ClientError::Configuration(format!("invalid config_url {:?}: {}", endpoint, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ClientError::Configuration(format!(
                "config_url must be http or https, got {:?}",
                endpoint
            )));
        }

        let refresh_interval = non_zero_secs("refresh_interval_secs", self.refresh_interval_secs)?;
        let request_timeout = non_zero_secs("request_timeout_secs", self.request_timeout_secs)?;
        let shutdown_timeout = non_zero_secs("shutdown_timeout_secs", self.shutdown_timeout_secs)?;

        let dockerized = self
            .url_style
            .clone()
            .or_else(|| env(ENV_URL_STYLE))
            .map(|style| style.trim().eq_ignore_ascii_case(STYLE_DOCKERIZED))
            .unwrap_or(false);

        Ok(Settings {
            endpoint,
            refresh_interval,
            request_timeout,
            shutdown_timeout,
            dockerized,
        })
    }
}

fn non_zero_secs(field: &str, secs: u64) -> Result<Duration, ClientError> {
    if secs == 0 {
        return Err(ClientError::Configuration(format!("{} must be greater than zero", field)));
    }
    Ok(Duration::from_secs(secs))
}
