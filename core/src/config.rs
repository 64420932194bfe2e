//! Client configuration.
//!
//! Everything the transport and sync layer need is passed in through a
//! `ClientConfig` value; there are no process-wide defaults to mutate.

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::transport::RetryPolicy;

pub const DEFAULT_BASE_URL: &str = "http://localhost:3000/api";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const ENV_URL: &str = "TODO_API_URL";
const ENV_TIMEOUT_SECS: &str = "TODO_API_TIMEOUT_SECS";
const ENV_RETRY_ATTEMPTS: &str = "TODO_API_RETRY_ATTEMPTS";
const ENV_RETRY_BACKOFF_MS: &str = "TODO_API_RETRY_BACKOFF_MS";
const ENV_TOGGLE: &str = "TODO_API_TOGGLE";

/// How a completion toggle is expressed on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToggleMode {
    /// `PUT /todos/{id}/toggle` with no body.
    #[default]
    Endpoint,
    /// `PUT /todos/{id}` with `{"completed": !current}`.
    Update,
}

impl FromStr for ToggleMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "endpoint" => Ok(ToggleMode::Endpoint),
            "update" => Ok(ToggleMode::Update),
            _ => Err(ConfigError::InvalidToggleMode(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Service root, e.g. `https://example.com/api`. `/todos` is appended.
    pub base_url: String,
    /// Bound on each individual attempt.
    pub timeout: Duration,
    pub retry: RetryPolicy,
    pub toggle_mode: ToggleMode,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Defaults overlaid with `TODO_API_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(url) = lookup(ENV_URL).filter(|u| !u.trim().is_empty()) {
            config.base_url = url;
        }
        if let Some(secs) = lookup(ENV_TIMEOUT_SECS) {
            config.timeout = Duration::from_secs(parse_positive(ENV_TIMEOUT_SECS, &secs)?);
        }
        if let Some(attempts) = lookup(ENV_RETRY_ATTEMPTS) {
            let attempts = parse_positive(ENV_RETRY_ATTEMPTS, &attempts)?;
            config.retry.max_attempts = u32::try_from(attempts).unwrap_or(u32::MAX);
        }
        if let Some(ms) = lookup(ENV_RETRY_BACKOFF_MS) {
            config.retry.backoff = Duration::from_millis(parse_number(ENV_RETRY_BACKOFF_MS, &ms)?);
        }
        if let Some(mode) = lookup(ENV_TOGGLE) {
            config.toggle_mode = mode.parse()?;
        }
        Ok(config)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            retry: RetryPolicy::default(),
            toggle_mode: ToggleMode::default(),
        }
    }
}

fn parse_number(var: &'static str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidNumber {
        var,
        value: value.to_string(),
    })
}

fn parse_positive(var: &'static str, value: &str) -> Result<u64, ConfigError> {
    match parse_number(var, value)? {
        0 => Err(ConfigError::Zero { var }),
        n => Ok(n),
    }
}
