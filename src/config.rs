use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::ConfigError;

pub const DEFAULT_API_BASE: &str = "http://localhost:8000";
pub const POLL_MS: u64 = 6000;
pub const COUNTDOWN_MS: u64 = 1000;

pub const ENV_API_BASE: &str = "RISKWATCH_API_BASE";
pub const ENV_POLL_MS: &str = "RISKWATCH_POLL_MS";
pub const ENV_COUNTDOWN_MS: &str = "RISKWATCH_COUNTDOWN_MS";
pub const ENV_ORDERING: &str = "RISKWATCH_ORDERING";
pub const ENV_CORRELATE: &str = "RISKWATCH_CORRELATE_DECISIONS";

/// How overlapping responses are merged into the workflow state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseOrdering {
    /// Last response to arrive wins for every field it carries.
    #[default]
    Arrival,
    /// Responses older than the last applied write to a field group are dropped.
    DropStale,
}

impl std::str::FromStr for ResponseOrdering {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "arrival" => Ok(ResponseOrdering::Arrival),
            "drop_stale" | "drop-stale" => Ok(ResponseOrdering::DropStale),
            other => Err(format!("expected arrival or drop_stale, got {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub api_base: String,
    pub poll_ms: u64,
    pub countdown_ms: u64,
    pub ordering: ResponseOrdering,
    /// Send the pending frame id along with a decision.
    pub correlate_decisions: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            poll_ms: POLL_MS,
            countdown_ms: COUNTDOWN_MS,
            ordering: ResponseOrdering::Arrival,
            correlate_decisions: false,
        }
    }
}

impl MonitorConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup. Unset or blank keys keep defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(base) = get(ENV_API_BASE) {
            config.api_base = base.trim().trim_end_matches('/').to_string();
        }
        if let Some(raw) = get(ENV_POLL_MS) {
            config.poll_ms = parse_millis(ENV_POLL_MS, &raw)?;
        }
        if let Some(raw) = get(ENV_COUNTDOWN_MS) {
            config.countdown_ms = parse_millis(ENV_COUNTDOWN_MS, &raw)?;
        }
        if let Some(raw) = get(ENV_ORDERING) {
            config.ordering = raw.parse().map_err(|reason| ConfigError::InvalidValue {
                key: ENV_ORDERING,
                value: raw.clone(),
                reason,
            })?;
        }
        if let Some(raw) = get(ENV_CORRELATE) {
            config.correlate_decisions = parse_bool(ENV_CORRELATE, &raw)?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.api_base.starts_with("http://") || self.api_base.starts_with("https://")) {
            return Err(ConfigError::InvalidBaseUrl(self.api_base.clone()));
        }
        if self.poll_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: ENV_POLL_MS,
                value: "0".to_string(),
                reason: "period must be positive".to_string(),
            });
        }
        if self.countdown_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: ENV_COUNTDOWN_MS,
                value: "0".to_string(),
                reason: "period must be positive".to_string(),
            });
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_ms)
    }

    pub fn countdown_interval(&self) -> Duration {
        Duration::from_millis(self.countdown_ms)
    }
}

fn parse_millis(key: &'static str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim().parse::<u64>().map_err(|e| ConfigError::InvalidValue {
        key,
        value: raw.to_string(),
        reason: e.to_string(),
    })
}

fn parse_bool(key: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            value: raw.to_string(),
            reason: "expected a boolean".to_string(),
        }),
    }
}
