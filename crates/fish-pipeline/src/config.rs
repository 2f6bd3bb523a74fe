//! Pipeline configuration.
//!
//! Loaded from environment variables with defaults suitable for running the
//! pipeline locally from a terminal.

use fish_events::BusConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Invalid configuration value.
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue {
        /// Configuration key.
        key: String,
        /// Error message.
        message: String,
    },
}

/// Result type for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

const SUBSCRIBER_TIMEOUT_VAR: &str = "FISH_SUBSCRIBER_TIMEOUT_MS";
const ROUTES_VAR: &str = "FISH_ROUTES";
const ENABLE_ECHO_VAR: &str = "FISH_ENABLE_ECHO";
const LOG_VAR: &str = "FISH_LOG";

/// Configuration for a [`Pipeline`](crate::Pipeline).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Event bus settings.
    pub bus: BusConfig,

    /// Intent label -> skill overrides, applied to the router at start.
    pub routes: BTreeMap<String, String>,

    /// Whether to attach the built-in echo skill.
    pub enable_echo: bool,

    /// Default log filter when `RUST_LOG` is not set.
    pub log_filter: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            bus: BusConfig::default(),
            routes: BTreeMap::new(),
            enable_echo: true,
            log_filter: "info".to_string(),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `FISH_SUBSCRIBER_TIMEOUT_MS`: per-subscriber publish timeout (default: none, `0` disables)
    /// - `FISH_ROUTES`: route overrides as `intent=skill,intent=skill` (default: none)
    /// - `FISH_ENABLE_ECHO`: attach the echo skill (default: true)
    /// - `FISH_LOG`: default log filter (default: info)
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_vars<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let default = Self::default();

        let subscriber_timeout_ms = match lookup(SUBSCRIBER_TIMEOUT_VAR) {
            Some(raw) => {
                let ms: u64 = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                    key: SUBSCRIBER_TIMEOUT_VAR.to_string(),
                    message: format!("expected milliseconds, got '{}'", raw),
                })?;
                (ms > 0).then_some(ms)
            }
            None => default.bus.subscriber_timeout_ms,
        };

        let routes = match lookup(ROUTES_VAR) {
            Some(raw) => parse_routes(&raw)?,
            None => default.routes,
        };

        let config = Self {
            bus: BusConfig {
                subscriber_timeout_ms,
            },
            routes,
            enable_echo: lookup(ENABLE_ECHO_VAR)
                .map(|s| s != "false" && s != "0")
                .unwrap_or(default.enable_echo),
            log_filter: lookup(LOG_VAR).unwrap_or(default.log_filter),
        };

        config.validate()?;
        Ok(config)
    }

    /// Check values that can be set programmatically as well as from the environment.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.log_filter.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: LOG_VAR.to_string(),
                message: "log filter must not be empty".to_string(),
            });
        }
        if self.routes.keys().any(|intent| intent.is_empty()) {
            return Err(ConfigError::InvalidValue {
                key: ROUTES_VAR.to_string(),
                message: "route intent must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

/// Parse `intent=skill,intent=skill` into a route table.
///
/// Blank entries are skipped. An empty skill is allowed and makes the router
/// drop that intent. Later entries override earlier ones.
pub fn parse_routes(spec: &str) -> ConfigResult<BTreeMap<String, String>> {
    let mut routes = BTreeMap::new();

    for entry in spec.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (intent, skill) = entry.split_once('=').ok_or_else(|| ConfigError::InvalidValue {
            key: ROUTES_VAR.to_string(),
            message: format!("expected intent=skill, got '{}'", entry),
        })?;

        let intent = intent.trim();
        if intent.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: ROUTES_VAR.to_string(),
                message: format!("missing intent in '{}'", entry),
            });
        }
        routes.insert(intent.to_string(), skill.trim().to_string());
    }

    Ok(routes)
}
