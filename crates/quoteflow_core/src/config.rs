//! Runtime configuration for the quoting core.
//!
//! # Responsibility
//! - Describe database and logging settings in one serde model.
//! - Merge compiled defaults, an optional TOML file and `QUOTEFLOW_*`
//!   environment variables.
//!
//! # Invariants
//! - Unknown keys are rejected instead of silently ignored.
//! - A missing `database.path` means a disposable in-memory store.

use crate::logging::default_log_level;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;

const ENV_PREFIX: &str = "QUOTEFLOW_";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QuoteFlowConfig {
    /// Store connection settings.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Log backend settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Store connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    /// SQLite file path. `None` selects an in-memory database.
    #[serde(default)]
    pub path: Option<String>,
    /// How long SQLite waits on a locked database before failing.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: None,
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

/// Log backend settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// One of `trace|debug|info|warn|error`.
    #[serde(default = "default_level")]
    pub level: String,
    /// Absolute directory for rolling log files. `None` disables file logs.
    #[serde(default)]
    pub dir: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            dir: None,
        }
    }
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

fn default_level() -> String {
    default_log_level().to_string()
}

/// Configuration loading failure.
#[derive(Debug)]
pub struct ConfigError(figment::Error);

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid configuration: {}", self.0)
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.0)
    }
}

impl From<figment::Error> for ConfigError {
    fn from(value: figment::Error) -> Self {
        Self(value)
    }
}

/// Loads configuration from defaults, an optional TOML file and env vars.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `path`, when given
/// 3. `QUOTEFLOW_*` environment variables (`QUOTEFLOW_DATABASE_PATH`,
///    `QUOTEFLOW_LOGGING_LEVEL`, ...)
pub fn load_config(path: Option<&Path>) -> Result<QuoteFlowConfig, ConfigError> {
    let mut figment = Figment::new().merge(Serialized::defaults(QuoteFlowConfig::default()));
    if let Some(path) = path {
        figment = figment.merge(Toml::file(path));
    }
    Ok(figment.merge(env_provider()).extract()?)
}

/// Loads configuration from an inline TOML document without env overrides.
pub fn load_config_from_str(toml_content: &str) -> Result<QuoteFlowConfig, ConfigError> {
    Ok(Figment::new()
        .merge(Serialized::defaults(QuoteFlowConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()?)
}

fn env_provider() -> Env {
    // `map` instead of `split("_")`: keys such as `busy_timeout_ms` contain
    // underscores themselves.
    Env::prefixed(ENV_PREFIX).map(|key| {
        key.as_str()
            .replacen("database_", "database.", 1)
            .replacen("logging_", "logging.", 1)
            .into()
    })
}
