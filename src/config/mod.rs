//! Configuration Module
//!
//! Provides TOML-based configuration for vibelink with support for:
//! - Logging level
//! - Metrics endpoint
//! - Bridge definitions with their links and system-specific options
//! - Environment variable substitution and overrides (VIBELINK__* prefix)

use std::collections::HashSet;
use std::path::Path;

use config::{Environment, File, FileFormat};
use regex::Regex;
use serde::Deserialize;

pub use bridge::{BridgeConfig, BridgeKind, LinkDirection, LinkRule, OptionValue};
pub use metrics::MetricsConfig;

mod bridge;
mod metrics;

/// Substitute environment variables in a string.
/// Supports `${VAR}` and `${VAR:-default}` syntax.
fn substitute_env_vars(content: &str) -> String {
    let re = Regex::new(r"\$\{([^}:]+)(?::-([^}]*))?\}").unwrap();
    re.replace_all(content, |caps: &regex::Captures| {
        let var_name = &caps[1];
        let default = caps.get(2).map(|m| m.as_str()).unwrap_or("");
        std::env::var(var_name).unwrap_or_else(|_| default.to_string())
    })
    .to_string()
}

#[cfg(test)]
mod tests;

/// Configuration error types
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading config file
    Io(std::io::Error),
    /// TOML parsing error
    Parse(toml::de::Error),
    /// Config crate error
    Config(config::ConfigError),
    /// Validation error
    Validation(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Config(e) => write!(f, "Config error: {}", e),
            ConfigError::Validation(msg) => write!(f, "Validation error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Parse(e)
    }
}

impl From<config::ConfigError> for ConfigError {
    fn from(e: config::ConfigError) -> Self {
        ConfigError::Config(e)
    }
}

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Logging configuration
    pub log: LogConfig,
    /// Metrics configuration
    pub metrics: MetricsConfig,
    /// Bridge configurations
    pub bridge: Vec<BridgeConfig>,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file with environment variable overrides.
    ///
    /// Supports two forms of environment variable usage:
    /// 1. In-file substitution: `${VAR}` or `${VAR:-default}` syntax in the TOML file
    /// 2. Override via env vars: `VIBELINK__` prefix with double underscores for nesting:
    ///    - `VIBELINK__LOG__LEVEL=debug` overrides `log.level`
    ///    - `VIBELINK__METRICS__ENABLED=true` overrides `metrics.enabled`
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder()
            .set_default("log.level", "info")?
            .set_default("metrics.enabled", false)?;

        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let substituted = substitute_env_vars(&content);
                builder = builder.add_source(File::from_str(&substituted, FileFormat::Toml));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // File doesn't exist, use defaults
            }
            Err(e) => return Err(ConfigError::Io(e)),
        }

        // Double underscore separates nested keys, single underscore preserved in field names
        let cfg = builder
            .add_source(
                Environment::with_prefix("VIBELINK")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = cfg.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a string (for testing, no env var support)
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut names = HashSet::new();

        for bridge in &self.bridge {
            if bridge.name.is_empty() {
                return Err(ConfigError::Validation(
                    "bridge name cannot be empty".to_string(),
                ));
            }
            if !names.insert(bridge.name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "duplicate bridge name '{}'",
                    bridge.name
                )));
            }
            if bridge.url.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "Bridge '{}' has an empty url",
                    bridge.name
                )));
            }
            if bridge.poll_interval.is_zero() {
                return Err(ConfigError::Validation(format!(
                    "Bridge '{}': poll_interval must be greater than zero",
                    bridge.name
                )));
            }
            if bridge.receive_timeout >= bridge.poll_interval {
                return Err(ConfigError::Validation(format!(
                    "Bridge '{}': receive_timeout must be shorter than poll_interval",
                    bridge.name
                )));
            }

            for link in &bridge.links {
                if let Err(reason) = crate::destination::validate_link_name(&link.local) {
                    return Err(ConfigError::Validation(format!(
                        "Bridge '{}': invalid local link name '{}': {}",
                        bridge.name, link.local, reason
                    )));
                }
                if link.remote_name().is_empty() {
                    return Err(ConfigError::Validation(format!(
                        "Bridge '{}': link '{}' has an empty remote name",
                        bridge.name, link.local
                    )));
                }
                if link.is_inbound() && crate::destination::is_filter(&link.local) {
                    return Err(ConfigError::Validation(format!(
                        "Bridge '{}': inbound link '{}' must name a single local destination",
                        bridge.name, link.local
                    )));
                }
                if link.is_outbound() && link.filter.is_some() {
                    return Err(ConfigError::Validation(format!(
                        "Bridge '{}': filter is only allowed on inbound links ('{}')",
                        bridge.name, link.local
                    )));
                }
            }
        }

        Ok(())
    }

    /// Bridges that will be created
    pub fn enabled_bridges(&self) -> impl Iterator<Item = &BridgeConfig> {
        self.bridge.iter().filter(|b| b.enabled)
    }
}
