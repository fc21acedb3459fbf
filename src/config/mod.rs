//! Configuration management for takatrack
//!
//! This module handles loading and validating configuration from environment variables
//! and TOML files. Command-line flags override individual values in `main.rs`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::scheduler::TriggerConfig;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server configuration
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Daily schedule generation
    pub scheduler: TriggerConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind
    pub bind_address: SocketAddr,

    /// Allow cross-origin requests from any origin
    pub enable_cors: bool,

    /// Log every request through the trace layer
    pub enable_request_logging: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([0, 0, 0, 0], 5000)),
            enable_cors: true,
            enable_request_logging: true,
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite database path
    pub sqlite_path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            sqlite_path: PathBuf::from("data/takatrack.db"),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: String::from("text"),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Self::from_lookup(|key| std::env::var(key).ok()))
    }

    /// Build configuration from an arbitrary variable source.
    ///
    /// Unset or unparsable values fall back to their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let flag = |key: &str| lookup(key).and_then(|v| parse_flag(&v));

        Self {
            server: ServerConfig {
                bind_address: parse_var(&lookup, "TAKATRACK_BIND_ADDRESS")
                    .unwrap_or(defaults.server.bind_address),
                enable_cors: flag("TAKATRACK_ENABLE_CORS").unwrap_or(defaults.server.enable_cors),
                enable_request_logging: flag("TAKATRACK_REQUEST_LOGGING")
                    .unwrap_or(defaults.server.enable_request_logging),
            },
            database: DatabaseConfig {
                sqlite_path: lookup("TAKATRACK_SQLITE_PATH")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.database.sqlite_path),
            },
            scheduler: TriggerConfig {
                enabled: flag("TAKATRACK_SCHEDULER_ENABLED").unwrap_or(defaults.scheduler.enabled),
                run_time: lookup("TAKATRACK_SCHEDULE_TIME").unwrap_or(defaults.scheduler.run_time),
                horizon_days: parse_var(&lookup, "TAKATRACK_HORIZON_DAYS")
                    .unwrap_or(defaults.scheduler.horizon_days),
                trigger_on_startup: flag("TAKATRACK_SCHEDULE_ON_STARTUP")
                    .unwrap_or(defaults.scheduler.trigger_on_startup),
            },
            logging: LoggingConfig {
                level: lookup("TAKATRACK_LOG_LEVEL").unwrap_or(defaults.logging.level),
                format: lookup("TAKATRACK_LOG_FORMAT").unwrap_or(defaults.logging.format),
            },
        }
    }

    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.database.sqlite_path.as_os_str().is_empty() {
            anyhow::bail!("sqlite_path must not be empty");
        }

        self.scheduler
            .validate()
            .context("Invalid scheduler configuration")?;

        if !matches!(
            self.logging.level.as_str(),
            "trace" | "debug" | "info" | "warn" | "error"
        ) {
            anyhow::bail!("Unknown log level '{}'", self.logging.level);
        }

        if !matches!(self.logging.format.as_str(), "text" | "json") {
            anyhow::bail!("log format must be 'text' or 'json'");
        }

        Ok(())
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|v| v.trim().parse().ok())
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.server.bind_address.port(), 5000);
        assert_eq!(config.scheduler.horizon_days, 3);
    }

    #[test]
    fn test_from_lookup_overrides() {
        let vars: HashMap<&str, &str> = [
            ("TAKATRACK_BIND_ADDRESS", "127.0.0.1:8080"),
            ("TAKATRACK_SQLITE_PATH", "/tmp/test.db"),
            ("TAKATRACK_HORIZON_DAYS", "5"),
            ("TAKATRACK_ENABLE_CORS", "off"),
            ("TAKATRACK_LOG_FORMAT", "json"),
        ]
        .into_iter()
        .collect();

        let config = Config::from_lookup(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.server.bind_address, "127.0.0.1:8080".parse().unwrap());
        assert!(!config.server.enable_cors);
        assert_eq!(config.database.sqlite_path, PathBuf::from("/tmp/test.db"));
        assert_eq!(config.scheduler.horizon_days, 5);
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_unparsable_values_fall_back() {
        let config = Config::from_lookup(|k| match k {
            "TAKATRACK_HORIZON_DAYS" => Some("soon".to_string()),
            "TAKATRACK_REQUEST_LOGGING" => Some("maybe".to_string()),
            _ => None,
        });
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_typed_values_parse_independently() {
        let config = Config::from_lookup(|k| match k {
            "TAKATRACK_BIND_ADDRESS" => Some("0.0.0.0:9090".to_string()),
            "TAKATRACK_HORIZON_DAYS" => Some(" 7 ".to_string()),
            _ => None,
        });
        assert_eq!(config.server.bind_address.port(), 9090);
        assert_eq!(config.scheduler.horizon_days, 7);

        let config = Config::from_lookup(|k| match k {
            "TAKATRACK_BIND_ADDRESS" => Some("not-an-address".to_string()),
            "TAKATRACK_HORIZON_DAYS" => Some("10".to_string()),
            _ => None,
        });
        assert_eq!(config.server.bind_address, ServerConfig::default().bind_address);
        assert_eq!(config.scheduler.horizon_days, 10);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = Config::default();
        config.logging.format = "xml".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.scheduler.run_time = "midnight".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.scheduler.horizon_days = -3;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [scheduler]
            run_time = "01:30"
            "#,
        )
        .unwrap();

        assert_eq!(config.scheduler.run_time, "01:30");
        assert_eq!(config.scheduler.horizon_days, 3);
        assert_eq!(config.server, ServerConfig::default());
    }
}
