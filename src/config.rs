//! Configuration module
//!
//! Reads TOML from `~/.config/texnouz-mobility/config.toml` (overridable
//! via the `MOBILITY_CONFIG` environment variable). Every section has
//! defaults so a missing file or a partial file still boots the service.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::application::gateway::CommandSettings;

/// Top-level application configuration
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub gateway: GatewayConfig,
    pub demo: DemoConfig,
    pub logging: LoggingConfig,
}

/// HTTP API and device gateway bind addresses
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// REST API host
    pub api_host: String,
    /// REST API port
    pub api_port: u16,
    /// Device WebSocket host
    pub ws_host: String,
    /// Device WebSocket port
    pub ws_port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            api_host: "0.0.0.0".to_string(),
            api_port: 8080,
            ws_host: "0.0.0.0".to_string(),
            ws_port: 9000,
        }
    }
}

impl ServerConfig {
    pub fn api_address(&self) -> String {
        format!("{}:{}", self.api_host, self.api_port)
    }

    pub fn ws_address(&self) -> String {
        format!("{}:{}", self.ws_host, self.ws_port)
    }
}

/// Device command channel tuning
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Seconds to wait for a device acknowledgement
    pub response_timeout_secs: u64,
    /// Attempts per logical command, including the first
    pub max_attempts: u32,
    /// Milliseconds of backoff before the second attempt
    pub retry_initial_delay_ms: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        let defaults = CommandSettings::default();
        Self {
            response_timeout_secs: defaults.response_timeout.as_secs(),
            max_attempts: defaults.max_attempts,
            retry_initial_delay_ms: defaults.retry_initial_delay.as_millis() as u64,
        }
    }
}

impl GatewayConfig {
    pub fn command_settings(&self) -> CommandSettings {
        CommandSettings {
            response_timeout: Duration::from_secs(self.response_timeout_secs),
            max_attempts: self.max_attempts,
            retry_initial_delay: Duration::from_millis(self.retry_initial_delay_ms),
        }
    }
}

/// Demo data seeding
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    /// Seed two lots, a small fleet and two riders when the store is empty
    pub seed: bool,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self { seed: true }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Tracing filter, e.g. "info" or "texnouz_mobility=debug,info"
    pub level: String,
    /// "text" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;

        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }
}

/// Default config file location: `<config dir>/texnouz-mobility/config.toml`.
pub fn default_config_path() -> PathBuf {
    dirs_next::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("texnouz-mobility")
        .join("config.toml")
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_every_section() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.server.api_address(), "0.0.0.0:8080");
        assert_eq!(cfg.server.ws_address(), "0.0.0.0:9000");
        assert!(cfg.demo.seed);
        assert_eq!(cfg.logging.level, "info");
        assert_eq!(cfg.gateway.max_attempts, 2);
    }

    #[test]
    fn partial_file_keeps_defaults_for_the_rest() {
        let cfg: AppConfig = toml::from_str(
            r#"
            [server]
            api_port = 3000

            [gateway]
            response_timeout_secs = 3
            "#,
        )
        .unwrap();

        assert_eq!(cfg.server.api_port, 3000);
        assert_eq!(cfg.server.api_host, "0.0.0.0");
        assert_eq!(
            cfg.gateway.command_settings().response_timeout,
            Duration::from_secs(3)
        );
        assert_eq!(cfg.gateway.command_settings().max_attempts, 2);
        assert!(cfg.demo.seed);
    }

    #[test]
    fn unknown_file_is_an_io_error() {
        let err = AppConfig::load(Path::new("/nonexistent/config.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn garbage_file_is_a_parse_error() {
        let dir = std::env::temp_dir();
        let path = dir.join("texnouz-mobility-bad-config-test.toml");
        std::fs::write(&path, "not = [valid").unwrap();

        let err = AppConfig::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));

        let _ = std::fs::remove_file(&path);
    }
}
