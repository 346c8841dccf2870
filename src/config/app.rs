//! Main application configuration
//!
//! Configuration comes from defaults, an optional TOML file, environment
//! variables and finally command-line overrides, in that order.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceSettings,
    pub game: GameSettings,
}

/// Service-level settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Service name for logging and metrics
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Address the HTTP and WebSocket listener binds to
    pub host: String,
    pub http_port: u16,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,
}

/// Game-specific settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameSettings {
    /// Longest display name accepted in `findgame`, in characters
    pub max_name_length: usize,
    /// Send `moverejected` to the mover instead of dropping invalid moves silently
    pub notify_rejected_moves: bool,
    /// Interval between WebSocket keepalive pings
    pub keepalive_interval_seconds: u64,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: "tictac-room".to_string(),
            log_level: "info".to_string(),
            host: "0.0.0.0".to_string(),
            http_port: 3000,
            shutdown_timeout_seconds: 30,
        }
    }
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            max_name_length: 32,
            notify_rejected_moves: false,
            keepalive_interval_seconds: 30,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables with fallback to defaults
    pub fn from_env() -> Result<Self> {
        let config = Self::default().with_overrides(|key| env::var(key).ok())?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Load a TOML file, then apply environment overrides on top
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = Self::from_toml_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?
            .with_overrides(|key| env::var(key).ok())?;

        validate_config(&config)?;
        Ok(config)
    }

    /// Parse configuration from TOML text; missing keys keep their defaults
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Apply overrides from a variable lookup such as the process environment
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Service settings
        if let Some(name) = lookup("SERVICE_NAME") {
            self.service.name = name;
        }
        if let Some(log_level) = lookup("LOG_LEVEL") {
            self.service.log_level = log_level;
        }
        if let Some(host) = lookup("HTTP_HOST") {
            self.service.host = host;
        }
        if let Some(port) = lookup("HTTP_PORT") {
            self.service.http_port = port
                .parse()
                .map_err(|_| anyhow!("Invalid HTTP_PORT value: {}", port))?;
        }
        if let Some(timeout) = lookup("SHUTDOWN_TIMEOUT_SECONDS") {
            self.service.shutdown_timeout_seconds = timeout
                .parse()
                .map_err(|_| anyhow!("Invalid SHUTDOWN_TIMEOUT_SECONDS value: {}", timeout))?;
        }

        // Game settings
        if let Some(max_name) = lookup("MAX_NAME_LENGTH") {
            self.game.max_name_length = max_name
                .parse()
                .map_err(|_| anyhow!("Invalid MAX_NAME_LENGTH value: {}", max_name))?;
        }
        if let Some(notify) = lookup("NOTIFY_REJECTED_MOVES") {
            self.game.notify_rejected_moves = notify
                .parse()
                .map_err(|_| anyhow!("Invalid NOTIFY_REJECTED_MOVES value: {}", notify))?;
        }
        if let Some(keepalive) = lookup("KEEPALIVE_INTERVAL_SECONDS") {
            self.game.keepalive_interval_seconds = keepalive
                .parse()
                .map_err(|_| anyhow!("Invalid KEEPALIVE_INTERVAL_SECONDS value: {}", keepalive))?;
        }

        Ok(self)
    }

    /// Socket address for the HTTP listener
    pub fn bind_address(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.service.host, self.service.http_port)
            .parse()
            .map_err(|_| {
                anyhow!(
                    "Invalid listen address: {}:{}",
                    self.service.host,
                    self.service.http_port
                )
            })
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.service.shutdown_timeout_seconds)
    }

    /// Get keepalive interval as Duration
    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_secs(self.game.keepalive_interval_seconds)
    }
}

/// Validate configuration values
pub fn validate_config(config: &AppConfig) -> Result<()> {
    // Validate log level
    match config.service.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => return Err(anyhow!("Invalid log level: {}", config.service.log_level)),
    }

    if config.service.name.is_empty() {
        return Err(anyhow!("Service name cannot be empty"));
    }

    // Validate listener
    if config.service.http_port == 0 {
        return Err(anyhow!("HTTP port cannot be 0"));
    }
    config.bind_address()?;

    // Validate timeouts
    if config.service.shutdown_timeout_seconds == 0 {
        return Err(anyhow!("Shutdown timeout must be greater than 0"));
    }
    if config.game.keepalive_interval_seconds == 0 {
        return Err(anyhow!("Keepalive interval must be greater than 0"));
    }

    // Validate game settings
    if config.game.max_name_length == 0 {
        return Err(anyhow!("Max name length must be greater than 0"));
    }

    Ok(())
}
