//! Server configuration loaded from TOML, the environment and the CLI.

use derive_getters::Getters;
use derive_more::{Display, Error};
use derive_setters::Setters;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Environment variable overriding [`ServerConfig::host`].
pub const HOST_ENV: &str = "XO_HOST";
/// Environment variable overriding [`ServerConfig::port`].
pub const PORT_ENV: &str = "XO_PORT";

/// Runtime settings for the match server.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Setters, Serialize, Deserialize)]
#[setters(prefix = "with_")]
pub struct ServerConfig {
    /// Address to bind.
    #[serde(default = "default_host")]
    host: String,

    /// Port to bind.
    #[serde(default = "default_port")]
    port: u16,

    /// Messages buffered per connection before a send counts as failed.
    #[serde(default = "default_outbound_buffer")]
    outbound_buffer: usize,

    /// Seconds a match may wait for an opponent; 0 disables expiry.
    #[serde(default = "default_waiting_timeout_secs")]
    waiting_timeout_secs: u64,

    /// Seconds between expiry sweeps.
    #[serde(default = "default_sweep_interval_secs")]
    sweep_interval_secs: u64,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_outbound_buffer() -> usize {
    32
}

fn default_waiting_timeout_secs() -> u64 {
    600
}

fn default_sweep_interval_secs() -> u64 {
    30
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            outbound_buffer: default_outbound_buffer(),
            waiting_timeout_secs: default_waiting_timeout_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

impl ServerConfig {
    /// Loads configuration from a TOML file. Missing keys take defaults.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        debug!("Loading config from file");
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::new(format!("Failed to read config file: {}", e)))?;
        let config = Self::from_toml(&content)?;
        info!(host = %config.host, port = config.port, "Config loaded");
        Ok(config)
    }

    /// Parses configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)
            .map_err(|e| ConfigError::new(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads the file if given (defaults otherwise), then applies
    /// `XO_HOST` / `XO_PORT` from the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.with_overrides(|key| std::env::var(key).ok())
    }

    /// Applies host/port overrides from a variable lookup.
    pub fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(host) = lookup(HOST_ENV) {
            debug!(%host, "Host overridden from environment");
            self.host = host;
        }
        if let Some(port) = lookup(PORT_ENV) {
            self.port = port
                .trim()
                .parse()
                .map_err(|e| ConfigError::new(format!("Invalid {} {:?}: {}", PORT_ENV, port, e)))?;
            debug!(port = self.port, "Port overridden from environment");
        }
        Ok(self)
    }

    /// Rejects settings the server cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.outbound_buffer == 0 {
            return Err(ConfigError::new("outbound_buffer must be at least 1".to_string()));
        }
        if self.sweep_interval_secs == 0 {
            return Err(ConfigError::new("sweep_interval_secs must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Waiting-match expiry, or `None` when disabled.
    pub fn waiting_timeout(&self) -> Option<Duration> {
        (self.waiting_timeout_secs > 0).then(|| Duration::from_secs(self.waiting_timeout_secs))
    }

    /// Period of the expiry sweeper.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }

    /// `host:port` to bind.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Renders the configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string(self).map_err(|e| ConfigError::new(format!("Failed to render config: {}", e)))
    }
}

/// Configuration error.
#[derive(Debug, Clone, Display, Error)]
#[display("Config error: {} at {}:{}", message, file, line)]
pub struct ConfigError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl ConfigError {
    /// Creates a new configuration error with caller location tracking.
    #[track_caller]
    pub fn new(message: String) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message,
            line: loc.line(),
            file: loc.file(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = ServerConfig::from_toml("port = 9000\n").unwrap();
        assert_eq!(*config.port(), 9000);
        assert_eq!(config.host(), "127.0.0.1");
        assert_eq!(*config.outbound_buffer(), 32);
        assert_eq!(config.waiting_timeout(), Some(Duration::from_secs(600)));
    }

    #[test]
    fn test_zero_timeout_disables_expiry() {
        let config = ServerConfig::from_toml("waiting_timeout_secs = 0").unwrap();
        assert_eq!(config.waiting_timeout(), None);
    }

    #[test]
    fn test_zero_buffer_rejected() {
        let err = ServerConfig::from_toml("outbound_buffer = 0").unwrap_err();
        assert!(err.message.contains("outbound_buffer"));
        assert!(err.file.ends_with("config.rs"));
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [(HOST_ENV, "0.0.0.0"), (PORT_ENV, " 7000 ")].into();
        let config = ServerConfig::default()
            .with_overrides(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.bind_address(), "0.0.0.0:7000");
    }

    #[test]
    fn test_bad_port_override() {
        let result = ServerConfig::default()
            .with_overrides(|key| (key == PORT_ENV).then(|| "eighty".to_string()));
        assert!(result.is_err());
    }

    #[test]
    fn test_setters() {
        let config = ServerConfig::default().with_port(1234).with_host("::1".to_string());
        assert_eq!(config.bind_address(), "::1:1234");
    }
}
