//! Application configuration management.
//!
//! This module handles loading and saving the connection defaults: server,
//! protocol, port, token path, last used username and session options.
//!
//! Configuration is stored at `~/.config/netmon/config.json`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::auth::manager::{DEFAULT_PORT, DEFAULT_TOKEN_PATH};
use crate::auth::{ConnectTarget, Protocol, SessionOptions};

/// Application name used for config directory paths
const APP_NAME: &str = "netmon";

/// Config file name
const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: Option<String>,
    pub protocol: Protocol,
    pub port: u16,
    pub token_path: String,
    pub last_username: Option<String>,
    pub ignore_ssl_errors: bool,
    pub probe_timeout_ms: u64,
    pub request_timeout_secs: u64,
    pub retain_credentials: bool,
}

impl Default for Config {
    fn default() -> Self {
        let options = SessionOptions::default();
        Self {
            server: None,
            protocol: Protocol::default(),
            port: DEFAULT_PORT,
            token_path: DEFAULT_TOKEN_PATH.to_string(),
            last_username: None,
            ignore_ssl_errors: options.ignore_ssl_errors,
            probe_timeout_ms: options.probe_timeout.as_millis() as u64,
            request_timeout_secs: options.request_timeout.as_secs(),
            retain_credentials: options.retain_credentials,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load from an explicit path; a missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            ignore_ssl_errors: self.ignore_ssl_errors,
            probe_timeout: Duration::from_millis(self.probe_timeout_ms),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            retain_credentials: self.retain_credentials,
        }
    }

    /// Connection target for `server`, or for the configured server.
    pub fn connect_target(&self, server: Option<&str>) -> Result<ConnectTarget> {
        let server = server
            .or(self.server.as_deref())
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("No server given; pass --server or set one in the config file"))?;
        Ok(ConnectTarget::new(server)
            .with_protocol(self.protocol)
            .with_port(self.port)
            .with_token_path(self.token_path.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_config_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("netmon-config-test-{}-{}", std::process::id(), name))
            .join(CONFIG_FILE)
    }

    #[test]
    fn defaults_match_server_defaults() {
        let config = Config::default();
        assert_eq!(config.protocol, Protocol::Https);
        assert_eq!(config.port, 9644);
        assert_eq!(config.token_path, "/api/v1/token");
        assert_eq!(config.probe_timeout_ms, 500);
        assert!(config.retain_credentials);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let path = temp_config_path("missing");
        assert_eq!(Config::load_from(&path).unwrap(), Config::default());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"server":"nms.example","protocol":"http"}"#).unwrap();
        assert_eq!(config.server.as_deref(), Some("nms.example"));
        assert_eq!(config.protocol, Protocol::Http);
        assert_eq!(config.port, 9644);
    }

    #[test]
    fn save_then_load() {
        let path = temp_config_path("save");
        let config = Config {
            server: Some("10.1.2.3".to_string()),
            port: 8443,
            last_username: Some("admin".to_string()),
            ignore_ssl_errors: true,
            ..Config::default()
        };
        config.save_to(&path).unwrap();
        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, config);
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn invalid_file_is_an_error() {
        let path = temp_config_path("invalid");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{ not json").unwrap();
        let err = Config::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn explicit_server_overrides_config() {
        let config = Config {
            server: Some("configured".to_string()),
            ..Config::default()
        };
        assert_eq!(config.connect_target(Some("flag")).unwrap().server, "flag");
        assert_eq!(config.connect_target(None).unwrap().server, "configured");
    }

    #[test]
    fn no_server_anywhere_is_an_error() {
        assert!(Config::default().connect_target(None).is_err());
    }

    #[test]
    fn session_options_follow_config() {
        let config = Config {
            probe_timeout_ms: 250,
            request_timeout_secs: 5,
            retain_credentials: false,
            ..Config::default()
        };
        let options = config.session_options();
        assert_eq!(options.probe_timeout, Duration::from_millis(250));
        assert_eq!(options.request_timeout, Duration::from_secs(5));
        assert!(!options.retain_credentials);
    }
}
