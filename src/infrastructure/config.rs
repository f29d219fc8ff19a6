// src/infrastructure/config.rs
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::constants::{
    API_VERSION, BIND_ADDRESS_ENV, DEFAULT_REMOTE_URL, DEFAULT_SESSION_PORT, DEFAULT_TIMEOUT_MS,
    SESSION_IDLE_TIMEOUT_MS, SESSION_POLL_INTERVAL_MS,
};

/// TOML configuration for ankisubmit
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub collection: CollectionConfig,
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub media: MediaConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Default)]
pub struct CollectionConfig {
    /// Explicit collection.anki2 path; empty means discover from the profile
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub profile: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct RemoteConfig {
    #[serde(default = "default_url")]
    pub url: String,
    #[serde(default = "default_api_version")]
    pub api_version: u32,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default)]
    pub api_key: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct MediaConfig {
    #[serde(default = "default_timeout_ms")]
    pub fetch_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_bind_port")]
    pub bind_port: u16,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Default)]
pub struct LogConfig {
    /// Log file to append to; empty means stderr
    #[serde(default)]
    pub path: String,
}

// Default value functions
fn default_url() -> String { DEFAULT_REMOTE_URL.to_string() }
fn default_api_version() -> u32 { API_VERSION }
fn default_timeout_ms() -> u64 { DEFAULT_TIMEOUT_MS }
fn default_bind_address() -> String { "127.0.0.1".to_string() }
fn default_bind_port() -> u16 { DEFAULT_SESSION_PORT }
fn default_poll_interval_ms() -> u64 { SESSION_POLL_INTERVAL_MS }
fn default_idle_timeout_ms() -> u64 { SESSION_IDLE_TIMEOUT_MS }

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            api_version: default_api_version(),
            timeout_ms: default_timeout_ms(),
            api_key: String::new(),
        }
    }
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_ms: default_timeout_ms(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            bind_port: default_bind_port(),
            poll_interval_ms: default_poll_interval_ms(),
            idle_timeout_ms: default_idle_timeout_ms(),
        }
    }
}

impl RemoteConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl MediaConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
}

impl ServerConfig {
    /// Listen address, with the environment override applied.
    pub fn resolved_bind_address(&self) -> String {
        std::env::var(BIND_ADDRESS_ENV)
            .ok()
            .filter(|addr| !addr.is_empty())
            .unwrap_or_else(|| self.bind_address.clone())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }
}

impl LogConfig {
    pub fn file(&self) -> Option<PathBuf> {
        (!self.path.is_empty()).then(|| PathBuf::from(&self.path))
    }
}

impl Config {
    /// Load configuration from TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file {}", path.as_ref().display()))?;

        let config: Config = toml::from_str(&content)
            .context("Failed to parse TOML config")?;

        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let toml_string = toml::to_string_pretty(self)
            .context("Failed to serialize config to TOML")?;

        std::fs::write(path.as_ref(), toml_string)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Write the built-in defaults to `path`, creating missing directories.
    pub fn create_default(path: impl AsRef<Path>) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let config = Self::default();
        config.save(path)?;
        Ok(config)
    }

    /// `<config_dir>/ankisubmit/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("ankisubmit").join("config.toml"))
    }

    /// Load the explicit file if given, else the default file if present,
    /// else built-in defaults.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match Self::default_path().filter(|p| p.exists()) {
            Some(path) => {
                debug!(?path, "Loading default config file");
                Self::load(path)
            }
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn given_config_when_saving_then_writes_toml_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let config = Config::default();
        config.save(&config_path).unwrap();

        let content = fs::read_to_string(&config_path).unwrap();
        assert!(content.contains("[remote]"));
        assert!(content.contains("[server]"));
        assert_eq!(Config::load(&config_path).unwrap(), config);
    }

    #[test]
    fn given_missing_directory_when_creating_default_then_writes_loadable_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join("config.toml");

        let config = Config::create_default(&config_path).unwrap();

        assert_eq!(Config::resolve(Some(&config_path)).unwrap(), config);
    }

    #[test]
    fn given_toml_file_when_loading_then_reads_values() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("load_test.toml");

        let toml_content = r#"
[collection]
path = "/custom/collection.anki2"
profile = "User 1"

[remote]
url = "http://10.0.0.2:8765"
api_version = 5
timeout_ms = 500
api_key = "secret"

[media]
fetch_timeout_ms = 2000

[server]
bind_address = "0.0.0.0"
bind_port = 20000
poll_interval_ms = 50

[log]
path = "/tmp/ankisubmit.log"
"#;
        fs::write(&config_path, toml_content).unwrap();

        let config = Config::load(&config_path).unwrap();

        assert_eq!(config.collection.path, "/custom/collection.anki2");
        assert_eq!(config.collection.profile, "User 1");
        assert_eq!(config.remote.url, "http://10.0.0.2:8765");
        assert_eq!(config.remote.api_version, 5);
        assert_eq!(config.remote.timeout(), Duration::from_millis(500));
        assert_eq!(config.media.fetch_timeout(), Duration::from_secs(2));
        assert_eq!(config.server.bind_port, 20000);
        assert_eq!(config.log.file(), Some(PathBuf::from("/tmp/ankisubmit.log")));
    }

    #[test]
    fn given_partial_toml_when_loading_then_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("partial.toml");

        let toml_content = r#"
[remote]
api_key = "k"
"#;
        fs::write(&config_path, toml_content).unwrap();

        let config = Config::load(&config_path).unwrap();

        // Specified value
        assert_eq!(config.remote.api_key, "k");
        // Default values
        assert_eq!(config.remote.url, "http://localhost:8765");
        assert_eq!(config.remote.api_version, 6);
        assert_eq!(config.server.bind_port, 19898);
        assert_eq!(config.server.poll_interval_ms, 25);
        assert_eq!(config.log.file(), None);
    }

    #[test]
    fn given_explicit_missing_file_when_resolving_then_fails() {
        let temp_dir = TempDir::new().unwrap();

        let result = Config::resolve(Some(&temp_dir.path().join("absent.toml")));

        assert!(result.is_err());
    }

    #[test]
    fn given_invalid_toml_when_loading_then_fails() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("bad.toml");
        fs::write(&config_path, "[remote\nurl = ").unwrap();

        assert!(Config::load(&config_path).is_err());
    }
}
