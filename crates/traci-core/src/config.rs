//! Persistent client configuration.
//!
//! Stored in `~/.traci/config.json`. Every field is optional in the file;
//! missing fields take their defaults.
//!
//! # Example
//!
//! ```no_run
//! use traci_core::config::ClientConfig;
//!
//! // Load (returns defaults if file doesn't exist)
//! let config = ClientConfig::load();
//! println!("simulator at {}:{}", config.host, config.port);
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::protocol::DEFAULT_MAX_FRAME_SIZE;

const CONFIG_FILENAME: &str = "config.json";

/// What a shared client does when a request arrives while another is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BusyPolicy {
    /// Wait until the outstanding request completes.
    #[default]
    Queue,
    /// Fail immediately with [`ClientError::Busy`](crate::client::ClientError::Busy).
    Reject,
}

/// Connection and framing settings for a [`SimClient`](crate::client::SimClient).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Simulator host name or address.
    pub host: String,
    /// Simulator control port.
    pub port: u16,
    /// Timeout for establishing the TCP connection.
    pub connect_timeout_ms: u64,
    /// Timeout for a single response frame.
    pub read_timeout_ms: u64,
    /// Largest frame accepted in either direction.
    pub max_frame_size: u32,
    /// Behaviour of a shared handle under concurrent use.
    pub busy_policy: BusyPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8813,
            connect_timeout_ms: 5_000,
            read_timeout_ms: 30_000,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            busy_policy: BusyPolicy::Queue,
        }
    }
}

/// Returns the traci directory path (`~/.traci/`).
///
/// Falls back to the current directory when no home directory is known.
pub fn traci_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".traci")
}

impl ClientConfig {
    /// Load config from `~/.traci/config.json`.
    ///
    /// Returns [`Default`] if the file does not exist or cannot be parsed.
    pub fn load() -> Self {
        Self::load_from(&traci_dir().join(CONFIG_FILENAME)).unwrap_or_default()
    }

    /// Load config from an explicit path.
    pub fn load_from(path: &Path) -> std::io::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    /// Save config to `~/.traci/config.json`, creating the directory.
    pub fn save(&self) -> std::io::Result<()> {
        let dir = traci_dir();
        std::fs::create_dir_all(&dir)?;
        self.save_to(&dir.join(CONFIG_FILENAME))
    }

    /// Save config to an explicit path.
    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, json)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// Resolve `host:port` to the first matching socket address.
    pub async fn resolve(&self) -> std::io::Result<SocketAddr> {
        let host_port = format!("{}:{}", self.host, self.port);
        let addr = tokio::net::lookup_host(&host_port).await?.next();
        addr.ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("could not resolve {host_port}"),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_targets_localhost() {
        let config = ClientConfig::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8813);
        assert_eq!(config.busy_policy, BusyPolicy::Queue);
        assert_eq!(config.read_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn roundtrip_serialization() {
        let config = ClientConfig {
            host: "sim.local".into(),
            port: 9999,
            busy_policy: BusyPolicy::Reject,
            ..ClientConfig::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let loaded: ClientConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn deserialize_partial_json() {
        let loaded: ClientConfig =
            serde_json::from_str(r#"{"port": 1234, "busy_policy": "reject"}"#).unwrap();
        assert_eq!(loaded.port, 1234);
        assert_eq!(loaded.busy_policy, BusyPolicy::Reject);
        assert_eq!(loaded.host, "127.0.0.1");
    }

    #[test]
    fn save_and_load_explicit_path() {
        let path = std::env::temp_dir().join(format!("traci-config-{}.json", std::process::id()));
        let config = ClientConfig {
            read_timeout_ms: 250,
            ..ClientConfig::default()
        };
        config.save_to(&path).unwrap();
        let loaded = ClientConfig::load_from(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded, config);
    }

    #[test]
    fn load_from_missing_file_fails() {
        let path = std::env::temp_dir().join("traci-config-does-not-exist.json");
        assert!(ClientConfig::load_from(&path).is_err());
    }

    #[tokio::test]
    async fn resolve_localhost() {
        let config = ClientConfig {
            port: 4000,
            ..ClientConfig::default()
        };
        let addr = config.resolve().await.unwrap();
        assert_eq!(addr.port(), 4000);
        assert!(addr.ip().is_loopback());
    }

    #[tokio::test]
    async fn resolve_numeric_host() {
        let config = ClientConfig {
            host: "127.0.0.1".into(),
            port: 8813,
            ..ClientConfig::default()
        };
        let addr = config.resolve().await.unwrap();
        assert_eq!(addr, SocketAddr::from(([127, 0, 0, 1], 8813)));
    }
}
