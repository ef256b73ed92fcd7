// src/config.rs
use std::path::{Path, PathBuf};
use std::fs;
use std::time::Duration;
use anyhow::{Result, Context, anyhow};
use lapin::uri::{AMQPAuthority, AMQPUri, AMQPUserInfo};
use serde::{Deserialize, Serialize};
use tracing::{info, debug};

pub const CONFIG_FILE_NAME: &str = "rabbitmq_sdk.json";

// Configuration structures
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RabbitConfig {
    #[serde(default)]
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub queue: QueueOptions,
    #[serde(default)]
    pub management: ManagementConfig,
}

/// Broker address and credentials.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_username")]
    pub username: String,
    #[serde(default = "default_password")]
    pub password: String,
    #[serde(default = "default_timeout")]
    pub connection_timeout_ms: u64,
}

/// Flags applied to every queue declaration, publish and consume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueOptions {
    /// Queues survive a broker restart and messages are published persistent.
    #[serde(default)]
    pub durable: bool,
    /// Deliveries are acknowledged by the broker as soon as they are sent.
    #[serde(default = "default_auto_ack")]
    pub auto_ack: bool,
    /// Queues are removed once their last consumer goes away.
    #[serde(default)]
    pub auto_delete: bool,
}

/// HTTP management plugin endpoint, used only for listing queues.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManagementConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_management_port")]
    pub port: u16,
    #[serde(default = "default_username")]
    pub username: String,
    #[serde(default = "default_password")]
    pub password: String,
    #[serde(default)]
    pub vhost: Option<String>,
}

// Default values
fn default_host() -> String { "localhost".to_string() }
fn default_port() -> u16 { 5672 }
fn default_management_port() -> u16 { 15672 }
fn default_username() -> String { "guest".to_string() }
fn default_password() -> String { "guest".to_string() }
fn default_timeout() -> u64 { 5000 }
fn default_auto_ack() -> bool { true }

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            username: default_username(),
            password: default_password(),
            connection_timeout_ms: default_timeout(),
        }
    }
}

impl Default for QueueOptions {
    fn default() -> Self {
        Self {
            durable: false,
            auto_ack: default_auto_ack(),
            auto_delete: false,
        }
    }
}

impl Default for ManagementConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_management_port(),
            username: default_username(),
            password: default_password(),
            vhost: None,
        }
    }
}

impl ConnectionConfig {
    pub fn new(host: &str, port: u16, username: &str, password: &str) -> Self {
        Self {
            host: host.to_string(),
            port,
            username: username.to_string(),
            password: password.to_string(),
            ..Self::default()
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connection_timeout_ms)
    }

    /// AMQP URI for the default vhost. Built field by field so credentials
    /// never need percent-encoding.
    pub fn amqp_uri(&self) -> AMQPUri {
        AMQPUri {
            authority: AMQPAuthority {
                userinfo: AMQPUserInfo {
                    username: self.username.clone(),
                    password: self.password.clone(),
                },
                host: self.host.clone(),
                port: self.port,
            },
            ..AMQPUri::default()
        }
    }

    /// Address safe to log: no password.
    pub fn redacted_address(&self) -> String {
        format!("amqp://{}@{}:{}", self.username, self.host, self.port)
    }
}

impl QueueOptions {
    /// AMQP delivery mode for published messages, when one is forced.
    pub fn delivery_mode(&self) -> Option<u8> {
        if self.durable { Some(2) } else { None }
    }

    /// Prefetch applied by blocking consumers. Only manual-ack consumers are
    /// bounded; the broker ignores QoS for auto-ack deliveries.
    pub fn consumer_prefetch(&self) -> Option<u16> {
        if self.auto_ack { None } else { Some(1) }
    }
}

impl RabbitConfig {
    pub fn validate(&self) -> Result<()> {
        if self.connection.host.is_empty() {
            return Err(anyhow!("Configuration error: connection.host cannot be empty"));
        }
        if self.management.host.is_empty() {
            return Err(anyhow!("Configuration error: management.host cannot be empty"));
        }
        Ok(())
    }
}

// Configuration loading and management functions
pub fn find_config_file() -> Result<PathBuf> {
    let alternative = Path::new("config").join(CONFIG_FILE_NAME);
    let locations = [
        ("Current directory", PathBuf::from(CONFIG_FILE_NAME)),
        ("Current directory (alternative)", alternative),
    ];

    for (location_name, path) in locations.iter() {
        if path.exists() {
            debug!("Found config file in {}: {}", location_name, path.display());
            return Ok(path.clone());
        }
    }

    if let Some(home_dir) = home::home_dir() {
        let home_config = home_dir.join(format!(".{}", CONFIG_FILE_NAME));
        if home_config.exists() {
            debug!("Found config file in home directory: {}", home_config.display());
            return Ok(home_config);
        }
    }

    Err(anyhow!("Could not find {} configuration file. \
        Please create one in the current directory, ./config or your home directory.",
        CONFIG_FILE_NAME))
}

pub fn load_config() -> Result<RabbitConfig> {
    let config_path = find_config_file()?;
    load_config_from(&config_path)
}

pub fn load_config_from(config_path: &Path) -> Result<RabbitConfig> {
    let config_content = fs::read_to_string(config_path)
        .context(format!("Failed to read config file at {}", config_path.display()))?;

    let config: RabbitConfig = serde_json::from_str(&config_content)
        .context("Configuration file contains invalid JSON")?;

    config.validate()?;
    Ok(config)
}

pub fn create_default_config_file(path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(&RabbitConfig::default())
        .context("Failed to serialize default configuration")?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)
                .context(format!("Failed to create directory at {}", parent.display()))?;
        }
    }

    fs::write(path, json)
        .context(format!("Failed to write configuration to {}", path.display()))?;

    info!("Created default configuration file at: {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lapin::uri::AMQPScheme;

    #[test]
    fn test_defaults_match_local_broker() {
        let config = RabbitConfig::default();
        assert_eq!(config.connection.host, "localhost");
        assert_eq!(config.connection.port, 5672);
        assert_eq!(config.connection.username, "guest");
        assert_eq!(config.connection.connect_timeout(), Duration::from_millis(5000));
        assert_eq!(config.queue, QueueOptions { durable: false, auto_ack: true, auto_delete: false });
        assert_eq!(config.management.port, 15672);
        assert_eq!(config.management.vhost, None);
    }

    #[test]
    fn test_amqp_uri_keeps_raw_credentials() {
        let config = ConnectionConfig::new("broker.internal", 5673, "user@corp", "p@ss/word:1");
        let uri = config.amqp_uri();
        assert!(matches!(uri.scheme, AMQPScheme::AMQP));
        assert_eq!(uri.authority.host, "broker.internal");
        assert_eq!(uri.authority.port, 5673);
        assert_eq!(uri.authority.userinfo.username, "user@corp");
        assert_eq!(uri.authority.userinfo.password, "p@ss/word:1");
        assert_eq!(uri.vhost, "/");
    }

    #[test]
    fn test_redacted_address_hides_password() {
        let config = ConnectionConfig::new("localhost", 5672, "guest", "secret");
        let address = config.redacted_address();
        assert_eq!(address, "amqp://guest@localhost:5672");
        assert!(!address.contains("secret"));
    }

    #[test]
    fn test_durable_forces_persistent_delivery() {
        let durable = QueueOptions { durable: true, ..QueueOptions::default() };
        assert_eq!(durable.delivery_mode(), Some(2));
        assert_eq!(QueueOptions::default().delivery_mode(), None);
    }

    #[test]
    fn test_only_manual_ack_consumers_get_a_prefetch() {
        let manual = QueueOptions { auto_ack: false, ..QueueOptions::default() };
        assert_eq!(manual.consumer_prefetch(), Some(1));
        assert_eq!(QueueOptions::default().consumer_prefetch(), None);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let json = r#"{ "connection": { "host": "rabbit", "password": "pw" }, "queue": { "durable": true } }"#;
        let config: RabbitConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.connection.host, "rabbit");
        assert_eq!(config.connection.port, 5672);
        assert_eq!(config.connection.password, "pw");
        assert!(config.queue.durable);
        assert!(config.queue.auto_ack);
        assert_eq!(config.management, ManagementConfig::default());
    }

    #[test]
    fn test_default_config_file_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE_NAME);

        create_default_config_file(&path).unwrap();
        let loaded = load_config_from(&path).unwrap();
        assert_eq!(loaded, RabbitConfig::default());
    }

    #[test]
    fn test_empty_host_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, r#"{ "connection": { "host": "" } }"#).unwrap();

        let err = load_config_from(&path).unwrap_err();
        assert!(err.to_string().contains("connection.host"));
    }

    #[test]
    fn test_invalid_json_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "{ connection: ").unwrap();

        assert!(load_config_from(&path).is_err());
    }
}
