// src/env.rs
use std::env;
use std::str::FromStr;
use anyhow::{Context, Result};
use dotenv::dotenv;

use crate::config::RabbitConfig;

pub const HOST_VAR: &str = "RABBITMQ_HOST";
pub const PORT_VAR: &str = "RABBITMQ_PORT";
pub const USERNAME_VAR: &str = "RABBITMQ_USERNAME";
pub const PASSWORD_VAR: &str = "RABBITMQ_PASSWORD";
pub const CONNECT_TIMEOUT_VAR: &str = "RABBITMQ_CONNECT_TIMEOUT_MS";
pub const DURABLE_VAR: &str = "RABBITMQ_DURABLE";
pub const AUTO_ACK_VAR: &str = "RABBITMQ_AUTO_ACK";
pub const AUTO_DELETE_VAR: &str = "RABBITMQ_AUTO_DELETE";
pub const MANAGEMENT_PORT_VAR: &str = "RABBITMQ_MANAGEMENT_PORT";
pub const VHOST_VAR: &str = "RABBITMQ_VHOST";

fn parsed_var<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(val) => val.trim().parse().with_context(|| format!("Invalid value for {}: {:?}", name, val)),
        Err(_) => Ok(default),
    }
}

impl RabbitConfig {
    /// Build a configuration from `RABBITMQ_*` variables, reading `.env` first.
    /// Unset variables keep their defaults; the management endpoint shares
    /// the broker host and credentials.
    pub fn from_env() -> Result<Self> {
        dotenv().ok();
        let mut config = RabbitConfig::default();

        let connection = &mut config.connection;
        connection.host = env::var(HOST_VAR).unwrap_or(connection.host.clone());
        connection.port = parsed_var(PORT_VAR, connection.port)?;
        connection.username = env::var(USERNAME_VAR).unwrap_or(connection.username.clone());
        connection.password = env::var(PASSWORD_VAR).unwrap_or(connection.password.clone());
        connection.connection_timeout_ms = parsed_var(CONNECT_TIMEOUT_VAR, connection.connection_timeout_ms)?;

        let queue = &mut config.queue;
        queue.durable = parsed_var(DURABLE_VAR, queue.durable)?;
        queue.auto_ack = parsed_var(AUTO_ACK_VAR, queue.auto_ack)?;
        queue.auto_delete = parsed_var(AUTO_DELETE_VAR, queue.auto_delete)?;

        config.management.host = config.connection.host.clone();
        config.management.username = config.connection.username.clone();
        config.management.password = config.connection.password.clone();
        config.management.port = parsed_var(MANAGEMENT_PORT_VAR, config.management.port)?;
        config.management.vhost = env::var(VHOST_VAR).ok();

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const ALL_VARS: [&str; 10] = [
        HOST_VAR, PORT_VAR, USERNAME_VAR, PASSWORD_VAR, CONNECT_TIMEOUT_VAR,
        DURABLE_VAR, AUTO_ACK_VAR, AUTO_DELETE_VAR, MANAGEMENT_PORT_VAR, VHOST_VAR,
    ];

    fn vars_with(set: &[(&'static str, &'static str)]) -> Vec<(&'static str, Option<&'static str>)> {
        ALL_VARS
            .iter()
            .map(|name| (*name, set.iter().find(|(key, _)| key == name).map(|(_, val)| *val)))
            .collect()
    }

    #[test]
    #[serial]
    fn test_config_defaults() {
        temp_env::with_vars(vars_with(&[]), || {
            let config = RabbitConfig::from_env().unwrap();
            assert_eq!(config.connection.host, "localhost");
            assert_eq!(config.connection.port, 5672);
            assert_eq!(config.connection.connection_timeout_ms, 5000);
            assert!(config.queue.auto_ack);
            assert!(!config.queue.durable);
            assert_eq!(config.management.port, 15672);
            assert_eq!(config.management.vhost, None);
        });
    }

    #[test]
    #[serial]
    fn test_config_load() {
        let vars = vars_with(&[
            (HOST_VAR, "rabbit.local"),
            (PORT_VAR, "5673"),
            (USERNAME_VAR, "user_rust"),
            (PASSWORD_VAR, "HwhYg1Lw8wUh"),
            (CONNECT_TIMEOUT_VAR, "1500"),
            (DURABLE_VAR, "true"),
            (AUTO_ACK_VAR, "false"),
            (VHOST_VAR, "vhost_rust"),
        ]);

        temp_env::with_vars(vars, || {
            let config = RabbitConfig::from_env().unwrap();
            assert_eq!(config.connection.host, "rabbit.local");
            assert_eq!(config.connection.port, 5673);
            assert_eq!(config.connection.username, "user_rust");
            assert_eq!(config.connection.password, "HwhYg1Lw8wUh");
            assert_eq!(config.connection.connection_timeout_ms, 1500);
            assert!(config.queue.durable);
            assert!(!config.queue.auto_ack);
            assert!(!config.queue.auto_delete);
            assert_eq!(config.management.host, "rabbit.local");
            assert_eq!(config.management.username, "user_rust");
            assert_eq!(config.management.vhost.as_deref(), Some("vhost_rust"));
        });
    }

    #[test]
    #[serial]
    fn test_invalid_port_is_an_error() {
        let vars = vars_with(&[(PORT_VAR, "not-a-port")]);

        temp_env::with_vars(vars, || {
            let err = RabbitConfig::from_env().unwrap_err();
            assert!(err.to_string().contains(PORT_VAR));
        });
    }
}
