// src/rabbitmq/management.rs
use reqwest::Url;
use serde::Deserialize;
use tracing::debug;

use crate::config::ManagementConfig;
use super::errors::{RabbitMQError, Result};

#[derive(Debug, Deserialize)]
struct QueueInfo {
    name: String,
}

/// `http://{host}:{port}/api/queues[/{vhost}]`, with the vhost escaped as a
/// single path segment (`/` becomes `%2F`).
pub fn queues_url(config: &ManagementConfig) -> Result<Url> {
    let mut url = Url::parse(&format!("http://{}:{}/api/queues", config.host, config.port))
        .map_err(|e| RabbitMQError::ManagementAddress(e.to_string()))?;

    if let Some(vhost) = &config.vhost {
        url.path_segments_mut()
            .map_err(|_| RabbitMQError::ManagementAddress("cannot take a path".to_string()))?
            .push(vhost);
    }
    Ok(url)
}

/// List queue names through the RabbitMQ management plugin.
pub async fn list_queues(config: &ManagementConfig) -> Result<Vec<String>> {
    let url = queues_url(config)?;
    debug!("Listing queues from {}", url);

    let queues: Vec<QueueInfo> = reqwest::Client::new()
        .get(url)
        .basic_auth(&config.username, Some(&config.password))
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    Ok(queues.into_iter().map(|queue| queue.name).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queues_url_without_vhost() {
        let url = queues_url(&ManagementConfig::default()).unwrap();
        assert_eq!(url.as_str(), "http://localhost:15672/api/queues");
    }

    #[test]
    fn test_default_vhost_is_escaped() {
        let config = ManagementConfig { vhost: Some("/".to_string()), ..ManagementConfig::default() };
        let url = queues_url(&config).unwrap();
        assert_eq!(url.as_str(), "http://localhost:15672/api/queues/%2F");
    }

    #[test]
    fn test_named_vhost() {
        let config = ManagementConfig {
            host: "rabbit".to_string(),
            port: 8080,
            vhost: Some("vhost_rust".to_string()),
            ..ManagementConfig::default()
        };
        let url = queues_url(&config).unwrap();
        assert_eq!(url.as_str(), "http://rabbit:8080/api/queues/vhost_rust");
    }

    #[test]
    fn test_queue_listing_ignores_extra_fields() {
        let body = r#"[{"name": "test", "messages": 3, "vhost": "/"}, {"name": "orders"}]"#;
        let queues: Vec<QueueInfo> = serde_json::from_str(body).unwrap();
        let names: Vec<String> = queues.into_iter().map(|queue| queue.name).collect();
        assert_eq!(names, vec!["test", "orders"]);
    }
}
