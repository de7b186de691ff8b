//! Environment-driven configuration.
//!
//! Everything is read through a lookup function so tests can feed a map instead of
//! touching the process environment. Queue names are optional here on purpose:
//! each publisher/listener asks for its own channel when it is built and fails
//! there if the name is missing.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use cook_messaging::{ChannelId, ListenerConfig, ReceiveOptions};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required configuration {0}")]
    Missing(&'static str),

    #[error("invalid value {value:?} for {var}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// What a queue is used for; each purpose has its own environment variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueuePurpose {
    ProductCreated,
    ProductUpdated,
    ProductInactivated,
    OrderStatusUpdated,
    OrderCreated,
}

impl QueuePurpose {
    pub const ALL: [QueuePurpose; 5] = [
        QueuePurpose::ProductCreated,
        QueuePurpose::ProductUpdated,
        QueuePurpose::ProductInactivated,
        QueuePurpose::OrderStatusUpdated,
        QueuePurpose::OrderCreated,
    ];

    pub fn env_var(&self) -> &'static str {
        match self {
            QueuePurpose::ProductCreated => "ORDER_PRODUCT_CREATE_QUEUE",
            QueuePurpose::ProductUpdated => "ORDER_PRODUCT_UPDATE_QUEUE",
            QueuePurpose::ProductInactivated => "ORDER_PRODUCT_DELETE_QUEUE",
            QueuePurpose::OrderStatusUpdated => "ORDER_STATUS_UPDATE_QUEUE",
            QueuePurpose::OrderCreated => "COOK_ORDER_CREATE_QUEUE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSettings {
    pub redis_url: String,
    pub base_url: Option<String>,
    pub consumer_group: String,
    pub consumer_name: String,
    pub receive: ReceiveOptions,
    pub visibility_timeout: Duration,
    pub max_receive_count: u32,
    queues: HashMap<QueuePurpose, String>,
}

impl QueueSettings {
    /// Settings for tests/dev: every queue configured under `base_url`.
    pub fn local(base_url: &str) -> Self {
        let queues = QueuePurpose::ALL
            .iter()
            .map(|p| (*p, p.env_var().to_lowercase()))
            .collect();

        Self {
            redis_url: "redis://127.0.0.1:6379".to_string(),
            base_url: Some(base_url.to_string()),
            consumer_group: "cook-service".to_string(),
            consumer_name: "cook-local".to_string(),
            receive: ReceiveOptions::default(),
            visibility_timeout: Duration::from_secs(30),
            max_receive_count: 5,
            queues,
        }
    }

    pub fn without_queue(mut self, purpose: QueuePurpose) -> Self {
        self.queues.remove(&purpose);
        self
    }

    /// Resolve `{base_url}/{queue name}`; missing pieces are a construction error.
    pub fn channel(&self, purpose: QueuePurpose) -> Result<ChannelId, ConfigError> {
        let base = self
            .base_url
            .as_deref()
            .ok_or(ConfigError::Missing("QUEUE_BASE_URL"))?;
        let name = self
            .queues
            .get(&purpose)
            .ok_or(ConfigError::Missing(purpose.env_var()))?;
        Ok(ChannelId::new(base, name))
    }

    pub fn listener_config(&self) -> ListenerConfig {
        ListenerConfig {
            max_receive_count: Some(self.max_receive_count),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub http_addr: SocketAddr,
    pub database: DatabaseConfig,
    pub queue: QueueSettings,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let http_addr = parse_or(&get, "HTTP_ADDR", "0.0.0.0:3000".parse::<SocketAddr>().ok())?;

        let url = match get("DATABASE_URL") {
            Some(url) => url,
            None => {
                let host = get("DB_HOST").ok_or(ConfigError::Missing("DATABASE_URL or DB_HOST"))?;
                let port: u16 = parse_or(&get, "DB_PORT", Some(5432))?;
                let user = get("DB_USER").unwrap_or_else(|| "postgres".to_string());
                let password = get("DB_PASSWORD").unwrap_or_default();
                let name = get("DB_NAME").unwrap_or_else(|| "tc_cook_db".to_string());
                format!("postgres://{user}:{password}@{host}:{port}/{name}")
            }
        };
        let database = DatabaseConfig {
            url,
            max_connections: parse_or(&get, "DB_MAX_CONNECTIONS", Some(10))?,
        };

        let queues = QueuePurpose::ALL
            .iter()
            .filter_map(|p| get(p.env_var()).map(|name| (*p, name)))
            .collect();

        let wait_seconds: u64 = parse_or(&get, "QUEUE_WAIT_SECONDS", Some(20))?;
        let max_messages: usize = parse_or(&get, "QUEUE_MAX_MESSAGES", Some(10))?;
        let visibility_seconds: u64 = parse_or(&get, "QUEUE_VISIBILITY_TIMEOUT_SECONDS", Some(30))?;

        let queue = QueueSettings {
            redis_url: get("REDIS_URL").unwrap_or_else(|| "redis://127.0.0.1:6379".to_string()),
            base_url: get("QUEUE_BASE_URL"),
            consumer_group: get("QUEUE_CONSUMER_GROUP").unwrap_or_else(|| "cook-service".to_string()),
            consumer_name: get("QUEUE_CONSUMER_NAME")
                .unwrap_or_else(|| format!("cook-{}", uuid::Uuid::now_v7())),
            receive: ReceiveOptions::default()
                .with_wait(Duration::from_secs(wait_seconds))
                .with_max_messages(max_messages),
            visibility_timeout: Duration::from_secs(visibility_seconds),
            max_receive_count: parse_or(&get, "QUEUE_MAX_RECEIVE_COUNT", Some(5))?,
            queues,
        };

        Ok(Self {
            http_addr,
            database,
            queue,
        })
    }
}

fn parse_or<T, G>(get: &G, var: &'static str, default: Option<T>) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(var) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            value: raw.clone(),
            reason: e.to_string(),
        }),
        None => default.ok_or(ConfigError::Missing(var)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn database_url_is_built_from_parts() {
        let config = AppConfig::from_lookup(lookup(&[("DB_HOST", "db"), ("DB_PASSWORD", "pw")])).unwrap();
        assert_eq!(config.database.url, "postgres://postgres:pw@db:5432/tc_cook_db");
        assert_eq!(config.database.max_connections, 10);
        assert_eq!(config.http_addr.port(), 3000);
    }

    #[test]
    fn missing_database_is_an_error() {
        let err = AppConfig::from_lookup(lookup(&[])).unwrap_err();
        assert_eq!(err, ConfigError::Missing("DATABASE_URL or DB_HOST"));
    }

    #[test]
    fn bad_number_is_reported_with_variable() {
        let err = AppConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://x"),
            ("QUEUE_WAIT_SECONDS", "soon"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "QUEUE_WAIT_SECONDS", .. }));
    }

    #[test]
    fn channel_joins_base_and_queue_name() {
        let config = AppConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://x"),
            ("QUEUE_BASE_URL", "cook"),
            ("ORDER_PRODUCT_CREATE_QUEUE", "product-create"),
            ("QUEUE_WAIT_SECONDS", "5"),
        ]))
        .unwrap();

        let channel = config.queue.channel(QueuePurpose::ProductCreated).unwrap();
        assert_eq!(channel.as_str(), "cook/product-create");
        assert_eq!(config.queue.receive.wait, Duration::from_secs(5));
    }

    #[test]
    fn unconfigured_queue_fails_at_channel_resolution() {
        let config = AppConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://x"),
            ("QUEUE_BASE_URL", "cook"),
        ]))
        .unwrap();

        assert_eq!(
            config.queue.channel(QueuePurpose::OrderCreated).unwrap_err(),
            ConfigError::Missing("COOK_ORDER_CREATE_QUEUE")
        );
    }

    #[test]
    fn missing_base_url_fails_every_channel() {
        let settings = QueueSettings {
            base_url: None,
            ..QueueSettings::local("unused")
        };
        assert_eq!(
            settings.channel(QueuePurpose::ProductUpdated).unwrap_err(),
            ConfigError::Missing("QUEUE_BASE_URL")
        );
    }
}
