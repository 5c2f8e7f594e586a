//! Worker configuration loaded from environment variables.

use std::str::FromStr;
use std::time::Duration;

use common::Topics;
use event_bus::{ConsumerConfig, RelayConfig};

/// Shipping worker configuration.
///
/// Same variables as the order API minus the inventory settings; the
/// operator endpoints listen on `PORT` (default `3001`). `DATABASE_URL`
/// points at the shipment database and `BUS_DATABASE_URL` at the event log
/// shared with the order API.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub json_logs: bool,
    pub database_url: Option<String>,
    pub bus_database_url: Option<String>,
    pub db_max_connections: u32,
    pub db_timeout: Duration,
    pub topic_prefix: String,
    pub bus_partitions: u32,
    pub max_delivery_attempts: u32,
    pub poll_interval: Duration,
    pub relay_interval: Duration,
    pub relay_batch_size: usize,
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_millis(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .map(Duration::from_millis)
        .unwrap_or(default)
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("HOST").unwrap_or(defaults.host),
            port: env_or("PORT", defaults.port),
            log_level: std::env::var("RUST_LOG").unwrap_or(defaults.log_level),
            json_logs: std::env::var("LOG_FORMAT")
                .map(|f| f.eq_ignore_ascii_case("json"))
                .unwrap_or(false),
            database_url: std::env::var("DATABASE_URL")
                .ok()
                .filter(|url| !url.is_empty()),
            bus_database_url: std::env::var("BUS_DATABASE_URL")
                .ok()
                .filter(|url| !url.is_empty()),
            db_max_connections: env_or("DB_MAX_CONNECTIONS", defaults.db_max_connections),
            db_timeout: env_millis("DB_TIMEOUT_MS", defaults.db_timeout),
            topic_prefix: std::env::var("TOPIC_PREFIX").unwrap_or_default(),
            bus_partitions: env_or("BUS_PARTITIONS", defaults.bus_partitions),
            max_delivery_attempts: env_or("MAX_DELIVERY_ATTEMPTS", defaults.max_delivery_attempts),
            poll_interval: env_millis("POLL_INTERVAL_MS", defaults.poll_interval),
            relay_interval: env_millis("RELAY_INTERVAL_MS", defaults.relay_interval),
            relay_batch_size: env_or("RELAY_BATCH_SIZE", defaults.relay_batch_size),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Connection string of the event log: `BUS_DATABASE_URL`, or the
    /// service's own database when unset.
    pub fn bus_url(&self) -> Option<&str> {
        self.bus_database_url
            .as_deref()
            .or(self.database_url.as_deref())
    }

    pub fn topics(&self) -> Topics {
        Topics::with_prefix(&self.topic_prefix)
    }

    pub fn consumer_config(&self) -> ConsumerConfig {
        ConsumerConfig {
            poll_interval: self.poll_interval,
            max_delivery_attempts: self.max_delivery_attempts.max(1),
            ..ConsumerConfig::default()
        }
    }

    pub fn relay_config(&self) -> RelayConfig {
        RelayConfig {
            interval: self.relay_interval,
            batch_size: self.relay_batch_size.max(1),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            log_level: "info".to_string(),
            json_logs: false,
            database_url: None,
            bus_database_url: None,
            db_max_connections: 10,
            db_timeout: Duration::from_secs(5),
            topic_prefix: String::new(),
            bus_partitions: 8,
            max_delivery_attempts: 5,
            poll_interval: Duration::from_millis(200),
            relay_interval: Duration::from_millis(500),
            relay_batch_size: 100,
        }
    }
}
