//! Daemon configuration
//!
//! Layered: built-in defaults, then `config/herald.toml` (optional), then
//! `HERALD__SECTION__KEY` environment variables.

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File};
use serde::Deserialize;
use std::time::Duration;

const DEFAULT_CONFIG_PATH: &str = "config/herald";

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub webhook: WebhookConfig,
    pub queue: QueueConfig,
    pub scheduler: SchedulerConfig,
    pub consumer: ConsumerConfig,
}

/// JSON-RPC listener
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub rate_limit_burst: u32,
    pub rate_limit_per_sec: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// sqlx SQLite URL, e.g. `sqlite://herald.db`
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookConfig {
    /// Required, no default
    pub url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    pub name: String,
    pub poll_interval_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    pub interval_secs: u64,
    pub batch_size: u32,
    pub autostart: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConsumerConfig {
    pub max_retries: u32,
    pub autostart: bool,
}

impl AppConfig {
    /// Load from file and environment on top of the defaults
    pub fn load() -> Result<Self, ConfigError> {
        let config_path =
            std::env::var("HERALD_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

        let config = Self::defaults()?
            .add_source(File::with_name(&config_path).required(false))
            .add_source(Environment::with_prefix("HERALD").separator("__"))
            .build()?;

        Self::from_config(config)
    }

    fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 9527_i64)?
            .set_default("server.rate_limit_burst", 50_i64)?
            .set_default("server.rate_limit_per_sec", 20_i64)?
            .set_default("database.url", "sqlite://herald.db")?
            .set_default("webhook.timeout_secs", 10_i64)?
            .set_default("queue.name", "notification-retry")?
            .set_default("queue.poll_interval_ms", 500_i64)?
            .set_default("scheduler.interval_secs", 10_i64)?
            .set_default("scheduler.batch_size", 2_i64)?
            .set_default("scheduler.autostart", true)?
            .set_default("consumer.max_retries", 3_i64)?
            .set_default("consumer.autostart", true)
    }

    fn from_config(config: Config) -> Result<Self, ConfigError> {
        let app: AppConfig = config.try_deserialize()?;
        app.validate()?;
        Ok(app)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.webhook.url.trim().is_empty() {
            return Err(ConfigError::Message(
                "webhook.url is required (HERALD__WEBHOOK__URL)".to_string(),
            ));
        }
        if self.scheduler.interval_secs == 0 {
            return Err(ConfigError::Message(
                "scheduler.interval_secs must be positive".to_string(),
            ));
        }
        if self.scheduler.batch_size == 0 {
            return Err(ConfigError::Message(
                "scheduler.batch_size must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn scheduler_interval(&self) -> Duration {
        Duration::from_secs(self.scheduler.interval_secs)
    }

    pub fn webhook_timeout(&self) -> Duration {
        Duration::from_secs(self.webhook.timeout_secs)
    }

    pub fn queue_poll_interval(&self) -> Duration {
        Duration::from_millis(self.queue.poll_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    fn build(overrides: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let mut builder = AppConfig::defaults()?;
        for (key, value) in overrides {
            builder = builder.set_override(*key, *value)?;
        }
        AppConfig::from_config(builder.build()?)
    }

    #[test]
    fn test_defaults_with_webhook_url() {
        let config = build(&[("webhook.url", "http://localhost:8080/send")]).unwrap();

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 9527);
        assert_eq!(config.scheduler.batch_size, 2);
        assert_eq!(config.scheduler_interval(), Duration::from_secs(10));
        assert_eq!(config.consumer.max_retries, 3);
        assert_eq!(config.queue.name, "notification-retry");
        assert_eq!(config.queue_poll_interval(), Duration::from_millis(500));
        assert!(config.scheduler.autostart);
    }

    #[test]
    fn test_missing_webhook_url_is_fatal() {
        assert_err!(build(&[]));
        assert_err!(build(&[("webhook.url", "  ")]));
    }

    #[test]
    fn test_overrides_are_parsed() {
        let config = build(&[
            ("webhook.url", "http://hook"),
            ("server.port", "7000"),
            ("consumer.autostart", "false"),
            ("consumer.max_retries", "5"),
        ])
        .unwrap();

        assert_eq!(config.server.port, 7000);
        assert!(!config.consumer.autostart);
        assert_eq!(config.consumer.max_retries, 5);
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        assert_err!(build(&[("webhook.url", "http://hook"), ("scheduler.batch_size", "0")]));
        assert_ok!(build(&[("webhook.url", "http://hook"), ("scheduler.batch_size", "8")]));
    }
}
