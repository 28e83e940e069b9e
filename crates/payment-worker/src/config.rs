//! Application configuration loaded from environment variables.

use std::time::Duration;

use common::settings::{non_empty, parse_opt, parse_or};
use common::{ConsumerSettings, LogFormat, Money};

/// Payment service configuration.
///
/// Reads `HOST`, `PORT` (default `8082`), `RUST_LOG`, `LOG_FORMAT`,
/// `DATABASE_URL`, `KAFKA_BROKERS`, `PUBLISH_TIMEOUT_SECS`,
/// `SHUTDOWN_GRACE_SECS`, `PAYMENT_DECLINE_ABOVE` and the `CONSUMER_*`
/// settings. Unset or unparsable values fall back to the defaults.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub kafka_brokers: Option<String>,
    pub publish_timeout: Duration,
    pub shutdown_grace: Duration,
    /// Amounts above this are declined by the simulated authorizer.
    pub decline_above: Option<Money>,
    pub consumer: ConsumerSettings,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            host: non_empty(&lookup, "HOST").unwrap_or(defaults.host),
            port: parse_or(&lookup, "PORT", defaults.port),
            log_level: non_empty(&lookup, "RUST_LOG").unwrap_or(defaults.log_level),
            log_format: parse_or(&lookup, "LOG_FORMAT", defaults.log_format),
            database_url: non_empty(&lookup, "DATABASE_URL"),
            kafka_brokers: non_empty(&lookup, "KAFKA_BROKERS"),
            publish_timeout: Duration::from_secs(parse_or(
                &lookup,
                "PUBLISH_TIMEOUT_SECS",
                defaults.publish_timeout.as_secs(),
            )),
            shutdown_grace: Duration::from_secs(parse_or(
                &lookup,
                "SHUTDOWN_GRACE_SECS",
                defaults.shutdown_grace.as_secs(),
            )),
            decline_above: parse_opt::<f64>(&lookup, "PAYMENT_DECLINE_ABOVE")
                .and_then(Money::from_decimal),
            consumer: ConsumerSettings::from_lookup(&lookup),
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8082,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            database_url: None,
            kafka_brokers: None,
            publish_timeout: Duration::from_secs(5),
            shutdown_grace: Duration::from_secs(5),
            decline_above: None,
            consumer: ConsumerSettings::default(),
        }
    }
}
