//! Application configuration loaded from environment variables.

use std::time::Duration;

use common::settings::{non_empty, parse_opt, parse_or};
use common::{ConsumerSettings, LogFormat, Money};

/// Booking service configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `8081`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT`: `pretty` or `json` (default: `pretty`)
/// - `DATABASE_URL`: Postgres URL; unset keeps bookings in memory
/// - `KAFKA_BROKERS`: comma-separated brokers; unset runs the saga in-process
///   with an embedded payment processor
/// - `PUBLISH_TIMEOUT_SECS`: deadline for each publish (default: `5`)
/// - `SHUTDOWN_GRACE_SECS`: drain period on shutdown (default: `5`)
/// - `RECONCILE_INTERVAL_SECS`: republish stale PENDING bookings this often
///   (default: off)
/// - `RECONCILE_AGE_SECS`: how old a PENDING booking must be to be
///   republished (default: `300`)
/// - `PAYMENT_DECLINE_ABOVE`: embedded payments decline amounts above this
/// - `CONSUMER_*`: see [`ConsumerSettings`]
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
    pub reconcile_interval: Option<Duration>,
    pub reconcile_age: Duration,
    pub payment_decline_above: Option<Money>,
    pub consumer: ConsumerSettings,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from an arbitrary key lookup.
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
            reconcile_interval: parse_opt::<u64>(&lookup, "RECONCILE_INTERVAL_SECS")
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
            reconcile_age: Duration::from_secs(parse_or(
                &lookup,
                "RECONCILE_AGE_SECS",
                defaults.reconcile_age.as_secs(),
            )),
            payment_decline_above: parse_opt::<f64>(&lookup, "PAYMENT_DECLINE_ABOVE")
                .and_then(Money::from_decimal),
            consumer: ConsumerSettings::from_lookup(&lookup),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// True when no broker is configured and the whole saga runs in this process.
    pub fn is_standalone(&self) -> bool {
        self.kafka_brokers.is_none()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8081,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            database_url: None,
            kafka_brokers: None,
            publish_timeout: Duration::from_secs(5),
            shutdown_grace: Duration::from_secs(5),
            reconcile_interval: None,
            reconcile_age: Duration::from_secs(300),
            payment_decline_above: None,
            consumer: ConsumerSettings::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn from_pairs(pairs: &[(&str, &str)]) -> Config {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(move |key| map.get(key).cloned())
    }

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8081);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.publish_timeout, Duration::from_secs(5));
        assert_eq!(config.shutdown_grace, Duration::from_secs(5));
        assert!(config.is_standalone());
        assert!(config.reconcile_interval.is_none());
    }

    #[test]
    fn test_empty_environment_gives_defaults() {
        let config = from_pairs(&[]);
        assert_eq!(config.addr(), "0.0.0.0:8081");
        assert!(config.database_url.is_none());
        assert!(config.is_standalone());
    }

    #[test]
    fn test_overrides() {
        let config = from_pairs(&[
            ("HOST", "127.0.0.1"),
            ("PORT", "9000"),
            ("LOG_FORMAT", "json"),
            ("DATABASE_URL", "postgres://localhost/bookings"),
            ("KAFKA_BROKERS", "localhost:9092"),
            ("PUBLISH_TIMEOUT_SECS", "2"),
            ("RECONCILE_INTERVAL_SECS", "60"),
            ("RECONCILE_AGE_SECS", "120"),
            ("PAYMENT_DECLINE_ABOVE", "500.50"),
        ]);

        assert_eq!(config.addr(), "127.0.0.1:9000");
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(
            config.database_url.as_deref(),
            Some("postgres://localhost/bookings")
        );
        assert!(!config.is_standalone());
        assert_eq!(config.publish_timeout, Duration::from_secs(2));
        assert_eq!(config.reconcile_interval, Some(Duration::from_secs(60)));
        assert_eq!(config.reconcile_age, Duration::from_secs(120));
        assert_eq!(config.payment_decline_above, Some(Money::from_cents(50050)));
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = from_pairs(&[
            ("PORT", "not-a-port"),
            ("KAFKA_BROKERS", "  "),
            ("RECONCILE_INTERVAL_SECS", "0"),
        ]);
        assert_eq!(config.port, 8081);
        assert!(config.is_standalone());
        assert!(config.reconcile_interval.is_none());
    }
}
