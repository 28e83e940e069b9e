//! Environment settings shared by both services.

use std::str::FromStr;
use std::time::Duration;

use crate::retry::RetryPolicy;

/// Reads `key` and parses it, falling back to `default` when unset or invalid.
///
/// An invalid value is logged so a typo does not silently fall back.
pub fn parse_or<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, "ignoring invalid setting");
            default
        }),
        None => default,
    }
}

/// Reads `key` as an optional value; empty and invalid values count as unset.
pub fn parse_opt<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring invalid setting");
            None
        }
    }
}

/// Reads `key` as a non-empty string.
pub fn non_empty(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// How a consumer subscription is restarted after it fails.
///
/// Reads:
/// - `CONSUMER_MAX_RESTARTS`: restarts before giving up (default: unbounded)
/// - `CONSUMER_BACKOFF_INITIAL_MS`: first restart delay (default: `500`)
/// - `CONSUMER_BACKOFF_MAX_MS`: delay cap (default: `30000`)
#[derive(Debug, Clone, PartialEq)]
pub struct ConsumerSettings {
    pub max_restarts: Option<u32>,
    pub backoff_initial: Duration,
    pub backoff_max: Duration,
}

impl Default for ConsumerSettings {
    fn default() -> Self {
        Self {
            max_restarts: None,
            backoff_initial: Duration::from_millis(500),
            backoff_max: Duration::from_secs(30),
        }
    }
}

impl ConsumerSettings {
    pub fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            max_restarts: parse_opt(lookup, "CONSUMER_MAX_RESTARTS"),
            backoff_initial: Duration::from_millis(parse_or(
                lookup,
                "CONSUMER_BACKOFF_INITIAL_MS",
                defaults.backoff_initial.as_millis() as u64,
            )),
            backoff_max: Duration::from_millis(parse_or(
                lookup,
                "CONSUMER_BACKOFF_MAX_MS",
                defaults.backoff_max.as_millis() as u64,
            )),
        }
    }

    /// The restart policy for supervised subscriptions.
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::default()
            .with_max_retries(self.max_restarts)
            .with_delays(self.backoff_initial, self.backoff_max)
    }
}

/// Retry policy for the startup database connection: 10 attempts, 2 seconds apart.
pub fn database_connect_policy() -> RetryPolicy {
    RetryPolicy::default()
        .with_max_retries(Some(10))
        .with_delays(Duration::from_secs(2), Duration::from_secs(2))
        .with_jitter(0.0)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_parse_helpers() {
        let env = lookup(&[("A", " 42 "), ("B", "nope"), ("C", "")]);

        assert_eq!(parse_or(&env, "A", 1u32), 42);
        assert_eq!(parse_or(&env, "B", 1u32), 1);
        assert_eq!(parse_or(&env, "MISSING", 7u32), 7);
        assert_eq!(parse_opt::<u32>(&env, "A"), Some(42));
        assert_eq!(parse_opt::<u32>(&env, "B"), None);
        assert_eq!(parse_opt::<u32>(&env, "C"), None);
        assert_eq!(non_empty(&env, "C"), None);
        assert_eq!(non_empty(&env, "A"), Some("42".to_string()));
    }

    #[test]
    fn test_consumer_defaults() {
        let settings = ConsumerSettings::from_lookup(&lookup(&[]));
        assert_eq!(settings, ConsumerSettings::default());
        assert_eq!(settings.policy().max_retries, None);
    }

    #[test]
    fn test_consumer_overrides() {
        let settings = ConsumerSettings::from_lookup(&lookup(&[
            ("CONSUMER_MAX_RESTARTS", "3"),
            ("CONSUMER_BACKOFF_INITIAL_MS", "100"),
            ("CONSUMER_BACKOFF_MAX_MS", "1000"),
        ]));
        let policy = settings.policy();

        assert_eq!(policy.max_retries, Some(3));
        assert_eq!(policy.initial_delay, Duration::from_millis(100));
        assert_eq!(policy.max_delay, Duration::from_secs(1));
    }

    #[test]
    fn test_database_connect_policy() {
        let policy = database_connect_policy();
        assert_eq!(policy.max_retries, Some(10));
        assert_eq!(policy.delay_for_attempt(5), Duration::from_secs(2));
    }
}
