//! Application configuration loaded from environment variables.

use std::str::FromStr;
use std::time::Duration;

use saga::contracts::{DRIVER_TRIP_RESPONSE_QUEUE, PAYMENT_TRIP_RESPONSE_QUEUE};

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format: {other}")),
        }
    }
}

/// Service configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT`: `text` or `json` (default: `text`)
/// - `DATABASE_URL`: PostgreSQL URL; unset selects the in-memory store
/// - `DRIVER_RESPONSE_QUEUE` (default: `"driver-trip-response"`)
/// - `PAYMENT_QUEUE` (default: `"payment-trip-response"`)
/// - `HANDLER_TIMEOUT_MS` (default: `5000`)
/// - `MAX_CONFLICT_ATTEMPTS` (default: `5`)
/// - `OUTBOX_RELAY_INTERVAL_MS` (default: `1000`)
/// - `OUTBOX_GRACE_MS` (default: `2000`)
///
/// Unparseable values fall back to the default.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub driver_response_queue: String,
    pub payment_queue: String,
    pub handler_timeout: Duration,
    pub max_conflict_attempts: u32,
    pub outbox_relay_interval: Duration,
    pub outbox_grace_period: Duration,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let parsed = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());
        let millis = |key: &str, default: Duration| {
            parsed(key).map(Duration::from_millis).unwrap_or(default)
        };

        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: lookup("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: lookup("LOG_FORMAT")
                .and_then(|f| f.parse().ok())
                .unwrap_or(defaults.log_format),
            database_url: lookup("DATABASE_URL").filter(|url| !url.is_empty()),
            driver_response_queue: lookup("DRIVER_RESPONSE_QUEUE")
                .unwrap_or(defaults.driver_response_queue),
            payment_queue: lookup("PAYMENT_QUEUE").unwrap_or(defaults.payment_queue),
            handler_timeout: millis("HANDLER_TIMEOUT_MS", defaults.handler_timeout),
            max_conflict_attempts: parsed("MAX_CONFLICT_ATTEMPTS")
                .and_then(|n| u32::try_from(n).ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.max_conflict_attempts),
            outbox_relay_interval: millis("OUTBOX_RELAY_INTERVAL_MS", defaults.outbox_relay_interval),
            outbox_grace_period: millis("OUTBOX_GRACE_MS", defaults.outbox_grace_period),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            database_url: None,
            driver_response_queue: DRIVER_TRIP_RESPONSE_QUEUE.to_string(),
            payment_queue: PAYMENT_TRIP_RESPONSE_QUEUE.to_string(),
            handler_timeout: saga::DEFAULT_HANDLER_TIMEOUT,
            max_conflict_attempts: domain::DEFAULT_MAX_ATTEMPTS,
            outbox_relay_interval: saga::relay::DEFAULT_RELAY_INTERVAL,
            outbox_grace_period: saga::relay::DEFAULT_GRACE_PERIOD,
        }
    }
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
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_format, LogFormat::Text);
        assert!(config.database_url.is_none());
        assert_eq!(config.driver_response_queue, "driver-trip-response");
        assert_eq!(config.payment_queue, "payment-trip-response");
        assert_eq!(config.handler_timeout, Duration::from_millis(5000));
        assert_eq!(config.max_conflict_attempts, 5);
        assert_eq!(config.outbox_relay_interval, Duration::from_millis(1000));
        assert_eq!(config.outbox_grace_period, Duration::from_millis(2000));
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("PORT", "8080"),
            ("LOG_FORMAT", "JSON"),
            ("DATABASE_URL", "postgres://localhost/trips"),
            ("DRIVER_RESPONSE_QUEUE", "drivers"),
            ("HANDLER_TIMEOUT_MS", "250"),
            ("MAX_CONFLICT_ATTEMPTS", "9"),
            ("OUTBOX_GRACE_MS", "0"),
        ]));

        assert_eq!(config.port, 8080);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(
            config.database_url.as_deref(),
            Some("postgres://localhost/trips")
        );
        assert_eq!(config.driver_response_queue, "drivers");
        assert_eq!(config.handler_timeout, Duration::from_millis(250));
        assert_eq!(config.max_conflict_attempts, 9);
        assert_eq!(config.outbox_grace_period, Duration::ZERO);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = Config::from_lookup(lookup(&[
            ("PORT", "http"),
            ("LOG_FORMAT", "yaml"),
            ("DATABASE_URL", ""),
            ("MAX_CONFLICT_ATTEMPTS", "0"),
            ("HANDLER_TIMEOUT_MS", "-1"),
        ]));

        assert_eq!(config.port, 3000);
        assert_eq!(config.log_format, LogFormat::Text);
        assert!(config.database_url.is_none());
        assert_eq!(config.max_conflict_attempts, 5);
        assert_eq!(config.handler_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_addr_formatting() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            ..Config::default()
        };
        assert_eq!(config.addr(), "127.0.0.1:8080");
    }
}
