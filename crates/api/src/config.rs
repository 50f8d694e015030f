//! Service configuration loaded from environment variables.

use std::time::Duration;

/// Default store service port.
pub const STORE_PORT: u16 = 8080;
/// Default delivery service port.
pub const DELIVERY_PORT: u16 = 8081;
/// Default order service port.
pub const ORDER_PORT: u16 = 8082;

/// Service configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: the service's own port)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `DATABASE_URL`: PostgreSQL URL; unset runs the ledger in memory
/// - `SEED_SLOTS`: slots seeded into an empty ledger (default: `10`)
/// - `RESERVATION_TTL_SECS`: reservation lease (default: `30`)
/// - `SWEEP_INTERVAL_SECS`: lease sweep period (default: `5`)
/// - `STORE_URL` / `DELIVERY_URL`: peers of the order service
/// - `REQUEST_TIMEOUT_MS`: deadline for each peer call (default: `5000`)
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database_url: Option<String>,
    pub seed_slots: usize,
    pub reservation_ttl: Duration,
    pub sweep_interval: Duration,
    pub store_url: String,
    pub delivery_url: String,
    pub request_timeout: Duration,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env(default_port: u16) -> Self {
        Self::from_lookup(default_port, |key| std::env::var(key).ok())
    }

    /// Loads configuration from an arbitrary key lookup.
    pub fn from_lookup(default_port: u16, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::with_port(default_port);
        let parsed = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());

        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: lookup("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            database_url: lookup("DATABASE_URL").filter(|url| !url.is_empty()),
            seed_slots: parsed("SEED_SLOTS")
                .map(|n| n as usize)
                .unwrap_or(defaults.seed_slots),
            reservation_ttl: parsed("RESERVATION_TTL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.reservation_ttl),
            sweep_interval: parsed("SWEEP_INTERVAL_SECS")
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.sweep_interval),
            store_url: lookup("STORE_URL").unwrap_or(defaults.store_url),
            delivery_url: lookup("DELIVERY_URL").unwrap_or(defaults.delivery_url),
            request_timeout: parsed("REQUEST_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.request_timeout),
        }
    }

    /// Default configuration listening on `port`.
    pub fn with_port(port: u16) -> Self {
        Self {
            port,
            ..Self::default()
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
            port: ORDER_PORT,
            log_level: "info".to_string(),
            database_url: None,
            seed_slots: 10,
            reservation_ttl: Duration::from_secs(30),
            sweep_interval: Duration::from_secs(5),
            store_url: format!("http://localhost:{STORE_PORT}"),
            delivery_url: format!("http://localhost:{DELIVERY_PORT}"),
            request_timeout: Duration::from_millis(5000),
        }
    }
}
