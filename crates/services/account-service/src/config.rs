//! Account service configuration.

use std::env;

use common::{DatabaseConfig, ServiceConfig};

/// Account service configuration.
#[derive(Debug, Clone, Default)]
pub struct AccountServiceConfig {
    pub service: ServiceConfig,
    pub database: DatabaseConfig,
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|value| value.parse().ok())
}

impl AccountServiceConfig {
    /// Load configuration from environment variables.
    ///
    /// Unset or unparsable values fall back to the defaults.
    pub fn from_env() -> Self {
        let defaults = DatabaseConfig::default();
        let service = ServiceConfig::default();
        Self {
            service: ServiceConfig {
                service_name: env::var("SERVICE_NAME").unwrap_or(service.service_name),
                log_level: env::var("RUST_LOG").unwrap_or(service.log_level),
            },
            database: DatabaseConfig {
                url: env::var("ACCOUNT_SERVICE_DATABASE_URL")
                    .or_else(|_| env::var("DATABASE_URL"))
                    .unwrap_or(defaults.url),
                max_connections: env_parse("DATABASE_MAX_CONNECTIONS")
                    .unwrap_or(defaults.max_connections),
                min_connections: env_parse("DATABASE_MIN_CONNECTIONS")
                    .unwrap_or(defaults.min_connections),
                connect_timeout_secs: env_parse("DATABASE_CONNECT_TIMEOUT_SECS")
                    .unwrap_or(defaults.connect_timeout_secs),
                sqlx_logging: env_parse("DATABASE_SQL_LOGGING").unwrap_or(defaults.sqlx_logging),
            },
        }
    }
}
