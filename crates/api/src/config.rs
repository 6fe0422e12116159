use std::env;
use std::str::FromStr;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} has an invalid value {value:?}")]
    Invalid { var: &'static str, value: String },
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Server host to bind to.
    pub host: String,
    /// Server port to bind to.
    pub port: u16,
    /// PostgreSQL connection URL. The in-memory store is used when unset.
    pub database_url: Option<String>,
    /// Maximum database connections in the pool.
    pub db_max_connections: u32,
    /// Minimum database connections in the pool.
    pub db_min_connections: u32,
    /// JWT signing secret.
    pub jwt_secret: String,
    /// Event bus channel capacity.
    pub event_bus_capacity: usize,
    /// Log level (e.g., "info", "debug", "trace").
    pub log_level: String,
    /// Directory of content-type schema JSON files.
    pub schema_dir: Option<String>,
    /// Locale used when a localized request names none.
    pub default_locale: String,
    /// `*` or a comma-separated list of allowed origins.
    pub cors_allow_origin: String,
}

impl AppConfig {
    /// Load configuration from environment variables with sensible defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Load configuration from any key/value source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let text = |var: &str, default: &str| lookup(var).unwrap_or_else(|| default.to_string());
        let optional = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        Ok(Self {
            host: text("HOST", "0.0.0.0"),
            port: parsed(&lookup, "PORT", 3030)?,
            database_url: optional("DATABASE_URL"),
            db_max_connections: parsed(&lookup, "DB_MAX_CONNECTIONS", 20)?,
            db_min_connections: parsed(&lookup, "DB_MIN_CONNECTIONS", 5)?,
            jwt_secret: text("JWT_SECRET", "dev-secret-change-me-in-production"),
            event_bus_capacity: parsed(&lookup, "EVENT_BUS_CAPACITY", 1024)?,
            log_level: text("LOG_LEVEL", "info"),
            schema_dir: optional("SCHEMA_DIR"),
            default_locale: text("DEFAULT_LOCALE", "en"),
            cors_allow_origin: text("CORS_ALLOW_ORIGIN", "*"),
        })
    }

    /// Build the socket address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parsed<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(var) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { var, value }),
    }
}
