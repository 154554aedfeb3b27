use std::env;
use std::str::FromStr;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

/// Minimum JWT secret length accepted in production.
pub const MIN_PRODUCTION_SECRET_LEN: usize = 32;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub cors_origins: Vec<String>,
    /// Surface raw database messages in error bodies. Development only.
    pub expose_error_details: bool,
}

#[derive(Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub trust_cert: bool,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub pool_min: u32,
    pub pool_max: u32,
}

#[derive(Clone)]
pub struct SecurityConfig {
    pub jwt_secret: String,
    pub access_ttl_secs: u64,
    pub refresh_ttl_secs: u64,
    pub secure_cookies: bool,
}

// Credentials never reach the logs.
impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("database", &self.database)
            .field("trust_cert", &self.trust_cert)
            .field("connect_timeout", &self.connect_timeout)
            .field("request_timeout", &self.request_timeout)
            .field("pool_min", &self.pool_min)
            .field("pool_max", &self.pool_max)
            .finish_non_exhaustive()
    }
}

impl std::fmt::Debug for SecurityConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecurityConfig")
            .field("access_ttl_secs", &self.access_ttl_secs)
            .field("refresh_ttl_secs", &self.refresh_ttl_secs)
            .field("secure_cookies", &self.secure_cookies)
            .finish_non_exhaustive()
    }
}

impl AppConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup. The profile selected by
    /// `APP_ENV` supplies defaults, individual variables override them, and the
    /// required connection/secret variables must be present and non-empty.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = match lookup("APP_ENV")
            .map(|v| v.trim().to_ascii_lowercase())
            .as_deref()
        {
            None | Some("") | Some("development") | Some("dev") => Environment::Development,
            Some("staging") | Some("stage") => Environment::Staging,
            Some("production") | Some("prod") => Environment::Production,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "APP_ENV",
                    reason: format!("unknown environment '{other}'"),
                })
            }
        };

        let required = |key: &'static str| -> Result<String, ConfigError> {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or(ConfigError::Missing(key))
        };

        let defaults = Defaults::for_environment(environment);

        let database = DatabaseConfig {
            host: required("DB_HOST")?,
            port: parse_or(&lookup, "DB_PORT", 1433)?,
            user: required("DB_USER")?,
            password: required("DB_PASSWORD")?,
            database: required("DB_NAME")?,
            trust_cert: parse_or(&lookup, "DB_TRUST_CERT", true)?,
            connect_timeout: Duration::from_millis(parse_or(
                &lookup,
                "DB_CONNECT_TIMEOUT_MS",
                defaults.connect_timeout_ms,
            )?),
            request_timeout: Duration::from_millis(parse_or(
                &lookup,
                "DB_REQUEST_TIMEOUT_MS",
                defaults.request_timeout_ms,
            )?),
            pool_min: parse_or(&lookup, "DB_POOL_MIN", 0)?,
            pool_max: parse_or(&lookup, "DB_POOL_MAX", defaults.pool_max)?,
        };

        if database.pool_max == 0 {
            return Err(ConfigError::Invalid {
                key: "DB_POOL_MAX",
                reason: "must be at least 1".to_string(),
            });
        }
        if database.pool_min > database.pool_max {
            return Err(ConfigError::Invalid {
                key: "DB_POOL_MIN",
                reason: format!("must not exceed DB_POOL_MAX ({})", database.pool_max),
            });
        }

        let security = SecurityConfig {
            jwt_secret: required("JWT_SECRET")?,
            access_ttl_secs: parse_or(&lookup, "JWT_ACCESS_TTL_SECS", 60 * 60)?,
            refresh_ttl_secs: parse_or(&lookup, "JWT_REFRESH_TTL_SECS", 7 * 24 * 60 * 60)?,
            secure_cookies: parse_or(&lookup, "COOKIE_SECURE", defaults.secure_cookies)?,
        };

        if environment == Environment::Production
            && security.jwt_secret.len() < MIN_PRODUCTION_SECRET_LEN
        {
            return Err(ConfigError::Invalid {
                key: "JWT_SECRET",
                reason: format!(
                    "must be at least {} bytes in production",
                    MIN_PRODUCTION_SECRET_LEN
                ),
            });
        }

        let cors_origins = match lookup("CORS_ORIGINS") {
            Some(v) => v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            None => defaults.cors_origins,
        };

        let server = ServerConfig {
            port: parse_or(&lookup, "PORT", 5000)?,
            cors_origins,
            expose_error_details: environment == Environment::Development,
        };

        Ok(Self {
            environment,
            server,
            database,
            security,
        })
    }
}

struct Defaults {
    connect_timeout_ms: u64,
    request_timeout_ms: u64,
    pool_max: u32,
    secure_cookies: bool,
    cors_origins: Vec<String>,
}

impl Defaults {
    fn for_environment(environment: Environment) -> Self {
        match environment {
            Environment::Development => Self {
                connect_timeout_ms: 15_000,
                request_timeout_ms: 30_000,
                pool_max: 10,
                secure_cookies: false,
                cors_origins: vec![
                    "http://localhost:3000".to_string(),
                    "http://localhost:5173".to_string(),
                ],
            },
            Environment::Staging => Self {
                connect_timeout_ms: 15_000,
                request_timeout_ms: 30_000,
                pool_max: 10,
                secure_cookies: true,
                cors_origins: Vec::new(),
            },
            Environment::Production => Self {
                connect_timeout_ms: 10_000,
                request_timeout_ms: 30_000,
                pool_max: 20,
                secure_cookies: true,
                cors_origins: Vec::new(),
            },
        }
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => {
            raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
                key,
                reason: e.to_string(),
            })
        }
        _ => Ok(default),
    }
}
