use std::str::FromStr;

use axum::http::HeaderValue;
use chrono::Duration;
use proposta_core::rate_limit::{
    RateLimitConfig, DEFAULT_LOCKOUT_BASE_MS, DEFAULT_LOCKOUT_MAX_MS, DEFAULT_MAX_ATTEMPTS,
    DEFAULT_WINDOW_MS, MAX_CONFIGURED_DURATION_MS,
};

use crate::auth::jwt::JwtConfig;
use crate::auth::password::PasswordConfig;

/// Source of configuration values, keyed by variable name.
///
/// Production passes the process environment; tests pass a closure over a
/// fixed map.
pub type EnvLookup<'a> = &'a dyn Fn(&str) -> Option<String>;

/// A configuration value is absent or malformed. Fatal at boot.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{key} has an invalid value: {value:?}")]
    Invalid { key: &'static str, value: String },
}

/// Server configuration loaded from environment variables.
///
/// All fields except the JWT secret have defaults suitable for local
/// development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3333`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Graceful shutdown timeout in seconds (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// Token signing secret and lifetime.
    pub jwt: JwtConfig,
    /// Work factor for new password hashes.
    pub password: PasswordConfig,
    /// Brute-force protection tunables.
    pub rate_limit: RateLimitConfig,
    /// Self-registration gating.
    pub registration: RegistrationConfig,
}

/// Who may call the registration endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrationConfig {
    /// `APP_ENV` (or `NODE_ENV`) is `production`.
    pub production: bool,
    /// `ALLOW_PUBLIC_REGISTER=true`.
    pub allow_public: bool,
    /// `REGISTER_INVITE_TOKEN`, when set.
    pub invite_token: Option<String>,
}

impl RegistrationConfig {
    /// Registration is closed outright: production with neither public
    /// registration nor an invite token.
    pub fn is_disabled(&self) -> bool {
        self.production && !self.allow_public && self.invite_token.is_none()
    }

    /// The token callers must present, if any.
    pub fn required_invite(&self) -> Option<&str> {
        if self.allow_public {
            None
        } else {
            self.invite_token.as_deref()
        }
    }
}

/// Connection settings for the binaries that talk to Postgres.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl DatabaseConfig {
    /// | Env Var                                | Required | Default |
    /// |----------------------------------------|----------|---------|
    /// | `DATABASE_URL`                         | **yes**  | --      |
    /// | `DB_MAX_CONNECTIONS` / `DB_CONN_LIMIT` | no       | `10`    |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }

    /// Same as [`DatabaseConfig::from_env`] with an arbitrary value source.
    /// Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let non_blank = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let lookup: EnvLookup<'_> = &non_blank;

        let url = lookup("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;
        let key = if lookup("DB_MAX_CONNECTIONS").is_some() {
            "DB_MAX_CONNECTIONS"
        } else {
            "DB_CONN_LIMIT"
        };
        let max_connections = parse_var(lookup, key, proposta_db::DEFAULT_MAX_CONNECTIONS)?;
        if max_connections == 0 {
            return Err(ConfigError::Invalid {
                key,
                value: "0".into(),
            });
        }
        Ok(Self {
            url,
            max_connections,
        })
    }
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                           | Default                 |
    /// |-----------------------------------|-------------------------|
    /// | `HOST`                            | `0.0.0.0`               |
    /// | `PORT`                            | `3333`                  |
    /// | `CORS_ORIGINS`                    | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`            | `30`                    |
    /// | `SHUTDOWN_TIMEOUT_SECS`           | `30`                    |
    /// | `AUTH_RATE_LIMIT_WINDOW_MS`       | `900000`                |
    /// | `AUTH_RATE_LIMIT_MAX_ATTEMPTS`    | `5`                     |
    /// | `AUTH_RATE_LIMIT_LOCKOUT_BASE_MS` | `300000`                |
    /// | `AUTH_RATE_LIMIT_LOCKOUT_MAX_MS`  | `3600000`               |
    /// | `AUTH_RATE_LIMIT_TEST_MODE`       | `false`                 |
    /// | `APP_ENV` / `NODE_ENV`            | `development`           |
    /// | `ALLOW_PUBLIC_REGISTER`           | `false`                 |
    /// | `REGISTER_INVITE_TOKEN`           | unset                   |
    ///
    /// Token and password settings are documented on [`JwtConfig`] and
    /// [`PasswordConfig`]. Blank values count as unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }

    /// Same as [`ServerConfig::from_env`] with an arbitrary value source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let non_blank = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let lookup: EnvLookup<'_> = &non_blank;

        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port = parse_var(lookup, "PORT", 3333_u16)?;

        let cors_origins: Vec<String> = lookup("CORS_ORIGINS")
            .unwrap_or_else(|| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if let Some(bad) = cors_origins
            .iter()
            .find(|origin| HeaderValue::from_str(origin).is_err())
        {
            return Err(ConfigError::Invalid {
                key: "CORS_ORIGINS",
                value: bad.clone(),
            });
        }

        let request_timeout_secs = parse_var(lookup, "REQUEST_TIMEOUT_SECS", 30_u64)?;
        let shutdown_timeout_secs = parse_var(lookup, "SHUTDOWN_TIMEOUT_SECS", 30_u64)?;

        Ok(Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            jwt: JwtConfig::from_lookup(lookup)?,
            password: PasswordConfig::from_lookup(lookup)?,
            rate_limit: rate_limit_from_lookup(lookup)?,
            registration: registration_from_lookup(lookup)?,
        })
    }
}

fn rate_limit_from_lookup(lookup: EnvLookup<'_>) -> Result<RateLimitConfig, ConfigError> {
    let window_ms = parse_positive_ms(lookup, "AUTH_RATE_LIMIT_WINDOW_MS", DEFAULT_WINDOW_MS)?;
    let base_ms = parse_positive_ms(
        lookup,
        "AUTH_RATE_LIMIT_LOCKOUT_BASE_MS",
        DEFAULT_LOCKOUT_BASE_MS,
    )?;
    let max_ms = parse_positive_ms(lookup, "AUTH_RATE_LIMIT_LOCKOUT_MAX_MS", DEFAULT_LOCKOUT_MAX_MS)?;

    let max_attempts = parse_var(lookup, "AUTH_RATE_LIMIT_MAX_ATTEMPTS", DEFAULT_MAX_ATTEMPTS)?;
    if max_attempts == 0 {
        return Err(ConfigError::Invalid {
            key: "AUTH_RATE_LIMIT_MAX_ATTEMPTS",
            value: "0".into(),
        });
    }

    Ok(RateLimitConfig {
        window: Duration::milliseconds(window_ms),
        max_attempts,
        lockout_base: Duration::milliseconds(base_ms),
        lockout_max: Duration::milliseconds(max_ms),
        test_mode: parse_bool(lookup, "AUTH_RATE_LIMIT_TEST_MODE")?,
    })
}

fn registration_from_lookup(lookup: EnvLookup<'_>) -> Result<RegistrationConfig, ConfigError> {
    let environment = lookup("APP_ENV")
        .or_else(|| lookup("NODE_ENV"))
        .unwrap_or_default();

    Ok(RegistrationConfig {
        production: environment.trim().eq_ignore_ascii_case("production"),
        allow_public: parse_bool(lookup, "ALLOW_PUBLIC_REGISTER")?,
        invite_token: lookup("REGISTER_INVITE_TOKEN").map(|token| token.trim().to_string()),
    })
}

/// Process environment lookup. Blank values count as unset.
pub fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
}

/// Parse `key` as `T`, falling back to `default` when unset.
pub(crate) fn parse_var<T: FromStr>(
    lookup: EnvLookup<'_>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
    }
}

/// Milliseconds in `1..=MAX_CONFIGURED_DURATION_MS`.
fn parse_positive_ms(
    lookup: EnvLookup<'_>,
    key: &'static str,
    default: i64,
) -> Result<i64, ConfigError> {
    let value = parse_var(lookup, key, default)?;
    if value <= 0 || value > MAX_CONFIGURED_DURATION_MS {
        return Err(ConfigError::Invalid {
            key,
            value: value.to_string(),
        });
    }
    Ok(value)
}

/// `true`/`1`/`yes` and `false`/`0`/`no`, case-insensitive. Unset is `false`.
fn parse_bool(lookup: EnvLookup<'_>, key: &'static str) -> Result<bool, ConfigError> {
    let Some(raw) = lookup(key) else {
        return Ok(false);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::Invalid { key, value: raw }),
    }
}
