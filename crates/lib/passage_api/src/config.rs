//! API server configuration.

use std::fmt;
use std::time::Duration;

use passage_core::auth::tokens::TokenConfig;
use passage_core::oauth::provider::ProviderConfig;
use thiserror::Error;

/// Longest accepted token lifetime: 10 years.
pub const MAX_TOKEN_TTL_SECS: i64 = 10 * 365 * 24 * 60 * 60;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{var} has an invalid value: {value}")]
    Invalid { var: &'static str, value: String },
}

/// Configuration for the API server.
#[derive(Clone)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "127.0.0.1:3100").
    pub bind_addr: String,
    /// PostgreSQL connection URL; `None` keeps users in memory.
    pub database_url: Option<String>,
    /// JWT signing secret. Never generated; must be supplied.
    pub jwt_secret: String,
    /// Token lifetimes, issuer and audience.
    pub tokens: TokenConfig,
    /// Identity provider endpoints and timeout.
    pub provider: ProviderConfig,
}

impl fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiConfig")
            .field("bind_addr", &self.bind_addr)
            .field("database_url", &self.database_url)
            .field("jwt_secret", &"<redacted>")
            .field("tokens", &self.tokens)
            .field("provider", &self.provider)
            .finish()
    }
}

impl ApiConfig {
    /// Reads configuration from environment variables.
    ///
    /// | Variable                   | Default                       |
    /// |----------------------------|-------------------------------|
    /// | `BIND_ADDR`                | `127.0.0.1:3100`              |
    /// | `DATABASE_URL`             | unset (in-memory users)       |
    /// | `JWT_SECRET`               | required                      |
    /// | `ACCESS_TOKEN_TTL_SECS`    | `3600`                        |
    /// | `REFRESH_TOKEN_TTL_SECS`   | `2592000`                     |
    /// | `JWT_ISSUER`               | `passage`                     |
    /// | `JWT_AUDIENCE`             | `passage-client`              |
    /// | `SINGLE_USE_REFRESH`       | `false`                       |
    /// | `GOOGLE_USERINFO_URL`      | Google OAuth2 userinfo        |
    /// | `FACEBOOK_ME_URL`          | Graph API `/me`               |
    /// | `PROVIDER_TIMEOUT_SECS`    | `10`                          |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) over an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let jwt_secret = get("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?;

        let defaults = TokenConfig::default();
        let tokens = TokenConfig {
            access_ttl_secs: parse_or(&get, "ACCESS_TOKEN_TTL_SECS", defaults.access_ttl_secs)?,
            refresh_ttl_secs: parse_or(&get, "REFRESH_TOKEN_TTL_SECS", defaults.refresh_ttl_secs)?,
            issuer: get("JWT_ISSUER").unwrap_or(defaults.issuer),
            audience: get("JWT_AUDIENCE").unwrap_or(defaults.audience),
            single_use_refresh: parse_or(&get, "SINGLE_USE_REFRESH", defaults.single_use_refresh)?,
        };
        let ttl_in_range = |ttl: i64| (1..=MAX_TOKEN_TTL_SECS).contains(&ttl);
        if !ttl_in_range(tokens.access_ttl_secs) || !ttl_in_range(tokens.refresh_ttl_secs) {
            return Err(ConfigError::Invalid {
                var: "ACCESS_TOKEN_TTL_SECS/REFRESH_TOKEN_TTL_SECS",
                value: format!("{}/{}", tokens.access_ttl_secs, tokens.refresh_ttl_secs),
            });
        }

        let provider_defaults = ProviderConfig::default();
        let provider = ProviderConfig {
            google_userinfo_url: get("GOOGLE_USERINFO_URL")
                .unwrap_or(provider_defaults.google_userinfo_url),
            facebook_me_url: get("FACEBOOK_ME_URL").unwrap_or(provider_defaults.facebook_me_url),
            timeout: Duration::from_secs(parse_or(
                &get,
                "PROVIDER_TIMEOUT_SECS",
                provider_defaults.timeout.as_secs(),
            )?),
        };

        Ok(Self {
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| "127.0.0.1:3100".into()),
            database_url: get("DATABASE_URL"),
            jwt_secret,
            tokens,
            provider,
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match get(var) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { var, value }),
    }
}
