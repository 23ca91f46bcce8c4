//! Process configuration, read once from the environment at start-up.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use warden_auth::Hs256Jwt;

use crate::store::{ColumnStore, InMemoryColumnStore, InfluxColumnStore, InfluxSettings, StoreError};

/// One year.
const MAX_TTL_MINUTES: i64 = 60 * 24 * 365;

const MIN_KEY_BYTES: usize = 16;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

#[derive(Clone)]
pub struct JwtConfig {
    key: Vec<u8>,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

impl core::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("ttl_minutes", &self.ttl_minutes)
            .finish_non_exhaustive()
    }
}

impl JwtConfig {
    pub fn codec(&self) -> Hs256Jwt {
        Hs256Jwt::new(
            &self.key,
            self.issuer.clone(),
            self.audience.clone(),
            chrono::Duration::minutes(self.ttl_minutes),
        )
    }
}

#[derive(Debug, Clone)]
pub enum StoreConfig {
    Memory,
    Influx(InfluxSettings),
}

impl StoreConfig {
    pub fn connect(&self) -> Result<Arc<dyn ColumnStore>, StoreError> {
        match self {
            StoreConfig::Memory => Ok(Arc::new(InMemoryColumnStore::new())),
            StoreConfig::Influx(settings) => Ok(Arc::new(InfluxColumnStore::new(settings.clone())?)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub jwt: JwtConfig,
    pub store: StoreConfig,
    pub bind_addr: SocketAddr,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from an arbitrary variable source. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let require = |var: &'static str| get(var).ok_or(ConfigError::Missing(var));

        let key = require("JWT_KEY")?;
        if key.len() < MIN_KEY_BYTES {
            return Err(ConfigError::Invalid {
                var: "JWT_KEY",
                reason: format!("must be at least {MIN_KEY_BYTES} bytes"),
            });
        }
        let issuer = get("JWT_ISSUER").unwrap_or_else(|| "warden".to_string());
        let audience = get("JWT_AUDIENCE").unwrap_or_else(|| issuer.clone());
        let ttl_minutes = parse_or("JWT_TTL_MINUTES", get("JWT_TTL_MINUTES"), Hs256Jwt::DEFAULT_TTL_MINUTES)?;
        if !(1..=MAX_TTL_MINUTES).contains(&ttl_minutes) {
            return Err(ConfigError::Invalid {
                var: "JWT_TTL_MINUTES",
                reason: format!("must be between 1 and {MAX_TTL_MINUTES}"),
            });
        }

        let store = match get("STORE_BACKEND").as_deref().unwrap_or("influx") {
            "memory" => StoreConfig::Memory,
            "influx" => StoreConfig::Influx(InfluxSettings {
                url: require("INFLUX_URL")?,
                token: require("INFLUX_TOKEN")?,
                bucket: require("INFLUX_BUCKET")?,
                org: require("INFLUX_ORG")?,
                timeout: Duration::from_secs(parse_or(
                    "INFLUX_TIMEOUT_SECS",
                    get("INFLUX_TIMEOUT_SECS"),
                    10u64,
                )?),
            }),
            other => {
                return Err(ConfigError::Invalid {
                    var: "STORE_BACKEND",
                    reason: format!("expected `influx` or `memory`, got `{other}`"),
                });
            }
        };

        let bind_addr = parse_or(
            "BIND_ADDR",
            get("BIND_ADDR"),
            SocketAddr::from(([0, 0, 0, 0], 8080)),
        )?;

        Ok(Self {
            jwt: JwtConfig {
                key: key.into_bytes(),
                issuer,
                audience,
                ttl_minutes,
            },
            store,
            bind_addr,
        })
    }
}

fn parse_or<T>(var: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            reason: e.to_string(),
        }),
    }
}
