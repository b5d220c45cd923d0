//! Process configuration read from the environment.

use std::net::SocketAddr;

use chrono::Duration;
use thiserror::Error;

use keystone_auth::GovernanceMode;
use keystone_groups::DEFAULT_MAX_DEPTH;

pub const BIND_ADDR_ENV: &str = "KEYSTONE_BIND_ADDR";
pub const JWT_SECRET_ENV: &str = "JWT_SECRET";
pub const MAX_GROUP_DEPTH_ENV: &str = "KEYSTONE_MAX_GROUP_DEPTH";
pub const GOVERNANCE_ENV: &str = "KEYSTONE_GOVERNANCE";
pub const TOKEN_TTL_ENV: &str = "KEYSTONE_TOKEN_TTL_SECS";

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEV_JWT_SECRET: &str = "dev-secret";
const DEFAULT_TOKEN_TTL_SECS: i64 = 900;
/// Longest token lifetime accepted from the environment (30 days).
pub const MAX_TOKEN_TTL_SECS: i64 = 30 * 24 * 60 * 60;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} is not a valid socket address: {value}")]
    InvalidBindAddr { var: &'static str, value: String },

    #[error("{var} must be a positive integer, got {value:?}")]
    InvalidNumber { var: &'static str, value: String },

    #[error("{var} must be at most {max}, got {value:?}")]
    OutOfRange { var: &'static str, value: String, max: i64 },

    #[error("{var} must be 'strict' or 'syntax', got {value:?}")]
    InvalidGovernance { var: &'static str, value: String },

    #[error("{var} must not be empty")]
    Empty { var: &'static str },
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub bind_addr: SocketAddr,
    pub jwt_secret: String,
    pub max_group_depth: u32,
    pub governance: GovernanceMode,
    pub token_ttl: Duration,
}

impl ApiConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Unset keys fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind_raw = lookup(BIND_ADDR_ENV).unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidBindAddr {
                var: BIND_ADDR_ENV,
                value: bind_raw.clone(),
            })?;

        let jwt_secret = match lookup(JWT_SECRET_ENV) {
            Some(secret) if secret.trim().is_empty() => {
                return Err(ConfigError::Empty { var: JWT_SECRET_ENV });
            }
            Some(secret) => secret,
            None => {
                tracing::warn!("JWT_SECRET not set; using insecure dev default");
                DEV_JWT_SECRET.to_string()
            }
        };

        let max_group_depth = match lookup(MAX_GROUP_DEPTH_ENV) {
            Some(raw) => parse_positive(MAX_GROUP_DEPTH_ENV, &raw)?,
            None => DEFAULT_MAX_DEPTH,
        };

        let governance = match lookup(GOVERNANCE_ENV) {
            Some(raw) => GovernanceMode::parse(&raw).ok_or(ConfigError::InvalidGovernance {
                var: GOVERNANCE_ENV,
                value: raw,
            })?,
            None => GovernanceMode::default(),
        };
        if governance == GovernanceMode::Syntax {
            tracing::warn!("permission governance relaxed to syntax-only checks");
        }

        let ttl_secs = match lookup(TOKEN_TTL_ENV) {
            Some(raw) => {
                let secs = parse_positive::<i64>(TOKEN_TTL_ENV, &raw)?;
                if secs > MAX_TOKEN_TTL_SECS {
                    return Err(ConfigError::OutOfRange {
                        var: TOKEN_TTL_ENV,
                        value: raw,
                        max: MAX_TOKEN_TTL_SECS,
                    });
                }
                secs
            }
            None => DEFAULT_TOKEN_TTL_SECS,
        };

        Ok(Self {
            bind_addr,
            jwt_secret,
            max_group_depth,
            governance,
            token_ttl: Duration::seconds(ttl_secs),
        })
    }
}

fn parse_positive<T>(var: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialOrd + Default,
{
    match raw.trim().parse::<T>() {
        Ok(v) if v > T::default() => Ok(v),
        _ => Err(ConfigError::InvalidNumber {
            var,
            value: raw.to_string(),
        }),
    }
}
