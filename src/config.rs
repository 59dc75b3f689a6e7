// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! This module defines environment variable names and default values used
//! throughout the application. Configuration is loaded from the environment
//! at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `JWT_SECRET` | HMAC signing secret | Required |
//! | `JWT_KEY_ID` | Key id (`kid`) of the startup secret | `default` |
//! | `ACCESS_TOKEN_TTL_SECS` | Lifetime of issued tokens | `900` |
//! | `JWT_RETAINED_KEYS` | Previous keys still accepted after rotation | `0` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |
//!
//! The signing secret itself is read through
//! [`EnvSecretSource`](crate::auth::EnvSecretSource), never stored here.

use std::net::{IpAddr, SocketAddr};

use chrono::Duration;
use thiserror::Error;

/// Environment variable holding the HMAC signing secret.
///
/// Re-read on every key rotation, so an operator can change the variable
/// and trigger `POST /v1/admin/keys/rotate` without a restart.
pub const JWT_SECRET_ENV: &str = "JWT_SECRET";

/// Environment variable for the startup key id.
pub const JWT_KEY_ID_ENV: &str = "JWT_KEY_ID";

/// Environment variable for the issued token lifetime in seconds.
pub const ACCESS_TOKEN_TTL_SECS_ENV: &str = "ACCESS_TOKEN_TTL_SECS";

/// Environment variable for the rotation grace window (number of keys).
pub const JWT_RETAINED_KEYS_ENV: &str = "JWT_RETAINED_KEYS";

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";

/// Environment variable selecting the log output format.
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

/// Default token lifetime (15 minutes).
pub const DEFAULT_ACCESS_TOKEN_TTL_SECS: i64 = 900;

/// Longest lifetime a caller may ask for when refreshing (24 hours).
pub const MAX_REFRESH_TTL_SECS: i64 = 86_400;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;

/// Default `RUST_LOG` filter.
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}

/// Token settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSettings {
    pub key_id: String,
    pub access_token_ttl: Duration,
    pub retained_keys: usize,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            key_id: crate::auth::keys::DEFAULT_KEY_ID.to_string(),
            access_token_ttl: Duration::seconds(DEFAULT_ACCESS_TOKEN_TTL_SECS),
            retained_keys: 0,
        }
    }
}

impl AuthSettings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }

    /// Build from any variable lookup. Unset or blank variables take their
    /// defaults; set but unparsable ones are errors.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let ttl_secs: i64 = parse_or(&lookup, ACCESS_TOKEN_TTL_SECS_ENV, DEFAULT_ACCESS_TOKEN_TTL_SECS)?;
        if ttl_secs <= 0 {
            return Err(ConfigError::Invalid {
                name: ACCESS_TOKEN_TTL_SECS_ENV,
                value: ttl_secs.to_string(),
            });
        }

        Ok(Self {
            key_id: lookup(JWT_KEY_ID_ENV).unwrap_or(defaults.key_id),
            access_token_ttl: Duration::seconds(ttl_secs),
            retained_keys: parse_or(&lookup, JWT_RETAINED_KEYS_ENV, defaults.retained_keys)?,
        })
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerSettings {
    pub addr: SocketAddr,
}

impl ServerSettings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let host = lookup(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string());
        let ip: IpAddr = host.parse().map_err(|_| ConfigError::Invalid {
            name: HOST_ENV,
            value: host.clone(),
        })?;
        let port = parse_or(&lookup, PORT_ENV, DEFAULT_PORT)?;

        Ok(Self {
            addr: SocketAddr::new(ip, port),
        })
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl LogFormat {
    /// Unknown values fall back to `Pretty`; logging is not up yet to report them.
    pub fn from_env() -> Self {
        Self::parse(env_lookup(LOG_FORMAT_ENV).as_deref())
    }

    pub fn parse(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        }
    }
}

fn env_lookup(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(name) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid { name, value: raw }),
    }
}
