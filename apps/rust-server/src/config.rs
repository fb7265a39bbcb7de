// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is read from the environment once at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind IP (IPv4 or IPv6) | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `DATA_DIR` | Directory holding `warden.redb` | `./data` |
//! | `JWT_SECRET` | HMAC signing secret (≥ 32 bytes) | Required |
//! | `JWT_ISSUER` | `iss` claim of issued tokens | `warden` |
//! | `JWT_AUDIENCE` | `aud` claim of issued tokens | `warden-api` |
//! | `ACCESS_TOKEN_TTL_SECS` | Access token lifetime | `900` |
//! | `REFRESH_TOKEN_TTL_SECS` | Session / refresh token lifetime | `604800` |
//! | `ADMIN_ROLE` | Role that bypasses permission checks | `ADMIN` |
//! | `SYNC_ADMIN_PERMISSIONS` | Run the permission catalog sync at boot | `true` |
//! | `SESSION_SWEEP_INTERVAL_SECS` | Expired-entry purge interval | `300` |
//! | `BOOTSTRAP_ADMIN_USERNAME` | Admin user created at boot | Unset |
//! | `BOOTSTRAP_ADMIN_PASSWORD` | Password of the bootstrap admin | Unset |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use crate::auth::roles::{normalize_role_name, DEFAULT_ADMIN_ROLE};
use crate::auth::token::{TokenSettings, MIN_SECRET_LEN};
use crate::logging::LogFormat;

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const DATA_DIR_ENV: &str = "DATA_DIR";
pub const JWT_SECRET_ENV: &str = "JWT_SECRET";
pub const JWT_ISSUER_ENV: &str = "JWT_ISSUER";
pub const JWT_AUDIENCE_ENV: &str = "JWT_AUDIENCE";
pub const ACCESS_TOKEN_TTL_ENV: &str = "ACCESS_TOKEN_TTL_SECS";
pub const REFRESH_TOKEN_TTL_ENV: &str = "REFRESH_TOKEN_TTL_SECS";
pub const ADMIN_ROLE_ENV: &str = "ADMIN_ROLE";
pub const SYNC_ADMIN_PERMISSIONS_ENV: &str = "SYNC_ADMIN_PERMISSIONS";
pub const SESSION_SWEEP_INTERVAL_ENV: &str = "SESSION_SWEEP_INTERVAL_SECS";
pub const BOOTSTRAP_ADMIN_USERNAME_ENV: &str = "BOOTSTRAP_ADMIN_USERNAME";
pub const BOOTSTRAP_ADMIN_PASSWORD_ENV: &str = "BOOTSTRAP_ADMIN_PASSWORD";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

/// Database file name inside `DATA_DIR`.
pub const DATABASE_FILE: &str = "warden.redb";

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_DATA_DIR: &str = "./data";
const DEFAULT_ISSUER: &str = "warden";
const DEFAULT_AUDIENCE: &str = "warden-api";
const DEFAULT_ACCESS_TTL_SECS: u64 = 900;
const DEFAULT_REFRESH_TTL_SECS: u64 = 7 * 24 * 3600;
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 300;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),

    #[error("{name} has an invalid value: {reason}")]
    Invalid { name: &'static str, reason: String },
}

fn invalid(name: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        name,
        reason: reason.into(),
    }
}

/// Username/password of the admin user created at boot.
#[derive(Clone)]
pub struct BootstrapAdmin {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for BootstrapAdmin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BootstrapAdmin")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// Fully parsed runtime configuration.
#[derive(Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub data_dir: PathBuf,
    pub jwt_secret: Vec<u8>,
    pub jwt_issuer: String,
    pub jwt_audience: String,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    pub admin_role: String,
    pub sync_admin_permissions: bool,
    pub session_sweep_interval: Duration,
    pub bootstrap_admin: Option<BootstrapAdmin>,
    pub log_format: LogFormat,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("bind_addr", &self.bind_addr)
            .field("data_dir", &self.data_dir)
            .field("jwt_issuer", &self.jwt_issuer)
            .field("jwt_audience", &self.jwt_audience)
            .field("access_token_ttl", &self.access_token_ttl)
            .field("refresh_token_ttl", &self.refresh_token_ttl)
            .field("admin_role", &self.admin_role)
            .field("sync_admin_permissions", &self.sync_admin_permissions)
            .field("session_sweep_interval", &self.session_sweep_interval)
            .field("bootstrap_admin", &self.bootstrap_admin)
            .field("log_format", &self.log_format)
            .finish_non_exhaustive()
    }
}

fn parse_secs(name: &'static str, raw: Option<String>, default: u64) -> Result<Duration, ConfigError> {
    let secs = match raw {
        Some(value) => value
            .trim()
            .parse::<u64>()
            .map_err(|e| invalid(name, e.to_string()))?,
        None => default,
    };
    if secs == 0 {
        return Err(invalid(name, "must be greater than zero"));
    }
    Ok(Duration::from_secs(secs))
}

fn parse_bool(name: &'static str, raw: Option<String>, default: bool) -> Result<bool, ConfigError> {
    match raw.as_deref().map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => Ok(true),
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => Ok(false),
        Some(v) => Err(invalid(name, format!("expected a boolean, got '{v}'"))),
    }
}

impl AppConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Unset and empty are the same thing.
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let host = get(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = match get(PORT_ENV) {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|e| invalid(PORT_ENV, e.to_string()))?,
            None => DEFAULT_PORT,
        };
        let ip: IpAddr = host
            .trim()
            .trim_start_matches('[')
            .trim_end_matches(']')
            .parse()
            .map_err(|e: std::net::AddrParseError| invalid(HOST_ENV, e.to_string()))?;
        let bind_addr = SocketAddr::new(ip, port);

        let jwt_secret = get(JWT_SECRET_ENV)
            .ok_or(ConfigError::Missing(JWT_SECRET_ENV))?
            .into_bytes();
        if jwt_secret.len() < MIN_SECRET_LEN {
            return Err(invalid(
                JWT_SECRET_ENV,
                format!("must be at least {MIN_SECRET_LEN} bytes"),
            ));
        }

        let admin_role =
            normalize_role_name(&get(ADMIN_ROLE_ENV).unwrap_or_else(|| DEFAULT_ADMIN_ROLE.to_string()));

        let bootstrap_admin = match (
            get(BOOTSTRAP_ADMIN_USERNAME_ENV),
            get(BOOTSTRAP_ADMIN_PASSWORD_ENV),
        ) {
            (Some(username), Some(password)) => Some(BootstrapAdmin { username, password }),
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::Missing(BOOTSTRAP_ADMIN_PASSWORD_ENV)),
            (None, Some(_)) => return Err(ConfigError::Missing(BOOTSTRAP_ADMIN_USERNAME_ENV)),
        };

        let log_format = match get(LOG_FORMAT_ENV) {
            Some(raw) => raw
                .parse::<LogFormat>()
                .map_err(|e| invalid(LOG_FORMAT_ENV, e))?,
            None => LogFormat::default(),
        };

        Ok(Self {
            bind_addr,
            data_dir: PathBuf::from(get(DATA_DIR_ENV).unwrap_or_else(|| DEFAULT_DATA_DIR.to_string())),
            jwt_secret,
            jwt_issuer: get(JWT_ISSUER_ENV).unwrap_or_else(|| DEFAULT_ISSUER.to_string()),
            jwt_audience: get(JWT_AUDIENCE_ENV).unwrap_or_else(|| DEFAULT_AUDIENCE.to_string()),
            access_token_ttl: parse_secs(
                ACCESS_TOKEN_TTL_ENV,
                get(ACCESS_TOKEN_TTL_ENV),
                DEFAULT_ACCESS_TTL_SECS,
            )?,
            refresh_token_ttl: parse_secs(
                REFRESH_TOKEN_TTL_ENV,
                get(REFRESH_TOKEN_TTL_ENV),
                DEFAULT_REFRESH_TTL_SECS,
            )?,
            admin_role,
            sync_admin_permissions: parse_bool(
                SYNC_ADMIN_PERMISSIONS_ENV,
                get(SYNC_ADMIN_PERMISSIONS_ENV),
                true,
            )?,
            session_sweep_interval: parse_secs(
                SESSION_SWEEP_INTERVAL_ENV,
                get(SESSION_SWEEP_INTERVAL_ENV),
                DEFAULT_SWEEP_INTERVAL_SECS,
            )?,
            bootstrap_admin,
            log_format,
        })
    }

    /// Path of the redb database file.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(DATABASE_FILE)
    }

    /// Settings for the access token codec.
    pub fn token_settings(&self) -> TokenSettings {
        TokenSettings {
            secret: self.jwt_secret.clone(),
            issuer: self.jwt_issuer.clone(),
            audience: self.jwt_audience.clone(),
            access_ttl: self.access_token_ttl,
        }
    }
}
