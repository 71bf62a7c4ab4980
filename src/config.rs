// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Environment variables are read once at startup into [`GatewayConfig`] and
//! handed to each service constructor.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `3000` |
//! | `BANANO_MODE` | `true` selects banano currency mode | `false` |
//! | `RPC_URL` | Node RPC endpoint | `http://localhost:7076` |
//! | `NODE_WS_URL` | Node websocket; relay disabled when unset | unset |
//! | `WORK_URL` | Work server speaking `work_generate` | unset |
//! | `BPOW_KEY` | Delegated work service key | unset |
//! | `BPOW_URL` | Delegated work service endpoint | `https://boompow.banano.cc/graphql` |
//! | `REQUIRE_WORK_PROVIDER` | Fail startup without any work provider | `false` |
//! | `MAX_HISTORY_COUNT` | Upper bound applied to `count` | `1000` |
//! | `PRICE_TICK_SECS` | Price push interval | `60` |
//! | `WORK_TIMEOUT_SECS` | Work race deadline | `30` |
//! | `REDIS_URL` | Shared store holding the `prices` hash; prices stay empty when unset | unset |
//! | `PRICE_SYNC_SECS` | How often the `prices` hash is re-read | `30` |
//! | `TLS_CERT_PATH` / `TLS_KEY_PATH` | PEM files; HTTPS when both set | unset |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug,nano_wallet_gateway=debug` |

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::ledger::CurrencyMode;
use crate::work::providers::DEFAULT_BPOW_URL;
use crate::work::DEFAULT_WORK_DEADLINE;

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const BANANO_MODE_ENV: &str = "BANANO_MODE";
pub const RPC_URL_ENV: &str = "RPC_URL";
pub const NODE_WS_URL_ENV: &str = "NODE_WS_URL";
pub const WORK_URL_ENV: &str = "WORK_URL";
pub const BPOW_KEY_ENV: &str = "BPOW_KEY";
pub const BPOW_URL_ENV: &str = "BPOW_URL";
pub const REQUIRE_WORK_PROVIDER_ENV: &str = "REQUIRE_WORK_PROVIDER";
pub const MAX_HISTORY_COUNT_ENV: &str = "MAX_HISTORY_COUNT";
pub const PRICE_TICK_SECS_ENV: &str = "PRICE_TICK_SECS";
pub const WORK_TIMEOUT_SECS_ENV: &str = "WORK_TIMEOUT_SECS";
pub const REDIS_URL_ENV: &str = "REDIS_URL";
pub const PRICE_SYNC_SECS_ENV: &str = "PRICE_SYNC_SECS";
pub const TLS_CERT_PATH_ENV: &str = "TLS_CERT_PATH";
pub const TLS_KEY_PATH_ENV: &str = "TLS_KEY_PATH";

/// Environment variable selecting the log formatter (`json` or `pretty`).
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug,nano_wallet_gateway=debug";

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_RPC_URL: &str = "http://localhost:7076";
pub const DEFAULT_MAX_HISTORY_COUNT: u64 = 1000;
pub const DEFAULT_PRICE_TICK_SECS: u64 = 60;
pub const DEFAULT_PRICE_SYNC_SECS: u64 = 30;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} is not a valid URL: {reason}")]
    InvalidUrl { name: &'static str, reason: String },

    #[error("{name} has invalid value {value:?}")]
    InvalidValue { name: &'static str, value: String },

    #[error("{0} and {1} must be set together")]
    Incomplete(&'static str, &'static str),

    #[error("No work provider configured: set WORK_URL or BPOW_KEY")]
    NoWorkProvider,
}

/// Delegated work service credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoomPowConfig {
    pub url: String,
    pub key: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPaths {
    pub cert: PathBuf,
    pub key: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    pub bind_addr: SocketAddr,
    pub mode: CurrencyMode,
    pub rpc_url: String,
    pub node_ws_url: Option<String>,
    pub work_url: Option<String>,
    pub bpow: Option<BoomPowConfig>,
    pub max_count: u64,
    pub price_interval: Duration,
    pub work_deadline: Duration,
    pub redis_url: Option<String>,
    pub price_sync_interval: Duration,
    pub tls: Option<TlsPaths>,
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source. Blank values count as unset.
    pub fn from_vars<F>(get: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let optional = |name: &str| {
            get(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let host = optional(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = parse_or(optional(PORT_ENV), PORT_ENV, DEFAULT_PORT)?;
        let bind_addr: SocketAddr =
            format!("{host}:{port}")
                .parse()
                .map_err(|_| ConfigError::InvalidValue {
                    name: HOST_ENV,
                    value: host.clone(),
                })?;

        let mode = if parse_bool(optional(BANANO_MODE_ENV), BANANO_MODE_ENV)? {
            CurrencyMode::Banano
        } else {
            CurrencyMode::Nano
        };

        let rpc_url = validate_url(
            RPC_URL_ENV,
            optional(RPC_URL_ENV).unwrap_or_else(|| DEFAULT_RPC_URL.to_string()),
        )?;
        let node_ws_url = optional(NODE_WS_URL_ENV)
            .map(|v| validate_url(NODE_WS_URL_ENV, v))
            .transpose()?;
        let work_url = optional(WORK_URL_ENV)
            .map(|v| validate_url(WORK_URL_ENV, v))
            .transpose()?;
        let bpow = match optional(BPOW_KEY_ENV) {
            Some(key) => Some(BoomPowConfig {
                url: validate_url(
                    BPOW_URL_ENV,
                    optional(BPOW_URL_ENV).unwrap_or_else(|| DEFAULT_BPOW_URL.to_string()),
                )?,
                key,
            }),
            None => None,
        };

        if parse_bool(optional(REQUIRE_WORK_PROVIDER_ENV), REQUIRE_WORK_PROVIDER_ENV)?
            && work_url.is_none()
            && bpow.is_none()
        {
            return Err(ConfigError::NoWorkProvider);
        }

        let max_count = parse_or(
            optional(MAX_HISTORY_COUNT_ENV),
            MAX_HISTORY_COUNT_ENV,
            DEFAULT_MAX_HISTORY_COUNT,
        )?;
        let price_interval = parse_secs(
            optional(PRICE_TICK_SECS_ENV),
            PRICE_TICK_SECS_ENV,
            DEFAULT_PRICE_TICK_SECS,
        )?;
        let work_deadline = parse_secs(
            optional(WORK_TIMEOUT_SECS_ENV),
            WORK_TIMEOUT_SECS_ENV,
            DEFAULT_WORK_DEADLINE.as_secs(),
        )?;

        let redis_url = optional(REDIS_URL_ENV)
            .map(|v| validate_url(REDIS_URL_ENV, v))
            .transpose()?;
        let price_sync_interval = parse_secs(
            optional(PRICE_SYNC_SECS_ENV),
            PRICE_SYNC_SECS_ENV,
            DEFAULT_PRICE_SYNC_SECS,
        )?;

        let tls = match (optional(TLS_CERT_PATH_ENV), optional(TLS_KEY_PATH_ENV)) {
            (Some(cert), Some(key)) => Some(TlsPaths {
                cert: cert.into(),
                key: key.into(),
            }),
            (None, None) => None,
            _ => return Err(ConfigError::Incomplete(TLS_CERT_PATH_ENV, TLS_KEY_PATH_ENV)),
        };

        Ok(Self {
            bind_addr,
            mode,
            rpc_url,
            node_ws_url,
            work_url,
            bpow,
            max_count,
            price_interval,
            work_deadline,
            redis_url,
            price_sync_interval,
            tls,
        })
    }
}

fn validate_url(name: &'static str, value: String) -> Result<String, ConfigError> {
    Url::parse(&value).map_err(|e| ConfigError::InvalidUrl {
        name,
        reason: e.to_string(),
    })?;
    Ok(value)
}

fn parse_or<T: std::str::FromStr>(
    value: Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match value {
        Some(v) => v
            .parse()
            .map_err(|_| ConfigError::InvalidValue { name, value: v }),
        None => Ok(default),
    }
}

/// Whole seconds, zero rejected.
fn parse_secs(
    value: Option<String>,
    name: &'static str,
    default: u64,
) -> Result<Duration, ConfigError> {
    match parse_or(value, name, default)? {
        0 => Err(ConfigError::InvalidValue {
            name,
            value: "0".to_string(),
        }),
        secs => Ok(Duration::from_secs(secs)),
    }
}

fn parse_bool(value: Option<String>, name: &'static str) -> Result<bool, ConfigError> {
    match value.as_deref().map(str::to_ascii_lowercase).as_deref() {
        None | Some("false") | Some("0") | Some("no") => Ok(false),
        Some("true") | Some("1") | Some("yes") => Ok(true),
        Some(other) => Err(ConfigError::InvalidValue {
            name,
            value: other.to_string(),
        }),
    }
}
