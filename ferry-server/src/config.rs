//! Server configuration, read from the environment once at startup.
//!
//! | Variable | Default |
//! |---|---|
//! | `FERRY_HOST` | `0.0.0.0` |
//! | `FERRY_PORT` (or `PORT`) | `9090` |
//! | `FERRY_TTL_SECS` | `86400` |
//! | `FERRY_CLEANUP_INTERVAL` | `60` |
//! | `FERRY_MAX_CONTENT_BYTES` | `1048576` |

use ferry_core::{StoreConfig, DEFAULT_CLEANUP_INTERVAL, DEFAULT_TTL, MAX_TTL};
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Default maximum content size accepted by the gateway (1 MB)
pub const DEFAULT_MAX_CONTENT_BYTES: usize = 1024 * 1024;

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 9090;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid bind address {addr}")]
    InvalidAddress { addr: String },

    #[error("{var} must be greater than zero")]
    Zero { var: &'static str },

    #[error("{var} must be at most {max}")]
    TooLarge { var: &'static str, max: u64 },
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub ttl: Duration,
    pub cleanup_interval: Duration,
    pub max_content_bytes: usize,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Builds the configuration from an arbitrary variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let host = lookup("FERRY_HOST").unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = parse_or("FERRY_PORT", lookup("FERRY_PORT").or_else(|| lookup("PORT")), DEFAULT_PORT);
        let ttl_secs = parse_or("FERRY_TTL_SECS", lookup("FERRY_TTL_SECS"), DEFAULT_TTL.as_secs());
        let cleanup_secs = parse_or(
            "FERRY_CLEANUP_INTERVAL",
            lookup("FERRY_CLEANUP_INTERVAL"),
            DEFAULT_CLEANUP_INTERVAL.as_secs(),
        );
        let max_content_bytes = parse_or(
            "FERRY_MAX_CONTENT_BYTES",
            lookup("FERRY_MAX_CONTENT_BYTES"),
            DEFAULT_MAX_CONTENT_BYTES,
        );

        if ttl_secs == 0 {
            return Err(ConfigError::Zero { var: "FERRY_TTL_SECS" });
        }
        if ttl_secs > MAX_TTL.as_secs() {
            return Err(ConfigError::TooLarge {
                var: "FERRY_TTL_SECS",
                max: MAX_TTL.as_secs(),
            });
        }
        if cleanup_secs == 0 {
            return Err(ConfigError::Zero { var: "FERRY_CLEANUP_INTERVAL" });
        }

        Ok(Self {
            host,
            port,
            ttl: Duration::from_secs(ttl_secs),
            cleanup_interval: Duration::from_secs(cleanup_secs),
            max_content_bytes,
        })
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let addr = format!("{}:{}", self.host, self.port);
        addr.parse()
            .map_err(|_| ConfigError::InvalidAddress { addr })
    }

    pub fn store_config(&self) -> StoreConfig {
        StoreConfig::default()
            .with_ttl(self.ttl)
            .with_cleanup_interval(self.cleanup_interval)
    }
}

fn parse_or<T: FromStr + Copy + std::fmt::Display>(var: &str, raw: Option<String>, default: T) -> T {
    match raw {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("{} has invalid value {:?}, using default {}", var, raw, default);
            default
        }),
    }
}
