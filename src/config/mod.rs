//! Environment-backed server configuration.
//!
//! Most settings have defaults. Override with `SEMGRADE_*` environment variables.
//! Artifact store and model cache settings live next to their modules
//! ([`crate::artifact::ArtifactConfig`], [`crate::model_cache::ModelCacheConfig`]).

pub mod error;


pub use error::ConfigError;

use std::env;
use std::net::IpAddr;
use std::time::Duration;

use crate::constants::{
    DEFAULT_BATCH_PARALLELISM, DEFAULT_MAX_BATCH_SIZE, DEFAULT_REQUEST_TIMEOUT_SECS,
};
use crate::scoring::Calibration;

/// Server configuration loaded from environment variables.
///
/// Use [`Config::from_env`] to read `SEMGRADE_*` overrides on top of defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port. Default: `8080`.
    pub port: u16,

    /// IP address to bind to. Default: `127.0.0.1`.
    pub bind_addr: IpAddr,

    /// Wall-clock budget for one scoring request. Default: `120s`.
    pub request_timeout: Duration,

    /// Largest accepted batch. Default: `200`.
    pub max_batch_size: usize,

    /// Pairs embedded concurrently within one batch. Default: `4`.
    pub batch_parallelism: usize,

    /// Materialize the model at startup instead of on the first request.
    pub warmup_on_start: bool,

    /// Similarity-to-grade curve. Default: linear.
    pub calibration: Calibration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            bind_addr: IpAddr::V4(std::net::Ipv4Addr::new(127, 0, 0, 1)),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            batch_parallelism: DEFAULT_BATCH_PARALLELISM,
            warmup_on_start: false,
            calibration: Calibration::default(),
        }
    }
}

impl Config {
    pub const ENV_PORT: &'static str = "SEMGRADE_PORT";
    pub const ENV_BIND_ADDR: &'static str = "SEMGRADE_BIND_ADDR";
    pub const ENV_REQUEST_TIMEOUT_SECS: &'static str = "SEMGRADE_REQUEST_TIMEOUT_SECS";
    pub const ENV_MAX_BATCH_SIZE: &'static str = "SEMGRADE_MAX_BATCH_SIZE";
    pub const ENV_BATCH_PARALLELISM: &'static str = "SEMGRADE_BATCH_PARALLELISM";
    pub const ENV_WARMUP_ON_START: &'static str = "SEMGRADE_WARMUP_ON_START";
    pub const ENV_CALIBRATION: &'static str = "SEMGRADE_CALIBRATION";

    /// Loads configuration from environment variables (falling back to defaults).
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let port = Self::parse_port_from_env(defaults.port)?;
        let bind_addr = Self::parse_bind_addr_from_env(defaults.bind_addr)?;
        let request_timeout = Duration::from_secs(Self::parse_u64_from_env(
            Self::ENV_REQUEST_TIMEOUT_SECS,
            defaults.request_timeout.as_secs(),
        ));
        let max_batch_size =
            Self::parse_usize_from_env(Self::ENV_MAX_BATCH_SIZE, defaults.max_batch_size);
        let batch_parallelism =
            Self::parse_usize_from_env(Self::ENV_BATCH_PARALLELISM, defaults.batch_parallelism);
        let warmup_on_start = env::var(Self::ENV_WARMUP_ON_START)
            .map(|s| s == "true" || s == "1")
            .unwrap_or(defaults.warmup_on_start);
        let calibration = Self::parse_calibration_from_env(defaults.calibration)?;

        let config = Self {
            port,
            bind_addr,
            request_timeout,
            max_batch_size,
            batch_parallelism,
            warmup_on_start,
            calibration,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validates basic invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_batch_size == 0 {
            return Err(ConfigError::ZeroValue {
                name: Self::ENV_MAX_BATCH_SIZE,
            });
        }
        if self.batch_parallelism == 0 {
            return Err(ConfigError::ZeroValue {
                name: Self::ENV_BATCH_PARALLELISM,
            });
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::ZeroValue {
                name: Self::ENV_REQUEST_TIMEOUT_SECS,
            });
        }
        Ok(())
    }

    /// Returns `"{bind_addr}:{port}"` (useful for logging/binding).
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }

    fn parse_port_from_env(default: u16) -> Result<u16, ConfigError> {
        match env::var(Self::ENV_PORT) {
            Ok(value) => {
                let port: u16 = value.parse().map_err(|e| ConfigError::PortParseError {
                    value: value.clone(),
                    source: e,
                })?;

                if port == 0 {
                    return Err(ConfigError::InvalidPort { value });
                }

                Ok(port)
            }
            Err(_) => Ok(default),
        }
    }

    fn parse_bind_addr_from_env(default: IpAddr) -> Result<IpAddr, ConfigError> {
        match env::var(Self::ENV_BIND_ADDR) {
            Ok(value) => value
                .parse()
                .map_err(|e| ConfigError::InvalidBindAddr { value, source: e }),
            Err(_) => Ok(default),
        }
    }

    fn parse_calibration_from_env(default: Calibration) -> Result<Calibration, ConfigError> {
        match env::var(Self::ENV_CALIBRATION) {
            Ok(value) => value
                .parse()
                .map_err(|_| ConfigError::UnknownCalibration { value }),
            Err(_) => Ok(default),
        }
    }

    fn parse_u64_from_env(var_name: &str, default: u64) -> u64 {
        env::var(var_name)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    fn parse_usize_from_env(var_name: &str, default: usize) -> usize {
        env::var(var_name)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }
}
