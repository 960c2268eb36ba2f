use std::env;
use std::path::PathBuf;

use crate::config::ConfigError;
use crate::constants::{DEFAULT_MODEL_DIR_NAME, DEFAULT_MODEL_PREFIX};
use crate::embedding::EncoderConfig;

#[derive(Debug, Clone)]
/// Where the bundle lives remotely and where it is materialized locally.
pub struct ModelCacheConfig {
    /// Object-name prefix of the bundle in the artifact store (no trailing `/`).
    pub bundle_prefix: String,
    /// Local working directory the bundle is promoted into.
    pub local_dir: PathBuf,
    /// Pre-provisioned bundle loaded when the primary bundle cannot be materialized or loaded.
    pub fallback_dir: Option<PathBuf>,
    pub encoder: EncoderConfig,
}

impl Default for ModelCacheConfig {
    fn default() -> Self {
        Self {
            bundle_prefix: DEFAULT_MODEL_PREFIX.to_string(),
            local_dir: env::temp_dir().join(DEFAULT_MODEL_DIR_NAME),
            fallback_dir: None,
            encoder: EncoderConfig::default(),
        }
    }
}

impl ModelCacheConfig {
    pub const ENV_MODEL_PREFIX: &'static str = "SEMGRADE_MODEL_PREFIX";
    pub const ENV_MODEL_DIR: &'static str = "SEMGRADE_MODEL_DIR";
    pub const ENV_FALLBACK_MODEL_DIR: &'static str = "SEMGRADE_FALLBACK_MODEL_DIR";

    /// Loads config from environment variables (with defaults).
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let bundle_prefix = env::var(Self::ENV_MODEL_PREFIX)
            .map(|v| normalize_prefix(&v))
            .unwrap_or(defaults.bundle_prefix);
        let local_dir = env::var(Self::ENV_MODEL_DIR)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.local_dir);
        let fallback_dir = env::var(Self::ENV_FALLBACK_MODEL_DIR)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);

        let config = Self {
            bundle_prefix,
            local_dir,
            fallback_dir,
            encoder: EncoderConfig::from_env(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bundle_prefix.is_empty() {
            return Err(ConfigError::MissingEnvVar {
                name: Self::ENV_MODEL_PREFIX,
            });
        }
        if self.local_dir.exists() && !self.local_dir.is_dir() {
            return Err(ConfigError::NotADirectory {
                path: self.local_dir.clone(),
            });
        }
        if let Some(dir) = &self.fallback_dir
            && !dir.is_dir()
        {
            return Err(ConfigError::NotADirectory { path: dir.clone() });
        }
        Ok(())
    }

    /// Stub-encoder config materializing `prefix` into `local_dir`.
    pub fn stub(prefix: &str, local_dir: impl Into<PathBuf>) -> Self {
        Self {
            bundle_prefix: normalize_prefix(prefix),
            local_dir: local_dir.into(),
            fallback_dir: None,
            encoder: EncoderConfig::stub(),
        }
    }
}

fn normalize_prefix(prefix: &str) -> String {
    prefix.trim().trim_matches('/').to_string()
}
