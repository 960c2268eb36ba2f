use std::env;
use std::path::PathBuf;

use crate::config::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
/// Backing store for the model bundle.
pub enum ArtifactProvider {
    #[default]
    /// Google Cloud Storage (via `gsutil`).
    Gcs,
    /// A local directory tree standing in for a bucket.
    Local,
}

impl std::str::FromStr for ArtifactProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gcs" | "gcp" | "google" | "firebase" => Ok(Self::Gcs),
            "local" => Ok(Self::Local),
            _ => Err(format!("Unknown artifact provider: {}", s)),
        }
    }
}

#[derive(Debug, Clone)]
/// Artifact store selection and addressing.
pub struct ArtifactConfig {
    /// Provider implementation.
    pub provider: ArtifactProvider,
    /// Bucket name (GCS provider).
    pub bucket: String,
    /// Root directory (local provider).
    pub local_root: PathBuf,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            provider: ArtifactProvider::default(),
            bucket: String::new(),
            local_root: PathBuf::from("./artifacts"),
        }
    }
}

impl ArtifactConfig {
    const ENV_PROVIDER: &'static str = "SEMGRADE_ARTIFACT_PROVIDER";
    const ENV_BUCKET: &'static str = "SEMGRADE_ARTIFACT_BUCKET";
    const ENV_LOCAL_ROOT: &'static str = "SEMGRADE_ARTIFACT_ROOT";

    /// Loads config from environment variables (with defaults).
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let provider = match env::var(Self::ENV_PROVIDER) {
            Ok(value) => value
                .parse()
                .map_err(|_| ConfigError::UnknownProvider { value })?,
            Err(_) => defaults.provider,
        };
        let bucket = env::var(Self::ENV_BUCKET)
            .map(|v| v.trim().to_string())
            .unwrap_or_default();
        let local_root = env::var(Self::ENV_LOCAL_ROOT)
            .map(PathBuf::from)
            .unwrap_or(defaults.local_root);

        let config = Self {
            provider,
            bucket,
            local_root,
        };
        config.validate()?;
        Ok(config)
    }

    /// GCS needs a bucket; the local provider needs its root to be a directory if present.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.provider {
            ArtifactProvider::Gcs if self.bucket.is_empty() => Err(ConfigError::MissingEnvVar {
                name: Self::ENV_BUCKET,
            }),
            ArtifactProvider::Local if self.local_root.exists() && !self.local_root.is_dir() => {
                Err(ConfigError::NotADirectory {
                    path: self.local_root.clone(),
                })
            }
            _ => Ok(()),
        }
    }

    /// Config pointing the local provider at `root`.
    pub fn local<P: Into<PathBuf>>(root: P) -> Self {
        Self {
            provider: ArtifactProvider::Local,
            bucket: String::new(),
            local_root: root.into(),
        }
    }
}
