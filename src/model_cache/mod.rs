//! Lazy, single-flight loading of the scoring model.
//!
//! The first [`ModelCache::ensure_ready`] lists the bundle prefix in the artifact
//! store, materializes it into a local directory and loads a
//! [`SentenceEncoder`](crate::embedding::SentenceEncoder) from it. Later calls return
//! the shared instance.

pub mod bundle;
pub mod config;
pub mod error;
pub mod manager;

#[cfg(test)]
mod tests;

pub use bundle::{BundleFile, BundleManifest, materialize_bundle};
pub use config::ModelCacheConfig;
pub use error::ModelCacheError;
pub use manager::{ModelCache, ModelStatus};
