//! Bundle materialization: artifact store prefix -> complete local directory.
//!
//! Objects are downloaded into a staging directory next to the target and the
//! staging directory is renamed into place only once every file is present.
//! A failed or aborted materialization leaves the previous target untouched and
//! never exposes a partial bundle.

use std::io;
use std::path::{Component, Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info};

use super::error::ModelCacheError;
use crate::artifact::ArtifactStore;
use crate::embedding::{CONFIG_FILE, TOKENIZER_FILE, WEIGHT_FILES};

const STAGING_PREFIX: &str = ".semgrade-staging-";

#[derive(Debug, Clone, Serialize)]
pub struct BundleFile {
    /// Path relative to the bundle root, `/`-separated.
    pub path: String,
    pub bytes: u64,
}

#[derive(Debug, Clone, Serialize)]
/// What was materialized, for logs and the readiness probe.
pub struct BundleManifest {
    pub files: Vec<BundleFile>,
    pub total_bytes: u64,
    /// blake3 over every file's relative path and contents, in path order.
    pub digest: String,
}

/// Maps a listed object name to its path inside the bundle.
///
/// Returns `Ok(None)` for directory markers and names outside `dir_prefix`.
pub fn bundle_relative_path(
    dir_prefix: &str,
    object: &str,
) -> Result<Option<String>, ModelCacheError> {
    if object.ends_with('/') {
        return Ok(None);
    }
    let Some(relative) = object.strip_prefix(dir_prefix) else {
        return Ok(None);
    };
    if relative.is_empty() {
        return Ok(None);
    }

    let escapes = relative.starts_with('/')
        || relative.contains('\\')
        || Path::new(relative)
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
    if escapes {
        return Err(ModelCacheError::CorruptBundle {
            object: object.to_string(),
            reason: "object name escapes the bundle prefix".to_string(),
        });
    }
    Ok(Some(relative.to_string()))
}

/// Checks that the config, tokenizer and weight families are all present at the bundle root.
pub fn check_required_files(relative_paths: &[String]) -> Result<(), ModelCacheError> {
    let has = |name: &str| relative_paths.iter().any(|p| p == name);

    if !has(CONFIG_FILE) {
        return Err(ModelCacheError::MissingFile { family: "config" });
    }
    if !has(TOKENIZER_FILE) {
        return Err(ModelCacheError::MissingFile {
            family: "tokenizer",
        });
    }
    if !WEIGHT_FILES.iter().any(|w| has(w)) {
        return Err(ModelCacheError::MissingFile { family: "weights" });
    }
    Ok(())
}

/// Downloads every object under `prefix` and promotes the result to `target`.
pub async fn materialize_bundle(
    store: &dyn ArtifactStore,
    prefix: &str,
    target: &Path,
) -> Result<BundleManifest, ModelCacheError> {
    let dir_prefix = format!("{}/", prefix.trim_end_matches('/'));
    let listed = store.list(&dir_prefix).await?;

    let mut objects = Vec::with_capacity(listed.len());
    for object in listed {
        if let Some(relative) = bundle_relative_path(&dir_prefix, &object)? {
            objects.push((object, relative));
        }
    }
    if objects.is_empty() {
        return Err(ModelCacheError::EmptyPrefix {
            prefix: prefix.to_string(),
        });
    }
    objects.sort_by(|a, b| a.1.cmp(&b.1));

    let relative_paths: Vec<String> = objects.iter().map(|(_, r)| r.clone()).collect();
    check_required_files(&relative_paths)?;

    let parent = target
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    tokio::fs::create_dir_all(&parent).await?;

    // Dropped on every early return, which deletes the staging tree.
    let staging = tempfile::Builder::new()
        .prefix(STAGING_PREFIX)
        .tempdir_in(&parent)?;

    for (object, relative) in &objects {
        let dest = staging.path().join(relative);
        if let Some(dir) = dest.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        store.download(object, &dest).await?;
        debug!(object = %object, dest = %dest.display(), "Downloaded bundle object");
    }

    let staging_path = staging.path().to_path_buf();
    let paths = relative_paths.clone();
    let manifest =
        tokio::task::spawn_blocking(move || build_manifest(&staging_path, &paths)).await??;

    // Another process sharing `target` may promote the same bundle concurrently.
    if tokio::fs::try_exists(target).await? {
        if target_matches(target, &relative_paths, &manifest.digest).await {
            debug!(target = %target.display(), "Model directory already holds this bundle");
            return Ok(manifest);
        }
        debug!(target = %target.display(), "Replacing stale model directory");
        match tokio::fs::remove_dir_all(target).await {
            Err(e) if e.kind() != io::ErrorKind::NotFound => return Err(e.into()),
            _ => {}
        }
    }
    if let Err(e) = tokio::fs::rename(staging.path(), target).await {
        if !target_matches(target, &relative_paths, &manifest.digest).await {
            return Err(e.into());
        }
        debug!(target = %target.display(), "Model directory promoted by a concurrent loader");
    }
    drop(staging);

    info!(
        prefix,
        target = %target.display(),
        files = manifest.files.len(),
        total_bytes = manifest.total_bytes,
        digest = %manifest.digest,
        "Model bundle materialized"
    );
    Ok(manifest)
}

/// True when `target` holds `relative_paths` with exactly the given digest.
async fn target_matches(target: &Path, relative_paths: &[String], digest: &str) -> bool {
    let target = target.to_path_buf();
    let paths = relative_paths.to_vec();
    match tokio::task::spawn_blocking(move || build_manifest(&target, &paths)).await {
        Ok(Ok(existing)) => existing.digest == digest,
        _ => false,
    }
}

/// Sizes and digests the files of a bundle directory.
pub fn build_manifest(root: &Path, relative_paths: &[String]) -> io::Result<BundleManifest> {
    let mut hasher = blake3::Hasher::new();
    let mut files = Vec::with_capacity(relative_paths.len());
    let mut total_bytes = 0u64;

    for relative in relative_paths {
        let path = root.join(relative);
        let mut file = std::fs::File::open(&path)?;
        hasher.update(relative.as_bytes());
        hasher.update(&[0]);
        let bytes = io::copy(&mut file, &mut hasher)?;

        total_bytes += bytes;
        files.push(BundleFile {
            path: relative.clone(),
            bytes,
        });
    }

    Ok(BundleManifest {
        files,
        total_bytes,
        digest: hasher.finalize().to_hex().to_string(),
    })
}
