//! Artifact store access used by the model cache.
//!
//! `GcsArtifactStore` shells out to `gsutil`. `LocalArtifactStore` treats a directory as a bucket.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use super::error::{ArtifactError, ArtifactResult};

const CMD_TIMEOUT: Duration = Duration::from_secs(120);
const CMD_RETRIES: usize = 3;
const CMD_RETRY_BACKOFF: Duration = Duration::from_millis(750);
const NO_MATCH_MARKER: &str = "matched no objects";

#[async_trait]
/// Read-only blob storage addressed by path prefix.
pub trait ArtifactStore: Send + Sync {
    /// Lists object names under `prefix`, sorted. Directory markers (trailing `/`) may appear.
    async fn list(&self, prefix: &str) -> ArtifactResult<Vec<String>>;
    /// Downloads `object` to `dest`. The parent of `dest` must exist.
    async fn download(&self, object: &str, dest: &Path) -> ArtifactResult<()>;
}

/// Google Cloud Storage implementation.
pub struct GcsArtifactStore {
    bucket: String,
    gsutil_path: PathBuf,
}

impl GcsArtifactStore {
    /// Creates a store for `bucket` using `gsutil` from `PATH`.
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            gsutil_path: PathBuf::from("gsutil"),
        }
    }

    fn uri(&self, object: &str) -> String {
        format!("gs://{}/{}", self.bucket, object)
    }

    async fn run_command_with_retries(
        &self,
        args: Vec<String>,
        label: &str,
    ) -> ArtifactResult<Vec<u8>> {
        let mut attempt = 0usize;
        loop {
            attempt += 1;

            let mut cmd = Command::new(&self.gsutil_path);
            cmd.args(&args)
                .kill_on_drop(true)
                .stdout(Stdio::piped())
                .stderr(Stdio::piped());

            let child = cmd
                .spawn()
                .map_err(|e| ArtifactError::StoreError(format!("Failed to spawn {label}: {e}")))?;

            let output = match tokio::time::timeout(CMD_TIMEOUT, child.wait_with_output()).await {
                Ok(res) => res.map_err(|e| {
                    ArtifactError::StoreError(format!("Failed waiting for {label}: {e}"))
                })?,
                Err(_) => {
                    return Err(ArtifactError::StoreError(format!(
                        "{label} timed out after {:?}",
                        CMD_TIMEOUT
                    )));
                }
            };

            if output.status.success() {
                return Ok(output.stdout);
            }

            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            // A missing prefix is an answer, not a transient failure.
            if stderr.contains(NO_MATCH_MARKER) {
                return Err(ArtifactError::NotFound {
                    object: args.last().cloned().unwrap_or_default(),
                });
            }

            let err = ArtifactError::StoreError(format!("{label} failed: {stderr}"));
            if attempt >= CMD_RETRIES {
                return Err(err);
            }

            debug!(attempt, label, "gsutil command failed, retrying");
            tokio::time::sleep(CMD_RETRY_BACKOFF).await;
        }
    }
}

#[async_trait]
impl ArtifactStore for GcsArtifactStore {
    async fn list(&self, prefix: &str) -> ArtifactResult<Vec<String>> {
        let pattern = format!("{}/**", self.uri(prefix.trim_end_matches('/')));
        let stdout = match self
            .run_command_with_retries(vec!["ls".to_string(), pattern], "gsutil ls")
            .await
        {
            Ok(stdout) => stdout,
            Err(ArtifactError::NotFound { .. }) => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let bucket_root = format!("gs://{}/", self.bucket);
        let mut names: Vec<String> = String::from_utf8_lossy(&stdout)
            .lines()
            .filter_map(|line| line.trim().strip_prefix(&bucket_root))
            .map(str::to_string)
            .collect();
        names.sort();
        Ok(names)
    }

    async fn download(&self, object: &str, dest: &Path) -> ArtifactResult<()> {
        self.run_command_with_retries(
            vec![
                "cp".to_string(),
                self.uri(object),
                dest.to_string_lossy().to_string(),
            ],
            "gsutil cp (download)",
        )
        .await
        .map(|_| ())
    }
}

/// Directory-backed implementation: `root/<object name>`.
pub struct LocalArtifactStore {
    root: PathBuf,
}

impl LocalArtifactStore {
    /// Creates a store rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl ArtifactStore for LocalArtifactStore {
    async fn list(&self, prefix: &str) -> ArtifactResult<Vec<String>> {
        let start = self.root.join(prefix.trim_end_matches('/'));
        if !start.is_dir() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        let mut pending = vec![start];
        while let Some(dir) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if entry.file_type().await?.is_dir() {
                    pending.push(path);
                    continue;
                }
                let Ok(relative) = path.strip_prefix(&self.root) else {
                    continue;
                };
                let name = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                names.push(name);
            }
        }

        names.sort();
        Ok(names)
    }

    async fn download(&self, object: &str, dest: &Path) -> ArtifactResult<()> {
        let src = self.root.join(object);
        if !src.is_file() {
            return Err(ArtifactError::NotFound {
                object: object.to_string(),
            });
        }
        tokio::fs::copy(&src, dest).await?;
        Ok(())
    }
}
