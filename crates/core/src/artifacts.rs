//! Per-request scratch directory.

use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::depth_map::DepthMap;
use crate::error::CoreError;

pub const DEPTH_MAP_FILE: &str = "depth_map.json";

/// Uniquely named directory holding one request's uploaded image and
/// derived files. Removed with all its contents when dropped.
#[derive(Debug)]
pub struct RequestArtifacts {
    dir: TempDir,
}

impl RequestArtifacts {
    /// Create a fresh directory under `work_dir`, creating `work_dir` if needed.
    pub async fn create(work_dir: &Path) -> io::Result<Self> {
        tokio::fs::create_dir_all(work_dir).await?;
        let work_dir = work_dir.to_path_buf();
        let dir = tokio::task::spawn_blocking(move || {
            tempfile::Builder::new().prefix("req-").tempdir_in(work_dir)
        })
        .await
        .map_err(io::Error::other)??;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Random component of the directory name, usable as a file stem.
    pub fn id(&self) -> String {
        self.dir
            .path()
            .file_name()
            .map(|n| n.to_string_lossy().trim_start_matches("req-").to_string())
            .unwrap_or_default()
    }

    /// Write `bytes` to `file_name` inside the directory.
    pub async fn write(&self, file_name: &str, bytes: &[u8]) -> io::Result<PathBuf> {
        let path = self.dir.path().join(file_name);
        tokio::fs::write(&path, bytes).await?;
        Ok(path)
    }

    /// Serialize `depth_map` in the wire format for the computation to read.
    pub async fn persist_depth_map(&self, depth_map: &DepthMap) -> Result<PathBuf, CoreError> {
        let bytes = serde_json::to_vec(depth_map)
            .map_err(|e| CoreError::Internal(format!("failed to encode depth map: {e}")))?;
        self.write(DEPTH_MAP_FILE, &bytes)
            .await
            .map_err(|e| CoreError::Internal(format!("failed to persist depth map: {e}")))
    }
}
