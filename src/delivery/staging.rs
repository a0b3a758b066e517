//! Staged upload files.
//! RAII guard removes the on-disk copy on every exit path.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs::{self, File, OpenOptions};
use uuid::Uuid;

pub struct StagedFile {
    path: PathBuf,
    file_name: String,
    size: u64,
    removed: bool, // false -> delete on drop
}

impl StagedFile {
    /// Create an empty staging file under `dir` with a random name.
    pub async fn create(dir: &Path, file_name: impl Into<String>) -> Result<(Self, File)> {
        fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create upload dir: {}", dir.display()))?;

        let path = dir.join(Uuid::new_v4().simple().to_string());
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .with_context(|| format!("Failed to create staging file: {}", path.display()))?;

        let staged = Self {
            path,
            file_name: file_name.into(),
            size: 0,
            removed: false,
        };
        Ok((staged, file))
    }

    /// Take ownership of a file that is already on disk.
    pub async fn adopt(
        path: impl Into<PathBuf>,
        file_name: impl Into<String>,
    ) -> std::io::Result<Self> {
        let path = path.into();
        let size = fs::metadata(&path).await?.len();
        Ok(Self {
            path,
            file_name: file_name.into(),
            size,
            removed: false,
        })
    }

    //-- Accessors
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn add_len(&mut self, bytes: u64) -> u64 {
        self.size += bytes;
        self.size
    }

    pub async fn read(&self) -> std::io::Result<Vec<u8>> {
        fs::read(&self.path).await
    }

    /// Delete the staged copy. Failures are logged, never returned.
    pub async fn discard(mut self) {
        self.removed = true;
        if let Err(e) = fs::remove_file(&self.path).await {
            tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "File cleanup error"
            );
        }
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if !self.removed {
            if let Err(e) = std::fs::remove_file(&self.path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(
                        path = %self.path.display(),
                        error = %e,
                        "Failed to clean up staged upload"
                    );
                }
            }
        }
    }
}
