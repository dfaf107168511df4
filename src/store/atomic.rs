//! Atomic file writes: stage next to the target, then rename over it.

use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::error::{Result, StatefulError};

/// Writer that only exposes its content at the target path on `commit`.
pub struct AtomicWriter {
    temp_path: PathBuf,
    final_path: PathBuf,
    temp_file: Option<File>,
}

impl AtomicWriter {
    pub async fn new(target_path: impl AsRef<Path>) -> Result<Self> {
        let final_path = target_path.as_ref().to_path_buf();
        let temp_path = create_temp_file_path(&final_path)?;

        let temp_file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)
            .await?;

        Ok(AtomicWriter {
            temp_path,
            final_path,
            temp_file: Some(temp_file),
        })
    }

    pub async fn write_all(&mut self, data: &[u8]) -> Result<()> {
        if let Some(file) = self.temp_file.as_mut() {
            file.write_all(data).await?;
        }
        Ok(())
    }

    /// Flush and rename the staged file over the target.
    pub async fn commit(mut self) -> Result<()> {
        if let Some(mut file) = self.temp_file.take() {
            file.flush().await?;
            file.sync_all().await?;
        }

        tokio::fs::rename(&self.temp_path, &self.final_path).await?;
        Ok(())
    }

    /// Drop the staged content, leaving the target untouched.
    pub async fn abort(mut self) -> Result<()> {
        self.temp_file.take();
        let _ = tokio::fs::remove_file(&self.temp_path).await;
        Ok(())
    }
}

impl Drop for AtomicWriter {
    fn drop(&mut self) {
        // Uncommitted: the staged file is still ours to remove.
        if self.temp_file.take().is_some() {
            let _ = std::fs::remove_file(&self.temp_path);
        }
    }
}

fn create_temp_file_path(target_path: &Path) -> Result<PathBuf> {
    let parent = target_path.parent().unwrap_or_else(|| Path::new("."));
    let file_name = target_path
        .file_name()
        .ok_or_else(|| StatefulError::invalid_manifest(target_path, "target has no file name"))?
        .to_string_lossy();

    let temp_name = format!(".{}.tmp.{}", file_name, Uuid::new_v4().simple());
    Ok(parent.join(temp_name))
}

/// Write `data` to `path` atomically.
pub async fn write_atomic(path: impl AsRef<Path>, data: &[u8]) -> Result<()> {
    let mut writer = AtomicWriter::new(path).await?;
    writer.write_all(data).await?;
    writer.commit().await
}
