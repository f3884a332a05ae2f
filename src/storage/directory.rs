//! Directory-backed storage medium for host runs.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info};

use super::medium::{LogHandle, StorageMedium};

/// Log files live as plain files inside `root`.
#[derive(Debug, Clone)]
pub struct DirectoryMedium {
    root: PathBuf,
}

impl DirectoryMedium {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory holding the log files.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl StorageMedium for DirectoryMedium {
    async fn init(&self) -> Result<()> {
        fs::create_dir_all(&self.root)
            .await
            .with_context(|| format!("cannot create {}", self.root.display()))?;
        let meta = fs::metadata(&self.root).await?;
        if !meta.is_dir() {
            bail!("{} is not a directory", self.root.display());
        }
        if meta.permissions().readonly() {
            bail!("{} is read-only", self.root.display());
        }
        info!(root = %self.root.display(), "Storage directory ready");
        Ok(())
    }

    async fn exists(&self, name: &str) -> Result<bool> {
        Ok(fs::try_exists(self.root.join(name)).await?)
    }

    async fn create_exclusive(&self, name: &str) -> Result<Box<dyn LogHandle>> {
        let path = self.root.join(name);
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .with_context(|| format!("cannot create {}", path.display()))?;
        debug!(path = %path.display(), "Log file created");
        Ok(Box::new(FileLogHandle {
            path,
            writer: BufWriter::new(file),
        }))
    }
}

/// Buffered handle on one log file.
struct FileLogHandle {
    path: PathBuf,
    writer: BufWriter<File>,
}

#[async_trait]
impl LogHandle for FileLogHandle {
    async fn append(&mut self, line: &str) -> Result<()> {
        self.writer
            .write_all(line.as_bytes())
            .await
            .with_context(|| format!("write to {} failed", self.path.display()))
    }

    async fn sync(&mut self) -> Result<()> {
        self.writer.flush().await?;
        self.writer
            .get_ref()
            .sync_data()
            .await
            .with_context(|| format!("sync of {} failed", self.path.display()))
    }
}
