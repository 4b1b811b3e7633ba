use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use fs4::tokio::AsyncFileExt;
use tokio::fs::File;
use tracing::debug;

use crate::fs::operations::write_atomically;

use super::error::GoalError;

/// A single named place holding the serialized goals. Writes replace the whole blob.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BlobSlot: Send + Sync {
    /// Returns `None` when nothing was stored yet.
    async fn read(&self) -> Result<Option<Vec<u8>>, GoalError>;

    async fn write(&self, blob: Vec<u8>) -> Result<(), GoalError>;
}

/// File backed slot: `<dir>/<name>.json`, guarded by `<dir>/<name>.lock`.
pub struct FileSlot {
    path: PathBuf,
    lock_path: PathBuf,
}

impl FileSlot {
    pub fn new(dir: &Path, name: &str) -> Result<Self, GoalError> {
        std::fs::create_dir_all(dir).map_err(|source| io_error(dir, source))?;
        Ok(Self {
            path: dir.join(format!("{name}.json")),
            lock_path: dir.join(format!("{name}.lock")),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn open_lock(&self) -> Result<File, GoalError> {
        File::options()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.lock_path)
            .await
            .map_err(|source| io_error(&self.lock_path, source))
    }
}

#[async_trait]
impl BlobSlot for FileSlot {
    async fn read(&self) -> Result<Option<Vec<u8>>, GoalError> {
        let lock = self.open_lock().await?;
        lock.lock_shared()
            .map_err(|source| io_error(&self.lock_path, source))?;

        debug!("Reading {:?}", self.path);
        let result = match tokio::fs::read(&self.path).await {
            Ok(v) => Ok(Some(v)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error(&self.path, e)),
        };

        lock.unlock_async()
            .await
            .map_err(|source| io_error(&self.lock_path, source))?;
        result
    }

    async fn write(&self, blob: Vec<u8>) -> Result<(), GoalError> {
        // Semi-safe acquire-release for the slot
        let lock = self.open_lock().await?;
        lock.lock_exclusive()
            .map_err(|source| io_error(&self.lock_path, source))?;

        debug!("Writing {} bytes into {:?}", blob.len(), self.path);
        let result = write_atomically(&self.path, &blob)
            .await
            .map_err(|source| io_error(&self.path, source));

        lock.unlock_async()
            .await
            .map_err(|source| io_error(&self.lock_path, source))?;
        result
    }
}

/// Slot kept in process memory. Clones share the same contents.
#[derive(Clone, Default)]
pub struct MemorySlot {
    blob: Arc<Mutex<Option<Vec<u8>>>>,
}

impl MemorySlot {
    pub fn with_contents(blob: impl Into<Vec<u8>>) -> Self {
        Self {
            blob: Arc::new(Mutex::new(Some(blob.into()))),
        }
    }

    pub fn contents(&self) -> Option<Vec<u8>> {
        self.blob.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl BlobSlot for MemorySlot {
    async fn read(&self) -> Result<Option<Vec<u8>>, GoalError> {
        Ok(self.contents())
    }

    async fn write(&self, blob: Vec<u8>) -> Result<(), GoalError> {
        *self.blob.lock().unwrap_or_else(|e| e.into_inner()) = Some(blob);
        Ok(())
    }
}

fn io_error(path: &Path, source: std::io::Error) -> GoalError {
    GoalError::Io {
        path: path.display().to_string(),
        source,
    }
}
