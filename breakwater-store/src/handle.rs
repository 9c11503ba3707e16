//! Lazy, single-flight access to backing files.

use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Mutex;
use tokio::task;
use tracing::debug;

use crate::store::StoreError;

/// Backing file that opens itself on first use.
///
/// The slot guard is held across directory creation and the open syscall,
/// so concurrent first accesses join one attempt instead of racing to
/// create the file. A failed attempt leaves the slot empty and the next
/// caller retries. Any open attempt after the owning store closed fails
/// with [`StoreError::Closed`].
///
/// Reads and writes are positional and run on the blocking pool, so
/// operations touching different chunks of the same file do not serialize.
pub(crate) struct FileHandle {
    path: PathBuf,
    closed: Arc<AtomicBool>,
    slot: Mutex<Option<Arc<File>>>,
}

impl FileHandle {
    /// Creates an unopened handle. `closed` is the owning store's flag.
    pub fn new(path: PathBuf, closed: Arc<AtomicBool>) -> Self {
        Self {
            path,
            closed,
            slot: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Opens the file, creating parent directories on first use.
    ///
    /// # Errors
    ///
    /// - `StoreError::Closed` - If the owning store closed before or during the open
    /// - `StoreError::Io` - If directory creation or the open syscall failed
    pub async fn open(&self) -> Result<Arc<File>, StoreError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(StoreError::Closed);
        }

        let mut slot = self.slot.lock().await;
        if let Some(file) = slot.as_ref() {
            return Ok(Arc::clone(file));
        }

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        // The store may have closed while directories were being created.
        if self.closed.load(Ordering::SeqCst) {
            return Err(StoreError::Closed);
        }

        let path = self.path.clone();
        let file = task::spawn_blocking(move || {
            OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(false)
                .open(path)
        })
        .await
        .map_err(io::Error::other)??;

        debug!(path = %self.path.display(), "opened backing file");

        let file = Arc::new(file);
        *slot = Some(Arc::clone(&file));
        Ok(file)
    }

    /// Reads exactly `length` bytes at `offset`.
    ///
    /// # Errors
    ///
    /// - `StoreError::Io` - Short reads surface as `UnexpectedEof`
    pub async fn read_at(&self, offset: u64, length: usize) -> Result<Vec<u8>, StoreError> {
        let file = self.open().await?;
        let buffer = task::spawn_blocking(move || {
            let mut buffer = vec![0u8; length];
            file.read_exact_at(&mut buffer, offset)?;
            Ok::<_, io::Error>(buffer)
        })
        .await
        .map_err(io::Error::other)??;
        Ok(buffer)
    }

    /// Writes all of `data` at `offset`, extending the file as needed.
    pub async fn write_at(&self, offset: u64, data: Vec<u8>) -> Result<(), StoreError> {
        let file = self.open().await?;
        task::spawn_blocking(move || file.write_all_at(&data, offset))
            .await
            .map_err(io::Error::other)??;
        Ok(())
    }

    /// Drops the open file, if any. The descriptor is released once
    /// operations already holding it complete.
    pub async fn close(&self) {
        let mut slot = self.slot.lock().await;
        slot.take();
    }
}
