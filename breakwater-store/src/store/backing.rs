//! Shared mapping and file fan-out logic behind both store implementations.
//!
//! Owns the file table, the precomputed chunk map, and the closed flag.
//! The stores differ only in the bytes they hand this layer: the plain
//! store passes chunk data through untouched, the encrypted store passes
//! ciphertext.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::future;
use tracing::debug;

use super::{GetOptions, StoreError};
use crate::config::{self, BackingPlan, ConfigError, StoreOptions};
use crate::handle::FileHandle;
use crate::layout::{self, ChunkIndex, ChunkLayout, ChunkTarget, FileExtent};

pub(crate) struct Backing {
    layout: ChunkLayout,
    /// Empty for auto-growing stores, which compute offsets directly
    chunk_map: Vec<Vec<ChunkTarget>>,
    files: Vec<FileHandle>,
    uid_root: Option<PathBuf>,
    closed: Arc<AtomicBool>,
}

impl Backing {
    pub fn from_options(chunk_length: u64, options: StoreOptions) -> Result<Self, ConfigError> {
        let resolved = config::resolve(chunk_length, options)?;
        let closed = Arc::new(AtomicBool::new(false));

        let (layout, chunk_map, files) = match resolved.plan {
            BackingPlan::Unbounded { file } => (
                ChunkLayout::unbounded(chunk_length),
                Vec::new(),
                vec![FileHandle::new(file, Arc::clone(&closed))],
            ),
            BackingPlan::Bounded {
                files,
                total_length,
            } => {
                let extents: Vec<FileExtent> = files
                    .iter()
                    .map(|file| FileExtent {
                        offset: file.offset,
                        length: file.length,
                    })
                    .collect();
                let handles = files
                    .into_iter()
                    .map(|file| FileHandle::new(file.path, Arc::clone(&closed)))
                    .collect();
                (
                    ChunkLayout::bounded(chunk_length, total_length),
                    layout::build_chunk_map(&extents, chunk_length),
                    handles,
                )
            }
        };

        Ok(Self {
            layout,
            chunk_map,
            files,
            uid_root: resolved.uid_root,
            closed,
        })
    }

    pub fn layout(&self) -> &ChunkLayout {
        &self.layout
    }

    pub fn chunk_length(&self) -> u64 {
        self.layout.chunk_length()
    }

    pub fn ensure_open(&self) -> Result<(), StoreError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(StoreError::Closed);
        }
        Ok(())
    }

    /// Rejects buffers that do not match the chunk's expected size before
    /// anything touches disk.
    pub fn validate_put(&self, index: ChunkIndex, actual: usize) -> Result<(), StoreError> {
        let expected = self.layout.chunk_size_of(index);
        if actual as u64 != expected {
            return Err(StoreError::LengthMismatch {
                index,
                expected,
                actual,
            });
        }
        Ok(())
    }

    /// Turns get options into a validated `[from, to)` window within the
    /// chunk at `index`.
    pub fn resolve_window(
        &self,
        index: ChunkIndex,
        opts: GetOptions,
    ) -> Result<(u64, u64), StoreError> {
        let chunk_size = self.layout.chunk_size_of(index);
        let invalid = || StoreError::InvalidRange {
            index,
            offset: opts.offset,
            length: opts.length,
        };

        let range_from = opts.offset;
        let range_to = match opts.length {
            Some(length) => range_from.checked_add(length).ok_or_else(invalid)?,
            None => chunk_size,
        };

        if range_from > range_to || range_to > chunk_size {
            return Err(invalid());
        }
        Ok((range_from, range_to))
    }

    /// Writes one chunk's bytes, fanning out across every mapped target.
    ///
    /// Target writes are issued concurrently; the first failure fails the
    /// call without cancelling writes already in flight, and nothing is
    /// rolled back.
    pub async fn write_chunk(&self, index: ChunkIndex, bytes: &[u8]) -> Result<(), StoreError> {
        if self.layout.is_unbounded() {
            let offset = u64::from(index.as_u32()) * self.layout.chunk_length();
            return self.files[0].write_at(offset, bytes.to_vec()).await;
        }

        let targets = self.targets(index)?;
        let writes = targets.iter().map(|target| {
            let data = bytes[target.from as usize..target.to as usize].to_vec();
            self.files[target.file].write_at(target.file_offset, data)
        });
        future::try_join_all(writes).await?;
        Ok(())
    }

    /// Reads exactly the `[range_from, range_to)` window of a mapped chunk,
    /// clipping each overlapping target to the window.
    pub async fn read_window(
        &self,
        index: ChunkIndex,
        range_from: u64,
        range_to: u64,
    ) -> Result<Vec<u8>, StoreError> {
        let targets = self.overlapping_targets(index, range_from, range_to)?;

        let reads = targets.iter().map(|target| {
            let from = target.from.max(range_from);
            let to = target.to.min(range_to);
            let file_offset = target.file_offset + (from - target.from);
            self.files[target.file].read_at(file_offset, (to - from) as usize)
        });
        let parts = future::try_join_all(reads).await?;

        let mut buffer = Vec::with_capacity((range_to - range_from) as usize);
        for part in parts {
            buffer.extend_from_slice(&part);
        }
        Ok(buffer)
    }

    /// Reassembles a mapped chunk's ciphertext from chunk offset zero up to
    /// `range_to`, so CTR decryption starts keystream-aligned.
    ///
    /// Targets are clipped only at the tail; when the first overlapping
    /// target begins past offset zero the gap is filled with zero bytes,
    /// which stand in for ciphertext no file holds.
    pub async fn read_cipher_prefix(
        &self,
        index: ChunkIndex,
        range_from: u64,
        range_to: u64,
    ) -> Result<Vec<u8>, StoreError> {
        let targets = self.overlapping_targets(index, range_from, range_to)?;
        let lead = targets[0].from;

        let reads = targets.iter().map(|target| {
            let to = target.to.min(range_to);
            self.files[target.file].read_at(target.file_offset, (to - target.from) as usize)
        });
        let parts = future::try_join_all(reads).await?;

        let mut assembled = vec![0u8; lead as usize];
        for part in parts {
            assembled.extend_from_slice(&part);
        }
        if (assembled.len() as u64) < range_to {
            assembled.resize(range_to as usize, 0);
        }
        Ok(assembled)
    }

    /// Direct read for auto-growing stores: chunk `index` lives at byte
    /// offset `index * chunk_length` in the single backing file.
    pub async fn read_unbounded(
        &self,
        index: ChunkIndex,
        range_from: u64,
        range_to: u64,
    ) -> Result<Vec<u8>, StoreError> {
        let offset = u64::from(index.as_u32()) * self.layout.chunk_length() + range_from;
        self.files[0]
            .read_at(offset, (range_to - range_from) as usize)
            .await
    }

    fn targets(&self, index: ChunkIndex) -> Result<&[ChunkTarget], StoreError> {
        let targets = self
            .chunk_map
            .get(index.as_u32() as usize)
            .map(Vec::as_slice)
            .unwrap_or_default();
        if targets.is_empty() {
            return Err(StoreError::NoMatchingFiles { index });
        }
        Ok(targets)
    }

    fn overlapping_targets(
        &self,
        index: ChunkIndex,
        range_from: u64,
        range_to: u64,
    ) -> Result<Vec<ChunkTarget>, StoreError> {
        let targets: Vec<ChunkTarget> = self
            .targets(index)?
            .iter()
            .filter(|target| target.to > range_from && target.from < range_to)
            .copied()
            .collect();
        if targets.is_empty() {
            return Err(StoreError::NoMatchingFiles { index });
        }
        Ok(targets)
    }

    /// Flips the closed flag, then drops every opened file handle.
    ///
    /// The flag is set synchronously, so operations and handle opens
    /// started afterwards fail; operations already holding a handle run to
    /// completion.
    pub async fn close(&self) -> Result<(), StoreError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(StoreError::Closed);
        }
        future::join_all(self.files.iter().map(FileHandle::close)).await;
        Ok(())
    }

    /// Closes (tolerating an already-closed store) and removes all backing
    /// storage.
    pub async fn destroy(&self) -> Result<(), StoreError> {
        match self.close().await {
            Ok(()) | Err(StoreError::Closed) => {}
            Err(e) => return Err(e),
        }

        if let Some(root) = &self.uid_root {
            debug!(root = %root.display(), "removing store directory");
            return match tokio::fs::remove_dir_all(root).await {
                Err(e) if e.kind() != io::ErrorKind::NotFound => Err(StoreError::Io(e)),
                _ => Ok(()),
            };
        }

        let removals = self.files.iter().map(|handle| async move {
            match tokio::fs::remove_file(handle.path()).await {
                Err(e) if e.kind() != io::ErrorKind::NotFound => Err(StoreError::Io(e)),
                _ => Ok(()),
            }
        });
        future::try_join_all(removals).await?;
        Ok(())
    }
}
