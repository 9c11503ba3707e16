//! Filesystem-backed chunk store writing raw bytes.

use async_trait::async_trait;

use super::backing::Backing;
use super::{ChunkStore, GetOptions, StoreError};
use crate::config::{ConfigError, StoreOptions};
use crate::layout::ChunkIndex;

/// Chunk store persisting raw bytes across one or more backing files.
///
/// Writes split each chunk along the precomputed chunk map; reads fetch
/// only the requested sub-range from disk. For at-rest encryption use
/// [`EncryptedChunkStore`](super::EncryptedChunkStore).
pub struct FileChunkStore {
    backing: Backing,
}

impl FileChunkStore {
    /// Creates a store persisting `chunk_length`-byte chunks per `options`.
    ///
    /// # Errors
    ///
    /// - `ConfigError` - If the chunk length, file layout, or explicit
    ///   length option are invalid
    pub fn new(chunk_length: u64, options: StoreOptions) -> Result<Self, ConfigError> {
        Ok(Self {
            backing: Backing::from_options(chunk_length, options)?,
        })
    }
}

#[async_trait]
impl ChunkStore for FileChunkStore {
    fn chunk_length(&self) -> u64 {
        self.backing.chunk_length()
    }

    async fn put(&self, index: ChunkIndex, buf: &[u8]) -> Result<(), StoreError> {
        self.backing.ensure_open()?;
        self.backing.validate_put(index, buf.len())?;
        self.backing.write_chunk(index, buf).await
    }

    async fn get(&self, index: ChunkIndex, opts: GetOptions) -> Result<Vec<u8>, StoreError> {
        self.backing.ensure_open()?;
        let (range_from, range_to) = self.backing.resolve_window(index, opts)?;
        if range_from == range_to {
            return Ok(Vec::new());
        }

        if self.backing.layout().is_unbounded() {
            self.backing
                .read_unbounded(index, range_from, range_to)
                .await
        } else {
            self.backing.read_window(index, range_from, range_to).await
        }
    }

    async fn close(&self) -> Result<(), StoreError> {
        self.backing.close().await
    }

    async fn destroy(&self) -> Result<(), StoreError> {
        self.backing.destroy().await
    }
}
