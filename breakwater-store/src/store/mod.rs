//! Chunk store contract and its two implementations.
//!
//! A chunk store persists fixed-length byte chunks addressed by index and
//! serves random-access reads back out. [`FileChunkStore`] writes raw bytes
//! across one or more backing files; [`EncryptedChunkStore`] applies the
//! same file mapping to AES-256-CTR ciphertext so chunk data never reaches
//! disk in plaintext. The download engine consumes either through the
//! [`ChunkStore`] trait.

mod backing;
pub mod encrypted;
pub mod filesystem;

use async_trait::async_trait;
pub use encrypted::EncryptedChunkStore;
pub use filesystem::FileChunkStore;

use crate::layout::ChunkIndex;

/// Sub-range selection for [`ChunkStore::get`].
///
/// Defaults request the whole chunk. `length` of `None` means "from
/// `offset` to the end of the chunk".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GetOptions {
    /// Byte offset within the chunk to start reading at
    pub offset: u64,
    /// Number of bytes to read; defaults to the rest of the chunk
    pub length: Option<u64>,
}

impl GetOptions {
    /// Selects `length` bytes starting at `offset` within the chunk.
    pub fn range(offset: u64, length: u64) -> Self {
        Self {
            offset,
            length: Some(length),
        }
    }
}

/// Chunk persistence operations consumed by the download engine.
///
/// Both implementations share the same chunk-to-file mapping; they differ
/// only in the bytes that reach disk. Writes to the same index are not
/// synchronized against each other; callers that need ordering must
/// serialize their own writes, or accept last-writer-wins.
///
/// All operations report failures through the returned `Result`; callers
/// that do not care about an outcome discard the result explicitly.
#[async_trait]
pub trait ChunkStore: Send + Sync {
    /// Bytes per chunk (the final chunk of a bounded store may be shorter).
    fn chunk_length(&self) -> u64;

    /// Persists one chunk durably.
    ///
    /// # Errors
    ///
    /// - `StoreError::LengthMismatch` - If `buf` is not exactly the chunk's expected size; nothing is written
    /// - `StoreError::NoMatchingFiles` - If no backing file covers `index`
    /// - `StoreError::Closed` - If the store was closed
    /// - `StoreError::Io` - If any backing-file write failed
    async fn put(&self, index: ChunkIndex, buf: &[u8]) -> Result<(), StoreError>;

    /// Reads a chunk, or the sub-range selected by `opts`.
    ///
    /// Returns exactly the requested number of bytes; a zero-length request
    /// returns an empty buffer without touching the filesystem.
    ///
    /// # Errors
    ///
    /// - `StoreError::InvalidRange` - If the window exceeds the chunk's bounds
    /// - `StoreError::NoMatchingFiles` - If no backing file covers the window
    /// - `StoreError::Closed` - If the store was closed
    /// - `StoreError::Io` - If a backing-file read failed
    async fn get(&self, index: ChunkIndex, opts: GetOptions) -> Result<Vec<u8>, StoreError>;

    /// Closes the store and every backing file that was opened.
    ///
    /// Closing is one-way; operations started afterwards fail.
    ///
    /// # Errors
    ///
    /// - `StoreError::Closed` - If the store was already closed
    async fn close(&self) -> Result<(), StoreError>;

    /// Closes the store (if still open) and deletes all backing storage.
    ///
    /// Backing files that already disappeared are not an error.
    ///
    /// # Errors
    ///
    /// - `StoreError::Io` - If deleting existing backing storage failed
    async fn destroy(&self) -> Result<(), StoreError>;
}

/// Errors that occur during chunk store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Put buffer does not match the chunk's expected size
    #[error("chunk {index} expects {expected} bytes, got {actual}")]
    LengthMismatch {
        /// Index the write was addressed to
        index: ChunkIndex,
        /// Expected chunk size in bytes
        expected: u64,
        /// Size of the rejected buffer
        actual: usize,
    },

    /// Get window falls outside the chunk's bounds
    #[error("invalid offset {offset} and/or length {length:?} for chunk {index}")]
    InvalidRange {
        /// Index the read was addressed to
        index: ChunkIndex,
        /// Requested starting offset within the chunk
        offset: u64,
        /// Requested length, if one was given
        length: Option<u64>,
    },

    /// No backing file covers the requested chunk or window
    #[error("no files matching the requested range for chunk {index}")]
    NoMatchingFiles {
        /// Index with no mapped targets
        index: ChunkIndex,
    },

    /// Operation attempted after `close()` or `destroy()`
    #[error("store is closed")]
    Closed,

    /// Underlying filesystem failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
