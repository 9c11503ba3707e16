//! Chunk store with mandatory at-rest AES-256-CTR encryption.

use async_trait::async_trait;

use super::backing::Backing;
use super::{ChunkStore, GetOptions, StoreError};
use crate::config::{ConfigError, StoreOptions};
use crate::crypto::{ChunkCipher, EncryptionKey};
use crate::layout::ChunkIndex;

/// Chunk store that never lets chunk data reach disk in plaintext.
///
/// Each chunk is encrypted as one AES-256-CTR unit under an IV derived
/// from its index, then split across backing files exactly like
/// [`FileChunkStore`](super::FileChunkStore). Because the keystream
/// position depends only on the chunk index and byte offset, a chunk
/// decrypts identically no matter how many files its ciphertext was
/// scattered over.
///
/// Reads must reassemble the ciphertext chunk from offset zero before
/// decrypting, so unlike the plain store a sub-range `get` still reads the
/// chunk prefix from disk. That extra I/O buys correctness of the
/// keystream alignment.
pub struct EncryptedChunkStore {
    backing: Backing,
    cipher: ChunkCipher,
}

impl EncryptedChunkStore {
    /// Creates an encrypted store; there is no unencrypted fallback mode.
    ///
    /// # Errors
    ///
    /// - `ConfigError` - If the chunk length, file layout, or explicit
    ///   length option are invalid
    pub fn new(
        chunk_length: u64,
        options: StoreOptions,
        key: EncryptionKey,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            backing: Backing::from_options(chunk_length, options)?,
            cipher: ChunkCipher::new(key),
        })
    }
}

#[async_trait]
impl ChunkStore for EncryptedChunkStore {
    fn chunk_length(&self) -> u64 {
        self.backing.chunk_length()
    }

    async fn put(&self, index: ChunkIndex, buf: &[u8]) -> Result<(), StoreError> {
        self.backing.ensure_open()?;
        self.backing.validate_put(index, buf.len())?;

        let mut encrypted = buf.to_vec();
        self.cipher.encrypt(index, &mut encrypted);
        self.backing.write_chunk(index, &encrypted).await
    }

    /// Reads a chunk sub-range by materializing and decrypting the chunk's
    /// ciphertext prefix.
    ///
    /// A chunk whose leading bytes belong to no backing file is
    /// reconstructed with a zero-filled ciphertext gap; those bytes
    /// decrypt to unspecified values and are only observable when a
    /// caller configures non-contiguous file offsets and then requests
    /// the unbacked region.
    async fn get(&self, index: ChunkIndex, opts: GetOptions) -> Result<Vec<u8>, StoreError> {
        self.backing.ensure_open()?;
        let (range_from, range_to) = self.backing.resolve_window(index, opts)?;
        if range_from == range_to {
            return Ok(Vec::new());
        }

        let mut assembled = if self.backing.layout().is_unbounded() {
            let chunk_size = self.backing.layout().chunk_size_of(index);
            self.backing.read_unbounded(index, 0, chunk_size).await?
        } else {
            self.backing
                .read_cipher_prefix(index, range_from, range_to)
                .await?
        };

        self.cipher.decrypt(index, &mut assembled);
        Ok(assembled[range_from as usize..range_to as usize].to_vec())
    }

    async fn close(&self) -> Result<(), StoreError> {
        self.backing.close().await
    }

    async fn destroy(&self) -> Result<(), StoreError> {
        self.backing.destroy().await
    }
}
