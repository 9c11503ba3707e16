//! Chunk encryption: AES-256-CTR keyed per chunk index.
//!
//! CTR mode keeps random access intact: the keystream position depends only
//! on the IV and the byte offset within the chunk, never on how the chunk's
//! bytes are later split across backing files. The IV is derived solely
//! from the chunk index, so any chunk decrypts independently.

use std::fmt;

use aes::Aes256;
use cipher::{KeyIvInit, StreamCipher};
use ctr::Ctr128BE;
use sha2::{Digest, Sha256};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::config::ConfigError;
use crate::layout::ChunkIndex;

/// AES-256 in CTR mode with the full 16-byte IV as big-endian counter,
/// matching the common `aes-256-ctr` wire behavior.
type Aes256Ctr = Ctr128BE<Aes256>;

/// Key length required by AES-256.
pub const KEY_LENGTH: usize = 32;

/// IV length of the AES block size.
const IV_LENGTH: usize = 16;

/// 32-byte key for the encrypted store, zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct EncryptionKey([u8; KEY_LENGTH]);

impl EncryptionKey {
    /// Derives a key as the SHA-256 digest of a passphrase.
    pub fn from_passphrase(passphrase: &str) -> Self {
        let digest = Sha256::digest(passphrase.as_bytes());
        Self(digest.into())
    }

    /// Uses raw key material directly.
    ///
    /// # Errors
    ///
    /// - `ConfigError::InvalidKeyLength` - If `bytes` is not exactly 32 bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ConfigError> {
        let key: [u8; KEY_LENGTH] = bytes
            .try_into()
            .map_err(|_| ConfigError::InvalidKeyLength {
                actual: bytes.len(),
            })?;
        Ok(Self(key))
    }
}

impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EncryptionKey(..)")
    }
}

/// Applies the per-chunk AES-256-CTR transform.
///
/// Encryption and decryption are the same keystream XOR; both names exist
/// so call sites read correctly.
pub(crate) struct ChunkCipher {
    key: EncryptionKey,
}

impl ChunkCipher {
    pub fn new(key: EncryptionKey) -> Self {
        Self { key }
    }

    /// Encrypts a whole plaintext chunk in place.
    pub fn encrypt(&self, index: ChunkIndex, buffer: &mut [u8]) {
        self.apply(index, buffer);
    }

    /// Decrypts a ciphertext chunk (or a prefix of one) in place.
    pub fn decrypt(&self, index: ChunkIndex, buffer: &mut [u8]) {
        self.apply(index, buffer);
    }

    fn apply(&self, index: ChunkIndex, buffer: &mut [u8]) {
        let iv = chunk_iv(index);
        let mut cipher = Aes256Ctr::new(&self.key.0.into(), &iv.into());
        cipher.apply_keystream(buffer);
    }
}

/// Deterministic IV for a chunk: zero except the last 4 bytes, which hold
/// the big-endian chunk index.
fn chunk_iv(index: ChunkIndex) -> [u8; IV_LENGTH] {
    let mut iv = [0u8; IV_LENGTH];
    iv[12..].copy_from_slice(&index.as_u32().to_be_bytes());
    iv
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passphrase_key_is_sha256_of_passphrase() {
        let key = EncryptionKey::from_passphrase("correct horse battery staple");
        let digest: [u8; 32] = Sha256::digest(b"correct horse battery staple").into();
        assert_eq!(key.0, digest);
    }

    #[test]
    fn passphrase_derivation_is_deterministic() {
        let a = EncryptionKey::from_passphrase("secret");
        let b = EncryptionKey::from_passphrase("secret");
        assert_eq!(a.0, b.0);
    }

    #[test]
    fn raw_key_must_be_exactly_32_bytes() {
        assert!(EncryptionKey::from_bytes(&[7u8; 32]).is_ok());

        for bad_length in [0, 16, 31, 33, 64] {
            let result = EncryptionKey::from_bytes(&vec![7u8; bad_length]);
            assert!(
                matches!(result, Err(ConfigError::InvalidKeyLength { actual }) if actual == bad_length)
            );
        }
    }

    #[test]
    fn iv_holds_big_endian_index_in_last_four_bytes() {
        let iv = chunk_iv(ChunkIndex::new(0x01020304));
        assert_eq!(&iv[..12], &[0u8; 12]);
        assert_eq!(&iv[12..], &[0x01, 0x02, 0x03, 0x04]);
    }

    #[test]
    fn encrypt_then_decrypt_round_trips() {
        let cipher = ChunkCipher::new(EncryptionKey::from_passphrase("key"));
        let plaintext: Vec<u8> = (0..=255).collect();

        let mut buffer = plaintext.clone();
        cipher.encrypt(ChunkIndex::new(3), &mut buffer);
        assert_ne!(buffer, plaintext);

        cipher.decrypt(ChunkIndex::new(3), &mut buffer);
        assert_eq!(buffer, plaintext);
    }

    #[test]
    fn different_indices_produce_different_ciphertext() {
        let cipher = ChunkCipher::new(EncryptionKey::from_passphrase("key"));
        let plaintext = vec![0xABu8; 64];

        let mut first = plaintext.clone();
        let mut second = plaintext.clone();
        cipher.encrypt(ChunkIndex::new(0), &mut first);
        cipher.encrypt(ChunkIndex::new(1), &mut second);

        assert_ne!(first, second);
    }

    #[test]
    fn prefix_decryption_matches_full_decryption() {
        // The read path decrypts a chunk prefix when the requested window
        // ends before the chunk does; the keystream must line up.
        let cipher = ChunkCipher::new(EncryptionKey::from_passphrase("key"));
        let plaintext: Vec<u8> = (0u8..200).collect();

        let mut full = plaintext.clone();
        cipher.encrypt(ChunkIndex::new(9), &mut full);

        let mut prefix = full[..77].to_vec();
        cipher.decrypt(ChunkIndex::new(9), &mut prefix);
        assert_eq!(prefix, &plaintext[..77]);
    }

    #[test]
    fn wrong_key_does_not_round_trip() {
        let cipher = ChunkCipher::new(EncryptionKey::from_passphrase("key"));
        let other = ChunkCipher::new(EncryptionKey::from_passphrase("other"));
        let plaintext = b"0123456789".to_vec();

        let mut buffer = plaintext.clone();
        cipher.encrypt(ChunkIndex::new(0), &mut buffer);
        other.decrypt(ChunkIndex::new(0), &mut buffer);

        assert_ne!(buffer, plaintext);
    }
}
