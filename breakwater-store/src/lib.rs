//! Breakwater Store - chunk persistence for the Breakwater download engine
//!
//! This crate provides the storage backend a download engine plugs its
//! piece traffic into: fixed-length byte chunks persisted across one or
//! more backing files, with random-access reads and writes by chunk index.
//! The encrypted variant applies per-chunk AES-256-CTR so chunk data never
//! reaches disk in plaintext while keeping random access intact.

pub mod config;
pub mod crypto;
mod handle;
pub mod layout;
pub mod store;

// Re-export main types for convenient access
pub use config::{ConfigError, FileSpec, StoreOptions};
pub use crypto::EncryptionKey;
pub use layout::{ChunkIndex, ChunkLayout};
pub use store::{ChunkStore, EncryptedChunkStore, FileChunkStore, GetOptions, StoreError};
