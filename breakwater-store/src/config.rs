//! Construction options for chunk stores.
//!
//! All layout decisions are made once here: cumulative file offsets,
//! reserved-character stripping in file names, per-instance unique
//! directories, and the bounded/unbounded split. Stores receive a fully
//! resolved plan and never re-validate at call time.

use std::env;
use std::path::PathBuf;

/// Errors raised synchronously while constructing a store.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Chunk length of zero can address nothing
    #[error("chunk length must be greater than zero")]
    InvalidChunkLength,

    /// Explicit `length` disagrees with the sum of `files` lengths
    #[error("total `files` length {files_total} does not match explicit `length` {declared}")]
    LengthMismatch {
        /// Sum of the configured file lengths
        files_total: u64,
        /// The explicit `length` option
        declared: u64,
    },

    /// An explicit `files` list must name at least one file
    #[error("`files` must contain at least one entry")]
    EmptyFiles,

    /// Raw encryption keys must be exactly 32 bytes for AES-256
    #[error("encryption key must be exactly 32 bytes, got {actual}")]
    InvalidKeyLength {
        /// Length of the rejected key material
        actual: usize,
    },
}

/// One backing file in an explicit store layout.
#[derive(Debug, Clone)]
pub struct FileSpec {
    /// File path, resolved against the store root when one is configured
    pub path: PathBuf,
    /// File length in bytes
    pub length: u64,
    /// Byte offset within the store; defaults to the cumulative sum of
    /// preceding file lengths
    pub offset: Option<u64>,
}

/// Options shared by both store implementations.
///
/// With `files` the store is bounded by the sum of their lengths. With only
/// `length` it is bounded by a single backing file. With neither, it is an
/// auto-growing single file placed under the OS temp directory.
#[derive(Debug, Clone, Default)]
pub struct StoreOptions {
    /// Root directory for backing files, or the single backing file path
    /// when no `files` are given. Defaults to the OS temp directory plus
    /// the generated instance name.
    pub path: Option<PathBuf>,
    /// Instance identifier; defaults to 20 random bytes, hex encoded
    pub name: Option<String>,
    /// Place backing files under a per-instance `path/name/` subdirectory
    /// so several stores can share one root without collisions
    pub add_uid: bool,
    /// Explicit backing file layout
    pub files: Option<Vec<FileSpec>>,
    /// Explicit total size in bytes
    pub length: Option<u64>,
}

/// Backing file with its final path and resolved extent.
#[derive(Debug, Clone)]
pub(crate) struct ResolvedFile {
    pub path: PathBuf,
    pub offset: u64,
    pub length: u64,
}

/// How the store's logical address space maps onto disk.
#[derive(Debug, Clone)]
pub(crate) enum BackingPlan {
    /// Single file that grows as chunks are written
    Unbounded { file: PathBuf },
    /// Fixed total length spread over one or more files
    Bounded {
        files: Vec<ResolvedFile>,
        total_length: u64,
    },
}

/// Fully validated construction output.
#[derive(Debug, Clone)]
pub(crate) struct ResolvedStorage {
    pub plan: BackingPlan,
    /// Per-instance directory to remove wholesale on destroy, present only
    /// when `add_uid` grouped the files under one
    pub uid_root: Option<PathBuf>,
}

/// Validates options and computes the final on-disk layout.
pub(crate) fn resolve(
    chunk_length: u64,
    options: StoreOptions,
) -> Result<ResolvedStorage, ConfigError> {
    if chunk_length == 0 {
        return Err(ConfigError::InvalidChunkLength);
    }

    let name = options.name.unwrap_or_else(generated_name);

    let Some(specs) = options.files else {
        // Single-file store: bounded when a length was declared, otherwise
        // auto-growing.
        let path = options
            .path
            .unwrap_or_else(|| env::temp_dir().join("breakwater-store").join(&name));

        let plan = match options.length {
            Some(total_length) => BackingPlan::Bounded {
                files: vec![ResolvedFile {
                    path,
                    offset: 0,
                    length: total_length,
                }],
                total_length,
            },
            None => BackingPlan::Unbounded { file: path },
        };
        return Ok(ResolvedStorage {
            plan,
            uid_root: None,
        });
    };

    if specs.is_empty() {
        return Err(ConfigError::EmptyFiles);
    }

    let uid_root = if options.add_uid {
        options.path.as_ref().map(|root| root.join(&name))
    } else {
        None
    };

    let base = match (&options.path, &uid_root) {
        (_, Some(uid)) => Some(uid.clone()),
        (Some(root), None) => Some(root.clone()),
        (None, None) => None,
    };

    let mut files = Vec::with_capacity(specs.len());
    let mut next_offset = 0;
    for spec in specs {
        let offset = spec.offset.unwrap_or(next_offset);
        next_offset = offset + spec.length;

        let file_name = spec
            .path
            .file_name()
            .map(|n| sanitize_file_name(&n.to_string_lossy()))
            .unwrap_or_default();
        let mut dir = spec.path.parent().map(PathBuf::from).unwrap_or_default();
        if let Some(base) = &base {
            dir = base.join(dir);
        }

        files.push(ResolvedFile {
            path: dir.join(file_name),
            offset,
            length: spec.length,
        });
    }

    let files_total: u64 = files.iter().map(|file| file.length).sum();
    if let Some(declared) = options.length
        && declared != files_total
    {
        return Err(ConfigError::LengthMismatch {
            files_total,
            declared,
        });
    }

    Ok(ResolvedStorage {
        plan: BackingPlan::Bounded {
            files,
            total_length: files_total,
        },
        uid_root,
    })
}

fn generated_name() -> String {
    let bytes: [u8; 20] = rand::random();
    hex::encode(bytes)
}

/// Strips characters that are reserved in file names on common filesystems,
/// along with control bytes.
fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*') && !c.is_control())
        .collect()
}
