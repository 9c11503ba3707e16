//! Chunk geometry and the chunk-to-file mapping planner.
//!
//! Pure byte-offset arithmetic with no I/O. `ChunkLayout` answers per-index
//! size questions, `build_chunk_map` computes how each chunk's bytes are
//! distributed across the backing files.

use std::fmt;

/// Zero-based index of a chunk within a store.
///
/// Chunks are the addressable unit of `put`/`get`. Each chunk has a
/// sequential index starting from 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChunkIndex(pub u32);

impl ChunkIndex {
    /// Creates ChunkIndex from zero-based index.
    pub fn new(index: u32) -> Self {
        Self(index)
    }

    /// Returns the underlying chunk index as u32.
    pub fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ChunkIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Byte extent of a backing file within the store's logical address space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileExtent {
    /// Cumulative byte offset of the file within the store
    pub offset: u64,
    /// File length in bytes
    pub length: u64,
}

/// One span of a chunk mapped onto a backing file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkTarget {
    /// Byte offset within the chunk where this span begins
    pub from: u64,
    /// Byte offset within the chunk where this span ends (exclusive)
    pub to: u64,
    /// Byte offset within the backing file where the span begins
    pub file_offset: u64,
    /// Index into the store's file table
    pub file: usize,
}

impl ChunkTarget {
    /// Number of chunk bytes this span covers.
    pub fn len(&self) -> u64 {
        self.to - self.from
    }

    /// Whether the span covers no bytes.
    pub fn is_empty(&self) -> bool {
        self.to == self.from
    }
}

/// Chunk size arithmetic for a store's declared length.
///
/// Every chunk is `chunk_length` bytes except the final chunk of a bounded
/// store, which holds the remainder of the total length.
#[derive(Debug, Clone, Copy)]
pub struct ChunkLayout {
    chunk_length: u64,
    bounds: Option<Bounds>,
}

#[derive(Debug, Clone, Copy)]
struct Bounds {
    total_length: u64,
    last_chunk_index: u32,
    last_chunk_length: u64,
}

impl ChunkLayout {
    /// Creates layout for a store with a declared total length.
    pub fn bounded(chunk_length: u64, total_length: u64) -> Self {
        let last_chunk_length = match total_length % chunk_length {
            0 => chunk_length,
            remainder => remainder,
        };
        let last_chunk_index = total_length.div_ceil(chunk_length).saturating_sub(1) as u32;

        Self {
            chunk_length,
            bounds: Some(Bounds {
                total_length,
                last_chunk_index,
                last_chunk_length,
            }),
        }
    }

    /// Creates layout for an auto-growing store backed by a single file.
    pub fn unbounded(chunk_length: u64) -> Self {
        Self {
            chunk_length,
            bounds: None,
        }
    }

    /// Bytes per chunk (except possibly the final chunk).
    pub fn chunk_length(&self) -> u64 {
        self.chunk_length
    }

    /// Whether the store grows on demand instead of having a fixed size.
    pub fn is_unbounded(&self) -> bool {
        self.bounds.is_none()
    }

    /// Declared total length, or `None` for an auto-growing store.
    pub fn total_length(&self) -> Option<u64> {
        self.bounds.as_ref().map(|b| b.total_length)
    }

    /// Index of the final chunk, or `None` for an auto-growing store.
    pub fn last_chunk_index(&self) -> Option<ChunkIndex> {
        self.bounds.as_ref().map(|b| ChunkIndex::new(b.last_chunk_index))
    }

    /// Expected byte size of the chunk at `index`.
    pub fn chunk_size_of(&self, index: ChunkIndex) -> u64 {
        match &self.bounds {
            Some(bounds) if index.as_u32() == bounds.last_chunk_index => bounds.last_chunk_length,
            _ => self.chunk_length,
        }
    }
}

/// Computes, for every chunk index, the spans the chunk must be split
/// across the backing files.
///
/// For each file overlapping chunk `p`: `from`/`to` bracket the file's
/// bytes within the chunk, `file_offset` is where chunk `p` begins within
/// the file. Files are walked in order, so targets within a chunk come out
/// ordered by `from` ascending whenever the extents are contiguous.
///
/// Auto-growing stores never call this: chunk `i` always lives at byte
/// offset `i * chunk_length` in their single file.
pub fn build_chunk_map(files: &[FileExtent], chunk_length: u64) -> Vec<Vec<ChunkTarget>> {
    let chunk_count = files
        .iter()
        .map(|file| file.offset + file.length)
        .max()
        .map(|end| end.div_ceil(chunk_length))
        .unwrap_or(0);

    let mut map: Vec<Vec<ChunkTarget>> = vec![Vec::new(); chunk_count as usize];

    for (file_index, file) in files.iter().enumerate() {
        if file.length == 0 {
            continue;
        }

        let file_start = file.offset;
        let file_end = file.offset + file.length;

        let first_chunk = file_start / chunk_length;
        let last_chunk = (file_end - 1) / chunk_length;

        for p in first_chunk..=last_chunk {
            let chunk_start = p * chunk_length;
            let chunk_end = chunk_start + chunk_length;

            let from = file_start.saturating_sub(chunk_start);
            let to = if file_end > chunk_end {
                chunk_length
            } else {
                file_end - chunk_start
            };
            let file_offset = chunk_start.saturating_sub(file_start);

            map[p as usize].push(ChunkTarget {
                from,
                to,
                file_offset,
                file: file_index,
            });
        }
    }

    map
}
