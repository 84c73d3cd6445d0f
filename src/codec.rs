//! Chunk codec: partitions a payload into fixed-size pieces and rebuilds it.
//!
//! Pure logic, no I/O. Chunk `i` of an object always covers the byte range
//! `i * chunk_size .. min((i + 1) * chunk_size, total_len)`; every other part
//! of the crate derives offsets from [`ChunkLayout`] so that the regions stay
//! disjoint.

use std::ops::Range;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("chunk size must be greater than zero")]
    ZeroChunkSize,
    #[error("chunk index {index} out of range (object has {count} chunks)")]
    IndexOutOfRange { index: u64, count: u64 },
    #[error("chunk {0} supplied more than once")]
    DuplicateChunk(u64),
    #[error("chunk {0} missing")]
    MissingChunk(u64),
    #[error("chunk {index} has {actual} bytes, expected {expected}")]
    LengthMismatch {
        index: u64,
        expected: usize,
        actual: usize,
    },
}

/// Geometry of one stored object: its total length and the chunk size it was
/// written with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkLayout {
    chunk_size: usize,
    total_len: usize,
}

impl ChunkLayout {
    pub fn new(chunk_size: usize, total_len: usize) -> Result<Self, CodecError> {
        if chunk_size == 0 {
            return Err(CodecError::ZeroChunkSize);
        }
        Ok(Self {
            chunk_size,
            total_len,
        })
    }

    pub fn total_len(&self) -> usize {
        self.total_len
    }

    /// Number of chunks, `ceil(total_len / chunk_size)`. Zero for an empty object.
    pub fn count(&self) -> u64 {
        self.total_len.div_ceil(self.chunk_size) as u64
    }

    /// Byte range covered by chunk `index` within the whole object.
    pub fn range(&self, index: u64) -> Result<Range<usize>, CodecError> {
        let count = self.count();
        if index >= count {
            return Err(CodecError::IndexOutOfRange { index, count });
        }
        // index < count, so index * chunk_size < total_len and fits in usize.
        let start = index as usize * self.chunk_size;
        let end = (start + self.chunk_size).min(self.total_len);
        Ok(start..end)
    }
}

/// Walk `buffer` in non-overlapping windows of `chunk_size`, yielding each
/// window with its zero-based index. The last window holds the remainder.
pub fn split(
    buffer: &[u8],
    chunk_size: usize,
) -> Result<impl Iterator<Item = (u64, &[u8])>, CodecError> {
    if chunk_size == 0 {
        return Err(CodecError::ZeroChunkSize);
    }
    Ok(buffer
        .chunks(chunk_size)
        .enumerate()
        .map(|(index, data)| (index as u64, data)))
}

/// Incrementally rebuilds an object from chunks arriving in any order.
///
/// Each chunk is copied into its own region of a buffer allocated up front,
/// and every index must be supplied exactly once before [`finish`] succeeds.
///
/// [`finish`]: Reassembler::finish
#[derive(Debug)]
pub struct Reassembler {
    layout: ChunkLayout,
    buffer: Vec<u8>,
    seen: Vec<bool>,
    remaining: u64,
}

impl Reassembler {
    pub fn new(layout: ChunkLayout) -> Self {
        let count = layout.count();
        Self {
            layout,
            buffer: vec![0u8; layout.total_len()],
            seen: vec![false; count as usize],
            remaining: count,
        }
    }

    /// Copy chunk `index` into place.
    pub fn place(&mut self, index: u64, data: &[u8]) -> Result<(), CodecError> {
        let range = self.layout.range(index)?;
        let slot = &mut self.seen[index as usize];
        if *slot {
            return Err(CodecError::DuplicateChunk(index));
        }
        if data.len() != range.len() {
            return Err(CodecError::LengthMismatch {
                index,
                expected: range.len(),
                actual: data.len(),
            });
        }
        self.buffer[range].copy_from_slice(data);
        *slot = true;
        self.remaining -= 1;
        Ok(())
    }

    pub fn is_complete(&self) -> bool {
        self.remaining == 0
    }

    /// Return the rebuilt buffer, or the first index that never arrived.
    pub fn finish(self) -> Result<Vec<u8>, CodecError> {
        if let Some(missing) = self.seen.iter().position(|seen| !seen) {
            return Err(CodecError::MissingChunk(missing as u64));
        }
        Ok(self.buffer)
    }
}

/// Rebuild an object of `total_len` bytes from `(index, bytes)` pairs.
///
/// Missing or duplicate indices are errors; the caller must have fetched the
/// complete set.
pub fn reassemble<I, B>(chunk_size: usize, total_len: usize, chunks: I) -> Result<Vec<u8>, CodecError>
where
    I: IntoIterator<Item = (u64, B)>,
    B: AsRef<[u8]>,
{
    let mut reassembler = Reassembler::new(ChunkLayout::new(chunk_size, total_len)?);
    for (index, data) in chunks {
        reassembler.place(index, data.as_ref())?;
    }
    reassembler.finish()
}
