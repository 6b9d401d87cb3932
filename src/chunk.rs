//! Overlapping sliding-window text chunker.
//!
//! Splits document body text into fixed-size [`Chunk`]s of `size` characters,
//! each overlapping its predecessor by `overlap` characters so that context
//! spanning a window boundary is never lost to retrieval.
//!
//! Windows advance by `size - overlap` characters, which gives two useful
//! properties: stripping the first `overlap` characters from every chunk but
//! the first reassembles the input exactly, and text of at most `size`
//! characters yields exactly one chunk equal to the whole text.
//!
//! Each chunk receives a UUID plus a SHA-256 hash of its text for staleness
//! detection across re-ingestion.

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::models::Chunk;

/// Split text into overlapping windows of `size` characters.
///
/// Sizes are measured in characters, not bytes; slicing is char-boundary
/// safe for multi-byte input. Chunks are produced left to right with
/// contiguous ranks starting at 0, and trailing content shorter than `size`
/// is kept.
///
/// # Panics
///
/// Panics if `size == 0` or `overlap >= size`. Both are rejected earlier by
/// config validation; violating them here is a caller bug.
pub fn chunk_text(source: &str, text: &str, size: usize, overlap: usize) -> Vec<Chunk> {
    assert!(size > 0, "chunk size must be > 0");
    assert!(overlap < size, "chunk overlap must be smaller than chunk size");

    // Byte offset of every char boundary, with the total length appended so
    // bounds[i]..bounds[j] is always a valid slice of `text`.
    let bounds: Vec<usize> = text
        .char_indices()
        .map(|(offset, _)| offset)
        .chain(std::iter::once(text.len()))
        .collect();
    let char_count = bounds.len() - 1;

    if char_count <= size {
        return vec![make_chunk(source, 0, text)];
    }

    let mut chunks = Vec::new();
    let mut start = 0usize;
    let mut seq: i64 = 0;

    loop {
        let end = (start + size).min(char_count);
        chunks.push(make_chunk(source, seq, &text[bounds[start]..bounds[end]]));
        seq += 1;

        if end == char_count {
            break;
        }
        start = end - overlap;
    }

    chunks
}

fn make_chunk(source: &str, seq: i64, text: &str) -> Chunk {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    Chunk {
        id: Uuid::new_v4().to_string(),
        source: source.to_string(),
        seq,
        text: text.to_string(),
        hash,
    }
}
