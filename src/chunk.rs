//! Overlapping character-window chunker.
//!
//! Splits item body text into [`Chunk`]s of `chunk_size` characters, each
//! window starting `chunk_size - chunk_overlap` characters after the previous
//! one. Offsets count Unicode scalar values, never bytes, so a window never
//! cuts a multi-byte character in half.
//!
//! Each chunk receives a UUID v5 derived from its item ID and index, plus a
//! SHA-256 hash of its text. Both are pure functions of the input, so the
//! same body and configuration always produce byte-identical chunks.
//!
//! # Example
//!
//! ```rust
//! use satoshi_rag::chunk::chunk_text;
//!
//! let body = "x".repeat(450);
//! let chunks = chunk_text("emails-1", &body, 200, 50);
//! let spans: Vec<(usize, usize)> = chunks.iter().map(|c| (c.start, c.end)).collect();
//! assert_eq!(spans, vec![(0, 200), (150, 350), (300, 450)]);
//! ```

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::config::ChunkingConfig;
use crate::models::{Chunk, ScrapedItem};

/// Namespace for chunk UUIDs.
const CHUNK_NAMESPACE: Uuid = Uuid::from_u128(0x5a70_5b1e_2c0d_4e8a_9f31_6d2b_7c4e_1a90);

/// Split text into overlapping windows.
///
/// Returns chunks with contiguous indices starting at 0. Text no longer
/// than `chunk_size` yields exactly one chunk; empty text yields none.
pub fn chunk_text(item_id: &str, text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<Chunk> {
    // Byte offset of every char boundary, including the end of the text.
    let boundaries: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let char_len = boundaries.len() - 1;

    if char_len == 0 {
        return Vec::new();
    }

    let size = chunk_size.max(1);
    let stride = size - chunk_overlap.min(size - 1);

    let mut chunks = Vec::new();
    let mut start = 0usize;
    loop {
        let end = (start + size).min(char_len);
        let piece = &text[boundaries[start]..boundaries[end]];
        chunks.push(make_chunk(item_id, chunks.len(), piece, start, end));
        if end == char_len {
            break;
        }
        start += stride;
    }

    chunks
}

/// Chunk one item according to the configuration.
///
/// When chunking is disabled the whole body becomes a single chunk.
pub fn chunk_item(item: &ScrapedItem, config: &ChunkingConfig, enabled: bool) -> Vec<Chunk> {
    if enabled {
        chunk_text(
            &item.id,
            &item.body_text,
            config.chunk_size,
            config.chunk_overlap,
        )
    } else if item.body_text.is_empty() {
        Vec::new()
    } else {
        let len = item.body_text.chars().count();
        vec![make_chunk(&item.id, 0, &item.body_text, 0, len)]
    }
}

fn make_chunk(item_id: &str, index: usize, text: &str, start: usize, end: usize) -> Chunk {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    let id = Uuid::new_v5(&CHUNK_NAMESPACE, format!("{}#{}", item_id, index).as_bytes());

    Chunk {
        id: id.to_string(),
        item_id: item_id.to_string(),
        index,
        text: text.to_string(),
        start,
        end,
        hash,
    }
}
