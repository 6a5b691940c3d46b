//! Overlapping fixed-size window chunking.
//!
//! Windows are measured in characters, not bytes, so multi-byte text never
//! splits a code point. Every non-final window has length exactly
//! `max_chars` and consecutive windows share `overlap` characters.

use sha2::{Digest, Sha256};

/// Split document text into overlapping windows covering it left to right.
///
/// Empty or whitespace-only input yields no chunks. `overlap` is clamped
/// below `max_chars` so the window always advances.
pub fn chunk_text(text: &str, max_chars: usize, overlap: usize) -> Vec<String> {
    let text = text.trim();
    if text.is_empty() || max_chars == 0 {
        return Vec::new();
    }
    let overlap = overlap.min(max_chars - 1);

    let chars: Vec<char> = text.chars().collect();
    let n = chars.len();
    let mut chunks = Vec::new();
    let mut start = 0usize;

    loop {
        let end = (start + max_chars).min(n);
        chunks.push(chars[start..end].iter().collect());
        if end >= n {
            break;
        }
        start = end - overlap;
    }

    chunks
}

/// Stable chunk id: hex SHA-256 of `"{source}::{index}"`.
///
/// Re-chunking unchanged content reproduces the same ids, which is what
/// makes ingest an upsert rather than an append.
pub fn stable_chunk_id(source: &str, index: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    hasher.update(b"::");
    hasher.update(index.to_string().as_bytes());
    format!("{:x}", hasher.finalize())
}
