//! Fixed-size overlapping text chunker.
//!
//! Splits a document into character windows of `size` advancing by
//! `size - overlap`, so each chunk repeats the last `overlap` characters
//! of its predecessor. The final window may be shorter. Each chunk keeps
//! its character offset range and an approximate page label so a
//! retrieval hit can be mapped back to a location in the source book.
//!
//! Chunking is a pure function: the same document and parameters always
//! yield the same chunk sequence.

use crate::error::CoreError;
use crate::models::{Chunk, Document};

/// Characters per approximate "page" of a source book. Used only for the
/// human-readable location label, not for any retrieval decision.
pub const PAGE_CHARS: usize = 1800;

/// Split a document into overlapping character windows.
///
/// # Errors
///
/// Returns [`CoreError::InvalidChunking`] when `size == 0` or
/// `overlap >= size` (the window would never advance).
///
/// # Guarantees
///
/// - Chunk indices are contiguous: `0, 1, 2, …, N-1`.
/// - Windows are `size` characters except possibly the last.
/// - Concatenating the chunks with the leading `overlap` characters
///   stripped from every chunk after the first reconstructs the
///   document text exactly.
/// - An empty document yields no chunks.
pub fn chunk_document(doc: &Document, size: usize, overlap: usize) -> Result<Vec<Chunk>, CoreError> {
    if size == 0 || overlap >= size {
        return Err(CoreError::InvalidChunking { size, overlap });
    }

    // Byte offset of every character, so char windows map to &str slices.
    let char_starts: Vec<usize> = doc.text.char_indices().map(|(b, _)| b).collect();
    let total_chars = char_starts.len();
    let step = size - overlap;

    let mut chunks = Vec::new();
    let mut start = 0usize;
    let mut index = 0usize;

    while start < total_chars {
        let end = (start + size).min(total_chars);
        let byte_start = char_starts[start];
        let byte_end = if end == total_chars {
            doc.text.len()
        } else {
            char_starts[end]
        };

        chunks.push(Chunk {
            id: format!("{}#{}", doc.id, index),
            document_id: doc.id.clone(),
            document_title: doc.title.clone(),
            chunk_index: index,
            start_char: start,
            end_char: end,
            page: start / PAGE_CHARS + 1,
            text: doc.text[byte_start..byte_end].to_string(),
        });

        if end == total_chars {
            break;
        }
        start += step;
        index += 1;
    }

    Ok(chunks)
}
