//! Similarity-search retrieval with a relevance cutoff.
//!
//! A linear cosine-similarity scan over every embedded chunk — acceptable
//! at the scale of a handful of books; no approximate-nearest-neighbor
//! structure is needed. Results are sorted descending by score with ties
//! broken by original chunk order for determinism, truncated to `k`, and
//! filtered by a minimum threshold.
//!
//! An empty result is a first-class outcome, not an error: it is the
//! primary out-of-domain signal that sends the orchestrator down the
//! fallback path instead of calling the language model.

use serde::{Deserialize, Serialize};

use crate::embedding::cosine_similarity;
use crate::models::{Chunk, SourceRef};

/// A chunk paired with its embedding vector; the unit stored in the index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddedChunk {
    pub chunk: Chunk,
    pub embedding: Vec<f32>,
}

/// One retrieval hit.
#[derive(Debug, Clone)]
pub struct RetrievedChunk {
    pub chunk: Chunk,
    /// Cosine similarity to the query, `>= threshold` by construction.
    pub score: f32,
}

/// An ordered sequence of hits, descending by score, length `<= k`.
#[derive(Debug, Clone, Default)]
pub struct RetrievalResult {
    pub hits: Vec<RetrievedChunk>,
}

impl RetrievalResult {
    /// True when nothing cleared the relevance threshold: the query is
    /// out of domain and no grounding is available.
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// Provenance entries for the caller-facing `sources` field.
    pub fn sources(&self) -> Vec<SourceRef> {
        self.hits
            .iter()
            .map(|hit| SourceRef {
                document: hit.chunk.document_title.clone(),
                location: format!("p. {}", hit.chunk.page),
                score: hit.score,
            })
            .collect()
    }
}

/// Rank every embedded chunk against `query_vec` and keep the top `k`
/// that score at least `threshold`.
pub fn search(
    entries: &[EmbeddedChunk],
    query_vec: &[f32],
    k: usize,
    threshold: f32,
) -> RetrievalResult {
    let mut scored: Vec<(usize, f32)> = entries
        .iter()
        .enumerate()
        .map(|(i, e)| (i, cosine_similarity(query_vec, &e.embedding)))
        .collect();

    scored.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.0.cmp(&b.0))
    });

    let hits = scored
        .into_iter()
        .filter(|(_, score)| *score >= threshold)
        .take(k)
        .map(|(i, score)| RetrievedChunk {
            chunk: entries[i].chunk.clone(),
            score,
        })
        .collect();

    RetrievalResult { hits }
}
