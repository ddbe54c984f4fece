//! Core data models used throughout Taleforge.
//!
//! These types represent the documents, chunks, conversation turns, and
//! answer bundles that flow through the retrieval and generation pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A source text (one book). Immutable after ingestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Stable identifier (derived from the source filename).
    pub id: String,
    /// Display title (e.g. `"Alice's Adventures in Wonderland"`).
    pub title: String,
    /// Full raw text.
    pub text: String,
}

/// A fixed-size overlapping slice of a [`Document`], the retrieval unit.
///
/// Offsets are in characters (not bytes) so that the overlap arithmetic
/// holds on multibyte text. Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    /// `"{document_id}#{chunk_index}"`.
    pub id: String,
    pub document_id: String,
    /// Carried alongside so retrieval results need no document lookup.
    pub document_title: String,
    /// Position within the document's chunk sequence, starting at 0.
    pub chunk_index: usize,
    /// Start offset in characters, inclusive.
    pub start_char: usize,
    /// End offset in characters, exclusive.
    pub end_char: usize,
    /// Approximate page in the source, 1-based.
    pub page: usize,
    pub text: String,
}

impl Chunk {
    /// Human-readable provenance label, e.g. `"Gulliver's Travels, p. 42"`.
    pub fn location(&self) -> String {
        format!("{}, p. {}", self.document_title, self.page)
    }
}

/// Who spoke a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One (role, text) entry in a session's bounded history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Provenance entry surfaced to the caller alongside an answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceRef {
    /// Document title.
    pub document: String,
    /// Approximate location within the document (`"p. 42"`).
    pub location: String,
    /// Cosine similarity of the backing chunk to the query.
    pub score: f32,
}

/// The response to one query.
///
/// Ephemeral: returned to the caller and echoed into session history,
/// never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct AnswerBundle {
    pub answer: String,
    /// Absolute URL of the generated illustration, if any.
    pub image_url: Option<String>,
    /// Absolute URL of the generated narration, if any.
    pub audio_url: Option<String>,
    /// Retrieval provenance; empty on the fallback path.
    pub sources: Vec<SourceRef>,
    /// False when the answer is the out-of-domain fallback or an
    /// in-persona error message.
    pub grounded: bool,
    pub created_at: DateTime<Utc>,
}
