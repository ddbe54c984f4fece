//! Core error taxonomy.
//!
//! Only errors that are structurally detectable inside the core live here.
//! Backend failures (embedding APIs, language models) surface as `anyhow`
//! errors in the app crate.

use thiserror::Error;

/// Errors produced by the core pipeline.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Chunking parameters that cannot produce a forward-advancing window.
    /// Fatal at startup, never recoverable.
    #[error("invalid chunking parameters: overlap ({overlap}) must be smaller than size ({size}), and size must be > 0")]
    InvalidChunking { size: usize, overlap: usize },

    /// A vector with the wrong dimensionality reached the index. Mixing
    /// embeddings from different model versions is invalid.
    #[error("embedding dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
}

pub type Result<T> = std::result::Result<T, CoreError>;
