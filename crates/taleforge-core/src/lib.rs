//! # Taleforge Core
//!
//! Shared, I/O-free logic for Taleforge: data models, the character-window
//! chunker, the embedder trait, cosine-similarity retrieval, and the
//! bounded session store.
//!
//! This crate contains no tokio runtime, no filesystem access, and no
//! network clients. Everything here is deterministic and unit-testable;
//! the `taleforge` app crate supplies the embedding backends, the corpus
//! loader, the language-model clients, and the HTTP surface.

pub mod chunk;
pub mod embedding;
pub mod error;
pub mod models;
pub mod retrieval;
pub mod session;
