//! # Taleforge
//!
//! A retrieval-augmented storyteller: answers questions about a small
//! shelf of classic books, grounded strictly in their text, in the
//! voice of a playful narrator — with optional scene illustrations and
//! spoken narration.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌──────────────┐   ┌─────────────┐
//! │ .txt books │──▶│ Chunk + Embed │──▶│ In-memory    │
//! │ (corpus)   │   │  (cached)     │   │ vector index │
//! └───────────┘   └──────────────┘   └──────┬──────┘
//!                                           │
//!                              ┌────────────┴────────────┐
//!                              ▼                         ▼
//!                       ┌────────────┐           ┌─────────────┐
//!                       │    CLI     │           │  HTTP API    │
//!                       │ (taleforge)│           │ /chat, /...  │
//!                       └────────────┘           └─────────────┘
//! ```
//!
//! Every question is embedded and matched against the index; if nothing
//! clears the relevance threshold the system answers with a canned
//! redirection instead of calling the language model, so it cannot be
//! coaxed off its shelf.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`corpus`] | Book loading and corpus fingerprinting |
//! | [`embedding`] | Embedding provider implementations |
//! | [`index`] | The vector index and its on-disk cache |
//! | [`lang`] | Supported languages and canned messages |
//! | [`llm`] | Chat-model provider implementations |
//! | [`media`] | Scene illustration and narration generation |
//! | [`storyteller`] | The answer orchestrator |
//! | [`transcribe`] | Speech-to-text for voice questions |
//! | [`server`] | JSON HTTP API |
//!
//! Pure retrieval primitives (chunking, cosine search, sessions) live
//! in the `taleforge-core` crate, which has no I/O dependencies.

pub mod config;
pub mod corpus;
pub mod embedding;
pub mod index;
pub mod lang;
pub mod llm;
pub mod media;
pub mod server;
pub mod storyteller;
pub mod transcribe;
