//! The in-memory retrieval index and its on-disk cache.
//!
//! Building an index is the expensive part of startup: every book is
//! chunked and every chunk embedded. The result is serialized to a JSON
//! cache file alongside the fingerprint it was built from, so a restart
//! with an unchanged corpus and model deserializes in milliseconds
//! instead of re-embedding. A fingerprint mismatch always triggers a
//! full rebuild; the cache is never partially reused.
//!
//! After startup the index is read-only and shared across all requests
//! without locking.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use taleforge_core::chunk::chunk_document;
use taleforge_core::embedding::Embedder;
use taleforge_core::error::CoreError;
use taleforge_core::models::Document;
use taleforge_core::retrieval::{self, EmbeddedChunk, RetrievalResult};

use crate::config::ChunkingConfig;

/// Chunk texts sent per embedding call during a build.
const EMBED_BATCH: usize = 64;

/// The full set of embedded chunks for the active corpus.
#[derive(Debug, Serialize, Deserialize)]
pub struct Index {
    /// Fingerprint of the corpus + model + chunking this index was built from.
    pub fingerprint: String,
    /// Embedding model identifier; must match the live embedder.
    pub model_name: String,
    pub dims: usize,
    pub entries: Vec<EmbeddedChunk>,
}

impl Index {
    /// Chunk and embed every document. Vectors are validated against
    /// the embedder's declared dimensionality before being stored.
    pub async fn build(
        documents: &[Document],
        embedder: &dyn Embedder,
        chunking: &ChunkingConfig,
        fingerprint: String,
    ) -> Result<Self> {
        let mut chunks = Vec::new();
        for doc in documents {
            chunks.extend(chunk_document(doc, chunking.size, chunking.overlap)?);
        }
        info!(
            documents = documents.len(),
            chunks = chunks.len(),
            model = embedder.model_name(),
            "building index"
        );

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(EMBED_BATCH) {
            vectors.extend(embedder.embed_batch(batch).await?);
        }

        if vectors.len() != chunks.len() {
            anyhow::bail!(
                "embedder returned {} vectors for {} chunks",
                vectors.len(),
                chunks.len()
            );
        }
        for vec in &vectors {
            if vec.len() != embedder.dims() {
                return Err(CoreError::DimensionMismatch {
                    expected: embedder.dims(),
                    got: vec.len(),
                }
                .into());
            }
        }

        let entries = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, embedding)| EmbeddedChunk { chunk, embedding })
            .collect();

        Ok(Self {
            fingerprint,
            model_name: embedder.model_name().to_string(),
            dims: embedder.dims(),
            entries,
        })
    }

    /// Use the cache at `cache_path` when its fingerprint matches,
    /// otherwise rebuild and persist.
    pub async fn load_or_build(
        documents: &[Document],
        embedder: &dyn Embedder,
        chunking: &ChunkingConfig,
        cache_path: &Path,
        fingerprint: String,
    ) -> Result<Self> {
        if let Some(cached) = Self::try_load(cache_path, &fingerprint, embedder.model_name()) {
            info!(
                chunks = cached.entries.len(),
                path = %cache_path.display(),
                "index cache hit, skipping embedding"
            );
            return Ok(cached);
        }

        let index = Self::build(documents, embedder, chunking, fingerprint).await?;
        index.persist(cache_path)?;
        Ok(index)
    }

    /// Returns the cached index only on an exact fingerprint and model
    /// match. Any read or parse failure is treated as a miss.
    fn try_load(cache_path: &Path, fingerprint: &str, model_name: &str) -> Option<Self> {
        let content = std::fs::read_to_string(cache_path).ok()?;
        let cached: Self = serde_json::from_str(&content).ok()?;
        if cached.fingerprint == fingerprint && cached.model_name == model_name {
            Some(cached)
        } else {
            info!("index cache stale (corpus, model, or chunking changed), rebuilding");
            None
        }
    }

    /// Write the serialized index to `cache_path`, creating parent
    /// directories as needed.
    pub fn persist(&self, cache_path: &Path) -> Result<()> {
        if let Some(parent) = cache_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = std::fs::File::create(cache_path)
            .with_context(|| format!("Failed to create cache file: {}", cache_path.display()))?;
        serde_json::to_writer(std::io::BufWriter::new(file), self)?;
        info!(path = %cache_path.display(), chunks = self.entries.len(), "index cache written");
        Ok(())
    }

    /// Rank chunks against a query vector; see [`retrieval::search`].
    pub fn search(&self, query_vec: &[f32], k: usize, threshold: f32) -> RetrievalResult {
        retrieval::search(&self.entries, query_vec, k, threshold)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
