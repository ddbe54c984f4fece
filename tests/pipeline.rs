//! End-to-end pipeline tests: corpus on disk through chunking,
//! embedding, caching, retrieval, and answer orchestration, using
//! deterministic in-process providers instead of network APIs.

use anyhow::Result;
use async_trait::async_trait;
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

use taleforge::config::Config;
use taleforge::corpus;
use taleforge::index::Index;
use taleforge::media::MediaGenerator;
use taleforge::storyteller::{AnswerRequest, Storyteller};
use taleforge_core::embedding::Embedder;
use taleforge_core::models::Turn;
use taleforge_core::session::SessionStore;

const ALICE: &str = "Alice was beginning to get very tired of sitting by her sister on the bank, \
     and of having nothing to do. Suddenly a White Rabbit with pink eyes ran close by her. \
     There was nothing so very remarkable in that; but when the Rabbit actually took a watch \
     out of its waistcoat-pocket, Alice started to her feet, for it flashed across her mind \
     that she had never before seen a rabbit with either a waistcoat-pocket, or a watch to \
     take out of it.";

const GULLIVER: &str = "My father had a small estate in Nottinghamshire: I was the third of five \
     sons. When I awoke in Lilliput, I attempted to rise, but was not able to stir: my arms and \
     legs were strongly fastened on each side to the ground, and I felt several slender \
     ligatures across my body.";

/// Deterministic topic-axis embedder: each known topic gets its own
/// dimension, and topics absent from the corpus ("taxes") get a
/// dimension no chunk occupies. Keyword-free filler text lands on a
/// shared filler axis, which both corpus chunks and queries may touch,
/// so only a real topic match can clear the relevance threshold.
struct TopicEmbedder {
    calls: AtomicUsize,
}

impl TopicEmbedder {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Embedder for TopicEmbedder {
    fn model_name(&self) -> &str {
        "topic-mock-v1"
    }

    fn dims(&self) -> usize {
        4
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts
            .iter()
            .map(|t| {
                let lower = t.to_lowercase();
                if lower.contains("rabbit") {
                    vec![1.0, 0.0, 0.0, 0.0]
                } else if lower.contains("lilliput") {
                    vec![0.0, 1.0, 0.0, 0.0]
                } else if lower.contains("taxes") {
                    // A topic the corpus does not cover at all.
                    vec![0.0, 0.0, 0.0, 1.0]
                } else {
                    vec![0.0, 0.0, 1.0, 0.0]
                }
            })
            .collect())
    }
}

struct CannedChat;

#[async_trait]
impl taleforge::llm::ChatModel for CannedChat {
    fn model_name(&self) -> &str {
        "canned"
    }

    async fn complete(&self, prompt: &str, _history: &[Turn]) -> Result<String> {
        assert!(prompt.contains("Story passages"));
        Ok("Why, the White Rabbit checked his pocket watch and dashed off!".to_string())
    }
}

fn seed_books(dir: &std::path::Path) {
    fs::write(dir.join("alice_in_wonderland.txt"), ALICE).unwrap();
    fs::write(dir.join("gullivers_travels.txt"), GULLIVER).unwrap();
}

fn test_config(root: &std::path::Path) -> Config {
    let body = format!(
        r#"[corpus]
dir = "{root}/books"
cache_path = "{root}/cache/index.json"

[chunking]
size = 120
overlap = 20

[retrieval]
top_k = 3
threshold = 0.3

[embedding]
provider = "local"

[llm]
provider = "openai"
model = "canned"

[media]
images_enabled = false
audio_enabled = false
static_dir = "{root}/static"

[server]
bind = "127.0.0.1:0"
"#,
        root = root.display()
    );
    toml::from_str(&body).unwrap()
}

async fn build_index(config: &Config, embedder: &TopicEmbedder) -> Index {
    let documents = corpus::load_documents(&config.corpus.dir).unwrap();
    let fingerprint = corpus::fingerprint(
        &config.corpus.dir,
        embedder.model_name(),
        embedder.dims(),
        &config.chunking,
    )
    .unwrap();
    Index::load_or_build(
        &documents,
        embedder,
        &config.chunking,
        &config.corpus.cache_path,
        fingerprint,
    )
    .await
    .unwrap()
}

fn storyteller(config: &Config, index: Index) -> Storyteller {
    Storyteller::new(
        config,
        Arc::new(index),
        Arc::new(TopicEmbedder::new()),
        Arc::new(CannedChat),
        Arc::new(MediaGenerator::new(config.media.clone()).unwrap()),
        Arc::new(SessionStore::new(config.session.max_turns)),
    )
}

#[tokio::test]
async fn test_corpus_to_grounded_answer() {
    let tmp = TempDir::new().unwrap();
    fs::create_dir_all(tmp.path().join("books")).unwrap();
    seed_books(&tmp.path().join("books"));
    let config = test_config(tmp.path());

    let embedder = TopicEmbedder::new();
    let index = build_index(&config, &embedder).await;
    assert!(!index.is_empty());

    let teller = storyteller(&config, index);
    let bundle = teller
        .answer(&AnswerRequest {
            question: "What did the White Rabbit do?".to_string(),
            session_id: "it".to_string(),
            language: "en".to_string(),
            want_image: false,
            want_audio: false,
            base_url: "http://localhost:8000".to_string(),
        })
        .await;

    assert!(bundle.grounded);
    assert!(bundle.answer.contains("pocket watch"));
    assert!(!bundle.sources.is_empty());
    assert!(bundle
        .sources
        .iter()
        .all(|s| s.document == "Alice In Wonderland"));
}

#[tokio::test]
async fn test_off_topic_question_falls_back() {
    let tmp = TempDir::new().unwrap();
    fs::create_dir_all(tmp.path().join("books")).unwrap();
    seed_books(&tmp.path().join("books"));
    let config = test_config(tmp.path());

    let embedder = TopicEmbedder::new();
    let index = build_index(&config, &embedder).await;
    let teller = storyteller(&config, index);

    let bundle = teller
        .answer(&AnswerRequest {
            question: "How do I file my taxes?".to_string(),
            session_id: "it".to_string(),
            language: "en".to_string(),
            want_image: false,
            want_audio: false,
            base_url: "http://localhost:8000".to_string(),
        })
        .await;

    assert!(!bundle.grounded);
    assert!(bundle.sources.is_empty());
    assert_eq!(bundle.answer, taleforge::lang::fallback_message("en"));
}

#[tokio::test]
async fn test_second_startup_reuses_cache() {
    let tmp = TempDir::new().unwrap();
    fs::create_dir_all(tmp.path().join("books")).unwrap();
    seed_books(&tmp.path().join("books"));
    let config = test_config(tmp.path());

    let embedder = TopicEmbedder::new();
    let first = build_index(&config, &embedder).await;
    let batches_for_build = embedder.calls.load(Ordering::SeqCst);
    assert!(batches_for_build > 0);

    // Same corpus and settings: the cache must satisfy the second load
    // without any embedding calls.
    let second = build_index(&config, &embedder).await;
    assert_eq!(embedder.calls.load(Ordering::SeqCst), batches_for_build);
    assert_eq!(first.len(), second.len());
}
