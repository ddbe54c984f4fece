//! The answer orchestrator.
//!
//! Turns one user question into an [`AnswerBundle`]: embed the query,
//! retrieve grounding passages, either answer through the language
//! model or short-circuit to the out-of-domain fallback, then fan out
//! to image and narration generation concurrently before assembling
//! the result and updating the session.
//!
//! Failure policy: embedding or language-model failures at request time
//! degrade to a short in-persona message — the caller always receives a
//! well-formed bundle, never a raw internal error. Media failures and
//! timeouts degrade the affected field to `None`.

use chrono::Utc;
use std::sync::Arc;
use tokio::time::timeout;
use tracing::{error, info, warn};

use taleforge_core::embedding::Embedder;
use taleforge_core::models::{AnswerBundle, Turn};
use taleforge_core::retrieval::RetrievalResult;
use taleforge_core::session::SessionStore;

use crate::config::Config;
use crate::index::Index;
use crate::lang;
use crate::llm::ChatModel;
use crate::media::MediaGenerator;

/// Persona and grounding rules prepended to every language-model call.
const PERSONA: &str = "You are a witty, warm-hearted storyteller with a shelf of classic books \
     and a flair for the dramatic. Answer the question using ONLY the story passages provided \
     below — never invent events that are not in them. Keep the answer short (a few sentences), \
     playful, and in the voice of a storyteller addressing a curious listener. When it fits, \
     mention which book the tale comes from.";

/// One incoming question with its delivery options.
#[derive(Debug, Clone)]
pub struct AnswerRequest {
    pub question: String,
    pub session_id: String,
    pub language: String,
    pub want_image: bool,
    pub want_audio: bool,
    /// Scheme+host+port used to absolutize media URLs, e.g.
    /// `"http://localhost:8000"`.
    pub base_url: String,
}

pub struct Storyteller {
    top_k: usize,
    threshold: f32,
    history_turns: usize,
    index: Arc<Index>,
    embedder: Arc<dyn Embedder>,
    chat: Arc<dyn ChatModel>,
    media: Arc<MediaGenerator>,
    sessions: Arc<SessionStore>,
}

impl Storyteller {
    pub fn new(
        config: &Config,
        index: Arc<Index>,
        embedder: Arc<dyn Embedder>,
        chat: Arc<dyn ChatModel>,
        media: Arc<MediaGenerator>,
        sessions: Arc<SessionStore>,
    ) -> Self {
        Self {
            top_k: config.retrieval.top_k,
            threshold: config.retrieval.threshold,
            history_turns: config.llm.history_turns,
            index,
            embedder,
            chat,
            media,
            sessions,
        }
    }

    /// Number of embedded chunks backing retrieval.
    pub fn index_size(&self) -> usize {
        self.index.len()
    }

    /// Answer one question. Infallible by design: every failure mode
    /// maps to a degraded but well-formed bundle.
    pub async fn answer(&self, req: &AnswerRequest) -> AnswerBundle {
        let query_vec = match self.embedder.embed(&req.question).await {
            Ok(vec) => vec,
            Err(e) => {
                error!(error = %e, "query embedding failed");
                return self.finish(req, lang::error_message(&req.language), None, None, None);
            }
        };

        let retrieved = self.index.search(&query_vec, self.top_k, self.threshold);

        if retrieved.is_empty() {
            // No grounding available: canned response, no model call.
            info!(question = %req.question, "out-of-domain question, using fallback");
            let answer = lang::fallback_message(&req.language).to_string();
            let (image_url, audio_url) = self.side_generation(req, &answer).await;
            return self.finish(req, &answer, image_url, audio_url, None);
        }

        let history = self.recent_history(&req.session_id);
        let prompt = build_prompt(&retrieved, &req.question, &req.language);

        let answer = match self.chat.complete(&prompt, &history).await {
            Ok(text) => text,
            Err(e) => {
                error!(error = %e, model = self.chat.model_name(), "answer generation failed");
                return self.finish(req, lang::error_message(&req.language), None, None, None);
            }
        };
        info!(chars = answer.len(), hits = retrieved.hits.len(), "answer generated");

        // Both side channels derive from the answer text, so they start
        // only now — but independently of each other.
        let (image_url, audio_url) = self.side_generation(req, &answer).await;

        self.finish(req, &answer, image_url, audio_url, Some(&retrieved))
    }

    /// Record the exchange and assemble the bundle.
    fn finish(
        &self,
        req: &AnswerRequest,
        answer: &str,
        image_url: Option<String>,
        audio_url: Option<String>,
        retrieved: Option<&RetrievalResult>,
    ) -> AnswerBundle {
        self.sessions
            .record_exchange(&req.session_id, &req.question, answer);

        AnswerBundle {
            answer: answer.to_string(),
            image_url: image_url.map(|u| absolutize(&req.base_url, &u)),
            audio_url: audio_url.map(|u| absolutize(&req.base_url, &u)),
            sources: retrieved.map(|r| r.sources()).unwrap_or_default(),
            grounded: retrieved.is_some(),
            created_at: Utc::now(),
        }
    }

    /// Run image and narration generation concurrently, each under its
    /// own timeout. Either failing or timing out degrades that field
    /// only; the combined wall-clock cost is close to the slower of the
    /// two, not their sum.
    async fn side_generation(
        &self,
        req: &AnswerRequest,
        answer: &str,
    ) -> (Option<String>, Option<String>) {
        let image = async {
            if !req.want_image || !self.media.images_enabled() {
                return None;
            }
            match timeout(
                self.media.image_timeout(),
                self.media.generate_image(&req.question, answer),
            )
            .await
            {
                Ok(Ok(url)) => Some(url),
                Ok(Err(e)) => {
                    warn!(error = %e, "image generation failed");
                    None
                }
                Err(_) => {
                    warn!("image generation timed out");
                    None
                }
            }
        };

        let audio = async {
            if !req.want_audio || !self.media.audio_enabled() {
                return None;
            }
            match timeout(
                self.media.audio_timeout(),
                self.media.generate_audio(answer, &req.language),
            )
            .await
            {
                Ok(Ok(url)) => Some(url),
                Ok(Err(e)) => {
                    warn!(error = %e, "audio generation failed");
                    None
                }
                Err(_) => {
                    warn!("audio generation timed out");
                    None
                }
            }
        };

        tokio::join!(image, audio)
    }

    /// The most recent session turns, oldest first, capped for the prompt.
    fn recent_history(&self, session_id: &str) -> Vec<Turn> {
        let turns = self.sessions.history(session_id);
        let skip = turns.len().saturating_sub(self.history_turns);
        turns.into_iter().skip(skip).collect()
    }
}

/// Assemble the grounded prompt: persona, retrieved passages with
/// provenance labels, the question, and a language directive when the
/// answer should not be English.
fn build_prompt(retrieved: &RetrievalResult, question: &str, language: &str) -> String {
    let mut passages = String::new();
    for hit in &retrieved.hits {
        passages.push_str(&format!("[{}]\n{}\n\n", hit.chunk.location(), hit.chunk.text));
    }

    let mut prompt = format!("{PERSONA}\n\nStory passages:\n\n{passages}Question: {question}");

    if language != lang::DEFAULT_LANGUAGE {
        prompt.push_str(&format!(
            "\n\nIMPORTANT: Respond entirely in {}. Do not use English.",
            lang::display_name(language)
        ));
    }

    prompt
}

/// Root-relative media paths become absolute against the request's base
/// URL, so the UI can load them regardless of which origin served it.
fn absolutize(base_url: &str, url: &str) -> String {
    if url.starts_with('/') {
        format!("{}{}", base_url.trim_end_matches('/'), url)
    } else {
        url.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MediaConfig;
    use anyhow::Result;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use taleforge_core::models::Chunk;
    use taleforge_core::retrieval::EmbeddedChunk;
    use tempfile::TempDir;

    /// Embeds "mushroom" questions near the mushroom chunks and
    /// everything else orthogonally to the whole corpus.
    struct KeywordEmbedder;

    #[async_trait]
    impl Embedder for KeywordEmbedder {
        fn model_name(&self) -> &str {
            "keyword-mock"
        }
        fn dims(&self) -> usize {
            3
        }
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| {
                    if t.to_lowercase().contains("mushroom") {
                        vec![1.0, 0.0, 0.0]
                    } else {
                        vec![0.0, 0.0, 1.0]
                    }
                })
                .collect())
        }
    }

    struct MockChat {
        calls: AtomicUsize,
        seen_history: Mutex<Vec<usize>>,
        fail: bool,
    }

    impl MockChat {
        fn new(fail: bool) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                seen_history: Mutex::new(Vec::new()),
                fail,
            }
        }
    }

    #[async_trait]
    impl ChatModel for MockChat {
        fn model_name(&self) -> &str {
            "chat-mock"
        }
        async fn complete(&self, prompt: &str, history: &[Turn]) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen_history.lock().unwrap().push(history.len());
            if self.fail {
                anyhow::bail!("model overloaded");
            }
            assert!(prompt.contains("Story passages"));
            Ok("Alice grew tall as a house, then shrank again!".to_string())
        }
    }

    fn mushroom_index() -> Arc<Index> {
        let chunk = |i: usize, text: &str, page: usize| Chunk {
            id: format!("alice#{i}"),
            document_id: "alice".to_string(),
            document_title: "Alice's Adventures in Wonderland".to_string(),
            chunk_index: i,
            start_char: i * 100,
            end_char: i * 100 + 100,
            page,
            text: text.to_string(),
        };
        Arc::new(Index {
            fingerprint: "test".to_string(),
            model_name: "keyword-mock".to_string(),
            dims: 3,
            entries: vec![
                EmbeddedChunk {
                    chunk: chunk(0, "Alice nibbled the mushroom and shot up like a telescope.", 23),
                    embedding: vec![1.0, 0.0, 0.0],
                },
                EmbeddedChunk {
                    chunk: chunk(1, "The caterpillar sat on the mushroom smoking a hookah.", 22),
                    embedding: vec![0.9, 0.1, 0.0],
                },
                EmbeddedChunk {
                    chunk: chunk(2, "The Queen shouted, off with their heads!", 60),
                    embedding: vec![0.0, 1.0, 0.0],
                },
            ],
        })
    }

    struct Fixture {
        storyteller: Storyteller,
        chat: Arc<MockChat>,
        sessions: Arc<SessionStore>,
        _tmp: TempDir,
    }

    fn fixture(fail_chat: bool) -> Fixture {
        let tmp = TempDir::new().unwrap();
        let media = Arc::new(
            MediaGenerator::new(MediaConfig {
                images_enabled: false,
                audio_enabled: false,
                static_dir: tmp.path().to_path_buf(),
                ..MediaConfig::default()
            })
            .unwrap(),
        );
        let sessions = Arc::new(SessionStore::new(12));
        let chat = Arc::new(MockChat::new(fail_chat));

        let config_toml = r#"
[corpus]
dir = "unused"
cache_path = "unused"
[chunking]
size = 100
[retrieval]
top_k = 5
threshold = 0.25
[embedding]
provider = "local"
[llm]
provider = "openai"
model = "mock"
history_turns = 4
[server]
bind = "127.0.0.1:0"
"#;
        let config: Config = toml::from_str(config_toml).unwrap();

        let storyteller = Storyteller::new(
            &config,
            mushroom_index(),
            Arc::new(KeywordEmbedder),
            chat.clone(),
            media,
            sessions.clone(),
        );

        Fixture {
            storyteller,
            chat,
            sessions,
            _tmp: tmp,
        }
    }

    fn request(question: &str, language: &str) -> AnswerRequest {
        AnswerRequest {
            question: question.to_string(),
            session_id: "s1".to_string(),
            language: language.to_string(),
            want_image: false,
            want_audio: false,
            base_url: "http://localhost:8000".to_string(),
        }
    }

    #[tokio::test]
    async fn test_grounded_answer_with_sources() {
        let fx = fixture(false);
        let bundle = fx
            .storyteller
            .answer(&request("What happened when Alice ate the mushroom?", "en"))
            .await;

        assert!(bundle.grounded);
        assert!(bundle.answer.contains("telescope") || bundle.answer.contains("shrank"));
        assert!(!bundle.sources.is_empty());
        assert_eq!(bundle.sources[0].location, "p. 23");
        assert_eq!(fx.chat.calls.load(Ordering::SeqCst), 1);

        let turns = fx.sessions.history("s1");
        assert_eq!(turns.len(), 2);
        assert!(turns[0].content.contains("mushroom"));
    }

    #[tokio::test]
    async fn test_out_of_domain_short_circuits() {
        let fx = fixture(false);
        let bundle = fx
            .storyteller
            .answer(&request("What's the capital of France?", "en"))
            .await;

        assert!(!bundle.grounded);
        assert!(bundle.sources.is_empty());
        assert_eq!(bundle.answer, lang::fallback_message("en"));
        // No grounding means no language-model call at all.
        assert_eq!(fx.chat.calls.load(Ordering::SeqCst), 0);
        // The fallback exchange still lands in the session.
        assert_eq!(fx.sessions.history("s1").len(), 2);
    }

    #[tokio::test]
    async fn test_fallback_is_translated() {
        let fx = fixture(false);
        let bundle = fx
            .storyteller
            .answer(&request("What's the capital of France?", "es"))
            .await;
        assert_eq!(bundle.answer, lang::fallback_message("es"));
    }

    #[tokio::test]
    async fn test_model_failure_degrades_in_persona() {
        let fx = fixture(true);
        let bundle = fx
            .storyteller
            .answer(&request("What happened when Alice ate the mushroom?", "en"))
            .await;

        assert!(!bundle.grounded);
        assert_eq!(bundle.answer, lang::error_message("en"));
        assert!(bundle.image_url.is_none());
        assert!(bundle.audio_url.is_none());
        // The degraded exchange is still recorded.
        assert_eq!(fx.sessions.history("s1").len(), 2);
    }

    #[tokio::test]
    async fn test_history_is_truncated_for_the_model() {
        let fx = fixture(false);
        for i in 0..5 {
            fx.sessions
                .record_exchange("s1", &format!("q{i}"), &format!("a{i}"));
        }
        fx.storyteller
            .answer(&request("Tell me about the mushroom again", "en"))
            .await;

        let seen = fx.chat.seen_history.lock().unwrap();
        // history_turns = 4 in the fixture config.
        assert_eq!(*seen, vec![4]);
    }

    #[tokio::test]
    async fn test_sessions_do_not_leak_across_ids() {
        let fx = fixture(false);
        let mut a = request("What about the mushroom?", "en");
        a.session_id = "alpha".into();
        let mut b = request("What's the capital of France?", "en");
        b.session_id = "beta".into();

        let (_, _) = tokio::join!(fx.storyteller.answer(&a), fx.storyteller.answer(&b));

        let alpha = fx.sessions.history("alpha");
        let beta = fx.sessions.history("beta");
        assert_eq!(alpha.len(), 2);
        assert_eq!(beta.len(), 2);
        assert!(alpha[0].content.contains("mushroom"));
        assert!(beta[0].content.contains("France"));
    }

    #[test]
    fn test_absolutize() {
        assert_eq!(
            absolutize("http://localhost:8000", "/static/images/x.png"),
            "http://localhost:8000/static/images/x.png"
        );
        assert_eq!(
            absolutize("http://localhost:8000/", "/static/audio/y.mp3"),
            "http://localhost:8000/static/audio/y.mp3"
        );
        assert_eq!(
            absolutize("http://localhost:8000", "https://cdn.example/z.png"),
            "https://cdn.example/z.png"
        );
    }

    #[test]
    fn test_prompt_carries_provenance_and_language() {
        let index = mushroom_index();
        let retrieved = index.search(&[1.0, 0.0, 0.0], 5, 0.25);
        let prompt = build_prompt(&retrieved, "What about the mushroom?", "fr");
        assert!(prompt.contains("Alice's Adventures in Wonderland, p. 23"));
        assert!(prompt.contains("Question: What about the mushroom?"));
        assert!(prompt.contains("Respond entirely in Français"));

        let english = build_prompt(&retrieved, "What about the mushroom?", "en");
        assert!(!english.contains("Respond entirely"));
    }
}
