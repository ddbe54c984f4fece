use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub corpus: CorpusConfig,
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    pub embedding: EmbeddingConfig,
    pub llm: LlmConfig,
    #[serde(default)]
    pub media: MediaConfig,
    #[serde(default)]
    pub session: SessionConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CorpusConfig {
    /// Directory of `.txt` books.
    pub dir: PathBuf,
    /// Serialized chunk+embedding cache, rebuilt when the fingerprint changes.
    pub cache_path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    /// Window size in characters.
    pub size: usize,
    /// Characters repeated from the previous window.
    #[serde(default = "default_overlap")]
    pub overlap: usize,
}

fn default_overlap() -> usize {
    200
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Maximum chunks returned per query.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Minimum cosine similarity for a chunk to count as grounding.
    #[serde(default = "default_threshold")]
    pub threshold: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            threshold: default_threshold(),
        }
    }
}

fn default_top_k() -> usize {
    5
}
fn default_threshold() -> f32 {
    0.25
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    /// `"openai"`, `"ollama"`, or `"local"`.
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL for the Ollama provider.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    /// `"openai"` or `"gemini"`.
    pub provider: String,
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
    /// Session turns forwarded to the model as short-term context.
    #[serde(default = "default_history_turns")]
    pub history_turns: usize,
}

fn default_temperature() -> f32 {
    0.8
}
fn default_max_tokens() -> u32 {
    400
}
fn default_llm_timeout_secs() -> u64 {
    60
}
fn default_history_turns() -> usize {
    6
}

#[derive(Debug, Deserialize, Clone)]
pub struct MediaConfig {
    #[serde(default = "default_true")]
    pub images_enabled: bool,
    #[serde(default = "default_true")]
    pub audio_enabled: bool,
    /// Root of the static file tree; media lands in
    /// `{static_dir}/images` and `{static_dir}/audio`.
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,
    #[serde(default = "default_media_timeout_secs")]
    pub image_timeout_secs: u64,
    #[serde(default = "default_media_timeout_secs")]
    pub audio_timeout_secs: u64,
    /// ElevenLabs voice identifier.
    #[serde(default = "default_voice_id")]
    pub voice_id: String,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            images_enabled: true,
            audio_enabled: true,
            static_dir: default_static_dir(),
            image_timeout_secs: default_media_timeout_secs(),
            audio_timeout_secs: default_media_timeout_secs(),
            voice_id: default_voice_id(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_static_dir() -> PathBuf {
    PathBuf::from("static")
}
fn default_media_timeout_secs() -> u64 {
    30
}
fn default_voice_id() -> String {
    "21m00Tcm4TlvDq8ikWAM".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    /// Retention cap per session, in turns (an exchange is two turns).
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
        }
    }
}

fn default_max_turns() -> usize {
    12
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
    /// Externally reachable base URL (scheme+host+port). When unset, the
    /// base URL is derived from each request's Host header.
    #[serde(default)]
    pub public_url: Option<String>,
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.chunking.size == 0 {
        anyhow::bail!("chunking.size must be > 0");
    }
    if config.chunking.overlap >= config.chunking.size {
        anyhow::bail!(
            "chunking.overlap ({}) must be smaller than chunking.size ({})",
            config.chunking.overlap,
            config.chunking.size
        );
    }

    if config.retrieval.top_k < 1 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }
    if !(-1.0..=1.0).contains(&config.retrieval.threshold) {
        anyhow::bail!("retrieval.threshold must be in [-1.0, 1.0]");
    }

    match config.embedding.provider.as_str() {
        "openai" | "ollama" => {
            if config.embedding.model.is_none() {
                anyhow::bail!(
                    "embedding.model must be specified for provider '{}'",
                    config.embedding.provider
                );
            }
            if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
                anyhow::bail!(
                    "embedding.dims must be > 0 for provider '{}'",
                    config.embedding.provider
                );
            }
        }
        "local" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be openai, ollama, or local.",
            other
        ),
    }

    match config.llm.provider.as_str() {
        "openai" | "gemini" => {}
        other => anyhow::bail!("Unknown llm provider: '{}'. Must be openai or gemini.", other),
    }

    if !(0.0..=2.0).contains(&config.llm.temperature) {
        anyhow::bail!("llm.temperature must be in [0.0, 2.0]");
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(body: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(body.as_bytes()).unwrap();
        f
    }

    const MINIMAL: &str = r#"
[corpus]
dir = "data/books"
cache_path = "data/index.json"

[chunking]
size = 1000

[embedding]
provider = "openai"
model = "text-embedding-3-small"
dims = 1536

[llm]
provider = "openai"
model = "gpt-4o-mini"

[server]
bind = "127.0.0.1:8000"
"#;

    #[test]
    fn test_minimal_config_with_defaults() {
        let f = write_config(MINIMAL);
        let config = load_config(f.path()).unwrap();
        assert_eq!(config.chunking.overlap, 200);
        assert_eq!(config.retrieval.top_k, 5);
        assert!((config.retrieval.threshold - 0.25).abs() < 1e-6);
        assert_eq!(config.session.max_turns, 12);
        assert!(config.media.images_enabled);
        assert!(config.server.public_url.is_none());
    }

    #[test]
    fn test_overlap_must_be_smaller_than_size() {
        let f = write_config(&MINIMAL.replace("size = 1000", "size = 100\noverlap = 100"));
        assert!(load_config(f.path()).is_err());
    }

    #[test]
    fn test_unknown_embedding_provider_rejected() {
        // Replace only the first provider line (the embedding section).
        let f = write_config(&MINIMAL.replacen(
            r#"provider = "openai""#,
            r#"provider = "cohere""#,
            1,
        ));
        assert!(load_config(f.path()).is_err());
    }

    #[test]
    fn test_openai_embedding_requires_dims() {
        let f = write_config(&MINIMAL.replace("dims = 1536\n", ""));
        assert!(load_config(f.path()).is_err());
    }

    #[test]
    fn test_threshold_out_of_range_rejected() {
        let f = write_config(&format!("{MINIMAL}\n[retrieval]\nthreshold = 1.5\n"));
        assert!(load_config(f.path()).is_err());
    }
}
