//! Illustration and narration generation.
//!
//! Both generators are best-effort side channels: they run only after
//! the answer text exists, their failures are logged and swallowed, and
//! the orchestrator turns a timeout into an absent field rather than a
//! failed request.
//!
//! Images come from the Pollinations image API (a GET with the prompt in
//! the URL); narration comes from the ElevenLabs TTS API. Generated
//! files are content-addressed by a hash of their prompt and served from
//! the static file tree, so regenerating the same answer reuses the
//! same filename.

use anyhow::{bail, Result};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use sha2::{Digest, Sha256};
use std::time::Duration;
use tracing::info;

use crate::config::MediaConfig;

/// Scene fragments keyed by story keywords. All matching fragments (up
/// to three) are combined into the image prompt; a declarative table,
/// not branching logic.
const SCENE_KEYWORDS: &[(&str, &str)] = &[
    ("alice", "Alice, young Victorian girl in blue dress with white apron"),
    ("wonderland", "magical Wonderland with strange creatures and talking animals"),
    ("rabbit", "white rabbit wearing waistcoat with pocket watch, running"),
    ("queen", "Queen of Hearts with playing card soldiers, red and black"),
    ("hatter", "Mad Hatter at tea party with oversized hat, teacups everywhere"),
    ("cheshire", "Cheshire Cat with wide grin, purple stripes, disappearing"),
    ("caterpillar", "blue caterpillar smoking hookah on giant mushroom"),
    ("mushroom", "giant spotted mushroom in an enchanted forest"),
    ("gulliver", "Gulliver the explorer in 18th century clothing"),
    ("lilliput", "tiny Lilliputian people, miniature buildings, giant human"),
    ("giant", "enormous giants, Brobdingnagians, tiny human"),
    ("tea party", "mad tea party with March Hare, Dormouse, chaotic table setting"),
    ("aladdin", "Aladdin with magic lamp, genie, flying carpet"),
    ("sinbad", "Sinbad the sailor, ship, sea monsters"),
    ("scheherazade", "Scheherazade storytelling, sultan, Arabian palace"),
    ("genie", "magical genie emerging from lamp, smoke, wishes"),
];

const IMAGE_STYLE: &str = "vintage storybook illustration, detailed ink drawing with watercolor, \
     whimsical fantasy art, classic children's literature, magical atmosphere";

pub struct MediaGenerator {
    config: MediaConfig,
    client: reqwest::Client,
}

impl MediaGenerator {
    pub fn new(config: MediaConfig) -> Result<Self> {
        std::fs::create_dir_all(config.static_dir.join("images"))?;
        std::fs::create_dir_all(config.static_dir.join("audio"))?;
        Ok(Self {
            config,
            client: reqwest::Client::new(),
        })
    }

    pub fn images_enabled(&self) -> bool {
        self.config.images_enabled
    }

    pub fn audio_enabled(&self) -> bool {
        self.config.audio_enabled
    }

    pub fn image_timeout(&self) -> Duration {
        Duration::from_secs(self.config.image_timeout_secs)
    }

    pub fn audio_timeout(&self) -> Duration {
        Duration::from_secs(self.config.audio_timeout_secs)
    }

    /// Generate an illustration for an answer; returns a root-relative
    /// URL (`/static/images/…`) for the orchestrator to absolutize.
    pub async fn generate_image(&self, question: &str, answer: &str) -> Result<String> {
        let prompt = scene_prompt(question, answer);
        let encoded = utf8_percent_encode(&prompt, NON_ALPHANUMERIC).to_string();
        let url = format!(
            "https://image.pollinations.ai/prompt/{encoded}?width=512&height=512&model=flux&nologo=true&enhance=true"
        );

        let response = self
            .client
            .get(&url)
            .timeout(self.image_timeout())
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            bail!("image API returned status {status}");
        }
        let bytes = response.bytes().await?;

        let filename = format!("{}.png", content_key(&prompt));
        let path = self.config.static_dir.join("images").join(&filename);
        std::fs::write(&path, &bytes)?;
        info!(file = %filename, bytes = bytes.len(), "illustration generated");

        Ok(format!("/static/images/{filename}"))
    }

    /// Narrate an answer via ElevenLabs; returns a root-relative URL
    /// (`/static/audio/…`).
    pub async fn generate_audio(&self, text: &str, language: &str) -> Result<String> {
        let api_key = std::env::var("ELEVENLABS_API_KEY")
            .map_err(|_| anyhow::anyhow!("ELEVENLABS_API_KEY not set"))?;

        let narration = narratable_text(text);
        if narration.is_empty() {
            bail!("no narratable text in answer");
        }

        // Multilingual voice model only when the answer isn't English.
        let model_id = if language == "en" {
            "eleven_monolingual_v1"
        } else {
            "eleven_multilingual_v2"
        };

        let body = serde_json::json!({
            "text": narration,
            "model_id": model_id,
            "voice_settings": {
                "stability": 0.5,
                "similarity_boost": 0.75,
            },
        });

        let url = format!(
            "https://api.elevenlabs.io/v1/text-to-speech/{}",
            self.config.voice_id
        );
        let response = self
            .client
            .post(&url)
            .header("xi-api-key", api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .timeout(self.audio_timeout())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("ElevenLabs API error {status}: {body}");
        }
        let bytes = response.bytes().await?;

        let filename = format!("{}.mp3", content_key(&narration));
        let path = self.config.static_dir.join("audio").join(&filename);
        std::fs::write(&path, &bytes)?;
        info!(file = %filename, bytes = bytes.len(), "narration generated");

        Ok(format!("/static/audio/{filename}"))
    }
}

/// Build the image prompt from all story keywords found in the question
/// and answer, falling back to a generic storybook scene.
fn scene_prompt(question: &str, answer: &str) -> String {
    let combined = format!("{} {}", question, answer).to_lowercase();

    let found: Vec<&str> = SCENE_KEYWORDS
        .iter()
        .filter(|(key, _)| combined.contains(key))
        .map(|(_, scene)| *scene)
        .take(3)
        .collect();

    let scene = if found.is_empty() {
        "classic storybook scene".to_string()
    } else {
        found.join(", ")
    };

    format!("{scene}, {IMAGE_STYLE}")
}

/// Strip characters TTS engines stumble over (emoji, markup) and cap
/// the narrated length for response time.
fn narratable_text(text: &str) -> String {
    let cleaned: String = text
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || ".,!?'\"-".contains(*c))
        .collect();
    let trimmed = cleaned.trim();
    trimmed.chars().take(500).collect()
}

/// Stable filename stem for a prompt: regenerating the same content
/// overwrites the same file instead of accumulating duplicates.
fn content_key(prompt: &str) -> String {
    let digest = Sha256::digest(prompt.as_bytes());
    format!("{:x}", digest)[..32].to_string()
}
