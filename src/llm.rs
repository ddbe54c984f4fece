//! Language-model clients for answer generation.
//!
//! The [`ChatModel`] trait is the orchestrator's seam: one call per
//! query, with the session's recent turns as short-term context.
//! Backends:
//! - **OpenAI** — `POST /v1/chat/completions`; history is forwarded as
//!   proper chat messages.
//! - **Gemini** — `POST :generateContent`; history is inlined into the
//!   prompt text.
//!
//! Failures here are recoverable: the orchestrator turns them into an
//! in-persona apology rather than propagating a raw error.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use taleforge_core::models::{Role, Turn};

use crate::config::LlmConfig;

/// One-shot chat completion with conversation context.
#[async_trait]
pub trait ChatModel: Send + Sync {
    fn model_name(&self) -> &str;

    /// Generate an answer for `prompt`, given the most recent session
    /// turns (oldest first).
    async fn complete(&self, prompt: &str, history: &[Turn]) -> Result<String>;
}

/// Instantiate the configured chat backend.
pub fn create_chat_model(config: &LlmConfig) -> Result<Arc<dyn ChatModel>> {
    match config.provider.as_str() {
        "openai" => Ok(Arc::new(OpenAiChat::new(config)?)),
        "gemini" => Ok(Arc::new(GeminiChat::new(config)?)),
        other => bail!("Unknown llm provider: {}", other),
    }
}

// ============ OpenAI ============

pub struct OpenAiChat {
    model: String,
    temperature: f32,
    max_tokens: u32,
    client: reqwest::Client,
}

impl OpenAiChat {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        if std::env::var("OPENAI_API_KEY").is_err() {
            bail!("OPENAI_API_KEY environment variable not set");
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            client,
        })
    }
}

#[async_trait]
impl ChatModel for OpenAiChat {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str, history: &[Turn]) -> Result<String> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY not set"))?;

        let mut messages: Vec<serde_json::Value> = history
            .iter()
            .map(|turn| {
                serde_json::json!({
                    "role": match turn.role {
                        Role::User => "user",
                        Role::Assistant => "assistant",
                    },
                    "content": turn.content,
                })
            })
            .collect();
        messages.push(serde_json::json!({"role": "user", "content": prompt}));

        let body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        });

        let response = self
            .client
            .post("https://api.openai.com/v1/chat/completions")
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("OpenAI chat API error {status}: {body}");
        }

        let json: serde_json::Value = response.json().await?;
        parse_openai_chat(&json)
    }
}

fn parse_openai_chat(json: &serde_json::Value) -> Result<String> {
    json.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(|s| s.trim().to_string())
        .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI chat response: missing message content"))
}

// ============ Gemini ============

pub struct GeminiChat {
    model: String,
    temperature: f32,
    max_tokens: u32,
    client: reqwest::Client,
}

impl GeminiChat {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        if std::env::var("GEMINI_API_KEY").is_err() {
            bail!("GEMINI_API_KEY environment variable not set");
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            client,
        })
    }
}

#[async_trait]
impl ChatModel for GeminiChat {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str, history: &[Turn]) -> Result<String> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .map_err(|_| anyhow::anyhow!("GEMINI_API_KEY not set"))?;

        // Gemini takes a single text part; prepend the history inline.
        let mut full_prompt = String::new();
        if !history.is_empty() {
            full_prompt.push_str("Previous conversation:\n");
            for turn in history {
                let speaker = match turn.role {
                    Role::User => "User",
                    Role::Assistant => "Assistant",
                };
                full_prompt.push_str(&format!("{speaker}: {}\n", turn.content));
            }
            full_prompt.push('\n');
        }
        full_prompt.push_str(prompt);

        let body = serde_json::json!({
            "contents": [{"parts": [{"text": full_prompt}]}],
            "generationConfig": {
                "temperature": self.temperature,
                "maxOutputTokens": self.max_tokens,
            },
        });

        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent",
            self.model
        );
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Gemini API error {status}: {body}");
        }

        let json: serde_json::Value = response.json().await?;
        parse_gemini_chat(&json)
    }
}

fn parse_gemini_chat(json: &serde_json::Value) -> Result<String> {
    json.get("candidates")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("content"))
        .and_then(|c| c.get("parts"))
        .and_then(|p| p.get(0))
        .and_then(|p| p.get("text"))
        .and_then(|t| t.as_str())
        .map(|s| s.trim().to_string())
        .ok_or_else(|| anyhow::anyhow!("Invalid Gemini response: missing candidate text"))
}
