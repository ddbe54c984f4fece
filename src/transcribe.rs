//! Speech-to-text via the OpenAI Whisper API.
//!
//! The audio-recording widget is part of the external UI; this module
//! only forwards its uploaded blob to the transcription collaborator
//! and returns the recognized text. Failures surface with a
//! human-readable reason for the client.

use anyhow::Context;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use crate::lang;

/// Uploads below this size are rejected before calling the API; they
/// are almost always a mis-fired recording button.
const MIN_AUDIO_BYTES: usize = 1000;

const TRANSCRIBE_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum TranscribeError {
    /// The upload itself is unusable; the message is written for the
    /// person who recorded it.
    #[error("{0}")]
    Rejected(String),
    /// The transcription service (or our side of the call) failed.
    #[error(transparent)]
    Upstream(#[from] anyhow::Error),
}

fn rejected(message: impl Into<String>) -> TranscribeError {
    TranscribeError::Rejected(message.into())
}

/// Language hint forwarded to Whisper. Supported codes pass through;
/// anything else (including no hint) lets Whisper auto-detect, so a
/// voice question in any language still transcribes.
fn whisper_language(code: Option<&str>) -> Option<&str> {
    code.filter(|c| lang::is_supported(c))
}

/// Transcribe an uploaded audio blob.
///
/// `filename` is forwarded so the API can infer the container format
/// (webm, wav, mp3, …). `language` is an optional hint; when absent or
/// unsupported the model detects the spoken language itself.
pub async fn transcribe(
    audio: Vec<u8>,
    filename: &str,
    language: Option<&str>,
) -> Result<String, TranscribeError> {
    if audio.len() < MIN_AUDIO_BYTES {
        return Err(rejected(
            "Recording too short or empty. Please speak clearly for at least 1-2 seconds.",
        ));
    }

    let api_key = std::env::var("OPENAI_API_KEY")
        .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY not set; transcription unavailable"))?;

    info!(bytes = audio.len(), file = filename, "transcribing audio upload");

    let part = reqwest::multipart::Part::bytes(audio)
        .file_name(filename.to_string())
        .mime_str("application/octet-stream")
        .context("invalid multipart payload")?;
    let mut form = reqwest::multipart::Form::new()
        .text("model", "whisper-1")
        .part("file", part);
    if let Some(code) = whisper_language(language) {
        form = form.text("language", code.to_string());
    }

    let client = reqwest::Client::builder()
        .timeout(TRANSCRIBE_TIMEOUT)
        .build()
        .context("failed to build HTTP client")?;
    let response = client
        .post("https://api.openai.com/v1/audio/transcriptions")
        .header("Authorization", format!("Bearer {}", api_key))
        .multipart(form)
        .send()
        .await
        .context("transcription request failed")?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(anyhow::anyhow!("transcription API error {status}: {body}").into());
    }

    let json: serde_json::Value = response
        .json()
        .await
        .context("transcription response was not JSON")?;
    let text = json
        .get("text")
        .and_then(|t| t.as_str())
        .map(|t| t.trim().to_string())
        .ok_or_else(|| anyhow::anyhow!("Invalid transcription response: missing text"))?;

    if text.is_empty() {
        return Err(rejected(
            "Sorry, I couldn't hear anything clearly. Please speak louder and try again.",
        ));
    }

    Ok(text)
}
