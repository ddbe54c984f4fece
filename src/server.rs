//! JSON HTTP API for the storyteller.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/chat` | Answer a question; returns the full answer bundle |
//! | `POST` | `/transcribe` | Speech-to-text for a recorded question (multipart) |
//! | `GET`  | `/suggestions` | Starter questions for the UI |
//! | `GET`  | `/languages` | Supported answer languages |
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/static/*` | Generated images and narration files |
//!
//! # Error Contract
//!
//! Malformed requests get a structured error body:
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "question must not be empty" } }
//! ```
//!
//! Upstream failures during answering do NOT surface here: the
//! orchestrator degrades them to an in-persona answer, so `/chat`
//! returns `200` with a bundle whenever the request itself was valid.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so the web UI can be
//! served from any origin during development.

use axum::{
    extract::{Multipart, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tracing::info;

use crate::config::Config;
use crate::lang;
use crate::storyteller::{AnswerRequest, Storyteller};
use crate::transcribe;

/// Shared application state passed to all route handlers via Axum's
/// `State` extractor.
#[derive(Clone)]
struct AppState {
    storyteller: Arc<Storyteller>,
    /// Configured external base URL; when unset the Host header decides.
    public_url: Option<String>,
}

/// Binds to `[server].bind` and serves indefinitely.
pub async fn run_server(config: &Config, storyteller: Arc<Storyteller>) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();

    let state = AppState {
        storyteller,
        public_url: config.server.public_url.clone(),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/chat", post(handle_chat))
        .route("/transcribe", post(handle_transcribe))
        .route("/suggestions", get(handle_suggestions))
        .route("/languages", get(handle_languages))
        .route("/health", get(handle_health))
        .nest_service("/static", ServeDir::new(&config.media.static_dir))
        .layer(cors)
        .with_state(state);

    info!(addr = %bind_addr, "storyteller API listening");

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code (e.g., `"bad_request"`).
    code: String,
    /// Human-readable error message.
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn transcription_error(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "transcription_failed".to_string(),
        message: message.into(),
    }
}

// ============ POST /chat ============

/// JSON request body for `POST /chat`.
#[derive(Debug, Deserialize)]
struct ChatRequest {
    question: String,
    /// Conversation key; requests sharing it share short-term memory.
    #[serde(default = "default_session_id")]
    session_id: String,
    /// Answer language code; unsupported codes fall back to English.
    #[serde(default)]
    language: Option<String>,
    #[serde(default = "default_true")]
    generate_image: bool,
    #[serde(default = "default_true")]
    generate_audio: bool,
}

fn default_session_id() -> String {
    "default".to_string()
}

fn default_true() -> bool {
    true
}

/// Handler for `POST /chat`.
///
/// Validates the request shape, then hands off to the orchestrator.
/// The response is always a full answer bundle on `200`; degraded
/// answers (out-of-domain fallback, upstream failures) are still `200`
/// with `grounded: false`.
async fn handle_chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<ChatRequest>,
) -> Result<Response, AppError> {
    let question = req.question.trim();
    if question.is_empty() {
        return Err(bad_request("question must not be empty"));
    }

    let request = AnswerRequest {
        question: question.to_string(),
        session_id: req.session_id,
        language: normalize_language(req.language.as_deref()),
        want_image: req.generate_image,
        want_audio: req.generate_audio,
        base_url: base_url(state.public_url.as_deref(), &headers),
    };

    let bundle = state.storyteller.answer(&request).await;
    Ok(Json(bundle).into_response())
}

/// Unsupported or missing language codes fall back to the default
/// rather than failing the request.
fn normalize_language(code: Option<&str>) -> String {
    match code {
        Some(c) if lang::is_supported(c) => c.to_string(),
        _ => lang::DEFAULT_LANGUAGE.to_string(),
    }
}

/// The base URL media links are absolutized against: the configured
/// public URL when present, otherwise derived from the request's Host
/// header.
fn base_url(public_url: Option<&str>, headers: &HeaderMap) -> String {
    if let Some(url) = public_url {
        return url.trim_end_matches('/').to_string();
    }
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost:8000");
    format!("http://{host}")
}

// ============ POST /transcribe ============

#[derive(Serialize)]
struct TranscribeResponse {
    text: String,
}

/// Handler for `POST /transcribe`.
///
/// Accepts a multipart upload with an `audio` (or `file`) part, plus an
/// optional `language` part hinting the spoken language (auto-detected
/// when absent), and returns the recognized text. Rejections for
/// too-short recordings come back as `400` with a message suitable for
/// display.
async fn handle_transcribe(mut multipart: Multipart) -> Result<Json<TranscribeResponse>, AppError> {
    let mut audio: Option<(Vec<u8>, String)> = None;
    let mut language: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("invalid multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if name == "audio" || name == "file" {
            let filename = field
                .file_name()
                .unwrap_or("recording.webm")
                .to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| bad_request(format!("failed to read audio upload: {e}")))?;
            audio = Some((bytes.to_vec(), filename));
        } else if name == "language" {
            let value = field
                .text()
                .await
                .map_err(|e| bad_request(format!("invalid language field: {e}")))?;
            language = Some(value);
        }
    }

    let (bytes, filename) =
        audio.ok_or_else(|| bad_request("missing 'audio' field in multipart body"))?;

    let text = transcribe::transcribe(bytes, &filename, language.as_deref())
        .await
        .map_err(|e| match e {
            transcribe::TranscribeError::Rejected(msg) => bad_request(msg),
            transcribe::TranscribeError::Upstream(err) => {
                transcription_error(format!("transcription failed: {err}"))
            }
        })?;

    Ok(Json(TranscribeResponse { text }))
}

// ============ GET /suggestions ============

#[derive(Serialize)]
struct SuggestionsResponse {
    suggestions: Vec<&'static str>,
}

/// Starter questions the UI shows before the first exchange.
async fn handle_suggestions() -> Json<SuggestionsResponse> {
    Json(SuggestionsResponse {
        suggestions: lang::SUGGESTED_QUESTIONS.to_vec(),
    })
}

// ============ GET /languages ============

#[derive(Serialize)]
struct LanguageEntry {
    code: &'static str,
    name: &'static str,
}

#[derive(Serialize)]
struct LanguagesResponse {
    languages: Vec<LanguageEntry>,
    default: &'static str,
}

async fn handle_languages() -> Json<LanguagesResponse> {
    Json(LanguagesResponse {
        languages: lang::SUPPORTED_LANGUAGES
            .iter()
            .map(|(code, name)| LanguageEntry { code, name })
            .collect(),
        default: lang::DEFAULT_LANGUAGE,
    })
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    /// Embedded chunks backing retrieval; `0` would mean an empty corpus.
    chunks: usize,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        chunks: state.storyteller.index_size(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_base_url_prefers_public_url() {
        let headers = HeaderMap::new();
        assert_eq!(
            base_url(Some("https://tales.example.com/"), &headers),
            "https://tales.example.com"
        );
    }

    #[test]
    fn test_base_url_from_host_header() {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("127.0.0.1:9000"));
        assert_eq!(base_url(None, &headers), "http://127.0.0.1:9000");
    }

    #[test]
    fn test_normalize_language() {
        assert_eq!(normalize_language(Some("es")), "es");
        assert_eq!(normalize_language(Some("xx")), "en");
        assert_eq!(normalize_language(None), "en");
    }

    #[test]
    fn test_chat_request_defaults() {
        let req: ChatRequest = serde_json::from_str(r#"{"question": "hi"}"#).unwrap();
        assert_eq!(req.session_id, "default");
        assert!(req.language.is_none());
        assert!(req.generate_image);
        assert!(req.generate_audio);
    }
}
