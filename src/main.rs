//! # Taleforge CLI (`taleforge`)
//!
//! ## Usage
//!
//! ```bash
//! taleforge --config ./config/taleforge.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `taleforge index` | Build (or refresh) the chunk+embedding cache |
//! | `taleforge ask "<question>"` | Answer one question on the command line |
//! | `taleforge serve` | Start the JSON HTTP API |
//!
//! ## Examples
//!
//! ```bash
//! # Embed the corpus up front so the first serve starts instantly
//! taleforge index --config ./config/taleforge.toml
//!
//! # One-shot question, answered in Spanish
//! taleforge ask "What happened at the tea party?" --language es
//!
//! # Start the API for the web UI
//! taleforge serve --config ./config/taleforge.toml
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use taleforge::config::{self, Config};
use taleforge::corpus;
use taleforge::embedding;
use taleforge::index::Index;
use taleforge::lang;
use taleforge::llm;
use taleforge::media::MediaGenerator;
use taleforge::server;
use taleforge::storyteller::{AnswerRequest, Storyteller};
use taleforge_core::embedding::Embedder;
use taleforge_core::session::SessionStore;

/// Taleforge — a retrieval-augmented storyteller over classic books.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/taleforge.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "taleforge",
    about = "A retrieval-augmented storyteller over a shelf of classic books",
    version,
    long_about = "Taleforge chunks and embeds a directory of .txt books, answers questions \
    grounded strictly in their text in the voice of a playful storyteller, and optionally \
    illustrates and narrates each answer. Serves a JSON HTTP API for the web UI."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/taleforge.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build or refresh the chunk+embedding cache.
    ///
    /// Chunks every book, embeds every chunk, and writes the cache file.
    /// A no-op when the cache already matches the corpus, model, and
    /// chunking settings; `--force` rebuilds regardless.
    Index {
        /// Rebuild even when the cache fingerprint matches.
        #[arg(long)]
        force: bool,
    },

    /// Answer a single question and print the result.
    ///
    /// Uses the same retrieval and generation pipeline as the server,
    /// without media generation.
    Ask {
        /// The question to ask.
        question: String,

        /// Answer language code (en, es, fr, de, hi).
        #[arg(long, default_value = lang::DEFAULT_LANGUAGE)]
        language: String,
    },

    /// Start the JSON HTTP API.
    ///
    /// Binds to `[server].bind` and serves `/chat`, `/transcribe`,
    /// `/suggestions`, `/languages`, `/health`, and `/static`.
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let cli = Cli::parse();
    let config = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Index { force } => cmd_index(&config, force).await,
        Commands::Ask { question, language } => cmd_ask(&config, &question, &language).await,
        Commands::Serve => cmd_serve(&config).await,
    }
}

fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("taleforge=info"));

    fmt().with_env_filter(filter).with_target(false).init();
}

/// Shared startup: load books, probe the embedder, load or build the
/// index. The probe makes a missing or misconfigured embedding model a
/// startup failure rather than a per-request one.
async fn open_index(config: &Config, force: bool) -> Result<(Arc<Index>, Arc<dyn Embedder>)> {
    let documents = corpus::load_documents(&config.corpus.dir)?;
    tracing::info!(books = documents.len(), dir = %config.corpus.dir.display(), "corpus loaded");

    let embedder = embedding::create_embedder(&config.embedding)?;
    embedding::verify_available(embedder.as_ref()).await?;

    let fingerprint = corpus::fingerprint(
        &config.corpus.dir,
        embedder.model_name(),
        embedder.dims(),
        &config.chunking,
    )?;

    let index = if force {
        let index = Index::build(&documents, embedder.as_ref(), &config.chunking, fingerprint).await?;
        index.persist(&config.corpus.cache_path)?;
        index
    } else {
        Index::load_or_build(
            &documents,
            embedder.as_ref(),
            &config.chunking,
            &config.corpus.cache_path,
            fingerprint,
        )
        .await?
    };

    Ok((Arc::new(index), embedder))
}

async fn cmd_index(config: &Config, force: bool) -> Result<()> {
    let (index, _) = open_index(config, force).await?;
    println!(
        "Index ready: {} chunks cached at {}",
        index.len(),
        config.corpus.cache_path.display()
    );
    Ok(())
}

fn build_storyteller(
    config: &Config,
    index: Arc<Index>,
    embedder: Arc<dyn Embedder>,
) -> Result<Arc<Storyteller>> {
    let chat = llm::create_chat_model(&config.llm)?;
    let media = Arc::new(MediaGenerator::new(config.media.clone())?);
    let sessions = Arc::new(SessionStore::new(config.session.max_turns));
    Ok(Arc::new(Storyteller::new(
        config, index, embedder, chat, media, sessions,
    )))
}

async fn cmd_ask(config: &Config, question: &str, language: &str) -> Result<()> {
    if !lang::is_supported(language) {
        anyhow::bail!(
            "Unsupported language '{}'. Supported: {}",
            language,
            lang::SUPPORTED_LANGUAGES
                .iter()
                .map(|(c, _)| *c)
                .collect::<Vec<_>>()
                .join(", ")
        );
    }

    let (index, embedder) = open_index(config, false).await?;
    let storyteller = build_storyteller(config, index, embedder)?;

    let bundle = storyteller
        .answer(&AnswerRequest {
            question: question.to_string(),
            session_id: "cli".to_string(),
            language: language.to_string(),
            want_image: false,
            want_audio: false,
            base_url: String::new(),
        })
        .await;

    println!("{}", bundle.answer);
    if !bundle.sources.is_empty() {
        println!();
        for source in &bundle.sources {
            println!("  [{:.2}] {}, {}", source.score, source.document, source.location);
        }
    }
    Ok(())
}

async fn cmd_serve(config: &Config) -> Result<()> {
    let (index, embedder) = open_index(config, false).await?;
    tracing::info!(chunks = index.len(), "index ready");

    let storyteller = build_storyteller(config, index, embedder)?;
    server::run_server(config, storyteller).await
}
