//! # docent
//!
//! Command-line front end. Wires settings, logging, the document catalog,
//! retrieval, the context cache and the model client together, then
//! answers one question.

#![deny(unsafe_code)]

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use docent_core::TurnEvent;
use docent_llm::{AnthropicClient, AnthropicConfig, LlmClient};
use docent_retrieval::{HashingEmbedder, InMemoryRetrievalClient, RetrievalClient};
use docent_runtime::{
    BuilderConfig, CacheStore, ContextCache, ContextService, DocumentCatalog, DocumentSource,
    MessageBuilder, Orchestrator, OrchestratorConfig, SqliteCacheStore, TextDocument,
};
use docent_settings::DocentSettings;
use futures::StreamExt;
use tracing::{debug, info};

/// Ask questions about local documents.
#[derive(Parser, Debug)]
#[command(name = "docent", about = "Ask questions about local documents", version)]
struct Cli {
    /// Settings file. Defaults to `~/.docent/settings.json`.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Answer one question using the given documents as context.
    Ask {
        /// Text file to make searchable. Pages are separated by form feeds.
        #[arg(long = "doc", required = true)]
        docs: Vec<PathBuf>,

        /// Document treated as currently open.
        #[arg(long)]
        active: Option<PathBuf>,

        /// The question. `@Title` references a document by file name.
        question: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = match &cli.config {
        Some(path) => docent_settings::load_settings_from_path(path),
        None => docent_settings::load_settings(),
    }
    .context("Failed to load settings")?;

    docent_core::logging::init_subscriber(&settings.logging.level, settings.logging.json)
        .context("Failed to initialize logging")?;

    match cli.command {
        Command::Ask {
            docs,
            active,
            question,
        } => ask(&settings, &docs, active.as_deref(), &question).await,
    }
}

async fn ask(
    settings: &DocentSettings,
    docs: &[PathBuf],
    active: Option<&Path>,
    question: &str,
) -> Result<()> {
    let catalog = Arc::new(load_documents(docs)?);

    let embedder = Arc::new(HashingEmbedder::new(settings.retrieval.embedding_dims));
    let retrieval = Arc::new(InMemoryRetrievalClient::new(
        embedder,
        settings.retrieval.chunk_tokens,
    ));
    for source in catalog.entries() {
        let pages = source
            .extract(&docent_runtime::ExtractScope::All)
            .with_context(|| format!("Failed to read {}", source.document_id()))?;
        retrieval
            .ingest(&source.document_id(), &pages, &source.fingerprint())
            .await
            .with_context(|| format!("Failed to index {}", source.document_id()))?;
    }
    info!(documents = catalog.len(), "documents indexed");

    let store = match &settings.cache.path {
        Some(path) => Some(open_cache_store(path)?),
        None => None,
    };
    let cache = Arc::new(ContextCache::from_settings(&settings.cache, store));

    let builder = MessageBuilder::new(
        Arc::clone(&catalog),
        Arc::new(ContextService::new(cache)),
        retrieval,
        BuilderConfig::from(&settings.pipeline),
    );
    let orchestrator = Orchestrator::new(
        Arc::new(builder),
        create_llm_client(settings)?,
        OrchestratorConfig::from_settings(settings),
    );

    let session = orchestrator.create_session();
    if let Some(path) = active {
        let id = document_id_for(path);
        if catalog.get(&id).is_none() {
            bail!("--active {} is not one of the --doc files", path.display());
        }
        orchestrator.set_active_document(session.as_str(), Some(id))?;
    }

    let mut stream = orchestrator.submit_turn(session.as_str(), question, Vec::new())?;
    let mut stdout = std::io::stdout().lock();
    while let Some(event) = stream.next().await {
        match event {
            TurnEvent::PartialText { delta } => {
                stdout.write_all(delta.as_bytes())?;
                stdout.flush()?;
            }
            TurnEvent::Done { stop_reason, usage } => {
                writeln!(stdout)?;
                debug!(
                    stop_reason = stop_reason.as_str(),
                    input_tokens = usage.input_tokens,
                    output_tokens = usage.output_tokens,
                    "answer complete"
                );
            }
            TurnEvent::Error { kind, message } => {
                writeln!(stdout)?;
                bail!("{kind}: {message}");
            }
        }
    }
    orchestrator.shutdown();
    Ok(())
}

fn load_documents(paths: &[PathBuf]) -> Result<DocumentCatalog> {
    let catalog = DocumentCatalog::new();
    for path in paths {
        let doc = TextDocument::load(path)
            .with_context(|| format!("Failed to load document: {}", path.display()))?;
        debug!(id = %doc.document_id(), pages = doc.page_count(), "document loaded");
        catalog.insert(Arc::new(doc));
    }
    Ok(catalog)
}

/// Catalog ID of a file, as assigned by [`TextDocument::load`].
fn document_id_for(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned())
}

fn open_cache_store(path: &Path) -> Result<Arc<dyn CacheStore>> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    let store = SqliteCacheStore::open(path)
        .with_context(|| format!("Failed to open context cache: {}", path.display()))?;
    Ok(Arc::new(store))
}

fn create_llm_client(settings: &DocentSettings) -> Result<Arc<dyn LlmClient>> {
    let api_key = std::env::var(&settings.llm.api_key_env)
        .with_context(|| format!("{} is not set", settings.llm.api_key_env))?;
    let client = AnthropicClient::new(AnthropicConfig {
        api_key,
        base_url: settings.llm.base_url.clone(),
        timeout_secs: Some(settings.llm.request_timeout_secs),
    })?;
    Ok(Arc::new(client))
}
