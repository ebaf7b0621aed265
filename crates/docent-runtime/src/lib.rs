//! # docent-runtime
//!
//! Context pipeline, context cache, and streaming turn orchestration.
//!
//! - **Context**: [`DocumentSource`]s in a [`DocumentCatalog`], turned into
//!   contexts by [`ContextService`] behind the TTL-bounded [`ContextCache`]
//!   (optionally persisted through [`SqliteCacheStore`])
//! - **Pipeline**: [`MessageBuilder`] runs reference resolution, explicit
//!   context merge, active-document registration, hybrid retrieval,
//!   deduplication, budget selection and prompt formatting
//! - **Orchestrator**: [`Orchestrator`] owns sessions, serializes their
//!   turns, streams [`TurnStream`] events and broadcasts lifecycle events
//!
//! ## Crate Position
//!
//! Aggregation layer. Depends on: docent-core, docent-settings,
//! docent-retrieval, docent-llm.
//! Depended on by: docent.

#![deny(unsafe_code)]

pub mod context;
pub mod errors;
pub mod orchestrator;
pub mod pipeline;

pub use context::cache::ContextCache;
pub use context::cache_store::{CacheEntry, CacheKey, CacheStore, SqliteCacheStore};
pub use context::service::{ContextRequest, ContextService};
pub use context::source::{DocumentCatalog, DocumentSource, ExtractScope, TextDocument};
pub use context::token_estimator::estimate_tokens;
pub use errors::{CacheError, ExtractionError, PipelineError, RuntimeError};
pub use orchestrator::event_emitter::EventEmitter;
pub use orchestrator::orchestrator::{Orchestrator, OrchestratorConfig};
pub use orchestrator::turn_stream::TurnStream;
pub use pipeline::formatter::format_prompt;
pub use pipeline::message_builder::{
    Attachment, BuilderConfig, BuiltPrompt, MessageBuilder, TurnInput,
};
pub use pipeline::references::resolve_references;
