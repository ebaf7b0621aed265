//! # docent-core
//!
//! Foundation types, error tags, and utilities for the docent RAG pipeline.
//!
//! This crate provides the shared vocabulary that all other docent crates depend on:
//!
//! - **Branded IDs**: [`ids::SessionId`], [`ids::TurnId`], [`ids::MessageId`], [`ids::ContextId`]
//! - **Contexts**: [`models::DocumentContext`] with its [`models::ContextType`] and metadata
//! - **Bundle**: [`bundle::ChatContextBundle`], the per-session context accumulator
//! - **Transcript**: [`messages::ChatMessage`] tagged with a [`messages::MessageOutcome`]
//! - **Events**: [`events::TurnEvent`] for a single turn, [`events::SessionEvent`] for observers
//! - **Errors**: [`errors::ErrorKind`] tags and the [`errors::TurnFailure`] record
//! - **Logging**: [`logging::init_subscriber`] for binaries
//!
//! ## Crate Position
//!
//! Foundation crate. Depended on by all other docent crates.

#![deny(unsafe_code)]

pub mod bundle;
pub mod errors;
pub mod events;
pub mod ids;
pub mod logging;
pub mod messages;
pub mod models;
pub mod text;

pub use bundle::ChatContextBundle;
pub use errors::{ErrorKind, TurnFailure};
pub use events::{SessionEvent, TurnEvent, TurnPhase};
pub use ids::{ContextId, MessageId, SessionId, TurnId};
pub use messages::{ChatMessage, MessageOutcome, StopReason, TokenUsage};
pub use models::{ContextMetadata, ContextType, DocumentContext, SelectionRect, content_checksum};
