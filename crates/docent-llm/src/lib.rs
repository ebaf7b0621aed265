//! # docent-llm
//!
//! Streaming language model client.
//!
//! - [`LlmClient`]: async seam returning a stream of [`LlmEvent`]s with
//!   cooperative cancellation
//! - [`AnthropicClient`]: `POST /v1/messages` with `stream: true`, SSE
//!   parsing, stop reason mapping, API error mapping
//! - [`MockLlmClient`]: scriptable double for tests
//!
//! ## Crate Position
//!
//! Depends on: docent-core.
//! Depended on by: docent-runtime, docent.

#![deny(unsafe_code)]

pub mod anthropic;
pub mod client;
pub mod error_parsing;
pub mod errors;
pub mod mock;
pub mod sse;
pub mod stop_reason;

pub use anthropic::{AnthropicClient, AnthropicConfig};
pub use client::{LlmClient, LlmEvent, LlmEventStream, LlmMessage, LlmRequest, Role};
pub use errors::{ApiError, ApiErrorKind, LlmError, Result};
pub use mock::MockLlmClient;
pub use stop_reason::map_stop_reason;
