//! Anthropic Messages API client.
//!
//! `client` (entry point) builds the request and maps HTTP errors,
//! `stream_handler` turns SSE payloads into [`LlmEvent`](crate::LlmEvent)s,
//! and `types` holds config and wire types.

pub mod client;
pub mod stream_handler;
pub mod types;

pub use client::AnthropicClient;
pub use types::{AnthropicConfig, DEFAULT_BASE_URL};
