//! # docent-retrieval
//!
//! Embedding and retrieval for document chat.
//!
//! - [`RetrievalClient`]: the async seam the context pipeline queries
//!   (ingest, fingerprint check, semantic and keyword search)
//! - [`InMemoryRetrievalClient`]: chunked in-process index with cosine KNN
//!   and TF-IDF keyword scoring
//! - [`EmbeddingService`] / [`HashingEmbedder`]: deterministic
//!   feature-hashing embeddings
//! - [`MockRetrievalClient`]: scriptable double for tests
//!
//! ## Crate Position
//!
//! Standalone (no docent crate dependencies).
//! Depended on by: docent-runtime, docent.

#![deny(unsafe_code)]

pub mod chunk;
pub mod client;
pub mod embedding;
pub mod errors;
pub mod memory;
pub mod mock;
pub mod normalize;
pub mod terms;
pub mod types;

pub use chunk::{CHARS_PER_TOKEN, Chunk, chunk_pages};
pub use client::RetrievalClient;
pub use embedding::{EmbeddingService, HashingEmbedder};
pub use errors::{Result, RetrievalError};
pub use memory::InMemoryRetrievalClient;
pub use mock::MockRetrievalClient;
pub use normalize::{cosine_similarity, l2_norm, l2_normalize, min_max_normalize};
pub use types::{ChunkLocation, PAGE_SEPARATOR, SearchResult, join_pages};
