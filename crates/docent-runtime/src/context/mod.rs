//! Context management.
//!
//! ## Submodules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | `source` | `DocumentSource` trait, `TextDocument`, `DocumentCatalog` |
//! | `token_estimator` | chars/4 token estimate |
//! | `cache_store` | `CacheStore` trait and `SQLite` implementation |
//! | `cache` | Shared TTL-bounded context cache |
//! | `service` | `ContextService`: create contexts, cache-first |

pub mod cache;
pub mod cache_store;
pub mod service;
pub mod source;
pub mod token_estimator;
