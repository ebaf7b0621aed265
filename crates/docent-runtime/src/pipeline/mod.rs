//! Per-turn context pipeline.
//!
//! ## Submodules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | `references` | `@Title` detection and `[REF:<id>]` rewriting |
//! | `selection` | Candidate dedup, explicit-context admission, greedy budget fill |
//! | `formatter` | Deterministic prompt layout |
//! | `message_builder` | Runs every stage in order with cancellation checks |

pub mod formatter;
pub mod message_builder;
pub mod references;
pub mod selection;
