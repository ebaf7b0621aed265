//! Sessions and streaming turns.
//!
//! ## Submodules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | `orchestrator` | Session registry, turn admission, concurrency cap |
//! | `session` | Per-session bundle, transcript and in-flight turn slot |
//! | `turn_runner` | Phase machine of one turn: build → model → stream |
//! | `turn_stream` | Caller-facing `Stream` of `TurnEvent`s with cancel |
//! | `event_emitter` | Broadcast of `SessionEvent`s to observers |
//!
//! ## Ordering
//!
//! A turn's stream yields `PartialText*` then exactly one `Done` or
//! `Error`. `TurnStarted` is broadcast before the turn is spawned;
//! `TurnCompleted`/`TurnFailed` is broadcast before the terminal event is
//! sent on the stream.

pub mod event_emitter;
#[allow(clippy::module_inception)]
pub mod orchestrator;
pub(crate) mod session;
pub(crate) mod turn_runner;
pub mod turn_stream;
