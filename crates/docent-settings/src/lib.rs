//! # docent-settings
//!
//! Configuration management with layered sources for the docent pipeline.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`DocentSettings::default()`]
//! 2. **User file**: `~/.docent/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `DOCENT_*` overrides (highest priority)
//!
//! There is no process-wide settings cache. The binary loads settings once
//! at startup and hands the relevant sections to each component it builds.
//!
//! # Usage
//!
//! ```no_run
//! use docent_settings::load_settings;
//!
//! let settings = load_settings().unwrap_or_default();
//! println!("token limit: {}", settings.pipeline.token_limit);
//! ```

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    apply_env_overrides, deep_merge, load_settings, load_settings_from_path, settings_path,
};
pub use types::*;
