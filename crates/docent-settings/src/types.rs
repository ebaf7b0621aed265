//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase")]` for the JSON file
//! format. Each type implements [`Default`] with production values and is
//! marked `#[serde(default)]` so partial JSON fills the gaps.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root settings type.
///
/// # JSON Format
///
/// ```json
/// {
///   "pipeline": { "tokenLimit": 6000 },
///   "llm": { "model": "claude-sonnet-4-20250514" }
/// }
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DocentSettings {
    /// Context pipeline tuning.
    pub pipeline: PipelineSettings,
    /// Context cache.
    pub cache: CacheSettings,
    /// In-process retrieval index.
    pub retrieval: RetrievalSettings,
    /// Language model client.
    pub llm: LlmSettings,
    /// Session limits.
    pub session: SessionSettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
}

impl DocentSettings {
    /// Clamp out-of-range values.
    ///
    /// Called automatically during loading. Values are corrected with a
    /// warning rather than rejected.
    pub fn validate(&mut self) {
        let p = &mut self.pipeline;
        if !(0.0..=1.0).contains(&p.diversity_bonus) || p.diversity_bonus.is_nan() {
            let clamped = if p.diversity_bonus.is_nan() {
                0.0
            } else {
                p.diversity_bonus.clamp(0.0, 1.0)
            };
            tracing::warn!(
                "diversity_bonus out of range ({}), clamped to {clamped}",
                p.diversity_bonus
            );
            p.diversity_bonus = clamped;
        }
        if p.token_limit == 0 {
            tracing::warn!("token_limit is 0, raising to 1");
            p.token_limit = 1;
        }
        if p.semantic_top_k == 0 {
            tracing::warn!("semantic_top_k is 0, raising to 1");
            p.semantic_top_k = 1;
        }
        if self.retrieval.chunk_tokens == 0 {
            tracing::warn!("chunk_tokens is 0, raising to 1");
            self.retrieval.chunk_tokens = 1;
        }
        if self.session.max_concurrent_turns == 0 {
            tracing::warn!("max_concurrent_turns is 0, raising to 1");
            self.session.max_concurrent_turns = 1;
        }
    }
}

/// Context pipeline tuning.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PipelineSettings {
    /// Maximum estimated tokens of context per prompt.
    pub token_limit: usize,
    /// Nearest-neighbour results requested from the semantic query.
    pub semantic_top_k: usize,
    /// Results requested from the keyword query.
    pub keyword_top_k: usize,
    /// Score bonus for a candidate whose document is not yet covered.
    pub diversity_bonus: f64,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            token_limit: 4000,
            semantic_top_k: 50,
            keyword_top_k: 50,
            diversity_bonus: 0.2,
        }
    }
}

/// Context cache.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CacheSettings {
    /// Entries older than this are re-extracted.
    pub max_age_secs: u64,
    /// `SQLite` file for persisted entries. In-memory only when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            max_age_secs: 7 * 24 * 60 * 60,
            path: None,
        }
    }
}

/// In-process retrieval index.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetrievalSettings {
    /// Target chunk size in estimated tokens.
    pub chunk_tokens: usize,
    /// Dimensions of the hashing embedder.
    pub embedding_dims: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            chunk_tokens: 200,
            embedding_dims: 256,
        }
    }
}

/// Language model client.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LlmSettings {
    /// Model ID sent in every request.
    pub model: String,
    /// `max_tokens` of every request.
    pub max_tokens: u32,
    /// API base URL.
    pub base_url: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    /// Whole-request timeout.
    pub request_timeout_secs: u64,
    /// System prompt.
    pub system_prompt: String,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            model: "claude-sonnet-4-20250514".to_string(),
            max_tokens: 1024,
            base_url: "https://api.anthropic.com".to_string(),
            api_key_env: "ANTHROPIC_API_KEY".to_string(),
            request_timeout_secs: 300,
            system_prompt: "You answer questions about the user's documents. \
                            Ground every statement in the supplied document excerpts \
                            and say so when they do not contain the answer."
                .to_string(),
        }
    }
}

/// Session limits.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionSettings {
    /// Generations allowed in flight across all sessions.
    pub max_concurrent_turns: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            max_concurrent_turns: 16,
        }
    }
}

/// Logging configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter when `RUST_LOG` is unset.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_pipeline_contract() {
        let s = DocentSettings::default();
        assert_eq!(s.pipeline.token_limit, 4000);
        assert_eq!(s.pipeline.semantic_top_k, 50);
        assert!((s.pipeline.diversity_bonus - 0.2).abs() < f64::EPSILON);
        assert_eq!(s.cache.max_age_secs, 604_800);
        assert!(s.cache.path.is_none());
    }

    #[test]
    fn empty_json_produces_defaults() {
        let s: DocentSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(s.pipeline.token_limit, 4000);
        assert_eq!(s.llm.api_key_env, "ANTHROPIC_API_KEY");
    }

    #[test]
    fn partial_json_overrides() {
        let json = serde_json::json!({
            "pipeline": { "tokenLimit": 6000 },
            "llm": { "maxTokens": 2048 }
        });
        let s: DocentSettings = serde_json::from_value(json).unwrap();
        assert_eq!(s.pipeline.token_limit, 6000);
        assert_eq!(s.pipeline.semantic_top_k, 50);
        assert_eq!(s.llm.max_tokens, 2048);
        assert_eq!(s.llm.model, "claude-sonnet-4-20250514");
    }

    #[test]
    fn json_field_names_are_camel_case() {
        let json = serde_json::to_value(DocentSettings::default()).unwrap();
        assert!(json["pipeline"].get("tokenLimit").is_some());
        assert!(json["pipeline"].get("diversityBonus").is_some());
        assert!(json["cache"].get("maxAgeSecs").is_some());
        assert!(json["cache"].get("path").is_none());
        assert!(json["llm"].get("apiKeyEnv").is_some());
    }

    #[test]
    fn validate_clamps_bonus() {
        let mut s = DocentSettings::default();
        s.pipeline.diversity_bonus = 3.5;
        s.validate();
        assert!((s.pipeline.diversity_bonus - 1.0).abs() < f64::EPSILON);

        s.pipeline.diversity_bonus = -1.0;
        s.validate();
        assert!(s.pipeline.diversity_bonus.abs() < f64::EPSILON);
    }

    #[test]
    fn validate_raises_zero_limits() {
        let mut s = DocentSettings::default();
        s.pipeline.token_limit = 0;
        s.pipeline.semantic_top_k = 0;
        s.session.max_concurrent_turns = 0;
        s.validate();
        assert_eq!(s.pipeline.token_limit, 1);
        assert_eq!(s.pipeline.semantic_top_k, 1);
        assert_eq!(s.session.max_concurrent_turns, 1);
    }
}
