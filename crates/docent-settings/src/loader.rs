//! Settings loading: defaults, file, environment.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::{Result, SettingsError};
use crate::types::DocentSettings;

/// Default settings file: `$HOME/.docent/settings.json`.
pub fn settings_path() -> PathBuf {
    let home = std::env::var_os("HOME").map_or_else(|| PathBuf::from("."), PathBuf::from);
    home.join(".docent").join("settings.json")
}

/// Recursively merge `overlay` into `base`. Objects merge key by key;
/// every other value in `overlay` replaces the one in `base`.
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, overlay_val) in overlay_map {
                let merged = match base_map.remove(&key) {
                    Some(base_val) => deep_merge(base_val, overlay_val),
                    None => overlay_val,
                };
                let _ = base_map.insert(key, merged);
            }
            Value::Object(base_map)
        }
        (_, overlay) => overlay,
    }
}

/// Load from [`settings_path`] with env overrides applied.
pub fn load_settings() -> Result<DocentSettings> {
    load_settings_from_path(&settings_path())
}

/// Load from a specific file with env overrides applied.
///
/// A missing file yields defaults. A present but malformed file is an error.
pub fn load_settings_from_path(path: &Path) -> Result<DocentSettings> {
    let defaults = serde_json::to_value(DocentSettings::default()).map_err(|source| {
        SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        }
    })?;

    let merged = match std::fs::read_to_string(path) {
        Ok(raw) => {
            let file_val: Value =
                serde_json::from_str(&raw).map_err(|source| SettingsError::Parse {
                    path: path.to_path_buf(),
                    source,
                })?;
            debug!(?path, "loaded settings file");
            deep_merge(defaults, file_val)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(?path, "no settings file, using defaults");
            defaults
        }
        Err(source) => {
            return Err(SettingsError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    let mut settings: DocentSettings =
        serde_json::from_value(merged).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    apply_env_overrides(&mut settings, |var| std::env::var(var).ok())?;
    settings.validate();
    Ok(settings)
}

/// Apply `DOCENT_*` overrides read through `lookup`.
///
/// | Variable | Field |
/// |----------|-------|
/// | `DOCENT_MODEL` | `llm.model` |
/// | `DOCENT_BASE_URL` | `llm.baseUrl` |
/// | `DOCENT_TOKEN_LIMIT` | `pipeline.tokenLimit` |
/// | `DOCENT_CACHE_PATH` | `cache.path` |
/// | `DOCENT_LOG_LEVEL` | `logging.level` |
pub fn apply_env_overrides<F>(settings: &mut DocentSettings, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(model) = lookup("DOCENT_MODEL") {
        settings.llm.model = model;
    }
    if let Some(url) = lookup("DOCENT_BASE_URL") {
        settings.llm.base_url = url;
    }
    if let Some(raw) = lookup("DOCENT_TOKEN_LIMIT") {
        settings.pipeline.token_limit =
            raw.trim()
                .parse()
                .map_err(|_| SettingsError::InvalidEnv {
                    var: "DOCENT_TOKEN_LIMIT".to_string(),
                    value: raw.clone(),
                })?;
    }
    if let Some(path) = lookup("DOCENT_CACHE_PATH") {
        settings.cache.path = Some(PathBuf::from(path));
    }
    if let Some(level) = lookup("DOCENT_LOG_LEVEL") {
        settings.logging.level = level;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn deep_merge_nested_objects() {
        let base = json!({"a": {"x": 1, "y": 2}, "b": 3});
        let overlay = json!({"a": {"y": 20}, "c": 4});
        let merged = deep_merge(base, overlay);
        assert_eq!(merged, json!({"a": {"x": 1, "y": 20}, "b": 3, "c": 4}));
    }

    #[test]
    fn deep_merge_scalar_replaces_object() {
        let merged = deep_merge(json!({"a": {"x": 1}}), json!({"a": 5}));
        assert_eq!(merged["a"], 5);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let s = load_settings_from_path(&dir.path().join("absent.json")).unwrap();
        assert_eq!(s.pipeline.token_limit, 4000);
    }

    #[test]
    fn file_values_merge_over_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"pipeline": {"keywordTopK": 7}}"#).unwrap();
        let s = load_settings_from_path(&path).unwrap();
        assert_eq!(s.pipeline.keyword_top_k, 7);
        assert_eq!(s.pipeline.semantic_top_k, 50);
    }

    #[test]
    fn malformed_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = load_settings_from_path(&path).unwrap_err();
        assert!(matches!(err, SettingsError::Parse { .. }));
    }

    #[test]
    fn file_values_are_validated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"pipeline": {"diversityBonus": 9.0}}"#).unwrap();
        let s = load_settings_from_path(&path).unwrap();
        assert!((s.pipeline.diversity_bonus - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn env_overrides_apply() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("DOCENT_MODEL", "claude-test"),
            ("DOCENT_TOKEN_LIMIT", " 1234 "),
            ("DOCENT_CACHE_PATH", "/tmp/cache.db"),
            ("DOCENT_LOG_LEVEL", "debug"),
        ]);
        let mut s = DocentSettings::default();
        apply_env_overrides(&mut s, |k| env.get(k).map(|v| (*v).to_string())).unwrap();
        assert_eq!(s.llm.model, "claude-test");
        assert_eq!(s.pipeline.token_limit, 1234);
        assert_eq!(s.cache.path, Some(PathBuf::from("/tmp/cache.db")));
        assert_eq!(s.logging.level, "debug");
    }

    #[test]
    fn env_override_rejects_non_numeric_limit() {
        let mut s = DocentSettings::default();
        let err = apply_env_overrides(&mut s, |k| {
            (k == "DOCENT_TOKEN_LIMIT").then(|| "lots".to_string())
        })
        .unwrap_err();
        assert!(matches!(err, SettingsError::InvalidEnv { .. }));
    }

    #[test]
    fn no_env_leaves_settings_untouched() {
        let mut s = DocentSettings::default();
        apply_env_overrides(&mut s, no_env).unwrap();
        assert_eq!(s.llm.model, DocentSettings::default().llm.model);
    }

    #[test]
    fn settings_path_ends_with_docent_dir() {
        let p = settings_path();
        assert!(p.ends_with(".docent/settings.json"));
    }
}
