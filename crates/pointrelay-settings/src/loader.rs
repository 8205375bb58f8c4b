//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`RelaySettings::default()`]
//! 2. If the settings file exists, deep-merge its values over the defaults
//! 3. Apply `POINTRELAY_*` environment overrides (highest priority)
//! 4. Validate the result
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::{Result, SettingsError};
use crate::types::RelaySettings;

/// Resolve the path to the settings file (`~/.pointrelay/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".pointrelay").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<RelaySettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults. Invalid JSON or an invalid combination of
/// values is an error.
pub fn load_settings_from_path(path: &Path) -> Result<RelaySettings> {
    let mut settings = read_file_layer(path)?;
    apply_env_overrides(&mut settings);
    settings.validate()?;
    Ok(settings)
}

/// Defaults with the settings file (if any) merged on top.
fn read_file_layer(path: &Path) -> Result<RelaySettings> {
    let defaults = serde_json::to_value(RelaySettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    Ok(serde_json::from_value(merged)?)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply environment variable overrides to loaded settings.
///
/// Invalid values are logged and ignored (the file/default value stays).
pub fn apply_env_overrides(settings: &mut RelaySettings) {
    apply_overrides(settings, |name| std::env::var(name).ok());
}

/// Apply overrides from an arbitrary variable source.
fn apply_overrides(settings: &mut RelaySettings, lookup: impl Fn(&str) -> Option<String>) {
    let env = EnvReader { lookup };

    // ── Server ──────────────────────────────────────────────────────
    if let Some(v) = env.string("POINTRELAY_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = env.parsed("POINTRELAY_PORT", 1u16, u16::MAX) {
        settings.server.port = v;
    }
    if let Some(v) = env.parsed("POINTRELAY_MAX_CONNECTIONS", 1usize, 1_000_000) {
        settings.server.max_connections = v;
    }

    // ── Limits ──────────────────────────────────────────────────────
    if let Some(v) = env.parsed("POINTRELAY_IDLE_TIMEOUT_MS", 1u64, 86_400_000) {
        settings.limits.idle_timeout_ms = v;
    }
    if let Some(v) = env.parsed("POINTRELAY_REQUEST_DELAY_MS", 0u64, 60_000) {
        settings.limits.request_delay_ms = v;
    }
    if let Some(v) = env.parsed("POINTRELAY_MAX_DELAY_VIOLATIONS", 1u32, 10_000) {
        settings.limits.max_delay_violations = v;
    }
    if let Some(v) = env.parsed("POINTRELAY_IGNORE_DELAY_VIOLATIONS", 1u32, 10_000) {
        settings.limits.ignore_delay_violations = v;
    }
    if let Some(v) = env.parsed("POINTRELAY_PENALTY_STEP", 0u32, 1_000) {
        settings.limits.penalty_step = v;
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = env.string("POINTRELAY_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = env.string("POINTRELAY_LOG_FORMAT") {
        match v.parse() {
            Ok(format) => settings.logging.format = format,
            Err(e) => tracing::warn!(key = "POINTRELAY_LOG_FORMAT", error = %e, "ignoring"),
        }
    }
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

/// Parse a string as a number within an inclusive range.
pub fn parse_in_range<T>(val: &str, min: T, max: T) -> Option<T>
where
    T: std::str::FromStr + PartialOrd,
{
    let n: T = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

struct EnvReader<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> EnvReader<F> {
    fn string(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.is_empty())
    }

    fn parsed<T>(&self, name: &str, min: T, max: T) -> Option<T>
    where
        T: std::str::FromStr + PartialOrd,
    {
        let val = (self.lookup)(name)?;
        let result = parse_in_range(&val, min, max);
        if result.is_none() {
            tracing::warn!(key = name, value = %val, "invalid numeric env var, ignoring");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pointrelay_core::logging::LogFormat;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    // ── deep_merge ──────────────────────────────────────────────────

    #[test]
    fn merge_nested_override() {
        let target = serde_json::json!({"server": {"port": 8001, "host": "0.0.0.0"}});
        let source = serde_json::json!({"server": {"port": 9090}});
        let merged = deep_merge(target, source);
        assert_eq!(merged["server"]["port"], 9090);
        assert_eq!(merged["server"]["host"], "0.0.0.0");
    }

    #[test]
    fn merge_null_preserves_target() {
        let target = serde_json::json!({"a": 1, "b": 2});
        let source = serde_json::json!({"a": null});
        let merged = deep_merge(target, source);
        assert_eq!(merged["a"], 1);
        assert_eq!(merged["b"], 2);
    }

    #[test]
    fn merge_array_replace() {
        let target = serde_json::json!({"items": [1, 2, 3]});
        let source = serde_json::json!({"items": [4]});
        assert_eq!(deep_merge(target, source)["items"], serde_json::json!([4]));
    }

    #[test]
    fn merge_primitive_replaces_object() {
        let target = serde_json::json!({"a": {"nested": true}});
        let source = serde_json::json!({"a": 42});
        assert_eq!(deep_merge(target, source)["a"], 42);
    }

    // ── load_settings_from_path ─────────────────────────────────────

    #[test]
    fn load_missing_file_returns_defaults() {
        let settings = read_file_layer(Path::new("/nonexistent/settings.json")).unwrap();
        assert_eq!(settings, RelaySettings::default());
    }

    #[test]
    fn load_partial_json_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"server": {"port": 9090}, "limits": {"idleTimeoutMs": 1000}}"#,
        )
        .unwrap();

        let settings = read_file_layer(&path).unwrap();
        assert_eq!(settings.server.port, 9090);
        assert_eq!(settings.server.host, "0.0.0.0");
        assert_eq!(settings.limits.idle_timeout_ms, 1000);
        assert_eq!(settings.limits.request_delay_ms, 500);
    }

    #[test]
    fn load_invalid_json_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(read_file_layer(&path), Err(SettingsError::Json(_))));
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_path_reports_file() {
        // A directory exists but cannot be read as a file
        let dir = tempfile::tempdir().unwrap();
        let err = read_file_layer(dir.path()).unwrap_err();
        match err {
            SettingsError::Read { path, .. } => assert_eq!(path, dir.path()),
            other => panic!("expected read error, got {other:?}"),
        }
    }

    #[test]
    fn load_wrong_type_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"server": {"port": "eighty"}}"#).unwrap();
        assert!(read_file_layer(&path).is_err());
    }

    #[test]
    fn load_rejects_invalid_combination() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"limits": {"maxDelayViolations": 3, "ignoreDelayViolations": 4}}"#,
        )
        .unwrap();
        let err = load_settings_from_path(&path).unwrap_err();
        assert_eq!(err.key(), Some("limits.ignoreDelayViolations"));
    }

    // ── env overrides ───────────────────────────────────────────────

    #[test]
    fn env_overrides_win() {
        let mut settings = RelaySettings::default();
        apply_overrides(
            &mut settings,
            vars(&[
                ("POINTRELAY_HOST", "127.0.0.1"),
                ("POINTRELAY_PORT", "9001"),
                ("POINTRELAY_IDLE_TIMEOUT_MS", "1500"),
                ("POINTRELAY_REQUEST_DELAY_MS", "250"),
                ("POINTRELAY_MAX_DELAY_VIOLATIONS", "20"),
                ("POINTRELAY_IGNORE_DELAY_VIOLATIONS", "8"),
                ("POINTRELAY_PENALTY_STEP", "2"),
                ("POINTRELAY_MAX_CONNECTIONS", "16"),
                ("POINTRELAY_LOG_LEVEL", "debug"),
                ("POINTRELAY_LOG_FORMAT", "json"),
            ]),
        );
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.server.port, 9001);
        assert_eq!(settings.server.max_connections, 16);
        assert_eq!(settings.limits.idle_timeout_ms, 1500);
        assert_eq!(settings.limits.request_delay_ms, 250);
        assert_eq!(settings.limits.max_delay_violations, 20);
        assert_eq!(settings.limits.ignore_delay_violations, 8);
        assert_eq!(settings.limits.penalty_step, 2);
        assert_eq!(settings.logging.level, "debug");
        assert_eq!(settings.logging.format, LogFormat::Json);
    }

    #[test]
    fn invalid_env_values_are_ignored() {
        let mut settings = RelaySettings::default();
        apply_overrides(
            &mut settings,
            vars(&[
                ("POINTRELAY_PORT", "0"),
                ("POINTRELAY_IDLE_TIMEOUT_MS", "soon"),
                ("POINTRELAY_HOST", ""),
                ("POINTRELAY_LOG_FORMAT", "yaml"),
            ]),
        );
        assert_eq!(settings, RelaySettings::default());
    }

    #[test]
    fn parse_in_range_bounds() {
        assert_eq!(parse_in_range("5", 1u32, 10), Some(5));
        assert_eq!(parse_in_range(" 10 ", 1u32, 10), Some(10));
        assert_eq!(parse_in_range("11", 1u32, 10), None);
        assert_eq!(parse_in_range("-1", 0u64, 10), None);
        assert_eq!(parse_in_range("abc", 0u16, 10), None);
    }
}
