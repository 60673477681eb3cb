//! Configuration loading and environment parsing.

use super::validation::validate_config;
use super::Config;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

/// Inline JSON document.
pub const CONFIG_JSON_ENV: &str = "CASTLINK_CONFIG_JSON";
/// Path to a JSON config file.
pub const CONFIG_PATH_ENV: &str = "CASTLINK_CONFIG_PATH";
/// Prefix of per-field overrides, `CASTLINK__SECTION__FIELD`.
pub const ENV_OVERRIDE_PREFIX: &str = "CASTLINK__";

/// Load configuration with the following precedence (highest first):
/// 1) `CASTLINK__*` per-field environment overrides (`__` separates nesting,
///    e.g. `CASTLINK__PORT=8080` or `CASTLINK__MATCHMAKING__LOCK_ATTEMPTS=20`)
/// 2) `CASTLINK_CONFIG_JSON` env var containing raw JSON
/// 3) File pointed to by `CASTLINK_CONFIG_PATH`
/// 4) config.json in the current working directory
/// 5) Defaults compiled into the binary
///
/// Read and parse errors are printed to stderr and the source is skipped.
/// Validation problems are reported but not fatal here; `main` validates
/// again and refuses to start.
#[must_use]
pub fn load() -> Config {
    let defaults = Config::default();
    let mut merged = serde_json::to_value(&defaults).unwrap_or_else(|_| Value::Object(Map::new()));

    // Lowest file precedence first so later sources win.
    merge_file_source(&mut merged, &PathBuf::from("config.json"));

    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        merge_file_source(&mut merged, &PathBuf::from(path));
    }

    if let Ok(json) = std::env::var(CONFIG_JSON_ENV) {
        if let Some(value) = parse_json_document(&json, CONFIG_JSON_ENV) {
            merge_values(&mut merged, value);
        }
    }

    apply_env_overrides(&mut merged, std::env::vars());

    let config = match serde_json::from_value::<Config>(merged) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to deserialize config; using defaults: {e}");
            defaults
        }
    };

    if let Err(e) = validate_config(&config) {
        eprintln!("Configuration validation error: {e}");
    }

    config
}

fn parse_json_document(raw: &str, label: &str) -> Option<Value> {
    if raw.trim().is_empty() {
        return None;
    }

    match serde_json::from_str(raw) {
        Ok(value) => Some(value),
        Err(err) => {
            eprintln!("Failed to parse config from {label}: {err}");
            None
        }
    }
}

fn merge_file_source(target: &mut Value, path: &Path) {
    if path.as_os_str().is_empty() || !path.exists() {
        return;
    }

    match fs::read_to_string(path) {
        Ok(contents) => {
            if let Some(value) = parse_json_document(&contents, &format!("file {}", path.display()))
            {
                merge_values(target, value);
            }
        }
        Err(err) => {
            eprintln!("Failed to read config from {}: {}", path.display(), err);
        }
    }
}

/// Deep-merge `source` into `target`; objects merge key by key, anything else replaces.
pub fn merge_values(target: &mut Value, source: Value) {
    match (target, source) {
        (Value::Object(target_map), Value::Object(source_map)) => {
            for (key, value) in source_map {
                match target_map.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        target_map.insert(key, value);
                    }
                }
            }
        }
        (target_slot, source_value) => {
            *target_slot = source_value;
        }
    }
}

/// Apply `CASTLINK__A__B=value` pairs from `vars` onto `root`.
pub fn apply_env_overrides(root: &mut Value, vars: impl IntoIterator<Item = (String, String)>) {
    for (key, raw_value) in vars {
        let Some(stripped) = key.strip_prefix(ENV_OVERRIDE_PREFIX) else {
            continue;
        };

        let segments: Vec<String> = stripped
            .split("__")
            .filter(|segment| !segment.is_empty())
            .map(str::to_ascii_lowercase)
            .collect();

        if segments.is_empty() {
            continue;
        }

        set_nested_value(root, &segments, parse_env_value(&raw_value));
    }
}

fn parse_env_value(raw: &str) -> Value {
    let trimmed = raw.trim();
    if trimmed.contains(',') && !trimmed.starts_with('{') && !trimmed.starts_with('[') {
        let items = trimmed
            .split(',')
            .map(|segment| parse_scalar(segment.trim()))
            .collect::<Vec<_>>();
        return Value::Array(items);
    }

    parse_scalar(trimmed)
}

fn parse_scalar(raw: &str) -> Value {
    if raw.is_empty() {
        return Value::String(String::new());
    }

    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn set_nested_value(target: &mut Value, segments: &[String], value: Value) {
    let Some((first, rest)) = segments.split_first() else {
        *target = value;
        return;
    };

    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    let Value::Object(map) = target else {
        return;
    };

    if rest.is_empty() {
        map.insert(first.clone(), value);
        return;
    }

    let entry = map
        .entry(first.clone())
        .or_insert_with(|| Value::Object(Map::new()));
    set_nested_value(entry, rest, value);
}
