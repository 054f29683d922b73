//! Settings loading from configuration text and the environment.
//!
//! ## Loading Order
//!
//! 1. Start with default settings.
//! 2. Merge a TOML or JSON document over them (only the keys it names change).
//! 3. Apply environment variable overrides (highest priority).
//!
//! Reading configuration files is left to the host; these helpers take the
//! document text.
//!
//! ## Environment Variable Mapping
//!
//! | Env Var | Setting |
//! |---|---|
//! | `RELAX_DEBUG` | `debug` |
//! | `RELAX_LOG_LEVEL` | `log_level` |
//! | `RELAX_ON_ERROR` | `render.on_error` (`discard` or `keep`) |
//! | `RELAX_MAX_INCLUDE_DEPTH` | `render.max_include_depth` |
//!
//! ## Examples
//!
//! ```
//! use relaxtemplates_core::settings::OnRenderError;
//! use relaxtemplates_core::settings_loader;
//!
//! let settings = settings_loader::from_toml_str(
//!     r#"
//!     [render]
//!     on_error = "keep"
//!     "#,
//! )
//! .unwrap();
//! assert_eq!(settings.render.on_error, OnRenderError::Keep);
//! assert_eq!(settings.render.max_include_depth, 32);
//! ```

use crate::error::TemplateError;
use crate::settings::{OnRenderError, Settings};

/// Loads settings from a TOML string, keeping defaults for absent keys.
///
/// # Errors
///
/// Returns `ConfigurationError` if the TOML is malformed or does not match
/// the settings schema.
pub fn from_toml_str(toml_str: &str) -> Result<Settings, TemplateError> {
    // TOML is merged through serde_json so that partial documents keep the
    // defaults for every key they leave out.
    let toml_value: toml::Value = toml::from_str(toml_str)
        .map_err(|e| TemplateError::ConfigurationError(format!("Failed to parse TOML: {e}")))?;

    merge_over_defaults(toml_to_json(toml_value), "TOML")
}

/// Loads settings from a JSON string, keeping defaults for absent keys.
///
/// # Errors
///
/// Returns `ConfigurationError` if the JSON is malformed or does not match
/// the settings schema.
pub fn from_json_str(json_str: &str) -> Result<Settings, TemplateError> {
    let json_value: serde_json::Value = serde_json::from_str(json_str)
        .map_err(|e| TemplateError::ConfigurationError(format!("Failed to parse JSON: {e}")))?;

    merge_over_defaults(json_value, "JSON")
}

/// Loads settings from just environment variables (starting from defaults).
pub fn from_env() -> Settings {
    let mut settings = Settings::default();
    apply_env_overrides(&mut settings);
    settings
}

/// Applies `RELAX_*` environment variable overrides to a settings struct.
///
/// Unparseable values are ignored with a warning.
pub fn apply_env_overrides(settings: &mut Settings) {
    apply_overrides_from(settings, |key| std::env::var(key).ok());
}

/// Applies overrides using `lookup` in place of the process environment.
pub fn apply_overrides_from<F>(settings: &mut Settings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(val) = lookup("RELAX_DEBUG") {
        settings.debug = matches!(val.to_lowercase().as_str(), "true" | "1" | "yes");
    }

    if let Some(val) = lookup("RELAX_LOG_LEVEL") {
        settings.log_level = val;
    }

    if let Some(val) = lookup("RELAX_ON_ERROR") {
        match OnRenderError::from_name(&val) {
            Some(policy) => settings.render.on_error = policy,
            None => tracing::warn!("Ignoring RELAX_ON_ERROR={val:?}: expected 'discard' or 'keep'"),
        }
    }

    if let Some(val) = lookup("RELAX_MAX_INCLUDE_DEPTH") {
        match val.trim().parse::<usize>() {
            Ok(depth) => settings.render.max_include_depth = depth,
            Err(e) => tracing::warn!("Ignoring RELAX_MAX_INCLUDE_DEPTH={val:?}: {e}"),
        }
    }
}

// ============================================================
// Helpers
// ============================================================

fn merge_over_defaults(value: serde_json::Value, format: &str) -> Result<Settings, TemplateError> {
    let default_json = serde_json::to_value(Settings::default()).map_err(|e| {
        TemplateError::ConfigurationError(format!("Failed to serialize default settings: {e}"))
    })?;

    let merged = merge_json(default_json, value);
    serde_json::from_value(merged).map_err(|e| {
        TemplateError::ConfigurationError(format!(
            "Failed to deserialize settings from {format}: {e}"
        ))
    })
}

/// Converts a TOML value to a `serde_json::Value`.
fn toml_to_json(value: toml::Value) -> serde_json::Value {
    match value {
        toml::Value::String(s) => serde_json::Value::String(s),
        toml::Value::Integer(i) => serde_json::json!(i),
        toml::Value::Float(f) => serde_json::json!(f),
        toml::Value::Boolean(b) => serde_json::Value::Bool(b),
        toml::Value::Datetime(dt) => serde_json::Value::String(dt.to_string()),
        toml::Value::Array(arr) => {
            serde_json::Value::Array(arr.into_iter().map(toml_to_json).collect())
        }
        toml::Value::Table(table) => serde_json::Value::Object(
            table
                .into_iter()
                .map(|(k, v)| (k, toml_to_json(v)))
                .collect(),
        ),
    }
}

/// Deep-merges two JSON values. The `override_val` takes precedence.
fn merge_json(base: serde_json::Value, override_val: serde_json::Value) -> serde_json::Value {
    match (base, override_val) {
        (serde_json::Value::Object(mut base_map), serde_json::Value::Object(override_map)) => {
            for (key, override_v) in override_map {
                let merged = if let Some(base_v) = base_map.remove(&key) {
                    merge_json(base_v, override_v)
                } else {
                    override_v
                };
                base_map.insert(key, merged);
            }
            serde_json::Value::Object(base_map)
        }
        (_, override_val) => override_val,
    }
}
