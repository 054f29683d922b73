//! Engine settings.
//!
//! [`Settings`] holds everything an [`Engine`] can be configured with. There is
//! no global instance: each engine owns its settings, and hosts build them
//! with [`Settings::default`] or the helpers in
//! [`settings_loader`](crate::settings_loader).
//!
//! [`Engine`]: https://docs.rs/relaxtemplates-template

use serde::{Deserialize, Serialize};

/// What a render returns when evaluation fails part-way through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OnRenderError {
    /// Drop whatever was rendered and return only the error.
    #[default]
    Discard,
    /// Return the error wrapped in
    /// [`TemplateError::PartialRender`](crate::error::TemplateError::PartialRender)
    /// together with the output produced so far.
    Keep,
}

impl OnRenderError {
    /// Parses a policy name (`discard` or `keep`, case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "discard" => Some(Self::Discard),
            "keep" => Some(Self::Keep),
            _ => None,
        }
    }
}

/// Render-time behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderSettings {
    /// Partial-output policy for failed renders.
    pub on_error: OnRenderError,
    /// Maximum nesting of `include`/`extends` resolutions within one render.
    pub max_include_depth: usize,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            on_error: OnRenderError::Discard,
            max_include_depth: 32,
        }
    }
}

/// The complete set of engine settings.
///
/// # Examples
///
/// ```
/// use relaxtemplates_core::settings::{OnRenderError, Settings};
///
/// let settings = Settings::default();
/// assert!(!settings.debug);
/// assert_eq!(settings.render.on_error, OnRenderError::Discard);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Whether debug mode is enabled (selects human-readable log output).
    pub debug: bool,
    /// The log filter directive (e.g. "info", "relaxtemplates=debug").
    pub log_level: String,
    /// Render-time behavior.
    pub render: RenderSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            debug: false,
            log_level: "info".to_string(),
            render: RenderSettings::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let s = Settings::default();
        assert!(!s.debug);
        assert_eq!(s.log_level, "info");
        assert_eq!(s.render.on_error, OnRenderError::Discard);
        assert_eq!(s.render.max_include_depth, 32);
    }

    #[test]
    fn test_policy_from_name() {
        assert_eq!(OnRenderError::from_name("keep"), Some(OnRenderError::Keep));
        assert_eq!(OnRenderError::from_name(" Discard "), Some(OnRenderError::Discard));
        assert_eq!(OnRenderError::from_name("retry"), None);
    }

    #[test]
    fn test_settings_serialization_roundtrip() {
        let mut s = Settings::default();
        s.render.on_error = OnRenderError::Keep;
        let json = serde_json::to_value(&s).unwrap();
        assert_eq!(json["render"]["on_error"], "keep");
        let back: Settings = serde_json::from_value(json).unwrap();
        assert_eq!(back.render.on_error, OnRenderError::Keep);
    }
}
