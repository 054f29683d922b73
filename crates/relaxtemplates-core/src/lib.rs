//! # relaxtemplates-core
//!
//! Error types, settings and logging setup shared by the relaxtemplates crates.
//!
//! ## Modules
//!
//! - [`error`] - The [`TemplateError`] enum, source [`Position`]s and result alias
//! - [`settings`] - Engine settings
//! - [`settings_loader`] - Settings from TOML/JSON text and `RELAX_*` variables
//! - [`logging`] - Tracing-based logging integration

pub mod error;
pub mod logging;
pub mod settings;
pub mod settings_loader;

// Re-export the most commonly used types at the crate root.
pub use error::{ErrorCategory, Position, TemplateError, TemplateResult};
pub use settings::{OnRenderError, RenderSettings, Settings};
