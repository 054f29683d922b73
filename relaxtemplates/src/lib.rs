//! # relaxtemplates
//!
//! A small text-template engine. Templates mix literal text with `{{ }}`
//! output expressions and `{% %}` control tags; they are parsed once into an
//! immutable tree and rendered against a [`Context`].
//!
//! This is the facade crate that re-exports the sub-crates. Depend on
//! `relaxtemplates-core` or `relaxtemplates-template` directly for finer
//! control.
//!
//! ## Example
//!
//! ```
//! use relaxtemplates::{parse, render, Callable, Context, Value};
//!
//! let template = parse(
//!     "{% each items %}{% if it.qty > 1 %}{{ it.name }} x{{ it.qty }}{% else %}{{ it.name }}{% end %};{% end %}",
//! )
//! .unwrap();
//!
//! let ctx = Context::try_from(serde_json::json!({
//!     "items": [{"name": "pen", "qty": 3}, {"name": "cup", "qty": 1}],
//! }))
//! .unwrap();
//! assert_eq!(render(&template, &ctx).unwrap(), "pen x3;cup;");
//!
//! let mut ctx = Context::new();
//! ctx.register(
//!     Callable::new("shout", |args| {
//!         Ok(Value::String(args[0].as_str().unwrap_or_default().to_uppercase()))
//!     })
//!     .param("text"),
//! );
//! assert_eq!(relaxtemplates::render_source("{% call shout 'hi' %}", &ctx).unwrap(), "HI");
//! ```

/// Error types, settings and logging setup.
pub use relaxtemplates_core as core;

/// Lexer, parser, renderer, loaders and engine.
pub use relaxtemplates_template as template;

pub use relaxtemplates_core::error::{ErrorCategory, Position, TemplateError, TemplateResult};
pub use relaxtemplates_core::logging::setup_logging;
pub use relaxtemplates_core::settings::{OnRenderError, RenderSettings, Settings};
pub use relaxtemplates_template::{
    parse, render, render_source, Callable, Context, Engine, Node, Renderer, StringLoader,
    Template, TemplateLoader, Value,
};
