//! # relaxtemplates-template
//!
//! A small text-template language: literal text interleaved with `{{ }}`
//! output expressions and `{% %}` control tags. Templates are parsed once into
//! an immutable tree and rendered against a [`Context`] any number of times,
//! from any number of threads.
//!
//! ## Modules
//!
//! - [`lexer`] - Source text to tokens
//! - [`expr`] - Expression grammar and evaluation
//! - [`parser`] - Tokens to a [`Template`] tree
//! - [`render`] - Tree-walking [`Renderer`]
//! - [`value`] - Runtime [`Value`]s
//! - [`callable`] - Host functions exposed to templates
//! - [`context`] - Root [`Context`] and the scope chain
//! - [`loaders`] - Name-to-template resolution for `include`/`extends`
//! - [`engine`] - [`Engine`] tying settings, loaders and rendering together
//!
//! ## Example
//!
//! ```
//! use relaxtemplates_template::{parse, render, Context};
//!
//! let template = parse("{% each [1, 2, 3] %}{{ ..name }}-{{ it }} {% end %}").unwrap();
//! let mut ctx = Context::new();
//! ctx.set("name", "jon");
//! assert_eq!(render(&template, &ctx).unwrap(), "jon-1 jon-2 jon-3 ");
//! ```

pub mod callable;
pub mod context;
pub mod engine;
pub mod expr;
pub mod lexer;
pub mod loaders;
pub mod parser;
pub mod render;
pub mod value;

pub use callable::Callable;
pub use context::Context;
pub use engine::Engine;
pub use loaders::{StringLoader, TemplateLoader};
pub use parser::{Node, Template};
pub use render::Renderer;
pub use value::Value;

use relaxtemplates_core::error::TemplateError;
use relaxtemplates_core::settings::RenderSettings;

/// Parses a template source string.
///
/// # Errors
///
/// Returns a `LexError` or `ParseError` describing the first problem.
pub fn parse(source: &str) -> Result<Template, TemplateError> {
    Template::parse(source)
}

/// Renders a parsed template with default settings and no loader.
///
/// # Errors
///
/// Returns the first error raised while rendering.
pub fn render(template: &Template, context: &Context) -> Result<String, TemplateError> {
    let settings = RenderSettings::default();
    Renderer::new(&settings).render(template, context)
}

/// Parses and renders a source string in one step.
///
/// # Errors
///
/// Returns a lex, parse or render error.
pub fn render_source(source: &str, context: &Context) -> Result<String, TemplateError> {
    render(&parse(source)?, context)
}
