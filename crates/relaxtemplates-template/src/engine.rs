//! Template engine: settings, loaders and rendering in one place.
//!
//! The [`Engine`] owns its [`Settings`], an in-memory [`StringLoader`] for
//! templates added programmatically, and any number of extra loaders. Named
//! lookups try the string loader first and then each extra loader in the
//! order added. The engine also acts as the loader for `include` and
//! `extends` inside the templates it renders.

use std::sync::Arc;

use relaxtemplates_core::error::TemplateError;
use relaxtemplates_core::logging::render_span;
use relaxtemplates_core::settings::Settings;

use crate::context::Context;
use crate::loaders::{StringLoader, TemplateLoader};
use crate::parser::Template;
use crate::render::Renderer;

/// The template engine.
///
/// # Examples
///
/// ```
/// use relaxtemplates_template::context::Context;
/// use relaxtemplates_template::engine::Engine;
///
/// let engine = Engine::new();
/// engine.add_template("hello", "Hello {{ name }}!").unwrap();
///
/// let mut ctx = Context::new();
/// ctx.set("name", "World");
///
/// let result = engine.render_template("hello", &ctx).unwrap();
/// assert_eq!(result, "Hello World!");
/// ```
pub struct Engine {
    /// Engine settings.
    settings: Settings,
    /// Programmatically added templates.
    string_loader: StringLoader,
    /// Extra loaders, tried in order after the string loader.
    loaders: Vec<Box<dyn TemplateLoader>>,
}

impl Engine {
    /// Creates an engine with default settings.
    pub fn new() -> Self {
        Self::with_settings(Settings::default())
    }

    /// Creates an engine with the given settings.
    pub fn with_settings(settings: Settings) -> Self {
        Self {
            settings,
            string_loader: StringLoader::new(),
            loaders: Vec::new(),
        }
    }

    /// The engine's settings.
    pub const fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Appends a loader, tried after every loader added before it.
    pub fn add_loader(&mut self, loader: impl TemplateLoader + 'static) {
        self.loaders.push(Box::new(loader));
    }

    /// Replaces all extra loaders with `loader`.
    pub fn set_loader(&mut self, loader: impl TemplateLoader + 'static) {
        self.loaders.clear();
        self.add_loader(loader);
    }

    /// Parses `source` and registers it under `name`.
    ///
    /// # Errors
    ///
    /// Returns a `LexError` or `ParseError` if the source is invalid.
    pub fn add_template(&self, name: &str, source: &str) -> Result<(), TemplateError> {
        self.string_loader.add(name, source)
    }

    /// Finds a template by name.
    ///
    /// # Errors
    ///
    /// Returns `TemplateDoesNotExist` if no loader has it, or the first
    /// other error a loader reports.
    pub fn get_template(&self, name: &str) -> Result<Arc<Template>, TemplateError> {
        self.load(name)
    }

    /// Renders a parsed template.
    ///
    /// # Errors
    ///
    /// Returns the first error raised while rendering.
    pub fn render(&self, template: &Template, context: &Context) -> Result<String, TemplateError> {
        Renderer::new(&self.settings.render)
            .with_loader(self)
            .render(template, context)
    }

    /// Looks up a template by name and renders it.
    ///
    /// # Errors
    ///
    /// Returns `TemplateDoesNotExist` if the template cannot be found, or the
    /// first error raised while rendering.
    pub fn render_template(&self, name: &str, context: &Context) -> Result<String, TemplateError> {
        let _span = render_span(name).entered();
        let template = self.get_template(name)?;
        let result = self.render(&template, context);
        if let Err(err) = &result {
            tracing::debug!(error = %err, "render failed");
        }
        result
    }

    /// Parses and renders a source string in one step.
    ///
    /// # Errors
    ///
    /// Returns a lex, parse or render error.
    pub fn render_source(&self, source: &str, context: &Context) -> Result<String, TemplateError> {
        self.render(&Template::parse(source)?, context)
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("settings", &self.settings)
            .field("templates", &self.string_loader.len())
            .field("loaders", &self.loaders.len())
            .finish()
    }
}

impl TemplateLoader for Engine {
    fn load(&self, name: &str) -> Result<Arc<Template>, TemplateError> {
        tracing::trace!(template = name, "resolving template");
        match self.string_loader.load(name) {
            Err(TemplateError::TemplateDoesNotExist(_)) => {}
            found => return found,
        }
        for loader in &self.loaders {
            match loader.load(name) {
                Err(TemplateError::TemplateDoesNotExist(_)) => {}
                found => return found,
            }
        }
        Err(TemplateError::TemplateDoesNotExist(format!(
            "'{name}' could not be found"
        )))
    }
}
