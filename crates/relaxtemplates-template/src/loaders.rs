//! Template loaders.
//!
//! A loader resolves a template name to a parsed [`Template`]. The renderer
//! calls it for `{% include %}` and `{% extends %}`; the [`Engine`] calls it
//! for named renders. The engine itself never touches the filesystem, so
//! hosts that keep templates on disk supply their own loader (any
//! `Fn(&str) -> Result<Arc<Template>, TemplateError>` closure works).
//!
//! [`Engine`]: crate::engine::Engine

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use relaxtemplates_core::error::TemplateError;

use crate::parser::Template;

/// Loads parsed templates by name.
pub trait TemplateLoader: Send + Sync {
    /// Loads the template with the given name.
    ///
    /// # Errors
    ///
    /// Returns `TemplateDoesNotExist` if the loader has no such template.
    fn load(&self, name: &str) -> Result<Arc<Template>, TemplateError>;
}

impl<F> TemplateLoader for F
where
    F: Fn(&str) -> Result<Arc<Template>, TemplateError> + Send + Sync,
{
    fn load(&self, name: &str) -> Result<Arc<Template>, TemplateError> {
        self(name)
    }
}

/// Holds templates in memory, parsed once when added.
///
/// # Examples
///
/// ```
/// use relaxtemplates_template::loaders::{StringLoader, TemplateLoader};
///
/// let loader = StringLoader::new();
/// loader.add("hello", "Hello {{ name }}!").unwrap();
/// assert!(loader.load("hello").is_ok());
/// assert!(loader.load("missing").is_err());
/// ```
#[derive(Debug, Default)]
pub struct StringLoader {
    templates: RwLock<HashMap<String, Arc<Template>>>,
}

impl StringLoader {
    /// Creates an empty loader.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a loader from a map of template names to sources.
    ///
    /// # Errors
    ///
    /// Returns the first lex or parse error, naming nothing else.
    pub fn from_map(sources: HashMap<String, String>) -> Result<Self, TemplateError> {
        let loader = Self::new();
        for (name, source) in sources {
            loader.add(name, &source)?;
        }
        Ok(loader)
    }

    /// Parses `source` and stores it under `name`, replacing any previous
    /// template with that name.
    ///
    /// # Errors
    ///
    /// Returns a `LexError` or `ParseError` if the source is invalid; the
    /// loader is left unchanged.
    pub fn add(&self, name: impl Into<String>, source: &str) -> Result<(), TemplateError> {
        let name = name.into();
        let template = Template::parse(source)?;
        tracing::debug!(template = %name, "registered template");
        self.insert(name, template);
        Ok(())
    }

    /// Stores an already parsed template.
    pub fn insert(&self, name: impl Into<String>, template: Template) {
        self.templates
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), Arc::new(template));
    }

    /// Returns `true` if a template with this name is stored.
    pub fn contains(&self, name: &str) -> bool {
        self.templates
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    /// The number of stored templates.
    pub fn len(&self) -> usize {
        self.templates
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns `true` if no templates are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TemplateLoader for StringLoader {
    fn load(&self, name: &str) -> Result<Arc<Template>, TemplateError> {
        self.templates
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .ok_or_else(|| {
                TemplateError::TemplateDoesNotExist(format!("'{name}' not found in StringLoader"))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_loader_basic() {
        let loader = StringLoader::new();
        loader.add("hello", "Hello {{ name }}!").unwrap();

        let template = loader.load("hello").unwrap();
        assert_eq!(*template, Template::parse("Hello {{ name }}!").unwrap());
        assert!(loader.contains("hello"));
        assert_eq!(loader.len(), 1);
    }

    #[test]
    fn test_string_loader_not_found() {
        let loader = StringLoader::new();
        assert!(loader.is_empty());
        assert!(matches!(
            loader.load("missing"),
            Err(TemplateError::TemplateDoesNotExist(_))
        ));
    }

    #[test]
    fn test_string_loader_rejects_invalid_source() {
        let loader = StringLoader::new();
        assert!(matches!(
            loader.add("bad", "{% if x %}"),
            Err(TemplateError::ParseError { .. })
        ));
        assert!(!loader.contains("bad"));
    }

    #[test]
    fn test_string_loader_from_map() {
        let mut map = HashMap::new();
        map.insert("a".to_string(), "content A".to_string());
        map.insert("b".to_string(), "content B".to_string());

        let loader = StringLoader::from_map(map).unwrap();
        assert_eq!(loader.len(), 2);
        assert!(loader.load("b").is_ok());
    }

    #[test]
    fn test_string_loader_overwrite() {
        let loader = StringLoader::new();
        loader.add("x", "version 1").unwrap();
        loader.add("x", "version 2").unwrap();
        assert_eq!(
            *loader.load("x").unwrap(),
            Template::parse("version 2").unwrap()
        );
        assert_eq!(loader.len(), 1);
    }

    #[test]
    fn test_closure_loader() {
        let base = Arc::new(Template::parse("base").unwrap());
        let loader = move |name: &str| {
            if name == "base" {
                Ok(Arc::clone(&base))
            } else {
                Err(TemplateError::TemplateDoesNotExist(name.to_string()))
            }
        };
        assert!(loader.load("base").is_ok());
        assert!(loader.load("other").is_err());
    }
}
