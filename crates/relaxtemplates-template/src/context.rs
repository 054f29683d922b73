//! Template context and scope chain.
//!
//! [`Context`] is the root mapping a caller renders against. During rendering
//! the engine threads a [`Scope`] chain over it: the root frame wraps the
//! context, and each `each` iteration pushes a child frame binding the current
//! element to `it`. Frames only ever point at their parent, and a parent link
//! never changes once the frame exists.
//!
//! Name lookup starts at the innermost frame and walks outward; `..name`
//! starts one frame further out per leading `..`.

use std::collections::HashMap;

use relaxtemplates_core::error::TemplateError;
use serde::Serialize;

use crate::callable::Callable;
use crate::value::Value;

/// The name bound to the current element inside an `each` body.
pub const ITEM_NAME: &str = "it";

/// The root variables of a render.
///
/// # Examples
///
/// ```
/// use relaxtemplates_template::context::Context;
/// use relaxtemplates_template::value::Value;
///
/// let mut ctx = Context::new();
/// ctx.set("name", "jon doe");
/// assert_eq!(ctx.get("name"), Some(&Value::from("jon doe")));
/// assert!(ctx.get("missing").is_none());
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Context {
    vars: HashMap<String, Value>,
}

impl Context {
    /// Creates an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a variable, replacing any previous value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.vars.insert(key.into(), value.into());
    }

    /// Registers a callable under its own name.
    pub fn register(&mut self, callable: Callable) {
        self.vars
            .insert(callable.name().to_string(), Value::Callable(callable));
    }

    /// Looks up a top-level variable.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.vars.get(key)
    }

    /// Returns `true` if the variable is set.
    pub fn contains(&self, key: &str) -> bool {
        self.vars.contains_key(key)
    }

    /// The number of top-level variables.
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    /// Returns `true` if no variables are set.
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Builds a context from any type that serializes to a map.
    ///
    /// # Errors
    ///
    /// Returns a `RenderError` if serialization fails or the value is not a
    /// map.
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Self, TemplateError> {
        Self::try_from(Value::from_serialize(value)?)
    }
}

impl From<HashMap<String, Value>> for Context {
    fn from(vars: HashMap<String, Value>) -> Self {
        Self { vars }
    }
}

impl TryFrom<Value> for Context {
    type Error = TemplateError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Map(vars) => Ok(Self { vars }),
            other => Err(TemplateError::render(format!(
                "a context must be a map, got {}",
                other.type_name()
            ))),
        }
    }
}

impl TryFrom<serde_json::Value> for Context {
    type Error = TemplateError;

    fn try_from(value: serde_json::Value) -> Result<Self, Self::Error> {
        Self::try_from(Value::from(value))
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Context {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// A view of the scope chain: the root context plus one frame per enclosing
/// `each` iteration, outermost first.
///
/// A frame's parent is the same view without its innermost item, so parent
/// links never change while a frame is visible. The renderer owns the item
/// stack and hands out views over it.
///
/// # Examples
///
/// ```
/// use relaxtemplates_template::context::{Context, Scope};
/// use relaxtemplates_template::value::Value;
///
/// let mut ctx = Context::new();
/// ctx.set("name", "jon doe");
/// let items = [Value::Integer(1)];
/// let scope = Scope::new(&ctx, &items);
/// assert_eq!(scope.lookup("it"), Some(&Value::Integer(1)));
/// assert_eq!(scope.lookup("name"), Some(&Value::from("jon doe")));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Scope<'a> {
    context: &'a Context,
    items: &'a [Value],
}

impl<'a> Scope<'a> {
    /// Creates the root frame for a render.
    pub const fn root(context: &'a Context) -> Self {
        Self {
            context,
            items: &[],
        }
    }

    /// Creates a view whose innermost frame binds the last of `items` to `it`.
    pub const fn new(context: &'a Context, items: &'a [Value]) -> Self {
        Self { context, items }
    }

    /// The parent frame, or `None` at the root.
    pub fn parent(&self) -> Option<Self> {
        let (_, outer) = self.items.split_last()?;
        Some(Self::new(self.context, outer))
    }

    /// The frame `levels` steps outward, or `None` past the root.
    pub fn ancestor(&self, levels: usize) -> Option<Self> {
        (0..levels).try_fold(*self, |scope, _| scope.parent())
    }

    /// Resolves `name` starting at the innermost frame and walking outward;
    /// the nearest frame that defines it wins. Only `each` frames define
    /// `it`; everything else comes from the root context.
    pub fn lookup(&self, name: &str) -> Option<&'a Value> {
        match self.items.last() {
            Some(item) if name == ITEM_NAME => Some(item),
            _ => self.context.get(name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root_context() -> Context {
        let mut ctx = Context::new();
        ctx.set("name", "jon doe");
        ctx.set("count", 3);
        ctx
    }

    #[test]
    fn test_context_set_get() {
        let mut ctx = Context::new();
        assert!(ctx.is_empty());
        ctx.set("x", 1);
        assert_eq!(ctx.get("x"), Some(&Value::Integer(1)));
        ctx.set("x", 2);
        assert_eq!(ctx.get("x"), Some(&Value::Integer(2)));
        assert_eq!(ctx.len(), 1);
        assert!(ctx.contains("x"));
    }

    #[test]
    fn test_context_from_json() {
        let ctx = Context::try_from(serde_json::json!({"a": [1, 2], "b": {"c": "d"}})).unwrap();
        assert_eq!(ctx.get("a"), Some(&Value::from(vec![1, 2])));
        assert!(Context::try_from(serde_json::json!([1, 2])).is_err());
    }

    #[test]
    fn test_context_from_iterator() {
        let ctx: Context = [("a", 1), ("b", 2)].into_iter().collect();
        assert_eq!(ctx.get("b"), Some(&Value::Integer(2)));
    }

    #[test]
    fn test_register_callable() {
        let mut ctx = Context::new();
        ctx.register(Callable::new("noop", |_| Ok(Value::Null)));
        assert!(matches!(ctx.get("noop"), Some(Value::Callable(_))));
    }

    #[test]
    fn test_root_lookup() {
        let ctx = root_context();
        let root = Scope::root(&ctx);
        assert_eq!(root.lookup("name"), Some(&Value::from("jon doe")));
        assert_eq!(root.lookup("it"), None);
        assert!(root.parent().is_none());
    }

    #[test]
    fn test_item_frame_binds_it_and_falls_through() {
        let ctx = root_context();
        let items = [Value::Integer(7)];
        let scope = Scope::new(&ctx, &items);
        assert_eq!(scope.lookup("it"), Some(&Value::Integer(7)));
        assert_eq!(scope.lookup("name"), Some(&Value::from("jon doe")));
        assert_eq!(scope.lookup("count"), Some(&Value::Integer(3)));
    }

    #[test]
    fn test_nested_it_shadows_outer_it() {
        let ctx = root_context();
        let items = [Value::from("outer"), Value::from("inner")];
        let inner = Scope::new(&ctx, &items);
        assert_eq!(inner.lookup("it"), Some(&Value::from("inner")));
        let up = inner.ancestor(1).unwrap();
        assert_eq!(up.lookup("it"), Some(&Value::from("outer")));
    }

    #[test]
    fn test_ancestor_past_root_is_none() {
        let ctx = root_context();
        let items = [Value::Null];
        let scope = Scope::new(&ctx, &items);
        assert!(scope.ancestor(0).is_some());
        assert!(scope.ancestor(1).is_some());
        assert!(scope.ancestor(2).is_none());
        assert_eq!(scope.ancestor(1).unwrap().lookup("it"), None);
    }
}
