//! Host functions exposed to templates.
//!
//! A [`Callable`] pairs a parameter list (names plus optional defaults) with an
//! opaque function. Templates invoke it with `{% call name pos... kw=val... %}`
//! or `{{ name(pos, kw=val) }}`; [`bind_arguments`] maps the written arguments
//! onto parameters before the function runs.
//!
//! ## Examples
//!
//! ```
//! use relaxtemplates_template::callable::Callable;
//! use relaxtemplates_template::value::Value;
//!
//! let pow = Callable::new("pow", |args| {
//!     let m = args[0].as_integer().unwrap_or(0);
//!     let e = args[1].as_integer().unwrap_or(0);
//!     Ok(Value::Integer(m.pow(e as u32)))
//! })
//! .param_with_default("m", 2)
//! .param_with_default("e", 2);
//!
//! let result = pow
//!     .call(vec![Value::Integer(3)], vec![])
//!     .unwrap();
//! assert_eq!(result, Value::Integer(9));
//! ```

use std::fmt;
use std::sync::Arc;

use relaxtemplates_core::error::TemplateError;

use crate::value::Value;

/// The function behind a [`Callable`].
///
/// Receives one value per declared parameter, in declaration order.
pub type CallableFn = dyn Fn(&[Value]) -> Result<Value, TemplateError> + Send + Sync;

/// A declared parameter of a [`Callable`].
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    /// The parameter name keyword arguments bind to.
    pub name: String,
    /// The value used when no argument binds to this parameter.
    pub default: Option<Value>,
}

/// A named host function and its declared parameters.
#[derive(Clone)]
pub struct Callable {
    name: String,
    params: Vec<Param>,
    func: Arc<CallableFn>,
}

impl Callable {
    /// Creates a callable with no parameters. Add them with [`param`](Self::param)
    /// and [`param_with_default`](Self::param_with_default).
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, TemplateError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            params: Vec::new(),
            func: Arc::new(func),
        }
    }

    /// Appends a required parameter.
    #[must_use]
    pub fn param(mut self, name: impl Into<String>) -> Self {
        self.params.push(Param {
            name: name.into(),
            default: None,
        });
        self
    }

    /// Appends a parameter that falls back to `default` when left unbound.
    #[must_use]
    pub fn param_with_default(mut self, name: impl Into<String>, default: impl Into<Value>) -> Self {
        self.params.push(Param {
            name: name.into(),
            default: Some(default.into()),
        });
        self
    }

    /// The callable's name, used in error messages.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The declared parameters, in order.
    pub fn params(&self) -> &[Param] {
        &self.params
    }

    /// Binds the arguments and invokes the function.
    ///
    /// # Errors
    ///
    /// Returns `ArgumentError` when binding fails, or whatever error the
    /// function itself returns.
    pub fn call(
        &self,
        positional: Vec<Value>,
        keyword: Vec<(String, Value)>,
    ) -> Result<Value, TemplateError> {
        let args = bind_arguments(&self.name, &self.params, positional, keyword)?;
        (self.func)(&args)
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callable")
            .field("name", &self.name)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

impl PartialEq for Callable {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && Arc::ptr_eq(&self.func, &other.func)
    }
}

/// Maps positional and keyword arguments onto `params`.
///
/// Positional arguments fill parameters in declaration order. Keyword
/// arguments bind by name and may not target a parameter that is already
/// bound. Parameters left unbound take their default. The result holds one
/// value per parameter.
///
/// # Errors
///
/// Returns `ArgumentError` for too many positional arguments, an unknown or
/// repeated keyword, a keyword naming a positionally bound parameter, or a
/// parameter with neither an argument nor a default.
pub fn bind_arguments(
    name: &str,
    params: &[Param],
    positional: Vec<Value>,
    keyword: Vec<(String, Value)>,
) -> Result<Vec<Value>, TemplateError> {
    if positional.len() > params.len() {
        return Err(TemplateError::ArgumentError(format!(
            "{name}() takes {} positional argument(s) but {} were given",
            params.len(),
            positional.len()
        )));
    }

    let mut slots: Vec<Option<Value>> = vec![None; params.len()];
    for (slot, value) in slots.iter_mut().zip(positional) {
        *slot = Some(value);
    }

    for (key, value) in keyword {
        let idx = params
            .iter()
            .position(|p| p.name == key)
            .ok_or_else(|| {
                TemplateError::ArgumentError(format!(
                    "{name}() got an unexpected keyword argument '{key}'"
                ))
            })?;
        if slots[idx].is_some() {
            return Err(TemplateError::ArgumentError(format!(
                "{name}() got multiple values for argument '{key}'"
            )));
        }
        slots[idx] = Some(value);
    }

    slots
        .into_iter()
        .zip(params)
        .map(|(slot, param)| {
            slot.or_else(|| param.default.clone()).ok_or_else(|| {
                TemplateError::ArgumentError(format!(
                    "{name}() missing required argument '{}'",
                    param.name
                ))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(decl: &[(&str, Option<i64>)]) -> Vec<Param> {
        decl.iter()
            .map(|(name, default)| Param {
                name: (*name).to_string(),
                default: default.map(Value::Integer),
            })
            .collect()
    }

    fn kw(pairs: &[(&str, i64)]) -> Vec<(String, Value)> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), Value::Integer(*v)))
            .collect()
    }

    fn ints(values: &[i64]) -> Vec<Value> {
        values.iter().copied().map(Value::Integer).collect()
    }

    #[test]
    fn test_defaults_fill_unbound() {
        let p = params(&[("m", Some(2)), ("e", Some(2))]);
        assert_eq!(bind_arguments("pow", &p, vec![], vec![]).unwrap(), ints(&[2, 2]));
    }

    #[test]
    fn test_positional_binds_in_order() {
        let p = params(&[("m", Some(2)), ("e", Some(2))]);
        assert_eq!(
            bind_arguments("pow", &p, ints(&[3]), vec![]).unwrap(),
            ints(&[3, 2])
        );
        assert_eq!(
            bind_arguments("pow", &p, ints(&[2, 3]), vec![]).unwrap(),
            ints(&[2, 3])
        );
    }

    #[test]
    fn test_keyword_binds_by_name() {
        let p = params(&[("m", Some(2)), ("e", Some(2))]);
        assert_eq!(
            bind_arguments("pow", &p, ints(&[2]), kw(&[("e", 5)])).unwrap(),
            ints(&[2, 5])
        );
        assert_eq!(
            bind_arguments("pow", &p, vec![], kw(&[("e", 4)])).unwrap(),
            ints(&[2, 4])
        );
        assert_eq!(
            bind_arguments("pow", &p, vec![], kw(&[("e", 4), ("m", 3)])).unwrap(),
            ints(&[3, 4])
        );
    }

    #[test]
    fn test_extra_positional_fails() {
        let p = params(&[("m", Some(2))]);
        let err = bind_arguments("sq", &p, ints(&[1, 2]), vec![]).unwrap_err();
        assert!(matches!(err, TemplateError::ArgumentError(ref m) if m.contains("takes 1")));
    }

    #[test]
    fn test_keyword_after_positional_same_param_fails() {
        let p = params(&[("m", Some(2)), ("e", Some(2))]);
        let err = bind_arguments("pow", &p, ints(&[2]), kw(&[("m", 3)])).unwrap_err();
        assert!(matches!(err, TemplateError::ArgumentError(ref m) if m.contains("multiple values")));
    }

    #[test]
    fn test_repeated_keyword_fails() {
        let p = params(&[("m", Some(2))]);
        let err = bind_arguments("f", &p, vec![], kw(&[("m", 1), ("m", 2)])).unwrap_err();
        assert!(matches!(err, TemplateError::ArgumentError(_)));
    }

    #[test]
    fn test_unknown_keyword_fails() {
        let p = params(&[("m", Some(2))]);
        let err = bind_arguments("f", &p, vec![], kw(&[("z", 1)])).unwrap_err();
        assert!(matches!(err, TemplateError::ArgumentError(ref m) if m.contains("'z'")));
    }

    #[test]
    fn test_missing_required_fails() {
        let p = params(&[("a", None), ("b", Some(1))]);
        let err = bind_arguments("f", &p, vec![], kw(&[("b", 5)])).unwrap_err();
        assert!(matches!(err, TemplateError::ArgumentError(ref m) if m.contains("'a'")));
    }

    #[test]
    fn test_call_invokes_with_bound_values() {
        let join = Callable::new("join", |args| {
            let parts: Vec<String> = args
                .iter()
                .map(|v| v.to_output_string().unwrap_or_default())
                .collect();
            Ok(Value::String(parts.join("-")))
        })
        .param("a")
        .param_with_default("b", "x");

        assert_eq!(
            join.call(vec![Value::from("q")], vec![]).unwrap(),
            Value::from("q-x")
        );
        assert_eq!(join.params().len(), 2);
        assert_eq!(join.name(), "join");
    }

    #[test]
    fn test_callable_equality_is_identity() {
        let a = Callable::new("f", |_| Ok(Value::Null));
        let b = a.clone();
        let c = Callable::new("f", |_| Ok(Value::Null));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
