//! Runtime values flowing through templates.
//!
//! [`Value`] is the closed set of data a template can see: null, booleans,
//! numbers, strings, lists, maps and callables. Conversions exist from Rust
//! primitives, collections, `serde_json::Value` and any `Serialize` type.

use std::collections::HashMap;

use relaxtemplates_core::error::TemplateError;
use serde::Serialize;

use crate::callable::Callable;

/// A dynamic template value.
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// The absence of a value. Also what unknown names resolve to.
    #[default]
    Null,
    /// A boolean.
    Bool(bool),
    /// A 64-bit integer.
    Integer(i64),
    /// A 64-bit float.
    Float(f64),
    /// A string.
    String(String),
    /// An ordered list of values.
    List(Vec<Value>),
    /// A name-to-value mapping.
    Map(HashMap<String, Value>),
    /// A host function that templates can invoke with `call`.
    Callable(Callable),
}

impl Value {
    /// Returns `true` if this value is considered "truthy".
    ///
    /// - `Null` is falsy
    /// - Empty strings, lists and maps are falsy
    /// - `Bool(false)` is falsy
    /// - `Integer(0)` and `Float(0.0)` are falsy
    /// - Everything else, including every callable, is truthy
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Bool(b) => *b,
            Self::Integer(i) => *i != 0,
            Self::Float(f) => *f != 0.0,
            Self::String(s) => !s.is_empty(),
            Self::List(l) => !l.is_empty(),
            Self::Map(m) => !m.is_empty(),
            Self::Callable(_) => true,
        }
    }

    /// A short name for the value's kind, used in error messages.
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Integer(_) => "integer",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::List(_) => "list",
            Self::Map(_) => "map",
            Self::Callable(_) => "callable",
        }
    }

    /// Converts this value to the text `{{ }}` emits.
    ///
    /// Floats keep a trailing `.0` when integral and booleans print as
    /// `True`/`False`. `Null` prints as nothing.
    ///
    /// # Errors
    ///
    /// Lists, maps and callables have no output form and yield a
    /// `RenderError`.
    pub fn to_output_string(&self) -> Result<String, TemplateError> {
        match self {
            Self::Null => Ok(String::new()),
            Self::Bool(true) => Ok("True".to_string()),
            Self::Bool(false) => Ok("False".to_string()),
            Self::Integer(i) => Ok(i.to_string()),
            Self::Float(f) => Ok(format_float(*f)),
            Self::String(s) => Ok(s.clone()),
            Self::List(_) | Self::Map(_) | Self::Callable(_) => Err(TemplateError::render(format!(
                "cannot output a {} value",
                self.type_name()
            ))),
        }
    }

    /// Looks up one path segment on this value (`user.name`, `items.0`).
    pub fn get_attr(&self, key: &str) -> Option<&Self> {
        match self {
            Self::Map(map) => map.get(key),
            Self::List(list) => key.parse::<usize>().ok().and_then(|idx| list.get(idx)),
            _ => None,
        }
    }

    /// Returns the string contents if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns this value as an `f64` if it is a number.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Returns this value as an `i64` if it is an integer, or an integral float.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            Self::Float(f) if f.fract() == 0.0 && f.is_finite() => Some(*f as i64),
            _ => None,
        }
    }

    /// Returns `true` for `Null`.
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Converts any serializable type into a `Value` via `serde_json`.
    ///
    /// # Errors
    ///
    /// Returns a `RenderError` if serialization fails (e.g. a map with
    /// non-string keys).
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Self, TemplateError> {
        serde_json::to_value(value)
            .map(Self::from)
            .map_err(|e| TemplateError::render(format!("cannot convert value: {e}")))
    }
}

/// Magnitude from which floats print in exponent form.
const EXPONENT_THRESHOLD: f64 = 1e16;

fn format_float(f: f64) -> String {
    if !f.is_finite() {
        f.to_string()
    } else if f.abs() >= EXPONENT_THRESHOLD {
        format!("{f:e}")
    } else if f.fract() == 0.0 {
        format!("{f:.1}")
    } else {
        f.to_string()
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Integer(a), Self::Integer(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Integer(a), Self::Float(b)) | (Self::Float(b), Self::Integer(a)) => {
                (*a as f64) == *b
            }
            (Self::String(a), Self::String(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Map(a), Self::Map(b)) => a == b,
            (Self::Callable(a), Self::Callable(b)) => a == b,
            _ => false,
        }
    }
}

// -- From implementations --

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<char> for Value {
    fn from(c: char) -> Self {
        Self::String(c.to_string())
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Integer(i64::from(i))
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Self::Integer(i64::from(i))
    }
}

impl From<u64> for Value {
    fn from(i: u64) -> Self {
        i64::try_from(i).map_or(Self::Float(i as f64), Self::Integer)
    }
}

impl From<usize> for Value {
    fn from(i: usize) -> Self {
        i64::try_from(i).map_or(Self::Float(i as f64), Self::Integer)
    }
}

impl From<f32> for Value {
    fn from(f: f32) -> Self {
        Self::Float(f64::from(f))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<Callable> for Value {
    fn from(c: Callable) -> Self {
        Self::Callable(c)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Self::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<HashMap<String, T>> for Value {
    fn from(m: HashMap<String, T>) -> Self {
        Self::Map(m.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(o: Option<T>) -> Self {
        o.map_or(Self::Null, Into::into)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Integer(i)
                } else if let Some(f) = n.as_f64() {
                    Self::Float(f)
                } else {
                    Self::Null
                }
            }
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(arr) => Self::List(arr.into_iter().map(Self::from).collect()),
            serde_json::Value::Object(map) => {
                Self::Map(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}
