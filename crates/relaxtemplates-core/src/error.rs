//! Core error types for relaxtemplates.
//!
//! A single error enum, [`TemplateError`], covers every failure the engine can
//! report: lexing, parsing, rendering, argument binding, template lookup and
//! configuration. Each variant maps to a coarse [`ErrorCategory`] via
//! [`TemplateError::category`].

use std::fmt;

use thiserror::Error;

/// A location in template source.
///
/// `offset` is a byte offset; `line` and `column` are 1-based, with columns
/// counted in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Position {
    /// Byte offset from the start of the source.
    pub offset: usize,
    /// 1-based line number.
    pub line: usize,
    /// 1-based column number (in characters).
    pub column: usize,
}

impl Position {
    /// Creates a position from its parts.
    pub const fn new(offset: usize, line: usize, column: usize) -> Self {
        Self {
            offset,
            line,
            column,
        }
    }

    /// The position of the first character of a source.
    pub const fn start() -> Self {
        Self::new(0, 1, 1)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// The broad class a [`TemplateError`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The source could not be tokenized.
    Lex,
    /// The token stream is not a valid template.
    Parse,
    /// Evaluation failed while rendering.
    Render,
    /// Settings are missing or malformed.
    Config,
}

/// The error type for relaxtemplates.
#[derive(Error, Debug)]
pub enum TemplateError {
    // ── Parse time ───────────────────────────────────────────────────

    /// An unterminated tag, expression, comment or string literal.
    #[error("Lex error at {position}: {message}")]
    LexError {
        /// What went wrong.
        message: String,
        /// Where the offending construct starts.
        position: Position,
    },

    /// The template's structure or an embedded expression is invalid.
    #[error("Parse error at {position}: {message}")]
    ParseError {
        /// What went wrong, including the unexpected token.
        message: String,
        /// Position of the unexpected token.
        position: Position,
    },

    // ── Render time ──────────────────────────────────────────────────

    /// A runtime evaluation failure.
    #[error("Render error: {0}")]
    RenderError(String),

    /// Arguments could not be bound to a callable's parameters.
    #[error("Argument error: {0}")]
    ArgumentError(String),

    /// The loader has no template with the requested name.
    #[error("Template does not exist: {0}")]
    TemplateDoesNotExist(String),

    /// A render-time error together with the output produced before it.
    ///
    /// Only returned when partial output is kept (see
    /// [`OnRenderError::Keep`](crate::settings::OnRenderError::Keep)).
    #[error("{error}")]
    PartialRender {
        /// The error that aborted rendering.
        error: Box<TemplateError>,
        /// Output produced up to the failure.
        output: String,
    },

    // ── Configuration ────────────────────────────────────────────────

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

impl TemplateError {
    /// Builds a [`TemplateError::LexError`].
    pub fn lex(message: impl Into<String>, position: Position) -> Self {
        Self::LexError {
            message: message.into(),
            position,
        }
    }

    /// Builds a [`TemplateError::ParseError`].
    pub fn parse(message: impl Into<String>, position: Position) -> Self {
        Self::ParseError {
            message: message.into(),
            position,
        }
    }

    /// Builds a [`TemplateError::RenderError`].
    pub fn render(message: impl Into<String>) -> Self {
        Self::RenderError(message.into())
    }

    /// Returns the category of this error.
    ///
    /// - `LexError` -> `Lex`
    /// - `ParseError` -> `Parse`
    /// - `ConfigurationError` -> `Config`
    /// - everything else -> `Render`
    ///
    /// `PartialRender` reports the category of the error it wraps.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::LexError { .. } => ErrorCategory::Lex,
            Self::ParseError { .. } => ErrorCategory::Parse,
            Self::ConfigurationError(_) => ErrorCategory::Config,
            Self::PartialRender { error, .. } => error.category(),
            Self::RenderError(_) | Self::ArgumentError(_) | Self::TemplateDoesNotExist(_) => {
                ErrorCategory::Render
            }
        }
    }

    /// The source position attached to lex and parse errors.
    pub const fn position(&self) -> Option<Position> {
        match self {
            Self::LexError { position, .. } | Self::ParseError { position, .. } => Some(*position),
            _ => None,
        }
    }

    /// Output rendered before the failure, if it was kept.
    pub fn partial_output(&self) -> Option<&str> {
        match self {
            Self::PartialRender { output, .. } => Some(output),
            _ => None,
        }
    }

    /// Strips a `PartialRender` wrapper, returning the underlying error.
    #[must_use]
    pub fn into_inner(self) -> Self {
        match self {
            Self::PartialRender { error, .. } => error.into_inner(),
            other => other,
        }
    }
}

/// A convenience type alias for `Result<T, TemplateError>`.
pub type TemplateResult<T> = Result<T, TemplateError>;
