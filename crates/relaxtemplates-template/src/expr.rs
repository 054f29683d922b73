//! Expression parsing and evaluation.
//!
//! Expressions appear inside `{{ }}` and as tag arguments. The grammar, from
//! lowest to highest precedence:
//!
//! ```text
//! expr      := primary (cmp_op primary)?
//! cmp_op    := '>' | '<' | '>=' | '<=' | '==' | '!='
//! primary   := NUMBER | STRING | 'true' | 'false' | 'null'
//!            | '[' (expr (',' expr)* ','?)? ']'
//!            | '(' expr ')'
//!            | path ('(' call_args ')')?
//! call_args := (arg (',' arg)*)?
//! arg       := IDENT '=' expr | expr
//! path      := ('..')* segment ('.' segment)*
//! ```
//!
//! Comparisons do not chain: `a < b < c` is a parse error. Evaluation runs
//! against a [`Scope`] chain and never fails on a missing name; unknown paths
//! evaluate to [`Value::Null`].

use std::cmp::Ordering;
use std::fmt;

use relaxtemplates_core::error::{Position, TemplateError};

use crate::context::Scope;
use crate::lexer::{Token, TokenKind};
use crate::value::Value;

/// A parsed expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A number, string, boolean or null literal.
    Literal(Value),
    /// A variable path such as `it.name` or `..title`.
    Path(Path),
    /// A list literal; elements are evaluated in order.
    List(Vec<Expr>),
    /// A single comparison.
    Compare {
        /// Left operand.
        left: Box<Expr>,
        /// The operator.
        op: CompareOp,
        /// Right operand.
        right: Box<Expr>,
    },
    /// A callable invocation, `name(a, k=v)` or the `call` tag.
    Call(CallExpr),
}

/// A comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `>`
    Gt,
    /// `<=`
    Le,
    /// `>=`
    Ge,
}

impl CompareOp {
    fn from_symbol(symbol: &str) -> Option<Self> {
        Some(match symbol {
            "==" => Self::Eq,
            "!=" => Self::Ne,
            "<" => Self::Lt,
            ">" => Self::Gt,
            "<=" => Self::Le,
            ">=" => Self::Ge,
            _ => return None,
        })
    }

    /// The operator as written in templates.
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Gt => ">",
            Self::Le => "<=",
            Self::Ge => ">=",
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// A variable path.
///
/// `up` counts leading `..` markers: lookup starts that many frames above the
/// current one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Path {
    /// Frames to climb before the first lookup.
    pub up: usize,
    /// The dotted segments; never empty.
    pub segments: Vec<String>,
}

impl Path {
    /// Parses the text of an identifier token into a path.
    ///
    /// # Errors
    ///
    /// Returns a `ParseError` if any segment is empty (`a..b`, `.a`, `a.`).
    pub fn parse(text: &str, position: Position) -> Result<Self, TemplateError> {
        let mut rest = text;
        let mut up = 0;
        while let Some(stripped) = rest.strip_prefix("..") {
            up += 1;
            rest = stripped;
        }
        let segments: Vec<String> = rest.split('.').map(str::to_string).collect();
        if segments.iter().any(String::is_empty) {
            return Err(TemplateError::parse(
                format!("malformed variable path '{text}'"),
                position,
            ));
        }
        Ok(Self { up, segments })
    }

    /// Returns `true` for a single segment with no `..` prefix.
    pub fn is_simple(&self) -> bool {
        self.up == 0 && self.segments.len() == 1
    }

    /// Resolves the path against `scope` without cloning.
    pub fn resolve<'a>(&self, scope: &Scope<'a>) -> Option<&'a Value> {
        let (first, rest) = self.segments.split_first()?;
        let start = scope.ancestor(self.up)?;
        rest.iter()
            .try_fold(start.lookup(first)?, |value, segment| value.get_attr(segment))
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for _ in 0..self.up {
            f.write_str("..")?;
        }
        f.write_str(&self.segments.join("."))
    }
}

/// A callable invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct CallExpr {
    /// The path naming the callable.
    pub callee: Path,
    /// Positional arguments, in order.
    pub args: Vec<Expr>,
    /// Keyword arguments, in the order written.
    pub kwargs: Vec<(String, Expr)>,
}

impl CallExpr {
    /// Resolves the callee, evaluates every argument and invokes it.
    ///
    /// # Errors
    ///
    /// Returns a `RenderError` if the callee is undefined or not callable, an
    /// `ArgumentError` if binding fails, or any error the callable returns.
    pub fn eval(&self, scope: &Scope<'_>) -> Result<Value, TemplateError> {
        let callable = match self.callee.resolve(scope) {
            Some(Value::Callable(callable)) => callable,
            None | Some(Value::Null) => {
                return Err(TemplateError::render(format!(
                    "'{}' is not defined",
                    self.callee
                )))
            }
            Some(other) => {
                return Err(TemplateError::render(format!(
                    "'{}' is not callable (it is a {})",
                    self.callee,
                    other.type_name()
                )))
            }
        };
        let positional = self
            .args
            .iter()
            .map(|arg| arg.eval(scope))
            .collect::<Result<Vec<_>, _>>()?;
        let keyword = self
            .kwargs
            .iter()
            .map(|(name, arg)| Ok((name.clone(), arg.eval(scope)?)))
            .collect::<Result<Vec<_>, TemplateError>>()?;
        callable.call(positional, keyword)
    }
}

impl Expr {
    /// Evaluates the expression in `scope`.
    ///
    /// # Errors
    ///
    /// Returns a `RenderError` for an incompatible ordering comparison or a
    /// failed call.
    pub fn eval(&self, scope: &Scope<'_>) -> Result<Value, TemplateError> {
        match self {
            Self::Literal(value) => Ok(value.clone()),
            Self::Path(path) => Ok(path.resolve(scope).cloned().unwrap_or_default()),
            Self::List(items) => items
                .iter()
                .map(|item| item.eval(scope))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
            Self::Compare { left, op, right } => {
                let left = left.eval(scope)?;
                let right = right.eval(scope)?;
                compare(&left, *op, &right).map(Value::Bool)
            }
            Self::Call(call) => call.eval(scope),
        }
    }
}

/// Applies a comparison operator.
///
/// Equality is defined for every pair of values. Ordering is defined for
/// number/number, string/string and bool/bool; a NaN operand makes every
/// ordering comparison false.
///
/// # Errors
///
/// Returns a `RenderError` for an ordering comparison between other kinds.
pub fn compare(left: &Value, op: CompareOp, right: &Value) -> Result<bool, TemplateError> {
    Ok(match op {
        CompareOp::Eq => left == right,
        CompareOp::Ne => left != right,
        CompareOp::Lt => order(left, op, right)? == Some(Ordering::Less),
        CompareOp::Gt => order(left, op, right)? == Some(Ordering::Greater),
        CompareOp::Le => matches!(
            order(left, op, right)?,
            Some(Ordering::Less | Ordering::Equal)
        ),
        CompareOp::Ge => matches!(
            order(left, op, right)?,
            Some(Ordering::Greater | Ordering::Equal)
        ),
    })
}

fn order(left: &Value, op: CompareOp, right: &Value) -> Result<Option<Ordering>, TemplateError> {
    match (left, right) {
        (Value::Integer(a), Value::Integer(b)) => Ok(Some(a.cmp(b))),
        (Value::String(a), Value::String(b)) => Ok(Some(a.cmp(b))),
        (Value::Bool(a), Value::Bool(b)) => Ok(Some(a.cmp(b))),
        (Value::Integer(_) | Value::Float(_), Value::Integer(_) | Value::Float(_)) => Ok(left
            .as_float()
            .zip(right.as_float())
            .and_then(|(a, b)| a.partial_cmp(&b))),
        _ => Err(TemplateError::render(format!(
            "cannot compare {} with {} using '{op}'",
            left.type_name(),
            right.type_name()
        ))),
    }
}

// ── Parsing ──────────────────────────────────────────────────────────

/// A cursor over the tokens of one `{{ }}` or `{% %}` region.
///
/// `end` is the position of the region's closing delimiter, reported when
/// the region runs out of tokens.
pub(crate) struct TokenCursor<'t> {
    tokens: &'t [Token],
    pos: usize,
    end: Position,
}

impl<'t> TokenCursor<'t> {
    pub(crate) const fn new(tokens: &'t [Token], end: Position) -> Self {
        Self {
            tokens,
            pos: 0,
            end,
        }
    }

    pub(crate) fn peek(&self) -> Option<&'t Token> {
        self.tokens.get(self.pos)
    }

    fn peek_nth(&self, n: usize) -> Option<&'t Token> {
        self.tokens.get(self.pos + n)
    }

    pub(crate) fn next_token(&mut self) -> Option<&'t Token> {
        let token = self.tokens.get(self.pos)?;
        self.pos += 1;
        Some(token)
    }

    pub(crate) fn is_done(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn position(&self) -> Position {
        self.peek().map_or(self.end, |t| t.position)
    }

    fn found(&self) -> String {
        self.peek()
            .map_or_else(|| "end of tag".to_string(), ToString::to_string)
    }

    /// Builds a `ParseError` at the current token.
    pub(crate) fn error(&self, expected: &str) -> TemplateError {
        TemplateError::parse(
            format!("expected {expected}, found {}", self.found()),
            self.position(),
        )
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.peek().is_some_and(|t| t.kind == kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, expected: &str) -> Result<&'t Token, TemplateError> {
        match self.peek() {
            Some(token) if token.kind == kind => {
                self.pos += 1;
                Ok(token)
            }
            _ => Err(self.error(expected)),
        }
    }

    /// Fails if any token is left in the region.
    pub(crate) fn finish(&self, tag: &str) -> Result<(), TemplateError> {
        match self.peek() {
            None => Ok(()),
            Some(token) => Err(TemplateError::parse(
                format!("unexpected {token} in '{tag}'"),
                token.position,
            )),
        }
    }

    fn at_keyword_arg(&self) -> bool {
        self.peek().is_some_and(|t| t.kind == TokenKind::Ident)
            && self.peek_nth(1).is_some_and(|t| t.is_operator("="))
    }
}

/// Parses one expression from the cursor.
pub(crate) fn parse_expr(cursor: &mut TokenCursor<'_>) -> Result<Expr, TemplateError> {
    let left = parse_primary(cursor)?;
    let Some(op) = peek_compare_op(cursor) else {
        return Ok(left);
    };
    cursor.next_token();
    let right = parse_primary(cursor)?;
    if peek_compare_op(cursor).is_some() {
        return Err(TemplateError::parse(
            "comparison operators cannot be chained",
            cursor.position(),
        ));
    }
    Ok(Expr::Compare {
        left: Box::new(left),
        op,
        right: Box::new(right),
    })
}

fn peek_compare_op(cursor: &TokenCursor<'_>) -> Option<CompareOp> {
    cursor
        .peek()
        .filter(|t| t.kind == TokenKind::Operator)
        .and_then(|t| CompareOp::from_symbol(&t.value))
}

/// Parses a primary: a literal, list, parenthesized expression or path,
/// with an optional call suffix.
pub(crate) fn parse_primary(cursor: &mut TokenCursor<'_>) -> Result<Expr, TemplateError> {
    let Some(token) = cursor.peek() else {
        return Err(cursor.error("an expression"));
    };
    match token.kind {
        TokenKind::Number => {
            cursor.next_token();
            parse_number(token).map(Expr::Literal)
        }
        TokenKind::Str => {
            cursor.next_token();
            Ok(Expr::Literal(Value::String(token.value.clone())))
        }
        TokenKind::LBracket => {
            cursor.next_token();
            parse_list(cursor)
        }
        TokenKind::LParen => {
            cursor.next_token();
            let inner = parse_expr(cursor)?;
            cursor.expect(TokenKind::RParen, "')'")?;
            Ok(inner)
        }
        TokenKind::Ident => {
            cursor.next_token();
            match token.value.as_str() {
                "true" => return Ok(Expr::Literal(Value::Bool(true))),
                "false" => return Ok(Expr::Literal(Value::Bool(false))),
                "null" => return Ok(Expr::Literal(Value::Null)),
                _ => {}
            }
            let path = Path::parse(&token.value, token.position)?;
            if cursor.eat(TokenKind::LParen) {
                parse_paren_call(cursor, path).map(Expr::Call)
            } else {
                Ok(Expr::Path(path))
            }
        }
        _ => Err(cursor.error("an expression")),
    }
}

fn parse_number(token: &Token) -> Result<Value, TemplateError> {
    let text = token.value.as_str();
    let parsed = if text.contains('.') {
        text.parse::<f64>().ok().map(Value::Float)
    } else {
        text.parse::<i64>().ok().map(Value::Integer)
    };
    parsed.ok_or_else(|| {
        TemplateError::parse(format!("invalid number literal '{text}'"), token.position)
    })
}

fn parse_list(cursor: &mut TokenCursor<'_>) -> Result<Expr, TemplateError> {
    let mut items = Vec::new();
    loop {
        if cursor.eat(TokenKind::RBracket) {
            break;
        }
        items.push(parse_expr(cursor)?);
        if !cursor.eat(TokenKind::Comma) {
            cursor.expect(TokenKind::RBracket, "',' or ']'")?;
            break;
        }
    }
    Ok(Expr::List(items))
}

fn keyword_name(cursor: &mut TokenCursor<'_>) -> Result<String, TemplateError> {
    let name = cursor.expect(TokenKind::Ident, "an argument name")?;
    let path = Path::parse(&name.value, name.position)?;
    if !path.is_simple() {
        return Err(TemplateError::parse(
            format!("invalid keyword argument name '{}'", name.value),
            name.position,
        ));
    }
    // The '=' was checked by `at_keyword_arg`.
    cursor.next_token();
    Ok(name.value.clone())
}

fn positional_after_keyword(cursor: &TokenCursor<'_>) -> TemplateError {
    TemplateError::parse(
        "positional argument follows keyword argument",
        cursor.position(),
    )
}

/// Parses `a, b, k=v)` after the opening paren of a call expression.
fn parse_paren_call(cursor: &mut TokenCursor<'_>, callee: Path) -> Result<CallExpr, TemplateError> {
    let mut call = CallExpr {
        callee,
        args: Vec::new(),
        kwargs: Vec::new(),
    };
    loop {
        if cursor.eat(TokenKind::RParen) {
            break;
        }
        if cursor.at_keyword_arg() {
            let name = keyword_name(cursor)?;
            call.kwargs.push((name, parse_expr(cursor)?));
        } else if call.kwargs.is_empty() {
            call.args.push(parse_expr(cursor)?);
        } else {
            return Err(positional_after_keyword(cursor));
        }
        if !cursor.eat(TokenKind::Comma) {
            cursor.expect(TokenKind::RParen, "',' or ')'")?;
            break;
        }
    }
    Ok(call)
}

/// Parses the arguments of a `{% call name pos... kw=val... %}` tag, starting
/// at the callee name.
pub(crate) fn parse_call_tag(cursor: &mut TokenCursor<'_>) -> Result<CallExpr, TemplateError> {
    let name = cursor.expect(TokenKind::Ident, "a callable name")?;
    let mut call = CallExpr {
        callee: Path::parse(&name.value, name.position)?,
        args: Vec::new(),
        kwargs: Vec::new(),
    };
    while !cursor.is_done() {
        if cursor.at_keyword_arg() {
            let name = keyword_name(cursor)?;
            call.kwargs.push((name, parse_primary(cursor)?));
        } else if call.kwargs.is_empty() {
            call.args.push(parse_primary(cursor)?);
        } else {
            return Err(positional_after_keyword(cursor));
        }
    }
    Ok(call)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callable::Callable;
    use crate::context::Context;
    use crate::lexer::tokenize;

    /// Parses the contents of a single `{{ }}` region.
    fn expr(source: &str) -> Result<Expr, TemplateError> {
        let tokens = tokenize(&format!("{{{{ {source} }}}}"))?;
        let inner = &tokens[1..tokens.len() - 1];
        let mut cursor = TokenCursor::new(inner, tokens[tokens.len() - 1].position);
        let parsed = parse_expr(&mut cursor)?;
        cursor.finish("expression")?;
        Ok(parsed)
    }

    fn eval(source: &str, ctx: &Context) -> Result<Value, TemplateError> {
        expr(source)?.eval(&Scope::root(ctx))
    }

    fn sample_context() -> Context {
        let mut ctx = Context::try_from(serde_json::json!({
            "num": 7,
            "name": "jon doe",
            "user": {"name": "Alice", "tags": ["a", "b"]},
        }))
        .unwrap();
        ctx.register(
            Callable::new("add", |args| {
                let a = args[0].as_integer().unwrap_or(0);
                let b = args[1].as_integer().unwrap_or(0);
                Ok(Value::Integer(a + b))
            })
            .param("a")
            .param_with_default("b", 1),
        );
        ctx
    }

    #[test]
    fn test_literals() {
        let ctx = Context::new();
        assert_eq!(eval("42", &ctx).unwrap(), Value::Integer(42));
        assert_eq!(eval("-3", &ctx).unwrap(), Value::Integer(-3));
        assert_eq!(eval("2.5", &ctx).unwrap(), Value::Float(2.5));
        assert_eq!(eval("'hi'", &ctx).unwrap(), Value::from("hi"));
        assert_eq!(eval("true", &ctx).unwrap(), Value::Bool(true));
        assert_eq!(eval("null", &ctx).unwrap(), Value::Null);
    }

    #[test]
    fn test_list_literal() {
        let ctx = sample_context();
        assert_eq!(
            eval("[1, 'a', num]", &ctx).unwrap(),
            Value::List(vec![Value::Integer(1), Value::from("a"), Value::Integer(7)])
        );
        assert_eq!(eval("[]", &ctx).unwrap(), Value::List(vec![]));
        assert_eq!(eval("[1, 2,]", &ctx).unwrap(), Value::from(vec![1, 2]));
    }

    #[test]
    fn test_paths() {
        let ctx = sample_context();
        assert_eq!(eval("user.name", &ctx).unwrap(), Value::from("Alice"));
        assert_eq!(eval("user.tags.1", &ctx).unwrap(), Value::from("b"));
        assert_eq!(eval("user.missing", &ctx).unwrap(), Value::Null);
        assert_eq!(eval("nothing.at.all", &ctx).unwrap(), Value::Null);
        assert_eq!(eval("it", &ctx).unwrap(), Value::Null);
    }

    #[test]
    fn test_parent_path_resolution() {
        let ctx = sample_context();
        let items = [Value::from(serde_json::json!({"name": "item"}))];
        let child = Scope::new(&ctx, &items);

        let path = |s: &str| Path::parse(s, Position::start()).unwrap();
        assert_eq!(path("it.name").resolve(&child), Some(&Value::from("item")));
        assert_eq!(path("..name").resolve(&child), Some(&Value::from("jon doe")));
        assert_eq!(path("....name").resolve(&child), None);
        assert_eq!(path("..it").resolve(&child), None);
    }

    #[test]
    fn test_path_parse() {
        let p = Path::parse("....a.b", Position::start()).unwrap();
        assert_eq!(p.up, 2);
        assert_eq!(p.segments, vec!["a", "b"]);
        assert_eq!(p.to_string(), "....a.b");
        assert!(Path::parse("a..b", Position::start()).is_err());
        assert!(Path::parse("...a", Position::start()).is_err());
        assert!(Path::parse("a.", Position::start()).is_err());
    }

    #[test]
    fn test_comparisons() {
        let ctx = sample_context();
        assert_eq!(eval("num > 5", &ctx).unwrap(), Value::Bool(true));
        assert_eq!(eval("num <= 5", &ctx).unwrap(), Value::Bool(false));
        assert_eq!(eval("num == 7.0", &ctx).unwrap(), Value::Bool(true));
        assert_eq!(eval("name != 'x'", &ctx).unwrap(), Value::Bool(true));
        assert_eq!(eval("'a' < 'b'", &ctx).unwrap(), Value::Bool(true));
        assert_eq!(eval("1 == '1'", &ctx).unwrap(), Value::Bool(false));
        assert_eq!(eval("missing == null", &ctx).unwrap(), Value::Bool(true));
        assert_eq!(eval("(num >= 7)", &ctx).unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_incompatible_ordering_is_render_error() {
        let ctx = sample_context();
        let err = eval("name > 5", &ctx).unwrap_err();
        assert!(matches!(err, TemplateError::RenderError(ref m) if m.contains("cannot compare")));
        assert!(eval("missing < 1", &ctx).is_err());
    }

    #[test]
    fn test_chained_comparison_rejected() {
        assert!(matches!(
            expr("1 < 2 < 3"),
            Err(TemplateError::ParseError { .. })
        ));
    }

    #[test]
    fn test_call_expression() {
        let ctx = sample_context();
        assert_eq!(eval("add(2)", &ctx).unwrap(), Value::Integer(3));
        assert_eq!(eval("add(2, b=5)", &ctx).unwrap(), Value::Integer(7));
        assert_eq!(eval("add(b=1, a=num)", &ctx).unwrap(), Value::Integer(8));
        assert!(matches!(
            expr("add(b=1, 2)"),
            Err(TemplateError::ParseError { .. })
        ));
    }

    #[test]
    fn test_call_undefined_or_not_callable() {
        let ctx = sample_context();
        let err = eval("nope()", &ctx).unwrap_err();
        assert!(matches!(err, TemplateError::RenderError(ref m) if m.contains("not defined")));
        let err = eval("name()", &ctx).unwrap_err();
        assert!(matches!(err, TemplateError::RenderError(ref m) if m.contains("not callable")));
    }

    #[test]
    fn test_malformed_expressions() {
        assert!(matches!(expr("[1, 2"), Err(TemplateError::ParseError { .. })));
        assert!(matches!(expr("1 +"), Err(TemplateError::ParseError { .. })));
        assert!(matches!(expr(", x"), Err(TemplateError::ParseError { .. })));
        assert!(matches!(expr("a b"), Err(TemplateError::ParseError { .. })));
    }

    #[test]
    fn test_call_tag_arguments() {
        let tokens = tokenize("{% call pow 2 e=5 %}").unwrap();
        let inner = &tokens[2..tokens.len() - 1];
        let mut cursor = TokenCursor::new(inner, tokens[tokens.len() - 1].position);
        let call = parse_call_tag(&mut cursor).unwrap();
        assert_eq!(call.callee.to_string(), "pow");
        assert_eq!(call.args, vec![Expr::Literal(Value::Integer(2))]);
        assert_eq!(
            call.kwargs,
            vec![("e".to_string(), Expr::Literal(Value::Integer(5)))]
        );
    }

    #[test]
    fn test_call_tag_positional_after_keyword() {
        let tokens = tokenize("{% call pow e=5 2 %}").unwrap();
        let inner = &tokens[2..tokens.len() - 1];
        let mut cursor = TokenCursor::new(inner, tokens[tokens.len() - 1].position);
        assert!(matches!(
            parse_call_tag(&mut cursor),
            Err(TemplateError::ParseError { .. })
        ));
    }
}
