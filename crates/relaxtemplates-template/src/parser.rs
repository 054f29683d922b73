//! Template parser.
//!
//! Converts a stream of lexer [`Token`]s into a [`Template`]: a tree of
//! [`Node`]s that can be rendered any number of times. Block tags (`each`,
//! `if`, `block`) are matched to their `else`/`end` terminators with an
//! explicit stack of open blocks, so nesting depth never grows the call
//! stack. Dropping a tree is iterative for the same reason.
//!
//! ## Tags
//!
//! | Tag | Form |
//! |---|---|
//! | `each` | `{% each expr %} ... [{% else %} ...] {% end %}` |
//! | `if` | `{% if expr %} ... [{% else %} ...] {% end %}` |
//! | `call` | `{% call name pos... kw=val... %}` |
//! | `include` | `{% include expr %}` |
//! | `extends` | `{% extends expr %}` (top level, at most once) |
//! | `block` | `{% block name %} ... {% end %}` |
//! | `comment` | `{% comment %} ... {% end %}` |

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use relaxtemplates_core::error::{Position, TemplateError};

use crate::expr::{self, CallExpr, Expr, Path, TokenCursor};
use crate::lexer::{self, Token, TokenKind};

/// Block definitions by name. Bodies are shared with the `Block` nodes that
/// define them.
pub type Blocks = HashMap<String, Arc<Vec<Node>>>;

/// A node in the parsed template tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// A literal text segment.
    Text(String),
    /// An output expression, `{{ expr }}`.
    Output(Expr),
    /// An `{% each %}` loop.
    Each {
        /// The expression producing the items.
        iterable: Expr,
        /// Rendered once per item, with the item bound to `it`.
        body: Vec<Node>,
        /// Rendered when there are no items.
        else_body: Option<Vec<Node>>,
    },
    /// An `{% if %}` conditional.
    If {
        /// The condition, tested for truthiness.
        condition: Expr,
        /// Rendered when the condition is truthy.
        then_body: Vec<Node>,
        /// Rendered otherwise, if present.
        else_body: Option<Vec<Node>>,
    },
    /// A `{% call %}` tag.
    Call(CallExpr),
    /// A `{# #}` or `{% comment %}` comment.
    Comment,
    /// An `{% include %}` tag.
    Include {
        /// Evaluates to the included template's name.
        name: Expr,
    },
    /// The whole body of a template that uses `{% extends %}`.
    Extends {
        /// Evaluates to the parent template's name.
        name: Expr,
        /// Every block defined in the child, by name.
        blocks: Blocks,
    },
    /// A `{% block %}` region.
    Block {
        /// The block name.
        name: String,
        /// The default content.
        body: Arc<Vec<Node>>,
    },
}

impl Node {
    /// Moves every child node into `into`, leaving this node's bodies empty.
    /// Bodies still shared with another owner are left alone.
    fn take_children(&mut self, into: &mut Vec<Self>) {
        match self {
            Self::Each { body, else_body, .. }
            | Self::If {
                then_body: body,
                else_body,
                ..
            } => {
                into.append(body);
                if let Some(else_body) = else_body {
                    into.append(else_body);
                }
            }
            Self::Block { body, .. } => {
                if let Some(body) = Arc::get_mut(body) {
                    into.append(body);
                }
            }
            Self::Extends { blocks, .. } => {
                for (_, mut body) in blocks.drain() {
                    if let Some(body) = Arc::get_mut(&mut body) {
                        into.append(body);
                    }
                }
            }
            Self::Text(_)
            | Self::Output(_)
            | Self::Call(_)
            | Self::Comment
            | Self::Include { .. } => {}
        }
    }
}

impl Drop for Node {
    fn drop(&mut self) {
        let mut pending = Vec::new();
        self.take_children(&mut pending);
        while let Some(mut node) = pending.pop() {
            node.take_children(&mut pending);
        }
    }
}

/// A parsed template.
///
/// Immutable once built; share it across threads and render it repeatedly.
///
/// # Examples
///
/// ```
/// use relaxtemplates_template::parser::{Node, Template};
///
/// let template = Template::parse("Hello {{ name }}!").unwrap();
/// assert_eq!(template.nodes().len(), 3);
/// assert!(matches!(template.nodes()[0], Node::Text(_)));
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Template {
    nodes: Vec<Node>,
}

impl Template {
    /// Tokenizes and parses a template source string.
    ///
    /// # Errors
    ///
    /// Returns a `LexError` or `ParseError` describing the first problem.
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let tokens = lexer::tokenize(source)?;
        parse_tokens(&tokens)
    }

    /// The top-level nodes.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// The parent template expression, if this template extends another.
    pub fn parent(&self) -> Option<&Expr> {
        match self.nodes.as_slice() {
            [Node::Extends { name, .. }] => Some(name),
            _ => None,
        }
    }
}

/// Parses a template source string. Shorthand for [`Template::parse`].
///
/// # Errors
///
/// Returns a `LexError` or `ParseError` describing the first problem.
pub fn parse(source: &str) -> Result<Template, TemplateError> {
    Template::parse(source)
}

/// Parses an already tokenized template.
///
/// # Errors
///
/// Returns a `ParseError` describing the first problem.
pub fn parse_tokens(tokens: &[Token]) -> Result<Template, TemplateError> {
    let mut parser = ParserState::new(tokens);
    parser.run()?;
    parser.finish()
}

/// What kind of block a stack frame is collecting.
#[derive(Debug)]
enum OpenKind {
    Each(Expr),
    If(Expr),
    Block(String),
}

impl OpenKind {
    const fn tag(&self) -> &'static str {
        match self {
            Self::Each(_) => "each",
            Self::If(_) => "if",
            Self::Block(_) => "block",
        }
    }
}

/// A block whose `end` has not been seen yet.
#[derive(Debug)]
struct OpenBlock {
    kind: OpenKind,
    position: Position,
    body: Vec<Node>,
    else_body: Option<Vec<Node>>,
}

impl OpenBlock {
    const fn new(kind: OpenKind, position: Position) -> Self {
        Self {
            kind,
            position,
            body: Vec::new(),
            else_body: None,
        }
    }

    fn into_node(self) -> Node {
        match self.kind {
            OpenKind::Each(iterable) => Node::Each {
                iterable,
                body: self.body,
                else_body: self.else_body,
            },
            OpenKind::If(condition) => Node::If {
                condition,
                then_body: self.body,
                else_body: self.else_body,
            },
            OpenKind::Block(name) => Node::Block {
                name,
                body: Arc::new(self.body),
            },
        }
    }
}

struct ParserState<'a> {
    tokens: &'a [Token],
    pos: usize,
    root: Vec<Node>,
    stack: Vec<OpenBlock>,
    extends: Option<Expr>,
    block_names: HashSet<String>,
    blocks: Blocks,
}

impl<'a> ParserState<'a> {
    fn new(tokens: &'a [Token]) -> Self {
        Self {
            tokens,
            pos: 0,
            root: Vec::new(),
            stack: Vec::new(),
            extends: None,
            block_names: HashSet::new(),
            blocks: HashMap::new(),
        }
    }

    /// The node list currently being filled.
    fn current(&mut self) -> &mut Vec<Node> {
        match self.stack.last_mut() {
            Some(top) => match &mut top.else_body {
                Some(nodes) => nodes,
                None => &mut top.body,
            },
            None => &mut self.root,
        }
    }

    fn push(&mut self, node: Node) {
        self.current().push(node);
    }

    /// Returns the tokens between an opener at `self.pos` and its closer,
    /// plus the closer's position, and moves past the closer.
    fn take_region(&mut self, close: TokenKind) -> Result<(&'a [Token], Position), TemplateError> {
        let tokens = self.tokens;
        let start = self.pos + 1;
        let len = tokens[start..]
            .iter()
            .position(|t| t.kind == close)
            .ok_or_else(|| TemplateError::parse("unclosed delimiter", tokens[self.pos].position))?;
        let end = start + len;
        self.pos = end + 1;
        Ok((&tokens[start..end], tokens[end].position))
    }

    fn run(&mut self) -> Result<(), TemplateError> {
        let tokens = self.tokens;
        while let Some(token) = tokens.get(self.pos) {
            match token.kind {
                TokenKind::Text => {
                    self.push(Node::Text(token.value.clone()));
                    self.pos += 1;
                }
                TokenKind::Comment => {
                    self.push(Node::Comment);
                    self.pos += 1;
                }
                TokenKind::ExprOpen => {
                    let (region, end) = self.take_region(TokenKind::ExprClose)?;
                    let mut cursor = TokenCursor::new(region, end);
                    let output = expr::parse_expr(&mut cursor)?;
                    cursor.finish("output expression")?;
                    self.push(Node::Output(output));
                }
                TokenKind::TagOpen => {
                    let open = token.position;
                    let (region, end) = self.take_region(TokenKind::TagClose)?;
                    self.parse_tag(region, end, open)?;
                }
                _ => {
                    return Err(TemplateError::parse(
                        format!("unexpected {token}"),
                        token.position,
                    ))
                }
            }
        }
        Ok(())
    }

    fn parse_tag(
        &mut self,
        region: &'a [Token],
        end: Position,
        open: Position,
    ) -> Result<(), TemplateError> {
        let mut cursor = TokenCursor::new(region, end);
        let Some(keyword) = cursor.next_token().filter(|t| t.kind == TokenKind::Ident) else {
            return Err(TemplateError::parse("expected a tag name", open));
        };

        match keyword.value.as_str() {
            "each" => {
                let iterable = expr::parse_expr(&mut cursor)?;
                cursor.finish("each")?;
                self.stack.push(OpenBlock::new(OpenKind::Each(iterable), open));
            }
            "if" => {
                let condition = expr::parse_expr(&mut cursor)?;
                cursor.finish("if")?;
                self.stack.push(OpenBlock::new(OpenKind::If(condition), open));
            }
            "block" => {
                let name = block_name(&mut cursor)?;
                cursor.finish("block")?;
                if !self.block_names.insert(name.clone()) {
                    return Err(TemplateError::parse(
                        format!("block '{name}' is defined more than once"),
                        open,
                    ));
                }
                self.stack.push(OpenBlock::new(OpenKind::Block(name), open));
            }
            "else" => {
                cursor.finish("else")?;
                self.open_else(open)?;
            }
            "end" => {
                cursor.finish("end")?;
                self.close_block(open)?;
            }
            "call" => {
                let call = expr::parse_call_tag(&mut cursor)?;
                cursor.finish("call")?;
                self.push(Node::Call(call));
            }
            "include" => {
                let name = expr::parse_expr(&mut cursor)?;
                cursor.finish("include")?;
                self.push(Node::Include { name });
            }
            "extends" => {
                let name = expr::parse_expr(&mut cursor)?;
                cursor.finish("extends")?;
                if !self.stack.is_empty() {
                    return Err(TemplateError::parse(
                        "'extends' must appear at the top level of a template",
                        open,
                    ));
                }
                if self.extends.is_some() {
                    return Err(TemplateError::parse(
                        "'extends' may appear only once per template",
                        open,
                    ));
                }
                self.extends = Some(name);
            }
            "comment" => {
                cursor.finish("comment")?;
                self.skip_comment(open)?;
                self.push(Node::Comment);
            }
            other => {
                return Err(TemplateError::parse(
                    format!("unknown tag '{other}'"),
                    keyword.position,
                ))
            }
        }
        Ok(())
    }

    fn open_else(&mut self, open: Position) -> Result<(), TemplateError> {
        let Some(top) = self.stack.last_mut() else {
            return Err(TemplateError::parse(
                "'else' without a matching 'if' or 'each'",
                open,
            ));
        };
        if matches!(top.kind, OpenKind::Block(_)) {
            return Err(TemplateError::parse("'else' is not allowed in 'block'", open));
        }
        if top.else_body.is_some() {
            return Err(TemplateError::parse(
                format!("'{}' already has an 'else'", top.kind.tag()),
                open,
            ));
        }
        top.else_body = Some(Vec::new());
        Ok(())
    }

    fn close_block(&mut self, open: Position) -> Result<(), TemplateError> {
        let block = self
            .stack
            .pop()
            .ok_or_else(|| TemplateError::parse("'end' without an open block", open))?;
        let node = block.into_node();
        if let Node::Block { name, body } = &node {
            self.blocks.insert(name.clone(), Arc::clone(body));
        }
        self.push(node);
        Ok(())
    }

    /// Skips past the `end` matching a `{% comment %}` tag. Nested block
    /// openers inside the comment are counted so their `end`s pair up.
    fn skip_comment(&mut self, open: Position) -> Result<(), TemplateError> {
        let tokens = self.tokens;
        let mut depth = 1usize;
        while let Some(token) = tokens.get(self.pos) {
            self.pos += 1;
            if token.kind != TokenKind::TagOpen {
                continue;
            }
            let keyword = tokens
                .get(self.pos)
                .filter(|t| t.kind == TokenKind::Ident)
                .map(|t| t.value.as_str());
            match keyword {
                Some("each" | "if" | "block" | "comment") => depth += 1,
                Some("end") => depth -= 1,
                _ => {}
            }
            if depth == 0 {
                self.take_region_from(self.pos - 1)?;
                return Ok(());
            }
        }
        Err(TemplateError::parse("unclosed 'comment' block", open))
    }

    fn take_region_from(&mut self, pos: usize) -> Result<(), TemplateError> {
        self.pos = pos;
        self.take_region(TokenKind::TagClose).map(|_| ())
    }

    fn finish(self) -> Result<Template, TemplateError> {
        if let Some(open) = self.stack.last() {
            return Err(TemplateError::parse(
                format!("unclosed '{}' block: expected 'end'", open.kind.tag()),
                open.position,
            ));
        }
        let nodes = match self.extends {
            Some(name) => vec![Node::Extends {
                name,
                blocks: self.blocks,
            }],
            None => self.root,
        };
        Ok(Template { nodes })
    }
}

fn block_name(cursor: &mut TokenCursor<'_>) -> Result<String, TemplateError> {
    let Some(token) = cursor.peek().filter(|t| t.kind == TokenKind::Ident) else {
        return Err(cursor.error("a block name"));
    };
    cursor.next_token();
    let path = Path::parse(&token.value, token.position)?;
    if !path.is_simple() {
        return Err(TemplateError::parse(
            format!("invalid block name '{}'", token.value),
            token.position,
        ));
    }
    Ok(token.value.clone())
}
