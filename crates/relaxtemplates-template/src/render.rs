//! Tree-walking renderer.
//!
//! A [`Renderer`] evaluates a parsed [`Template`] against a [`Context`],
//! keeping a stack of `each` items as the [`Scope`] chain and appending to a
//! single output buffer. Pending bodies live on a heap work stack, so template
//! nesting depth never grows the call stack; only `include` and `extends`
//! recurse, and `max_include_depth` bounds them. Both resolve template names
//! through an optional [`TemplateLoader`]; without one they fail with a render
//! error.
//!
//! When rendering fails, [`OnRenderError`] decides whether the output produced
//! so far is dropped or returned inside [`TemplateError::PartialRender`].

use std::sync::Arc;

use relaxtemplates_core::error::TemplateError;
use relaxtemplates_core::settings::{OnRenderError, RenderSettings};

use crate::context::{Context, Scope};
use crate::expr::Expr;
use crate::loaders::TemplateLoader;
use crate::parser::{Blocks, Node, Template};
use crate::value::Value;

/// Renders templates with a fixed set of render settings and loader.
///
/// # Examples
///
/// ```
/// use relaxtemplates_core::settings::RenderSettings;
/// use relaxtemplates_template::context::Context;
/// use relaxtemplates_template::parser::Template;
/// use relaxtemplates_template::render::Renderer;
///
/// let settings = RenderSettings::default();
/// let template = Template::parse("{% each [1, 2] %}{{ it }}{% end %}").unwrap();
/// let output = Renderer::new(&settings)
///     .render(&template, &Context::new())
///     .unwrap();
/// assert_eq!(output, "12");
/// ```
#[derive(Clone, Copy)]
pub struct Renderer<'e> {
    settings: &'e RenderSettings,
    loader: Option<&'e dyn TemplateLoader>,
}

/// Per-walk state: how many templates deep we are and which block
/// overrides apply, most-derived first.
#[derive(Clone, Copy)]
struct Walk<'w> {
    depth: usize,
    overrides: &'w [&'w Blocks],
}

impl<'w> Walk<'w> {
    fn block(&self, name: &str, own: &'w [Node]) -> &'w [Node] {
        self.overrides
            .iter()
            .find_map(|blocks| blocks.get(name))
            .map_or(own, |body| body.as_slice())
    }
}

/// The root context and the items bound by the enclosing `each` loops.
struct Chain<'c> {
    context: &'c Context,
    items: Vec<Value>,
}

impl Chain<'_> {
    fn scope(&self) -> Scope<'_> {
        Scope::new(self.context, &self.items)
    }
}

/// Pending work within one template.
enum Work<'n> {
    /// The remaining nodes of a body.
    Nodes(std::slice::Iter<'n, Node>),
    /// The remaining iterations of an `each`; the current item is on top of
    /// the item stack.
    Each {
        body: &'n [Node],
        rest: std::vec::IntoIter<Value>,
    },
}

impl<'e> Renderer<'e> {
    /// Creates a renderer with no loader; `include` and `extends` will fail.
    pub const fn new(settings: &'e RenderSettings) -> Self {
        Self {
            settings,
            loader: None,
        }
    }

    /// Uses `loader` to resolve `include` and `extends`.
    #[must_use]
    pub const fn with_loader(mut self, loader: &'e dyn TemplateLoader) -> Self {
        self.loader = Some(loader);
        self
    }

    /// Renders `template` against `context`.
    ///
    /// # Errors
    ///
    /// Returns the first error raised while rendering, wrapped in
    /// `PartialRender` when the settings keep partial output.
    pub fn render(&self, template: &Template, context: &Context) -> Result<String, TemplateError> {
        let mut chain = Chain {
            context,
            items: Vec::new(),
        };
        let mut out = String::new();
        let walk = Walk {
            depth: 0,
            overrides: &[],
        };
        match self.render_nodes(template.nodes(), &mut chain, &mut out, walk) {
            Ok(()) => Ok(out),
            Err(error) => Err(match self.settings.on_error {
                OnRenderError::Discard => error,
                OnRenderError::Keep => TemplateError::PartialRender {
                    error: Box::new(error),
                    output: out,
                },
            }),
        }
    }

    fn render_nodes<'n>(
        &self,
        nodes: &'n [Node],
        chain: &mut Chain<'_>,
        out: &mut String,
        walk: Walk<'n>,
    ) -> Result<(), TemplateError> {
        let mut work = vec![Work::Nodes(nodes.iter())];
        while let Some(top) = work.last_mut() {
            let node = match top {
                Work::Nodes(iter) => match iter.next() {
                    Some(node) => node,
                    None => {
                        work.pop();
                        continue;
                    }
                },
                Work::Each { body, rest } => {
                    chain.items.pop();
                    match rest.next() {
                        Some(item) => {
                            let body = *body;
                            chain.items.push(item);
                            work.push(Work::Nodes(body.iter()));
                        }
                        None => {
                            work.pop();
                        }
                    }
                    continue;
                }
            };

            match node {
                Node::Text(text) => out.push_str(text),
                Node::Comment => {}
                Node::Output(expr) => {
                    out.push_str(&expr.eval(&chain.scope())?.to_output_string()?);
                }
                Node::Call(call) => {
                    out.push_str(&call.eval(&chain.scope())?.to_output_string()?);
                }
                Node::If {
                    condition,
                    then_body,
                    else_body,
                } => {
                    if condition.eval(&chain.scope())?.is_truthy() {
                        work.push(Work::Nodes(then_body.iter()));
                    } else if let Some(else_body) = else_body {
                        work.push(Work::Nodes(else_body.iter()));
                    }
                }
                Node::Each {
                    iterable,
                    body,
                    else_body,
                } => {
                    let mut rest = iterate(iterable.eval(&chain.scope())?)?.into_iter();
                    if let Some(first) = rest.next() {
                        chain.items.push(first);
                        work.push(Work::Each {
                            body: body.as_slice(),
                            rest,
                        });
                        work.push(Work::Nodes(body.iter()));
                    } else if let Some(else_body) = else_body {
                        work.push(Work::Nodes(else_body.iter()));
                    }
                }
                Node::Block { name, body } => {
                    work.push(Work::Nodes(walk.block(name, body).iter()));
                }
                Node::Include { name } => {
                    let template = self.load(name, &chain.scope(), walk, "include")?;
                    let inner = Walk {
                        depth: walk.depth + 1,
                        overrides: &[],
                    };
                    self.render_nodes(template.nodes(), chain, out, inner)?;
                }
                Node::Extends { name, blocks } => {
                    let parent = self.load(name, &chain.scope(), walk, "extends")?;
                    let mut overrides = walk.overrides.to_vec();
                    overrides.push(blocks);
                    let inner = Walk {
                        depth: walk.depth + 1,
                        overrides: &overrides,
                    };
                    self.render_nodes(parent.nodes(), chain, out, inner)?;
                }
            }
        }
        Ok(())
    }

    /// Evaluates a template name and fetches it from the loader.
    fn load(
        &self,
        name: &Expr,
        scope: &Scope<'_>,
        walk: Walk<'_>,
        tag: &str,
    ) -> Result<Arc<Template>, TemplateError> {
        let name = match name.eval(scope)? {
            Value::String(name) => name,
            other => {
                return Err(TemplateError::render(format!(
                    "'{tag}' expects a template name string, got {}",
                    other.type_name()
                )))
            }
        };
        let loader = self.loader.ok_or_else(|| {
            TemplateError::render(format!(
                "cannot {tag} '{name}': no template loader is configured"
            ))
        })?;
        if walk.depth >= self.settings.max_include_depth {
            return Err(TemplateError::render(format!(
                "cannot {tag} '{name}': maximum include depth of {} exceeded",
                self.settings.max_include_depth
            )));
        }
        loader.load(&name)
    }
}

/// Turns the value of an `each` expression into the items to iterate.
fn iterate(value: Value) -> Result<Vec<Value>, TemplateError> {
    match value {
        Value::List(items) => Ok(items),
        Value::String(s) => Ok(s.chars().map(Value::from).collect()),
        other if !other.is_truthy() => Ok(Vec::new()),
        other => Err(TemplateError::render(format!(
            "cannot iterate over a {} value",
            other.type_name()
        ))),
    }
}
