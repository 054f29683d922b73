//! Integration tests for the engine: named templates, `include`,
//! `extends`, loader chaining and settings.

use std::collections::HashMap;
use std::sync::Arc;

use relaxtemplates_core::error::TemplateError;
use relaxtemplates_core::settings::{OnRenderError, Settings};
use relaxtemplates_core::settings_loader;
use relaxtemplates_template::{Context, Engine, StringLoader, Template, TemplateLoader};

fn engine_with(templates: &[(&str, &str)]) -> Engine {
    let engine = Engine::new();
    for (name, source) in templates {
        engine.add_template(name, source).unwrap();
    }
    engine
}

fn ctx(json: serde_json::Value) -> Context {
    Context::try_from(json).unwrap()
}

// ── include ──────────────────────────────────────────────────────────

#[test]
fn test_include_renders_with_current_scope() {
    let engine = engine_with(&[
        ("row", "<tr><td>{{ ..caption }}</td><td>{{ it.name }}</td></tr>"),
        ("table", "<table>{% each rows %}{% include 'row' %}{% end %}</table>"),
    ]);
    let rendered = engine
        .render_template(
            "table",
            &ctx(serde_json::json!({
                "caption": "c",
                "rows": [{"name": "a"}, {"name": "b"}],
            })),
        )
        .unwrap();
    assert_eq!(
        rendered,
        "<table><tr><td>c</td><td>a</td></tr><tr><td>c</td><td>b</td></tr></table>"
    );
}

#[test]
fn test_include_name_from_variable() {
    let engine = engine_with(&[("a", "A"), ("b", "B"), ("pick", "{% include which %}")]);
    assert_eq!(
        engine
            .render_template("pick", &ctx(serde_json::json!({"which": "b"})))
            .unwrap(),
        "B"
    );
}

#[test]
fn test_include_missing_template() {
    let engine = engine_with(&[("page", "x{% include 'gone' %}")]);
    let err = engine.render_template("page", &Context::new()).unwrap_err();
    assert!(matches!(err, TemplateError::TemplateDoesNotExist(_)));
}

#[test]
fn test_self_include_hits_depth_limit() {
    let engine = engine_with(&[("loop", "{% include 'loop' %}")]);
    let err = engine.render_template("loop", &Context::new()).unwrap_err();
    assert!(matches!(err, TemplateError::RenderError(ref m) if m.contains("maximum include depth")));
}

#[test]
fn test_mutual_include_hits_depth_limit() {
    let mut settings = Settings::default();
    settings.render.max_include_depth = 3;
    let engine = Engine::with_settings(settings);
    engine.add_template("ping", "ping {% include 'pong' %}").unwrap();
    engine.add_template("pong", "pong {% include 'ping' %}").unwrap();
    assert!(engine.render_template("ping", &Context::new()).is_err());
}

#[test]
fn test_include_within_depth_limit() {
    let mut settings = Settings::default();
    settings.render.max_include_depth = 2;
    let engine = Engine::with_settings(settings);
    engine.add_template("leaf", "leaf").unwrap();
    engine.add_template("mid", "[{% include 'leaf' %}]").unwrap();
    engine.add_template("top", "({% include 'mid' %})").unwrap();
    assert_eq!(
        engine.render_template("top", &Context::new()).unwrap(),
        "([leaf])"
    );
}

// ── extends ──────────────────────────────────────────────────────────

#[test]
fn test_extends_single_level() {
    let engine = engine_with(&[
        (
            "base",
            "<html>{% block title %}Default{% end %}|{% block content %}{% end %}</html>",
        ),
        (
            "page",
            "{% extends 'base' %}discarded{% block content %}{{ body }}{% end %}",
        ),
    ]);
    assert_eq!(
        engine
            .render_template("page", &ctx(serde_json::json!({"body": "Hi"})))
            .unwrap(),
        "<html>Default|Hi</html>"
    );
}

#[test]
fn test_extends_multi_level_most_derived_wins() {
    let engine = engine_with(&[
        ("base", "{% block a %}base-a{% end %} {% block b %}base-b{% end %} {% block c %}base-c{% end %}"),
        ("layout", "{% extends 'base' %}{% block a %}layout-a{% end %}{% block b %}layout-b{% end %}"),
        ("page", "{% extends 'layout' %}{% block b %}page-b{% end %}"),
    ]);
    assert_eq!(
        engine.render_template("page", &Context::new()).unwrap(),
        "layout-a page-b base-c"
    );
}

#[test]
fn test_extends_nested_blocks() {
    let engine = engine_with(&[
        ("base", "{% block outer %}<{% block inner %}base{% end %}>{% end %}"),
        ("page", "{% extends 'base' %}{% block inner %}page{% end %}"),
    ]);
    assert_eq!(
        engine.render_template("page", &Context::new()).unwrap(),
        "<page>"
    );
}

#[test]
fn test_blocks_inside_each_see_items() {
    let engine = engine_with(&[
        ("base", "{% each items %}{% block item %}{{ it }}{% end %},{% end %}"),
        ("page", "{% extends 'base' %}{% block item %}<{{ it }}>{% end %}"),
    ]);
    assert_eq!(
        engine
            .render_template("page", &ctx(serde_json::json!({"items": [1, 2]})))
            .unwrap(),
        "<1>,<2>,"
    );
}

#[test]
fn test_extends_cycle_hits_depth_limit() {
    let engine = engine_with(&[
        ("a", "{% extends 'b' %}"),
        ("b", "{% extends 'a' %}"),
    ]);
    let err = engine.render_template("a", &Context::new()).unwrap_err();
    assert!(matches!(err, TemplateError::RenderError(_)));
}

#[test]
fn test_extends_without_loader_fails() {
    let err = relaxtemplates_template::render_source("{% extends 'base' %}", &Context::new())
        .unwrap_err();
    assert!(matches!(err, TemplateError::RenderError(ref m) if m.contains("no template loader")));
}

// ── Loaders ──────────────────────────────────────────────────────────

struct Prefixed {
    inner: StringLoader,
}

impl TemplateLoader for Prefixed {
    fn load(&self, name: &str) -> Result<Arc<Template>, TemplateError> {
        match name.strip_prefix("shared/") {
            Some(rest) => self.inner.load(rest),
            None => Err(TemplateError::TemplateDoesNotExist(name.to_string())),
        }
    }
}

#[test]
fn test_custom_loader_chain() {
    let mut sources = HashMap::new();
    sources.insert("footer".to_string(), "(c) {{ year }}".to_string());
    let mut engine = Engine::new();
    engine.add_loader(Prefixed {
        inner: StringLoader::from_map(sources).unwrap(),
    });
    engine
        .add_template("page", "body {% include 'shared/footer' %}")
        .unwrap();

    assert_eq!(
        engine
            .render_template("page", &ctx(serde_json::json!({"year": 2024})))
            .unwrap(),
        "body (c) 2024"
    );
    assert!(engine.get_template("footer").is_err());
}

#[test]
fn test_add_template_reports_syntax_errors() {
    let engine = Engine::new();
    assert!(matches!(
        engine.add_template("bad", "{% each xs %}"),
        Err(TemplateError::ParseError { .. })
    ));
    assert!(matches!(
        engine.add_template("bad", "{{ 'open"),
        Err(TemplateError::LexError { .. })
    ));
}

#[test]
fn test_shared_engine_across_threads() {
    let engine = engine_with(&[("item", "{{ it }}"), ("list", "{% each xs %}{% include 'item' %}{% end %}")]);
    let context = ctx(serde_json::json!({"xs": [1, 2, 3]}));
    std::thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| {
                assert_eq!(engine.render_template("list", &context).unwrap(), "123");
            });
        }
    });
}

// ── Settings ─────────────────────────────────────────────────────────

#[test]
fn test_keep_partial_output_from_toml_settings() {
    let settings = settings_loader::from_toml_str(
        r#"
        [render]
        on_error = "keep"
        "#,
    )
    .unwrap();
    assert_eq!(settings.render.on_error, OnRenderError::Keep);
    assert_eq!(settings.render.max_include_depth, 32);

    let engine = Engine::with_settings(settings);
    engine
        .add_template("t", "{% each xs %}{{ it }}{% end %}")
        .unwrap();
    let err = engine
        .render_template("t", &ctx(serde_json::json!({"xs": [1, [2], 3]})))
        .unwrap_err();
    assert_eq!(err.partial_output(), Some("1"));
    assert!(matches!(err.into_inner(), TemplateError::RenderError(_)));
}

#[test]
fn test_discard_partial_output_by_default() {
    let engine = engine_with(&[("t", "ok {{ missing() }}")]);
    let err = engine.render_template("t", &Context::new()).unwrap_err();
    assert!(err.partial_output().is_none());
}

#[test]
fn test_depth_from_json_settings() {
    let settings =
        settings_loader::from_json_str(r#"{"render": {"max_include_depth": 1}}"#).unwrap();
    let engine = Engine::with_settings(settings);
    engine.add_template("leaf", "leaf").unwrap();
    engine.add_template("mid", "{% include 'leaf' %}").unwrap();
    engine.add_template("top", "{% include 'mid' %}").unwrap();
    assert_eq!(engine.render_template("mid", &Context::new()).unwrap(), "leaf");
    assert!(engine.render_template("top", &Context::new()).is_err());
}
