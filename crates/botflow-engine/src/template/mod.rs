//! Handlebars rendering over the flat execution scope.
//!
//! The grammar is what handlebars gives a non-strict, non-escaping registry:
//! `{{var}}` and `{{#each list}}...{{/each}}`. `{{.}}` is accepted as an alias
//! of `{{this}}`.

mod localized;

use std::borrow::Cow;

use handlebars::Handlebars;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use thiserror::Error;

pub use localized::{LocalizedText, parse_localized};

/// Emitted in place of text whose template failed to render.
pub const TEMPLATE_ERROR_MARKER: &str = "[template error]";

static SELF_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\s*\.\s*\}\}").expect("valid self-reference pattern"));
static EACH_TARGET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{#each\s+([^\s}]+)").expect("valid each pattern"));

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("template render error: {0}")]
    Render(String),
}

pub struct TemplateRenderer {
    handlebars: Handlebars<'static>,
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateRenderer {
    pub fn new() -> Self {
        let mut handlebars = Handlebars::new();
        handlebars.register_escape_fn(handlebars::no_escape);
        handlebars.set_strict_mode(false);
        Self { handlebars }
    }

    /// Renders `template` against `scope`. Missing variables render empty.
    pub fn render(&self, template: &str, scope: &Value) -> Result<String, TemplateError> {
        if !template.contains("{{") {
            return Ok(template.to_string());
        }
        let normalized: Cow<'_, str> = SELF_REF.replace_all(template, "{{this}}");
        self.handlebars
            .render_template(&normalized, scope)
            .map_err(|err| TemplateError::Render(err.to_string()))
    }
}

/// Path iterated by the first `{{#each ...}}` block, if any.
pub fn first_each_target(template: &str) -> Option<&str> {
    EACH_TARGET
        .captures(template)
        .and_then(|caps| caps.get(1))
        .map(|found| found.as_str())
}

/// True when `path` is absent from `scope` or resolves to null or an empty
/// list, object or string.
pub fn is_missing_or_empty(scope: &Value, path: &str) -> bool {
    let path = path.strip_prefix("this.").unwrap_or(path);
    let mut current = scope;
    for segment in path.split('.') {
        let next = match current {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        };
        match next {
            Some(value) => current = value,
            None => return true,
        }
    }
    match current {
        Value::Null => true,
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::String(text) => text.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn renders_plain_variables_without_escaping() {
        let renderer = TemplateRenderer::new();
        let out = renderer
            .render("Hi {{name}} <b>{{missing}}</b>", &json!({"name": "Bob & co"}))
            .unwrap();
        assert_eq!(out, "Hi Bob & co <b></b>");
    }

    #[test]
    fn each_rebinds_to_element() {
        let renderer = TemplateRenderer::new();
        let scope = json!({
            "items": [{"title": "a"}, {"title": "b"}],
            "tags": ["x", "y"],
        });
        let out = renderer
            .render("{{#each items}}- {{title}}\n{{/each}}", &scope)
            .unwrap();
        assert_eq!(out, "- a\n- b\n");
        let out = renderer.render("{{#each tags}}[{{.}}]{{/each}}", &scope).unwrap();
        assert_eq!(out, "[x][y]");
    }

    #[test]
    fn broken_template_is_an_error() {
        let renderer = TemplateRenderer::new();
        assert!(renderer.render("{{#each items}}", &json!({})).is_err());
    }

    #[test]
    fn detects_empty_each_target() {
        assert_eq!(first_each_target("x {{#each rows}}{{a}}{{/each}}"), Some("rows"));
        assert!(is_missing_or_empty(&json!({}), "rows"));
        assert!(is_missing_or_empty(&json!({"rows": []}), "rows"));
        assert!(is_missing_or_empty(&json!({"rows": null}), "rows"));
        assert!(!is_missing_or_empty(&json!({"rows": [1]}), "rows"));
        assert!(!is_missing_or_empty(&json!({"a": {"rows": [1]}}), "a.rows"));
    }
}
