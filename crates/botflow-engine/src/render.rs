use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::warn;

use crate::context::ExecContext;
use crate::i18n::Localizer;
use crate::metrics::EngineMetrics;
use crate::template::{
    TEMPLATE_ERROR_MARKER, TemplateRenderer, first_each_target, is_missing_or_empty,
    parse_localized,
};

/// Catalogue keys of engine-owned messages and their built-in fallbacks.
pub mod messages {
    pub const ERROR: (&str, &str) = ("engine.error", "Something went wrong. Please try again.");
    pub const UNKNOWN_COMMAND: (&str, &str) = ("engine.unknown_command", "Sorry, I did not understand that.");
    pub const WIZARD_DONE: (&str, &str) = ("engine.wizard_done", "Done.");
    pub const INVALID_INPUT: (&str, &str) = ("engine.invalid_input", "That does not look right. Please try again.");
    pub const RATE_LIMITED: (&str, &str) = ("engine.rate_limited", "Too many requests. Try again in {retry_in} s.");
    pub const CALENDAR_PICK_DATE: (&str, &str) = ("calendar.pick_date", "Pick a date:");
    pub const CALENDAR_PICK_TIME: (&str, &str) = ("calendar.pick_time", "Pick a time for {date}:");
    pub const PAGINATION_PICK: (&str, &str) = ("pagination.pick", "Pick an item:");
    pub const PAGINATION_EMPTY: (&str, &str) = ("pagination.empty", "Nothing to show.");
}

/// Turns spec text into reply text: `t:` references go through the
/// [`Localizer`], everything else through handlebars.
pub struct TextRenderer {
    templates: TemplateRenderer,
    localizer: Localizer,
    metrics: Arc<EngineMetrics>,
}

impl TextRenderer {
    pub fn new(localizer: Localizer, metrics: Arc<EngineMetrics>) -> Self {
        Self {
            templates: TemplateRenderer::new(),
            localizer,
            metrics,
        }
    }

    pub fn localizer(&self) -> &Localizer {
        &self.localizer
    }

    pub async fn render(&self, text: &str, ctx: &ExecContext) -> String {
        self.render_with(text, ctx, &Map::new()).await
    }

    /// Renders with `extra` layered over the context scope.
    pub async fn render_with(&self, text: &str, ctx: &ExecContext, extra: &Map<String, Value>) -> String {
        let scope = scope_with(ctx, extra);
        self.render_scope(text, ctx, &scope).await
    }

    /// Reply text honouring `empty_text`: when the first `{{#each}}` target
    /// is missing or empty, `empty_text` is rendered instead of `text`.
    pub async fn render_list(&self, text: &str, empty_text: Option<&str>, ctx: &ExecContext) -> String {
        let scope = ctx.template_value();
        if let Some(empty_text) = empty_text
            && let Some(target) = first_each_target(text)
            && is_missing_or_empty(&scope, target)
        {
            return self.render_scope(empty_text, ctx, &scope).await;
        }
        self.render_scope(text, ctx, &scope).await
    }

    /// Engine message with `{name}` placeholders, overridable by catalogue.
    pub async fn message(
        &self,
        ctx: &ExecContext,
        (key, fallback): (&str, &str),
        placeholders: &[(&str, String)],
    ) -> String {
        let placeholders: BTreeMap<String, String> = placeholders
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect();
        self.localizer
            .text_or(ctx.caller.bot_id, &ctx.locale, key, fallback, &placeholders)
            .await
    }

    async fn render_scope(&self, text: &str, ctx: &ExecContext, scope: &Value) -> String {
        let Some(localized) = parse_localized(text) else {
            return self.handlebars(text, scope);
        };
        let mut placeholders = BTreeMap::new();
        if let Value::Object(map) = scope {
            for (name, value) in map {
                match value {
                    Value::String(text) => {
                        placeholders.insert(name.clone(), text.clone());
                    }
                    Value::Number(_) | Value::Bool(_) => {
                        placeholders.insert(name.clone(), value.to_string());
                    }
                    _ => {}
                }
            }
        }
        for (name, raw) in &localized.placeholders {
            placeholders.insert(name.to_string(), self.handlebars(raw, scope));
        }
        self.localizer
            .translate_or_marker(ctx.caller.bot_id, localized.key, &ctx.locale, &placeholders)
            .await
    }

    fn handlebars(&self, text: &str, scope: &Value) -> String {
        match self.templates.render(text, scope) {
            Ok(rendered) => rendered,
            Err(err) => {
                warn!(error = %err, "template render failed");
                self.metrics.template_failure();
                TEMPLATE_ERROR_MARKER.to_string()
            }
        }
    }
}

fn scope_with(ctx: &ExecContext, extra: &Map<String, Value>) -> Value {
    let mut scope = ctx.template_value();
    if let Value::Object(map) = &mut scope {
        for (name, value) in extra {
            map.insert(name.clone(), value.clone());
        }
    }
    scope
}
