use std::collections::BTreeSet;

use regex::Regex;
use serde::Serialize;

use crate::action::ActionDef;
use crate::bot::BotSpec;
use crate::error::SpecError;
use crate::flow::{FlowKind, WizardParams};
use crate::step::StepSpec;
use crate::widget::{DateBound, PageSource, WidgetDef};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueSeverity {
    Error,
    Warning,
}

/// Single problem found while validating a bot spec.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpecIssue {
    pub severity: IssueSeverity,
    pub location: String,
    pub code: String,
    pub message: String,
}

/// Result of [`validate_bot_spec`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SpecReport {
    pub issues: Vec<SpecIssue>,
}

impl SpecReport {
    pub fn is_valid(&self) -> bool {
        self.errors().next().is_none()
    }

    pub fn errors(&self) -> impl Iterator<Item = &SpecIssue> {
        self.issues
            .iter()
            .filter(|issue| issue.severity == IssueSeverity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &SpecIssue> {
        self.issues
            .iter()
            .filter(|issue| issue.severity == IssueSeverity::Warning)
    }

    fn error(&mut self, location: &str, code: &str, message: impl Into<String>) {
        self.push(IssueSeverity::Error, location, code, message);
    }

    fn warning(&mut self, location: &str, code: &str, message: impl Into<String>) {
        self.push(IssueSeverity::Warning, location, code, message);
    }

    fn push(&mut self, severity: IssueSeverity, location: &str, code: &str, message: impl Into<String>) {
        self.issues.push(SpecIssue {
            severity,
            location: location.to_string(),
            code: code.to_string(),
            message: message.into(),
        });
    }
}

/// Values embedded in callback tokens may not contain the `:` delimiter.
pub fn is_token_safe(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '_' | '.' | '-'))
}

/// Load-time checks so spec mistakes surface before a user hits them.
pub fn validate_bot_spec(spec: &BotSpec) -> SpecReport {
    let mut report = SpecReport::default();

    let mut menus = BTreeSet::new();
    let mut wizards = BTreeSet::new();
    for (idx, flow) in spec.flows.iter().enumerate() {
        let location = format!("flows[{idx}]({})", flow.entry_cmd);
        if flow.entry_cmd.trim().is_empty() {
            report.error(&location, "empty_entry_cmd", "entry_cmd must not be empty");
        }
        let seen = match flow.kind {
            FlowKind::Menu(_) => &mut menus,
            FlowKind::Wizard(_) => &mut wizards,
        };
        if !seen.insert(flow.entry_cmd.clone()) {
            report.error(
                &location,
                "duplicate_entry_cmd",
                format!("{} '{}' declared twice", flow.kind.type_name(), flow.entry_cmd),
            );
        }
        if let FlowKind::Wizard(params) = &flow.kind {
            validate_wizard(&mut report, &location, params);
        }
    }

    let mut legacy = BTreeSet::new();
    for (idx, wizard) in spec.wizards.iter().enumerate() {
        let location = format!("wizards[{idx}]({})", wizard.entry_cmd);
        if !legacy.insert(wizard.entry_cmd.clone()) {
            report.error(
                &location,
                "duplicate_entry_cmd",
                format!("legacy wizard '{}' declared twice", wizard.entry_cmd),
            );
        }
        if wizards.contains(&wizard.entry_cmd) {
            report.warning(
                &location,
                "shadowed_legacy_wizard",
                "a v1 wizard with the same entry_cmd takes precedence",
            );
        }
        let flow = wizard.to_flow();
        if let Some(params) = flow.as_wizard() {
            validate_wizard(&mut report, &location, params);
        }
    }

    for (idx, intent) in spec.intents.iter().enumerate() {
        if intent.triggers.iter().all(|trigger| trigger.trim().is_empty()) {
            report.error(
                &format!("intents[{idx}]"),
                "empty_triggers",
                "intent has no usable triggers",
            );
        }
    }

    if let Some(i18n) = &spec.i18n
        && !i18n.supported.is_empty()
        && !i18n.supported.contains(&i18n.default_locale)
    {
        report.warning(
            "i18n",
            "default_locale_unsupported",
            format!(
                "default_locale '{}' is not listed in supported",
                i18n.default_locale
            ),
        );
    }

    report
}

fn validate_wizard(report: &mut SpecReport, location: &str, params: &WizardParams) {
    if params.steps.is_empty() {
        report.error(location, "no_steps", "wizard declares no steps");
    }
    if params.ttl_sec == Some(0) {
        report.error(location, "zero_ttl", "ttl_sec must be positive");
    }

    for (idx, step) in params.steps.iter().enumerate() {
        let step_location = format!("{location}.steps[{idx}]");
        validate_step(report, &step_location, step);
    }

    for (hook, actions) in [
        ("on_enter", &params.on_enter),
        ("on_step", &params.on_step),
        ("on_complete", &params.on_complete),
    ] {
        for (idx, action) in actions.iter().enumerate() {
            validate_action(report, &format!("{location}.{hook}[{idx}]"), action);
        }
    }
}

fn validate_step(report: &mut SpecReport, location: &str, step: &StepSpec) {
    if !is_token_safe(step.var()) {
        report.error(
            location,
            "invalid_var",
            format!(
                "var '{}' must match [A-Za-z0-9_.-]+ to be usable in callbacks",
                step.var()
            ),
        );
    }
    match step {
        StepSpec::Ask(ask) => {
            if let Some(validate) = &ask.validate
                && let Err(err) = Regex::new(&validate.regex)
            {
                report.warning(
                    location,
                    "invalid_regex",
                    format!("regex does not compile and will accept any input: {err}"),
                );
            }
        }
        StepSpec::Widget(widget) => match &widget.widget {
            WidgetDef::Calendar(calendar) => {
                if let (Some(DateBound::Fixed(min)), Some(DateBound::Fixed(max))) =
                    (calendar.min, calendar.max)
                    && min > max
                {
                    report.error(location, "empty_range", "calendar min is after max");
                }
                if calendar.start_hour >= calendar.end_hour || calendar.end_hour > 24 {
                    report.error(
                        location,
                        "invalid_hours",
                        "calendar hours must satisfy start_hour < end_hour <= 24",
                    );
                }
                if calendar.step_min == 0 {
                    report.error(location, "invalid_step", "calendar step_min must be positive");
                }
            }
            WidgetDef::Pagination(pagination) => {
                if pagination.page_size == 0 {
                    report.error(location, "invalid_page_size", "page_size must be positive");
                }
                if let PageSource::Ctx { key } = &pagination.source
                    && key.trim().is_empty()
                {
                    report.error(location, "empty_ctx_key", "ctx source requires a key");
                }
            }
        },
    }
}

fn validate_action(report: &mut SpecReport, location: &str, action: &ActionDef) {
    match action.resolve() {
        Ok(_) => {}
        Err(SpecError::UnknownActionType(kind)) => report.error(
            location,
            "unknown_action_type",
            format!("unknown action type '{kind}'"),
        ),
        Err(err) => report.error(location, "invalid_action_params", err.to_string()),
    }
}
