use serde::{Deserialize, Serialize};

use crate::error::SpecError;
use crate::widget::WidgetDef;

/// Regex validation applied to free-text answers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidateSpec {
    pub regex: String,
    #[serde(default)]
    pub msg: String,
}

/// Free-text prompt step.
#[derive(Debug, Clone, PartialEq)]
pub struct AskStep {
    pub ask: String,
    pub var: String,
    pub validate: Option<ValidateSpec>,
}

/// Widget-backed step; only advanced through callbacks.
#[derive(Debug, Clone, PartialEq)]
pub struct WidgetStep {
    pub widget: WidgetDef,
    pub var: String,
}

/// One unit of a wizard. Exactly one of `ask` / `widget` is present on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawStep", into = "RawStep")]
pub enum StepSpec {
    Ask(AskStep),
    Widget(WidgetStep),
}

impl StepSpec {
    pub fn var(&self) -> &str {
        match self {
            StepSpec::Ask(step) => &step.var,
            StepSpec::Widget(step) => &step.var,
        }
    }

    pub fn widget(&self) -> Option<&WidgetDef> {
        match self {
            StepSpec::Ask(_) => None,
            StepSpec::Widget(step) => Some(&step.widget),
        }
    }

    pub fn ask(text: impl Into<String>, var: impl Into<String>) -> Self {
        StepSpec::Ask(AskStep {
            ask: text.into(),
            var: var.into(),
            validate: None,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawStep {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ask: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    widget: Option<WidgetDef>,
    var: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    validate: Option<ValidateSpec>,
}

impl TryFrom<RawStep> for StepSpec {
    type Error = SpecError;

    fn try_from(raw: RawStep) -> Result<Self, Self::Error> {
        match (raw.ask, raw.widget) {
            (Some(ask), None) => Ok(StepSpec::Ask(AskStep {
                ask,
                var: raw.var,
                validate: raw.validate,
            })),
            (None, Some(widget)) => Ok(StepSpec::Widget(WidgetStep {
                widget,
                var: raw.var,
            })),
            (Some(_), Some(_)) => Err(SpecError::InvalidStep(format!(
                "step '{}' declares both ask and widget",
                raw.var
            ))),
            (None, None) => Err(SpecError::InvalidStep(format!(
                "step '{}' declares neither ask nor widget",
                raw.var
            ))),
        }
    }
}

impl From<StepSpec> for RawStep {
    fn from(step: StepSpec) -> Self {
        match step {
            StepSpec::Ask(step) => RawStep {
                ask: Some(step.ask),
                widget: None,
                var: step.var,
                validate: step.validate,
            },
            StepSpec::Widget(step) => RawStep {
                ask: None,
                widget: Some(step.widget),
                var: step.var,
                validate: None,
            },
        }
    }
}
