use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::action::ActionDef;
use crate::error::SpecError;
use crate::keyboard::{ButtonSpec, ParseMode};
use crate::step::StepSpec;

/// Multi-step wizard definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WizardParams {
    pub steps: Vec<StepSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub on_enter: Vec<ActionDef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub on_step: Vec<ActionDef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub on_complete: Vec<ActionDef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl_sec: Option<u64>,
}

/// Static menu: text plus a reply keyboard of command labels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuParams {
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keyboard: Vec<Vec<ButtonSpec>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parse_mode: Option<ParseMode>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FlowKind {
    Wizard(WizardParams),
    Menu(MenuParams),
}

impl FlowKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            FlowKind::Wizard(_) => "wizard",
            FlowKind::Menu(_) => "menu",
        }
    }
}

/// A flow triggered by `entry_cmd`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawFlow", into = "RawFlow")]
pub struct FlowSpec {
    pub entry_cmd: String,
    pub kind: FlowKind,
}

impl FlowSpec {
    pub fn wizard(entry_cmd: impl Into<String>, params: WizardParams) -> Self {
        Self {
            entry_cmd: entry_cmd.into(),
            kind: FlowKind::Wizard(params),
        }
    }

    pub fn as_wizard(&self) -> Option<&WizardParams> {
        match &self.kind {
            FlowKind::Wizard(params) => Some(params),
            FlowKind::Menu(_) => None,
        }
    }

    pub fn as_menu(&self) -> Option<&MenuParams> {
        match &self.kind {
            FlowKind::Menu(params) => Some(params),
            FlowKind::Wizard(_) => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawFlow {
    entry_cmd: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    params: Value,
}

impl TryFrom<RawFlow> for FlowSpec {
    type Error = SpecError;

    fn try_from(raw: RawFlow) -> Result<Self, Self::Error> {
        let invalid = |message: String| SpecError::InvalidFlow {
            entry_cmd: raw.entry_cmd.clone(),
            message,
        };
        let kind = match raw.kind.as_str() {
            "wizard" => FlowKind::Wizard(
                serde_json::from_value(raw.params.clone())
                    .map_err(|err| invalid(err.to_string()))?,
            ),
            "menu" => FlowKind::Menu(
                serde_json::from_value(raw.params.clone())
                    .map_err(|err| invalid(err.to_string()))?,
            ),
            other => return Err(invalid(format!("unknown flow type '{other}'"))),
        };
        Ok(FlowSpec {
            entry_cmd: raw.entry_cmd,
            kind,
        })
    }
}

impl From<FlowSpec> for RawFlow {
    fn from(flow: FlowSpec) -> Self {
        let kind = flow.kind.type_name().to_string();
        let params = match &flow.kind {
            FlowKind::Wizard(params) => serde_json::to_value(params),
            FlowKind::Menu(params) => serde_json::to_value(params),
        }
        .unwrap_or(Value::Null);
        RawFlow {
            entry_cmd: flow.entry_cmd,
            kind,
            params,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn wizard_flow_parses_steps_and_hooks() {
        let flow: FlowSpec = serde_json::from_value(json!({
            "entry_cmd": "/book",
            "type": "wizard",
            "params": {
                "steps": [
                    { "ask": "Name?", "var": "name", "validate": { "regex": "^\\w+$", "msg": "letters only" } },
                    { "widget": { "type": "calendar", "mode": "datetime" }, "var": "when" }
                ],
                "on_complete": [
                    { "type": "action.reply_template", "params": { "text": "Booked {{name}}" } }
                ],
                "ttl_sec": 120
            }
        }))
        .expect("flow");
        let wizard = flow.as_wizard().expect("wizard");
        assert_eq!(wizard.steps.len(), 2);
        assert_eq!(wizard.steps[1].var(), "when");
        assert!(wizard.steps[1].widget().is_some());
        assert_eq!(wizard.ttl_sec, Some(120));
    }

    #[test]
    fn step_with_both_ask_and_widget_is_rejected() {
        let err = serde_json::from_value::<FlowSpec>(json!({
            "entry_cmd": "/x",
            "type": "wizard",
            "params": {
                "steps": [
                    { "ask": "?", "widget": { "type": "calendar" }, "var": "v" }
                ]
            }
        }))
        .expect_err("invalid step");
        assert!(err.to_string().contains("both ask and widget"));
    }

    #[test]
    fn unknown_flow_type_is_rejected() {
        let err = serde_json::from_value::<FlowSpec>(json!({
            "entry_cmd": "/x",
            "type": "form"
        }))
        .expect_err("unknown type");
        assert!(err.to_string().contains("unknown flow type"));
    }
}
