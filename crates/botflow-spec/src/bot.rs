use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::action::{ActionDef, REPLY_TEMPLATE};
use crate::error::SpecError;
use crate::flow::{FlowKind, FlowSpec, WizardParams};
use crate::i18n::LocaleConfig;
use crate::keyboard::ParseMode;
use crate::step::StepSpec;

/// Static intent: fixed triggers answered with a templated reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentSpec {
    pub triggers: Vec<String>,
    pub reply: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parse_mode: Option<ParseMode>,
}

impl IntentSpec {
    pub fn matches(&self, text: &str) -> bool {
        let text = text.trim();
        self.triggers
            .iter()
            .any(|trigger| trigger.trim().eq_ignore_ascii_case(text))
    }
}

/// Wizard in the pre-`flows` format: steps plus completion actions and an
/// optional closing text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyWizardSpec {
    pub entry_cmd: String,
    pub steps: Vec<StepSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub on_complete: Vec<ActionDef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl_sec: Option<u64>,
}

impl LegacyWizardSpec {
    /// Equivalent v1 wizard flow; `final_text` becomes a trailing reply action.
    pub fn to_flow(&self) -> FlowSpec {
        let mut on_complete = self.on_complete.clone();
        if let Some(text) = &self.final_text {
            on_complete.push(ActionDef::new(REPLY_TEMPLATE, json!({ "text": text })));
        }
        FlowSpec::wizard(
            self.entry_cmd.clone(),
            WizardParams {
                steps: self.steps.clone(),
                on_enter: Vec::new(),
                on_step: Vec::new(),
                on_complete,
                ttl_sec: self.ttl_sec,
            },
        )
    }
}

/// Everything a bot declares: flows, legacy wizards, intents and locale settings.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BotSpec {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flows: Vec<FlowSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub wizards: Vec<LegacyWizardSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub intents: Vec<IntentSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub i18n: Option<LocaleConfig>,
}

impl BotSpec {
    pub fn from_json_str(raw: &str) -> Result<Self, SpecError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn menu(&self, entry_cmd: &str) -> Option<&FlowSpec> {
        self.flows
            .iter()
            .find(|flow| flow.entry_cmd == entry_cmd && matches!(flow.kind, FlowKind::Menu(_)))
    }

    pub fn wizard(&self, entry_cmd: &str) -> Option<&FlowSpec> {
        self.flows
            .iter()
            .find(|flow| flow.entry_cmd == entry_cmd && matches!(flow.kind, FlowKind::Wizard(_)))
    }

    pub fn legacy_wizard(&self, entry_cmd: &str) -> Option<&LegacyWizardSpec> {
        self.wizards
            .iter()
            .find(|wizard| wizard.entry_cmd == entry_cmd)
    }

    pub fn match_intent(&self, text: &str) -> Option<&IntentSpec> {
        self.intents.iter().find(|intent| intent.matches(text))
    }

    pub fn locale_config(&self) -> LocaleConfig {
        self.i18n.clone().unwrap_or_default()
    }
}
