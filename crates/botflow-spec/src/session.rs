use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::flow::FlowSpec;
use crate::step::StepSpec;

/// Current persisted layout of [`WizardSession`].
pub const FORMAT_VERSION: u32 = 1;

/// Persisted progress of one running wizard, keyed by `(bot_id, user_id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WizardSession {
    pub format_version: u32,
    /// Flow captured at start; later spec edits do not affect a running session.
    pub flow_snapshot: FlowSpec,
    pub step_index: usize,
    #[serde(default)]
    pub vars: IndexMap<String, String>,
    /// Results produced by actions (query rows, counters) for later turns.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub context: Map<String, Value>,
    pub ttl_sec: u64,
}

impl WizardSession {
    pub fn new(flow: FlowSpec, ttl_sec: u64) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            flow_snapshot: flow,
            step_index: 0,
            vars: IndexMap::new(),
            context: Map::new(),
            ttl_sec,
        }
    }

    pub fn entry_cmd(&self) -> &str {
        &self.flow_snapshot.entry_cmd
    }

    pub fn steps(&self) -> &[StepSpec] {
        self.flow_snapshot
            .as_wizard()
            .map(|wizard| wizard.steps.as_slice())
            .unwrap_or_default()
    }

    pub fn current_step(&self) -> Option<&StepSpec> {
        self.steps().get(self.step_index)
    }

    /// False for records written by an incompatible engine version or with an
    /// out-of-range cursor.
    pub fn is_usable(&self) -> bool {
        self.format_version == FORMAT_VERSION && self.step_index < self.steps().len()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}
