use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::SpecError;
use crate::keyboard::{ButtonSpec, ParseMode};

pub const SQL_QUERY: &str = "action.sql_query";
pub const SQL_EXEC: &str = "action.sql_exec";
pub const REPLY_TEMPLATE: &str = "action.reply_template";
pub const RATE_LIMIT: &str = "policy.ratelimit";

/// Every action type the engine knows how to run.
pub const KNOWN_ACTIONS: &[&str] = &[SQL_QUERY, SQL_EXEC, REPLY_TEMPLATE, RATE_LIMIT];

/// Action as written in the spec.
///
/// The type is kept as a raw string so a single unknown action does not make
/// the whole bot spec unloadable; [`ActionDef::resolve`] turns it into the
/// closed [`Action`] union.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionDef {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub params: Value,
}

impl ActionDef {
    pub fn new(kind: impl Into<String>, params: Value) -> Self {
        Self {
            kind: kind.into(),
            params,
        }
    }

    pub fn resolve(&self) -> Result<Action, SpecError> {
        let params = match &self.params {
            Value::Null => Value::Object(Map::new()),
            other => other.clone(),
        };
        match self.kind.as_str() {
            SQL_QUERY => parse_params(SQL_QUERY, params).map(Action::SqlQuery),
            SQL_EXEC => parse_params(SQL_EXEC, params).map(Action::SqlExec),
            REPLY_TEMPLATE => parse_params(REPLY_TEMPLATE, params).map(Action::ReplyTemplate),
            RATE_LIMIT => parse_params(RATE_LIMIT, params).map(Action::RateLimit),
            other => Err(SpecError::UnknownActionType(other.to_string())),
        }
    }
}

fn parse_params<T: DeserializeOwned>(action: &str, params: Value) -> Result<T, SpecError> {
    serde_json::from_value(params).map_err(|err| SpecError::InvalidParams {
        action: action.to_string(),
        message: err.to_string(),
    })
}

/// Resolved action with typed parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    SqlQuery(SqlQueryParams),
    SqlExec(SqlExecParams),
    ReplyTemplate(ReplyTemplateParams),
    RateLimit(RateLimitParams),
}

impl Action {
    pub fn kind(&self) -> &'static str {
        match self {
            Action::SqlQuery(_) => SQL_QUERY,
            Action::SqlExec(_) => SQL_EXEC,
            Action::ReplyTemplate(_) => REPLY_TEMPLATE,
            Action::RateLimit(_) => RATE_LIMIT,
        }
    }
}

/// Read-only data-store query whose result lands in the execution context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqlQueryParams {
    pub sql: String,
    pub result_var: String,
    /// Keep only the first column of the first row.
    #[serde(default)]
    pub scalar: bool,
    /// Keep only the first column of every row.
    #[serde(default)]
    pub flatten: bool,
}

/// Single-statement data-store write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqlExecParams {
    pub sql: String,
    /// Optional context key receiving the affected-row count.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_var: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplyTemplateParams {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub empty_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parse_mode: Option<ParseMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyboard: Option<Vec<Vec<ButtonSpec>>>,
}

/// Identity granularity a rate limit is keyed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateLimitScope {
    #[default]
    User,
    Chat,
    Bot,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimitParams {
    #[serde(default)]
    pub scope: RateLimitScope,
    pub window_s: u64,
    pub allowance: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_suffix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
