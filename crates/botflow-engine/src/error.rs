use std::time::Duration;

use botflow_spec::SpecError;
use thiserror::Error;

/// Failures of the external key-value, session, spec and localization stores.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store backend error: {0}")]
    Backend(String),
    #[error("store call timed out after {0:?}")]
    Timeout(Duration),
    #[error("stored record is corrupt: {0}")]
    Corrupt(String),
}

/// Structured errors surfaced by data-store drivers.
#[derive(Debug, Error)]
pub enum DataStoreError {
    #[error("query failed: {message}")]
    Query {
        message: String,
        code: Option<String>,
    },
    #[error("data store unavailable: {0}")]
    Connection(String),
}

/// Fatal failures of a single action; they abort the remaining actions of the hook.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("security violation: {0}")]
    SecurityViolation(String),
    #[error(transparent)]
    Query(#[from] DataStoreError),
    #[error("data store call timed out after {0:?}")]
    Timeout(Duration),
    #[error(transparent)]
    Spec(#[from] SpecError),
}

impl ActionError {
    pub fn code(&self) -> &'static str {
        match self {
            ActionError::SecurityViolation(_) => "security_violation",
            ActionError::Query(_) => "query_error",
            ActionError::Timeout(_) => "timeout",
            ActionError::Spec(SpecError::UnknownActionType(_)) => "unknown_action_type",
            ActionError::Spec(_) => "invalid_action",
        }
    }
}

/// Errors that escape a turn before they are mapped to the generic reply.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("spec unavailable for bot {bot_id}: {source}")]
    SpecUnavailable {
        bot_id: i64,
        #[source]
        source: StoreError,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Action(#[from] ActionError),
}

/// Errors raised while loading [`crate::EngineConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse engine config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid engine config: {0}")]
    Invalid(String),
}
