use thiserror::Error;

/// Errors raised while loading or resolving flow specifications.
#[derive(Debug, Error)]
pub enum SpecError {
    #[error("spec json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unknown action type '{0}'")]
    UnknownActionType(String),
    #[error("invalid params for '{action}': {message}")]
    InvalidParams { action: String, message: String },
    #[error("invalid step: {0}")]
    InvalidStep(String),
    #[error("invalid flow '{entry_cmd}': {message}")]
    InvalidFlow { entry_cmd: String, message: String },
    #[error("invalid date bound '{0}'")]
    InvalidBound(String),
}
