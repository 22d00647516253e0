use thiserror::Error;

use crate::utils::json_path::PathError;

/// Errors raised while executing an action. They are caught at the
/// dispatch boundary and never unmount the screen.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("screen '{0}' is not declared in the manifest")]
    ScreenNotFound(String),

    #[error("screen instance {instance} is unmounted")]
    Unmounted { instance: String },

    #[error("invalid lifecycle transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("unknown named action '{0}'")]
    UnknownNamedAction(String),

    #[error("invalid action: {message}")]
    InvalidAction { message: String },

    #[error("no API client configured")]
    NoApiClient,

    #[error("API request failed{}: {message}", .status.map(|s| format!(" ({})", s)).unwrap_or_default())]
    Api { status: Option<u16>, message: String },

    #[error("invalid file payload for '{field}': {reason}")]
    InvalidFile { field: String, reason: String },

    #[error("state write failed: {0}")]
    State(#[from] PathError),
}

impl RuntimeError {
    pub fn invalid_action(message: impl Into<String>) -> Self {
        RuntimeError::InvalidAction {
            message: message.into(),
        }
    }

    /// HTTP status for API failures, if the server answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            RuntimeError::Api { status, .. } => *status,
            _ => None,
        }
    }
}
