//! Error types for the sync layer.
//!
//! # Design
//! `SyncError` keeps the categories the UI has to tell apart: input that was
//! rejected before any request, a transport timeout, any other transport
//! failure, and a non-success response from the service. Each operation turns
//! an error into one user-visible sentence through `user_message`, so nothing
//! past the sync boundary needs to inspect variants.

use thiserror::Error;

use crate::transport::TransportError;

/// Input rejected locally; no request was sent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Todo text cannot be empty")]
    EmptyText,

    #[error("Invalid todo ID")]
    MissingId,

    /// The id is well formed but not in the store, so there is nothing to toggle.
    #[error("Invalid todo item")]
    UnknownItem(String),
}

/// Errors returned by `TodoClient` parse methods and `TodoSync` operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Every attempt allowed by the retry policy timed out.
    #[error("request timed out")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(String),

    /// The service answered with a status the operation does not accept.
    #[error("HTTP {status}: {}", .message.as_deref().unwrap_or("no message"))]
    Server { status: u16, message: Option<String> },

    #[error("deserialization failed: {0}")]
    Deserialization(String),

    #[error("serialization failed: {0}")]
    Serialization(String),
}

impl From<TransportError> for SyncError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Timeout => SyncError::Timeout,
            TransportError::Connection(msg) => SyncError::Transport(msg),
        }
    }
}

/// The user-facing operations, used to pick an error message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Fetch,
    Create,
    Update,
    Toggle,
    Delete,
}

impl Operation {
    fn failure_text(self) -> &'static str {
        match self {
            Operation::Fetch => "Failed to fetch todos",
            Operation::Create => "Failed to add todo",
            Operation::Update => "Failed to update todo",
            Operation::Toggle => "Failed to toggle todo",
            Operation::Delete => "Failed to delete todo",
        }
    }
}

const TRY_LATER: &str = ". Please try again later.";
const SERVER_SLOW: &str = "Server is taking too long to respond. Please try again later.";

impl SyncError {
    /// The sentence shown to the user when `op` fails with this error.
    ///
    /// Fetch and create always use their generic text (apart from the
    /// fetch timeout). Mutations of an existing item surface the server's own
    /// message when it sent one.
    pub fn user_message(&self, op: Operation) -> String {
        match (op, self) {
            (_, SyncError::Validation(e)) => e.to_string(),
            (Operation::Fetch, SyncError::Timeout) => SERVER_SLOW.to_string(),
            (Operation::Fetch | Operation::Create, _) => format!("{}{TRY_LATER}", op.failure_text()),
            (_, SyncError::Server { message: Some(m), .. }) => m.clone(),
            (_, SyncError::Server { message: None, .. }) => op.failure_text().to_string(),
            _ => format!("{}{TRY_LATER}", op.failure_text()),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, SyncError::Timeout)
    }
}

/// Errors raised while reading `ClientConfig` from the environment.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{var} must be a non-negative integer, got {value:?}")]
    InvalidNumber { var: &'static str, value: String },

    #[error("{var} must be at least 1")]
    Zero { var: &'static str },

    #[error("unknown toggle mode {0:?}, expected \"endpoint\" or \"update\"")]
    InvalidToggleMode(String),
}
