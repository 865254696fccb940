// src/task/state.rs
// Task lifecycle states, settlement results, and error classification

use serde::Serialize;
use thiserror::Error;

/// Lifecycle of one remote operation. Exactly one state holds at a time;
/// terminal states are left only by a fresh `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TaskState {
    Idle,
    Running,
    Cancelling,
    Succeeded,
    Failed,
    Cancelled,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Succeeded | TaskState::Failed | TaskState::Cancelled)
    }

    pub fn is_in_flight(self) -> bool {
        matches!(self, TaskState::Running | TaskState::Cancelling)
    }
}

/// Terminal outcome of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum TaskResult {
    Success { payload: String },
    Failure { class: ErrorClass, detail: String },
    Cancelled,
}

/// Display-oriented bucket for operation failures, derived from the raw
/// provider message by case-insensitive substring matching. Unmatched errors
/// keep their raw detail text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorClass {
    InvalidCredential,
    QuotaExceeded,
    RateLimited,
    Other,
}

impl ErrorClass {
    pub fn classify(message: &str) -> Self {
        let lower = message.to_lowercase();
        if lower.contains("incorrect api key") {
            ErrorClass::InvalidCredential
        } else if lower.contains("quota") || lower.contains("billing") {
            ErrorClass::QuotaExceeded
        } else if lower.contains("rate limit") {
            ErrorClass::RateLimited
        } else {
            ErrorClass::Other
        }
    }

    /// Locale key for the class's display message.
    pub fn locale_key(self) -> &'static str {
        match self {
            ErrorClass::InvalidCredential => "error_incorrect_api_key",
            ErrorClass::QuotaExceeded => "error_quota_exceeded",
            ErrorClass::RateLimited => "error_rate_limit",
            ErrorClass::Other => "error_other",
        }
    }
}

/// A precondition failed before any call was attempted. Carries the locale key
/// of the inline notice; task state is left untouched by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("validation failed: {message_key}")]
pub struct ValidationError {
    pub message_key: &'static str,
}

impl ValidationError {
    pub fn new(message_key: &'static str) -> Self {
        Self { message_key }
    }
}

/// Failure of the remote operation itself.
#[derive(Debug, Clone, Error)]
pub enum OperationError {
    /// The cancellation signal took effect before a result arrived.
    #[error("operation cancelled")]
    Cancelled,

    #[error("network error: {0}")]
    Network(String),

    #[error("{message}")]
    Provider { status: Option<u16>, message: String },
}

impl OperationError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, OperationError::Cancelled)
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            OperationError::Cancelled => ErrorClass::Other,
            OperationError::Network(msg) => ErrorClass::classify(msg),
            OperationError::Provider { message, .. } => ErrorClass::classify(message),
        }
    }
}
