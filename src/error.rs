//! Error types for the lesson engine.
//!
//! [`UsageError`] rejects a request before any side effect; [`ReviewError`]
//! wraps it with collaborator and invariant failures.

use thiserror::Error;

use crate::anthropic::AnthropicError;

/// Every failure the lesson engine can report.
///
/// `Usage` and `Collaborator` are recoverable at the boundary that produced
/// them; `Invariant` means the engine itself is wrong and must not be masked.
#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("Usage error: {0}")]
    Usage(#[from] UsageError),

    #[error("Collaborator error: {0}")]
    Collaborator(String),

    #[error("Invariant violated: {0}")]
    Invariant(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl From<AnthropicError> for ReviewError {
    fn from(err: AnthropicError) -> Self {
        ReviewError::Collaborator(err.to_string())
    }
}

impl ReviewError {
    /// Whether the same call may succeed later, possibly with corrected input.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ReviewError::Usage(_) | ReviewError::Collaborator(_))
    }
}

/// Requests rejected before any side effect happens.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UsageError {
    #[error("take of {requested} exceeds the limit of {limit}")]
    TakeTooLarge { requested: usize, limit: usize },

    #[error("unknown quiz type: {0}")]
    UnknownSkill(String),

    #[error("perceived difficulty must be between 1 and 4, got {0}")]
    InvalidGrade(i64),

    #[error("item {0} not found")]
    ItemNotFound(i64),

    #[error("user {0} is not approved")]
    NotApproved(String),
}
