use thiserror::Error;

/// Failures talking to the remote language model.
#[derive(Debug, Error)]
pub enum AnthropicError {
    /// HTTP 429. `retry_after_ms` comes from the `retry-after` header.
    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    /// Any other non-success status.
    #[error("API error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    /// The call succeeded but the reply was not what the prompt asked for.
    #[error("unexpected model reply: {0}")]
    InvalidReply(String),

    #[error("network error: {0}")]
    NetworkError(#[from] reqwest::Error),
}
