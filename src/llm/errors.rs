//! Error types for LLM providers

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("API request failed: {0}")]
    ApiError(String),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Timeout error: {0}")]
    TimeoutError(String),
}

impl LlmError {
    /// Map a reqwest failure, keeping timeouts distinguishable.
    pub fn from_request(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            LlmError::TimeoutError(error.to_string())
        } else {
            LlmError::HttpError(error)
        }
    }
}

pub type LlmResult<T> = Result<T, LlmError>;
