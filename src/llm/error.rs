use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;

use crate::core::retry::Retryable;

/// Failures talking to the completions API
#[derive(Debug, Error)]
pub enum LlmError {
    /// Connection, timeout or body read failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-2xx reply
    #[error("API returned {status}: {body}")]
    Status {
        status: StatusCode,
        body: String,
        retry_after: Option<Duration>,
    },

    /// 2xx reply without any choice or content
    #[error("empty response from model")]
    EmptyResponse,

    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),
}

impl Retryable for LlmError {
    fn is_retryable(&self) -> bool {
        match self {
            LlmError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            LlmError::Status { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
            }
            LlmError::EmptyResponse | LlmError::Decode(_) => false,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            LlmError::Status { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}
