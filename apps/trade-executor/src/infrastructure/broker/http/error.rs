//! Errors from the HTTP broker adapter.

use thiserror::Error;

use crate::application::ports::BrokerError;

/// Errors from the HTTP broker adapter.
#[derive(Debug, Error, Clone)]
pub enum BrokerHttpError {
    /// HTTP client could not be built or the request could not be formed.
    #[error("HTTP error: {0}")]
    Http(String),

    /// Broker answered with a non-success status.
    #[error("API error: {status} - {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body.
        message: String,
    },

    /// Order was rejected (4xx on submission).
    #[error("Order rejected: {0}")]
    OrderRejected(String),

    /// Rate limited.
    #[error("Rate limited, retry after {retry_after_secs}s")]
    RateLimited {
        /// Suggested retry delay in seconds.
        retry_after_secs: u64,
    },

    /// Network error.
    #[error("Network error: {0}")]
    Network(String),

    /// Request exceeded the configured timeout.
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Body was not the expected JSON.
    #[error("JSON parsing error: {0}")]
    JsonParse(String),

    /// Max retries exceeded.
    #[error("Max retries exceeded after {attempts} attempts: {last_error}")]
    MaxRetriesExceeded {
        /// Number of attempts made before giving up.
        attempts: u32,
        /// Last error seen.
        last_error: String,
    },
}

impl BrokerHttpError {
    pub(super) fn from_reqwest(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

impl From<BrokerHttpError> for BrokerError {
    fn from(err: BrokerHttpError) -> Self {
        match err {
            BrokerHttpError::Http(message) | BrokerHttpError::Network(message) => {
                Self::ConnectionError { message }
            }
            BrokerHttpError::Timeout(operation) => Self::Timeout { operation },
            BrokerHttpError::Api { status, message } => Self::Unknown {
                message: format!("{status}: {message}"),
            },
            BrokerHttpError::OrderRejected(reason) => Self::OrderRejected { reason },
            BrokerHttpError::RateLimited { .. } => Self::RateLimited,
            BrokerHttpError::JsonParse(message) => Self::MalformedResponse { message },
            BrokerHttpError::MaxRetriesExceeded {
                attempts,
                last_error,
            } => Self::ConnectionError {
                message: format!("Max retries exceeded after {attempts} attempts: {last_error}"),
            },
        }
    }
}
