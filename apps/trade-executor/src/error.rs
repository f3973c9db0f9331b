//! API errors for the HTTP surface.
//!
//! | Code | HTTP status | Usage |
//! |------|-------------|-------|
//! | `INVALID_QUANTITY` | 400 | Quantity missing, unparseable or not positive |
//! | `INVALID_PRICE` | 400 | Explicit price unparseable or negative |
//! | `INVALID_REQUEST` | 400 | Malformed body or field |
//! | `NOT_FOUND` | 404 | Unknown position key |
//! | `QUEUE_CLOSED` | 503 | Shutdown in progress |
//! | `LEDGER_ERROR` | 502 | Ledger query failed |
//! | `INTERNAL_ERROR` | 500 | Unexpected server error |

use std::collections::HashMap;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::ports::LedgerError;
use crate::application::use_cases::IntakeError;

/// Error codes returned in [`HttpErrorResponse::code`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Quantity missing, unparseable or not positive.
    InvalidQuantity,
    /// Explicit price unparseable or negative.
    InvalidPrice,
    /// Malformed request.
    InvalidRequest,
    /// Resource does not exist.
    NotFound,
    /// Intake queue closed for shutdown.
    QueueClosed,
    /// Ledger unavailable or failing.
    LedgerError,
    /// Internal server error.
    InternalError,
}

impl ErrorCode {
    /// HTTP status for this error.
    #[must_use]
    pub const fn http_status(&self) -> StatusCode {
        match self {
            Self::InvalidQuantity | Self::InvalidPrice | Self::InvalidRequest => {
                StatusCode::BAD_REQUEST
            }
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::QueueClosed => StatusCode::SERVICE_UNAVAILABLE,
            Self::LedgerError => StatusCode::BAD_GATEWAY,
            Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Wire string.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::InvalidQuantity => "INVALID_QUANTITY",
            Self::InvalidPrice => "INVALID_PRICE",
            Self::InvalidRequest => "INVALID_REQUEST",
            Self::NotFound => "NOT_FOUND",
            Self::QueueClosed => "QUEUE_CLOSED",
            Self::LedgerError => "LEDGER_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.reason())
    }
}

/// An error returned by an HTTP handler.
#[derive(Debug, Error)]
pub struct ApiError {
    code: ErrorCode,
    message: String,
    context: Vec<(String, String)>,
}

impl ApiError {
    /// Create a new API error.
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            context: Vec::new(),
        }
    }

    /// Add context to the error.
    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.push((key.into(), value.into()));
        self
    }

    /// Get the error code.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        self.code
    }

    /// Get the message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Malformed request.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidRequest, message)
    }

    /// Unknown resource.
    #[must_use]
    pub fn not_found(what: &str, id: &str) -> Self {
        Self::new(ErrorCode::NotFound, format!("{what} {id} not found")).with_context(what, id)
    }

    /// Body returned to the client.
    #[must_use]
    pub fn to_http_response(&self) -> HttpErrorResponse {
        HttpErrorResponse {
            code: self.code.reason().to_string(),
            message: self.message.clone(),
            details: self.context.iter().cloned().collect(),
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code.reason(), self.message)
    }
}

impl From<IntakeError> for ApiError {
    fn from(e: IntakeError) -> Self {
        let code = match &e {
            IntakeError::InvalidQuantity(_) => ErrorCode::InvalidQuantity,
            IntakeError::InvalidPrice(_) => ErrorCode::InvalidPrice,
            IntakeError::InvalidRequest(_) => ErrorCode::InvalidRequest,
            IntakeError::QueueClosed => ErrorCode::QueueClosed,
        };
        Self::new(code, e.to_string())
    }
}

impl From<LedgerError> for ApiError {
    fn from(e: LedgerError) -> Self {
        Self::new(ErrorCode::LedgerError, e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.code.http_status(), Json(self.to_http_response())).into_response()
    }
}

/// HTTP error response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpErrorResponse {
    /// Error code string.
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Additional details.
    #[serde(default)]
    pub details: HashMap<String, String>,
}
