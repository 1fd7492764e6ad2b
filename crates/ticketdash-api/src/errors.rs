//! API error responses.
//!
//! Every failure is returned as `{"code": ..., "message": ...}` with a stable
//! snake_case code that determines the HTTP status. Storage failures are
//! logged in full and reported to clients with a generic message unless
//! [`ErrorConfig::detailed_errors`] is set.

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use tracing::error;

use ticketdash_server::{FormsError, UpdateInputsError};

/// Message returned for any internal failure in production mode.
pub const GENERIC_INTERNAL_MESSAGE: &str = "An internal error occurred. Please try again later.";

/// Stable error codes.
///
/// ## 400 Bad Request
/// - [`VALIDATION_ERROR`] - Malformed body or a rule violated by the request
/// - [`INVALID_FORM_ID`] - Path form id is not a number
///
/// ## 401 / 403 / 404
/// - [`UNAUTHENTICATED`] - Caller headers missing or malformed
/// - [`FORBIDDEN`] - Form belongs to another guild
/// - [`FORM_NOT_FOUND`] - Form does not exist
///
/// ## 5xx Server Errors
/// - [`INTERNAL_ERROR`] - Storage or id generation failure
/// - [`SERVICE_UNAVAILABLE`] - Storage backend unreachable
pub mod error_codes {
    pub const VALIDATION_ERROR: &str = "validation_error";
    pub const INVALID_FORM_ID: &str = "invalid_form_id";
    pub const PAYLOAD_TOO_LARGE: &str = "payload_too_large";
    pub const UNAUTHENTICATED: &str = "unauthenticated";
    pub const FORBIDDEN: &str = "forbidden";
    pub const FORM_NOT_FOUND: &str = "form_not_found";
    pub const INTERNAL_ERROR: &str = "internal_error";
    pub const SERVICE_UNAVAILABLE: &str = "service_unavailable";
}

/// Configuration for error message detail level.
#[derive(Debug, Clone, Default)]
pub struct ErrorConfig {
    /// When `true`, internal error messages are returned to clients as-is.
    /// When `false` (the default), they are replaced by a generic message.
    pub detailed_errors: bool,
}

impl ErrorConfig {
    /// Hides internal error details.
    pub fn production() -> Self {
        Self {
            detailed_errors: false,
        }
    }

    /// Returns internal error details to clients.
    pub fn development() -> Self {
        Self {
            detailed_errors: true,
        }
    }

    fn internal(&self, detail: impl std::fmt::Display) -> ApiError {
        if self.detailed_errors {
            ApiError::internal_error(detail.to_string())
        } else {
            ApiError::internal_error(GENERIC_INTERNAL_MESSAGE)
        }
    }
}

/// API error response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Creates a validation error (400).
    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new(error_codes::VALIDATION_ERROR, message)
    }

    /// Creates an invalid form id error (400).
    pub fn invalid_form_id(raw: &str) -> Self {
        Self::new(
            error_codes::INVALID_FORM_ID,
            format!("Invalid form ID provided: {raw}"),
        )
    }

    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::new(error_codes::UNAUTHENTICATED, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(error_codes::FORBIDDEN, message)
    }

    pub fn form_not_found(message: impl Into<String>) -> Self {
        Self::new(error_codes::FORM_NOT_FOUND, message)
    }

    /// Creates an internal error (500).
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(error_codes::INTERNAL_ERROR, message)
    }

    pub fn status(&self) -> StatusCode {
        use error_codes::*;

        match self.code.as_str() {
            VALIDATION_ERROR | INVALID_FORM_ID => StatusCode::BAD_REQUEST,
            UNAUTHENTICATED => StatusCode::UNAUTHORIZED,
            FORBIDDEN => StatusCode::FORBIDDEN,
            FORM_NOT_FOUND => StatusCode::NOT_FOUND,
            PAYLOAD_TOO_LARGE => StatusCode::PAYLOAD_TOO_LARGE,
            SERVICE_UNAVAILABLE => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Maps a form lifecycle error.
    pub fn from_forms_error(err: FormsError, config: &ErrorConfig) -> Self {
        match err {
            FormsError::NotFound { .. } => ApiError::form_not_found(err.to_string()),
            FormsError::Forbidden { .. } => {
                ApiError::forbidden("You do not have permission to access this form")
            }
            FormsError::Invalid(e) => ApiError::validation_error(e.to_string()),
            FormsError::Storage(e) => {
                error!(error = %e, "storage error in form handler");
                config.internal(e)
            }
            FormsError::Domain(e) => {
                error!(error = %e, "domain error in form handler");
                config.internal(e)
            }
        }
    }

    /// Maps an input reconciliation error.
    pub fn from_update_inputs_error(err: UpdateInputsError, config: &ErrorConfig) -> Self {
        match err {
            UpdateInputsError::NotFound { .. } => ApiError::form_not_found(err.to_string()),
            UpdateInputsError::Forbidden { .. } => {
                ApiError::forbidden("You do not have permission to access this form")
            }
            UpdateInputsError::Rejected(e) => ApiError::validation_error(e.to_string()),
            UpdateInputsError::Storage(e) => {
                error!(error = %e, "storage error while updating inputs");
                config.internal(e)
            }
            UpdateInputsError::Planning(e) => {
                error!(error = %e, "planning failed while updating inputs");
                config.internal(e)
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.status(), Json(self)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
