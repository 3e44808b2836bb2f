//! Response types for the Payroll Engine API.
//!
//! This module defines the success envelope, the error response structures
//! and the mapping from [`EngineError`] to HTTP status codes.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Success body: a short human-readable message plus the operation's data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse<T> {
    /// Human-readable summary.
    pub message: String,
    /// Operation-specific fields, inlined.
    #[serde(flatten)]
    pub data: T,
}

impl<T> MessageResponse<T> {
    /// Wraps `data` with a message.
    pub fn new(message: impl Into<String>, data: T) -> Self {
        Self {
            message: message.into(),
            data,
        }
    }
}

/// Body of `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always `ok` when the service answers.
    pub status: String,
    /// Crate version.
    pub version: String,
}

/// API error response structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Optional details about the error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    /// Creates a new API error.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    /// Creates a new API error with details.
    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: Some(details.into()),
        }
    }

    /// Creates a validation error response.
    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    /// Creates a malformed JSON error response.
    pub fn malformed_json(message: impl Into<String>) -> Self {
        Self::new("MALFORMED_JSON", message)
    }

    /// Creates a malformed multipart error response.
    pub fn malformed_multipart(message: impl Into<String>) -> Self {
        Self::new("MALFORMED_MULTIPART", message)
    }
}

/// API error with HTTP status code.
#[derive(Debug)]
pub struct ApiErrorResponse {
    /// The HTTP status code.
    pub status: StatusCode,
    /// The error body.
    pub error: ApiError,
}

impl ApiErrorResponse {
    /// A 400 response.
    pub fn bad_request(error: ApiError) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error,
        }
    }

    /// A 404 response.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            error: ApiError::new("NOT_FOUND", message),
        }
    }
}

impl IntoResponse for ApiErrorResponse {
    fn into_response(self) -> Response {
        (self.status, Json(self.error)).into_response()
    }
}

impl From<EngineError> for ApiErrorResponse {
    fn from(error: EngineError) -> Self {
        let message = error.to_string();
        match error {
            EngineError::ConfigNotFound { .. } | EngineError::ConfigParseError { .. } => {
                ApiErrorResponse {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    error: ApiError::with_details("CONFIG_ERROR", "Configuration error", message),
                }
            }
            EngineError::Validation { field, message } => ApiErrorResponse {
                status: StatusCode::BAD_REQUEST,
                error: ApiError::with_details(
                    "VALIDATION_ERROR",
                    message,
                    format!("Field '{}' is invalid", field),
                ),
            },
            EngineError::MissingColumn { .. } => ApiErrorResponse {
                status: StatusCode::BAD_REQUEST,
                error: ApiError::new("MISSING_COLUMN", message),
            },
            EngineError::MissingFile { .. } => ApiErrorResponse {
                status: StatusCode::BAD_REQUEST,
                error: ApiError::new("MISSING_FILE", message),
            },
            EngineError::InvalidComponentKind { .. } => ApiErrorResponse {
                status: StatusCode::BAD_REQUEST,
                error: ApiError::new("INVALID_COMPONENT_TYPE", message),
            },
            EngineError::InvalidStatus { .. } => ApiErrorResponse {
                status: StatusCode::BAD_REQUEST,
                error: ApiError::with_details(
                    "INVALID_STATUS",
                    message,
                    "Expected one of: pending, approved, rejected",
                ),
            },
            EngineError::NothingToArchive => ApiErrorResponse {
                status: StatusCode::BAD_REQUEST,
                error: ApiError::new("NOTHING_TO_ARCHIVE", message),
            },
            EngineError::NotFound { .. } => ApiErrorResponse::not_found(message),
            EngineError::SpreadsheetRead { .. } | EngineError::UploadStorage { .. } => {
                ApiErrorResponse {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    error: ApiError::with_details(
                        "PROCESSING_ERROR",
                        "An error occurred while processing the upload",
                        message,
                    ),
                }
            }
            EngineError::AmountOverflow { .. } => ApiErrorResponse {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                error: ApiError::with_details(
                    "PROCESSING_ERROR",
                    "An error occurred while generating payroll",
                    message,
                ),
            },
            EngineError::Database { .. } => ApiErrorResponse {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                error: ApiError::with_details("DATABASE_ERROR", "Payroll database error", message),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_serialization() {
        let error = ApiError::new("TEST_ERROR", "Test message");
        let json = serde_json::to_string(&error).unwrap();
        assert!(json.contains("\"code\":\"TEST_ERROR\""));
        assert!(json.contains("\"message\":\"Test message\""));
        assert!(!json.contains("details"));
    }

    #[test]
    fn test_message_response_flattens_data() {
        #[derive(Serialize)]
        struct Counts {
            accepted: usize,
        }

        let body = MessageResponse::new("2 incentive records processed.", Counts { accepted: 2 });
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["message"], "2 incentive records processed.");
        assert_eq!(json["accepted"], 2);
    }

    #[test]
    fn test_not_found_maps_to_404() {
        let response: ApiErrorResponse = EngineError::not_found("Payroll result", 3).into();
        assert_eq!(response.status, StatusCode::NOT_FOUND);
        assert_eq!(response.error.code, "NOT_FOUND");
        assert_eq!(response.error.message, "Payroll result not found: 3");
    }

    #[test]
    fn test_validation_maps_to_400_with_field_details() {
        let response: ApiErrorResponse =
            EngineError::validation("reason", "This field may not be blank.").into();
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert_eq!(response.error.code, "VALIDATION_ERROR");
        assert_eq!(response.error.message, "This field may not be blank.");
        assert_eq!(response.error.details.as_deref(), Some("Field 'reason' is invalid"));
    }

    #[test]
    fn test_nothing_to_archive_maps_to_400() {
        let response: ApiErrorResponse = EngineError::NothingToArchive.into();
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert_eq!(response.error.code, "NOTHING_TO_ARCHIVE");
    }

    #[test]
    fn test_spreadsheet_read_maps_to_500() {
        let response: ApiErrorResponse = EngineError::SpreadsheetRead {
            file: "master.xlsx".to_string(),
            message: "bad zip".to_string(),
        }
        .into();
        assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.error.code, "PROCESSING_ERROR");
        assert!(response.error.details.unwrap().contains("master.xlsx"));
    }

    #[test]
    fn test_amount_overflow_maps_to_processing_error() {
        let response: ApiErrorResponse = EngineError::AmountOverflow {
            employee_id: "E001".to_string(),
        }
        .into();
        assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.error.code, "PROCESSING_ERROR");
        assert!(response.error.details.unwrap().contains("E001"));
    }
}
