use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use database_layer::DatabaseError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{error, warn};
use utoipa::ToSchema;
use uuid::Uuid;

/// Standard API error response structure
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiErrorResponse {
    /// Unique error ID for tracking
    pub error_id: String,
    /// Error type/code
    pub error_type: String,
    /// Human-readable error message
    pub message: String,
    /// Underlying cause, for store failures
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// Field-specific validation errors
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_errors: Option<HashMap<String, Vec<String>>>,
    /// Timestamp when error occurred
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Suggested actions for resolving the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestions: Option<Vec<String>>,
}

/// Standard API success response wrapper
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ResponseMetadata>,
}

/// Response metadata for pagination, etc.
#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct ResponseMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<PaginationInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_count: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PaginationInfo {
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u32,
    pub has_next: bool,
    pub has_previous: bool,
}

/// Main API error enum
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        field_errors: Option<HashMap<String, Vec<String>>>,
    },

    #[error("Authentication error: {message}")]
    Authentication { message: String },

    #[error("Authorization error: {message}")]
    Authorization { message: String },

    #[error("{message}")]
    NotFound { message: String },

    #[error("{message}")]
    InventoryConflict { message: String },

    #[error("Resource conflict: {message}")]
    Conflict { message: String },

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Internal server error: {message}")]
    Internal { message: String },

    #[error("Service unavailable: {message}")]
    ServiceUnavailable { message: String },

    #[error("Bad request: {message}")]
    BadRequest { message: String },
}

impl ApiError {
    /// Create a validation error with field-specific errors
    pub fn validation_with_fields(
        message: impl Into<String>,
        field_errors: HashMap<String, Vec<String>>,
    ) -> Self {
        Self::Validation {
            message: message.into(),
            field_errors: Some(field_errors),
        }
    }

    /// Create a simple validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field_errors: None,
        }
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
        }
    }

    pub fn authorization(message: impl Into<String>) -> Self {
        Self::Authorization {
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn inventory_conflict(message: impl Into<String>) -> Self {
        Self::InventoryConflict {
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation { .. } => StatusCode::BAD_REQUEST,
            ApiError::Authentication { .. } => StatusCode::UNAUTHORIZED,
            ApiError::Authorization { .. } => StatusCode::FORBIDDEN,
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::InventoryConflict { .. } => StatusCode::BAD_REQUEST,
            ApiError::Conflict { .. } => StatusCode::CONFLICT,
            ApiError::Database(db_err) if db_err.is_unavailable() => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ApiError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
        }
    }

    /// Get the error type string
    pub fn error_type(&self) -> &'static str {
        match self {
            ApiError::Validation { .. } => "validation_error",
            ApiError::Authentication { .. } => "authentication_error",
            ApiError::Authorization { .. } => "authorization_error",
            ApiError::NotFound { .. } => "not_found",
            ApiError::InventoryConflict { .. } => "inventory_conflict",
            ApiError::Conflict { .. } => "conflict",
            ApiError::Database(_) => "database_error",
            ApiError::Internal { .. } => "internal_error",
            ApiError::ServiceUnavailable { .. } => "service_unavailable",
            ApiError::BadRequest { .. } => "bad_request",
        }
    }

    /// Get suggested actions for resolving the error
    pub fn suggestions(&self) -> Option<Vec<String>> {
        match self {
            ApiError::Validation { .. } | ApiError::BadRequest { .. } => Some(vec![
                "Check the request payload for invalid fields".to_string(),
                "Ensure all required fields are provided".to_string(),
            ]),
            ApiError::Authentication { .. } => Some(vec![
                "Send a bearer token in the Authorization header".to_string(),
                "Check if your token has expired".to_string(),
            ]),
            ApiError::Authorization { .. } => Some(vec![
                "Verify your account role allows this operation".to_string(),
            ]),
            ApiError::InventoryConflict { .. } => Some(vec![
                "Restock the drug via /api/v1/pharmacy/inventory/add and retry".to_string(),
            ]),
            ApiError::Database(db_err) if db_err.is_unavailable() => Some(vec![
                "Try again in a few moments".to_string(),
                "Contact support if the issue persists".to_string(),
            ]),
            _ => None,
        }
    }

    /// User-facing wording for store failures
    pub fn format_database_error(db_error: &DatabaseError) -> String {
        match db_error {
            DatabaseError::ConnectionFailed(_) => "Unable to connect to the database.".to_string(),
            DatabaseError::QueryFailed(msg) => {
                if msg.contains("duplicate key") || msg.contains("unique") {
                    "A record with these details already exists.".to_string()
                } else if msg.contains("foreign key") {
                    "Referenced record does not exist.".to_string()
                } else if msg.contains("check constraint") || msg.contains(">= 0") {
                    "The provided data does not meet validation requirements.".to_string()
                } else {
                    "Database operation failed.".to_string()
                }
            }
            DatabaseError::SqlxError(sqlx::Error::RowNotFound) => {
                "Requested record not found.".to_string()
            }
            DatabaseError::SqlxError(_) if db_error.is_unavailable() => {
                "The database is temporarily unavailable.".to_string()
            }
            _ => "An unexpected database error occurred.".to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let error_id = Uuid::new_v4().to_string();
        let status_code = self.status_code();

        if status_code.is_server_error() {
            error!(
                error_id = %error_id,
                error_type = %self.error_type(),
                status_code = %status_code.as_u16(),
                error = %self,
                "API error occurred"
            );
        } else {
            warn!(
                error_id = %error_id,
                error_type = %self.error_type(),
                status_code = %status_code.as_u16(),
                error = %self,
                "Request rejected"
            );
        }

        let field_errors = match &self {
            ApiError::Validation { field_errors, .. } => field_errors.clone(),
            _ => None,
        };

        let (message, details) = match &self {
            ApiError::Database(db_err) => (
                ApiError::format_database_error(db_err),
                Some(db_err.to_string()),
            ),
            _ => (self.to_string(), None),
        };

        let error_response = ApiErrorResponse {
            error_id,
            error_type: self.error_type().to_string(),
            message,
            details,
            field_errors,
            timestamp: chrono::Utc::now(),
            suggestions: self.suggestions(),
        };

        (status_code, Json(error_response)).into_response()
    }
}

/// Helper function to create successful API responses
pub fn api_success<T>(data: T) -> ApiResponse<T> {
    ApiResponse {
        success: true,
        data,
        metadata: None,
    }
}

/// Helper function to create successful API responses with metadata
pub fn api_success_with_meta<T>(data: T, metadata: ResponseMetadata) -> ApiResponse<T> {
    ApiResponse {
        success: true,
        data,
        metadata: Some(metadata),
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::bad_request(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::bad_request(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::bad_request(rejection.body_text())
    }
}

/// Convert anyhow errors to API errors
impl From<anyhow::Error> for ApiError {
    fn from(error: anyhow::Error) -> Self {
        ApiError::Internal {
            message: error.to_string(),
        }
    }
}

/// Type alias for API results
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_taxonomy() {
        assert_eq!(ApiError::validation("x").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::authentication("x").status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::authorization("x").status_code(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::not_found("x").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::inventory_conflict("Out of stock").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError::conflict("x").status_code(), StatusCode::CONFLICT);
        assert_eq!(
            ApiError::Database(DatabaseError::QueryFailed("boom".into())).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::Database(DatabaseError::ConnectionFailed("refused".into())).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn not_found_message_is_verbatim() {
        let err = ApiError::not_found("No active pharmacy found for that user");
        assert_eq!(err.to_string(), "No active pharmacy found for that user");
    }

    #[test]
    fn database_errors_carry_details() {
        let response =
            ApiError::Database(DatabaseError::QueryFailed("syntax error".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn duplicate_key_gets_friendly_wording() {
        let msg = ApiError::format_database_error(&DatabaseError::QueryFailed(
            "duplicate key value violates unique constraint".into(),
        ));
        assert_eq!(msg, "A record with these details already exists.");
    }
}
