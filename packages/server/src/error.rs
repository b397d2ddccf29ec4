use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sea_orm::DbErr;
use serde::Serialize;

/// One required form field missing from a submission.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct MissingField {
    /// Attribute id of the missing field; absent for identity fields
    /// (`email`, `participant_slug`) that are not attributes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i32>,
    /// Field name, for display.
    pub name: String,
    /// Extra context for fields with non-obvious rules (block choices).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Structured error response returned by all endpoints on failure.
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorBody {
    /// Machine-readable error code. One of: `VALIDATION_ERROR`,
    /// `MISSING_FIELDS`, `FORM_CLOSED`, `TOKEN_MISSING`, `TOKEN_INVALID`,
    /// `NOT_FOUND`, `CONFLICT`, `CAPACITY_EXCEEDED`, `INVALID_REFERENCE`,
    /// `INTERNAL_ERROR`.
    #[schema(example = "VALIDATION_ERROR")]
    pub code: &'static str,
    /// Human-readable error description.
    #[schema(example = "Name must be 1-256 characters")]
    pub message: String,
    /// Complete list of missing required fields (MISSING_FIELDS only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<MissingField>>,
}

/// Application-level error type.
#[derive(Debug)]
pub enum AppError {
    Validation(String),
    /// One or more required form fields are missing. Carries the complete
    /// list, not just the first.
    MissingFields(Vec<MissingField>),
    /// The form is not accepting submissions.
    FormClosed,
    TokenMissing,
    TokenInvalid,
    NotFound(String),
    Conflict(String),
    /// A block (or one of its ancestors) is full.
    CapacityExceeded(String),
    /// A referenced entity exists but belongs to a different owner.
    InvalidReference(String),
    Internal(String),
}

impl AppError {
    fn status_and_body(self) -> (StatusCode, ErrorBody) {
        match self {
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    code: "VALIDATION_ERROR",
                    message: msg,
                    fields: None,
                },
            ),
            AppError::MissingFields(fields) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    code: "MISSING_FIELDS",
                    message: "Required fields are missing".into(),
                    fields: Some(fields),
                },
            ),
            AppError::FormClosed => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    code: "FORM_CLOSED",
                    message: "Form closed".into(),
                    fields: None,
                },
            ),
            AppError::TokenMissing => (
                StatusCode::UNAUTHORIZED,
                ErrorBody {
                    code: "TOKEN_MISSING",
                    message: "Authentication required".into(),
                    fields: None,
                },
            ),
            AppError::TokenInvalid => (
                StatusCode::UNAUTHORIZED,
                ErrorBody {
                    code: "TOKEN_INVALID",
                    message: "Invalid or expired token".into(),
                    fields: None,
                },
            ),
            AppError::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                ErrorBody {
                    code: "NOT_FOUND",
                    message: msg,
                    fields: None,
                },
            ),
            AppError::Conflict(msg) => (
                StatusCode::CONFLICT,
                ErrorBody {
                    code: "CONFLICT",
                    message: msg,
                    fields: None,
                },
            ),
            AppError::CapacityExceeded(msg) => (
                StatusCode::CONFLICT,
                ErrorBody {
                    code: "CAPACITY_EXCEEDED",
                    message: msg,
                    fields: None,
                },
            ),
            AppError::InvalidReference(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorBody {
                    code: "INVALID_REFERENCE",
                    message: msg,
                    fields: None,
                },
            ),
            AppError::Internal(detail) => {
                tracing::error!("Internal error: {}", detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody {
                        code: "INTERNAL_ERROR",
                        message: "An unexpected error occurred".into(),
                        fields: None,
                    },
                )
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = self.status_and_body();
        (status, Json(body)).into_response()
    }
}

impl From<DbErr> for AppError {
    fn from(err: DbErr) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<common::StorageError> for AppError {
    fn from(err: common::StorageError) -> Self {
        match err {
            common::StorageError::NotFound(name) => {
                AppError::NotFound(format!("File '{name}' not found"))
            }
            common::StorageError::InvalidName(msg) => AppError::Validation(msg),
            common::StorageError::SizeLimitExceeded { actual, limit } => AppError::Validation(
                format!("File too large ({actual} bytes, limit {limit})"),
            ),
            common::StorageError::Io(e) => AppError::Internal(e.to_string()),
        }
    }
}
