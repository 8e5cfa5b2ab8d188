use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use diesel::result::DatabaseErrorKind;
use serde::Serialize;
use std::fmt::Display;

use crate::{
    domain::UnknownVariant, folio::FolioError, pricing::PricingError, workflow::WorkflowError,
};

pub type AppResult<T> = Result<T, AppError>;

pub const CODE_NOT_FOUND: &str = "NOT_FOUND";
pub const CODE_BAD_REQUEST: &str = "BAD_REQUEST";
pub const CODE_VALIDATION_ERROR: &str = "VALIDATION_ERROR";
pub const CODE_UNAUTHORIZED: &str = "UNAUTHORIZED";
pub const CODE_FORBIDDEN: &str = "FORBIDDEN";
pub const CODE_INTERNAL_ERROR: &str = "INTERNAL_ERROR";

const INTERNAL_MESSAGE: &str = "an unexpected error occurred";

#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
    details: Option<Vec<FieldError>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl AppError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, CODE_BAD_REQUEST, message)
    }

    pub fn validation(message: impl Into<String>, details: Vec<FieldError>) -> Self {
        Self {
            details: (!details.is_empty()).then_some(details),
            ..Self::new(StatusCode::BAD_REQUEST, CODE_VALIDATION_ERROR, message)
        }
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, CODE_UNAUTHORIZED, "unauthorized")
    }

    pub fn invalid_credentials() -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            CODE_UNAUTHORIZED,
            "invalid email or password",
        )
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, CODE_FORBIDDEN, message)
    }

    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, CODE_NOT_FOUND, "resource not found")
    }

    pub fn not_found_with(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, CODE_NOT_FOUND, message)
    }

    pub fn internal<E: Display>(error: E) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            CODE_INTERNAL_ERROR,
            error.to_string(),
        )
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> &'static str {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status;
        let message = if status.is_server_error() {
            tracing::error!(code = self.code, error = %self.message, "request failed");
            INTERNAL_MESSAGE.to_string()
        } else {
            self.message
        };
        let body = Json(ErrorResponse {
            timestamp: Utc::now().to_rfc3339(),
            code: self.code,
            message,
            details: self.details,
        });
        (status, body).into_response()
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    timestamp: String,
    code: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Vec<FieldError>>,
}

/// Collects field-level problems so a handler can report all of them at once.
#[derive(Debug, Default)]
pub struct FieldErrors(Vec<FieldError>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.push(FieldError {
            field: field.to_string(),
            message: message.into(),
        });
    }

    pub fn require_text(&mut self, field: &str, value: &str) {
        if value.trim().is_empty() {
            self.add(field, "must not be empty");
        }
    }

    /// Counts characters of the trimmed value, as stored.
    pub fn max_len<'a>(&mut self, field: &str, value: impl Into<Option<&'a str>>, max: usize) {
        if let Some(value) = value.into() {
            if value.trim().chars().count() > max {
                self.add(field, format!("must be at most {max} characters"));
            }
        }
    }

    pub fn require_non_negative(&mut self, field: &str, value: Option<f64>) {
        if matches!(value, Some(v) if v < 0.0 || !v.is_finite()) {
            self.add(field, "must be a non-negative number");
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn finish(self) -> AppResult<()> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(AppError::validation("invalid data", self.0))
        }
    }
}

impl From<diesel::result::Error> for AppError {
    fn from(value: diesel::result::Error) -> Self {
        match value {
            diesel::result::Error::NotFound => AppError::not_found(),
            diesel::result::Error::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                AppError::bad_request("a record with the same unique value already exists")
            }
            diesel::result::Error::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, _) => {
                AppError::bad_request("the record references, or is referenced by, other records")
            }
            _ => AppError::internal(value),
        }
    }
}

impl From<WorkflowError> for AppError {
    fn from(value: WorkflowError) -> Self {
        match value {
            WorkflowError::InvalidTransition(err) => AppError::bad_request(err.to_string()),
            WorkflowError::Database(err) => err.into(),
            WorkflowError::CorruptStatus(err) => AppError::internal(err),
        }
    }
}

impl From<FolioError> for AppError {
    fn from(value: FolioError) -> Self {
        match value {
            FolioError::InvalidCompanyCode => AppError::validation(
                "invalid data",
                vec![FieldError {
                    field: "company_code".to_string(),
                    message: value.to_string(),
                }],
            ),
            FolioError::Database(err) => err.into(),
            FolioError::Exhausted { .. } => AppError::internal(value),
        }
    }
}

impl From<PricingError> for AppError {
    fn from(value: PricingError) -> Self {
        AppError::bad_request(value.to_string())
    }
}

impl From<UnknownVariant> for AppError {
    fn from(value: UnknownVariant) -> Self {
        AppError::bad_request(value.to_string())
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(value: jsonwebtoken::errors::Error) -> Self {
        AppError::internal(value)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(value: anyhow::Error) -> Self {
        AppError::internal(value)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(value: serde_json::Error) -> Self {
        AppError::internal(value)
    }
}

impl From<JsonRejection> for AppError {
    fn from(value: JsonRejection) -> Self {
        AppError::validation(value.body_text(), Vec::new())
    }
}

impl From<QueryRejection> for AppError {
    fn from(value: QueryRejection) -> Self {
        AppError::validation(value.body_text(), Vec::new())
    }
}

impl From<PathRejection> for AppError {
    fn from(value: PathRejection) -> Self {
        AppError::validation(value.body_text(), Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Status;
    use crate::workflow::InvalidTransition;

    #[test]
    fn diesel_not_found_maps_to_404() {
        let err = AppError::from(diesel::result::Error::NotFound);
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.code(), CODE_NOT_FOUND);
    }

    #[test]
    fn field_errors_produce_validation_error() {
        let mut errors = FieldErrors::new();
        errors.require_text("name", "   ");
        errors.require_non_negative("cost", Some(-1.0));
        errors.require_non_negative("weight_kg", None);
        let err = errors.finish().unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.code(), CODE_VALIDATION_ERROR);
        assert_eq!(err.details.as_ref().map(Vec::len), Some(2));
    }

    #[test]
    fn rejected_transition_is_a_bad_request() {
        let err = AppError::from(WorkflowError::InvalidTransition(InvalidTransition {
            from: Status::Completado,
            to: Status::Enviado,
        }));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.code(), CODE_BAD_REQUEST);
        assert_eq!(err.message(), "status cannot change from COMPLETADO to ENVIADO");
    }

    #[test]
    fn exhausted_folios_are_internal() {
        let err = AppError::from(FolioError::Exhausted {
            company_code: "ACME".to_string(),
            attempts: 5,
        });
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.code(), CODE_INTERNAL_ERROR);
    }

    #[test]
    fn max_len_counts_characters_not_bytes() {
        let mut errors = FieldErrors::new();
        errors.max_len("city", "Güémez", 6);
        errors.max_len("phone", None, 1);
        errors.max_len("action", "  NOTA  ", 4);
        assert!(errors.is_empty());

        errors.max_len("action", "X".repeat(81).as_str(), 80);
        let err = errors.finish().unwrap_err();
        assert_eq!(err.code(), CODE_VALIDATION_ERROR);
        assert_eq!(err.details.as_ref().map(|d| d[0].field.as_str()), Some("action"));
    }

    #[test]
    fn empty_field_errors_pass() {
        assert!(FieldErrors::new().finish().is_ok());
    }
}
