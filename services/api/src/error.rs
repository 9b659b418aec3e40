//! services/api/src/error.rs
//!
//! Defines the primary error type for the entire API service and its mapping
//! onto HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;
use utoipa::ToSchema;

use crate::config::ConfigError;
use pharmacheck_core::{CheckError, PortError, TranslationError};

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error(transparent)]
    Port(#[from] PortError),

    /// A failed interaction check.
    #[error(transparent)]
    Check(#[from] CheckError),

    /// A failed paraphrase request.
    #[error(transparent)]
    Translation(#[from] TranslationError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed or incomplete request.
    #[error("{0}")]
    Validation(String),

    #[error("Authentication required")]
    Unauthorized,

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("{0}")]
    Forbidden(String),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

/// JSON error body returned by every endpoint.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
    pub code: String,
    /// Offending user inputs, for not-found errors.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub terms: Vec<String>,
}

struct Mapped {
    status: StatusCode,
    code: &'static str,
    message: String,
    terms: Vec<String>,
}

impl Mapped {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            terms: Vec::new(),
        }
    }

    fn not_found(message: String, terms: Vec<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            code: "NOT_FOUND",
            message,
            terms,
        }
    }

    fn internal(detail: &dyn std::fmt::Display) -> Self {
        error!(%detail, "API internal error");
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL",
            "An internal error occurred",
        )
    }
}

fn map_port(err: &PortError) -> Mapped {
    match err {
        PortError::NotFound(msg) => Mapped::not_found(msg.clone(), Vec::new()),
        PortError::Unauthorized => {
            Mapped::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", "Authentication required")
        }
        PortError::Conflict(msg) => Mapped::new(StatusCode::CONFLICT, "CONFLICT", msg.clone()),
        PortError::Unexpected(_) => Mapped::internal(err),
    }
}

impl ApiError {
    fn mapped(&self) -> Mapped {
        match self {
            ApiError::Port(e) => map_port(e),
            ApiError::Check(e) => match e {
                CheckError::DrugNotFound(name) | CheckError::ConditionNotFound(name) => {
                    Mapped::not_found(e.to_string(), vec![name.clone()])
                }
                CheckError::MedicationsNotFound(names) => {
                    Mapped::not_found(e.to_string(), names.clone())
                }
                CheckError::TooManyMedications { .. } | CheckError::NoMedications => {
                    Mapped::new(StatusCode::BAD_REQUEST, "VALIDATION_FAILED", e.to_string())
                }
                CheckError::Port(p) => map_port(p),
            },
            ApiError::Translation(e) => match e {
                TranslationError::EmptyDescription | TranslationError::DescriptionMismatch(_) => {
                    Mapped::new(StatusCode::BAD_REQUEST, "VALIDATION_FAILED", e.to_string())
                }
                TranslationError::Failed(_) | TranslationError::TimedOut(_) => Mapped::new(
                    StatusCode::SERVICE_UNAVAILABLE,
                    "TRANSLATION_FAILED",
                    e.to_string(),
                ),
                TranslationError::RecordNotFound(_) => Mapped::not_found(e.to_string(), Vec::new()),
                TranslationError::Port(p) => map_port(p),
            },
            ApiError::Validation(msg) => {
                Mapped::new(StatusCode::BAD_REQUEST, "VALIDATION_FAILED", msg.clone())
            }
            ApiError::Unauthorized | ApiError::InvalidCredentials => {
                Mapped::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", self.to_string())
            }
            ApiError::Forbidden(msg) => Mapped::new(StatusCode::FORBIDDEN, "FORBIDDEN", msg.clone()),
            ApiError::Config(_)
            | ApiError::Database(_)
            | ApiError::Io(_)
            | ApiError::Internal(_) => Mapped::internal(self),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mapped = self.mapped();
        let body = ErrorBody {
            error: mapped.message,
            code: mapped.code.to_string(),
            terms: mapped.terms,
        };
        (mapped.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use pharmacheck_core::{InteractionKind, RecordRef};

    async fn body(err: ApiError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), 4096).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn unknown_medications_are_listed_as_terms() {
        let err = ApiError::from(CheckError::MedicationsNotFound(vec!["Xanadrin123".into()]));
        let (status, json) = body(err).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["code"], "NOT_FOUND");
        assert_eq!(json["terms"][0], "Xanadrin123");
        assert_eq!(json["error"], "Medications not found: Xanadrin123");
    }

    #[tokio::test]
    async fn too_many_medications_is_a_validation_failure() {
        let (status, json) = body(CheckError::TooManyMedications { count: 6, max: 5 }.into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["code"], "VALIDATION_FAILED");
        assert!(json.get("terms").is_none());
    }

    #[tokio::test]
    async fn translation_timeout_is_retryable() {
        let (status, json) = body(TranslationError::TimedOut(30).into()).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json["code"], "TRANSLATION_FAILED");

        let missing = RecordRef::new(InteractionKind::Food, 4);
        let (status, _) = body(TranslationError::RecordNotFound(missing).into()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn port_errors_map_to_their_codes() {
        let (status, json) = body(PortError::Conflict("Username already exists".into()).into()).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["error"], "Username already exists");

        let (status, _) = body(PortError::Unauthorized.into()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn internal_errors_hide_details() {
        let (status, json) = body(ApiError::Internal("pool exhausted".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["code"], "INTERNAL");
        assert_eq!(json["error"], "An internal error occurred");
    }
}
