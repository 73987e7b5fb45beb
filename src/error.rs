use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

use crate::auth::registration::RegistrationStep;

/// Application-level error taxonomy. All route handlers return
/// `Result<T, ApiError>`; collaborator errors are translated into one of
/// these kinds at the boundary where they occur.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Duplicate identity or row. The string is diagnostic context for logs,
    /// never sent to the caller.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Bad credentials, unverified email, invalid token, role mismatch.
    /// Carries a curated caller-safe message.
    #[error("unauthorized: {0}")]
    Unauthorized(&'static str),

    /// Missing required onboarding fields, always batch-reported.
    #[error("missing required fields")]
    Validation { missing_fields: Vec<String> },

    /// Uploaded file is neither a PDF nor an image.
    #[error("unsupported file type {content_type} for {filename}")]
    UnsupportedFileType {
        filename: String,
        content_type: String,
    },

    /// A collaborator call failed. `collaborator` names which one.
    #[error("{collaborator} failure")]
    Upstream {
        collaborator: &'static str,
        #[source]
        source: anyhow::Error,
    },

    /// A registration step failed after the rollback attempt ran. Rollback
    /// failures are carried as notes; they change logging, not the kind.
    #[error("registration failed at step {step}")]
    Provisioning {
        step: RegistrationStep,
        rollback_notes: Vec<String>,
        #[source]
        source: anyhow::Error,
    },

    /// Malformed request from the client.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Anything else.
    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Conflict(diag) => {
                warn!(diag = %diag, "conflict");
                (
                    StatusCode::CONFLICT,
                    Json(json!({ "error": "already exists" })),
                )
                    .into_response()
            }
            ApiError::Unauthorized(msg) => {
                warn!(msg, "unauthorized");
                (StatusCode::UNAUTHORIZED, Json(json!({ "error": msg }))).into_response()
            }
            ApiError::Validation { missing_fields } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({
                    "error": "missing required fields",
                    "missing_fields": missing_fields,
                })),
            )
                .into_response(),
            ApiError::UnsupportedFileType {
                filename,
                content_type,
            } => (
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                Json(json!({
                    "error": format!("unsupported file type {content_type} for {filename}"),
                })),
            )
                .into_response(),
            ApiError::Upstream {
                collaborator,
                source,
            } => {
                error!(collaborator, error = %format!("{source:#}"), "upstream failure");
                (
                    StatusCode::BAD_GATEWAY,
                    Json(json!({ "error": "upstream service failure" })),
                )
                    .into_response()
            }
            ApiError::Provisioning {
                step,
                rollback_notes,
                source,
            } => {
                error!(
                    step = step.as_str(),
                    rollback_notes = ?rollback_notes,
                    error = %format!("{source:#}"),
                    "registration failed"
                );
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({
                        "error": "registration failed",
                        "step": step.as_str(),
                    })),
                )
                    .into_response()
            }
            ApiError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": msg }))).into_response()
            }
            ApiError::Internal(source) => {
                error!(error = %format!("{source:#}"), "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "internal error" })),
                )
                    .into_response()
            }
        }
    }
}

impl ApiError {
    pub fn upstream<E: Into<anyhow::Error>>(collaborator: &'static str) -> impl FnOnce(E) -> Self {
        move |e| ApiError::Upstream {
            collaborator,
            source: e.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_lists_all_fields_in_body() {
        let err = ApiError::Validation {
            missing_fields: vec!["first_name".into(), "agency_name".into()],
        };
        let resp = err.into_response();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn conflict_hides_diagnostic_from_caller() {
        let err = ApiError::Conflict("user a@x.com already in users table".into());
        let resp = err.into_response();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn upstream_maps_to_bad_gateway() {
        let err = ApiError::Upstream {
            collaborator: "object storage",
            source: anyhow::anyhow!("timeout"),
        };
        assert_eq!(err.into_response().status(), StatusCode::BAD_GATEWAY);
    }
}
