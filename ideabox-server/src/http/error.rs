//! API error types with IntoResponse
//!
//! Errors are converted to JSON responses with appropriate status codes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::db::repos::DbError;
use crate::models::ValidationError;
use crate::services::{IntegrationError, MergeError, WebhookError};

/// API error type with automatic HTTP status mapping
#[derive(Debug)]
pub enum ApiError {
    /// Validation failed (400)
    Validation(ValidationError),

    /// Malformed or unacceptable request (400)
    BadRequest { message: String },

    /// Missing or unknown credentials (401)
    Unauthorized { message: String },

    /// Authenticated but not allowed (403)
    Forbidden { reason: String },

    /// Resource not found (404)
    NotFound { resource: &'static str, id: String },

    /// State conflict (409)
    Conflict { message: String },

    /// GitHub or another upstream failed (502, logged)
    Upstream { message: String },

    /// Database error (500, logged)
    Database(DbError),

    /// Internal error (500)
    Internal { message: String },
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    pub fn forbidden(reason: impl Into<String>) -> Self {
        Self::Forbidden {
            reason: reason.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            Self::Forbidden { .. } => StatusCode::FORBIDDEN,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::Upstream { .. } => StatusCode::BAD_GATEWAY,
            Self::Database(_) | Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            Self::Validation(e) => json!({
                "error": "validation_error",
                "message": e.to_string()
            }),
            Self::BadRequest { message } => json!({
                "error": "bad_request",
                "message": message
            }),
            Self::Unauthorized { message } => json!({
                "error": "unauthorized",
                "message": message
            }),
            Self::Forbidden { reason } => json!({
                "error": "forbidden",
                "message": reason
            }),
            Self::NotFound { resource, id } => json!({
                "error": "not_found",
                "message": format!("{} '{}' not found", resource, id)
            }),
            Self::Conflict { message } => json!({
                "error": "conflict",
                "message": message
            }),
            Self::Upstream { message } => {
                tracing::error!("Upstream error: {}", message);
                json!({
                    "error": "upstream_error",
                    "message": "an upstream service failed"
                })
            }
            Self::Database(e) => {
                // Log the actual error, return generic message
                tracing::error!("Database error: {}", e);
                json!({
                    "error": "internal_error",
                    "message": "an internal error occurred"
                })
            }
            Self::Internal { message } => {
                tracing::error!("Internal error: {}", message);
                json!({
                    "error": "internal_error",
                    "message": "an internal error occurred"
                })
            }
        };

        (status, Json(body)).into_response()
    }
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        Self::Validation(e)
    }
}

impl From<DbError> for ApiError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::NotFound { resource, id } => Self::NotFound { resource, id },
            DbError::Conflict { .. } => Self::conflict(e.to_string()),
            _ => Self::Database(e),
        }
    }
}

impl From<MergeError> for ApiError {
    fn from(e: MergeError) -> Self {
        match e {
            MergeError::SamePost => Self::bad_request(e.to_string()),
            MergeError::AlreadyMerged(_) | MergeError::TargetMerged(_) | MergeError::NotMerged(_) => {
                Self::conflict(e.to_string())
            }
            MergeError::Db(e) => e.into(),
        }
    }
}

impl From<IntegrationError> for ApiError {
    fn from(e: IntegrationError) -> Self {
        match e {
            IntegrationError::UnknownKind(_)
            | IntegrationError::InvalidState
            | IntegrationError::NotAnIssue(_)
            | IntegrationError::KindMismatch { .. } => {
                Self::bad_request(e.to_string())
            }
            IntegrationError::NotConnected(_) => Self::conflict(e.to_string()),
            IntegrationError::Upstream(e) => Self::Upstream {
                message: e.to_string(),
            },
            IntegrationError::Validation(e) => e.into(),
            IntegrationError::Db(e) => e.into(),
        }
    }
}

impl From<WebhookError> for ApiError {
    fn from(e: WebhookError) -> Self {
        match e {
            WebhookError::MissingEvent
            | WebhookError::InvalidPayload(_)
            | WebhookError::MissingRepository => Self::bad_request(e.to_string()),
            WebhookError::MissingSignature | WebhookError::InvalidSignature => {
                Self::unauthorized(e.to_string())
            }
            WebhookError::UnknownRepository(name) => Self::NotFound {
                resource: "repository",
                id: name,
            },
            WebhookError::Db(e) => e.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use uuid::Uuid;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn validation_error_is_400() {
        let err = ApiError::Validation(ValidationError::Empty { field: "title" });
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"], "validation_error");
        assert_eq!(body["message"], "title cannot be empty");
    }

    #[tokio::test]
    async fn not_found_is_404() {
        let err: ApiError = DbError::not_found("post", "dark-mode").into();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(body["message"], "post 'dark-mode' not found");
    }

    #[tokio::test]
    async fn upstream_message_is_hidden() {
        let err: ApiError = IntegrationError::Upstream(ideabox_github::GitHubError::Api {
            status: 500,
            message: "secret detail".into(),
        })
        .into();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body = body_json(response).await;
        assert_eq!(body["message"], "an upstream service failed");
    }

    #[test]
    fn merge_errors_map_to_conflict_or_bad_request() {
        assert_eq!(ApiError::from(MergeError::SamePost).status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::from(MergeError::TargetMerged(Uuid::new_v4())).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(MergeError::NotMerged(Uuid::new_v4())).status(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn integration_errors_map_to_statuses() {
        assert_eq!(
            ApiError::from(IntegrationError::InvalidState).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(IntegrationError::NotConnected(Uuid::new_v4())).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(IntegrationError::NotAnIssue(7)).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(IntegrationError::KindMismatch {
                expected: "github".into(),
                got: "gitlab".into(),
            })
            .status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn webhook_errors_map_to_statuses() {
        assert_eq!(ApiError::from(WebhookError::MissingEvent).status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::from(WebhookError::MissingSignature).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::from(WebhookError::InvalidSignature).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::from(WebhookError::UnknownRepository("a/b".into())).status(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn conflict_is_409() {
        let err: ApiError = DbError::Conflict {
            resource: "board",
            reason: "slug already taken".into(),
        }
        .into();
        assert_eq!(err.status(), StatusCode::CONFLICT);
    }
}
