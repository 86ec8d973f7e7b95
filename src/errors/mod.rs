//! Error handling module for the quotes API.
//!
//! Provides the application error taxonomy with mapping to HTTP status codes
//! and the `{"error": ...}` response envelope.

use std::collections::BTreeMap;

use axum::{
    extract::Request,
    http::{header, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::db::DbError;

/// Messages sent to clients. Internals never leak past these.
pub mod messages {
    pub const NOT_FOUND: &str = "the requested resource could not be found";
    pub const EDIT_CONFLICT: &str =
        "unable to update the record due to an edit conflict, please try again";
    pub const INVALID_CREDENTIALS: &str = "invalid authentication credentials";
    pub const INVALID_TOKEN: &str = "invalid or missing authentication token";
    pub const AUTHENTICATION_REQUIRED: &str = "you must be authenticated to access this resource";
    pub const INACTIVE_ACCOUNT: &str =
        "your user account must be activated to access this resource";
    pub const NOT_PERMITTED: &str =
        "your user account doesn't have the necessary permissions to access this resource";
    pub const RATE_LIMITED: &str = "rate limit exceeded";
    pub const INTERNAL: &str = "the server encountered a problem and could not process your request";
}

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    /// Per-field validation failures
    Validation(BTreeMap<String, String>),
    /// Request body could not be decoded
    MalformedRequest(String),
    /// Resource not found
    NotFound,
    /// Route exists but not for this method
    MethodNotAllowed(String),
    /// Optimistic concurrency conflict
    EditConflict,
    /// Wrong email or password
    InvalidCredentials,
    /// Bearer token present but unknown, expired or of the wrong scope
    InvalidToken,
    /// Route needs an authenticated user
    AuthenticationRequired,
    /// Route needs an activated account
    InactiveAccount,
    /// Route needs a permission the user lacks
    NotPermitted,
    /// Too many requests from this client
    RateLimited,
    /// Unexpected failure; the detail is logged, never returned
    Internal(String),
}

impl AppError {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::MalformedRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            AppError::EditConflict => StatusCode::CONFLICT,
            AppError::InvalidCredentials
            | AppError::InvalidToken
            | AppError::AuthenticationRequired => StatusCode::UNAUTHORIZED,
            AppError::InactiveAccount | AppError::NotPermitted => StatusCode::FORBIDDEN,
            AppError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Body placed under the `error` key of the envelope.
    pub fn body(&self) -> serde_json::Value {
        match self {
            AppError::Validation(fields) => json!(fields),
            AppError::MalformedRequest(msg) => json!(msg),
            AppError::NotFound => json!(messages::NOT_FOUND),
            AppError::MethodNotAllowed(method) => {
                json!(format!("the {method} method is not supported for this resource"))
            }
            AppError::EditConflict => json!(messages::EDIT_CONFLICT),
            AppError::InvalidCredentials => json!(messages::INVALID_CREDENTIALS),
            AppError::InvalidToken => json!(messages::INVALID_TOKEN),
            AppError::AuthenticationRequired => json!(messages::AUTHENTICATION_REQUIRED),
            AppError::InactiveAccount => json!(messages::INACTIVE_ACCOUNT),
            AppError::NotPermitted => json!(messages::NOT_PERMITTED),
            AppError::RateLimited => json!(messages::RATE_LIMITED),
            AppError::Internal(_) => json!(messages::INTERNAL),
        }
    }

    /// Single-field validation failure.
    pub fn field(field: &str, message: &str) -> Self {
        AppError::Validation(BTreeMap::from([(field.to_string(), message.to_string())]))
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppError::Internal(detail) => write!(f, "internal error: {}", detail),
            other => write!(f, "{}: {}", other.status_code(), other.body()),
        }
    }
}

impl std::error::Error for AppError {}

impl From<DbError> for AppError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound => AppError::NotFound,
            DbError::EditConflict => AppError::EditConflict,
            other => AppError::Internal(other.to_string()),
        }
    }
}

/// Detail of a 500 response, carried to [`log_server_errors`] in the
/// response extensions.
#[derive(Debug, Clone)]
pub struct InternalErrorDetail(pub String);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = json!({ "error": self.body() });
        let mut response = (status, Json(body)).into_response();

        match self {
            AppError::InvalidToken => {
                response.headers_mut().insert(
                    header::WWW_AUTHENTICATE,
                    HeaderValue::from_static("Bearer"),
                );
            }
            AppError::Internal(detail) => {
                response.extensions_mut().insert(InternalErrorDetail(detail));
            }
            _ => {}
        }

        response
    }
}

/// Log every internal failure with the request method and URI before the
/// response leaves the server.
pub async fn log_server_errors(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();

    let response = next.run(request).await;

    if let Some(InternalErrorDetail(detail)) = response.extensions().get::<InternalErrorDetail>() {
        tracing::error!(
            request_method = %method,
            request_url = %uri,
            error = %detail,
            "request failed"
        );
    }

    response
}

/// Fallback for unknown routes.
pub async fn not_found() -> AppError {
    AppError::NotFound
}

/// Fallback for known routes hit with an unsupported method.
pub async fn method_not_allowed(method: Method) -> AppError {
    AppError::MethodNotAllowed(method.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            AppError::field("page", "must be greater than zero").status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            AppError::MalformedRequest("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(AppError::NotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::EditConflict.status_code(), StatusCode::CONFLICT);
        assert_eq!(AppError::InvalidToken.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            AppError::InvalidCredentials.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(AppError::InactiveAccount.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::NotPermitted.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            AppError::RateLimited.status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            AppError::Internal("boom".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_internal_detail_is_not_exposed() {
        let err = AppError::Internal("no such table: quotes".into());
        assert_eq!(err.body(), json!(messages::INTERNAL));

        let response = err.into_response();
        assert!(response.extensions().get::<InternalErrorDetail>().is_some());
    }

    #[test]
    fn test_validation_body_is_field_map() {
        let err = AppError::field("sort", "invalid sort value");
        assert_eq!(err.body(), json!({ "sort": "invalid sort value" }));
    }

    #[test]
    fn test_db_error_translation() {
        assert!(matches!(AppError::from(DbError::NotFound), AppError::NotFound));
        assert!(matches!(
            AppError::from(DbError::EditConflict),
            AppError::EditConflict
        ));
        assert!(matches!(
            AppError::from(DbError::Timeout),
            AppError::Internal(_)
        ));
        assert!(matches!(
            AppError::from(DbError::DuplicateEmail),
            AppError::Internal(_)
        ));
    }

    #[test]
    fn test_invalid_token_sets_challenge_header() {
        let response = AppError::InvalidToken.into_response();
        assert_eq!(response.headers()[header::WWW_AUTHENTICATE], "Bearer");
    }
}
