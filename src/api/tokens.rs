//! Token issuance endpoint.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::Duration;
use serde_json::json;

use super::{ensure_valid, JsonBody};
use crate::auth::verify_password;
use crate::db::DbError;
use crate::errors::AppError;
use crate::models::{validate_email, validate_password_plaintext, CredentialsRequest, Scope};
use crate::validator::Validator;
use crate::AppState;

/// Lifetime of an authentication token, in hours.
pub const AUTHENTICATION_TOKEN_HOURS: i64 = 24;

/// POST /v1/tokens/authentication - Exchange credentials for a bearer token.
pub async fn create_authentication_token(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<CredentialsRequest>,
) -> Result<impl IntoResponse, AppError> {
    let mut v = Validator::new();
    validate_email(&mut v, &request.email);
    validate_password_plaintext(&mut v, &request.password);
    ensure_valid(v)?;

    let user = match state.repo.users.get_by_email(&request.email).await {
        Ok(user) => user,
        Err(DbError::NotFound) => return Err(AppError::InvalidCredentials),
        Err(e) => return Err(e.into()),
    };

    if !verify_password(request.password, user.password_hash.clone()).await? {
        return Err(AppError::InvalidCredentials);
    }

    let token = state
        .repo
        .tokens
        .new_token(user.id, Duration::hours(AUTHENTICATION_TOKEN_HOURS), Scope::Authentication)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "authentication_token": token })),
    ))
}
