//! User registration and activation endpoints.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::{Duration, Utc};
use serde_json::json;

use super::{ensure_valid, JsonBody};
use crate::auth::hash_password;
use crate::db::DbError;
use crate::errors::AppError;
use crate::models::{
    permissions, validate_password_plaintext, validate_token_plaintext, ActivateUserRequest,
    RegisterUserRequest, Scope, User,
};
use crate::validator::Validator;
use crate::AppState;

/// Lifetime of the token mailed out at registration, in days.
pub const ACTIVATION_TOKEN_DAYS: i64 = 3;

/// POST /v1/users - Register a new, not yet activated, user.
///
/// The welcome mail carrying the activation token is sent in the background;
/// the response does not wait for it.
pub async fn register_user(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<RegisterUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    let mut user = User {
        id: 0,
        created_at: Utc::now(),
        name: request.name,
        email: request.email,
        password_hash: String::new(),
        activated: false,
        version: 1,
    };

    let mut v = Validator::new();
    user.validate(&mut v);
    validate_password_plaintext(&mut v, &request.password);
    ensure_valid(v)?;

    user.password_hash = hash_password(request.password).await?;

    let token = match state
        .repo
        .users
        .register(
            &mut user,
            permissions::DEFAULT,
            Duration::days(ACTIVATION_TOKEN_DAYS),
        )
        .await
    {
        Ok(token) => token,
        Err(DbError::DuplicateEmail) => {
            return Err(AppError::field(
                "email",
                "a user with this email address already exists",
            ))
        }
        Err(e) => return Err(e.into()),
    };

    tracing::info!(user_id = user.id, "user registered");

    let mailer = state.mailer.clone();
    let (email, user_id) = (user.email.clone(), user.id);
    state.background.spawn("welcome-email", async move {
        mailer.send_welcome(&email, user_id, &token.plaintext).await
    });

    Ok((StatusCode::ACCEPTED, Json(json!({ "user": user }))))
}

/// PUT /v1/users/activated - Redeem an activation token.
pub async fn activate_user(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<ActivateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    let mut v = Validator::new();
    validate_token_plaintext(&mut v, &request.token);
    ensure_valid(v)?;

    let mut user = match state
        .repo
        .tokens
        .get_for_token(Scope::Activation, &request.token)
        .await
    {
        Ok(user) => user,
        Err(DbError::NotFound) => {
            return Err(AppError::field(
                "token",
                "invalid or expired activation token",
            ))
        }
        Err(e) => return Err(e.into()),
    };

    user.activated = true;
    state.repo.users.update(&mut user).await?;

    state
        .repo
        .tokens
        .delete_all_for_user(Scope::Activation, user.id)
        .await?;

    tracing::info!(user_id = user.id, "user activated");
    Ok(Json(json!({ "user": user })))
}
