//! Bearer-token authentication and per-route authorization.
//!
//! [`authenticate`] runs for every request and resolves the caller into a
//! [`CurrentUser`]. Handlers then declare what they need through the
//! [`RequireActivatedUser`] and [`RequirePermission`] extractors.

mod password;

pub use password::*;

use std::marker::PhantomData;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::db::DbError;
use crate::errors::AppError;
use crate::models::{permissions, Scope, User, TOKEN_PLAINTEXT_LEN};
use crate::AppState;

/// Who is making the request, inserted into the request extensions.
#[derive(Debug, Clone)]
pub enum CurrentUser {
    Anonymous,
    Authenticated(User),
}

/// Resolve the `Authorization: Bearer <token>` header into a [`CurrentUser`].
///
/// A missing or malformed header leaves the caller anonymous. A well-formed
/// header carrying an unknown, expired or wrong-scope token is rejected with
/// 401.
pub async fn authenticate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let plaintext = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(bearer_token)
        .map(str::to_string);

    let current = match plaintext {
        None => CurrentUser::Anonymous,
        Some(plaintext) => match user_for_token(&state, &plaintext).await {
            Ok(user) => CurrentUser::Authenticated(user),
            Err(err) => return with_vary(err.into_response()),
        },
    };

    request.extensions_mut().insert(current);
    with_vary(next.run(request).await)
}

fn with_vary(mut response: Response) -> Response {
    response
        .headers_mut()
        .append(header::VARY, HeaderValue::from_static("Authorization"));
    response
}

/// Token part of a `Bearer <token>` header value.
fn bearer_token(value: &str) -> Option<&str> {
    let mut parts = value.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some("Bearer"), Some(token), None) => Some(token),
        _ => None,
    }
}

async fn user_for_token(state: &AppState, plaintext: &str) -> Result<User, AppError> {
    if plaintext.len() != TOKEN_PLAINTEXT_LEN {
        return Err(AppError::InvalidToken);
    }

    match state
        .repo
        .tokens
        .get_for_token(Scope::Authentication, plaintext)
        .await
    {
        Ok(user) => Ok(user),
        Err(DbError::NotFound) => Err(AppError::InvalidToken),
        Err(e) => Err(e.into()),
    }
}

/// An authenticated caller whose account has been activated.
pub struct RequireActivatedUser(pub User);

impl FromRequestParts<AppState> for RequireActivatedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &AppState) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<CurrentUser>() {
            Some(CurrentUser::Authenticated(user)) if user.activated => {
                Ok(RequireActivatedUser(user.clone()))
            }
            Some(CurrentUser::Authenticated(_)) => Err(AppError::InactiveAccount),
            Some(CurrentUser::Anonymous) | None => Err(AppError::AuthenticationRequired),
        }
    }
}

/// A permission code a route can demand.
pub trait Permission {
    const CODE: &'static str;
}

pub struct QuotesRead;
pub struct QuotesWrite;
pub struct SchoolsRead;
pub struct SchoolsWrite;

impl Permission for QuotesRead {
    const CODE: &'static str = permissions::QUOTES_READ;
}

impl Permission for QuotesWrite {
    const CODE: &'static str = permissions::QUOTES_WRITE;
}

impl Permission for SchoolsRead {
    const CODE: &'static str = permissions::SCHOOLS_READ;
}

impl Permission for SchoolsWrite {
    const CODE: &'static str = permissions::SCHOOLS_WRITE;
}

/// An activated caller holding permission `P`.
pub struct RequirePermission<P> {
    pub user: User,
    _permission: PhantomData<fn() -> P>,
}

impl<P: Permission> FromRequestParts<AppState> for RequirePermission<P> {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let RequireActivatedUser(user) = RequireActivatedUser::from_request_parts(parts, state).await?;

        let held = state.repo.permissions.get_all_for_user(user.id).await?;
        if !held.include(P::CODE) {
            return Err(AppError::NotPermitted);
        }

        Ok(RequirePermission {
            user,
            _permission: PhantomData,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(bearer_token("Bearer  abc "), Some("abc"));
        assert_eq!(bearer_token("bearer abc"), None);
        assert_eq!(bearer_token("Basic abc"), None);
        assert_eq!(bearer_token("Bearer"), None);
        assert_eq!(bearer_token("Bearer a b"), None);
        assert_eq!(bearer_token(""), None);
    }

    #[test]
    fn test_permission_codes() {
        assert_eq!(QuotesRead::CODE, "quotes:read");
        assert_eq!(QuotesWrite::CODE, "quotes:write");
        assert_eq!(SchoolsRead::CODE, "schools:read");
        assert_eq!(SchoolsWrite::CODE, "schools:write");
    }
}
