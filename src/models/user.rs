//! User model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::validator::{is_email, Validator};

/// A registered account. The password is only ever held as a PHC hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub name: String,
    pub email: String,
    #[serde(skip)]
    pub password_hash: String,
    pub activated: bool,
    #[serde(skip)]
    pub version: i64,
}

impl User {
    pub fn validate(&self, v: &mut Validator) {
        v.check(!self.name.is_empty(), "name", "must be provided");
        v.check(
            self.name.len() <= 500,
            "name",
            "must not be more than 500 bytes long",
        );
        validate_email(v, &self.email);
    }
}

pub fn validate_email(v: &mut Validator, email: &str) {
    v.check(!email.is_empty(), "email", "must be provided");
    v.check(is_email(email), "email", "must be a valid email address");
}

pub fn validate_password_plaintext(v: &mut Validator, password: &str) {
    v.check(!password.is_empty(), "password", "must be provided");
    v.check(
        password.len() >= 8,
        "password",
        "must be at least 8 bytes long",
    );
    v.check(
        password.len() <= 72,
        "password",
        "must not be more than 72 bytes long",
    );
}

/// Request body for `POST /v1/users`.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterUserRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Request body for `POST /v1/tokens/authentication`.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CredentialsRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Request body for `PUT /v1/users/activated`.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ActivateUserRequest {
    #[serde(default)]
    pub token: String,
}

/// Named capability codes granted to users.
pub mod permissions {
    pub const QUOTES_READ: &str = "quotes:read";
    pub const QUOTES_WRITE: &str = "quotes:write";
    pub const SCHOOLS_READ: &str = "schools:read";
    pub const SCHOOLS_WRITE: &str = "schools:write";

    pub const ALL: &[&str] = &[QUOTES_READ, QUOTES_WRITE, SCHOOLS_READ, SCHOOLS_WRITE];

    /// Granted to every newly registered user.
    pub const DEFAULT: &[&str] = &[QUOTES_READ, SCHOOLS_READ];
}
