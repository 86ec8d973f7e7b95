//! User access object.

use chrono::{Duration, Utc};
use sqlx::{sqlite::SqliteRow, Executor, Row, Sqlite, SqlitePool};

use super::permissions::grant;
use super::tokens::insert_token;
use super::{bounded, DbError};
use crate::models::{Scope, Token, User};

pub(crate) const USER_COLUMNS: &str =
    "users.id, users.created_at, users.name, users.email, users.password_hash, users.activated, users.version";

#[derive(Clone)]
pub struct UserStore {
    pool: SqlitePool,
}

impl UserStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Persist a new user together with its initial permissions and an
    /// activation token. Either all three writes land or none do. A second
    /// account with the same email (compared case-insensitively) fails with
    /// [`DbError::DuplicateEmail`].
    pub async fn register(
        &self,
        user: &mut User,
        codes: &[&str],
        activation_ttl: Duration,
    ) -> Result<Token, DbError> {
        bounded(async {
            let mut tx = self.pool.begin().await?;

            insert_user(&mut *tx, user).await?;
            grant(&mut *tx, user.id, codes).await?;

            let token = Token::generate(user.id, activation_ttl, Scope::Activation);
            insert_token(&mut *tx, &token).await?;

            tx.commit().await?;
            Ok(token)
        })
        .await
    }

    pub async fn get_by_email(&self, email: &str) -> Result<User, DbError> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?");
        let row = bounded(async {
            sqlx::query(&query)
                .bind(email)
                .fetch_optional(&self.pool)
                .await
                .map_err(DbError::from)
        })
        .await?;

        row.as_ref().map(user_from_row).ok_or(DbError::NotFound)
    }

    /// Compare-and-swap on `user.version`.
    pub async fn update(&self, user: &mut User) -> Result<(), DbError> {
        let row = bounded(async {
            sqlx::query(
                r#"UPDATE users
                   SET name = ?, email = ?, password_hash = ?, activated = ?, version = version + 1
                   WHERE id = ? AND version = ?
                   RETURNING version"#,
            )
            .bind(&user.name)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.activated)
            .bind(user.id)
            .bind(user.version)
            .fetch_optional(&self.pool)
            .await
            .map_err(email_conflict)
        })
        .await?;

        let row = row.ok_or(DbError::EditConflict)?;
        user.version = row.get("version");
        Ok(())
    }
}

async fn insert_user<'e, E>(executor: E, user: &mut User) -> Result<(), DbError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let created_at = Utc::now();
    let row = sqlx::query(
        r#"INSERT INTO users (created_at, name, email, password_hash, activated)
           VALUES (?, ?, ?, ?, ?)
           RETURNING id, version"#,
    )
    .bind(created_at)
    .bind(&user.name)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(user.activated)
    .fetch_one(executor)
    .await
    .map_err(email_conflict)?;

    user.id = row.get("id");
    user.version = row.get("version");
    user.created_at = created_at;
    Ok(())
}

fn email_conflict(err: sqlx::Error) -> DbError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return DbError::DuplicateEmail;
        }
    }
    DbError::from(err)
}

pub(crate) fn user_from_row(row: &SqliteRow) -> User {
    User {
        id: row.get("id"),
        created_at: row.get("created_at"),
        name: row.get("name"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        activated: row.get("activated"),
        version: row.get("version"),
    }
}
