//! Token access object.
//!
//! Rows are keyed by the SHA-256 digest of the plaintext; the plaintext
//! itself never reaches the database.

use chrono::{Duration, Utc};
use sqlx::{Executor, Sqlite, SqlitePool};

use super::{bounded, user_from_row, DbError, USER_COLUMNS};
use crate::models::{hash_plaintext, Scope, Token, User};

#[derive(Clone)]
pub struct TokenStore {
    pool: SqlitePool,
}

impl TokenStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Generate and persist a token. The returned value carries the only
    /// copy of the plaintext.
    pub async fn new_token(&self, user_id: i64, ttl: Duration, scope: Scope) -> Result<Token, DbError> {
        let token = Token::generate(user_id, ttl, scope);
        self.insert(&token).await?;
        Ok(token)
    }

    pub async fn insert(&self, token: &Token) -> Result<(), DbError> {
        bounded(async { insert_token(&self.pool, token).await.map_err(DbError::from) }).await
    }

    /// Owner of an unexpired token of `scope` whose hash matches `plaintext`.
    pub async fn get_for_token(&self, scope: Scope, plaintext: &str) -> Result<User, DbError> {
        let hash = hash_plaintext(plaintext);
        let query = format!(
            r#"SELECT {USER_COLUMNS}
               FROM users
               INNER JOIN tokens ON users.id = tokens.user_id
               WHERE tokens.hash = ? AND tokens.scope = ? AND tokens.expiry > ?"#
        );

        let row = bounded(async {
            sqlx::query(&query)
                .bind(&hash)
                .bind(scope.as_str())
                .bind(Utc::now().timestamp())
                .fetch_optional(&self.pool)
                .await
                .map_err(DbError::from)
        })
        .await?;

        row.as_ref().map(user_from_row).ok_or(DbError::NotFound)
    }

    pub async fn delete_all_for_user(&self, scope: Scope, user_id: i64) -> Result<(), DbError> {
        bounded(async {
            sqlx::query("DELETE FROM tokens WHERE scope = ? AND user_id = ?")
                .bind(scope.as_str())
                .bind(user_id)
                .execute(&self.pool)
                .await
                .map_err(DbError::from)
        })
        .await?;
        Ok(())
    }
}

pub(crate) async fn insert_token<'e, E>(executor: E, token: &Token) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query("INSERT INTO tokens (hash, user_id, expiry, scope) VALUES (?, ?, ?, ?)")
        .bind(&token.hash)
        .bind(token.user_id)
        .bind(token.expiry.timestamp())
        .bind(token.scope.as_str())
        .execute(executor)
        .await?;
    Ok(())
}
