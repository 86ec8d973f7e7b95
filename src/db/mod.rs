//! Database module for SQLite persistence.
//!
//! Every store call is bounded by [`QUERY_TIMEOUT`].

mod permissions;
mod quotes;
mod schools;
mod search;
mod tokens;
mod users;

pub use permissions::*;
pub use quotes::*;
pub use schools::*;
pub use search::*;
pub use tokens::*;
pub use users::*;

use std::future::Future;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

/// Upper bound for a single store operation.
pub const QUERY_TIMEOUT: Duration = Duration::from_secs(3);

/// Errors surfaced by the store layer.
#[derive(Debug)]
pub enum DbError {
    /// No row matched
    NotFound,
    /// Version check failed or the row vanished during an update
    EditConflict,
    /// Email already registered
    DuplicateEmail,
    /// Operation exceeded [`QUERY_TIMEOUT`]
    Timeout,
    /// Driver or connectivity failure
    Sqlx(sqlx::Error),
}

impl std::fmt::Display for DbError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DbError::NotFound => write!(f, "record not found"),
            DbError::EditConflict => write!(f, "edit conflict"),
            DbError::DuplicateEmail => write!(f, "duplicate email"),
            DbError::Timeout => write!(f, "database operation timed out after {:?}", QUERY_TIMEOUT),
            DbError::Sqlx(err) => write!(f, "database error: {}", err),
        }
    }
}

impl std::error::Error for DbError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DbError::Sqlx(err) => Some(err),
            _ => None,
        }
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound,
            other => DbError::Sqlx(other),
        }
    }
}

/// Run `operation` under [`QUERY_TIMEOUT`].
pub(crate) async fn bounded<T, F>(operation: F) -> Result<T, DbError>
where
    F: Future<Output = Result<T, DbError>>,
{
    tokio::time::timeout(QUERY_TIMEOUT, operation)
        .await
        .map_err(|_| DbError::Timeout)?
}

/// Access objects for every table, sharing one pool.
#[derive(Clone)]
pub struct Repository {
    pub quotes: QuoteStore,
    pub schools: SchoolStore,
    pub users: UserStore,
    pub tokens: TokenStore,
    pub permissions: PermissionStore,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            quotes: QuoteStore::new(pool.clone()),
            schools: SchoolStore::new(pool.clone()),
            users: UserStore::new(pool.clone()),
            tokens: TokenStore::new(pool.clone()),
            permissions: PermissionStore::new(pool),
        }
    }
}

/// Initialize the database connection pool and run migrations.
pub async fn init_database(db_path: &Path) -> Result<SqlitePool, sqlx::Error> {
    // Ensure the parent directory exists
    if let Some(parent) = db_path.parent() {
        tokio::fs::create_dir_all(parent).await.ok();
    }

    let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

    let options = SqliteConnectOptions::from_str(&db_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
        .busy_timeout(QUERY_TIMEOUT);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .acquire_timeout(QUERY_TIMEOUT)
        .connect_with(options)
        .await?;

    // Run embedded migrations
    run_migrations(&pool).await?;

    Ok(pool)
}

/// Run database migrations.
async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS quotes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            created_at TEXT NOT NULL,
            author TEXT NOT NULL,
            quote_string TEXT NOT NULL,
            category TEXT NOT NULL DEFAULT '[]',
            author_terms TEXT NOT NULL DEFAULT '[]',
            quote_string_terms TEXT NOT NULL DEFAULT '[]',
            version INTEGER NOT NULL DEFAULT 1
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schools (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            created_at TEXT NOT NULL,
            name TEXT NOT NULL,
            level TEXT NOT NULL,
            contact TEXT NOT NULL,
            phone TEXT NOT NULL,
            email TEXT NOT NULL,
            website TEXT NOT NULL DEFAULT '',
            address TEXT NOT NULL,
            mode TEXT NOT NULL DEFAULT '[]',
            name_terms TEXT NOT NULL DEFAULT '[]',
            level_terms TEXT NOT NULL DEFAULT '[]',
            version INTEGER NOT NULL DEFAULT 1
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            created_at TEXT NOT NULL,
            name TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE COLLATE NOCASE,
            password_hash TEXT NOT NULL,
            activated INTEGER NOT NULL DEFAULT 0,
            version INTEGER NOT NULL DEFAULT 1
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tokens (
            hash BLOB PRIMARY KEY,
            user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            expiry INTEGER NOT NULL,
            scope TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS permissions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            code TEXT NOT NULL UNIQUE
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users_permissions (
            user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            permission_id INTEGER NOT NULL REFERENCES permissions(id) ON DELETE CASCADE,
            PRIMARY KEY (user_id, permission_id)
        );
        "#,
    )
    .execute(pool)
    .await?;

    for code in crate::models::permissions::ALL {
        sqlx::query("INSERT OR IGNORE INTO permissions (code) VALUES (?)")
            .bind(code)
            .execute(pool)
            .await?;
    }

    // Create indexes for common queries
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_quotes_author ON quotes(author);
        CREATE INDEX IF NOT EXISTS idx_schools_name ON schools(name);
        CREATE INDEX IF NOT EXISTS idx_tokens_user_scope ON tokens(user_id, scope);
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

fn to_json_array(values: &[String]) -> String {
    serde_json::to_string(values).unwrap_or_else(|_| "[]".to_string())
}

fn parse_json_array(s: &str) -> Vec<String> {
    serde_json::from_str(s).unwrap_or_default()
}
