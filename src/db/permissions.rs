//! Permission access object.

use sqlx::{Row, SqliteConnection, SqlitePool};

use super::{bounded, DbError};

/// Permission codes held by one user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Permissions(Vec<String>);

impl Permissions {
    /// Exact membership; there are no wildcards or hierarchies.
    pub fn include(&self, code: &str) -> bool {
        self.0.iter().any(|c| c == code)
    }
}

impl From<Vec<String>> for Permissions {
    fn from(codes: Vec<String>) -> Self {
        Self(codes)
    }
}

#[derive(Clone)]
pub struct PermissionStore {
    pool: SqlitePool,
}

impl PermissionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get_all_for_user(&self, user_id: i64) -> Result<Permissions, DbError> {
        let rows = bounded(async {
            sqlx::query(
                r#"SELECT permissions.code
                   FROM permissions
                   INNER JOIN users_permissions ON users_permissions.permission_id = permissions.id
                   WHERE users_permissions.user_id = ?
                   ORDER BY permissions.code"#,
            )
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(DbError::from)
        })
        .await?;

        Ok(Permissions(rows.iter().map(|r| r.get("code")).collect()))
    }
}

/// Grant `codes` to a user. Unknown codes are ignored and codes already
/// held are left as they are.
pub(crate) async fn grant(
    conn: &mut SqliteConnection,
    user_id: i64,
    codes: &[&str],
) -> Result<(), sqlx::Error> {
    for code in codes {
        sqlx::query(
            r#"INSERT OR IGNORE INTO users_permissions (user_id, permission_id)
               SELECT ?, id FROM permissions WHERE code = ?"#,
        )
        .bind(user_id)
        .bind(code)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_membership_is_exact() {
        let perms = Permissions::from(vec!["quotes:read".to_string()]);
        assert!(perms.include("quotes:read"));
        assert!(!perms.include("quotes:write"));
        assert!(!perms.include("quotes:*"));
        assert!(!perms.include("quotes"));
    }
}
