//! School access object.

use chrono::Utc;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};

use super::{bounded, contains_all, parse_json_array, terms, to_json_array, DbError, TextFilter};
use crate::filters::{Filters, Metadata, SortKey};
use crate::models::{School, SchoolSearch, SchoolSort};

const SCHOOL_COLUMNS: &str =
    "id, created_at, name, level, contact, phone, email, website, address, mode, version";

#[derive(Clone)]
pub struct SchoolStore {
    pool: SqlitePool,
}

impl SchoolStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, school: &mut School) -> Result<(), DbError> {
        let created_at = Utc::now();
        let row = bounded(async {
            sqlx::query(
                r#"INSERT INTO schools (created_at, name, level, contact, phone, email, website, address, mode, name_terms, level_terms)
                   VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                   RETURNING id, version"#,
            )
            .bind(created_at)
            .bind(&school.name)
            .bind(&school.level)
            .bind(&school.contact)
            .bind(&school.phone)
            .bind(&school.email)
            .bind(&school.website)
            .bind(&school.address)
            .bind(to_json_array(&school.mode))
            .bind(to_json_array(&terms(&school.name)))
            .bind(to_json_array(&terms(&school.level)))
            .fetch_one(&self.pool)
            .await
            .map_err(DbError::from)
        })
        .await?;

        school.id = row.get("id");
        school.version = row.get("version");
        school.created_at = created_at;
        Ok(())
    }

    pub async fn get(&self, id: i64) -> Result<School, DbError> {
        if id < 1 {
            return Err(DbError::NotFound);
        }

        let query = format!("SELECT {SCHOOL_COLUMNS} FROM schools WHERE id = ?");
        let row = bounded(async {
            sqlx::query(&query)
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(DbError::from)
        })
        .await?;

        row.as_ref().map(school_from_row).ok_or(DbError::NotFound)
    }

    /// Compare-and-swap on `school.version`.
    pub async fn update(&self, school: &mut School) -> Result<(), DbError> {
        let row = bounded(async {
            sqlx::query(
                r#"UPDATE schools
                   SET name = ?, level = ?, contact = ?, phone = ?, email = ?, website = ?,
                       address = ?, mode = ?, name_terms = ?, level_terms = ?, version = version + 1
                   WHERE id = ? AND version = ?
                   RETURNING version"#,
            )
            .bind(&school.name)
            .bind(&school.level)
            .bind(&school.contact)
            .bind(&school.phone)
            .bind(&school.email)
            .bind(&school.website)
            .bind(&school.address)
            .bind(to_json_array(&school.mode))
            .bind(to_json_array(&terms(&school.name)))
            .bind(to_json_array(&terms(&school.level)))
            .bind(school.id)
            .bind(school.version)
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::from)
        })
        .await?;

        let row = row.ok_or(DbError::EditConflict)?;
        school.version = row.get("version");
        Ok(())
    }

    pub async fn delete(&self, id: i64) -> Result<(), DbError> {
        if id < 1 {
            return Err(DbError::NotFound);
        }

        let result = bounded(async {
            sqlx::query("DELETE FROM schools WHERE id = ?")
                .bind(id)
                .execute(&self.pool)
                .await
                .map_err(DbError::from)
        })
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }

    pub async fn get_all(
        &self,
        search: &SchoolSearch,
        filters: &Filters,
    ) -> Result<(Vec<School>, Metadata), DbError> {
        let name = TextFilter::parse(&search.name);
        let level = TextFilter::parse(&search.level);
        let (Some(name), Some(level)) = (name.required_words(), level.required_words()) else {
            return Ok((Vec::new(), Metadata::default()));
        };

        let (sort, direction) = filters.sort_key::<SchoolSort>();
        let query = format!(
            r#"SELECT COUNT(*) OVER() AS total_records, {}
               FROM schools s
               WHERE {}
               AND {}
               AND {}
               ORDER BY s.{} {}, s.id ASC
               LIMIT ?4 OFFSET ?5"#,
            SCHOOL_COLUMNS
                .split(", ")
                .map(|c| format!("s.{c}"))
                .collect::<Vec<_>>()
                .join(", "),
            contains_all("?1", "s.name_terms"),
            contains_all("?2", "s.level_terms"),
            contains_all("?3", "s.mode"),
            sort.column(),
            direction.as_sql(),
        );

        let rows = bounded(async {
            sqlx::query(&query)
                .bind(to_json_array(name))
                .bind(to_json_array(level))
                .bind(to_json_array(&search.mode))
                .bind(filters.limit())
                .bind(filters.offset())
                .fetch_all(&self.pool)
                .await
                .map_err(DbError::from)
        })
        .await?;

        let total_records: i64 = rows.first().map(|r| r.get("total_records")).unwrap_or(0);
        let schools = rows.iter().map(school_from_row).collect();

        Ok((
            schools,
            Metadata::calculate(total_records, filters.page, filters.page_size),
        ))
    }
}

fn school_from_row(row: &SqliteRow) -> School {
    let mode: String = row.get("mode");
    School {
        id: row.get("id"),
        created_at: row.get("created_at"),
        name: row.get("name"),
        level: row.get("level"),
        contact: row.get("contact"),
        phone: row.get("phone"),
        email: row.get("email"),
        website: row.get("website"),
        address: row.get("address"),
        mode: parse_json_array(&mode),
        version: row.get("version"),
    }
}
