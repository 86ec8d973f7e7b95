//! Quote access object.

use chrono::Utc;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};

use super::{bounded, contains_all, parse_json_array, terms, to_json_array, DbError, TextFilter};
use crate::filters::{Filters, Metadata, SortKey};
use crate::models::{Quote, QuoteSearch, QuoteSort};

#[derive(Clone)]
pub struct QuoteStore {
    pool: SqlitePool,
}

impl QuoteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Persist a new quote, filling in its id, creation time and version.
    pub async fn insert(&self, quote: &mut Quote) -> Result<(), DbError> {
        let created_at = Utc::now();
        let row = bounded(async {
            sqlx::query(
                r#"INSERT INTO quotes (created_at, author, quote_string, category, author_terms, quote_string_terms)
                   VALUES (?, ?, ?, ?, ?, ?)
                   RETURNING id, version"#,
            )
            .bind(created_at)
            .bind(&quote.author)
            .bind(&quote.quote_string)
            .bind(to_json_array(&quote.category))
            .bind(to_json_array(&terms(&quote.author)))
            .bind(to_json_array(&terms(&quote.quote_string)))
            .fetch_one(&self.pool)
            .await
            .map_err(DbError::from)
        })
        .await?;

        quote.id = row.get("id");
        quote.version = row.get("version");
        quote.created_at = created_at;
        Ok(())
    }

    /// Fetch a quote by id. Ids below 1 are rejected without a query.
    pub async fn get(&self, id: i64) -> Result<Quote, DbError> {
        if id < 1 {
            return Err(DbError::NotFound);
        }

        let row = bounded(async {
            sqlx::query(
                "SELECT id, created_at, author, quote_string, category, version FROM quotes WHERE id = ?",
            )
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::from)
        })
        .await?;

        row.as_ref().map(quote_from_row).ok_or(DbError::NotFound)
    }

    /// Write all mutable fields if the stored version still equals
    /// `quote.version`, then bump the version.
    pub async fn update(&self, quote: &mut Quote) -> Result<(), DbError> {
        let row = bounded(async {
            sqlx::query(
                r#"UPDATE quotes
                   SET author = ?, quote_string = ?, category = ?,
                       author_terms = ?, quote_string_terms = ?, version = version + 1
                   WHERE id = ? AND version = ?
                   RETURNING version"#,
            )
            .bind(&quote.author)
            .bind(&quote.quote_string)
            .bind(to_json_array(&quote.category))
            .bind(to_json_array(&terms(&quote.author)))
            .bind(to_json_array(&terms(&quote.quote_string)))
            .bind(quote.id)
            .bind(quote.version)
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::from)
        })
        .await?;

        match row {
            Some(row) => {
                quote.version = row.get("version");
                Ok(())
            }
            None => Err(DbError::EditConflict),
        }
    }

    pub async fn delete(&self, id: i64) -> Result<(), DbError> {
        if id < 1 {
            return Err(DbError::NotFound);
        }

        let result = bounded(async {
            sqlx::query("DELETE FROM quotes WHERE id = ?")
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

    /// One page of quotes matching `search`, with pagination metadata taken
    /// from a window count over the full match set.
    pub async fn get_all(
        &self,
        search: &QuoteSearch,
        filters: &Filters,
    ) -> Result<(Vec<Quote>, Metadata), DbError> {
        let author = TextFilter::parse(&search.author);
        let quote_string = TextFilter::parse(&search.quote_string);
        let (Some(author), Some(quote_string)) =
            (author.required_words(), quote_string.required_words())
        else {
            return Ok((Vec::new(), Metadata::default()));
        };

        let (sort, direction) = filters.sort_key::<QuoteSort>();
        let query = format!(
            r#"SELECT COUNT(*) OVER() AS total_records,
                      q.id, q.created_at, q.author, q.quote_string, q.category, q.version
               FROM quotes q
               WHERE {}
               AND {}
               AND {}
               ORDER BY q.{} {}, q.id ASC
               LIMIT ?4 OFFSET ?5"#,
            contains_all("?1", "q.author_terms"),
            contains_all("?2", "q.quote_string_terms"),
            contains_all("?3", "q.category"),
            sort.column(),
            direction.as_sql(),
        );

        let rows = bounded(async {
            sqlx::query(&query)
                .bind(to_json_array(author))
                .bind(to_json_array(quote_string))
                .bind(to_json_array(&search.category))
                .bind(filters.limit())
                .bind(filters.offset())
                .fetch_all(&self.pool)
                .await
                .map_err(DbError::from)
        })
        .await?;

        let total_records: i64 = rows.first().map(|r| r.get("total_records")).unwrap_or(0);
        let quotes = rows.iter().map(quote_from_row).collect();
        let metadata = Metadata::calculate(total_records, filters.page, filters.page_size);

        Ok((quotes, metadata))
    }
}

fn quote_from_row(row: &SqliteRow) -> Quote {
    let category: String = row.get("category");
    Quote {
        id: row.get("id"),
        created_at: row.get("created_at"),
        author: row.get("author"),
        quote_string: row.get("quote_string"),
        category: parse_json_array(&category),
        version: row.get("version"),
    }
}
