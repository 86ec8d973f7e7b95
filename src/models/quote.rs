//! Quote model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::filters::SortKey;
use crate::validator::{unique, Validator};

/// A quote attributed to an author, tagged with one or more categories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Quote {
    pub id: i64,
    #[serde(skip)]
    pub created_at: DateTime<Utc>,
    pub author: String,
    pub quote_string: String,
    pub category: Vec<String>,
    pub version: i64,
}

impl Quote {
    pub fn new(author: String, quote_string: String, category: Vec<String>) -> Self {
        Self {
            id: 0,
            created_at: Utc::now(),
            author,
            quote_string,
            category,
            version: 1,
        }
    }

    pub fn validate(&self, v: &mut Validator) {
        v.check(!self.author.is_empty(), "author", "must be provided");
        v.check(
            self.author.len() <= 200,
            "author",
            "must not be more than 200 bytes long",
        );

        v.check(!self.quote_string.is_empty(), "quote_string", "must be provided");
        v.check(
            self.quote_string.len() <= 200,
            "quote_string",
            "must not be more than 200 bytes long",
        );

        v.check(
            !self.category.is_empty(),
            "category",
            "must contain at least one entry",
        );
        v.check(
            self.category.len() <= 5,
            "category",
            "must contain at most five entries",
        );
        v.check(
            unique(&self.category),
            "category",
            "must not contain duplicate entries",
        );
    }
}

/// Request body for creating a quote.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateQuoteRequest {
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub quote_string: String,
    #[serde(default)]
    pub category: Vec<String>,
}

/// Request body for a partial quote update. Absent fields keep their value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateQuoteRequest {
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub quote_string: Option<String>,
    #[serde(default)]
    pub category: Option<Vec<String>>,
}

impl UpdateQuoteRequest {
    pub fn apply(self, quote: &mut Quote) {
        if let Some(author) = self.author {
            quote.author = author;
        }
        if let Some(quote_string) = self.quote_string {
            quote.quote_string = quote_string;
        }
        if let Some(category) = self.category {
            quote.category = category;
        }
    }
}

/// Search criteria for the quote listing.
#[derive(Debug, Clone, Default)]
pub struct QuoteSearch {
    pub author: String,
    pub quote_string: String,
    pub category: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteSort {
    Id,
    Author,
    QuoteString,
}

impl SortKey for QuoteSort {
    const SAFELIST: &'static [&'static str] = &[
        "id",
        "author",
        "quote_string",
        "-id",
        "-author",
        "-quote_string",
    ];

    fn from_column(column: &str) -> Option<Self> {
        match column {
            "id" => Some(QuoteSort::Id),
            "author" => Some(QuoteSort::Author),
            "quote_string" => Some(QuoteSort::QuoteString),
            _ => None,
        }
    }

    fn column(self) -> &'static str {
        match self {
            QuoteSort::Id => "id",
            QuoteSort::Author => "author",
            QuoteSort::QuoteString => "quote_string",
        }
    }
}
