//! Pagination and sorting for list endpoints.
//!
//! The `sort` query parameter is only ever turned into SQL through a
//! resource-specific [`SortKey`] enum resolved from its safelist.

use serde::Serialize;

use crate::validator::{permitted_value, Validator};

pub const MAX_PAGE: i64 = 1000;
pub const MAX_PAGE_SIZE: i64 = 100;
pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const DEFAULT_SORT: &str = "id";

/// A column a resource may be ordered by.
pub trait SortKey: Copy {
    /// Every accepted value of the `sort` parameter, including `-` variants.
    const SAFELIST: &'static [&'static str];

    /// Map an ascending safelist entry to its key.
    fn from_column(column: &str) -> Option<Self>;

    /// SQL column name.
    fn column(self) -> &'static str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// Raw listing parameters as read from the query string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filters {
    pub page: i64,
    pub page_size: i64,
    pub sort: String,
}

impl Default for Filters {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            page_size: DEFAULT_PAGE_SIZE,
            sort: DEFAULT_SORT.to_string(),
        }
    }
}

impl Filters {
    /// Record range and safelist violations. Nothing is corrected silently.
    pub fn validate<S: SortKey>(&self, v: &mut Validator) {
        v.check(self.page > 0, "page", "must be greater than zero");
        v.check(self.page <= MAX_PAGE, "page", "must be a maximum of 1000");
        v.check(self.page_size > 0, "page_size", "must be greater than zero");
        v.check(
            self.page_size <= MAX_PAGE_SIZE,
            "page_size",
            "must be a maximum of 100",
        );
        v.check(
            permitted_value(self.sort.as_str(), S::SAFELIST),
            "sort",
            "invalid sort value",
        );
    }

    /// Resolve the sort key and direction from the safelist.
    ///
    /// # Panics
    ///
    /// Panics if `sort` is not in the safelist. [`Filters::validate`] must
    /// have rejected such input before a query is built.
    pub fn sort_key<S: SortKey>(&self) -> (S, SortDirection) {
        let safe = S::SAFELIST
            .iter()
            .find(|safe| **safe == self.sort)
            .and_then(|safe| S::from_column(safe.trim_start_matches('-')));

        match safe {
            Some(key) => (key, self.sort_direction()),
            None => panic!("unsafe sort parameter: {}", self.sort),
        }
    }

    pub fn sort_direction(&self) -> SortDirection {
        if self.sort.starts_with('-') {
            SortDirection::Desc
        } else {
            SortDirection::Asc
        }
    }

    pub fn limit(&self) -> i64 {
        self.page_size
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.page_size
    }
}

/// Pagination summary returned next to a page of records.
///
/// All fields are zero when the listing matched nothing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Metadata {
    #[serde(skip_serializing_if = "is_zero")]
    pub current_page: i64,
    #[serde(skip_serializing_if = "is_zero")]
    pub page_size: i64,
    #[serde(skip_serializing_if = "is_zero")]
    pub first_page: i64,
    #[serde(skip_serializing_if = "is_zero")]
    pub last_page: i64,
    #[serde(skip_serializing_if = "is_zero")]
    pub total_records: i64,
}

fn is_zero(value: &i64) -> bool {
    *value == 0
}

impl Metadata {
    pub fn calculate(total_records: i64, page: i64, page_size: i64) -> Self {
        if total_records == 0 {
            return Self::default();
        }

        Self {
            current_page: page,
            page_size,
            first_page: 1,
            last_page: (total_records + page_size - 1) / page_size,
            total_records,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum TestSort {
        Id,
        Title,
    }

    impl SortKey for TestSort {
        const SAFELIST: &'static [&'static str] = &["id", "title", "-id", "-title"];

        fn from_column(column: &str) -> Option<Self> {
            match column {
                "id" => Some(TestSort::Id),
                "title" => Some(TestSort::Title),
                _ => None,
            }
        }

        fn column(self) -> &'static str {
            match self {
                TestSort::Id => "id",
                TestSort::Title => "title",
            }
        }
    }

    fn filters(page: i64, page_size: i64, sort: &str) -> Filters {
        Filters {
            page,
            page_size,
            sort: sort.to_string(),
        }
    }

    #[test]
    fn test_default_filters_are_valid() {
        let mut v = Validator::new();
        Filters::default().validate::<TestSort>(&mut v);
        assert!(v.valid());
    }

    #[test]
    fn test_limit_and_offset_across_range() {
        for page in [1, 2, 7, 500, 1000] {
            for page_size in [1, 5, 20, 100] {
                let f = filters(page, page_size, "id");
                let mut v = Validator::new();
                f.validate::<TestSort>(&mut v);
                assert!(v.valid());
                assert_eq!(f.limit(), page_size);
                assert_eq!(f.offset(), (page - 1) * page_size);
            }
        }
    }

    #[test]
    fn test_page_bounds() {
        let mut v = Validator::new();
        filters(0, 20, "id").validate::<TestSort>(&mut v);
        assert_eq!(v.errors()["page"], "must be greater than zero");

        let mut v = Validator::new();
        filters(1001, 20, "id").validate::<TestSort>(&mut v);
        assert_eq!(v.errors()["page"], "must be a maximum of 1000");
    }

    #[test]
    fn test_page_size_bounds() {
        let mut v = Validator::new();
        filters(1, 0, "id").validate::<TestSort>(&mut v);
        assert_eq!(v.errors()["page_size"], "must be greater than zero");

        let mut v = Validator::new();
        filters(1, 101, "id").validate::<TestSort>(&mut v);
        assert_eq!(v.errors()["page_size"], "must be a maximum of 100");
    }

    #[test]
    fn test_sort_outside_safelist_is_rejected() {
        for sort in ["", "name", "id;DROP TABLE quotes", "--id", " id", "ID"] {
            let mut v = Validator::new();
            filters(1, 20, sort).validate::<TestSort>(&mut v);
            assert_eq!(v.errors()["sort"], "invalid sort value", "sort={sort:?}");
        }
    }

    #[test]
    fn test_sort_key_resolution() {
        assert_eq!(
            filters(1, 20, "title").sort_key::<TestSort>(),
            (TestSort::Title, SortDirection::Asc)
        );
        assert_eq!(
            filters(1, 20, "-id").sort_key::<TestSort>(),
            (TestSort::Id, SortDirection::Desc)
        );
        assert_eq!(TestSort::Title.column(), "title");
    }

    #[test]
    #[should_panic(expected = "unsafe sort parameter")]
    fn test_sort_key_panics_on_unvalidated_input() {
        filters(1, 20, "title DESC; --").sort_key::<TestSort>();
    }

    #[test]
    fn test_metadata_empty_result() {
        assert_eq!(Metadata::calculate(0, 3, 50), Metadata::default());
        let json = serde_json::to_value(Metadata::calculate(0, 1, 20)).unwrap();
        assert_eq!(json, serde_json::json!({}));
    }

    #[test]
    fn test_metadata_last_page_rounds_up() {
        let m = Metadata::calculate(17, 2, 5);
        assert_eq!(m.current_page, 2);
        assert_eq!(m.page_size, 5);
        assert_eq!(m.first_page, 1);
        assert_eq!(m.last_page, 4);
        assert_eq!(m.total_records, 17);
    }

    #[test]
    fn test_metadata_exact_division() {
        assert_eq!(Metadata::calculate(20, 1, 5).last_page, 4);
        assert_eq!(Metadata::calculate(1, 1, 100).last_page, 1);
    }
}
