//! Field-level validation accumulator.
//!
//! Errors are keyed by field name. The first error recorded for a field wins.

use std::collections::{BTreeMap, HashSet};
use std::hash::Hash;

use url::Url;

/// Collects validation failures for a single request.
#[derive(Debug, Default, Clone)]
pub struct Validator {
    errors: BTreeMap<String, String>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when no errors have been recorded.
    pub fn valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Record `message` under `field` unless the field already has an error.
    pub fn add_error(&mut self, field: &str, message: &str) {
        self.errors
            .entry(field.to_string())
            .or_insert_with(|| message.to_string());
    }

    /// Record `message` under `field` when `ok` is false.
    pub fn check(&mut self, ok: bool, field: &str, message: &str) {
        if !ok {
            self.add_error(field, message);
        }
    }

    pub fn errors(&self) -> &BTreeMap<String, String> {
        &self.errors
    }

    pub fn into_errors(self) -> BTreeMap<String, String> {
        self.errors
    }
}

/// True when `value` is one of `list`.
pub fn permitted_value<T: PartialEq + ?Sized>(value: &T, list: &[&T]) -> bool {
    list.iter().any(|candidate| *candidate == value)
}

/// True when every element of `values` is distinct.
pub fn unique<T: Eq + Hash>(values: &[T]) -> bool {
    let mut seen = HashSet::with_capacity(values.len());
    values.iter().all(|v| seen.insert(v))
}

/// Minimal structural email check: one `@`, a non-empty local part and a
/// dotted domain without whitespace.
pub fn is_email(value: &str) -> bool {
    if value.len() > 254 || value.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    let labels: Vec<&str> = domain.split('.').collect();
    labels.len() >= 2
        && labels.iter().all(|label| {
            !label.is_empty()
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        })
}

/// Phone numbers: optional leading `+`, then digits with spaces or dashes,
/// between 7 and 15 digits in total.
pub fn is_phone(value: &str) -> bool {
    let rest = value.strip_prefix('+').unwrap_or(value);
    if rest.is_empty() || !rest.chars().all(|c| c.is_ascii_digit() || c == ' ' || c == '-') {
        return false;
    }
    let digits = rest.chars().filter(char::is_ascii_digit).count();
    (7..=15).contains(&digits)
}

/// Absolute http(s) URL with a non-empty host.
pub fn is_web_url(value: &str) -> bool {
    Url::parse(value).is_ok_and(|url| {
        matches!(url.scheme(), "http" | "https") && url.host_str().is_some_and(|h| !h.is_empty())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_validator_is_valid() {
        assert!(Validator::new().valid());
    }

    #[test]
    fn test_check_records_failure() {
        let mut v = Validator::new();
        v.check(true, "page", "must be greater than zero");
        assert!(v.valid());
        v.check(false, "page", "must be greater than zero");
        assert!(!v.valid());
        assert_eq!(v.errors()["page"], "must be greater than zero");
    }

    #[test]
    fn test_first_error_per_field_wins() {
        let mut v = Validator::new();
        v.check(false, "page", "first");
        v.check(false, "page", "second");
        v.add_error("page", "third");
        assert_eq!(v.errors().len(), 1);
        assert_eq!(v.errors()["page"], "first");
    }

    #[test]
    fn test_permitted_value() {
        assert!(permitted_value("id", &["id", "-id"]));
        assert!(!permitted_value("name", &["id", "-id"]));
    }

    #[test]
    fn test_unique() {
        assert!(unique(&["a", "b"]));
        assert!(!unique(&["a", "a"]));
        assert!(unique::<&str>(&[]));
    }

    #[test]
    fn test_is_email() {
        assert!(is_email("alice@example.com"));
        assert!(!is_email("alice@example"));
        assert!(!is_email("@example.com"));
        assert!(!is_email("alice example@example.com"));
        assert!(!is_email("alice@@example.com"));
    }

    #[test]
    fn test_is_phone() {
        assert!(is_phone("+501 822-1234"));
        assert!(is_phone("6221234"));
        assert!(!is_phone("12345"));
        assert!(!is_phone("call me"));
    }

    #[test]
    fn test_is_web_url() {
        assert!(is_web_url("https://ub.edu.bz"));
        assert!(is_web_url("http://example.com/path?q=1"));
        assert!(!is_web_url("ftp://example.com"));
        assert!(!is_web_url("https://"));
    }

    #[test]
    fn test_is_web_url_rejects_malformed_authority() {
        assert!(!is_web_url("http://:80"));
        assert!(!is_web_url("https://@"));
        assert!(!is_web_url("http://a:b:c:d"));
        assert!(!is_web_url("https://[::1"));
        assert!(!is_web_url("https://exa mple.com"));
        assert!(!is_web_url("mailto:office@ub.edu.bz"));
    }
}
