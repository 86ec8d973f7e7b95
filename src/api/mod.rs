//! REST API module.
//!
//! Handlers for the `/v1` routes plus the request extractors they share.

mod healthcheck;
mod quotes;
mod schools;
mod tokens;
mod users;

pub use healthcheck::*;
pub use quotes::*;
pub use schools::*;
pub use tokens::*;
pub use users::*;

use std::collections::HashMap;

use axum::{
    body::Bytes,
    extract::{FromRequest, FromRequestParts, Path, Query, Request},
    http::{request::Parts, HeaderMap, StatusCode},
};
use serde::de::DeserializeOwned;
use serde_json::error::Category;

use crate::errors::AppError;
use crate::filters::{Filters, DEFAULT_PAGE, DEFAULT_PAGE_SIZE, DEFAULT_SORT};
use crate::validator::Validator;

/// Largest request body accepted, in bytes.
pub const MAX_BODY_BYTES: usize = 1_048_576;

/// Header carrying the version a client expects to be replacing.
pub const EXPECTED_VERSION_HEADER: &str = "x-expected-version";

/// JSON request body. Decoding failures become 400s with a message the
/// client can act on.
pub struct JsonBody<T>(pub T);

impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state).await.map_err(|rejection| {
            if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
                AppError::MalformedRequest(format!(
                    "body must not be larger than {MAX_BODY_BYTES} bytes"
                ))
            } else {
                AppError::MalformedRequest(rejection.body_text())
            }
        })?;

        decode_json(&bytes).map(JsonBody)
    }
}

fn decode_json<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, AppError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(AppError::MalformedRequest("body must not be empty".to_string()));
    }

    serde_json::from_slice(bytes).map_err(|err| AppError::MalformedRequest(describe_json_error(&err)))
}

fn describe_json_error(err: &serde_json::Error) -> String {
    let message = err.to_string();
    match err.classify() {
        Category::Eof => "body contains badly-formed JSON".to_string(),
        Category::Syntax if message.starts_with("trailing characters") => {
            "body must only contain a single JSON value".to_string()
        }
        Category::Syntax => format!(
            "body contains badly-formed JSON (at line {}, column {})",
            err.line(),
            err.column()
        ),
        Category::Data if message.starts_with("unknown field") => {
            let field = message.split('`').nth(1).unwrap_or_default();
            format!("body contains unknown key \"{field}\"")
        }
        Category::Data if message.starts_with("invalid type") => format!(
            "body contains incorrect JSON type (at line {}, column {})",
            err.line(),
            err.column()
        ),
        Category::Data | Category::Io => format!("body contains invalid JSON: {message}"),
    }
}

/// Query string parameters, with the lenient readers the listing handlers use.
pub struct QueryParams(HashMap<String, String>);

impl<S: Send + Sync> FromRequestParts<S> for QueryParams {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(params) = Query::<HashMap<String, String>>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| AppError::MalformedRequest(rejection.body_text()))?;
        Ok(QueryParams(params))
    }
}

impl QueryParams {
    fn present(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str).filter(|v| !v.is_empty())
    }

    pub fn read_string(&self, key: &str, default: &str) -> String {
        self.present(key).unwrap_or(default).to_string()
    }

    /// Comma separated list. Empty segments are dropped.
    pub fn read_csv(&self, key: &str) -> Vec<String> {
        self.present(key)
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Integer parameter. A value that does not parse records an error
    /// under `key` and yields `default`.
    pub fn read_int(&self, key: &str, default: i64, v: &mut Validator) -> i64 {
        match self.present(key) {
            None => default,
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                v.add_error(key, "must be an integer value");
                default
            }),
        }
    }

    /// Pagination and sort parameters, unvalidated.
    pub fn read_filters(&self, v: &mut Validator) -> Filters {
        Filters {
            page: self.read_int("page", DEFAULT_PAGE, v),
            page_size: self.read_int("page_size", DEFAULT_PAGE_SIZE, v),
            sort: self.read_string("sort", DEFAULT_SORT),
        }
    }
}

/// The `{id}` path segment. Anything that is not a positive integer is
/// reported as a missing resource.
pub struct IdParam(pub i64);

impl<S: Send + Sync> FromRequestParts<S> for IdParam {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|_| AppError::NotFound)?;

        match raw.parse::<i64>() {
            Ok(id) if id >= 1 => Ok(IdParam(id)),
            _ => Err(AppError::NotFound),
        }
    }
}

/// Version named by the `X-Expected-Version` header, if sent.
pub fn expected_version(headers: &HeaderMap) -> Result<Option<i64>, AppError> {
    let Some(value) = headers.get(EXPECTED_VERSION_HEADER) else {
        return Ok(None);
    };

    value
        .to_str()
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .map(Some)
        .ok_or_else(|| {
            AppError::MalformedRequest("X-Expected-Version header must be an integer".to_string())
        })
}

/// Stop if the validator collected any errors.
pub fn ensure_valid(v: Validator) -> Result<(), AppError> {
    if v.valid() {
        return Ok(());
    }

    tracing::debug!(fields = ?v.errors().keys().collect::<Vec<_>>(), "validation failed");
    Err(AppError::Validation(v.into_errors()))
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Deserialize)]
    #[serde(deny_unknown_fields)]
    #[allow(dead_code)]
    struct Input {
        #[serde(default)]
        name: String,
        #[serde(default)]
        tags: Vec<String>,
    }

    fn decode_message(body: &str) -> String {
        match decode_json::<Input>(body.as_bytes()) {
            Err(AppError::MalformedRequest(msg)) => msg,
            other => panic!("expected malformed request, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_error_messages() {
        assert_eq!(decode_message(""), "body must not be empty");
        assert_eq!(decode_message("  \n"), "body must not be empty");
        assert_eq!(decode_message(r#"{"name": "a""#), "body contains badly-formed JSON");
        assert!(decode_message(r#"{"name": "a",}"#).starts_with("body contains badly-formed JSON (at line 1"));
        assert_eq!(
            decode_message(r#"{"name": "a"} {"name": "b"}"#),
            "body must only contain a single JSON value"
        );
        assert_eq!(
            decode_message(r#"{"nickname": "a"}"#),
            r#"body contains unknown key "nickname""#
        );
        assert!(decode_message(r#"{"name": 42}"#).starts_with("body contains incorrect JSON type"));
    }

    #[test]
    fn test_decode_success() {
        let input: Input = decode_json(br#"{"name": "a", "tags": ["x"]}"#).unwrap();
        assert_eq!(input.name, "a");
        assert_eq!(input.tags, vec!["x"]);
    }

    fn params(pairs: &[(&str, &str)]) -> QueryParams {
        QueryParams(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn test_query_readers() {
        let qs = params(&[
            ("author", "Seneca"),
            ("category", "life, death,,"),
            ("page", "3"),
            ("page_size", "ten"),
            ("sort", ""),
        ]);
        let mut v = Validator::new();

        assert_eq!(qs.read_string("author", ""), "Seneca");
        assert_eq!(qs.read_string("missing", "fallback"), "fallback");
        assert_eq!(qs.read_csv("category"), vec!["life", "death"]);
        assert!(qs.read_csv("missing").is_empty());

        let filters = qs.read_filters(&mut v);
        assert_eq!(filters.page, 3);
        assert_eq!(filters.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(filters.sort, DEFAULT_SORT);
        assert_eq!(v.errors()["page_size"], "must be an integer value");
    }

    #[test]
    fn test_expected_version_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(expected_version(&headers).unwrap(), None);

        headers.insert(EXPECTED_VERSION_HEADER, HeaderValue::from_static("4"));
        assert_eq!(expected_version(&headers).unwrap(), Some(4));

        headers.insert(EXPECTED_VERSION_HEADER, HeaderValue::from_static("four"));
        assert!(matches!(
            expected_version(&headers),
            Err(AppError::MalformedRequest(_))
        ));
    }
}
