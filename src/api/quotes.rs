//! Quote API endpoints.

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde_json::json;

use super::{ensure_valid, expected_version, IdParam, JsonBody, QueryParams};
use crate::auth::{QuotesRead, QuotesWrite, RequirePermission};
use crate::errors::AppError;
use crate::models::{CreateQuoteRequest, Quote, QuoteSearch, QuoteSort, UpdateQuoteRequest};
use crate::validator::Validator;
use crate::AppState;

/// GET /v1/quotes - List quotes matching the search criteria.
pub async fn list_quotes(
    State(state): State<AppState>,
    _auth: RequirePermission<QuotesRead>,
    query: QueryParams,
) -> Result<impl IntoResponse, AppError> {
    let mut v = Validator::new();
    let search = QuoteSearch {
        author: query.read_string("author", ""),
        quote_string: query.read_string("quote_string", ""),
        category: query.read_csv("category"),
    };
    let filters = query.read_filters(&mut v);
    filters.validate::<QuoteSort>(&mut v);
    ensure_valid(v)?;

    let (quotes, metadata) = state.repo.quotes.get_all(&search, &filters).await?;
    Ok(Json(json!({ "quotes": quotes, "metadata": metadata })))
}

/// POST /v1/quotes - Create a quote.
pub async fn create_quote(
    State(state): State<AppState>,
    auth: RequirePermission<QuotesWrite>,
    JsonBody(request): JsonBody<CreateQuoteRequest>,
) -> Result<impl IntoResponse, AppError> {
    let mut quote = Quote::new(request.author, request.quote_string, request.category);

    let mut v = Validator::new();
    quote.validate(&mut v);
    ensure_valid(v)?;

    state.repo.quotes.insert(&mut quote).await?;
    tracing::info!(quote_id = quote.id, user_id = auth.user.id, "quote created");

    let location = format!("/v1/quotes/{}", quote.id);
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(json!({ "quote": quote })),
    ))
}

/// GET /v1/quotes/{id} - Show one quote.
pub async fn show_quote(
    State(state): State<AppState>,
    _auth: RequirePermission<QuotesRead>,
    IdParam(id): IdParam,
) -> Result<impl IntoResponse, AppError> {
    let quote = state.repo.quotes.get(id).await?;
    Ok(Json(json!({ "quote": quote })))
}

/// PATCH /v1/quotes/{id} - Partially update a quote.
pub async fn update_quote(
    State(state): State<AppState>,
    auth: RequirePermission<QuotesWrite>,
    IdParam(id): IdParam,
    headers: HeaderMap,
    JsonBody(request): JsonBody<UpdateQuoteRequest>,
) -> Result<impl IntoResponse, AppError> {
    let expected = expected_version(&headers)?;
    let mut quote = state.repo.quotes.get(id).await?;
    if expected.is_some_and(|version| version != quote.version) {
        return Err(AppError::EditConflict);
    }

    request.apply(&mut quote);

    let mut v = Validator::new();
    quote.validate(&mut v);
    ensure_valid(v)?;

    state.repo.quotes.update(&mut quote).await?;
    tracing::info!(
        quote_id = quote.id,
        version = quote.version,
        user_id = auth.user.id,
        "quote updated"
    );
    Ok(Json(json!({ "quote": quote })))
}

/// DELETE /v1/quotes/{id} - Delete a quote.
pub async fn delete_quote(
    State(state): State<AppState>,
    auth: RequirePermission<QuotesWrite>,
    IdParam(id): IdParam,
) -> Result<impl IntoResponse, AppError> {
    state.repo.quotes.delete(id).await?;
    tracing::info!(quote_id = id, user_id = auth.user.id, "quote deleted");
    Ok(Json(json!({ "message": "quote successfully deleted" })))
}
