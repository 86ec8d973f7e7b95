//! School API endpoints.

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde_json::json;

use super::{ensure_valid, expected_version, IdParam, JsonBody, QueryParams};
use crate::auth::{RequirePermission, SchoolsRead, SchoolsWrite};
use crate::errors::AppError;
use crate::models::{CreateSchoolRequest, School, SchoolSearch, SchoolSort, UpdateSchoolRequest};
use crate::validator::Validator;
use crate::AppState;

/// GET /v1/schools
pub async fn list_schools(
    State(state): State<AppState>,
    _auth: RequirePermission<SchoolsRead>,
    query: QueryParams,
) -> Result<impl IntoResponse, AppError> {
    let mut v = Validator::new();
    let search = SchoolSearch {
        name: query.read_string("name", ""),
        level: query.read_string("level", ""),
        mode: query.read_csv("mode"),
    };
    let filters = query.read_filters(&mut v);
    filters.validate::<SchoolSort>(&mut v);
    ensure_valid(v)?;

    let (schools, metadata) = state.repo.schools.get_all(&search, &filters).await?;
    Ok(Json(json!({ "schools": schools, "metadata": metadata })))
}

/// POST /v1/schools
pub async fn create_school(
    State(state): State<AppState>,
    auth: RequirePermission<SchoolsWrite>,
    JsonBody(request): JsonBody<CreateSchoolRequest>,
) -> Result<impl IntoResponse, AppError> {
    let mut school = School::from(request);

    let mut v = Validator::new();
    school.validate(&mut v);
    ensure_valid(v)?;

    state.repo.schools.insert(&mut school).await?;
    tracing::info!(school_id = school.id, user_id = auth.user.id, "school created");

    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, format!("/v1/schools/{}", school.id))],
        Json(json!({ "school": school })),
    ))
}

/// GET /v1/schools/{id}
pub async fn show_school(
    State(state): State<AppState>,
    _auth: RequirePermission<SchoolsRead>,
    IdParam(id): IdParam,
) -> Result<impl IntoResponse, AppError> {
    let school = state.repo.schools.get(id).await?;
    Ok(Json(json!({ "school": school })))
}

/// PATCH /v1/schools/{id}
pub async fn update_school(
    State(state): State<AppState>,
    auth: RequirePermission<SchoolsWrite>,
    IdParam(id): IdParam,
    headers: HeaderMap,
    JsonBody(request): JsonBody<UpdateSchoolRequest>,
) -> Result<impl IntoResponse, AppError> {
    let expected = expected_version(&headers)?;
    let mut school = state.repo.schools.get(id).await?;
    if expected.is_some_and(|version| version != school.version) {
        return Err(AppError::EditConflict);
    }

    request.apply(&mut school);

    let mut v = Validator::new();
    school.validate(&mut v);
    ensure_valid(v)?;

    state.repo.schools.update(&mut school).await?;
    tracing::info!(
        school_id = school.id,
        version = school.version,
        user_id = auth.user.id,
        "school updated"
    );
    Ok(Json(json!({ "school": school })))
}

/// DELETE /v1/schools/{id}
pub async fn delete_school(
    State(state): State<AppState>,
    auth: RequirePermission<SchoolsWrite>,
    IdParam(id): IdParam,
) -> Result<impl IntoResponse, AppError> {
    state.repo.schools.delete(id).await?;
    tracing::info!(school_id = id, user_id = auth.user.id, "school deleted");
    Ok(Json(json!({ "message": "school successfully deleted" })))
}
