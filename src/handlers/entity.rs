//! Resource handlers: list, create, read, update, delete, restore.

use crate::config::ResolvedEntity;
use crate::error::AppError;
use crate::extractors::WritePayload;
use crate::response::{created, record, records};
use crate::service::{CrudService, ValidationMode};
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;

/// `?only_trashed` / `?with_trashed`; a bare flag or any value except `0`/`false` enables it.
#[derive(Debug, Default, Deserialize)]
pub struct TrashParams {
    only_trashed: Option<String>,
    with_trashed: Option<String>,
}

fn flag(v: &Option<String>) -> bool {
    match v.as_deref() {
        None => false,
        Some(s) => !matches!(s.trim().to_ascii_lowercase().as_str(), "0" | "false"),
    }
}

fn parse_id(id_str: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(id_str).map_err(|_| AppError::BadRequest(format!("invalid id: {}", id_str)))
}

fn entity<'a>(state: &'a AppState, path_segment: &str) -> Result<&'a ResolvedEntity, AppError> {
    state
        .model
        .entity_by_path(path_segment)
        .ok_or_else(|| AppError::NotFound(format!("resource {}", path_segment)))
}

pub async fn list(
    State(state): State<AppState>,
    Path(path_segment): Path<String>,
    Query(params): Query<TrashParams>,
) -> Result<impl IntoResponse, AppError> {
    let entity = entity(&state, &path_segment)?;
    let rows = CrudService::list(&state, entity, flag(&params.only_trashed)).await?;
    Ok(records(rows))
}

pub async fn create(
    State(state): State<AppState>,
    Path(path_segment): Path<String>,
    payload: WritePayload,
) -> Result<impl IntoResponse, AppError> {
    let entity = entity(&state, &path_segment)?;
    let row = CrudService::create(&state, entity, &payload.attributes, payload.files).await?;
    Ok(created(row))
}

pub async fn read(
    State(state): State<AppState>,
    Path((path_segment, id_str)): Path<(String, String)>,
    Query(params): Query<TrashParams>,
) -> Result<impl IntoResponse, AppError> {
    let entity = entity(&state, &path_segment)?;
    let id = parse_id(&id_str)?;
    let row = CrudService::read(&state, entity, id, flag(&params.with_trashed)).await?;
    Ok(record(row))
}

/// PUT: the entity's whole rule set applies.
pub async fn update(
    State(state): State<AppState>,
    Path((path_segment, id_str)): Path<(String, String)>,
    payload: WritePayload,
) -> Result<impl IntoResponse, AppError> {
    write_update(state, path_segment, id_str, payload, ValidationMode::Full).await
}

/// PATCH: only the fields present are validated.
pub async fn patch(
    State(state): State<AppState>,
    Path((path_segment, id_str)): Path<(String, String)>,
    payload: WritePayload,
) -> Result<impl IntoResponse, AppError> {
    write_update(state, path_segment, id_str, payload, ValidationMode::Partial).await
}

async fn write_update(
    state: AppState,
    path_segment: String,
    id_str: String,
    payload: WritePayload,
    mode: ValidationMode,
) -> Result<impl IntoResponse, AppError> {
    let entity = entity(&state, &path_segment)?;
    let id = parse_id(&id_str)?;
    let row = CrudService::update(&state, entity, id, &payload.attributes, payload.files, mode).await?;
    Ok(record(row))
}

pub async fn delete(
    State(state): State<AppState>,
    Path((path_segment, id_str)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let entity = entity(&state, &path_segment)?;
    let id = parse_id(&id_str)?;
    CrudService::delete(&state, entity, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn restore(
    State(state): State<AppState>,
    Path((path_segment, id_str)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let entity = entity(&state, &path_segment)?;
    let id = parse_id(&id_str)?;
    let row = CrudService::restore(&state, entity, id).await?;
    Ok(record(row))
}
