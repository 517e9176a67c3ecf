use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::Identity;
use crate::error::AppError;
use crate::models::{Event, EventPatch, NewEvent};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    client_id: Option<String>,
}

impl EventsQuery {
    fn client_id(&self) -> Result<Uuid, AppError> {
        let raw = self
            .client_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| AppError::BadRequest("client_id required".to_string()))?;
        Uuid::parse_str(raw).map_err(|_| AppError::BadRequest(format!("invalid client_id `{raw}`")))
    }
}

/// Timeline for one client, most recent `event_date` first.
pub async fn list_events(
    State(state): State<AppState>,
    Extension(who): Extension<Identity>,
    query: Result<Query<EventsQuery>, QueryRejection>,
) -> Result<Json<Vec<Event>>, AppError> {
    let Query(query) = query?;
    let client_id = query.client_id()?;
    let events = state
        .with_store(move |store| Ok(store.list_events(&who, client_id)?))
        .await?;
    Ok(Json(events))
}

/// Logs an activity against one of the caller's clients. A `client_id` the
/// caller does not own is reported as not found.
pub async fn create_event(
    State(state): State<AppState>,
    Extension(who): Extension<Identity>,
    payload: Result<Json<NewEvent>, JsonRejection>,
) -> Result<(StatusCode, Json<Event>), AppError> {
    let Json(new_event) = payload?;
    let event = new_event.into_record();
    event.validate()?;

    let created = state
        .with_store(move |store| Ok(store.insert_event(&who, &event)?))
        .await?;
    log::info!(
        "Logged {} event {} for client {}",
        created.event_type,
        created.id,
        created.client_id
    );
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update_event(
    State(state): State<AppState>,
    Extension(who): Extension<Identity>,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<EventPatch>, JsonRejection>,
) -> Result<Json<Event>, AppError> {
    let Path(id) = path?;
    let Json(patch) = payload?;
    let updated = state
        .with_store(move |store| {
            let mut merged = store.get_event(&who, id)?;
            patch.apply_to(&mut merged);
            merged.validate()?;
            Ok(store.update_event(&who, id, &patch)?)
        })
        .await?;
    Ok(Json(updated))
}

pub async fn delete_event(
    State(state): State<AppState>,
    Extension(who): Extension<Identity>,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<StatusCode, AppError> {
    let Path(id) = path?;
    state
        .with_store(move |store| Ok(store.delete_event(&who, id)?))
        .await?;
    log::info!("Deleted event {} for user {}", id, who.user_id);
    Ok(StatusCode::NO_CONTENT)
}
