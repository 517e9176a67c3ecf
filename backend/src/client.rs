use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use uuid::Uuid;

use crate::auth::Identity;
use crate::error::AppError;
use crate::models::{Client, ClientFilter, ClientPatch, NewClient};
use crate::AppState;

/// Lists the caller's clients, newest first, narrowed by `status` and `q`.
pub async fn list_clients(
    State(state): State<AppState>,
    Extension(who): Extension<Identity>,
    query: Result<Query<ClientFilter>, QueryRejection>,
) -> Result<Json<Vec<Client>>, AppError> {
    let Query(filter) = query?;
    let clients = state
        .with_store(move |store| Ok(store.list_clients(&who, &filter)?))
        .await?;
    Ok(Json(clients))
}

pub async fn get_client(
    State(state): State<AppState>,
    Extension(who): Extension<Identity>,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Client>, AppError> {
    let Path(id) = path?;
    let client = state
        .with_store(move |store| Ok(store.get_client(&who, id)?))
        .await?;
    Ok(Json(client))
}

pub async fn create_client(
    State(state): State<AppState>,
    Extension(who): Extension<Identity>,
    payload: Result<Json<NewClient>, JsonRejection>,
) -> Result<(StatusCode, Json<Client>), AppError> {
    let Json(new_client) = payload?;
    let client = new_client.into_record(&who);
    client.validate()?;

    let created = state
        .with_store(move |store| Ok(store.insert_client(&who, &client)?))
        .await?;
    log::info!("Created client {} for user {}", created.id, who.user_id);
    Ok((StatusCode::CREATED, Json(created)))
}

/// Partial update: absent fields stay as they are, `null` clears them.
pub async fn update_client(
    State(state): State<AppState>,
    Extension(who): Extension<Identity>,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<ClientPatch>, JsonRejection>,
) -> Result<Json<Client>, AppError> {
    let Path(id) = path?;
    let Json(patch) = payload?;
    let updated = state
        .with_store(move |store| {
            let mut merged = store.get_client(&who, id)?;
            patch.apply_to(&mut merged);
            merged.validate()?;
            Ok(store.update_client(&who, id, &patch)?)
        })
        .await?;
    log::info!("Updated client {} for user {}", id, who.user_id);
    Ok(Json(updated))
}

pub async fn delete_client(
    State(state): State<AppState>,
    Extension(who): Extension<Identity>,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<StatusCode, AppError> {
    let Path(id) = path?;
    state
        .with_store(move |store| Ok(store.delete_client(&who, id)?))
        .await?;
    log::info!("Deleted client {} for user {}", id, who.user_id);
    Ok(StatusCode::NO_CONTENT)
}
