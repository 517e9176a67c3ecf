use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use uuid::Uuid;

use crate::auth::Identity;
use crate::error::AppError;
use crate::models::{NewProperty, Property, PropertyFilter, PropertyPatch};
use crate::AppState;

/// Fetches the caller's listings, newest first
pub async fn list_properties(
    State(state): State<AppState>,
    Extension(who): Extension<Identity>,
    query: Result<Query<PropertyFilter>, QueryRejection>,
) -> Result<Json<Vec<Property>>, AppError> {
    let Query(filter) = query?;
    let properties = state
        .with_store(move |store| Ok(store.list_properties(&who, &filter)?))
        .await?;
    log::debug!("Fetched {} properties for user {}", properties.len(), who.user_id);
    Ok(Json(properties))
}

/// Fetches a specific listing by its ID
pub async fn get_property(
    State(state): State<AppState>,
    Extension(who): Extension<Identity>,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Property>, AppError> {
    let Path(id) = path?;
    let property = state
        .with_store(move |store| Ok(store.get_property(&who, id)?))
        .await?;
    Ok(Json(property))
}

pub async fn create_property(
    State(state): State<AppState>,
    Extension(who): Extension<Identity>,
    payload: Result<Json<NewProperty>, JsonRejection>,
) -> Result<(StatusCode, Json<Property>), AppError> {
    let Json(new_property) = payload?;
    let property = new_property.into_record(&who);
    property.validate()?;

    let created = state
        .with_store(move |store| Ok(store.insert_property(&who, &property)?))
        .await?;
    log::info!("Property listed: {} at {}", created.id, created.address);
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update_property(
    State(state): State<AppState>,
    Extension(who): Extension<Identity>,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<PropertyPatch>, JsonRejection>,
) -> Result<Json<Property>, AppError> {
    let Path(id) = path?;
    let Json(patch) = payload?;
    let updated = state
        .with_store(move |store| {
            let mut merged = store.get_property(&who, id)?;
            patch.apply_to(&mut merged);
            merged.validate()?;
            Ok(store.update_property(&who, id, &patch)?)
        })
        .await?;
    log::info!("Updated property {} for user {}", id, who.user_id);
    Ok(Json(updated))
}

pub async fn delete_property(
    State(state): State<AppState>,
    Extension(who): Extension<Identity>,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<StatusCode, AppError> {
    let Path(id) = path?;
    state
        .with_store(move |store| Ok(store.delete_property(&who, id)?))
        .await?;
    log::info!("Deleted property {} for user {}", id, who.user_id);
    Ok(StatusCode::NO_CONTENT)
}
