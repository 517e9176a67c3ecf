//! Locale-prefixed page routes. Each page answers with its view model as JSON;
//! rendering is left to the front end. Sessions gate every page except login.

use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use crate::auth::{session_identity, Identity};
use crate::dashboard;
use crate::error::AppError;
use crate::handlers::load_portfolio;
use crate::models::{Client, ClientFilter, Event, Property, PropertyFilter};
use crate::AppState;

pub const LOCALES: [&str; 2] = ["en", "zh"];
pub const DEFAULT_LOCALE: &str = "en";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/:locale", get(dashboard_page))
        .route("/:locale/login", get(login_page))
        .route("/:locale/clients", get(clients_page))
        .route("/:locale/clients/:id", get(client_detail_page))
        .route("/:locale/properties", get(properties_page))
        .route("/:locale/*rest", get(unknown_page))
}

#[derive(Debug)]
pub enum PageError {
    UnknownLocale,
    Redirect(String),
    App(AppError),
}

impl From<AppError> for PageError {
    fn from(err: AppError) -> Self {
        PageError::App(err)
    }
}

impl From<QueryRejection> for PageError {
    fn from(rejection: QueryRejection) -> Self {
        PageError::App(rejection.into())
    }
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        match self {
            PageError::UnknownLocale => {
                (StatusCode::NOT_FOUND, Json(json!({ "error": "Not found" }))).into_response()
            }
            PageError::Redirect(to) => Redirect::to(&to).into_response(),
            PageError::App(err) => err.into_response(),
        }
    }
}

#[derive(Serialize)]
struct Page<T: Serialize> {
    locale: &'static str,
    page: &'static str,
    #[serde(flatten)]
    view: T,
}

fn page<T: Serialize>(locale: &'static str, name: &'static str, view: T) -> Response {
    Json(Page {
        locale,
        page: name,
        view,
    })
    .into_response()
}

fn resolve_locale(raw: &str) -> Result<&'static str, PageError> {
    LOCALES
        .iter()
        .copied()
        .find(|locale| *locale == raw)
        .ok_or(PageError::UnknownLocale)
}

/// Locale plus caller, or a redirect to that locale's login page.
fn require_session(
    state: &AppState,
    headers: &HeaderMap,
    raw_locale: &str,
) -> Result<(&'static str, Identity), PageError> {
    let locale = resolve_locale(raw_locale)?;
    let identity = session_identity(headers, &state.auth)
        .map_err(|_| PageError::Redirect(format!("/{locale}/login")))?;
    Ok((locale, identity))
}

async fn root() -> Redirect {
    Redirect::to(&format!("/{DEFAULT_LOCALE}"))
}

async fn login_page(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(locale): Path<String>,
) -> Result<Response, PageError> {
    let locale = resolve_locale(&locale)?;
    if session_identity(&headers, &state.auth).is_ok() {
        return Err(PageError::Redirect(format!("/{locale}")));
    }
    Ok(page(locale, "login", json!({})))
}

async fn dashboard_page(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(locale): Path<String>,
) -> Result<Response, PageError> {
    let (locale, who) = require_session(&state, &headers, &locale)?;
    let (clients, properties) = load_portfolio(&state, who).await?;
    let today = Utc::now().date_naive();
    let summary = dashboard::summarize(&clients, &properties, today);
    Ok(page(locale, "dashboard", summary))
}

#[derive(Serialize)]
struct ClientsView {
    clients: Vec<Client>,
}

async fn clients_page(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(locale): Path<String>,
    query: Result<Query<ClientFilter>, QueryRejection>,
) -> Result<Response, PageError> {
    let (locale, who) = require_session(&state, &headers, &locale)?;
    let Query(filter) = query?;
    let clients = state
        .with_store(move |store| Ok(store.list_clients(&who, &filter)?))
        .await?;
    Ok(page(locale, "clients", ClientsView { clients }))
}

#[derive(Serialize)]
struct ClientDetailView {
    client: Client,
    events: Vec<Event>,
}

async fn client_detail_page(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((locale, id)): Path<(String, String)>,
) -> Result<Response, PageError> {
    let (locale, who) = require_session(&state, &headers, &locale)?;
    let id = Uuid::parse_str(&id).map_err(|_| AppError::NotFound)?;
    let view = state
        .with_store(move |store| {
            let client = store.get_client(&who, id)?;
            let events = store.list_events(&who, id)?;
            Ok(ClientDetailView { client, events })
        })
        .await?;
    Ok(page(locale, "client", view))
}

#[derive(Serialize)]
struct PropertiesView {
    properties: Vec<Property>,
}

async fn properties_page(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(locale): Path<String>,
    query: Result<Query<PropertyFilter>, QueryRejection>,
) -> Result<Response, PageError> {
    let (locale, who) = require_session(&state, &headers, &locale)?;
    let Query(filter) = query?;
    let properties = state
        .with_store(move |store| Ok(store.list_properties(&who, &filter)?))
        .await?;
    Ok(page(locale, "properties", PropertiesView { properties }))
}

/// Any other page under a locale: anonymous callers still go to login first.
async fn unknown_page(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((locale, rest)): Path<(String, String)>,
) -> Result<Response, PageError> {
    let (locale, _) = require_session(&state, &headers, &locale)?;
    log::debug!("No page at /{}/{}", locale, rest);
    Err(AppError::NotFound.into())
}
