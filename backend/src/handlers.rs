use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{middleware, Extension, Json, Router};
use chrono::Utc;

use crate::auth::{self, Identity};
use crate::error::AppError;
use crate::models::{Client, ClientFilter, Property, PropertyFilter};
use crate::{client, dashboard, event, property, AppState};

/// JSON API under `/api`, all behind [`auth::authenticate`], plus `/health`.
pub fn api_router(state: AppState) -> Router<AppState> {
    let protected_routes = Router::new()
        .route(
            "/api/clients",
            get(client::list_clients).post(client::create_client),
        )
        .route(
            "/api/clients/:id",
            get(client::get_client)
                .patch(client::update_client)
                .delete(client::delete_client),
        )
        .route(
            "/api/properties",
            get(property::list_properties).post(property::create_property),
        )
        .route(
            "/api/properties/:id",
            get(property::get_property)
                .patch(property::update_property)
                .delete(property::delete_property),
        )
        .route(
            "/api/events",
            get(event::list_events).post(event::create_event),
        )
        .route(
            "/api/events/:id",
            axum::routing::patch(event::update_event).delete(event::delete_event),
        )
        .route("/api/dashboard", get(dashboard_summary))
        .route_layer(middleware::from_fn_with_state(state, auth::authenticate));

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .merge(protected_routes)
}

/// Everything the dashboard is computed from, fetched in one blocking task.
pub(crate) async fn load_portfolio(
    state: &AppState,
    who: Identity,
) -> Result<(Vec<Client>, Vec<Property>), AppError> {
    state
        .with_store(move |store| {
            let clients = store.list_clients(&who, &ClientFilter::default())?;
            let properties = store.list_properties(&who, &PropertyFilter::default())?;
            Ok((clients, properties))
        })
        .await
}

async fn dashboard_summary(
    State(state): State<AppState>,
    Extension(who): Extension<Identity>,
) -> Result<Response, AppError> {
    let (clients, properties) = load_portfolio(&state, who).await?;
    let today = Utc::now().date_naive();
    Ok(Json(dashboard::summarize(&clients, &properties, today)).into_response())
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{header, Method, Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use uuid::Uuid;

    use crate::auth::{create_token, AuthSettings};
    use crate::store::MemoryStore;
    use crate::AppState;

    pub(crate) fn test_settings() -> AuthSettings {
        AuthSettings {
            jwt_secret: "handler-test-secret".to_string(),
            audience: None,
            session_cookie: "crm_session".to_string(),
        }
    }

    pub(crate) fn test_state() -> AppState {
        AppState::new(Arc::new(MemoryStore::new()), test_settings())
    }

    pub(crate) fn token_for(user_id: Uuid) -> String {
        create_token(user_id, &test_settings(), Duration::from_secs(3600)).unwrap()
    }

    async fn call(
        state: &AppState,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = crate::app(state.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, value)
    }

    async fn create_client(state: &AppState, token: &str, body: Value) -> Value {
        let (status, created) = call(state, Method::POST, "/api/clients", Some(token), Some(body)).await;
        assert_eq!(status, StatusCode::CREATED, "{created}");
        created
    }

    #[tokio::test]
    async fn health_is_public() {
        let state = test_state();
        let (status, body) = call(&state, Method::GET, "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, Value::String("ok".to_string()));
    }

    #[tokio::test]
    async fn api_requires_authentication() {
        let state = test_state();
        let (status, body) = call(&state, Method::GET, "/api/clients", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Unauthorized");

        let (status, _) = call(&state, Method::GET, "/api/clients", Some("not-a-jwt"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn client_crud_round_trip() {
        let state = test_state();
        let token = token_for(Uuid::new_v4());

        let created = create_client(
            &state,
            &token,
            json!({"name": "Jane Doe", "email": "jane@example.com", "budget_min": 500000}),
        )
        .await;
        assert_eq!(created["status"], "active");
        let id = created["id"].as_str().unwrap().to_string();

        let (status, patched) = call(
            &state,
            Method::PATCH,
            &format!("/api/clients/{id}"),
            Some(&token),
            Some(json!({"status": "pending", "email": null})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(patched["status"], "pending");
        assert_eq!(patched["email"], Value::Null);
        assert_eq!(patched["budget_min"], 500000);

        let (status, listed) = call(&state, Method::GET, "/api/clients?status=pending&q=jane", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed.as_array().unwrap().len(), 1);

        let (status, _) = call(&state, Method::DELETE, &format!("/api/clients/{id}"), Some(&token), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, body) = call(&state, Method::GET, &format!("/api/clients/{id}"), Some(&token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Not found");
    }

    #[tokio::test]
    async fn other_users_records_look_missing() {
        let state = test_state();
        let owner = token_for(Uuid::new_v4());
        let stranger = token_for(Uuid::new_v4());
        let created = create_client(&state, &owner, json!({"name": "Private"})).await;
        let uri = format!("/api/clients/{}", created["id"].as_str().unwrap());

        let (status, _) = call(&state, Method::GET, &uri, Some(&stranger), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = call(&state, Method::PATCH, &uri, Some(&stranger), Some(json!({"name": "Mine"}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = call(&state, Method::DELETE, &uri, Some(&stranger), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, listed) = call(&state, Method::GET, "/api/clients", Some(&stranger), None).await;
        assert_eq!(listed, json!([]));
    }

    #[tokio::test]
    async fn validation_failures_are_bad_requests() {
        let state = test_state();
        let token = token_for(Uuid::new_v4());

        let (status, body) = call(
            &state,
            Method::POST,
            "/api/clients",
            Some(&token),
            Some(json!({"name": "Inverted", "budget_min": 900000, "budget_max": 100000})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "budget_min must not exceed budget_max");

        let (status, _) = call(&state, Method::POST, "/api/clients", Some(&token), Some(json!({"email": "x@y.z"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = call(
            &state,
            Method::POST,
            "/api/properties",
            Some(&token),
            Some(json!({"address": "1 Main St", "price": -5})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let created = create_client(&state, &token, json!({"name": "Range", "budget_max": 400000})).await;
        let (status, _) = call(
            &state,
            Method::PATCH,
            &format!("/api/clients/{}", created["id"].as_str().unwrap()),
            Some(&token),
            Some(json!({"budget_min": 500000})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn events_require_client_id() {
        let state = test_state();
        let token = token_for(Uuid::new_v4());
        let (status, body) = call(&state, Method::GET, "/api/events", Some(&token), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "client_id required");

        let (status, _) = call(&state, Method::GET, "/api/events?client_id=nope", Some(&token), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn created_event_is_listed_newest_first() {
        let state = test_state();
        let token = token_for(Uuid::new_v4());
        let client = create_client(&state, &token, json!({"name": "Timeline"})).await;
        let client_id = client["id"].as_str().unwrap();

        for (title, date) in [("older", "2024-05-01T09:00"), ("newer", "2024-05-03T09:00:00Z")] {
            let (status, created) = call(
                &state,
                Method::POST,
                "/api/events",
                Some(&token),
                Some(json!({"client_id": client_id, "type": "call", "title": title, "event_date": date})),
            )
            .await;
            assert_eq!(status, StatusCode::CREATED, "{created}");
            assert_eq!(created["title"], title);
            assert!(created["id"].is_string());
            assert!(created["created_at"].is_string());
        }

        let (status, listed) = call(
            &state,
            Method::GET,
            &format!("/api/events?client_id={client_id}"),
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let titles: Vec<&str> = listed
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["title"].as_str().unwrap())
            .collect();
        assert_eq!(titles, ["newer", "older"]);
    }

    #[tokio::test]
    async fn events_cannot_target_another_users_client() {
        let state = test_state();
        let owner = token_for(Uuid::new_v4());
        let stranger = token_for(Uuid::new_v4());
        let client = create_client(&state, &owner, json!({"name": "Owned"})).await;

        let (status, _) = call(
            &state,
            Method::POST,
            "/api/events",
            Some(&stranger),
            Some(json!({
                "client_id": client["id"],
                "type": "note",
                "title": "sneaky",
                "event_date": "2024-05-01T09:00:00Z"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn event_update_and_delete() {
        let state = test_state();
        let token = token_for(Uuid::new_v4());
        let client = create_client(&state, &token, json!({"name": "Edits"})).await;
        let (_, event) = call(
            &state,
            Method::POST,
            "/api/events",
            Some(&token),
            Some(json!({
                "client_id": client["id"],
                "type": "showing",
                "title": "Open house",
                "notes": "bring keys",
                "event_date": "2024-05-01T09:00:00Z"
            })),
        )
        .await;
        let uri = format!("/api/events/{}", event["id"].as_str().unwrap());

        let (status, updated) = call(&state, Method::PATCH, &uri, Some(&token), Some(json!({"type": "offer", "notes": null}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["type"], "offer");
        assert_eq!(updated["notes"], Value::Null);
        assert_eq!(updated["title"], "Open house");

        let (status, _) = call(&state, Method::PATCH, &uri, Some(&token), Some(json!({"title": ""}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = call(&state, Method::DELETE, &uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = call(&state, Method::DELETE, &uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn property_crud_round_trip() {
        let state = test_state();
        let token = token_for(Uuid::new_v4());
        let (status, created) = call(
            &state,
            Method::POST,
            "/api/properties",
            Some(&token),
            Some(json!({"address": "12 Elm Rd", "price": 750000, "bathrooms": 2.5, "area_name": "Upper West Side"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["status"], "available");
        let uri = format!("/api/properties/{}", created["id"].as_str().unwrap());

        let (status, updated) = call(&state, Method::PATCH, &uri, Some(&token), Some(json!({"status": "sold"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["status"], "sold");
        assert_eq!(updated["bathrooms"], 2.5);

        let (_, listed) = call(&state, Method::GET, "/api/properties?status=available", Some(&token), None).await;
        assert_eq!(listed, json!([]));

        let (status, _) = call(&state, Method::DELETE, &uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn dashboard_reports_matches() {
        let state = test_state();
        let token = token_for(Uuid::new_v4());
        create_client(
            &state,
            &token,
            json!({"name": "Buyer", "budget_min": 500000, "budget_max": 800000, "preferred_areas": ["West Side"]}),
        )
        .await;
        create_client(&state, &token, json!({"name": "Done", "status": "closed"})).await;
        call(
            &state,
            Method::POST,
            "/api/properties",
            Some(&token),
            Some(json!({"address": "12 Elm Rd", "price": 750000, "area_name": "Upper West Side"})),
        )
        .await;

        let (status, body) = call(&state, Method::GET, "/api/dashboard", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["stats"]["active_clients"], 1);
        assert_eq!(body["stats"]["closed_deals"], 1);
        assert_eq!(body["stats"]["available_listings"], 1);
        let matches = body["matches"].as_array().unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0]["client"]["name"], "Buyer");
        assert_eq!(matches[0]["property"]["address"], "12 Elm Rd");
    }

    #[tokio::test]
    async fn malformed_json_is_a_bad_request() {
        let state = test_state();
        let token = token_for(Uuid::new_v4());
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/clients")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let response = crate::app(state).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn malformed_ids_are_not_found() {
        let state = test_state();
        let token = token_for(Uuid::new_v4());
        for (method, uri) in [
            (Method::GET, "/api/clients/not-a-uuid"),
            (Method::DELETE, "/api/clients/not-a-uuid"),
            (Method::GET, "/api/properties/42"),
            (Method::DELETE, "/api/events/not-a-uuid"),
        ] {
            let (status, body) = call(&state, method, uri, Some(&token), None).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
            assert_eq!(body, json!({ "error": "Not found" }), "{uri}");
        }

        let (status, body) = call(
            &state,
            Method::PATCH,
            "/api/events/not-a-uuid",
            Some(&token),
            Some(json!({ "title": "x" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Not found");
    }
}
