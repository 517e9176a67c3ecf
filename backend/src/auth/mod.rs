use axum::extract::{Request, State};
use axum::http::{header, HeaderMap};
use axum::middleware::Next;
use axum::response::Response;
use cookie::Cookie;
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::error::AppError;
use crate::AppState;

/// The authenticated user a request acts on behalf of. Every store call takes
/// one of these; nothing reads the current user from ambient state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub user_id: Uuid,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing session token")]
    MissingToken,
    #[error("Invalid Authorization header format")]
    MalformedHeader,
    #[error("Invalid or expired token: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),
    #[error("Token subject is not a user id")]
    InvalidSubject,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    exp: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    aud: Option<String>,
}

/// What the service needs to know to turn a request into an [`Identity`].
#[derive(Clone)]
pub struct AuthSettings {
    pub jwt_secret: String,
    pub audience: Option<String>,
    pub session_cookie: String,
}

impl From<&AppConfig> for AuthSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            jwt_secret: config.jwt_secret.clone(),
            audience: config.jwt_audience.clone(),
            session_cookie: config.session_cookie.clone(),
        }
    }
}

pub fn validate_token(token: &str, settings: &AuthSettings) -> Result<Identity, AuthError> {
    let mut validation = Validation::default();
    match &settings.audience {
        Some(audience) => validation.set_audience(&[audience]),
        None => validation.validate_aud = false,
    }
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(settings.jwt_secret.as_bytes()),
        &validation,
    )?;
    let user_id = Uuid::parse_str(&token_data.claims.sub).map_err(|_| AuthError::InvalidSubject)?;
    Ok(Identity { user_id })
}

fn bearer_token(headers: &HeaderMap) -> Result<Option<&str>, AuthError> {
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };
    value
        .to_str()
        .ok()
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(Some)
        .ok_or(AuthError::MalformedHeader)
}

fn cookie_token(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .find_map(|raw| {
            let cookie = Cookie::parse(raw).ok()?;
            (cookie.name() == name).then(|| cookie.value().to_owned())
        })
}

/// Resolves the caller from the bearer token, falling back to the session cookie.
pub fn session_identity(headers: &HeaderMap, settings: &AuthSettings) -> Result<Identity, AuthError> {
    if let Some(token) = bearer_token(headers)? {
        return validate_token(token, settings);
    }
    let token = cookie_token(headers, &settings.session_cookie).ok_or(AuthError::MissingToken)?;
    validate_token(&token, settings)
}

/// Guards the JSON API: rejects with 401 or stores the [`Identity`] in the
/// request extensions for handlers to pick up.
pub async fn authenticate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let identity = session_identity(request.headers(), &state.auth).map_err(|e| {
        log::warn!("Rejected {} {}: {}", request.method(), request.uri().path(), e);
        AppError::Unauthorized
    })?;
    log::debug!("Authenticated user: {}", identity.user_id);
    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

/// Mints a session token the way the hosted identity provider does.
#[cfg(test)]
pub(crate) fn create_token(
    user_id: Uuid,
    settings: &AuthSettings,
    ttl: std::time::Duration,
) -> Result<String, AuthError> {
    use jsonwebtoken::{encode, EncodingKey, Header};
    use std::time::{SystemTime, UNIX_EPOCH};

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as usize;
    let claims = Claims {
        sub: user_id.to_string(),
        exp: now + ttl.as_secs() as usize,
        aud: settings.audience.clone(),
    };
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(settings.jwt_secret.as_bytes()),
    )?;
    Ok(token)
}
