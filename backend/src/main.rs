use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;

mod auth;
mod client;
mod config;
mod dashboard;
mod db;
mod error;
mod event;
mod handlers;
mod matcher;
mod models;
mod pages;
mod property;
mod schema;
mod store;

use crate::auth::AuthSettings;
use crate::config::{AppConfig, StorageBackend};
use crate::error::AppError;
use crate::store::{MemoryStore, PgStore, Store};

#[derive(Clone)]
pub struct AppState {
    store: Arc<dyn Store>,
    auth: Arc<AuthSettings>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, auth: AuthSettings) -> Self {
        Self {
            store,
            auth: Arc::new(auth),
        }
    }

    /// Runs blocking store work on the blocking pool and hands back its result.
    pub async fn with_store<T, F>(&self, op: F) -> Result<T, AppError>
    where
        F: FnOnce(&dyn Store) -> Result<T, AppError> + Send + 'static,
        T: Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || op(store.as_ref()))
            .await
            .map_err(|e| AppError::Storage(format!("store task failed: {e}")))?
    }
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(handlers::api_router(state.clone()))
        .merge(pages::router())
        .with_state(state)
}

fn open_store(config: &AppConfig) -> Result<Arc<dyn Store>, Box<dyn std::error::Error>> {
    match config.storage {
        StorageBackend::Postgres => {
            let database_url = config
                .database_url
                .as_deref()
                .ok_or("database_url is required when storage = postgres")?;
            let pool = db::establish_pool(database_url, config.pool_size)?;
            Ok(Arc::new(PgStore::new(pool)))
        }
        StorageBackend::Memory => {
            log::warn!("Using in-memory storage; data is lost on shutdown");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = AppConfig::load()?;
    log::info!("Loaded config: {:?}", config);

    let store = open_store(&config)?;
    let state = AppState::new(store, AuthSettings::from(&config));

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    log::info!("Starting server on {} ({:?} storage)", addr, config.storage);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app(state)).await?;

    Ok(())
}
