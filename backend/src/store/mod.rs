//! Owner-scoped CRUD over clients, properties and events.
//!
//! Every method takes the caller's [`Identity`] and only ever sees rows that
//! identity owns. Events are owned through their client.

use thiserror::Error;
use uuid::Uuid;

use crate::auth::Identity;
use crate::models::{
    Client, ClientFilter, ClientPatch, Event, EventPatch, Property, PropertyFilter, PropertyPatch,
};

pub mod memory;
pub mod pg;

pub use memory::MemoryStore;
pub use pg::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("{0}")]
    Backend(String),
    #[error("database pool: {0}")]
    Pool(String),
}

impl From<diesel::result::Error> for StoreError {
    fn from(err: diesel::result::Error) -> Self {
        match err {
            diesel::result::Error::NotFound => StoreError::NotFound,
            other => StoreError::Backend(other.to_string()),
        }
    }
}

pub trait Store: Send + Sync {
    /// Newest first.
    fn list_clients(&self, who: &Identity, filter: &ClientFilter) -> Result<Vec<Client>, StoreError>;
    fn get_client(&self, who: &Identity, id: Uuid) -> Result<Client, StoreError>;
    /// Persists `client` under `who`, whatever `client.user_id` says.
    fn insert_client(&self, who: &Identity, client: &Client) -> Result<Client, StoreError>;
    fn update_client(&self, who: &Identity, id: Uuid, patch: &ClientPatch) -> Result<Client, StoreError>;
    /// Also removes the client's events.
    fn delete_client(&self, who: &Identity, id: Uuid) -> Result<(), StoreError>;

    /// Newest first.
    fn list_properties(
        &self,
        who: &Identity,
        filter: &PropertyFilter,
    ) -> Result<Vec<Property>, StoreError>;
    fn get_property(&self, who: &Identity, id: Uuid) -> Result<Property, StoreError>;
    fn insert_property(&self, who: &Identity, property: &Property) -> Result<Property, StoreError>;
    fn update_property(
        &self,
        who: &Identity,
        id: Uuid,
        patch: &PropertyPatch,
    ) -> Result<Property, StoreError>;
    fn delete_property(&self, who: &Identity, id: Uuid) -> Result<(), StoreError>;

    /// Most recent `event_date` first. Empty when the client is not `who`'s.
    fn list_events(&self, who: &Identity, client_id: Uuid) -> Result<Vec<Event>, StoreError>;
    fn get_event(&self, who: &Identity, id: Uuid) -> Result<Event, StoreError>;
    /// Fails with [`StoreError::NotFound`] unless `event.client_id` belongs to `who`.
    fn insert_event(&self, who: &Identity, event: &Event) -> Result<Event, StoreError>;
    fn update_event(&self, who: &Identity, id: Uuid, patch: &EventPatch) -> Result<Event, StoreError>;
    fn delete_event(&self, who: &Identity, id: Uuid) -> Result<(), StoreError>;
}
