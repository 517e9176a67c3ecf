use std::cmp::Reverse;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

use super::{Store, StoreError};
use crate::auth::Identity;
use crate::models::{
    Client, ClientFilter, ClientPatch, Event, EventPatch, Property, PropertyFilter, PropertyPatch,
};

#[derive(Default)]
struct Tables {
    clients: Vec<Client>,
    properties: Vec<Property>,
    events: Vec<Event>,
}

impl Tables {
    fn owns_client(&self, who: &Identity, client_id: Uuid) -> bool {
        self.clients
            .iter()
            .any(|c| c.id == client_id && c.user_id == who.user_id)
    }

    fn owned_event_mut(&mut self, who: &Identity, id: Uuid) -> Option<&mut Event> {
        let client_id = self.events.iter().find(|e| e.id == id)?.client_id;
        if !self.owns_client(who, client_id) {
            return None;
        }
        self.events.iter_mut().find(|e| e.id == id)
    }
}

/// Process-local store for development and tests. Contents are lost on exit.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, StoreError> {
        self.tables
            .read()
            .map_err(|_| StoreError::Backend("memory store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, StoreError> {
        self.tables
            .write()
            .map_err(|_| StoreError::Backend("memory store lock poisoned".to_string()))
    }
}

impl Store for MemoryStore {
    fn list_clients(&self, who: &Identity, filter: &ClientFilter) -> Result<Vec<Client>, StoreError> {
        let tables = self.read()?;
        // Reversed first so equal timestamps still list the latest insert first.
        let mut clients: Vec<Client> = tables
            .clients
            .iter()
            .rev()
            .filter(|c| c.user_id == who.user_id && filter.matches(c))
            .cloned()
            .collect();
        clients.sort_by_key(|c| Reverse(c.created_at));
        Ok(clients)
    }

    fn get_client(&self, who: &Identity, id: Uuid) -> Result<Client, StoreError> {
        self.read()?
            .clients
            .iter()
            .find(|c| c.id == id && c.user_id == who.user_id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    fn insert_client(&self, who: &Identity, client: &Client) -> Result<Client, StoreError> {
        let mut record = client.clone();
        record.user_id = who.user_id;
        self.write()?.clients.push(record.clone());
        Ok(record)
    }

    fn update_client(&self, who: &Identity, id: Uuid, patch: &ClientPatch) -> Result<Client, StoreError> {
        let mut tables = self.write()?;
        let client = tables
            .clients
            .iter_mut()
            .find(|c| c.id == id && c.user_id == who.user_id)
            .ok_or(StoreError::NotFound)?;
        patch.apply_to(client);
        Ok(client.clone())
    }

    fn delete_client(&self, who: &Identity, id: Uuid) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        if !tables.owns_client(who, id) {
            return Err(StoreError::NotFound);
        }
        tables.clients.retain(|c| c.id != id);
        tables.events.retain(|e| e.client_id != id);
        Ok(())
    }

    fn list_properties(
        &self,
        who: &Identity,
        filter: &PropertyFilter,
    ) -> Result<Vec<Property>, StoreError> {
        let tables = self.read()?;
        let mut properties: Vec<Property> = tables
            .properties
            .iter()
            .rev()
            .filter(|p| p.user_id == who.user_id && filter.matches(p))
            .cloned()
            .collect();
        properties.sort_by_key(|p| Reverse(p.created_at));
        Ok(properties)
    }

    fn get_property(&self, who: &Identity, id: Uuid) -> Result<Property, StoreError> {
        self.read()?
            .properties
            .iter()
            .find(|p| p.id == id && p.user_id == who.user_id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    fn insert_property(&self, who: &Identity, property: &Property) -> Result<Property, StoreError> {
        let mut record = property.clone();
        record.user_id = who.user_id;
        self.write()?.properties.push(record.clone());
        Ok(record)
    }

    fn update_property(
        &self,
        who: &Identity,
        id: Uuid,
        patch: &PropertyPatch,
    ) -> Result<Property, StoreError> {
        let mut tables = self.write()?;
        let property = tables
            .properties
            .iter_mut()
            .find(|p| p.id == id && p.user_id == who.user_id)
            .ok_or(StoreError::NotFound)?;
        patch.apply_to(property);
        Ok(property.clone())
    }

    fn delete_property(&self, who: &Identity, id: Uuid) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        let before = tables.properties.len();
        tables
            .properties
            .retain(|p| !(p.id == id && p.user_id == who.user_id));
        if tables.properties.len() == before {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    fn list_events(&self, who: &Identity, client_id: Uuid) -> Result<Vec<Event>, StoreError> {
        let tables = self.read()?;
        if !tables.owns_client(who, client_id) {
            return Ok(Vec::new());
        }
        let mut events: Vec<Event> = tables
            .events
            .iter()
            .filter(|e| e.client_id == client_id)
            .cloned()
            .collect();
        events.sort_by_key(|e| Reverse((e.event_date, e.created_at)));
        Ok(events)
    }

    fn get_event(&self, who: &Identity, id: Uuid) -> Result<Event, StoreError> {
        let tables = self.read()?;
        tables
            .events
            .iter()
            .find(|e| e.id == id && tables.owns_client(who, e.client_id))
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    fn insert_event(&self, who: &Identity, event: &Event) -> Result<Event, StoreError> {
        let mut tables = self.write()?;
        if !tables.owns_client(who, event.client_id) {
            return Err(StoreError::NotFound);
        }
        tables.events.push(event.clone());
        Ok(event.clone())
    }

    fn update_event(&self, who: &Identity, id: Uuid, patch: &EventPatch) -> Result<Event, StoreError> {
        let mut tables = self.write()?;
        let event = tables.owned_event_mut(who, id).ok_or(StoreError::NotFound)?;
        patch.apply_to(event);
        Ok(event.clone())
    }

    fn delete_event(&self, who: &Identity, id: Uuid) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        if tables.owned_event_mut(who, id).is_none() {
            return Err(StoreError::NotFound);
        }
        tables.events.retain(|e| e.id != id);
        Ok(())
    }
}
