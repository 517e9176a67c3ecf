use chrono::{DateTime, NaiveDate, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, PooledConnection};
use uuid::Uuid;

use super::{Store, StoreError};
use crate::auth::Identity;
use crate::db::PgPool;
use crate::models::{
    Client, ClientFilter, ClientPatch, Event, EventPatch, Property, PropertyFilter, PropertyPatch,
};
use crate::schema::{clients, events, properties};

type PgPooled = PooledConnection<ConnectionManager<PgConnection>>;

fn corrupt(table: &str, err: impl std::fmt::Display) -> StoreError {
    StoreError::Backend(format!("unreadable {table} row: {err}"))
}

#[derive(Queryable, Selectable, Insertable)]
#[diesel(table_name = clients)]
#[diesel(check_for_backend(diesel::pg::Pg))]
struct ClientRow {
    id: Uuid,
    user_id: Uuid,
    name: String,
    email: Option<String>,
    phone: Option<String>,
    budget_min: Option<i64>,
    budget_max: Option<i64>,
    preferred_areas: Option<Vec<String>>,
    status: String,
    follow_up_date: Option<NaiveDate>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
}

impl ClientRow {
    fn owned_by(client: &Client, who: &Identity) -> Self {
        Self {
            id: client.id,
            user_id: who.user_id,
            name: client.name.clone(),
            email: client.email.clone(),
            phone: client.phone.clone(),
            budget_min: client.budget_min,
            budget_max: client.budget_max,
            preferred_areas: client.preferred_areas.clone(),
            status: client.status.as_str().to_string(),
            follow_up_date: client.follow_up_date,
            notes: client.notes.clone(),
            created_at: client.created_at,
        }
    }
}

impl TryFrom<ClientRow> for Client {
    type Error = StoreError;

    fn try_from(row: ClientRow) -> Result<Self, Self::Error> {
        Ok(Client {
            id: row.id,
            user_id: row.user_id,
            name: row.name,
            email: row.email,
            phone: row.phone,
            budget_min: row.budget_min,
            budget_max: row.budget_max,
            preferred_areas: row.preferred_areas,
            status: row.status.parse().map_err(|e| corrupt("clients", e))?,
            follow_up_date: row.follow_up_date,
            notes: row.notes,
            created_at: row.created_at,
        })
    }
}

#[derive(AsChangeset)]
#[diesel(table_name = clients)]
struct ClientChanges {
    name: Option<String>,
    email: Option<Option<String>>,
    phone: Option<Option<String>>,
    budget_min: Option<Option<i64>>,
    budget_max: Option<Option<i64>>,
    preferred_areas: Option<Option<Vec<String>>>,
    status: Option<String>,
    follow_up_date: Option<Option<NaiveDate>>,
    notes: Option<Option<String>>,
}

impl From<&ClientPatch> for ClientChanges {
    fn from(patch: &ClientPatch) -> Self {
        Self {
            name: patch.name.clone(),
            email: patch.email.clone(),
            phone: patch.phone.clone(),
            budget_min: patch.budget_min,
            budget_max: patch.budget_max,
            preferred_areas: patch.preferred_areas.clone(),
            status: patch.status.map(|s| s.as_str().to_string()),
            follow_up_date: patch.follow_up_date,
            notes: patch.notes.clone(),
        }
    }
}

#[derive(Queryable, Selectable, Insertable)]
#[diesel(table_name = properties)]
#[diesel(check_for_backend(diesel::pg::Pg))]
struct PropertyRow {
    id: Uuid,
    user_id: Uuid,
    address: String,
    price: i64,
    area_sqft: Option<i32>,
    bedrooms: Option<i16>,
    bathrooms: Option<f64>,
    area_name: Option<String>,
    status: String,
    created_at: DateTime<Utc>,
}

impl PropertyRow {
    fn owned_by(property: &Property, who: &Identity) -> Self {
        Self {
            id: property.id,
            user_id: who.user_id,
            address: property.address.clone(),
            price: property.price,
            area_sqft: property.area_sqft,
            bedrooms: property.bedrooms,
            bathrooms: property.bathrooms,
            area_name: property.area_name.clone(),
            status: property.status.as_str().to_string(),
            created_at: property.created_at,
        }
    }
}

impl TryFrom<PropertyRow> for Property {
    type Error = StoreError;

    fn try_from(row: PropertyRow) -> Result<Self, Self::Error> {
        Ok(Property {
            id: row.id,
            user_id: row.user_id,
            address: row.address,
            price: row.price,
            area_sqft: row.area_sqft,
            bedrooms: row.bedrooms,
            bathrooms: row.bathrooms,
            area_name: row.area_name,
            status: row.status.parse().map_err(|e| corrupt("properties", e))?,
            created_at: row.created_at,
        })
    }
}

#[derive(AsChangeset)]
#[diesel(table_name = properties)]
struct PropertyChanges {
    address: Option<String>,
    price: Option<i64>,
    area_sqft: Option<Option<i32>>,
    bedrooms: Option<Option<i16>>,
    bathrooms: Option<Option<f64>>,
    area_name: Option<Option<String>>,
    status: Option<String>,
}

impl From<&PropertyPatch> for PropertyChanges {
    fn from(patch: &PropertyPatch) -> Self {
        Self {
            address: patch.address.clone(),
            price: patch.price,
            area_sqft: patch.area_sqft,
            bedrooms: patch.bedrooms,
            bathrooms: patch.bathrooms,
            area_name: patch.area_name.clone(),
            status: patch.status.map(|s| s.as_str().to_string()),
        }
    }
}

#[derive(Queryable, Selectable, Insertable)]
#[diesel(table_name = events)]
#[diesel(check_for_backend(diesel::pg::Pg))]
struct EventRow {
    id: Uuid,
    client_id: Uuid,
    event_type: String,
    title: String,
    notes: Option<String>,
    event_date: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl From<&Event> for EventRow {
    fn from(event: &Event) -> Self {
        Self {
            id: event.id,
            client_id: event.client_id,
            event_type: event.event_type.as_str().to_string(),
            title: event.title.clone(),
            notes: event.notes.clone(),
            event_date: event.event_date,
            created_at: event.created_at,
        }
    }
}

impl TryFrom<EventRow> for Event {
    type Error = StoreError;

    fn try_from(row: EventRow) -> Result<Self, Self::Error> {
        Ok(Event {
            id: row.id,
            client_id: row.client_id,
            event_type: row.event_type.parse().map_err(|e| corrupt("events", e))?,
            title: row.title,
            notes: row.notes,
            event_date: row.event_date,
            created_at: row.created_at,
        })
    }
}

#[derive(AsChangeset)]
#[diesel(table_name = events)]
struct EventChanges {
    event_type: Option<String>,
    title: Option<String>,
    notes: Option<Option<String>>,
    event_date: Option<DateTime<Utc>>,
}

impl From<&EventPatch> for EventChanges {
    fn from(patch: &EventPatch) -> Self {
        Self {
            event_type: patch.event_type.map(|t| t.as_str().to_string()),
            title: patch.title.clone(),
            notes: patch.notes.clone(),
            event_date: patch.event_date,
        }
    }
}

fn ensure_client_owned(
    conn: &mut PgConnection,
    who: &Identity,
    client_id: Uuid,
) -> Result<(), StoreError> {
    clients::table
        .filter(clients::id.eq(client_id))
        .filter(clients::user_id.eq(who.user_id))
        .select(clients::id)
        .first::<Uuid>(conn)
        .optional()?
        .map(|_| ())
        .ok_or(StoreError::NotFound)
}

fn owned_event(conn: &mut PgConnection, who: &Identity, id: Uuid) -> Result<EventRow, StoreError> {
    let row = events::table
        .inner_join(clients::table)
        .filter(events::id.eq(id))
        .filter(clients::user_id.eq(who.user_id))
        .select(EventRow::as_select())
        .first(conn)?;
    Ok(row)
}

/// Postgres-backed store. Diesel is blocking; callers run these methods off
/// the async runtime.
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> Result<PgPooled, StoreError> {
        self.pool.get().map_err(|e| StoreError::Pool(e.to_string()))
    }
}

impl Store for PgStore {
    fn list_clients(&self, who: &Identity, filter: &ClientFilter) -> Result<Vec<Client>, StoreError> {
        let mut conn = self.conn()?;
        let mut query = clients::table
            .filter(clients::user_id.eq(who.user_id))
            .order(clients::created_at.desc())
            .select(ClientRow::as_select())
            .into_boxed();
        if let Some(status) = filter.status {
            query = query.filter(clients::status.eq(status.as_str()));
        }
        let rows = query.load(&mut conn)?;
        let mut clients = Vec::with_capacity(rows.len());
        for row in rows {
            let client = Client::try_from(row)?;
            if filter.matches(&client) {
                clients.push(client);
            }
        }
        Ok(clients)
    }

    fn get_client(&self, who: &Identity, id: Uuid) -> Result<Client, StoreError> {
        let mut conn = self.conn()?;
        let row = clients::table
            .filter(clients::id.eq(id))
            .filter(clients::user_id.eq(who.user_id))
            .select(ClientRow::as_select())
            .first(&mut conn)?;
        Client::try_from(row)
    }

    fn insert_client(&self, who: &Identity, client: &Client) -> Result<Client, StoreError> {
        let mut conn = self.conn()?;
        let row = diesel::insert_into(clients::table)
            .values(ClientRow::owned_by(client, who))
            .returning(ClientRow::as_returning())
            .get_result(&mut conn)?;
        Client::try_from(row)
    }

    fn update_client(&self, who: &Identity, id: Uuid, patch: &ClientPatch) -> Result<Client, StoreError> {
        if patch.is_empty() {
            return self.get_client(who, id);
        }
        let mut conn = self.conn()?;
        let row = diesel::update(
            clients::table
                .filter(clients::id.eq(id))
                .filter(clients::user_id.eq(who.user_id)),
        )
        .set(ClientChanges::from(patch))
        .returning(ClientRow::as_returning())
        .get_result(&mut conn)?;
        Client::try_from(row)
    }

    fn delete_client(&self, who: &Identity, id: Uuid) -> Result<(), StoreError> {
        let mut conn = self.conn()?;
        let deleted = diesel::delete(
            clients::table
                .filter(clients::id.eq(id))
                .filter(clients::user_id.eq(who.user_id)),
        )
        .execute(&mut conn)?;
        if deleted == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    fn list_properties(
        &self,
        who: &Identity,
        filter: &PropertyFilter,
    ) -> Result<Vec<Property>, StoreError> {
        let mut conn = self.conn()?;
        let mut query = properties::table
            .filter(properties::user_id.eq(who.user_id))
            .order(properties::created_at.desc())
            .select(PropertyRow::as_select())
            .into_boxed();
        if let Some(status) = filter.status {
            query = query.filter(properties::status.eq(status.as_str()));
        }
        let rows = query.load(&mut conn)?;
        let mut properties = Vec::with_capacity(rows.len());
        for row in rows {
            let property = Property::try_from(row)?;
            if filter.matches(&property) {
                properties.push(property);
            }
        }
        Ok(properties)
    }

    fn get_property(&self, who: &Identity, id: Uuid) -> Result<Property, StoreError> {
        let mut conn = self.conn()?;
        let row = properties::table
            .filter(properties::id.eq(id))
            .filter(properties::user_id.eq(who.user_id))
            .select(PropertyRow::as_select())
            .first(&mut conn)?;
        Property::try_from(row)
    }

    fn insert_property(&self, who: &Identity, property: &Property) -> Result<Property, StoreError> {
        let mut conn = self.conn()?;
        let row = diesel::insert_into(properties::table)
            .values(PropertyRow::owned_by(property, who))
            .returning(PropertyRow::as_returning())
            .get_result(&mut conn)?;
        Property::try_from(row)
    }

    fn update_property(
        &self,
        who: &Identity,
        id: Uuid,
        patch: &PropertyPatch,
    ) -> Result<Property, StoreError> {
        if patch.is_empty() {
            return self.get_property(who, id);
        }
        let mut conn = self.conn()?;
        let row = diesel::update(
            properties::table
                .filter(properties::id.eq(id))
                .filter(properties::user_id.eq(who.user_id)),
        )
        .set(PropertyChanges::from(patch))
        .returning(PropertyRow::as_returning())
        .get_result(&mut conn)?;
        Property::try_from(row)
    }

    fn delete_property(&self, who: &Identity, id: Uuid) -> Result<(), StoreError> {
        let mut conn = self.conn()?;
        let deleted = diesel::delete(
            properties::table
                .filter(properties::id.eq(id))
                .filter(properties::user_id.eq(who.user_id)),
        )
        .execute(&mut conn)?;
        if deleted == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    fn list_events(&self, who: &Identity, client_id: Uuid) -> Result<Vec<Event>, StoreError> {
        let mut conn = self.conn()?;
        let rows = events::table
            .inner_join(clients::table)
            .filter(events::client_id.eq(client_id))
            .filter(clients::user_id.eq(who.user_id))
            .order((events::event_date.desc(), events::created_at.desc()))
            .select(EventRow::as_select())
            .load(&mut conn)?;
        rows.into_iter().map(Event::try_from).collect()
    }

    fn get_event(&self, who: &Identity, id: Uuid) -> Result<Event, StoreError> {
        let mut conn = self.conn()?;
        Event::try_from(owned_event(&mut conn, who, id)?)
    }

    fn insert_event(&self, who: &Identity, event: &Event) -> Result<Event, StoreError> {
        let mut conn = self.conn()?;
        let row = conn.transaction::<_, StoreError, _>(|conn| {
            ensure_client_owned(conn, who, event.client_id)?;
            let row = diesel::insert_into(events::table)
                .values(EventRow::from(event))
                .returning(EventRow::as_returning())
                .get_result(conn)?;
            Ok(row)
        })?;
        Event::try_from(row)
    }

    fn update_event(&self, who: &Identity, id: Uuid, patch: &EventPatch) -> Result<Event, StoreError> {
        let mut conn = self.conn()?;
        let row = conn.transaction::<_, StoreError, _>(|conn| {
            let current = owned_event(conn, who, id)?;
            if patch.is_empty() {
                return Ok(current);
            }
            let row = diesel::update(events::table.filter(events::id.eq(current.id)))
                .set(EventChanges::from(patch))
                .returning(EventRow::as_returning())
                .get_result(conn)?;
            Ok(row)
        })?;
        Event::try_from(row)
    }

    fn delete_event(&self, who: &Identity, id: Uuid) -> Result<(), StoreError> {
        let mut conn = self.conn()?;
        conn.transaction::<_, StoreError, _>(|conn| {
            let current = owned_event(conn, who, id)?;
            diesel::delete(events::table.filter(events::id.eq(current.id))).execute(conn)?;
            Ok(())
        })
    }
}
