use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

use crate::auth::Identity;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown {kind} `{value}`")]
pub struct UnknownVariant {
    kind: &'static str,
    value: String,
}

/// Closed string enums stored as lowercase text in Postgres and on the wire.
macro_rules! text_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "lowercase")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                match value {
                    $($text => Ok(Self::$variant),)+
                    other => Err(UnknownVariant { kind: $kind, value: other.to_string() }),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

text_enum!(ClientStatus, "client status", {
    Active => "active",
    Pending => "pending",
    Closed => "closed",
});

text_enum!(PropertyStatus, "property status", {
    Available => "available",
    Pending => "pending",
    Sold => "sold",
});

text_enum!(EventType, "event type", {
    Call => "call",
    Email => "email",
    Showing => "showing",
    Offer => "offer",
    Note => "note",
});

impl Default for ClientStatus {
    fn default() -> Self {
        Self::Active
    }
}

impl Default for PropertyStatus {
    fn default() -> Self {
        Self::Available
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0} required")]
    Required(&'static str),
    #[error("price must not be negative")]
    NegativePrice,
    #[error("budget_min must not exceed budget_max")]
    InvertedBudget,
}

fn require_text(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::Required(field));
    }
    Ok(())
}

/// Distinguishes an absent field (`None`) from an explicit `null` (`Some(None)`).
fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Accepts RFC 3339 as well as the offset-less `datetime-local` form
/// (`2024-05-01T14:30`), which is read as UTC.
fn event_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_event_timestamp(&raw).map_err(serde::de::Error::custom)
}

fn optional_event_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    event_timestamp(deserializer).map(Some)
}

pub fn parse_event_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| format!("invalid event_date `{raw}`"))
}

fn check_budget(min: Option<i64>, max: Option<i64>) -> Result<(), ValidationError> {
    match (min, max) {
        (Some(min), Some(max)) if min > max => Err(ValidationError::InvertedBudget),
        _ => Ok(()),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub budget_min: Option<i64>,
    pub budget_max: Option<i64>,
    pub preferred_areas: Option<Vec<String>>,
    pub status: ClientStatus,
    pub follow_up_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Client {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("name", &self.name)?;
        check_budget(self.budget_min, self.budget_max)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewClient {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub budget_min: Option<i64>,
    pub budget_max: Option<i64>,
    pub preferred_areas: Option<Vec<String>>,
    #[serde(default)]
    pub status: ClientStatus,
    pub follow_up_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

impl NewClient {
    pub fn into_record(self, owner: &Identity) -> Client {
        Client {
            id: Uuid::new_v4(),
            user_id: owner.user_id,
            name: self.name,
            email: self.email,
            phone: self.phone,
            budget_min: self.budget_min,
            budget_max: self.budget_max,
            preferred_areas: self.preferred_areas,
            status: self.status,
            follow_up_date: self.follow_up_date,
            notes: self.notes,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientPatch {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub email: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub phone: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub budget_min: Option<Option<i64>>,
    #[serde(default, deserialize_with = "nullable")]
    pub budget_max: Option<Option<i64>>,
    #[serde(default, deserialize_with = "nullable")]
    pub preferred_areas: Option<Option<Vec<String>>>,
    pub status: Option<ClientStatus>,
    #[serde(default, deserialize_with = "nullable")]
    pub follow_up_date: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "nullable")]
    pub notes: Option<Option<String>>,
}

impl ClientPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.email.is_none()
            && self.phone.is_none()
            && self.budget_min.is_none()
            && self.budget_max.is_none()
            && self.preferred_areas.is_none()
            && self.status.is_none()
            && self.follow_up_date.is_none()
            && self.notes.is_none()
    }

    pub fn apply_to(&self, client: &mut Client) {
        if let Some(name) = &self.name {
            client.name = name.clone();
        }
        if let Some(email) = &self.email {
            client.email = email.clone();
        }
        if let Some(phone) = &self.phone {
            client.phone = phone.clone();
        }
        if let Some(budget_min) = self.budget_min {
            client.budget_min = budget_min;
        }
        if let Some(budget_max) = self.budget_max {
            client.budget_max = budget_max;
        }
        if let Some(areas) = &self.preferred_areas {
            client.preferred_areas = areas.clone();
        }
        if let Some(status) = self.status {
            client.status = status;
        }
        if let Some(date) = self.follow_up_date {
            client.follow_up_date = date;
        }
        if let Some(notes) = &self.notes {
            client.notes = notes.clone();
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub id: Uuid,
    pub user_id: Uuid,
    pub address: String,
    pub price: i64,
    pub area_sqft: Option<i32>,
    pub bedrooms: Option<i16>,
    pub bathrooms: Option<f64>,
    pub area_name: Option<String>,
    pub status: PropertyStatus,
    pub created_at: DateTime<Utc>,
}

impl Property {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("address", &self.address)?;
        if self.price < 0 {
            return Err(ValidationError::NegativePrice);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewProperty {
    pub address: String,
    pub price: i64,
    pub area_sqft: Option<i32>,
    pub bedrooms: Option<i16>,
    pub bathrooms: Option<f64>,
    pub area_name: Option<String>,
    #[serde(default)]
    pub status: PropertyStatus,
}

impl NewProperty {
    pub fn into_record(self, owner: &Identity) -> Property {
        Property {
            id: Uuid::new_v4(),
            user_id: owner.user_id,
            address: self.address,
            price: self.price,
            area_sqft: self.area_sqft,
            bedrooms: self.bedrooms,
            bathrooms: self.bathrooms,
            area_name: self.area_name,
            status: self.status,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PropertyPatch {
    pub address: Option<String>,
    pub price: Option<i64>,
    #[serde(default, deserialize_with = "nullable")]
    pub area_sqft: Option<Option<i32>>,
    #[serde(default, deserialize_with = "nullable")]
    pub bedrooms: Option<Option<i16>>,
    #[serde(default, deserialize_with = "nullable")]
    pub bathrooms: Option<Option<f64>>,
    #[serde(default, deserialize_with = "nullable")]
    pub area_name: Option<Option<String>>,
    pub status: Option<PropertyStatus>,
}

impl PropertyPatch {
    pub fn is_empty(&self) -> bool {
        self.address.is_none()
            && self.price.is_none()
            && self.area_sqft.is_none()
            && self.bedrooms.is_none()
            && self.bathrooms.is_none()
            && self.area_name.is_none()
            && self.status.is_none()
    }

    pub fn apply_to(&self, property: &mut Property) {
        if let Some(address) = &self.address {
            property.address = address.clone();
        }
        if let Some(price) = self.price {
            property.price = price;
        }
        if let Some(area_sqft) = self.area_sqft {
            property.area_sqft = area_sqft;
        }
        if let Some(bedrooms) = self.bedrooms {
            property.bedrooms = bedrooms;
        }
        if let Some(bathrooms) = self.bathrooms {
            property.bathrooms = bathrooms;
        }
        if let Some(area_name) = &self.area_name {
            property.area_name = area_name.clone();
        }
        if let Some(status) = self.status {
            property.status = status;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub client_id: Uuid,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub title: String,
    pub notes: Option<String>,
    pub event_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Event {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("title", &self.title)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewEvent {
    pub client_id: Uuid,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub title: String,
    pub notes: Option<String>,
    #[serde(deserialize_with = "event_timestamp")]
    pub event_date: DateTime<Utc>,
}

impl NewEvent {
    pub fn into_record(self) -> Event {
        Event {
            id: Uuid::new_v4(),
            client_id: self.client_id,
            event_type: self.event_type,
            title: self.title,
            notes: self.notes,
            event_date: self.event_date,
            created_at: Utc::now(),
        }
    }
}

/// Moving an event to another client is not supported; `client_id` is ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventPatch {
    #[serde(rename = "type")]
    pub event_type: Option<EventType>,
    pub title: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub notes: Option<Option<String>>,
    #[serde(default, deserialize_with = "optional_event_timestamp")]
    pub event_date: Option<DateTime<Utc>>,
}

impl EventPatch {
    pub fn is_empty(&self) -> bool {
        self.event_type.is_none()
            && self.title.is_none()
            && self.notes.is_none()
            && self.event_date.is_none()
    }

    pub fn apply_to(&self, event: &mut Event) {
        if let Some(event_type) = self.event_type {
            event.event_type = event_type;
        }
        if let Some(title) = &self.title {
            event.title = title.clone();
        }
        if let Some(notes) = &self.notes {
            event.notes = notes.clone();
        }
        if let Some(event_date) = self.event_date {
            event.event_date = event_date;
        }
    }
}

/// Query-string filter shared by the client list endpoint and page.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientFilter {
    pub status: Option<ClientStatus>,
    pub q: Option<String>,
}

impl ClientFilter {
    pub fn matches(&self, client: &Client) -> bool {
        if self.status.is_some_and(|status| status != client.status) {
            return false;
        }
        let Some(needle) = search_needle(&self.q) else {
            return true;
        };
        client.name.to_lowercase().contains(&needle)
            || client
                .email
                .as_deref()
                .unwrap_or_default()
                .to_lowercase()
                .contains(&needle)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PropertyFilter {
    pub status: Option<PropertyStatus>,
    pub q: Option<String>,
}

impl PropertyFilter {
    pub fn matches(&self, property: &Property) -> bool {
        if self.status.is_some_and(|status| status != property.status) {
            return false;
        }
        let Some(needle) = search_needle(&self.q) else {
            return true;
        };
        property.address.to_lowercase().contains(&needle)
            || property
                .area_name
                .as_deref()
                .unwrap_or_default()
                .to_lowercase()
                .contains(&needle)
    }
}

fn search_needle(q: &Option<String>) -> Option<String> {
    q.as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(str::to_lowercase)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn owner() -> Identity {
        Identity {
            user_id: Uuid::new_v4(),
        }
    }

    fn sample_client() -> Client {
        NewClient {
            name: "Jane Doe".to_string(),
            email: Some("jane@example.com".to_string()),
            phone: None,
            budget_min: Some(500_000),
            budget_max: Some(800_000),
            preferred_areas: None,
            status: ClientStatus::Active,
            follow_up_date: None,
            notes: None,
        }
        .into_record(&owner())
    }

    #[test]
    fn status_enums_round_trip_through_text() {
        assert_eq!("pending".parse::<ClientStatus>(), Ok(ClientStatus::Pending));
        assert_eq!(PropertyStatus::Sold.as_str(), "sold");
        assert_eq!(EventType::Showing.to_string(), "showing");
        assert!("archived".parse::<ClientStatus>().is_err());
    }

    #[test]
    fn new_client_defaults_status_to_active() {
        let new: NewClient = serde_json::from_str(r#"{"name":"Sam"}"#).unwrap();
        assert_eq!(new.status, ClientStatus::Active);
        assert_eq!(new.preferred_areas, None);
    }

    #[test]
    fn inverted_budget_is_rejected() {
        let mut client = sample_client();
        client.budget_min = Some(900_000);
        assert_eq!(client.validate(), Err(ValidationError::InvertedBudget));
    }

    #[test]
    fn blank_name_is_rejected() {
        let mut client = sample_client();
        client.name = "   ".to_string();
        assert_eq!(client.validate(), Err(ValidationError::Required("name")));
    }

    #[test]
    fn patch_distinguishes_missing_from_null() {
        let patch: ClientPatch =
            serde_json::from_str(r#"{"email": null, "status": "closed"}"#).unwrap();
        assert_eq!(patch.email, Some(None));
        assert_eq!(patch.phone, None);

        let mut client = sample_client();
        patch.apply_to(&mut client);
        assert_eq!(client.email, None);
        assert_eq!(client.status, ClientStatus::Closed);
        assert_eq!(client.name, "Jane Doe");
    }

    #[test]
    fn empty_patch_reports_empty() {
        let patch: PropertyPatch = serde_json::from_str("{}").unwrap();
        assert!(patch.is_empty());
    }

    #[test]
    fn negative_price_is_rejected() {
        let new: NewProperty =
            serde_json::from_str(r#"{"address":"1 Main St","price":-1}"#).unwrap();
        let property = new.into_record(&owner());
        assert_eq!(property.validate(), Err(ValidationError::NegativePrice));
    }

    #[test]
    fn event_date_accepts_datetime_local_form() {
        let json = format!(
            r#"{{"client_id":"{}","type":"call","title":"Intro","event_date":"2024-05-01T14:30"}}"#,
            Uuid::new_v4()
        );
        let new: NewEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(
            new.event_date,
            Utc.with_ymd_and_hms(2024, 5, 1, 14, 30, 0).unwrap()
        );
    }

    #[test]
    fn event_date_accepts_rfc3339_with_offset() {
        let parsed = parse_event_timestamp("2024-05-01T16:30:00+02:00").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2024, 5, 1, 14, 30, 0).unwrap());
        assert!(parse_event_timestamp("yesterday").is_err());
    }

    #[test]
    fn event_serializes_type_field() {
        let event = Event {
            id: Uuid::nil(),
            client_id: Uuid::nil(),
            event_type: EventType::Offer,
            title: "Offer sent".to_string(),
            notes: None,
            event_date: Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap(),
            created_at: Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap(),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "offer");
        assert!(value.get("event_type").is_none());
    }

    #[test]
    fn client_filter_searches_name_and_email() {
        let client = sample_client();
        let by_email = ClientFilter {
            status: None,
            q: Some("EXAMPLE.com".to_string()),
        };
        assert!(by_email.matches(&client));

        let wrong_status = ClientFilter {
            status: Some(ClientStatus::Closed),
            q: None,
        };
        assert!(!wrong_status.matches(&client));

        let blank = ClientFilter {
            status: None,
            q: Some("  ".to_string()),
        };
        assert!(blank.matches(&client));
    }

    #[test]
    fn property_filter_searches_address_and_area() {
        let new: NewProperty = serde_json::from_str(
            r#"{"address":"12 Elm Rd","price":1,"area_name":"Upper West Side"}"#,
        )
        .unwrap();
        let property = new.into_record(&owner());
        let filter = PropertyFilter {
            status: Some(PropertyStatus::Available),
            q: Some("west".to_string()),
        };
        assert!(filter.matches(&property));
        let miss = PropertyFilter {
            status: None,
            q: Some("harbor".to_string()),
        };
        assert!(!miss.matches(&property));
    }
}
