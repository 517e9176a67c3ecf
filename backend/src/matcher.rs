//! Pairs open clients with available listings that fit their budget and
//! preferred areas. Display only; nothing here is persisted.

use serde::Serialize;

use crate::models::{Client, ClientStatus, Property, PropertyStatus};

pub const MAX_MATCHES: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClientMatch<'a> {
    pub client: &'a Client,
    pub property: &'a Property,
}

/// Walks clients in order and, for each, properties in order, keeping the
/// first [`MAX_MATCHES`] pairs found. Stops as soon as the cap is reached.
pub fn find_matches<'a>(clients: &'a [Client], properties: &'a [Property]) -> Vec<ClientMatch<'a>> {
    let mut matches = Vec::with_capacity(MAX_MATCHES);
    for client in clients.iter().filter(|c| c.status != ClientStatus::Closed) {
        for property in properties
            .iter()
            .filter(|p| p.status == PropertyStatus::Available)
        {
            if within_budget(client, property.price) && in_preferred_area(client, property) {
                matches.push(ClientMatch { client, property });
                if matches.len() >= MAX_MATCHES {
                    return matches;
                }
            }
        }
    }
    matches
}

// A zero bound is what a cleared budget input saves as; it means "no bound".
fn bound(value: Option<i64>) -> Option<i64> {
    value.filter(|v| *v != 0)
}

fn within_budget(client: &Client, price: i64) -> bool {
    let above_min = bound(client.budget_min).map_or(true, |min| price >= min);
    let below_max = bound(client.budget_max).map_or(true, |max| price <= max);
    above_min && below_max
}

/// Substring match in either direction, so "Upper West Side" fits a
/// preference for "West Side" and vice versa.
fn in_preferred_area(client: &Client, property: &Property) -> bool {
    let preferred = match client.preferred_areas.as_deref() {
        None | Some([]) => return true,
        Some(areas) => areas,
    };
    let Some(area) = property.area_name.as_deref().filter(|a| !a.is_empty()) else {
        return false;
    };
    let area = area.to_lowercase();
    preferred.iter().any(|pref| {
        let pref = pref.to_lowercase();
        area.contains(&pref) || pref.contains(&area)
    })
}
