use chrono::{Days, NaiveDate};
use serde::Serialize;

use crate::matcher::{find_matches, ClientMatch};
use crate::models::{Client, ClientStatus, Property, PropertyStatus};

pub const MAX_REMINDERS: usize = 6;
const FOLLOW_UP_WINDOW_DAYS: u64 = 7;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub active_clients: usize,
    pub follow_ups_this_week: usize,
    pub available_listings: usize,
    pub closed_deals: usize,
}

#[derive(Debug, Serialize)]
pub struct Dashboard<'a> {
    pub stats: Stats,
    pub reminders: Vec<&'a Client>,
    pub matches: Vec<ClientMatch<'a>>,
}

pub fn summarize<'a>(clients: &'a [Client], properties: &'a [Property], today: NaiveDate) -> Dashboard<'a> {
    Dashboard {
        stats: stats(clients, properties, today),
        reminders: reminders(clients, today),
        matches: find_matches(clients, properties),
    }
}

fn stats(clients: &[Client], properties: &[Property], today: NaiveDate) -> Stats {
    let week_end = today
        .checked_add_days(Days::new(FOLLOW_UP_WINDOW_DAYS))
        .unwrap_or(NaiveDate::MAX);
    Stats {
        active_clients: clients
            .iter()
            .filter(|c| c.status == ClientStatus::Active)
            .count(),
        follow_ups_this_week: clients
            .iter()
            .filter(|c| c.follow_up_date.is_some_and(|d| d >= today && d <= week_end))
            .count(),
        available_listings: properties
            .iter()
            .filter(|p| p.status == PropertyStatus::Available)
            .count(),
        closed_deals: clients
            .iter()
            .filter(|c| c.status == ClientStatus::Closed)
            .count(),
    }
}

/// Open clients whose follow-up is due today or overdue, oldest first.
fn reminders(clients: &[Client], today: NaiveDate) -> Vec<&Client> {
    let mut due: Vec<&Client> = clients
        .iter()
        .filter(|c| c.status != ClientStatus::Closed)
        .filter(|c| c.follow_up_date.is_some_and(|d| d <= today))
        .collect();
    due.sort_by_key(|c| c.follow_up_date);
    due.truncate(MAX_REMINDERS);
    due
}
