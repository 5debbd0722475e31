//! Staleness semaphore for the active portfolio.
//!
//! Thresholds live here and nowhere else; the SQL date filters in
//! `services.rs` derive from the same constants.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

/// Days since last contact that still count as green.
pub const GREEN_LIMIT_DAYS: i64 = 20;
/// Upper bound of the yellow band; beyond this the client is red.
pub const YELLOW_LIMIT_DAYS: i64 = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Semaphore {
    NoContact,
    Green,
    Yellow,
    Red,
}

impl Semaphore {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoContact => "no_contact",
            Self::Green => "green",
            Self::Yellow => "yellow",
            Self::Red => "red",
        }
    }

    /// Queue priority: never-contacted clients outrank everything.
    pub fn sort_order(&self) -> u8 {
        match self {
            Self::NoContact => 0,
            Self::Red => 1,
            Self::Yellow => 2,
            Self::Green => 3,
        }
    }
}

pub fn parse_semaphore(s: &str) -> Option<Semaphore> {
    match s {
        "no_contact" => Some(Semaphore::NoContact),
        "green" => Some(Semaphore::Green),
        "yellow" => Some(Semaphore::Yellow),
        "red" => Some(Semaphore::Red),
        _ => None,
    }
}

pub fn days_without_contact(
    last_contact: Option<DateTime<Utc>>,
    today: NaiveDate,
) -> Option<i64> {
    last_contact.map(|at| (today - at.date_naive()).num_days())
}

/// Classification is whole-day arithmetic: a contact 20 days ago is still
/// green, 21 to 40 days is yellow, 41 and beyond is red.
pub fn classify(last_contact: Option<DateTime<Utc>>, today: NaiveDate) -> Semaphore {
    match days_without_contact(last_contact, today) {
        None => Semaphore::NoContact,
        Some(days) if days <= GREEN_LIMIT_DAYS => Semaphore::Green,
        Some(days) if days <= YELLOW_LIMIT_DAYS => Semaphore::Yellow,
        Some(_) => Semaphore::Red,
    }
}
