use chrono::{DateTime, FixedOffset};
use serde::Serialize;

use super::interval::Interval;

pub const DEFAULT_TITLE: &str = "Appointment";
const CONTACT_TAG_PREFIX: &str = "Phone Number: ";

/// The description text that marks an appointment as belonging to a contact.
/// Lookups are substring matches on this exact shape, so it must not change
/// while existing calendar entries still carry it.
pub fn contact_tag(contact_key: &str) -> String {
    format!("{CONTACT_TAG_PREFIX}{contact_key}")
}

/// A calendar entry as stored by the backing calendar.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Appointment {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub start: Option<DateTime<FixedOffset>>,
    pub end: Option<DateTime<FixedOffset>>,
    pub link: Option<String>,
}

impl Appointment {
    pub fn is_tagged_with(&self, contact_key: &str) -> bool {
        self.description
            .as_deref()
            .map(|d| d.contains(&contact_tag(contact_key)))
            .unwrap_or(false)
    }

    /// Case-insensitive substring match on the title. `None` matches everything.
    pub fn title_matches(&self, filter: Option<&str>) -> bool {
        match filter {
            Some(f) => self.title.to_lowercase().contains(&f.to_lowercase()),
            None => true,
        }
    }
}

/// What gets written when creating or replacing a calendar entry.
#[derive(Debug, Clone, PartialEq)]
pub struct AppointmentDraft {
    pub interval: Interval,
    pub title: String,
    pub description: Option<String>,
}

impl AppointmentDraft {
    pub fn new(interval: Interval, title: Option<String>, contact_key: Option<&str>) -> Self {
        Self {
            interval,
            title: title
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            description: contact_key
                .filter(|k| !k.trim().is_empty())
                .map(contact_tag),
        }
    }
}
