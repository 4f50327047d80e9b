pub mod google;
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{Appointment, AppointmentDraft, BusyPeriod};

/// Reports what is already booked inside a window. Results are unordered and
/// may overlap; callers normalize and sort.
#[async_trait]
pub trait BusyIntervalSource: Send + Sync {
    async fn list_busy(
        &self,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> anyhow::Result<Vec<BusyPeriod>>;
}

/// Single-entry writes against the calendar plus contact-tagged lookup.
#[async_trait]
pub trait AppointmentStore: Send + Sync {
    /// Returns a reference to the created entry (a link when the backend has one).
    async fn create(&self, draft: &AppointmentDraft) -> anyhow::Result<String>;

    async fn update(&self, id: &str, draft: &AppointmentDraft) -> anyhow::Result<()>;

    async fn delete(&self, id: &str) -> anyhow::Result<()>;

    /// Scans the calendar and keeps entries whose description carries the
    /// contact tag. This is a substring match, not an indexed query.
    async fn find_by_contact_key(&self, contact_key: &str) -> anyhow::Result<Vec<Appointment>>;
}

pub trait CalendarBackend: BusyIntervalSource + AppointmentStore {}

impl<T: BusyIntervalSource + AppointmentStore + ?Sized> CalendarBackend for T {}
