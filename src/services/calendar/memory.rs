use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{AppointmentStore, BusyIntervalSource};
use crate::models::{Appointment, AppointmentDraft, BusyPeriod};

/// Process-local calendar used for development runs and tests.
#[derive(Default)]
pub struct InMemoryCalendar {
    events: Mutex<Vec<Appointment>>,
}

impl InMemoryCalendar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_events(events: Vec<Appointment>) -> Self {
        Self {
            events: Mutex::new(events),
        }
    }

    pub fn snapshot(&self) -> Vec<Appointment> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn get(&self, id: &str) -> Option<Appointment> {
        self.snapshot().into_iter().find(|e| e.id == id)
    }
}

fn to_appointment(id: String, draft: &AppointmentDraft) -> Appointment {
    Appointment {
        link: Some(format!("memory://events/{id}")),
        id,
        title: draft.title.clone(),
        description: draft.description.clone(),
        start: Some(draft.interval.start().fixed_offset()),
        end: Some(draft.interval.end().fixed_offset()),
    }
}

#[async_trait]
impl BusyIntervalSource for InMemoryCalendar {
    async fn list_busy(
        &self,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> anyhow::Result<Vec<BusyPeriod>> {
        let events = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(events
            .iter()
            .filter_map(|e| Some(BusyPeriod::new(e.start?, e.end?)))
            .filter(|b| b.end > window_start && b.start < window_end)
            .collect())
    }
}

#[async_trait]
impl AppointmentStore for InMemoryCalendar {
    async fn create(&self, draft: &AppointmentDraft) -> anyhow::Result<String> {
        let id = uuid::Uuid::new_v4().simple().to_string();
        let appointment = to_appointment(id, draft);
        let link = appointment.link.clone().unwrap_or_default();
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(appointment);
        Ok(link)
    }

    async fn update(&self, id: &str, draft: &AppointmentDraft) -> anyhow::Result<()> {
        let mut events = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        let slot = events
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| anyhow::anyhow!("event {id} not found"))?;
        *slot = to_appointment(id.to_string(), draft);
        Ok(())
    }

    async fn delete(&self, id: &str) -> anyhow::Result<()> {
        let mut events = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        let before = events.len();
        events.retain(|e| e.id != id);
        anyhow::ensure!(events.len() < before, "event {id} not found");
        Ok(())
    }

    async fn find_by_contact_key(&self, contact_key: &str) -> anyhow::Result<Vec<Appointment>> {
        let events = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(events
            .iter()
            .filter(|e| e.is_tagged_with(contact_key))
            .cloned()
            .collect())
    }
}
