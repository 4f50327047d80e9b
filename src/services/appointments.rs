use chrono::DateTime;
use chrono_tz::Tz;
use serde::Serialize;

use crate::errors::AppError;
use crate::models::{Appointment, AppointmentDraft, Interval, DEFAULT_TITLE};
use crate::services::calendar::AppointmentStore;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchFailure {
    pub id: String,
    pub reason: String,
}

/// Per-event results of a batch mutation. One event failing never stops the rest.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchReport {
    pub succeeded: usize,
    pub failed: Vec<BatchFailure>,
    pub skipped: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BatchOutcome {
    NoContactMatch,
    NoTitleMatch,
    Applied(BatchReport),
}

impl BatchOutcome {
    pub fn succeeded(&self) -> usize {
        match self {
            BatchOutcome::Applied(report) => report.succeeded,
            _ => 0,
        }
    }

    pub fn report(&self) -> BatchReport {
        match self {
            BatchOutcome::Applied(report) => report.clone(),
            _ => BatchReport::default(),
        }
    }

    pub fn not_found_message(&self) -> Option<&'static str> {
        match self {
            BatchOutcome::NoContactMatch => {
                Some("No appointments found for the given phone number.")
            }
            BatchOutcome::NoTitleMatch => {
                Some("No appointments found with that phone number and matching title.")
            }
            BatchOutcome::Applied(_) => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Reschedule {
    pub contact_key: String,
    pub title_filter: String,
    pub new_start: Option<DateTime<Tz>>,
    pub new_title: Option<String>,
    pub timezone: Tz,
}

enum Lookup {
    NoContact,
    NoTitle,
    Matches(Vec<Appointment>),
}

async fn lookup<S>(store: &S, contact_key: &str, title_filter: Option<&str>) -> Result<Lookup, AppError>
where
    S: AppointmentStore + ?Sized,
{
    if contact_key.trim().is_empty() {
        return Err(AppError::validation("phone_number is required"));
    }

    let tagged = store
        .find_by_contact_key(contact_key)
        .await
        .map_err(AppError::calendar)?;
    if tagged.is_empty() {
        return Ok(Lookup::NoContact);
    }

    let matches: Vec<Appointment> = tagged
        .into_iter()
        .filter(|a| a.title_matches(title_filter))
        .collect();
    if matches.is_empty() {
        return Ok(Lookup::NoTitle);
    }
    Ok(Lookup::Matches(matches))
}

/// Books unconditionally. Callers that care about collisions check free slots first.
pub async fn create<S>(store: &S, draft: &AppointmentDraft) -> Result<String, AppError>
where
    S: AppointmentStore + ?Sized,
{
    let reference = store.create(draft).await.map_err(AppError::calendar)?;
    tracing::info!(
        title = %draft.title,
        start = %draft.interval.start(),
        end = %draft.interval.end(),
        "appointment booked"
    );
    Ok(reference)
}

/// Moves and/or renames every matching appointment, keeping each one's length.
pub async fn reschedule<S>(store: &S, req: &Reschedule) -> Result<BatchOutcome, AppError>
where
    S: AppointmentStore + ?Sized,
{
    let matches = match lookup(store, &req.contact_key, Some(req.title_filter.as_str())).await? {
        Lookup::NoContact => return Ok(BatchOutcome::NoContactMatch),
        Lookup::NoTitle => return Ok(BatchOutcome::NoTitleMatch),
        Lookup::Matches(m) => m,
    };

    let mut report = BatchReport::default();
    for appt in matches {
        let (Some(start), Some(end)) = (appt.start, appt.end) else {
            tracing::warn!(event_id = %appt.id, "skipping appointment without start or end");
            report.skipped.push(appt.id);
            continue;
        };

        let length = end - start;
        let new_start = req
            .new_start
            .unwrap_or_else(|| start.with_timezone(&req.timezone));
        let interval = match new_start
            .checked_add_signed(length)
            .map(|new_end| Interval::new(new_start, new_end))
        {
            Some(Ok(iv)) => iv,
            _ => {
                tracing::warn!(event_id = %appt.id, %start, %end, "skipping appointment with invalid span");
                report.skipped.push(appt.id);
                continue;
            }
        };

        let title = req
            .new_title
            .clone()
            .or_else(|| Some(appt.title.clone()).filter(|t| !t.is_empty()))
            .unwrap_or_else(|| DEFAULT_TITLE.to_string());
        let draft = AppointmentDraft {
            interval,
            title,
            description: appt.description.clone(),
        };

        match store.update(&appt.id, &draft).await {
            Ok(()) => {
                tracing::info!(event_id = %appt.id, start = %interval.start(), "appointment rescheduled");
                report.succeeded += 1;
            }
            Err(e) => {
                tracing::warn!(event_id = %appt.id, error = %e, "failed to update appointment");
                report.failed.push(BatchFailure {
                    id: appt.id,
                    reason: format!("{e:#}"),
                });
            }
        }
    }

    Ok(BatchOutcome::Applied(report))
}

/// Deletes every matching appointment. Without a title filter that is all of
/// the contact's appointments.
pub async fn cancel<S>(store: &S, contact_key: &str, title_filter: Option<&str>) -> Result<BatchOutcome, AppError>
where
    S: AppointmentStore + ?Sized,
{
    let title_filter = title_filter.filter(|f| !f.trim().is_empty());
    let matches = match lookup(store, contact_key, title_filter).await? {
        Lookup::NoContact => return Ok(BatchOutcome::NoContactMatch),
        Lookup::NoTitle => return Ok(BatchOutcome::NoTitleMatch),
        Lookup::Matches(m) => m,
    };

    let mut report = BatchReport::default();
    for appt in matches {
        match store.delete(&appt.id).await {
            Ok(()) => {
                tracing::info!(event_id = %appt.id, "appointment cancelled");
                report.succeeded += 1;
            }
            Err(e) => {
                tracing::warn!(event_id = %appt.id, error = %e, "failed to delete appointment");
                report.failed.push(BatchFailure {
                    id: appt.id,
                    reason: format!("{e:#}"),
                });
            }
        }
    }

    Ok(BatchOutcome::Applied(report))
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use async_trait::async_trait;
    use chrono::{Duration, FixedOffset};

    use super::*;
    use crate::models::{contact_tag, localize, parse_timezone};
    use crate::services::calendar::memory::InMemoryCalendar;

    const PHONE: &str = "+919876543210";

    fn ist() -> Tz {
        parse_timezone("Asia/Kolkata").unwrap()
    }

    fn fixed(s: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(s).unwrap()
    }

    fn appt(id: &str, title: &str, contact: &str, start: &str, end: &str) -> Appointment {
        Appointment {
            id: id.to_string(),
            title: title.to_string(),
            description: Some(contact_tag(contact)),
            start: Some(fixed(start)),
            end: Some(fixed(end)),
            link: None,
        }
    }

    /// Delegates to an in-memory calendar but rejects writes for chosen ids.
    struct FlakyStore {
        inner: InMemoryCalendar,
        failing: HashSet<String>,
    }

    #[async_trait]
    impl AppointmentStore for FlakyStore {
        async fn create(&self, draft: &AppointmentDraft) -> anyhow::Result<String> {
            self.inner.create(draft).await
        }

        async fn update(&self, id: &str, draft: &AppointmentDraft) -> anyhow::Result<()> {
            anyhow::ensure!(!self.failing.contains(id), "backend rejected {id}");
            self.inner.update(id, draft).await
        }

        async fn delete(&self, id: &str) -> anyhow::Result<()> {
            anyhow::ensure!(!self.failing.contains(id), "backend rejected {id}");
            self.inner.delete(id).await
        }

        async fn find_by_contact_key(&self, contact_key: &str) -> anyhow::Result<Vec<Appointment>> {
            self.inner.find_by_contact_key(contact_key).await
        }
    }

    fn reschedule_req(filter: &str, new_start: Option<&str>, new_title: Option<&str>) -> Reschedule {
        Reschedule {
            contact_key: PHONE.to_string(),
            title_filter: filter.to_string(),
            new_start: new_start.map(|s| localize(s, ist()).unwrap()),
            new_title: new_title.map(str::to_string),
            timezone: ist(),
        }
    }

    #[tokio::test]
    async fn test_reschedule_preserves_duration() {
        let cal = InMemoryCalendar::with_events(vec![appt(
            "evt-1",
            "Design Review",
            PHONE,
            "2024-06-01T14:00:00+05:30",
            "2024-06-01T14:45:00+05:30",
        )]);

        let outcome = reschedule(&cal, &reschedule_req("review", Some("2024-06-01T16:00:00"), None))
            .await
            .unwrap();
        assert_eq!(outcome.succeeded(), 1);

        let updated = cal.get("evt-1").unwrap();
        assert_eq!(updated.start.unwrap().to_rfc3339(), "2024-06-01T16:00:00+05:30");
        assert_eq!(updated.end.unwrap().to_rfc3339(), "2024-06-01T16:45:00+05:30");
        assert_eq!(updated.title, "Design Review");
        assert_eq!(updated.description.as_deref(), Some("Phone Number: +919876543210"));
    }

    #[tokio::test]
    async fn test_reschedule_without_new_start_only_renames() {
        let cal = InMemoryCalendar::with_events(vec![appt(
            "evt-1",
            "Review",
            PHONE,
            "2024-06-01T08:30:00Z",
            "2024-06-01T09:00:00Z",
        )]);

        reschedule(&cal, &reschedule_req("REVIEW", None, Some("Follow-up")))
            .await
            .unwrap();

        let updated = cal.get("evt-1").unwrap();
        assert_eq!(updated.title, "Follow-up");
        assert_eq!(updated.start.unwrap(), fixed("2024-06-01T08:30:00Z"));
        assert_eq!(updated.end.unwrap() - updated.start.unwrap(), Duration::minutes(30));
    }

    #[tokio::test]
    async fn test_reschedule_not_found_outcomes() {
        let cal = InMemoryCalendar::with_events(vec![appt(
            "evt-1",
            "Review",
            PHONE,
            "2024-06-01T14:00:00+05:30",
            "2024-06-01T14:45:00+05:30",
        )]);

        let mut req = reschedule_req("review", None, None);
        req.contact_key = "+14155550100".to_string();
        assert_eq!(reschedule(&cal, &req).await.unwrap(), BatchOutcome::NoContactMatch);

        let outcome = reschedule(&cal, &reschedule_req("dentist", None, None))
            .await
            .unwrap();
        assert_eq!(outcome, BatchOutcome::NoTitleMatch);
        assert_eq!(outcome.succeeded(), 0);
        assert!(outcome.not_found_message().is_some());
    }

    #[tokio::test]
    async fn test_reschedule_skips_events_missing_times() {
        let mut broken = appt("evt-2", "Review", PHONE, "2024-06-01T10:00:00Z", "2024-06-01T10:30:00Z");
        broken.end = None;
        let cal = InMemoryCalendar::with_events(vec![
            appt("evt-1", "Review", PHONE, "2024-06-01T14:00:00+05:30", "2024-06-01T15:00:00+05:30"),
            broken,
        ]);

        let outcome = reschedule(&cal, &reschedule_req("review", Some("2024-06-02T09:00:00"), None))
            .await
            .unwrap();
        let report = outcome.report();
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.skipped, vec!["evt-2".to_string()]);
        assert!(report.failed.is_empty());
    }

    #[tokio::test]
    async fn test_reschedule_partial_failure_continues() {
        let store = FlakyStore {
            inner: InMemoryCalendar::with_events(vec![
                appt("evt-1", "Review A", PHONE, "2024-06-01T10:00:00+05:30", "2024-06-01T10:30:00+05:30"),
                appt("evt-2", "Review B", PHONE, "2024-06-01T11:00:00+05:30", "2024-06-01T12:00:00+05:30"),
                appt("evt-3", "Review C", PHONE, "2024-06-01T13:00:00+05:30", "2024-06-01T13:15:00+05:30"),
            ]),
            failing: HashSet::from(["evt-2".to_string()]),
        };

        let outcome = reschedule(&store, &reschedule_req("review", Some("2024-06-03T09:00:00"), None))
            .await
            .unwrap();
        let report = outcome.report();
        assert_eq!(report.succeeded, 2);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].id, "evt-2");
        assert!(report.failed[0].reason.contains("backend rejected"));

        let c = store.inner.get("evt-3").unwrap();
        assert_eq!(c.end.unwrap() - c.start.unwrap(), Duration::minutes(15));
    }

    #[tokio::test]
    async fn test_cancel_all_for_contact() {
        let cal = InMemoryCalendar::with_events(vec![
            appt("evt-1", "Review", PHONE, "2024-06-01T10:00:00Z", "2024-06-01T10:30:00Z"),
            appt("evt-2", "Checkup", PHONE, "2024-06-02T10:00:00Z", "2024-06-02T10:30:00Z"),
            appt("evt-3", "Review", "+14155550100", "2024-06-01T10:00:00Z", "2024-06-01T10:30:00Z"),
        ]);

        let outcome = cancel(&cal, PHONE, None).await.unwrap();
        assert_eq!(outcome.succeeded(), 2);
        let left = cal.snapshot();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].id, "evt-3");
    }

    #[tokio::test]
    async fn test_cancel_with_title_filter_and_failures() {
        let store = FlakyStore {
            inner: InMemoryCalendar::with_events(vec![
                appt("evt-1", "Review", PHONE, "2024-06-01T10:00:00Z", "2024-06-01T10:30:00Z"),
                appt("evt-2", "review again", PHONE, "2024-06-02T10:00:00Z", "2024-06-02T10:30:00Z"),
                appt("evt-3", "Checkup", PHONE, "2024-06-03T10:00:00Z", "2024-06-03T10:30:00Z"),
            ]),
            failing: HashSet::from(["evt-1".to_string()]),
        };

        let outcome = cancel(&store, PHONE, Some("Review")).await.unwrap();
        let report = outcome.report();
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.failed[0].id, "evt-1");
        assert!(store.inner.get("evt-3").is_some());
        assert!(store.inner.get("evt-2").is_none());
    }

    #[tokio::test]
    async fn test_cancel_unknown_contact_is_not_an_error() {
        let cal = InMemoryCalendar::new();
        let outcome = cancel(&cal, PHONE, Some("review")).await.unwrap();
        assert_eq!(outcome, BatchOutcome::NoContactMatch);
        assert_eq!(outcome.succeeded(), 0);
    }

    #[tokio::test]
    async fn test_blank_contact_key_rejected() {
        let cal = InMemoryCalendar::new();
        assert!(matches!(
            cancel(&cal, "  ", None).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_create_writes_contact_tag() {
        let cal = InMemoryCalendar::new();
        let iv = Interval::new(
            localize("2024-06-01T10:00:00", ist()).unwrap(),
            localize("2024-06-01T10:30:00", ist()).unwrap(),
        )
        .unwrap();
        let draft = AppointmentDraft::new(iv, None, Some(PHONE));
        let link = create(&cal, &draft).await.unwrap();
        assert!(!link.is_empty());

        let stored = cal.find_by_contact_key(PHONE).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].title, "Appointment");
    }
}
