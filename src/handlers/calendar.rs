use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::{
    duration_from_minutes, localize, parse_timezone, AppointmentDraft, Interval, SlotRequest,
    SlotView,
};
use crate::services::appointments::{self, BatchFailure, BatchOutcome, Reschedule};
use crate::services::scheduling;
use crate::state::AppState;

const DEFAULT_MEETING_MINUTES: i64 = 30;

fn request_timezone(state: &AppState, requested: Option<&str>) -> Result<Tz, AppError> {
    let name = requested
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(&state.config.default_timezone);
    Ok(parse_timezone(name)?)
}

/// Rejects search windows wider than `max_days`, so slot generation stays bounded.
fn check_window_span(request: &SlotRequest, max_days: i64) -> Result<(), AppError> {
    let too_wide = chrono::Duration::try_days(max_days).is_some_and(|allowed| request.span() > allowed);
    if too_wide {
        return Err(AppError::validation(format!(
            "timeMax - timeMin must not exceed {max_days} days"
        )));
    }
    Ok(())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

// POST /calendar/v3/freeBusy
#[derive(Deserialize)]
pub struct FreeBusyRequest {
    #[serde(rename = "timeMin")]
    pub time_min: Option<String>,
    #[serde(rename = "timeMax")]
    pub time_max: Option<String>,
    pub meeting_duration: Option<i64>,
    #[serde(rename = "timeZone")]
    pub time_zone: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Serialize)]
pub struct FreeBusyResponse {
    pub free_slots: Vec<SlotView>,
}

pub async fn free_busy(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<FreeBusyRequest>, JsonRejection>,
) -> Result<Json<FreeBusyResponse>, AppError> {
    let Json(req) = payload?;

    let tz = request_timezone(&state, req.time_zone.as_deref())?;
    let (time_min, time_max) = match (req.time_min.as_deref(), req.time_max.as_deref()) {
        (Some(min), Some(max)) if !min.is_empty() && !max.is_empty() => (min, max),
        _ => return Err(AppError::validation("timeMin and timeMax are required")),
    };
    let duration = duration_from_minutes(req.meeting_duration.unwrap_or(DEFAULT_MEETING_MINUTES))?;

    let request = SlotRequest::new(localize(time_min, tz)?, localize(time_max, tz)?, duration)?;
    check_window_span(&request, state.config.max_window_days)?;
    let slots = scheduling::find_free_slots(state.calendar.as_ref(), &request).await?;

    let limit = req.limit.unwrap_or(state.config.slot_suggestions);
    tracing::info!(found = slots.len(), limit, "computed free slots");

    Ok(Json(FreeBusyResponse {
        free_slots: slots
            .iter()
            .take(limit)
            .map(|slot| SlotView::from_interval(slot, tz))
            .collect(),
    }))
}

// POST /calendar/v3/events
#[derive(Deserialize)]
pub struct BookRequest {
    pub start: Option<String>,
    pub end: Option<String>,
    pub summary: Option<String>,
    pub phone_number: Option<String>,
    #[serde(rename = "timeZone")]
    pub time_zone: Option<String>,
}

#[derive(Serialize)]
pub struct BookResponse {
    pub message: &'static str,
    pub event_link: String,
}

pub async fn book_meeting(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<BookRequest>, JsonRejection>,
) -> Result<Json<BookResponse>, AppError> {
    let Json(req) = payload?;

    let tz = request_timezone(&state, req.time_zone.as_deref())?;
    let (start, end) = match (req.start.as_deref(), req.end.as_deref()) {
        (Some(start), Some(end)) if !start.is_empty() && !end.is_empty() => (start, end),
        _ => return Err(AppError::validation("'start' and 'end' are required")),
    };

    let interval = Interval::new(localize(start, tz)?, localize(end, tz)?)?;
    let draft = AppointmentDraft::new(interval, req.summary, req.phone_number.as_deref());
    let event_link = appointments::create(state.calendar.as_ref(), &draft).await?;

    Ok(Json(BookResponse {
        message: "Meeting booked successfully",
        event_link,
    }))
}

// POST /calendar/v3/appointments/update
#[derive(Deserialize)]
pub struct UpdateRequest {
    pub phone_number: Option<String>,
    pub old_summary: Option<String>,
    pub new_start: Option<String>,
    pub new_summary: Option<String>,
    #[serde(rename = "timeZone")]
    pub time_zone: Option<String>,
}

#[derive(Serialize)]
pub struct UpdateResponse {
    pub message: String,
    pub updated: usize,
    pub failed: Vec<BatchFailure>,
    pub skipped: Vec<String>,
}

pub async fn update_appointments(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<UpdateRequest>, JsonRejection>,
) -> Result<Json<UpdateResponse>, AppError> {
    let Json(req) = payload?;

    let (Some(contact_key), Some(title_filter)) =
        (non_blank(req.phone_number), non_blank(req.old_summary))
    else {
        return Err(AppError::validation("Phone number and old_summary are required."));
    };
    let tz = request_timezone(&state, req.time_zone.as_deref())?;
    let new_start = match req.new_start.as_deref().filter(|s| !s.trim().is_empty()) {
        Some(literal) => Some(localize(literal, tz)?),
        None => None,
    };

    let reschedule = Reschedule {
        contact_key,
        title_filter,
        new_start,
        new_title: req.new_summary,
        timezone: tz,
    };
    let outcome = appointments::reschedule(state.calendar.as_ref(), &reschedule).await?;
    let report = outcome.report();

    Ok(Json(UpdateResponse {
        message: batch_message(&outcome, "updated"),
        updated: report.succeeded,
        failed: report.failed,
        skipped: report.skipped,
    }))
}

// POST /calendar/v3/appointments/delete
#[derive(Deserialize)]
pub struct DeleteRequest {
    pub phone_number: Option<String>,
    pub summary: Option<String>,
}

#[derive(Serialize)]
pub struct DeleteResponse {
    pub message: String,
    pub deleted: usize,
    pub failed: Vec<BatchFailure>,
}

pub async fn delete_appointments(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<DeleteRequest>, JsonRejection>,
) -> Result<Json<DeleteResponse>, AppError> {
    let Json(req) = payload?;

    let phone_number = non_blank(req.phone_number)
        .ok_or_else(|| AppError::validation("Phone number is required for verification."))?;
    let outcome =
        appointments::cancel(state.calendar.as_ref(), &phone_number, req.summary.as_deref()).await?;
    let report = outcome.report();

    Ok(Json(DeleteResponse {
        message: batch_message(&outcome, "deleted"),
        deleted: report.succeeded,
        failed: report.failed,
    }))
}

fn batch_message(outcome: &BatchOutcome, verb: &str) -> String {
    if let Some(message) = outcome.not_found_message() {
        return message.to_string();
    }
    match outcome.succeeded() {
        0 => format!("No matching appointments were {verb}."),
        n => format!("Successfully {verb} {n} appointment(s)."),
    }
}
