use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;

use crate::errors::AppError;
use crate::models::{BusyPeriod, Interval, SlotRequest};
use crate::services::calendar::BusyIntervalSource;

/// Fetches the busy set for the request window and returns every open slot.
pub async fn find_free_slots<S>(source: &S, request: &SlotRequest) -> Result<Vec<Interval>, AppError>
where
    S: BusyIntervalSource + ?Sized,
{
    if request.window_start() == request.window_end() {
        return Ok(Vec::new());
    }

    let busy = source
        .list_busy(
            request.window_start().with_timezone(&Utc),
            request.window_end().with_timezone(&Utc),
        )
        .await
        .map_err(AppError::calendar)?;

    let slots = compute_free_slots(request, &busy);
    tracing::debug!(
        busy = busy.len(),
        slots = slots.len(),
        window_start = %request.window_start(),
        window_end = %request.window_end(),
        "computed free slots"
    );
    Ok(slots)
}

/// Greedy sweep over the sorted busy set.
///
/// Slots are back-to-back runs of exactly `duration` starting at the window
/// start or at the end of the busy range just passed. A slot never crosses a
/// busy start or the window end; whatever time is left over is dropped.
pub fn compute_free_slots(request: &SlotRequest, busy: &[BusyPeriod]) -> Vec<Interval> {
    let tz = request.timezone();
    let mut busy: Vec<(DateTime<Tz>, DateTime<Tz>)> =
        busy.iter().map(|b| b.in_timezone(tz)).collect();
    busy.sort();

    let duration = request.duration();
    let window_end = request.window_end();
    let mut slots = Vec::new();
    let mut cursor = request.window_start();

    for (busy_start, busy_end) in busy {
        cursor = emit_until(&mut slots, cursor, duration, busy_start.min(window_end));
        cursor = cursor.max(busy_end);
    }
    emit_until(&mut slots, cursor, duration, window_end);

    slots.sort();
    slots.dedup();
    slots
}

fn emit_until(
    slots: &mut Vec<Interval>,
    mut cursor: DateTime<Tz>,
    duration: Duration,
    limit: DateTime<Tz>,
) -> DateTime<Tz> {
    while let Some(slot_end) = cursor.checked_add_signed(duration) {
        if slot_end > limit {
            break;
        }
        match Interval::new(cursor, slot_end) {
            Ok(slot) => slots.push(slot),
            Err(_) => break,
        }
        cursor = slot_end;
    }
    cursor
}
