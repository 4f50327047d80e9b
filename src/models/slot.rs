use chrono::{DateTime, Duration};
use chrono_tz::Tz;
use serde::Serialize;

use super::interval::Interval;
use crate::errors::AppError;

/// A window to search plus the length of the slots wanted.
#[derive(Debug, Clone, Copy)]
pub struct SlotRequest {
    window_start: DateTime<Tz>,
    window_end: DateTime<Tz>,
    duration: Duration,
}

impl SlotRequest {
    pub fn new(
        window_start: DateTime<Tz>,
        window_end: DateTime<Tz>,
        duration: Duration,
    ) -> Result<Self, AppError> {
        if duration <= Duration::zero() {
            return Err(AppError::validation("meeting_duration must be a positive integer"));
        }
        if window_start > window_end {
            return Err(AppError::validation("timeMin must not be after timeMax"));
        }
        Ok(Self {
            window_start,
            window_end,
            duration,
        })
    }

    pub fn window_start(&self) -> DateTime<Tz> {
        self.window_start
    }

    pub fn window_end(&self) -> DateTime<Tz> {
        self.window_end
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn span(&self) -> Duration {
        self.window_end - self.window_start
    }

    pub fn timezone(&self) -> Tz {
        self.window_start.timezone()
    }
}

pub fn duration_from_minutes(minutes: i64) -> Result<Duration, AppError> {
    if minutes <= 0 {
        return Err(AppError::validation("meeting_duration must be a positive integer"));
    }
    Duration::try_minutes(minutes)
        .ok_or_else(|| AppError::validation("meeting_duration is out of range"))
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SlotView {
    pub start: String,
    pub end: String,
    #[serde(rename = "timeZone")]
    pub time_zone: String,
}

impl SlotView {
    pub fn from_interval(slot: &Interval, tz: Tz) -> Self {
        let local = slot.with_timezone(tz);
        Self {
            start: local.start().to_rfc3339(),
            end: local.end().to_rfc3339(),
            time_zone: tz.name().to_string(),
        }
    }
}
