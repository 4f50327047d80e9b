use chrono::{DateTime, Duration, FixedOffset, LocalResult, NaiveDate, NaiveDateTime, TimeZone};
use chrono_tz::Tz;

use crate::errors::AppError;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TimeError {
    #[error("Invalid timeZone: {0}")]
    UnknownTimezone(String),

    #[error("Invalid date/time format: {0}")]
    Malformed(String),

    #[error("{literal} does not exist in {tz} (skipped by a clock change)")]
    NonexistentLocalTime { literal: String, tz: String },

    #[error("interval start {start} must be before end {end}")]
    EmptyInterval { start: String, end: String },
}

impl From<TimeError> for AppError {
    fn from(e: TimeError) -> Self {
        AppError::Validation(e.to_string())
    }
}

const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M%:z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
];

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

pub fn parse_timezone(name: &str) -> Result<Tz, TimeError> {
    name.trim()
        .parse::<Tz>()
        .map_err(|_| TimeError::UnknownTimezone(name.to_string()))
}

/// Normalizes an ISO-8601 literal into `tz`.
///
/// Literals carrying `Z` or an explicit offset name an absolute instant and are
/// converted into `tz`. Literals without an offset are wall-clock time in `tz`
/// itself, never UTC. A date without a time means midnight in `tz`.
pub fn localize(literal: &str, tz: Tz) -> Result<DateTime<Tz>, TimeError> {
    let s = literal.trim();
    if s.is_empty() {
        return Err(TimeError::Malformed("empty timestamp".to_string()));
    }

    if let Some(instant) = parse_with_offset(s) {
        return Ok(instant.with_timezone(&tz));
    }

    let naive = NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .ok_or_else(|| TimeError::Malformed(literal.to_string()))?;

    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Ok(dt),
        // Clock rolled back: the same wall time happens twice, take the first.
        LocalResult::Ambiguous(earliest, _) => Ok(earliest),
        LocalResult::None => Err(TimeError::NonexistentLocalTime {
            literal: literal.to_string(),
            tz: tz.name().to_string(),
        }),
    }
}

fn parse_with_offset(s: &str) -> Option<DateTime<FixedOffset>> {
    let utc_suffixed = s
        .strip_suffix('Z')
        .or_else(|| s.strip_suffix('z'))
        .map(|rest| format!("{rest}+00:00"));
    let candidate = utc_suffixed.as_deref().unwrap_or(s);

    DateTime::parse_from_rfc3339(candidate).ok().or_else(|| {
        OFFSET_FORMATS
            .iter()
            .find_map(|fmt| DateTime::parse_from_str(candidate, fmt).ok())
    })
}

/// Half-open `[start, end)` span. Endpoints compare as instants, so two
/// intervals expressed in different zones are equal when they cover the same time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Interval {
    start: DateTime<Tz>,
    end: DateTime<Tz>,
}

impl Interval {
    pub fn new(start: DateTime<Tz>, end: DateTime<Tz>) -> Result<Self, TimeError> {
        if start >= end {
            return Err(TimeError::EmptyInterval {
                start: start.to_rfc3339(),
                end: end.to_rfc3339(),
            });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> DateTime<Tz> {
        self.start
    }

    pub fn end(&self) -> DateTime<Tz> {
        self.end
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    pub fn overlaps(&self, other_start: DateTime<Tz>, other_end: DateTime<Tz>) -> bool {
        self.start < other_end && other_start < self.end
    }

    pub fn with_timezone(&self, tz: Tz) -> Self {
        Self {
            start: self.start.with_timezone(&tz),
            end: self.end.with_timezone(&tz),
        }
    }
}

/// An occupied range as reported by the calendar, in whatever offset it used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusyPeriod {
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
}

impl BusyPeriod {
    pub fn new(start: DateTime<FixedOffset>, end: DateTime<FixedOffset>) -> Self {
        Self { start, end }
    }

    pub fn in_timezone(&self, tz: Tz) -> (DateTime<Tz>, DateTime<Tz>) {
        (self.start.with_timezone(&tz), self.end.with_timezone(&tz))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    fn ist() -> Tz {
        parse_timezone("Asia/Kolkata").unwrap()
    }

    #[test]
    fn test_naive_timestamp_is_wall_clock_in_target_zone() {
        let dt = localize("2024-06-01T10:00:00", ist()).unwrap();
        assert_eq!(dt.hour(), 10);
        assert_eq!(dt.minute(), 0);
        assert_eq!(dt.to_rfc3339(), "2024-06-01T10:00:00+05:30");
    }

    #[test]
    fn test_utc_suffix_is_converted() {
        let dt = localize("2024-06-01T10:00:00Z", ist()).unwrap();
        assert_eq!(dt.hour(), 15);
        assert_eq!(dt.minute(), 30);
    }

    #[test]
    fn test_explicit_offset_is_converted() {
        let dt = localize("2024-06-01T10:00:00-04:00", ist()).unwrap();
        assert_eq!(dt.to_rfc3339(), "2024-06-01T19:30:00+05:30");

        let compact = localize("2024-06-01T10:00:00+0000", ist()).unwrap();
        assert_eq!(compact.to_rfc3339(), "2024-06-01T15:30:00+05:30");
    }

    #[test]
    fn test_short_and_spaced_forms() {
        let no_seconds = localize("2024-06-01T09:15", ist()).unwrap();
        assert_eq!(no_seconds.to_rfc3339(), "2024-06-01T09:15:00+05:30");

        let spaced = localize("2024-06-01 09:15:00", ist()).unwrap();
        assert_eq!(spaced, no_seconds);

        let fractional = localize("2024-06-01T09:15:00.000Z", ist()).unwrap();
        assert_eq!(fractional.to_rfc3339(), "2024-06-01T14:45:00+05:30");
    }

    #[test]
    fn test_date_only_is_local_midnight() {
        let dt = localize("2024-06-01", ist()).unwrap();
        assert_eq!(dt.to_rfc3339(), "2024-06-01T00:00:00+05:30");
    }

    #[test]
    fn test_malformed_timestamp() {
        assert!(matches!(
            localize("tomorrow at ten", ist()),
            Err(TimeError::Malformed(_))
        ));
        assert!(matches!(localize("  ", ist()), Err(TimeError::Malformed(_))));
    }

    #[test]
    fn test_unknown_timezone() {
        assert_eq!(
            parse_timezone("Mars/Olympus_Mons"),
            Err(TimeError::UnknownTimezone("Mars/Olympus_Mons".to_string()))
        );
    }

    #[test]
    fn test_dst_gap_is_rejected_and_fold_takes_earliest() {
        let ny = parse_timezone("America/New_York").unwrap();
        // 2024-03-10 02:30 never happened in New York
        assert!(matches!(
            localize("2024-03-10T02:30:00", ny),
            Err(TimeError::NonexistentLocalTime { .. })
        ));
        // 2024-11-03 01:30 happened twice; first pass is EDT (-04:00)
        let folded = localize("2024-11-03T01:30:00", ny).unwrap();
        assert_eq!(folded.to_rfc3339(), "2024-11-03T01:30:00-04:00");
    }

    #[test]
    fn test_interval_requires_start_before_end() {
        let a = localize("2024-06-01T10:00:00", ist()).unwrap();
        let b = localize("2024-06-01T10:30:00", ist()).unwrap();
        assert!(Interval::new(a, b).is_ok());
        assert!(Interval::new(b, a).is_err());
        assert!(Interval::new(a, a).is_err());
    }

    #[test]
    fn test_interval_equality_across_zones() {
        let utc = parse_timezone("UTC").unwrap();
        let ist_iv = Interval::new(
            localize("2024-06-01T10:00:00", ist()).unwrap(),
            localize("2024-06-01T11:00:00", ist()).unwrap(),
        )
        .unwrap();
        let utc_iv = Interval::new(
            localize("2024-06-01T04:30:00", utc).unwrap(),
            localize("2024-06-01T05:30:00", utc).unwrap(),
        )
        .unwrap();
        assert_eq!(ist_iv, utc_iv);
        assert_eq!(ist_iv.duration(), Duration::hours(1));
    }

    #[test]
    fn test_interval_ordering_by_start_then_end() {
        let t = |s: &str| localize(s, ist()).unwrap();
        let short = Interval::new(t("2024-06-01T10:00"), t("2024-06-01T10:30")).unwrap();
        let long = Interval::new(t("2024-06-01T10:00"), t("2024-06-01T11:00")).unwrap();
        let later = Interval::new(t("2024-06-01T09:00"), t("2024-06-01T12:00")).unwrap();
        let mut v = vec![long, short, later];
        v.sort();
        assert_eq!(v, vec![later, short, long]);
    }

    #[test]
    fn test_half_open_overlap() {
        let t = |s: &str| localize(s, ist()).unwrap();
        let iv = Interval::new(t("2024-06-01T10:00"), t("2024-06-01T10:30")).unwrap();
        assert!(!iv.overlaps(t("2024-06-01T10:30"), t("2024-06-01T11:00")));
        assert!(!iv.overlaps(t("2024-06-01T09:30"), t("2024-06-01T10:00")));
        assert!(iv.overlaps(t("2024-06-01T10:29"), t("2024-06-01T11:00")));
    }
}
