pub mod appointment;
pub mod call;
pub mod interval;
pub mod slot;

pub use appointment::{contact_tag, Appointment, AppointmentDraft, DEFAULT_TITLE};
pub use call::{CallEvent, CallState, InboundCallSummary, VoiceCall};
pub use interval::{localize, parse_timezone, BusyPeriod, Interval, TimeError};
pub use slot::{duration_from_minutes, SlotRequest, SlotView};
