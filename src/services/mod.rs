pub mod appointments;
pub mod calendar;
pub mod calls;
pub mod events;
pub mod registry;
pub mod scheduling;
pub mod telephony;
pub mod voice;
