pub mod calendar;
pub mod calls;
pub mod dashboard;
pub mod events;
pub mod health;
pub mod twiml;
pub mod webhook;
