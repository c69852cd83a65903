//! Nightwake Core - Pure domain logic for alarms and radio stations
//!
//! This crate contains no I/O operations. Scheduling, playback and
//! persistence are handled by the crates that consume it.

pub mod alarm;
pub mod error;
pub mod station;
pub mod time;

pub use alarm::{AlarmDefinition, next_from_list, next_trigger};
pub use error::{CoreError, Result};
pub use station::{FavoriteStations, RadioStation};
pub use time::{TimeOfDay, WeekdayMask};
