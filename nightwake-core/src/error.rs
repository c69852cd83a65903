//! Errors for alarm and station values
//!
//! Only malformed input and missing entries; no I/O.

use std::num::ParseIntError;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Alarm #{0} not found")]
    AlarmNotFound(usize),

    #[error("Station #{0} not configured")]
    StationNotFound(usize),

    #[error("Invalid time '{input}', expected HH:MM")]
    InvalidTime {
        input: String,
        #[source]
        source: Option<ParseIntError>,
    },

    #[error("{field} {value} is outside 0-{max}")]
    OutOfRange {
        field: &'static str,
        value: u32,
        max: u32,
    },

    #[error("Unknown weekday '{0}', try 'mon', 'tuesday', 'weekdays' or 'daily'")]
    UnknownWeekday(String),
}

impl CoreError {
    pub(crate) fn invalid_time(input: &str) -> Self {
        Self::InvalidTime {
            input: input.to_string(),
            source: None,
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let err = CoreError::OutOfRange {
            field: "hour",
            value: 24,
            max: 23,
        };
        assert_eq!(err.to_string(), "hour 24 is outside 0-23");
        assert_eq!(
            CoreError::invalid_time("7h").to_string(),
            "Invalid time '7h', expected HH:MM"
        );
    }
}
