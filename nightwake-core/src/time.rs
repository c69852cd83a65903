//! Wall-clock value types for alarm definitions
//!
//! Supports the formats used in configuration and on the command line:
//! - Time of day: "07:30", "7:30", "23:05"
//! - Weekdays: "mon", "monday", "tue", "tues", ... (comma or space separated)
//! - Shorthands: "weekdays", "weekends", "daily"

use std::fmt;

use chrono::{NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// A time of day with minute resolution, always within 00:00..=23:59
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeOfDay {
    hour: u8,
    minute: u8,
}

impl TimeOfDay {
    /// Create a time of day, rejecting out-of-range components
    pub fn new(hour: u32, minute: u32) -> Result<Self> {
        if hour > 23 {
            return Err(CoreError::OutOfRange {
                field: "hour",
                value: hour,
                max: 23,
            });
        }
        if minute > 59 {
            return Err(CoreError::OutOfRange {
                field: "minute",
                value: minute,
                max: 59,
            });
        }
        Ok(Self {
            hour: hour as u8,
            minute: minute as u8,
        })
    }

    pub fn hour(&self) -> u32 {
        self.hour as u32
    }

    pub fn minute(&self) -> u32 {
        self.minute as u32
    }

    pub fn to_naive_time(self) -> NaiveTime {
        NaiveTime::from_hms_opt(self.hour(), self.minute(), 0).unwrap_or(NaiveTime::MIN)
    }

    /// Parse "HH:MM" or "H:MM"
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        let Some((h, m)) = input.split_once(':') else {
            return Err(CoreError::invalid_time(input));
        };
        let digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
        if m.len() != 2 || !(1..=2).contains(&h.len()) || !digits(h) || !digits(m) {
            return Err(CoreError::invalid_time(input));
        }

        let number = |part: &str| {
            part.parse::<u32>().map_err(|e| CoreError::InvalidTime {
                input: input.to_string(),
                source: Some(e),
            })
        };
        Self::new(number(h)?, number(m)?)
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl TryFrom<String> for TimeOfDay {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<TimeOfDay> for String {
    fn from(time: TimeOfDay) -> Self {
        time.to_string()
    }
}

/// Set of weekdays on which an alarm repeats. Empty means one-shot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct WeekdayMask(u8);

const ALL_DAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

impl WeekdayMask {
    pub const EMPTY: WeekdayMask = WeekdayMask(0);
    pub const WEEKDAYS: WeekdayMask = WeekdayMask(0b001_1111);
    pub const WEEKENDS: WeekdayMask = WeekdayMask(0b110_0000);
    pub const DAILY: WeekdayMask = WeekdayMask(0b111_1111);

    fn bit(day: Weekday) -> u8 {
        1 << day.num_days_from_monday()
    }

    /// Build a mask from raw bits (Monday = bit 0); bits above Sunday are dropped
    pub fn from_bits(bits: u8) -> Self {
        Self(bits & Self::DAILY.0)
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn contains(&self, day: Weekday) -> bool {
        self.0 & Self::bit(day) != 0
    }

    pub fn insert(&mut self, day: Weekday) {
        self.0 |= Self::bit(day);
    }

    pub fn with(mut self, day: Weekday) -> Self {
        self.insert(day);
        self
    }

    /// Days in the mask, Monday first
    pub fn days(&self) -> impl Iterator<Item = Weekday> + '_ {
        ALL_DAYS.into_iter().filter(|d| self.contains(*d))
    }

    /// Parse a list like "mon,wed fri" or one of the shorthands
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim().to_lowercase();
        match input.as_str() {
            "" | "once" | "none" => return Ok(Self::EMPTY),
            "weekdays" => return Ok(Self::WEEKDAYS),
            "weekends" => return Ok(Self::WEEKENDS),
            "daily" | "everyday" => return Ok(Self::DAILY),
            _ => {}
        }

        input
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|s| !s.is_empty())
            .try_fold(Self::EMPTY, |mask, name| Ok(mask.with(parse_weekday(name)?)))
    }
}

impl FromIterator<Weekday> for WeekdayMask {
    fn from_iter<I: IntoIterator<Item = Weekday>>(iter: I) -> Self {
        iter.into_iter().fold(Self::EMPTY, |mask, day| mask.with(day))
    }
}

impl fmt::Display for WeekdayMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::EMPTY => write!(f, "once"),
            Self::DAILY => write!(f, "daily"),
            Self::WEEKDAYS => write!(f, "weekdays"),
            Self::WEEKENDS => write!(f, "weekends"),
            _ => {
                let names: Vec<String> = self.days().map(|d| d.to_string()).collect();
                write!(f, "{}", names.join(" "))
            }
        }
    }
}

impl TryFrom<Vec<String>> for WeekdayMask {
    type Error = CoreError;

    fn try_from(names: Vec<String>) -> Result<Self> {
        names
            .iter()
            .try_fold(Self::EMPTY, |mask, name| Ok(mask.with(parse_weekday(name)?)))
    }
}

impl From<WeekdayMask> for Vec<String> {
    fn from(mask: WeekdayMask) -> Self {
        mask.days().map(|d| d.to_string().to_lowercase()).collect()
    }
}

/// Parse a single weekday name
pub fn parse_weekday(input: &str) -> Result<Weekday> {
    match input.trim().to_lowercase().as_str() {
        "monday" | "mon" => Ok(Weekday::Mon),
        "tuesday" | "tue" | "tues" => Ok(Weekday::Tue),
        "wednesday" | "wed" => Ok(Weekday::Wed),
        "thursday" | "thu" | "thur" | "thurs" => Ok(Weekday::Thu),
        "friday" | "fri" => Ok(Weekday::Fri),
        "saturday" | "sat" => Ok(Weekday::Sat),
        "sunday" | "sun" => Ok(Weekday::Sun),
        other => Err(CoreError::UnknownWeekday(other.to_string())),
    }
}
