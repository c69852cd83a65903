//! Alarm definitions and next-trigger resolution
//!
//! Resolution is pure: every function takes the reference instant
//! explicitly, so callers decide which clock and time zone apply.

use std::fmt;

use chrono::{DateTime, Datelike, Days, NaiveDate, NaiveDateTime, TimeDelta, TimeZone};
use serde::{Deserialize, Serialize};

use crate::time::{TimeOfDay, WeekdayMask};

/// A configured wake-up alarm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AlarmDefinition {
    pub time: TimeOfDay,
    /// Repeat days; empty means the alarm fires once
    #[serde(default)]
    pub days: WeekdayMask,
    /// Favorite station to stream, `None` uses the local alarm sound
    #[serde(default)]
    pub station_index: Option<usize>,
}

impl AlarmDefinition {
    pub fn new(time: TimeOfDay) -> Self {
        Self {
            time,
            days: WeekdayMask::EMPTY,
            station_index: None,
        }
    }

    /// Builder method to set the repeat days
    pub fn with_days(mut self, days: WeekdayMask) -> Self {
        self.days = days;
        self
    }

    /// Builder method to set the station
    pub fn with_station(mut self, station_index: Option<usize>) -> Self {
        self.station_index = station_index;
        self
    }

    pub fn is_recurring(&self) -> bool {
        !self.days.is_empty()
    }

    /// Next instant this alarm fires strictly after `reference`
    pub fn next_trigger<Tz: TimeZone>(&self, reference: &DateTime<Tz>) -> DateTime<Tz> {
        next_trigger(self, reference)
    }
}

impl fmt::Display for AlarmDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.time, self.days)?;
        if let Some(station) = self.station_index {
            write!(f, " (station {})", station)?;
        }
        Ok(())
    }
}

/// Resolve the next trigger of `def` strictly after `reference`
///
/// One-shot alarms fire today if the time is still ahead, otherwise
/// tomorrow. Recurring alarms scan up to a week ahead for the first
/// enabled weekday; today only counts if its trigger is still ahead.
/// An exact match with `reference` counts as already passed.
pub fn next_trigger<Tz: TimeZone>(def: &AlarmDefinition, reference: &DateTime<Tz>) -> DateTime<Tz> {
    let today = reference.date_naive();

    if def.days.is_empty() {
        let candidate = at_local(&reference.timezone(), today, def.time);
        if candidate > *reference {
            return candidate;
        }
        return at_local(&reference.timezone(), add_days(today, 1), def.time);
    }

    for offset in 0..=7 {
        let day = add_days(today, offset);
        if !def.days.contains(day.weekday()) {
            continue;
        }
        let candidate = at_local(&reference.timezone(), day, def.time);
        if candidate > *reference {
            return candidate;
        }
    }

    // Offset 7 is today's weekday again and therefore always in the mask
    at_local(&reference.timezone(), add_days(today, 7), def.time)
}

/// The definition whose next trigger comes first; the lowest index wins ties
pub fn next_from_list<'a, Tz: TimeZone>(
    defs: &'a [AlarmDefinition],
    reference: &DateTime<Tz>,
) -> Option<&'a AlarmDefinition> {
    defs.iter().min_by_key(|def| next_trigger(*def, reference))
}

fn add_days(date: NaiveDate, days: u64) -> NaiveDate {
    date.checked_add_days(Days::new(days)).unwrap_or(NaiveDate::MAX)
}

/// Map a local wall-clock time to an instant in `tz`
///
/// Ambiguous times (clocks going back) take the earlier instant. Times
/// inside a spring-forward gap move to the first minute after the gap.
fn at_local<Tz: TimeZone>(tz: &Tz, date: NaiveDate, time: TimeOfDay) -> DateTime<Tz> {
    let naive = NaiveDateTime::new(date, time.to_naive_time());

    if let Some(dt) = tz.from_local_datetime(&naive).earliest() {
        return dt;
    }

    let mut shifted = naive;
    for _ in 0..(24 * 60) {
        shifted += TimeDelta::minutes(1);
        if let Some(dt) = tz.from_local_datetime(&shifted).earliest() {
            return dt;
        }
    }

    tz.from_utc_datetime(&naive)
}
