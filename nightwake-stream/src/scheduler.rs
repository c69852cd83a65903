//! Alarm scheduling for the daemon
//!
//! Keeps the configured alarms and the one trigger currently armed. After
//! an alarm fires, the next trigger is resolved from the fired instant so
//! the same occurrence cannot fire twice.

use chrono::{DateTime, TimeDelta, TimeZone};
use nightwake_core::{AlarmDefinition, next_from_list, next_trigger};
use tracing::{debug, info, warn};

/// Alarms this late (e.g. after a suspend) are skipped instead of sounding
const MISSED_AFTER_MINUTES: i64 = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct ArmedAlarm<Tz: TimeZone> {
    pub alarm: AlarmDefinition,
    pub trigger: DateTime<Tz>,
}

#[derive(Debug, Clone)]
pub struct AlarmScheduler<Tz: TimeZone> {
    alarms: Vec<AlarmDefinition>,
    armed: Option<ArmedAlarm<Tz>>,
}

impl<Tz: TimeZone> AlarmScheduler<Tz> {
    pub fn new(alarms: Vec<AlarmDefinition>) -> Self {
        Self {
            alarms,
            armed: None,
        }
    }

    pub fn alarms(&self) -> &[AlarmDefinition] {
        &self.alarms
    }

    /// Replace the alarm list; the next poll re-arms from scratch
    pub fn set_alarms(&mut self, alarms: Vec<AlarmDefinition>) {
        self.alarms = alarms;
        self.armed = None;
    }

    /// The armed alarm, arming one against `now` if needed
    pub fn next(&mut self, now: &DateTime<Tz>) -> Option<&ArmedAlarm<Tz>> {
        if self.armed.is_none() {
            self.arm(now);
        }
        self.armed.as_ref()
    }

    pub fn armed(&self) -> Option<&ArmedAlarm<Tz>> {
        self.armed.as_ref()
    }

    /// The alarm due at `now`, if any
    ///
    /// One-shot alarms are removed from the list once they fire.
    pub fn poll_due(&mut self, now: &DateTime<Tz>) -> Option<AlarmDefinition> {
        let armed = self.next(now)?.clone();
        if armed.trigger > *now {
            return None;
        }

        if !armed.alarm.is_recurring() {
            if let Some(pos) = self.alarms.iter().position(|a| *a == armed.alarm) {
                self.alarms.remove(pos);
            }
        }
        self.arm(&armed.trigger);

        let late = now.clone() - armed.trigger.clone();
        if late > TimeDelta::minutes(MISSED_AFTER_MINUTES) {
            warn!(alarm = %armed.alarm, late_minutes = late.num_minutes(), "alarm missed");
            return None;
        }

        info!(alarm = %armed.alarm, "alarm due");
        Some(armed.alarm)
    }

    fn arm(&mut self, reference: &DateTime<Tz>) {
        self.armed = next_from_list(&self.alarms, reference).map(|alarm| ArmedAlarm {
            alarm: *alarm,
            trigger: next_trigger(alarm, reference),
        });
        match &self.armed {
            Some(armed) => debug!(alarm = %armed.alarm, "alarm armed"),
            None => debug!("no alarm armed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;
    use nightwake_core::{TimeOfDay, WeekdayMask};

    fn at(h: u32, m: u32, day: u32) -> DateTime<FixedOffset> {
        // October 2017, +02:00; the 6th is a Friday
        FixedOffset::east_opt(2 * 3600)
            .unwrap()
            .with_ymd_and_hms(2017, 10, day, h, m, 0)
            .unwrap()
    }

    fn alarm(h: u32, m: u32) -> AlarmDefinition {
        AlarmDefinition::new(TimeOfDay::new(h, m).unwrap())
    }

    #[test]
    fn test_empty_list_arms_nothing() {
        let mut scheduler = AlarmScheduler::<FixedOffset>::new(Vec::new());
        assert!(scheduler.next(&at(12, 0, 6)).is_none());
        assert!(scheduler.poll_due(&at(12, 0, 6)).is_none());
    }

    #[test]
    fn test_arms_earliest() {
        let mut scheduler = AlarmScheduler::new(vec![alarm(13, 25), alarm(12, 30)]);
        let armed = scheduler.next(&at(12, 0, 6)).unwrap();
        assert_eq!(armed.alarm, alarm(12, 30));
        assert_eq!(armed.trigger, at(12, 30, 6));
    }

    #[test]
    fn test_one_shot_fires_once_and_is_dropped() {
        let mut scheduler = AlarmScheduler::new(vec![alarm(13, 25)]);
        assert!(scheduler.poll_due(&at(12, 0, 6)).is_none());

        assert_eq!(scheduler.poll_due(&at(13, 25, 6)), Some(alarm(13, 25)));
        assert!(scheduler.alarms().is_empty());
        assert!(scheduler.poll_due(&at(13, 26, 6)).is_none());
        assert!(scheduler.armed().is_none());
    }

    #[test]
    fn test_recurring_rearms_for_next_day() {
        let daily = alarm(7, 0).with_days(WeekdayMask::DAILY);
        let mut scheduler = AlarmScheduler::new(vec![daily]);
        scheduler.next(&at(6, 0, 6));

        assert_eq!(scheduler.poll_due(&at(7, 0, 6)), Some(daily));
        assert!(scheduler.poll_due(&at(7, 0, 6)).is_none());
        assert_eq!(scheduler.armed().unwrap().trigger, at(7, 0, 7));
    }

    #[test]
    fn test_late_alarm_is_skipped() {
        let daily = alarm(7, 0).with_days(WeekdayMask::DAILY);
        let mut scheduler = AlarmScheduler::new(vec![daily]);
        scheduler.next(&at(6, 0, 6));

        assert!(scheduler.poll_due(&at(9, 0, 6)).is_none());
        assert_eq!(scheduler.armed().unwrap().trigger, at(7, 0, 7));
    }

    #[test]
    fn test_set_alarms_rearms() {
        let mut scheduler = AlarmScheduler::new(vec![alarm(13, 25)]);
        scheduler.next(&at(12, 0, 6));

        scheduler.set_alarms(vec![alarm(12, 15)]);
        assert_eq!(scheduler.next(&at(12, 0, 6)).unwrap().trigger, at(12, 15, 6));
    }
}
