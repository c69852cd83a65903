//! Stepped volume fades
//!
//! Volume moves one percent per step. A fade-in climbs to a ceiling, a
//! fade-out falls to silence. Steps that fell behind (a late wakeup) are
//! caught up in a single poll.

use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FadeDirection {
    In,
    Out,
}

#[derive(Debug, Clone, Copy)]
struct ActiveFade {
    direction: FadeDirection,
    ceiling: u8,
    interval: Duration,
    next_step: Instant,
}

/// Outcome of a poll
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FadeProgress {
    /// New volume to apply, if any step ran
    pub volume: Option<f32>,
    /// Set when the fade reached its target during this poll
    pub finished: Option<FadeDirection>,
}

/// Volume ramp in whole percent
#[derive(Debug, Clone, Default)]
pub struct FadeRamp {
    level: u8,
    active: Option<ActiveFade>,
}

impl FadeRamp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn level(&self) -> u8 {
        self.level
    }

    pub fn volume(&self) -> f32 {
        f32::from(self.level) / 100.0
    }

    /// Back to silence with nothing scheduled
    pub fn reset(&mut self) {
        self.level = 0;
        self.active = None;
    }

    /// Climb to `ceiling` percent, first step after `delay`
    pub fn fade_in(&mut self, now: Instant, ceiling: u8, interval: Duration, delay: Duration) {
        self.active = Some(ActiveFade {
            direction: FadeDirection::In,
            ceiling: ceiling.min(100),
            interval,
            next_step: now + delay,
        });
    }

    /// Fall to silence from the current level, first step due immediately
    pub fn fade_out(&mut self, now: Instant, interval: Duration) {
        self.active = Some(ActiveFade {
            direction: FadeDirection::Out,
            ceiling: 0,
            interval,
            next_step: now,
        });
    }

    pub fn cancel(&mut self) -> bool {
        self.active.take().is_some()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.active.map(|fade| fade.next_step)
    }

    /// Run every step due at `now`
    pub fn poll(&mut self, now: Instant) -> FadeProgress {
        let mut progress = FadeProgress::default();

        while let Some(fade) = self.active.as_mut() {
            if fade.next_step > now {
                break;
            }

            let done = match fade.direction {
                FadeDirection::In if self.level < fade.ceiling => {
                    self.level += 1;
                    self.level >= fade.ceiling
                }
                FadeDirection::Out if self.level > 0 => {
                    self.level -= 1;
                    self.level == 0
                }
                _ => true,
            };

            let direction = fade.direction;
            fade.next_step += fade.interval;
            progress.volume = Some(f32::from(self.level) / 100.0);

            if done {
                self.active = None;
                progress.finished = Some(direction);
            }
        }

        progress
    }
}
