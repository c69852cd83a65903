//! Session state owned by the controller
//!
//! Which fields exist depends on the mode, so the session is a sum type.
//! Alarm-only timers cannot linger once the session ends because they live
//! inside the alarm variant.

use std::fmt;

use nightwake_core::{AlarmDefinition, RadioStation};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::config::AlarmSettings;
use crate::error::StreamErrorKind;
use crate::timer::Deadline;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreamingMode {
    Inactive,
    Alarm,
    Radio,
}

impl fmt::Display for StreamingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            StreamingMode::Inactive => "inactive",
            StreamingMode::Alarm => "alarm",
            StreamingMode::Radio => "radio",
        };
        f.write_str(text)
    }
}

/// Parameters of one alarm session
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlarmConfig {
    /// The alarm that fired, absent for manual tests
    pub alarm: Option<AlarmDefinition>,
    pub settings: AlarmSettings,
}

impl AlarmConfig {
    pub fn new(alarm: Option<AlarmDefinition>, settings: AlarmSettings) -> Self {
        Self { alarm, settings }
    }
}

/// State shared by alarm and radio sessions
#[derive(Debug, Clone)]
pub struct ActiveStream {
    /// Tag carried by player events for this session
    pub generation: u64,
    pub station_index: usize,
    pub station: Option<RadioStation>,
    pub started_at: Instant,
    pub ready_since: Option<Instant>,
}

impl ActiveStream {
    pub fn is_ready(&self) -> bool {
        self.ready_since.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct AlarmSession {
    pub stream: ActiveStream,
    pub config: AlarmConfig,
    /// Cleared once the grace window closes
    pub fallback_armed: bool,
    pub grace: Deadline,
    pub watchdog: Deadline,
}

#[derive(Debug, Clone)]
pub struct RadioSession {
    pub stream: ActiveStream,
    /// Last title reported by the stream
    pub metadata: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub enum Session {
    #[default]
    Inactive,
    Alarm(AlarmSession),
    Radio(RadioSession),
}

impl Session {
    pub fn mode(&self) -> StreamingMode {
        match self {
            Session::Inactive => StreamingMode::Inactive,
            Session::Alarm(_) => StreamingMode::Alarm,
            Session::Radio(_) => StreamingMode::Radio,
        }
    }

    pub fn stream(&self) -> Option<&ActiveStream> {
        match self {
            Session::Inactive => None,
            Session::Alarm(alarm) => Some(&alarm.stream),
            Session::Radio(radio) => Some(&radio.stream),
        }
    }
}

/// Point-in-time view of the controller for status reports
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub mode: StreamingMode,
    pub station_index: Option<usize>,
    pub station_name: Option<String>,
    pub ready: bool,
    pub volume: f32,
    pub metadata: Option<String>,
    pub sleep_deadline_epoch_ms: Option<i64>,
    pub fallback_sounding: bool,
}

/// Broadcast to observers of the controller
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Started {
        mode: StreamingMode,
        station_index: usize,
    },
    ReadyForPlayback {
        mode: StreamingMode,
        station_index: usize,
    },
    MetadataChanged(String),
    PlaybackError(StreamErrorKind),
    FallbackStarted,
    FallbackStopped,
    SleepTimerChanged(Option<i64>),
    Stopped {
        previous: StreamingMode,
    },
}
