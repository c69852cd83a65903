//! Seams between the controller and the outside world
//!
//! Every side effect the controller causes goes through one of these
//! traits. Desktop implementations live in `player`, `audio` and `system`.

use nightwake_core::{FavoriteStations, RadioStation};
use tokio::sync::mpsc;
use tracing::trace;

use crate::error::StreamErrorKind;
use crate::session::AlarmConfig;

/// Plays a single network stream at a time
pub trait MediaPlayer: Send {
    /// Prepare `url`; state changes are reported through `events`
    fn load(&mut self, url: &str, events: PlayerEventSink);
    fn play(&mut self);
    fn stop(&mut self);
    /// Linear volume, 0.0 to 1.0
    fn set_volume(&mut self, volume: f32);
    /// Free all player resources; safe to call repeatedly
    fn release(&mut self);
}

pub trait Network: Send {
    fn is_reachable(&self) -> bool;
    fn is_high_bandwidth(&self) -> bool;
}

pub trait StationStore: Send {
    /// The station in slot `index` if it is configured
    fn station_by_index(&self, index: usize) -> Option<RadioStation>;
    /// Next configured slot after `current`, or `current` if there is none
    fn next_available_index(&self, current: usize) -> usize;
    /// Number of configured stations
    fn count(&self) -> usize;
}

impl StationStore for FavoriteStations {
    fn station_by_index(&self, index: usize) -> Option<RadioStation> {
        self.get(index).cloned()
    }

    fn next_available_index(&self, current: usize) -> usize {
        FavoriteStations::next_available_index(self, current)
    }

    fn count(&self) -> usize {
        self.num_available()
    }
}

/// Locally generated alarm sound used when the stream fails
pub trait FallbackAlarm: Send {
    fn start_local_alarm(&mut self, config: &AlarmConfig);
    fn stop_local_alarm(&mut self);
}

pub trait Haptics: Send {
    fn start_vibration(&mut self);
    fn stop_vibration(&mut self);
}

/// System output volume, overridden for the length of an alarm
pub trait SystemVolume: Send {
    fn override_level(&mut self, level: u8, max_level: u8);
    fn restore(&mut self);
}

/// User-visible messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    NoNetwork,
    StationNotConfigured(usize),
    StreamFailed,
}

impl Notice {
    pub fn message(&self) -> String {
        match self {
            Notice::NoNetwork => "No network connection".to_string(),
            Notice::StationNotConfigured(index) => {
                format!("Station #{index} is not configured")
            }
            Notice::StreamFailed => {
                "Radio stream unavailable, playing the local alarm".to_string()
            }
        }
    }
}

pub trait Alerts: Send {
    fn notify(&self, notice: Notice);
}

/// What the player reports back
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    Ready,
    Error(StreamErrorKind),
    Metadata(String),
}

/// A player event tagged with the session it belongs to
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerEnvelope {
    pub generation: u64,
    pub event: PlayerEvent,
}

/// Handle a player uses to report events for one load
#[derive(Debug, Clone)]
pub struct PlayerEventSink {
    generation: u64,
    tx: mpsc::UnboundedSender<PlayerEnvelope>,
}

impl PlayerEventSink {
    pub fn new(generation: u64, tx: mpsc::UnboundedSender<PlayerEnvelope>) -> Self {
        Self { generation, tx }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn ready(&self) {
        self.send(PlayerEvent::Ready);
    }

    pub fn error(&self, kind: StreamErrorKind) {
        self.send(PlayerEvent::Error(kind));
    }

    pub fn metadata(&self, title: impl Into<String>) {
        self.send(PlayerEvent::Metadata(title.into()));
    }

    fn send(&self, event: PlayerEvent) {
        let envelope = PlayerEnvelope {
            generation: self.generation,
            event,
        };
        if self.tx.send(envelope).is_err() {
            trace!("player event dropped, controller gone");
        }
    }
}

/// Everything the controller talks to
pub struct Collaborators {
    pub player: Box<dyn MediaPlayer>,
    pub network: Box<dyn Network>,
    pub stations: Box<dyn StationStore>,
    pub fallback: Box<dyn FallbackAlarm>,
    pub haptics: Box<dyn Haptics>,
    pub volume: Box<dyn SystemVolume>,
    pub alerts: Box<dyn Alerts>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stations() -> FavoriteStations {
        FavoriteStations::new(vec![
            RadioStation::new("One", "http://one"),
            RadioStation::new("Empty", ""),
            RadioStation::new("Three", "http://three"),
        ])
    }

    #[test]
    fn test_station_store_skips_empty_slots() {
        let store = stations();
        assert_eq!(store.station_by_index(0).unwrap().name, "One");
        assert!(store.station_by_index(1).is_none());
        assert!(store.station_by_index(7).is_none());
        assert_eq!(StationStore::count(&store), 2);
        assert_eq!(StationStore::next_available_index(&store, 0), 2);
        assert_eq!(StationStore::next_available_index(&store, 2), 0);
    }

    #[test]
    fn test_event_sink_tags_generation() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = PlayerEventSink::new(4, tx);

        sink.ready();
        sink.metadata("Song");

        assert_eq!(
            rx.try_recv().unwrap(),
            PlayerEnvelope {
                generation: 4,
                event: PlayerEvent::Ready
            }
        );
        assert_eq!(
            rx.try_recv().unwrap().event,
            PlayerEvent::Metadata("Song".to_string())
        );
    }

    #[test]
    fn test_event_sink_survives_closed_channel() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        PlayerEventSink::new(1, tx).error(StreamErrorKind::Source);
    }

    #[test]
    fn test_notice_messages() {
        assert_eq!(
            Notice::StationNotConfigured(2).message(),
            "Station #2 is not configured"
        );
        assert_eq!(Notice::NoNetwork.message(), "No network connection");
    }
}
