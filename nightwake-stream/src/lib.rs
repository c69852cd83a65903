//! Nightwake streaming: alarm and radio sessions
//!
//! [`StreamController`] owns the single playback session and all of its
//! timers. The daemon wraps it together with the alarm scheduler and
//! serves it over a local socket; the desktop collaborators (mpv, rodio,
//! amixer, desktop notifications) live in `player`, `audio` and `system`.

pub mod audio;
pub mod client;
pub mod collaborators;
pub mod config;
pub mod controller;
pub mod daemon;
pub mod error;
pub mod fade;
pub mod ipc;
pub mod player;
pub mod scheduler;
pub mod session;
pub mod system;
pub mod timer;

pub use collaborators::{
    Alerts, Collaborators, FallbackAlarm, Haptics, MediaPlayer, Network, Notice, PlayerEnvelope,
    PlayerEvent, PlayerEventSink, StationStore, SystemVolume,
};
pub use config::NightwakeConfig;
pub use controller::StreamController;
pub use error::{Result, StreamError, StreamErrorKind};
pub use session::{AlarmConfig, SessionSnapshot, StreamEvent, StreamingMode};
