//! Centralized configuration for nightwake
//!
//! Stations, alarms and every tunable value live here with sensible
//! defaults. The file is loaded and stored through confy.

use std::time::Duration;

use nightwake_core::{AlarmDefinition, FavoriteStations};
use serde::{Deserialize, Serialize};

/// Application name used for the config file location
pub const APP_NAME: &str = "nightwake";

/// Highest value of the alarm volume setting
pub const MAX_ALARM_VOLUME: u8 = 7;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NightwakeConfig {
    /// Alarm sound settings
    pub alarm: AlarmSettings,
    /// Fade and watchdog timings
    pub playback: PlaybackSettings,
    /// External media player settings
    pub player: PlayerSettings,
    /// Connectivity probe settings
    pub network: NetworkSettings,
    /// System mixer settings
    pub mixer: MixerSettings,
    /// Local fallback alarm tones
    pub tones: ToneSettings,
    /// Timing/delay settings for daemon operations
    pub timing: TimingSettings,
    /// Favorite stations, indexed from 0
    pub stations: FavoriteStations,
    /// Configured alarms
    pub alarms: Vec<AlarmDefinition>,
}

/// Load the configuration from its default location
pub fn load() -> Result<NightwakeConfig, confy::ConfyError> {
    confy::load(APP_NAME, None)
}

/// Store the configuration at its default location
pub fn store(config: &NightwakeConfig) -> Result<(), confy::ConfyError> {
    confy::store(APP_NAME, None, config)
}

/// Alarm sound settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlarmSettings {
    /// Alarm volume level, 0 to MAX_ALARM_VOLUME
    pub volume: u8,
    /// How far below full volume the fade-in stops, in percent
    pub volume_reduction_percent: u8,
    /// Length of the fade-in from silence
    pub fade_in_duration_secs: u64,
    /// Vibrate while the alarm stream plays
    pub vibrate: bool,
}

impl Default for AlarmSettings {
    fn default() -> Self {
        Self {
            volume: 5,
            volume_reduction_percent: 0,
            fade_in_duration_secs: 30,
            vibrate: false,
        }
    }
}

impl AlarmSettings {
    /// Percentage at which the alarm fade-in stops
    pub fn fade_ceiling_percent(&self) -> u8 {
        100 - self.volume_reduction_percent.min(100)
    }

    /// Time between single-percent fade-in steps
    pub fn fade_step_interval(&self) -> Duration {
        match self.fade_ceiling_percent() {
            0 => Duration::ZERO,
            ceiling => Duration::from_millis(self.fade_in_duration_secs * 1000 / u64::from(ceiling)),
        }
    }
}

/// Fade and watchdog timings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackSettings {
    /// Length of the radio fade-in from silence to full volume
    pub radio_fade_in_ms: u64,
    /// Length of the sleep-timer fade-out from full volume
    pub sleep_fade_out_ms: u64,
    /// After this long an alarm stream failure no longer falls back
    pub fallback_grace_secs: u64,
    /// An alarm session is force-stopped after this many minutes
    pub alarm_watchdog_minutes: u64,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            radio_fade_in_ms: 5000,
            sleep_fade_out_ms: 5000,
            fallback_grace_secs: 120,
            alarm_watchdog_minutes: 120,
        }
    }
}

impl PlaybackSettings {
    pub fn radio_fade_step(&self) -> Duration {
        Duration::from_millis(self.radio_fade_in_ms / 100)
    }

    pub fn sleep_fade_step(&self) -> Duration {
        Duration::from_millis(self.sleep_fade_out_ms / 100)
    }

    pub fn fallback_grace(&self) -> Duration {
        Duration::from_secs(self.fallback_grace_secs)
    }

    pub fn alarm_watchdog(&self) -> Duration {
        Duration::from_secs(self.alarm_watchdog_minutes * 60)
    }
}

/// External media player settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerSettings {
    /// Player executable
    pub command: String,
    /// Extra arguments passed before the stream URL
    pub extra_args: Vec<String>,
    /// How long to wait for the player's IPC socket (milliseconds)
    pub ipc_connect_timeout_ms: u64,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            command: "mpv".to_string(),
            extra_args: Vec::new(),
            ipc_connect_timeout_ms: 5000,
        }
    }
}

/// Connectivity probe settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkSettings {
    /// Address probed with a TCP connect to decide reachability
    pub probe_address: String,
    /// Probe timeout in milliseconds
    pub probe_timeout_ms: u64,
    /// Seconds between background probes
    pub probe_interval_secs: u64,
    /// Whether the connection counts as high bandwidth
    pub high_bandwidth: bool,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            probe_address: "1.1.1.1:53".to_string(),
            probe_timeout_ms: 1500,
            probe_interval_secs: 20,
            high_bandwidth: true,
        }
    }
}

/// System mixer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MixerSettings {
    /// Override the system volume while an alarm plays
    pub enabled: bool,
    /// amixer simple control name
    pub control: String,
    /// Mixer program
    pub command: String,
}

impl Default for MixerSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            control: "Master".to_string(),
            command: "amixer".to_string(),
        }
    }
}

/// Local fallback alarm tones
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToneSettings {
    /// Master volume (0.0 - 1.0), scaled by the alarm volume level
    pub volume: f32,
    /// Rising notes at the start of each round (C5, E5, G5)
    pub frequencies: [f32; 3],
    /// Frequency of the closing beeps
    pub beep_frequency: f32,
    /// Duration of each note in milliseconds
    pub note_duration_ms: u64,
    /// Duration of each beep in milliseconds
    pub beep_duration_ms: u64,
    /// Pause between notes in milliseconds
    pub note_pause_ms: u64,
    /// Pause after each beep in milliseconds
    pub beep_pause_ms: u64,
    /// Silence between rounds in milliseconds
    pub round_pause_ms: u64,
    /// Sample rate for silence generation
    pub sample_rate: u32,
}

impl Default for ToneSettings {
    fn default() -> Self {
        Self {
            volume: 0.5,
            frequencies: [523.25, 659.25, 783.99],
            beep_frequency: 880.0, // A5
            note_duration_ms: 200,
            beep_duration_ms: 150,
            note_pause_ms: 50,
            beep_pause_ms: 100,
            round_pause_ms: 600,
            sample_rate: 44100,
        }
    }
}

/// Timing/delay settings for daemon operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingSettings {
    /// Time to wait for daemon to start up (milliseconds)
    pub daemon_startup_wait_ms: u64,
    /// Longest the daemon sleeps between alarm checks (seconds)
    pub tick_interval_secs: u64,
    /// IPC message buffer size
    pub ipc_buffer_size: usize,
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            daemon_startup_wait_ms: 500,
            tick_interval_secs: 1,
            ipc_buffer_size: 8192,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nightwake_core::{RadioStation, TimeOfDay, WeekdayMask};

    #[test]
    fn test_default_config() {
        let config = NightwakeConfig::default();
        assert_eq!(config.alarm.volume, 5);
        assert_eq!(config.playback.fallback_grace_secs, 120);
        assert_eq!(config.playback.alarm_watchdog_minutes, 120);
        assert_eq!(config.player.command, "mpv");
        assert_eq!(config.timing.daemon_startup_wait_ms, 500);
        assert!(config.stations.is_empty());
        assert!(config.alarms.is_empty());
    }

    #[test]
    fn test_fade_ceiling_and_interval() {
        let settings = AlarmSettings {
            volume_reduction_percent: 20,
            fade_in_duration_secs: 40,
            ..AlarmSettings::default()
        };
        assert_eq!(settings.fade_ceiling_percent(), 80);
        assert_eq!(settings.fade_step_interval(), Duration::from_millis(500));
    }

    #[test]
    fn test_full_reduction_has_no_fade() {
        let settings = AlarmSettings {
            volume_reduction_percent: 150,
            ..AlarmSettings::default()
        };
        assert_eq!(settings.fade_ceiling_percent(), 0);
        assert_eq!(settings.fade_step_interval(), Duration::ZERO);
    }

    #[test]
    fn test_playback_steps() {
        let playback = PlaybackSettings::default();
        assert_eq!(playback.radio_fade_step(), Duration::from_millis(50));
        assert_eq!(playback.sleep_fade_step(), Duration::from_millis(50));
        assert_eq!(playback.fallback_grace(), Duration::from_secs(120));
        assert_eq!(playback.alarm_watchdog(), Duration::from_secs(7200));
    }

    #[test]
    fn test_config_serialization() {
        let mut config = NightwakeConfig::default();
        config
            .stations
            .push(RadioStation::new("Jazz", "http://example.com/jazz"));
        config.alarms.push(
            AlarmDefinition::new(TimeOfDay::new(6, 30).unwrap())
                .with_days(WeekdayMask::WEEKDAYS)
                .with_station(Some(0)),
        );

        let json = serde_json::to_string(&config).unwrap();
        let parsed: NightwakeConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.stations.len(), 1);
        assert_eq!(parsed.alarms, config.alarms);
        assert_eq!(parsed.alarm, config.alarm);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let parsed: NightwakeConfig =
            serde_json::from_str(r#"{"alarm": {"volume": 7}}"#).unwrap();
        assert_eq!(parsed.alarm.volume, 7);
        assert_eq!(parsed.alarm.fade_in_duration_secs, 30);
        assert_eq!(parsed.player.command, "mpv");
    }
}
