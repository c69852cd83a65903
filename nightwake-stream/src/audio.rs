//! Local fallback alarm
//!
//! Uses rodio to play generated tones, round after round, until stopped.
//! Playback runs on its own thread since the output stream is not `Send`.
//! Stopping only signals that thread; it winds down within one poll.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;

use rodio::source::{SineWave, Zero};
use rodio::{OutputStreamBuilder, Sink, Source};
use tracing::{debug, warn};

use crate::collaborators::FallbackAlarm;
use crate::config::{MAX_ALARM_VOLUME, ToneSettings};
use crate::session::AlarmConfig;

const STOP_POLL: Duration = Duration::from_millis(200);

/// Tone alarm played through the default output device
pub struct LocalAlarm {
    tones: ToneSettings,
    stop: Option<mpsc::Sender<()>>,
}

impl LocalAlarm {
    pub fn new(tones: ToneSettings) -> Self {
        Self {
            tones,
            stop: None,
        }
    }
}

impl FallbackAlarm for LocalAlarm {
    fn start_local_alarm(&mut self, config: &AlarmConfig) {
        self.stop_local_alarm();

        let tones = self.tones.clone();
        let amplitude = tone_amplitude(&tones, config.settings.volume);
        let (stop, stop_rx) = mpsc::channel();

        let spawned = std::thread::Builder::new()
            .name("nightwake-alarm".to_string())
            .spawn(move || {
                if let Err(e) = play_until_stopped(&tones, amplitude, &stop_rx) {
                    warn!(error = %e, "failed to play local alarm");
                }
            });
        match spawned {
            Ok(_) => self.stop = Some(stop),
            Err(e) => warn!(error = %e, "could not start local alarm thread"),
        }
    }

    fn stop_local_alarm(&mut self) {
        if let Some(stop) = self.stop.take() {
            // The thread also exits when the sender is dropped
            let _ = stop.send(());
            debug!("local alarm stopping");
        }
    }
}

impl Drop for LocalAlarm {
    fn drop(&mut self) {
        self.stop_local_alarm();
    }
}

/// Tone amplitude scaled by the alarm volume level
fn tone_amplitude(tones: &ToneSettings, level: u8) -> f32 {
    let level = level.min(MAX_ALARM_VOLUME);
    tones.volume * f32::from(level) / f32::from(MAX_ALARM_VOLUME)
}

fn play_until_stopped(
    tones: &ToneSettings,
    amplitude: f32,
    stop: &mpsc::Receiver<()>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let stream = OutputStreamBuilder::open_default_stream()?;
    let sink = Sink::connect_new(stream.mixer());
    debug!(amplitude, "local alarm playing");

    loop {
        if sink.empty() {
            append_round(&sink, tones, amplitude);
        }
        match stop.recv_timeout(STOP_POLL) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {}
        }
    }

    sink.stop();
    Ok(())
}

/// Rising notes, a double beep, then a pause
fn append_round(sink: &Sink, tones: &ToneSettings, amplitude: f32) {
    let note = Duration::from_millis(tones.note_duration_ms);
    let note_pause = Duration::from_millis(tones.note_pause_ms);

    for freq in tones.frequencies {
        sink.append(SineWave::new(freq).take_duration(note).amplify(amplitude));
        sink.append(Zero::new(2, tones.sample_rate).take_duration(note_pause));
    }

    for _ in 0..2 {
        let beep = SineWave::new(tones.beep_frequency)
            .take_duration(Duration::from_millis(tones.beep_duration_ms))
            .amplify(amplitude);
        sink.append(beep);

        let silence = Zero::new(2, tones.sample_rate)
            .take_duration(Duration::from_millis(tones.beep_pause_ms));
        sink.append(silence);
    }

    sink.append(
        Zero::new(2, tones.sample_rate).take_duration(Duration::from_millis(tones.round_pause_ms)),
    );
}
