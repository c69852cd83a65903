//! Streaming session controller
//!
//! Owns the single playback session of the process. Alarm and radio
//! sessions are mutually exclusive: starting one tears the other down
//! first. All timers (fade steps, sleep, alarm grace window, watchdog) are
//! deadlines in this struct; the owner drives them through
//! [`StreamController::next_deadline`] and [`StreamController::poll_timers`].

use std::time::Duration;

use chrono::{DateTime, Local};
use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::collaborators::{Collaborators, Notice, PlayerEnvelope, PlayerEvent, PlayerEventSink};
use crate::collaborators::StationStore;
use crate::config::{MAX_ALARM_VOLUME, PlaybackSettings};
use crate::error::{Result, StreamError, StreamErrorKind};
use crate::fade::{FadeDirection, FadeRamp};
use crate::session::{
    ActiveStream, AlarmConfig, AlarmSession, RadioSession, Session, SessionSnapshot, StreamEvent,
    StreamingMode,
};
use crate::timer::{Deadline, SleepTimer};

const OBSERVER_CAPACITY: usize = 64;

pub struct StreamController {
    session: Session,
    fade: FadeRamp,
    sleep: SleepTimer,
    fallback_sounding: bool,
    generation: u64,
    playback: PlaybackSettings,
    io: Collaborators,
    player_events: mpsc::UnboundedSender<PlayerEnvelope>,
    observers: broadcast::Sender<StreamEvent>,
}

impl StreamController {
    /// Create an inactive controller
    ///
    /// Player events arrive on the returned receiver and must be fed back
    /// through [`StreamController::handle_player_event`].
    pub fn new(
        io: Collaborators,
        playback: PlaybackSettings,
    ) -> (Self, mpsc::UnboundedReceiver<PlayerEnvelope>) {
        let (player_events, rx) = mpsc::unbounded_channel();
        let (observers, _) = broadcast::channel(OBSERVER_CAPACITY);

        let controller = Self {
            session: Session::Inactive,
            fade: FadeRamp::new(),
            sleep: SleepTimer::default(),
            fallback_sounding: false,
            generation: 0,
            playback,
            io,
            player_events,
            observers,
        };
        (controller, rx)
    }

    pub fn mode(&self) -> StreamingMode {
        self.session.mode()
    }

    pub fn is_ready_for_playback(&self) -> bool {
        self.session.stream().is_some_and(ActiveStream::is_ready)
    }

    pub fn is_fallback_sounding(&self) -> bool {
        self.fallback_sounding
    }

    /// Station index of the running radio session
    pub fn current_radio_station_index(&self) -> Option<usize> {
        match &self.session {
            Session::Radio(radio) => Some(radio.stream.station_index),
            _ => None,
        }
    }

    pub fn is_sleep_timer_set(&self) -> bool {
        self.sleep.is_set()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StreamEvent> {
        self.observers.subscribe()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let stream = self.session.stream();
        SessionSnapshot {
            mode: self.mode(),
            station_index: stream.map(|s| s.station_index),
            station_name: stream.and_then(|s| s.station.as_ref()).map(|s| s.name.clone()),
            ready: self.is_ready_for_playback(),
            volume: self.fade.volume(),
            metadata: match &self.session {
                Session::Radio(radio) => radio.metadata.clone(),
                _ => None,
            },
            sleep_deadline_epoch_ms: self.sleep.wall_deadline().map(|d| d.timestamp_millis()),
            fallback_sounding: self.fallback_sounding,
        }
    }

    /// Swap the station list, e.g. after a configuration reload
    pub fn replace_stations(&mut self, stations: Box<dyn StationStore>) {
        self.io.stations = stations;
    }

    /// Start streaming `station` as an alarm
    ///
    /// Without network this is a no-op apart from a notice. A station that
    /// is not configured sounds the local alarm straight away.
    pub fn start_alarm(&mut self, station: usize, config: AlarmConfig) -> Result<()> {
        if !self.io.network.is_reachable() {
            warn!(station, "alarm stream not started: no network");
            self.io.alerts.notify(Notice::NoNetwork);
            return Err(StreamError::NoNetwork);
        }

        self.shutdown_current();

        let now = Instant::now();
        let resolved = self.io.stations.station_by_index(station);
        let stream = self.open_stream(station, resolved.clone(), now);

        self.io.volume.override_level(config.settings.volume, MAX_ALARM_VOLUME);
        self.session = Session::Alarm(AlarmSession {
            stream,
            config,
            fallback_armed: true,
            grace: Deadline::at(now + self.playback.fallback_grace()),
            watchdog: Deadline::at(now + self.playback.alarm_watchdog()),
        });

        info!(station, "alarm session started");
        self.broadcast(StreamEvent::Started {
            mode: StreamingMode::Alarm,
            station_index: station,
        });

        match resolved {
            Some(s) => self.begin_playback(&s.stream),
            None => {
                warn!(station, "alarm station not configured");
                self.fall_back();
            }
        }
        Ok(())
    }

    /// Start streaming `station` as radio
    pub fn start_radio(&mut self, station: usize) -> Result<()> {
        if !self.io.network.is_reachable() {
            warn!(station, "radio not started: no network");
            self.io.alerts.notify(Notice::NoNetwork);
            return Err(StreamError::NoNetwork);
        }

        let Some(resolved) = self.io.stations.station_by_index(station) else {
            warn!(station, "radio not started: station not configured");
            self.io.alerts.notify(Notice::StationNotConfigured(station));
            return Err(StreamError::StationNotConfigured(station));
        };

        let sleep = self.sleep.wall_deadline();
        self.shutdown_current();
        if let Some(wall) = sleep {
            self.set_sleep_timer(wall);
        }

        let url = resolved.stream.clone();
        let stream = self.open_stream(station, Some(resolved), Instant::now());
        self.session = Session::Radio(RadioSession {
            stream,
            metadata: None,
        });

        info!(station, high_bandwidth = self.io.network.is_high_bandwidth(), "radio session started");
        self.broadcast(StreamEvent::Started {
            mode: StreamingMode::Radio,
            station_index: station,
        });

        self.begin_playback(&url);
        Ok(())
    }

    /// End the running session
    ///
    /// With no session running, silences a sounding fallback alarm.
    /// Calling it again is harmless.
    pub fn stop(&mut self) {
        if matches!(self.session, Session::Inactive) {
            if self.fallback_sounding {
                self.silence_fallback();
            } else {
                debug!("stop ignored: nothing playing");
            }
            return;
        }
        self.teardown();
    }

    /// Switch the radio to the next configured station
    ///
    /// Returns the new station index.
    pub fn next_station(&mut self) -> Result<usize> {
        let Session::Radio(radio) = &self.session else {
            return Err(StreamError::NotApplicable);
        };
        let current = radio.stream.station_index;

        if self.io.stations.count() < 2 {
            return Err(StreamError::NotApplicable);
        }
        let next = self.io.stations.next_available_index(current);
        if next == current {
            return Err(StreamError::NotApplicable);
        }

        let sleep = self.sleep.wall_deadline();
        self.teardown();
        self.start_radio(next)?;
        if let Some(wall) = sleep {
            self.set_sleep_timer(wall);
        }
        Ok(next)
    }

    /// Route a player event to the session that loaded the stream
    pub fn handle_player_event(&mut self, envelope: PlayerEnvelope) -> Result<()> {
        let current = self.session.stream().map(|s| s.generation);
        if current != Some(envelope.generation) {
            debug!(generation = envelope.generation, ?current, "stale player event ignored");
            return Ok(());
        }

        match envelope.event {
            PlayerEvent::Ready => self.on_playback_ready(),
            PlayerEvent::Error(kind) => return self.on_playback_error(kind),
            PlayerEvent::Metadata(title) => self.on_metadata(title),
        }
        Ok(())
    }

    pub fn on_playback_ready(&mut self) {
        let now = Instant::now();
        let radio_step = self.playback.radio_fade_step();

        let (station_index, ceiling, interval, vibrate, stream) = match &mut self.session {
            Session::Inactive => return,
            Session::Radio(radio) => (
                radio.stream.station_index,
                100,
                radio_step,
                false,
                &mut radio.stream,
            ),
            Session::Alarm(alarm) => (
                alarm.stream.station_index,
                alarm.config.settings.fade_ceiling_percent(),
                alarm.config.settings.fade_step_interval(),
                alarm.config.settings.vibrate,
                &mut alarm.stream,
            ),
        };

        if stream.is_ready() {
            debug!("duplicate ready event ignored");
            return;
        }
        stream.ready_since = Some(now);
        let mute_delay = stream
            .station
            .as_ref()
            .map_or(Duration::ZERO, |s| Duration::from_millis(s.mute_delay_ms));

        let mode = self.mode();
        info!(%mode, station_index, "stream ready");
        self.broadcast(StreamEvent::ReadyForPlayback {
            mode,
            station_index,
        });

        self.fade.fade_in(now, ceiling, interval, mute_delay);
        if vibrate {
            self.io.haptics.start_vibration();
        }
    }

    /// Handle a player failure
    ///
    /// Inside the alarm grace window the local alarm takes over and this
    /// returns `Ok`. Otherwise the session is left in place and the error
    /// is returned.
    pub fn on_playback_error(&mut self, kind: StreamErrorKind) -> Result<()> {
        let grace = self.playback.fallback_grace();
        match &self.session {
            Session::Inactive => {
                debug!(%kind, "player error with no session");
                Ok(())
            }
            Session::Alarm(alarm)
                if alarm.fallback_armed && alarm.stream.started_at.elapsed() < grace =>
            {
                warn!(%kind, "alarm stream failed, sounding local alarm");
                self.fall_back();
                Ok(())
            }
            session => {
                warn!(%kind, mode = %session.mode(), "stream error");
                self.broadcast(StreamEvent::PlaybackError(kind));
                Err(StreamError::StreamUnavailable(kind))
            }
        }
    }

    pub fn on_metadata(&mut self, title: String) {
        let Session::Radio(radio) = &mut self.session else {
            return;
        };
        if radio.metadata.as_deref() == Some(title.as_str()) {
            return;
        }
        debug!(%title, "stream title changed");
        radio.metadata = Some(title.clone());
        self.broadcast(StreamEvent::MetadataChanged(title));
    }

    /// Arm the sleep timer; a deadline in the past cancels it
    pub fn set_sleep_timer(&mut self, deadline: DateTime<Local>) {
        if self.sleep.set(deadline) {
            info!(deadline = %deadline.format("%H:%M"), "sleep timer set");
            self.broadcast(StreamEvent::SleepTimerChanged(Some(deadline.timestamp_millis())));
        } else {
            info!("sleep timer cancelled");
            self.broadcast(StreamEvent::SleepTimerChanged(None));
        }
    }

    pub fn cancel_sleep_timer(&mut self) {
        if self.sleep.cancel() {
            info!("sleep timer cancelled");
            self.broadcast(StreamEvent::SleepTimerChanged(None));
        }
    }

    /// Sound the local alarm without a stream
    pub fn start_local_alarm(&mut self, config: AlarmConfig) {
        self.shutdown_current();
        self.start_fallback(&config);
    }

    /// Earliest pending deadline
    pub fn next_deadline(&self) -> Option<Instant> {
        let alarm = match &self.session {
            Session::Alarm(alarm) => [alarm.grace.instant(), alarm.watchdog.instant()],
            _ => [None, None],
        };

        [self.fade.next_deadline(), self.sleep.next_deadline()]
            .into_iter()
            .chain(alarm)
            .flatten()
            .min()
    }

    /// Run every deadline that has passed
    pub fn poll_timers(&mut self) {
        let now = Instant::now();

        if self.sleep.fire_if_due(now) {
            self.on_sleep_elapsed(now);
        }

        let mut watchdog_expired = false;
        if let Session::Alarm(alarm) = &mut self.session {
            if alarm.grace.fire_if_due(now) {
                debug!("fallback grace window closed");
                alarm.fallback_armed = false;
            }
            watchdog_expired = alarm.watchdog.fire_if_due(now);
        }
        if watchdog_expired {
            warn!("alarm watchdog expired");
            self.teardown();
        }

        let progress = self.fade.poll(now);
        if let Some(volume) = progress.volume {
            self.io.player.set_volume(volume);
        }
        if progress.finished == Some(FadeDirection::Out) {
            info!("fade-out finished");
            self.stop();
        }
    }

    fn on_sleep_elapsed(&mut self, now: Instant) {
        match self.session {
            Session::Radio(_) if !self.fallback_sounding => {
                info!("sleep timer elapsed, fading out");
                self.broadcast(StreamEvent::SleepTimerChanged(None));
                self.fade.fade_out(now, self.playback.sleep_fade_step());
            }
            Session::Inactive if !self.fallback_sounding => {
                debug!("sleep timer elapsed with nothing playing");
                self.broadcast(StreamEvent::SleepTimerChanged(None));
            }
            _ => info!("sleep timer elapsed during alarm, ignored"),
        }
    }

    fn open_stream(
        &mut self,
        station_index: usize,
        station: Option<nightwake_core::RadioStation>,
        now: Instant,
    ) -> ActiveStream {
        self.generation += 1;
        ActiveStream {
            generation: self.generation,
            station_index,
            station,
            started_at: now,
            ready_since: None,
        }
    }

    fn begin_playback(&mut self, url: &str) {
        self.fade.reset();
        let sink = PlayerEventSink::new(self.generation, self.player_events.clone());
        self.io.player.load(url, sink);
        self.io.player.set_volume(0.0);
        self.io.player.play();
    }

    /// Replace the failed alarm stream with the local alarm
    fn fall_back(&mut self) {
        let Session::Alarm(alarm) = &self.session else {
            return;
        };
        let config = alarm.config.clone();

        self.teardown();
        self.start_fallback(&config);
        self.io.alerts.notify(Notice::StreamFailed);
    }

    fn start_fallback(&mut self, config: &AlarmConfig) {
        info!("local alarm sounding");
        self.io.fallback.start_local_alarm(config);
        self.fallback_sounding = true;
        self.broadcast(StreamEvent::FallbackStarted);
    }

    fn silence_fallback(&mut self) {
        info!("local alarm silenced");
        self.io.fallback.stop_local_alarm();
        self.fallback_sounding = false;
        self.broadcast(StreamEvent::FallbackStopped);
    }

    /// End any session and silence the fallback before a new start
    fn shutdown_current(&mut self) {
        self.teardown();
        if self.fallback_sounding {
            self.silence_fallback();
        }
    }

    fn teardown(&mut self) {
        let previous = std::mem::take(&mut self.session);
        if matches!(previous, Session::Inactive) {
            return;
        }

        self.fade.reset();
        if self.sleep.cancel() {
            self.broadcast(StreamEvent::SleepTimerChanged(None));
        }

        self.io.player.stop();
        self.io.player.release();
        self.io.haptics.stop_vibration();
        if let Session::Alarm(_) = previous {
            self.io.volume.restore();
        }

        info!(previous = %previous.mode(), "session stopped");
        self.broadcast(StreamEvent::Stopped {
            previous: previous.mode(),
        });
    }

    fn broadcast(&self, event: StreamEvent) {
        // No subscribers is fine
        let _ = self.observers.send(event);
    }
}

impl Drop for StreamController {
    fn drop(&mut self) {
        self.shutdown_current();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{
        Alerts, FallbackAlarm, Haptics, MediaPlayer, Network, SystemVolume,
    };
    use crate::config::AlarmSettings;
    use chrono::TimeDelta;
    use nightwake_core::{FavoriteStations, RadioStation};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Load(String),
        Play,
        Stop,
        Volume(f32),
        Release,
        FallbackStart,
        FallbackStop,
        VibrateStart,
        VibrateStop,
        OverrideVolume(u8, u8),
        RestoreVolume,
        Notice(Notice),
    }

    #[derive(Default)]
    struct Recorder {
        calls: Vec<Call>,
        sinks: Vec<PlayerEventSink>,
    }

    type Shared = Arc<Mutex<Recorder>>;

    struct FakePlayer(Shared);
    impl MediaPlayer for FakePlayer {
        fn load(&mut self, url: &str, events: PlayerEventSink) {
            let mut r = self.0.lock().unwrap();
            r.calls.push(Call::Load(url.to_string()));
            r.sinks.push(events);
        }
        fn play(&mut self) {
            self.0.lock().unwrap().calls.push(Call::Play);
        }
        fn stop(&mut self) {
            self.0.lock().unwrap().calls.push(Call::Stop);
        }
        fn set_volume(&mut self, volume: f32) {
            self.0.lock().unwrap().calls.push(Call::Volume(volume));
        }
        fn release(&mut self) {
            self.0.lock().unwrap().calls.push(Call::Release);
        }
    }

    struct FakeNetwork(Arc<AtomicBool>);
    impl Network for FakeNetwork {
        fn is_reachable(&self) -> bool {
            self.0.load(Ordering::SeqCst)
        }
        fn is_high_bandwidth(&self) -> bool {
            true
        }
    }

    struct FakeFallback(Shared);
    impl FallbackAlarm for FakeFallback {
        fn start_local_alarm(&mut self, _config: &AlarmConfig) {
            self.0.lock().unwrap().calls.push(Call::FallbackStart);
        }
        fn stop_local_alarm(&mut self) {
            self.0.lock().unwrap().calls.push(Call::FallbackStop);
        }
    }

    struct FakeHaptics(Shared);
    impl Haptics for FakeHaptics {
        fn start_vibration(&mut self) {
            self.0.lock().unwrap().calls.push(Call::VibrateStart);
        }
        fn stop_vibration(&mut self) {
            self.0.lock().unwrap().calls.push(Call::VibrateStop);
        }
    }

    struct FakeVolume(Shared);
    impl SystemVolume for FakeVolume {
        fn override_level(&mut self, level: u8, max_level: u8) {
            self.0
                .lock()
                .unwrap()
                .calls
                .push(Call::OverrideVolume(level, max_level));
        }
        fn restore(&mut self) {
            self.0.lock().unwrap().calls.push(Call::RestoreVolume);
        }
    }

    struct FakeAlerts(Shared);
    impl Alerts for FakeAlerts {
        fn notify(&self, notice: Notice) {
            self.0.lock().unwrap().calls.push(Call::Notice(notice));
        }
    }

    struct Harness {
        controller: StreamController,
        events: mpsc::UnboundedReceiver<PlayerEnvelope>,
        recorder: Shared,
        online: Arc<AtomicBool>,
    }

    impl Harness {
        fn new(stations: Vec<RadioStation>) -> Self {
            let recorder = Shared::default();
            let online = Arc::new(AtomicBool::new(true));
            let io = Collaborators {
                player: Box::new(FakePlayer(recorder.clone())),
                network: Box::new(FakeNetwork(online.clone())),
                stations: Box::new(FavoriteStations::new(stations)),
                fallback: Box::new(FakeFallback(recorder.clone())),
                haptics: Box::new(FakeHaptics(recorder.clone())),
                volume: Box::new(FakeVolume(recorder.clone())),
                alerts: Box::new(FakeAlerts(recorder.clone())),
            };
            let (controller, events) = StreamController::new(io, PlaybackSettings::default());
            Self {
                controller,
                events,
                recorder,
                online,
            }
        }

        fn with_default_stations() -> Self {
            Self::new(vec![
                RadioStation::new("Jazz", "http://jazz"),
                RadioStation::new("Unset", ""),
                RadioStation::new("News", "http://news"),
            ])
        }

        fn calls(&self) -> Vec<Call> {
            self.recorder.lock().unwrap().calls.clone()
        }

        fn count(&self, call: &Call) -> usize {
            self.calls().iter().filter(|c| *c == call).count()
        }

        fn clear(&self) {
            self.recorder.lock().unwrap().calls.clear();
        }

        fn last_sink(&self) -> PlayerEventSink {
            self.recorder.lock().unwrap().sinks.last().cloned().unwrap()
        }

        /// Feed queued player events into the controller
        fn pump(&mut self) -> Vec<Result<()>> {
            let mut results = Vec::new();
            while let Ok(envelope) = self.events.try_recv() {
                results.push(self.controller.handle_player_event(envelope));
            }
            results
        }

        fn ready(&mut self) {
            self.last_sink().ready();
            self.pump();
        }

        async fn advance(&mut self, by: Duration) {
            tokio::time::advance(by).await;
            self.controller.poll_timers();
        }
    }

    fn alarm_config() -> AlarmConfig {
        AlarmConfig::new(None, AlarmSettings::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_radio_plays_at_zero_volume() {
        let mut h = Harness::with_default_stations();
        h.controller.start_radio(0).unwrap();

        assert_eq!(h.controller.mode(), StreamingMode::Radio);
        assert_eq!(h.controller.current_radio_station_index(), Some(0));
        assert_eq!(
            h.calls(),
            vec![
                Call::Load("http://jazz".to_string()),
                Call::Volume(0.0),
                Call::Play
            ]
        );
        assert!(!h.controller.is_ready_for_playback());
    }

    #[tokio::test(start_paused = true)]
    async fn test_alarm_while_radio_stops_radio_first() {
        let mut h = Harness::with_default_stations();
        let mut observer = h.controller.subscribe();
        h.controller.start_radio(0).unwrap();
        h.clear();

        h.controller.start_alarm(2, alarm_config()).unwrap();

        let calls = h.calls();
        let release = calls.iter().position(|c| *c == Call::Release).unwrap();
        let load = calls
            .iter()
            .position(|c| *c == Call::Load("http://news".to_string()))
            .unwrap();
        assert!(release < load);
        assert_eq!(h.controller.mode(), StreamingMode::Alarm);
        assert_eq!(h.controller.current_radio_station_index(), None);

        assert!(matches!(
            observer.try_recv().unwrap(),
            StreamEvent::Started {
                mode: StreamingMode::Radio,
                ..
            }
        ));
        assert_eq!(
            observer.try_recv().unwrap(),
            StreamEvent::Stopped {
                previous: StreamingMode::Radio
            }
        );
        assert_eq!(
            observer.try_recv().unwrap(),
            StreamEvent::Started {
                mode: StreamingMode::Alarm,
                station_index: 2
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_alarm_error_in_grace_window_falls_back_once() {
        let mut h = Harness::with_default_stations();
        h.controller.start_alarm(0, alarm_config()).unwrap();
        let sink = h.last_sink();

        h.advance(Duration::from_secs(10)).await;
        sink.error(StreamErrorKind::Source);
        sink.error(StreamErrorKind::Source);
        let results = h.pump();

        assert!(results.iter().all(|r| r.is_ok()));
        assert_eq!(h.count(&Call::FallbackStart), 1);
        assert_eq!(h.count(&Call::Notice(Notice::StreamFailed)), 1);
        assert_eq!(h.count(&Call::RestoreVolume), 1);
        assert_eq!(h.controller.mode(), StreamingMode::Inactive);
        assert!(h.controller.is_fallback_sounding());
    }

    #[tokio::test(start_paused = true)]
    async fn test_alarm_error_after_grace_window_is_reported() {
        let mut h = Harness::with_default_stations();
        h.controller.start_alarm(0, alarm_config()).unwrap();
        h.ready();

        h.advance(Duration::from_secs(200)).await;
        h.last_sink().error(StreamErrorKind::Source);
        let results = h.pump();

        assert_eq!(
            results,
            vec![Err(StreamError::StreamUnavailable(StreamErrorKind::Source))]
        );
        assert_eq!(h.count(&Call::FallbackStart), 0);
        assert_eq!(h.controller.mode(), StreamingMode::Alarm);
    }

    #[tokio::test(start_paused = true)]
    async fn test_radio_error_leaves_session() {
        let mut h = Harness::with_default_stations();
        let mut observer = h.controller.subscribe();
        h.controller.start_radio(0).unwrap();

        let result = h.controller.on_playback_error(StreamErrorKind::Renderer);

        assert_eq!(
            result,
            Err(StreamError::StreamUnavailable(StreamErrorKind::Renderer))
        );
        assert_eq!(h.controller.mode(), StreamingMode::Radio);
        assert_eq!(h.count(&Call::FallbackStart), 0);
        observer.try_recv().unwrap();
        assert_eq!(
            observer.try_recv().unwrap(),
            StreamEvent::PlaybackError(StreamErrorKind::Renderer)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_double_stop_releases_once() {
        let mut h = Harness::with_default_stations();
        h.controller.start_alarm(0, alarm_config()).unwrap();

        h.controller.stop();
        h.controller.stop();

        assert_eq!(h.count(&Call::Release), 1);
        assert_eq!(h.count(&Call::RestoreVolume), 1);
        assert_eq!(h.controller.mode(), StreamingMode::Inactive);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_when_inactive_silences_fallback() {
        let mut h = Harness::with_default_stations();
        h.controller.start_local_alarm(alarm_config());
        assert!(h.controller.is_fallback_sounding());

        h.controller.stop();
        assert!(!h.controller.is_fallback_sounding());
        assert_eq!(h.count(&Call::FallbackStop), 1);

        h.controller.stop();
        assert_eq!(h.count(&Call::FallbackStop), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_network_is_noop() {
        let mut h = Harness::with_default_stations();
        h.online.store(false, Ordering::SeqCst);

        assert_eq!(h.controller.start_radio(0), Err(StreamError::NoNetwork));
        assert_eq!(
            h.controller.start_alarm(0, alarm_config()),
            Err(StreamError::NoNetwork)
        );
        assert_eq!(
            h.calls(),
            vec![
                Call::Notice(Notice::NoNetwork),
                Call::Notice(Notice::NoNetwork)
            ]
        );
        assert_eq!(h.controller.mode(), StreamingMode::Inactive);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unconfigured_radio_station_keeps_session() {
        let mut h = Harness::with_default_stations();
        h.controller.start_radio(0).unwrap();
        h.clear();

        assert_eq!(
            h.controller.start_radio(1),
            Err(StreamError::StationNotConfigured(1))
        );
        assert_eq!(h.controller.current_radio_station_index(), Some(0));
        assert_eq!(h.count(&Call::Release), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unconfigured_alarm_station_falls_back() {
        let mut h = Harness::with_default_stations();
        h.controller.start_alarm(1, alarm_config()).unwrap();

        assert_eq!(h.count(&Call::FallbackStart), 1);
        assert_eq!(h.count(&Call::Load("".to_string())), 0);
        assert_eq!(h.controller.mode(), StreamingMode::Inactive);
        assert!(h.controller.is_fallback_sounding());
    }

    #[tokio::test(start_paused = true)]
    async fn test_alarm_overrides_system_volume() {
        let mut h = Harness::with_default_stations();
        let config = AlarmConfig::new(
            None,
            AlarmSettings {
                volume: 6,
                ..AlarmSettings::default()
            },
        );
        h.controller.start_alarm(0, config).unwrap();
        assert_eq!(h.count(&Call::OverrideVolume(6, MAX_ALARM_VOLUME)), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_radio_fade_in_takes_five_seconds() {
        let mut h = Harness::with_default_stations();
        h.controller.start_radio(0).unwrap();
        h.ready();
        assert!(h.controller.is_ready_for_playback());

        h.advance(Duration::from_millis(2450)).await;
        assert_eq!(h.controller.snapshot().volume, 0.5);

        h.advance(Duration::from_millis(2500)).await;
        assert_eq!(h.controller.snapshot().volume, 1.0);
        assert_eq!(h.controller.next_deadline(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mute_delay_postpones_fade() {
        let mut h = Harness::new(vec![
            RadioStation::new("Slow", "http://slow").with_mute_delay(3000),
        ]);
        h.controller.start_radio(0).unwrap();
        h.ready();

        h.advance(Duration::from_millis(2900)).await;
        assert_eq!(h.controller.snapshot().volume, 0.0);

        h.advance(Duration::from_millis(100)).await;
        assert_eq!(h.controller.snapshot().volume, 0.01);
    }

    #[tokio::test(start_paused = true)]
    async fn test_alarm_fade_reaches_reduced_ceiling() {
        let mut h = Harness::with_default_stations();
        let config = AlarmConfig::new(
            None,
            AlarmSettings {
                volume_reduction_percent: 20,
                fade_in_duration_secs: 40,
                vibrate: true,
                ..AlarmSettings::default()
            },
        );
        h.controller.start_alarm(0, config).unwrap();
        h.ready();
        assert_eq!(h.count(&Call::VibrateStart), 1);

        h.advance(Duration::from_secs(20)).await;
        assert_eq!(h.controller.snapshot().volume, 0.41);

        h.advance(Duration::from_secs(20)).await;
        assert_eq!(h.controller.snapshot().volume, 0.8);
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_ready_is_ignored() {
        let mut h = Harness::with_default_stations();
        let mut observer = h.controller.subscribe();
        h.controller.start_radio(0).unwrap();
        h.ready();
        h.advance(Duration::from_millis(500)).await;
        h.ready();

        let readies = std::iter::from_fn(|| observer.try_recv().ok())
            .filter(|e| matches!(e, StreamEvent::ReadyForPlayback { .. }))
            .count();
        assert_eq!(readies, 1);
        assert_eq!(h.controller.snapshot().volume, 0.11);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_events_are_ignored() {
        let mut h = Harness::with_default_stations();
        h.controller.start_radio(0).unwrap();
        let old_sink = h.last_sink();
        h.controller.start_radio(2).unwrap();

        old_sink.ready();
        old_sink.metadata("Old song");
        h.pump();

        assert!(!h.controller.is_ready_for_playback());
        assert_eq!(h.controller.snapshot().metadata, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_metadata_cached_for_radio() {
        let mut h = Harness::with_default_stations();
        h.controller.start_radio(0).unwrap();
        h.last_sink().metadata("Artist - Title");
        h.pump();

        let snapshot = h.controller.snapshot();
        assert_eq!(snapshot.metadata.as_deref(), Some("Artist - Title"));
        assert_eq!(snapshot.station_name.as_deref(), Some("Jazz"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_timer_fades_out_then_stops() {
        let mut h = Harness::with_default_stations();
        h.controller.start_radio(0).unwrap();
        h.ready();
        h.advance(Duration::from_secs(6)).await;
        assert_eq!(h.controller.snapshot().volume, 1.0);

        h.controller
            .set_sleep_timer(Local::now() + TimeDelta::seconds(60));
        assert!(h.controller.is_sleep_timer_set());

        h.advance(Duration::from_secs(61)).await;
        assert_eq!(h.controller.mode(), StreamingMode::Radio);
        assert!(h.controller.snapshot().volume < 1.0);
        assert!(!h.controller.is_sleep_timer_set());

        h.advance(Duration::from_secs(5)).await;
        assert_eq!(h.controller.mode(), StreamingMode::Inactive);
        assert_eq!(h.count(&Call::Release), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_timer_ignored_during_alarm() {
        let mut h = Harness::with_default_stations();
        h.controller.start_alarm(0, alarm_config()).unwrap();
        h.controller
            .set_sleep_timer(Local::now() + TimeDelta::seconds(5));

        h.advance(Duration::from_secs(10)).await;
        assert_eq!(h.controller.mode(), StreamingMode::Alarm);
        assert!(!h.controller.is_sleep_timer_set());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_timer_in_past_cancels() {
        let mut h = Harness::with_default_stations();
        h.controller.start_radio(0).unwrap();
        h.controller
            .set_sleep_timer(Local::now() + TimeDelta::minutes(10));
        h.controller
            .set_sleep_timer(Local::now() - TimeDelta::minutes(1));
        assert!(!h.controller.is_sleep_timer_set());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_sleep_timer() {
        let mut h = Harness::with_default_stations();
        h.controller.start_radio(0).unwrap();
        h.controller
            .set_sleep_timer(Local::now() + TimeDelta::minutes(10));

        h.controller.stop();
        assert!(!h.controller.is_sleep_timer_set());
        assert_eq!(h.controller.next_deadline(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_watchdog_stops_alarm() {
        let mut h = Harness::with_default_stations();
        h.controller.start_alarm(0, alarm_config()).unwrap();
        h.ready();

        h.advance(Duration::from_secs(119 * 60)).await;
        assert_eq!(h.controller.mode(), StreamingMode::Alarm);

        h.advance(Duration::from_secs(60)).await;
        assert_eq!(h.controller.mode(), StreamingMode::Inactive);
        assert_eq!(h.count(&Call::RestoreVolume), 1);
        assert_eq!(h.count(&Call::FallbackStart), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_next_station_is_circular() {
        let mut h = Harness::with_default_stations();
        h.controller.start_radio(0).unwrap();

        assert_eq!(h.controller.next_station(), Ok(2));
        assert_eq!(h.controller.current_radio_station_index(), Some(2));
        assert_eq!(h.controller.next_station(), Ok(0));
        assert_eq!(h.count(&Call::Release), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_next_station_keeps_sleep_timer() {
        let mut h = Harness::with_default_stations();
        h.controller.start_radio(0).unwrap();
        h.controller
            .set_sleep_timer(Local::now() + TimeDelta::minutes(10));

        h.controller.next_station().unwrap();
        assert!(h.controller.is_sleep_timer_set());
    }

    #[tokio::test(start_paused = true)]
    async fn test_next_station_not_applicable() {
        let mut h = Harness::new(vec![RadioStation::new("Only", "http://only")]);
        assert_eq!(h.controller.next_station(), Err(StreamError::NotApplicable));

        h.controller.start_radio(0).unwrap();
        assert_eq!(h.controller.next_station(), Err(StreamError::NotApplicable));

        h.controller.start_alarm(0, alarm_config()).unwrap();
        assert_eq!(h.controller.next_station(), Err(StreamError::NotApplicable));
    }

    #[tokio::test(start_paused = true)]
    async fn test_next_deadline_tracks_alarm_timers() {
        let mut h = Harness::with_default_stations();
        assert_eq!(h.controller.next_deadline(), None);

        let start = Instant::now();
        h.controller.start_alarm(0, alarm_config()).unwrap();
        assert_eq!(
            h.controller.next_deadline(),
            Some(start + Duration::from_secs(120))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_releases_player() {
        let h = Harness::with_default_stations();
        let recorder = h.recorder.clone();
        let Harness { mut controller, .. } = h;
        controller.start_radio(0).unwrap();
        drop(controller);

        let releases = recorder
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|c| **c == Call::Release)
            .count();
        assert_eq!(releases, 1);
    }
}
