//! The nightwake daemon
//!
//! Owns the streaming controller and the alarm scheduler. Socket commands,
//! player events and timer wakeups all reach it through the shared daemon
//! loop, one at a time.

use async_trait::async_trait;
use chrono::{DateTime, Local, TimeZone};
use nightwake_core::AlarmDefinition;
use nightwake_daemon::{DaemonConfig, DaemonError, DaemonHandler, HandleResult, run_daemon_loop};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::audio::LocalAlarm;
use crate::collaborators::{Collaborators, PlayerEnvelope};
use crate::config::{self, NightwakeConfig};
use crate::controller::StreamController;
use crate::ipc::{DaemonCommand, DaemonResponse, NextAlarm, StatusReport, get_socket_path};
use crate::player::MpvPlayer;
use crate::scheduler::AlarmScheduler;
use crate::session::AlarmConfig;
use crate::system::{AmixerVolume, DesktopAlerts, NoVibration, TcpProbe};

type ConfigStore = Box<dyn Fn(&NightwakeConfig) -> Result<(), confy::ConfyError> + Send + Sync>;

pub struct StreamDaemon {
    config: NightwakeConfig,
    store: ConfigStore,
    controller: StreamController,
    scheduler: AlarmScheduler<Local>,
    player_events: Option<mpsc::UnboundedReceiver<PlayerEnvelope>>,
}

impl StreamDaemon {
    pub fn new(config: NightwakeConfig, io: Collaborators) -> Self {
        let (controller, player_events) = StreamController::new(io, config.playback.clone());
        let scheduler = AlarmScheduler::new(config.alarms.clone());
        Self {
            config,
            store: Box::new(config::store),
            controller,
            scheduler,
            player_events: Some(player_events),
        }
    }

    /// Desktop collaborators built from the configuration
    pub fn desktop(config: NightwakeConfig) -> Self {
        let io = Collaborators {
            player: Box::new(MpvPlayer::new(config.player.clone())),
            network: Box::new(TcpProbe::new(config.network.clone())),
            stations: Box::new(config.stations.clone()),
            fallback: Box::new(LocalAlarm::new(config.tones.clone())),
            haptics: Box::new(NoVibration),
            volume: Box::new(AmixerVolume::new(config.mixer.clone())),
            alerts: Box::new(DesktopAlerts),
        };
        Self::new(config, io)
    }

    /// Replace the default config file writer
    pub fn with_store<F>(mut self, store: F) -> Self
    where
        F: Fn(&NightwakeConfig) -> Result<(), confy::ConfyError> + Send + Sync + 'static,
    {
        self.store = Box::new(store);
        self
    }

    pub fn controller(&self) -> &StreamController {
        &self.controller
    }

    fn alarm_config(&self, alarm: Option<AlarmDefinition>) -> AlarmConfig {
        AlarmConfig::new(alarm, self.config.alarm.clone())
    }

    /// Sound an alarm, falling back to the local alarm when no stream can start
    fn sound_alarm(&mut self, alarm: Option<AlarmDefinition>, station: Option<usize>) {
        let config = self.alarm_config(alarm);
        match station {
            Some(station) => {
                if let Err(e) = self.controller.start_alarm(station, config.clone()) {
                    warn!(error = %e, "alarm stream unavailable, sounding local alarm");
                    self.controller.start_local_alarm(config);
                }
            }
            None => self.controller.start_local_alarm(config),
        }
    }

    fn check_alarms(&mut self, now: &DateTime<Local>) {
        if let Some(alarm) = self.scheduler.poll_due(now) {
            self.sound_alarm(Some(alarm), alarm.station_index);
        }
        self.save_spent_one_shots();
    }

    /// Write back the alarm list once the scheduler has dropped fired or
    /// missed one-shots, so a reload cannot arm them again
    fn save_spent_one_shots(&mut self) {
        if self.scheduler.alarms().len() == self.config.alarms.len() {
            return;
        }
        self.config.alarms = self.scheduler.alarms().to_vec();
        match (self.store)(&self.config) {
            Ok(()) => info!(alarms = self.config.alarms.len(), "one-shot alarm removed"),
            Err(e) => warn!(error = %e, "could not save config after one-shot alarm"),
        }
    }

    fn reload(&mut self, fresh: NightwakeConfig) {
        self.controller.replace_stations(Box::new(fresh.stations.clone()));
        self.scheduler.set_alarms(fresh.alarms.clone());
        info!(
            stations = fresh.stations.num_available(),
            alarms = fresh.alarms.len(),
            "configuration reloaded"
        );
        self.config = fresh;
    }

    fn status(&mut self) -> StatusReport {
        let next_alarm = self.scheduler.next(&Local::now()).map(|armed| NextAlarm {
            alarm: armed.alarm,
            trigger_epoch_ms: armed.trigger.timestamp_millis(),
        });
        StatusReport {
            session: self.controller.snapshot(),
            next_alarm,
        }
    }

    fn set_sleep(&mut self, deadline_epoch_ms: Option<i64>) -> DaemonResponse {
        let deadline = deadline_epoch_ms.and_then(|ms| Local.timestamp_millis_opt(ms).single());
        match deadline {
            Some(deadline) => {
                self.controller.set_sleep_timer(deadline);
                if self.controller.is_sleep_timer_set() {
                    DaemonResponse::Ok(format!("Sleep timer set for {}", deadline.format("%H:%M")))
                } else {
                    DaemonResponse::Ok("Sleep timer cancelled".to_string())
                }
            }
            None => {
                self.controller.cancel_sleep_timer();
                DaemonResponse::Ok("Sleep timer cancelled".to_string())
            }
        }
    }

    fn handle(&mut self, cmd: DaemonCommand) -> HandleResult<DaemonResponse> {
        let response = match cmd {
            DaemonCommand::StartAlarm { station } => {
                self.sound_alarm(None, station);
                if self.controller.is_fallback_sounding() {
                    DaemonResponse::Ok("Local alarm sounding".to_string())
                } else {
                    DaemonResponse::Ok("Alarm stream starting".to_string())
                }
            }
            DaemonCommand::StartRadio { station } => match self.controller.start_radio(station) {
                Ok(()) => DaemonResponse::Ok(format!("Playing station #{station}")),
                Err(e) => DaemonResponse::Error(e.to_string()),
            },
            DaemonCommand::Stop => {
                self.controller.stop();
                DaemonResponse::Ok("Stopped".to_string())
            }
            DaemonCommand::NextStation => match self.controller.next_station() {
                Ok(station) => DaemonResponse::Ok(format!("Playing station #{station}")),
                Err(e) => DaemonResponse::Error(e.to_string()),
            },
            DaemonCommand::SetSleep { deadline_epoch_ms } => self.set_sleep(deadline_epoch_ms),
            DaemonCommand::Status => DaemonResponse::Status(self.status()),
            DaemonCommand::Reload => match config::load() {
                Ok(fresh) => {
                    self.reload(fresh);
                    DaemonResponse::Ok("Configuration reloaded".to_string())
                }
                Err(e) => DaemonResponse::Error(format!("Failed to reload configuration: {e}")),
            },
            DaemonCommand::Ping => DaemonResponse::Pong,
            DaemonCommand::Kill => {
                return HandleResult::shutdown(DaemonResponse::Ok(
                    "Daemon shutting down.".to_string(),
                ));
            }
        };
        HandleResult::response(response)
    }
}

#[async_trait]
impl DaemonHandler for StreamDaemon {
    type Command = DaemonCommand;
    type Response = DaemonResponse;
    type Event = PlayerEnvelope;

    async fn handle_command(&mut self, cmd: DaemonCommand) -> HandleResult<DaemonResponse> {
        self.handle(cmd)
    }

    async fn on_event(&mut self, envelope: PlayerEnvelope) {
        if let Err(e) = self.controller.handle_player_event(envelope) {
            warn!(error = %e, "playback problem");
        }
    }

    async fn on_wakeup(&mut self) {
        self.controller.poll_timers();
        self.check_alarms(&Local::now());
    }

    fn next_wakeup(&self) -> Option<Instant> {
        let alarm = self.scheduler.armed().and_then(|armed| {
            let remaining = (armed.trigger.clone() - Local::now()).to_std().ok()?;
            Some(Instant::now() + remaining)
        });
        [self.controller.next_deadline(), alarm]
            .into_iter()
            .flatten()
            .min()
    }

    fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<PlayerEnvelope>> {
        self.player_events.take()
    }

    fn on_start(&mut self) {
        match self.scheduler.next(&Local::now()) {
            Some(armed) => info!(alarm = %armed.alarm, trigger = %armed.trigger, "next alarm"),
            None => info!("no alarms configured"),
        }
    }

    fn on_shutdown(&mut self) {
        self.controller.stop();
    }
}

pub async fn run_daemon(config: NightwakeConfig) -> Result<(), DaemonError> {
    let daemon_config = DaemonConfig::new(get_socket_path())
        .with_tick_interval(config.timing.tick_interval_secs)
        .with_buffer_size(config.timing.ipc_buffer_size);

    info!("nightwake daemon starting");
    run_daemon_loop(daemon_config, StreamDaemon::desktop(config)).await
}
