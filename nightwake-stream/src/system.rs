//! Desktop implementations of the system collaborators

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use notify_rust::Notification;
use regex::Regex;
use tokio::net::{TcpStream, lookup_host};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::collaborators::{Alerts, Haptics, Network, Notice, SystemVolume};
use crate::config::{MixerSettings, NetworkSettings};

// amixer prints levels like "Front Left: Playback 39321 [60%] [on]"
static MIXER_LEVEL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[(\d{1,3})%\]").expect("Invalid mixer level regex pattern")
});

/// First percentage in `amixer get` output
fn parse_mixer_level(output: &str) -> Option<u8> {
    MIXER_LEVEL_REGEX
        .captures(output)
        .and_then(|caps| caps[1].parse::<u8>().ok())
        .map(|level| level.min(100))
}

/// Alarm level scaled to a mixer percentage
fn level_to_percent(level: u8, max_level: u8) -> u8 {
    if max_level == 0 {
        return 100;
    }
    let level = u32::from(level.min(max_level));
    (level * 100 / u32::from(max_level)) as u8
}

/// What the mixer worker is asked to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MixerRequest {
    Override(u8),
    Restore,
}

/// ALSA mixer driven through `amixer`
///
/// Commands run on a worker task in the order they were requested.
pub struct AmixerVolume {
    requests: Option<mpsc::UnboundedSender<MixerRequest>>,
}

impl AmixerVolume {
    pub fn new(settings: MixerSettings) -> Self {
        if !settings.enabled {
            return Self { requests: None };
        }
        let (requests, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_mixer(MixerWorker::new(settings), rx));
        Self {
            requests: Some(requests),
        }
    }

    fn request(&self, request: MixerRequest) {
        if let Some(requests) = &self.requests {
            if requests.send(request).is_err() {
                debug!(?request, "mixer worker gone");
            }
        }
    }
}

impl SystemVolume for AmixerVolume {
    fn override_level(&mut self, level: u8, max_level: u8) {
        self.request(MixerRequest::Override(level_to_percent(level, max_level)));
    }

    fn restore(&mut self) {
        self.request(MixerRequest::Restore);
    }
}

/// Mixer state owned by the worker task
struct MixerWorker {
    settings: MixerSettings,
    saved: Option<u8>,
}

impl MixerWorker {
    fn new(settings: MixerSettings) -> Self {
        Self {
            settings,
            saved: None,
        }
    }

    async fn apply(&mut self, request: MixerRequest) {
        match request {
            MixerRequest::Override(percent) => {
                if self.saved.is_none() {
                    self.saved = self.current_level().await;
                }
                self.set_level(percent).await;
            }
            MixerRequest::Restore => {
                if let Some(percent) = self.saved.take() {
                    self.set_level(percent).await;
                }
            }
        }
    }

    async fn current_level(&self) -> Option<u8> {
        let output = Command::new(&self.settings.command)
            .args(["get", &self.settings.control])
            .output()
            .await
            .map_err(|e| debug!(error = %e, "amixer not available"))
            .ok()?;
        parse_mixer_level(&String::from_utf8_lossy(&output.stdout))
    }

    async fn set_level(&self, percent: u8) {
        let result = Command::new(&self.settings.command)
            .args(["-q", "set", &self.settings.control, &format!("{percent}%")])
            .status()
            .await;
        match result {
            Ok(status) if status.success() => debug!(percent, "mixer level set"),
            Ok(status) => warn!(%status, "amixer refused the volume change"),
            Err(e) => warn!(error = %e, "failed to run amixer"),
        }
    }
}

async fn run_mixer(mut worker: MixerWorker, mut requests: mpsc::UnboundedReceiver<MixerRequest>) {
    while let Some(request) = requests.recv().await {
        worker.apply(request).await;
    }
    debug!("mixer worker stopped");
}

/// Reachability by TCP connect to a well-known address
///
/// A background task re-probes on an interval; `is_reachable` only reads
/// the latest result.
pub struct TcpProbe {
    reachable: Arc<AtomicBool>,
    high_bandwidth: bool,
    task: JoinHandle<()>,
}

impl TcpProbe {
    pub fn new(settings: NetworkSettings) -> Self {
        let reachable = Arc::new(AtomicBool::new(false));
        let high_bandwidth = settings.high_bandwidth;
        let task = tokio::spawn(keep_probing(settings, reachable.clone()));
        Self {
            reachable,
            high_bandwidth,
            task,
        }
    }
}

impl Network for TcpProbe {
    fn is_reachable(&self) -> bool {
        self.reachable.load(Ordering::Relaxed)
    }

    fn is_high_bandwidth(&self) -> bool {
        self.high_bandwidth
    }
}

impl Drop for TcpProbe {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn keep_probing(settings: NetworkSettings, reachable: Arc<AtomicBool>) {
    let interval = Duration::from_secs(settings.probe_interval_secs.max(1));
    loop {
        let now = probe(&settings).await;
        if reachable.swap(now, Ordering::Relaxed) != now {
            info!(reachable = now, "network state changed");
        }
        tokio::time::sleep(interval).await;
    }
}

/// One TCP connect attempt per resolved address, each bounded by the timeout
async fn probe(settings: &NetworkSettings) -> bool {
    let timeout = Duration::from_millis(settings.probe_timeout_ms);
    let address = settings.probe_address.as_str();

    let addrs = match tokio::time::timeout(timeout, lookup_host(address)).await {
        Ok(Ok(addrs)) => addrs,
        Ok(Err(e)) => {
            debug!(address, error = %e, "probe address did not resolve");
            return false;
        }
        Err(_) => {
            debug!(address, "probe address lookup timed out");
            return false;
        }
    };

    for addr in addrs {
        if let Ok(Ok(_)) = tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
            return true;
        }
    }
    debug!(address, "network probe failed");
    false
}

/// Desktop notifications, shown off the async runtime
pub struct DesktopAlerts;

impl Alerts for DesktopAlerts {
    fn notify(&self, notice: Notice) {
        let body = notice.message();
        tokio::task::spawn_blocking(move || {
            let shown = Notification::new()
                .summary("Nightwake")
                .body(&body)
                .show();
            if let Err(e) = shown {
                warn!(error = %e, ?notice, "failed to show notification");
            }
        });
    }
}

/// Desktops have no vibration motor
pub struct NoVibration;

impl Haptics for NoVibration {
    fn start_vibration(&mut self) {
        info!("vibration requested, not supported on this device");
    }

    fn stop_vibration(&mut self) {}
}
