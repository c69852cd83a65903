//! Media player backed by an mpv process
//!
//! Each `play` launches mpv with a JSON IPC socket. A background task
//! watches the process and the socket and reports readiness, stream titles
//! and failures through the session's event sink. Volume and stop requests
//! are forwarded over the same socket in order.

use std::process::Stdio;
use std::time::Duration;

use nightwake_daemon::socket;
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::collaborators::{MediaPlayer, PlayerEventSink};
use crate::config::PlayerSettings;
use crate::error::StreamErrorKind;

const CONNECT_RETRY: Duration = Duration::from_millis(100);
const OBSERVE_CORE_IDLE: u64 = 1;
const OBSERVE_MEDIA_TITLE: u64 = 2;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Request {
    Volume(f32),
    Stop,
}

/// What mpv reported on its IPC socket
#[derive(Debug, Clone, PartialEq)]
enum MpvEvent {
    Idle(bool),
    Title(String),
    EndFile { error: bool },
}

struct Running {
    requests: mpsc::UnboundedSender<Request>,
    task: JoinHandle<()>,
    socket_path: String,
}

pub struct MpvPlayer {
    settings: PlayerSettings,
    pending: Option<(String, PlayerEventSink)>,
    running: Option<Running>,
}

impl MpvPlayer {
    pub fn new(settings: PlayerSettings) -> Self {
        Self {
            settings,
            pending: None,
            running: None,
        }
    }
}

impl MediaPlayer for MpvPlayer {
    fn load(&mut self, url: &str, events: PlayerEventSink) {
        self.release();
        self.pending = Some((url.to_string(), events));
    }

    fn play(&mut self) {
        let Some((url, events)) = self.pending.take() else {
            warn!("play requested with nothing loaded");
            return;
        };

        let (requests, rx) = mpsc::unbounded_channel();
        let socket_path = ipc_socket_path(events.generation());
        let task = tokio::spawn(run_mpv(
            self.settings.clone(),
            url,
            socket_path.clone(),
            events,
            rx,
        ));
        self.running = Some(Running {
            requests,
            task,
            socket_path,
        });
    }

    fn stop(&mut self) {
        self.request(Request::Stop);
    }

    fn set_volume(&mut self, volume: f32) {
        self.request(Request::Volume(volume));
    }

    fn release(&mut self) {
        self.pending = None;
        if let Some(running) = self.running.take() {
            // Dropping the task drops the child, which is killed on drop
            running.task.abort();
            socket::cleanup_socket(&running.socket_path);
            debug!("mpv released");
        }
    }
}

impl MpvPlayer {
    fn request(&self, request: Request) {
        if let Some(running) = &self.running {
            if running.requests.send(request).is_err() {
                debug!(?request, "mpv already exited");
            }
        }
    }
}

impl Drop for MpvPlayer {
    fn drop(&mut self) {
        self.release();
    }
}

fn ipc_socket_path(generation: u64) -> String {
    let name = format!("nightwake-mpv-{}-{}", std::process::id(), generation);
    if cfg!(windows) {
        format!(r"\\.\pipe\{name}")
    } else {
        crate::ipc::socket_dir()
            .join(format!("{name}.sock"))
            .to_string_lossy()
            .to_string()
    }
}

async fn run_mpv(
    settings: PlayerSettings,
    url: String,
    socket_path: String,
    events: PlayerEventSink,
    mut requests: mpsc::UnboundedReceiver<Request>,
) {
    socket::cleanup_socket(&socket_path);

    let spawned = Command::new(&settings.command)
        .args(["--no-video", "--no-terminal", "--idle=no", "--volume=0"])
        .arg(format!("--input-ipc-server={socket_path}"))
        .args(&settings.extra_args)
        .arg(&url)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn();

    let mut child = match spawned {
        Ok(child) => child,
        Err(e) => {
            warn!(command = %settings.command, error = %e, "failed to launch media player");
            events.error(StreamErrorKind::Unexpected);
            return;
        }
    };
    info!(%url, "mpv started");

    let timeout = Duration::from_millis(settings.ipc_connect_timeout_ms);
    let Some(stream) = connect_ipc(&socket_path, &mut child, timeout).await else {
        warn!("mpv IPC socket never came up");
        events.error(StreamErrorKind::Source);
        return;
    };

    let (reader, mut writer) = tokio::io::split(stream);
    let mut lines = BufReader::new(reader).lines();

    let observe = [
        json!({ "command": ["observe_property", OBSERVE_CORE_IDLE, "core-idle"] }),
        json!({ "command": ["observe_property", OBSERVE_MEDIA_TITLE, "media-title"] }),
    ];
    for command in &observe {
        if let Err(e) = write_command(&mut writer, command).await {
            warn!(error = %e, "mpv IPC write failed");
            events.error(StreamErrorKind::Unexpected);
            return;
        }
    }

    let mut ready = false;
    let mut stopping = false;
    let mut ipc_open = true;
    let mut requests_open = true;

    loop {
        tokio::select! {
            status = child.wait() => {
                match status {
                    Ok(status) if stopping || (ready && status.success()) => {
                        debug!(%status, "mpv exited");
                    }
                    Ok(status) => {
                        warn!(%status, "mpv exited unexpectedly");
                        events.error(StreamErrorKind::Source);
                    }
                    Err(e) => {
                        warn!(error = %e, "lost track of mpv");
                        events.error(StreamErrorKind::Unexpected);
                    }
                }
                break;
            }

            line = lines.next_line(), if ipc_open => {
                match line {
                    Ok(Some(line)) => match parse_event(&line) {
                        Some(MpvEvent::Idle(false)) if !ready => {
                            ready = true;
                            events.ready();
                        }
                        Some(MpvEvent::Title(title)) => events.metadata(title),
                        Some(MpvEvent::EndFile { error: true }) if !stopping => {
                            events.error(StreamErrorKind::Source);
                        }
                        _ => {}
                    },
                    Ok(None) => ipc_open = false,
                    Err(e) => {
                        debug!(error = %e, "mpv IPC read failed");
                        ipc_open = false;
                    }
                }
            }

            request = requests.recv(), if requests_open => {
                let command = match request {
                    Some(Request::Volume(volume)) => volume_command(volume),
                    Some(Request::Stop) => {
                        stopping = true;
                        json!({ "command": ["stop"] })
                    }
                    None => {
                        requests_open = false;
                        continue;
                    }
                };
                if ipc_open {
                    if let Err(e) = write_command(&mut writer, &command).await {
                        debug!(error = %e, "mpv IPC write failed");
                    }
                }
            }
        }
    }

    socket::cleanup_socket(&socket_path);
}

async fn connect_ipc(
    path: &str,
    child: &mut Child,
    timeout: Duration,
) -> Option<interprocess::local_socket::tokio::Stream> {
    let attempts = (timeout.as_millis() / CONNECT_RETRY.as_millis()).max(1);
    for _ in 0..attempts {
        if let Ok(stream) = socket::connect(path).await {
            return Some(stream);
        }
        if matches!(child.try_wait(), Ok(Some(_))) {
            return None;
        }
        tokio::time::sleep(CONNECT_RETRY).await;
    }
    None
}

async fn write_command<W>(writer: &mut W, command: &Value) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut line = command.to_string();
    line.push('\n');
    writer.write_all(line.as_bytes()).await
}

fn volume_command(volume: f32) -> Value {
    let percent = (volume.clamp(0.0, 1.0) * 100.0).round();
    json!({ "command": ["set_property", "volume", percent] })
}

fn parse_event(line: &str) -> Option<MpvEvent> {
    let value: Value = serde_json::from_str(line).ok()?;
    match value.get("event")?.as_str()? {
        "property-change" => match value.get("name")?.as_str()? {
            "core-idle" => value.get("data")?.as_bool().map(MpvEvent::Idle),
            "media-title" => value
                .get("data")?
                .as_str()
                .map(|title| MpvEvent::Title(title.to_string())),
            _ => None,
        },
        "end-file" => Some(MpvEvent::EndFile {
            error: value.get("reason").and_then(Value::as_str) == Some("error"),
        }),
        _ => None,
    }
}
