//! Talking to the daemon from a short-lived client process
//!
//! [`send_command`] only reaches a daemon that is already up.
//! [`send_command_with_autospawn`] starts one first when nobody answers and
//! keeps trying to connect until the startup wait runs out.

use std::time::Duration;

use interprocess::local_socket::tokio::Stream;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::DaemonError;
use crate::ipc::{DaemonSpawnConfig, receive_message, send_message, spawn_daemon_process};
use crate::socket;

const CONNECT_RETRY: Duration = Duration::from_millis(50);

#[derive(Debug, Clone)]
pub struct DaemonClientConfig {
    pub socket_path: String,
    pub daemon_spawn: DaemonSpawnConfig,
    /// How long a freshly spawned daemon gets to open its socket (ms)
    pub startup_wait_ms: u64,
    /// Largest response accepted, in bytes
    pub buffer_size: usize,
}

impl DaemonClientConfig {
    pub fn new(socket_path: impl Into<String>, daemon_spawn: DaemonSpawnConfig) -> Self {
        Self {
            socket_path: socket_path.into(),
            daemon_spawn,
            startup_wait_ms: 500,
            buffer_size: 4096,
        }
    }

    pub fn with_startup_wait(mut self, wait_ms: u64) -> Self {
        self.startup_wait_ms = wait_ms;
        self
    }

    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }
}

/// Send a command to a running daemon without spawning one
pub async fn send_command<Cmd, Resp>(
    config: &DaemonClientConfig,
    command: &Cmd,
) -> Result<Resp, DaemonError>
where
    Cmd: Serialize,
    Resp: for<'de> Deserialize<'de>,
{
    let mut stream = socket::connect(&config.socket_path).await?;
    exchange(&mut stream, command, config.buffer_size).await
}

/// Send a command, starting the daemon if it is not running
pub async fn send_command_with_autospawn<Cmd, Resp>(
    config: &DaemonClientConfig,
    command: &Cmd,
) -> Result<Resp, DaemonError>
where
    Cmd: Serialize,
    Resp: for<'de> Deserialize<'de>,
{
    let mut stream = match socket::connect(&config.socket_path).await {
        Ok(stream) => stream,
        Err(first) => {
            debug!(error = %first, "no daemon answering");
            spawn_and_connect(config, first).await?
        }
    };
    exchange(&mut stream, command, config.buffer_size).await
}

async fn exchange<Cmd, Resp>(
    stream: &mut Stream,
    command: &Cmd,
    max_len: usize,
) -> Result<Resp, DaemonError>
where
    Cmd: Serialize,
    Resp: for<'de> Deserialize<'de>,
{
    send_message(stream, command).await?;
    receive_message(stream, max_len).await
}

async fn spawn_and_connect(
    config: &DaemonClientConfig,
    first: DaemonError,
) -> Result<Stream, DaemonError> {
    info!("starting daemon");
    spawn_daemon_process(&config.daemon_spawn)
        .map_err(DaemonError::daemon_not_running_with_source)?;

    let give_up = Instant::now() + Duration::from_millis(config.startup_wait_ms);
    loop {
        tokio::time::sleep(CONNECT_RETRY).await;
        match socket::connect(&config.socket_path).await {
            Ok(stream) => return Ok(stream),
            Err(_) if Instant::now() < give_up => continue,
            Err(_) => {
                return Err(DaemonError::ipc_connection_with_source(
                    "Daemon started but never opened its socket",
                    first,
                ));
            }
        }
    }
}
