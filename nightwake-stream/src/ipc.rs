use directories::BaseDirs;
use nightwake_core::AlarmDefinition;
use serde::{Deserialize, Serialize};

use crate::session::SessionSnapshot;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum DaemonCommand {
    /// Sound an alarm now; without a station the local alarm plays
    StartAlarm { station: Option<usize> },
    StartRadio { station: usize },
    Stop,
    NextStation,
    /// Sleep timer deadline; `None` or a past value cancels it
    SetSleep { deadline_epoch_ms: Option<i64> },
    Status,
    /// Re-read stations and alarms from the config file
    Reload,
    Ping,
    Kill,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct NextAlarm {
    pub alarm: AlarmDefinition,
    pub trigger_epoch_ms: i64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct StatusReport {
    pub session: SessionSnapshot,
    pub next_alarm: Option<NextAlarm>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum DaemonResponse {
    Ok(String),
    Error(String),
    Status(StatusReport),
    Pong,
}

pub fn get_socket_path() -> String {
    if cfg!(windows) {
        String::from(r"\\.\pipe\nightwake-daemon")
    } else {
        socket_dir().join("nightwake.sock").to_string_lossy().to_string()
    }
}

/// Directory for runtime sockets, falling back to the temp dir
pub(crate) fn socket_dir() -> std::path::PathBuf {
    match BaseDirs::new() {
        Some(base) => base
            .runtime_dir()
            .unwrap_or_else(|| base.cache_dir())
            .to_path_buf(),
        None => std::env::temp_dir(),
    }
}
