//! Daemon infrastructure for nightwake
//!
//! A small framework for a single background process that owns some state
//! and answers JSON commands over a local socket. It offers three levels:
//!
//! 1. **Low-level utilities** (`socket`, `ipc`) - Direct control over sockets and IPC
//! 2. **Client helper** (`client`) - Automatic retry-with-autospawn pattern
//! 3. **Handler loop** (`traits`) - `DaemonHandler` plus `run_daemon_loop`, which
//!    serializes commands, in-process events and deadline wakeups
//!
//! # Example: Using the client helper
//!
//! ```rust,ignore
//! use nightwake_daemon::{DaemonClientConfig, DaemonSpawnConfig, send_command_with_autospawn};
//!
//! let config = DaemonClientConfig::new(
//!     "/tmp/my-daemon.sock",
//!     DaemonSpawnConfig::new(["daemon"]),
//! );
//! let resp: MyResponse = send_command_with_autospawn(&config, &MyCommand::Ping).await?;
//! ```

pub mod client;
pub mod ipc;
pub mod socket;
pub mod traits;

use thiserror::Error;

pub use client::{DaemonClientConfig, send_command, send_command_with_autospawn};
pub use ipc::{DaemonSpawnConfig, receive_message, send_message, spawn_daemon_process};
pub use socket::{cleanup_socket, connect, create_listener};
pub use traits::{DaemonConfig, DaemonHandler, HandleResult, run_daemon_loop};

/// Daemon and IPC errors
#[derive(Error, Debug)]
pub enum DaemonError {
    #[error("IPC connection error: {message}")]
    IpcConnection {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Daemon not running and could not be started")]
    DaemonNotRunning {
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DaemonError {
    /// Create an IPC connection error
    pub fn ipc_connection(message: impl Into<String>) -> Self {
        Self::IpcConnection {
            message: message.into(),
            source: None,
        }
    }

    /// Create an IPC connection error with source
    pub fn ipc_connection_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::IpcConnection {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a daemon not running error with source
    pub fn daemon_not_running_with_source(
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::DaemonNotRunning {
            source: Some(Box::new(source)),
        }
    }

    /// Whether the peer closed the connection without sending anything
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::IpcConnection { message, .. } if message.contains("closed"))
    }
}

/// Result type for daemon operations
pub type Result<T> = std::result::Result<T, DaemonError>;
