//! Local socket helpers
//!
//! Paths are filesystem sockets on Unix and named pipes on Windows. The
//! same helpers serve the daemon's command socket and the media player's
//! IPC socket.

use interprocess::local_socket::traits::tokio::Stream as _;
use interprocess::local_socket::{
    GenericFilePath, GenericNamespaced, ListenerOptions, Name, ToFsName, ToNsName,
    tokio::Listener, tokio::Stream,
};
use tracing::debug;

use crate::DaemonError;

fn socket_name(path: &str) -> Result<Name<'_>, DaemonError> {
    let name = if cfg!(windows) {
        path.to_ns_name::<GenericNamespaced>()
    } else {
        path.to_fs_name::<GenericFilePath>()
    };
    name.map_err(|e| DaemonError::ipc_connection_with_source(format!("Bad socket name '{path}'"), e))
}

/// Bind a listener at `path`
pub fn create_listener(path: &str) -> Result<Listener, DaemonError> {
    ListenerOptions::new()
        .name(socket_name(path)?)
        .create_tokio()
        .map_err(|e| DaemonError::ipc_connection_with_source(format!("Cannot listen on '{path}'"), e))
}

/// Connect to the socket at `path`
pub async fn connect(path: &str) -> Result<Stream, DaemonError> {
    Stream::connect(socket_name(path)?)
        .await
        .map_err(|e| DaemonError::ipc_connection_with_source("Connection failed", e))
}

/// Remove a leftover socket file; named pipes vanish on their own
pub fn cleanup_socket(path: &str) {
    if cfg!(windows) {
        return;
    }
    match std::fs::remove_file(path) {
        Ok(()) => debug!(path, "removed stale socket"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => debug!(path, error = %e, "could not remove socket file"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cleanup_missing_socket_is_quiet() {
        cleanup_socket("/nonexistent/socket/path");
    }

    #[tokio::test]
    async fn test_connect_to_missing_socket_fails() {
        let result = connect("/nonexistent/nightwake-test.sock").await;
        assert!(matches!(result, Err(DaemonError::IpcConnection { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_listener_accepts_connection() {
        use interprocess::local_socket::traits::tokio::Listener as _;

        let path = std::env::temp_dir()
            .join(format!("nightwake-socket-test-{}.sock", std::process::id()))
            .to_string_lossy()
            .to_string();
        cleanup_socket(&path);

        let listener = create_listener(&path).unwrap();
        let (accepted, connected) = tokio::join!(listener.accept(), connect(&path));
        assert!(accepted.is_ok());
        assert!(connected.is_ok());

        cleanup_socket(&path);
        assert!(std::fs::metadata(&path).is_err());
    }
}
