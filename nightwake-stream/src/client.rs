use nightwake_daemon::client::{
    DaemonClientConfig, send_command as send_existing, send_command_with_autospawn,
};
use nightwake_daemon::{DaemonError, DaemonSpawnConfig};

use crate::config::TimingSettings;
use crate::ipc::{DaemonCommand, DaemonResponse, get_socket_path};

fn client_config(timing: &TimingSettings) -> DaemonClientConfig {
    DaemonClientConfig::new(get_socket_path(), DaemonSpawnConfig::new(["daemon"]))
        .with_startup_wait(timing.daemon_startup_wait_ms)
        .with_buffer_size(timing.ipc_buffer_size)
}

/// Send a command, starting the daemon first if it is not running
pub async fn send_command(
    cmd: DaemonCommand,
    timing: &TimingSettings,
) -> Result<DaemonResponse, DaemonError> {
    send_command_with_autospawn(&client_config(timing), &cmd).await
}

/// Send a command only if the daemon is already running
pub async fn send_if_running(
    cmd: DaemonCommand,
    timing: &TimingSettings,
) -> Result<DaemonResponse, DaemonError> {
    send_existing(&client_config(timing), &cmd).await
}
