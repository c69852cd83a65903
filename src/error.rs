//! Errors reported by the nightwake command line

use thiserror::Error;

use nightwake_core::CoreError;
use nightwake_daemon::DaemonError;

#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: confy::ConfyError,
    },

    #[error("Could not reach the daemon")]
    Unreachable(#[source] DaemonError),

    /// The daemon answered with an error
    #[error("{0}")]
    Refused(String),

    #[error("Invalid sleep duration '{0}', give minutes or 'off'")]
    InvalidSleep(String),
}

impl CliError {
    pub fn config(message: impl Into<String>, source: confy::ConfyError) -> Self {
        Self::Config {
            message: message.into(),
            source,
        }
    }
}

impl From<confy::ConfyError> for CliError {
    fn from(err: confy::ConfyError) -> Self {
        Self::config("Failed to read or write the config file", err)
    }
}

impl From<DaemonError> for CliError {
    fn from(err: DaemonError) -> Self {
        Self::Unreachable(err)
    }
}

pub type Result<T> = std::result::Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_errors_pass_through() {
        let err: CliError = CoreError::AlarmNotFound(3).into();
        assert!(matches!(err, CliError::Core(CoreError::AlarmNotFound(3))));
        assert_eq!(err.to_string(), "Alarm #3 not found");
    }

    #[test]
    fn test_daemon_error_keeps_source() {
        let err: CliError = DaemonError::ipc_connection("Connection failed").into();
        assert_eq!(err.to_string(), "Could not reach the daemon");
        let source = std::error::Error::source(&err).map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("IPC connection error: Connection failed"));
    }

    #[test]
    fn test_invalid_sleep_message() {
        assert_eq!(
            CliError::InvalidSleep("soon".to_string()).to_string(),
            "Invalid sleep duration 'soon', give minutes or 'off'"
        );
    }
}
