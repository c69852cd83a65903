//! Message framing and daemon spawning
//!
//! Each message is one line of JSON. A connection carries one request and
//! one response.

use std::path::PathBuf;
use std::process::{Child, Command, Stdio};

use interprocess::local_socket::tokio::Stream;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::DaemonError;

/// Write `msg` as a single JSON line
pub async fn send_message<T: Serialize>(stream: &mut Stream, msg: &T) -> Result<(), DaemonError> {
    write_line(stream, msg).await
}

/// Read one JSON line of at most `max_len` bytes
pub async fn receive_message<T: for<'de> Deserialize<'de>>(
    stream: &mut Stream,
    max_len: usize,
) -> Result<T, DaemonError> {
    read_line(stream, max_len).await
}

async fn write_line<W, T>(writer: &mut W, msg: &T) -> Result<(), DaemonError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let mut bytes = serde_json::to_vec(msg)?;
    bytes.push(b'\n');
    writer.write_all(&bytes).await?;
    writer.flush().await?;
    Ok(())
}

async fn read_line<R, T>(reader: &mut R, max_len: usize) -> Result<T, DaemonError>
where
    R: AsyncRead + Unpin,
    T: for<'de> Deserialize<'de>,
{
    let mut line = Vec::new();
    let mut chunk = [0u8; 512];

    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            if line.is_empty() {
                return Err(DaemonError::ipc_connection(
                    "Connection closed without response",
                ));
            }
            break;
        }
        let newline = chunk[..n].iter().position(|b| *b == b'\n');
        line.extend_from_slice(&chunk[..newline.unwrap_or(n)]);
        if line.len() > max_len {
            return Err(DaemonError::ipc_connection(format!(
                "Message longer than {max_len} bytes"
            )));
        }
        if newline.is_some() {
            break;
        }
    }

    Ok(serde_json::from_slice(&line)?)
}

/// How to start the daemon in the background
#[derive(Debug, Clone, Default)]
pub struct DaemonSpawnConfig {
    /// Executable to run; the current one when unset
    pub program: Option<PathBuf>,
    /// Arguments that select daemon mode
    pub args: Vec<String>,
}

impl DaemonSpawnConfig {
    pub fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: None,
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Run `program` instead of the current executable
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = Some(program.into());
        self
    }
}

/// Start the daemon detached from the terminal
pub fn spawn_daemon_process(config: &DaemonSpawnConfig) -> Result<Child, std::io::Error> {
    let program = match &config.program {
        Some(program) => program.clone(),
        None => std::env::current_exe()?,
    };
    tracing::debug!(program = %program.display(), args = ?config.args, "spawning daemon");

    Command::new(&program)
        .args(&config.args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| {
            std::io::Error::new(
                e.kind(),
                format!("Cannot start daemon '{}': {}", program.display(), e),
            )
        })
}
