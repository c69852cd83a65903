//! Daemon handler trait and event loop
//!
//! The loop owns the handler behind a single mutex, so socket commands,
//! in-process events and deadline wakeups never run concurrently.
//!
//! # Example
//!
//! ```rust,ignore
//! use nightwake_daemon::{DaemonConfig, DaemonHandler, HandleResult, run_daemon_loop};
//! use async_trait::async_trait;
//!
//! struct Counter {
//!     count: u32,
//! }
//!
//! #[async_trait]
//! impl DaemonHandler for Counter {
//!     type Command = CounterCommand;
//!     type Response = CounterResponse;
//!     type Event = ();
//!
//!     async fn handle_command(&mut self, cmd: Self::Command) -> HandleResult<Self::Response> {
//!         match cmd {
//!             CounterCommand::Increment => {
//!                 self.count += 1;
//!                 HandleResult::response(CounterResponse::Count(self.count))
//!             }
//!         }
//!     }
//! }
//!
//! run_daemon_loop(DaemonConfig::new("/tmp/counter.sock"), Counter { count: 0 }).await?;
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use interprocess::local_socket::tokio::Stream as LocalSocketStream;
use interprocess::local_socket::traits::tokio::Listener as _;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, Notify, mpsc};
use tokio::time::{self, Instant};
use tracing::{debug, info, warn};

use crate::DaemonError;
use crate::ipc::{receive_message, send_message};
use crate::socket;

#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub socket_path: String,
    /// Upper bound on the loop's sleep, so wall-clock jumps are noticed (s)
    pub tick_interval_secs: u64,
    /// Largest command accepted, in bytes
    pub buffer_size: usize,
}

impl DaemonConfig {
    pub fn new(socket_path: impl Into<String>) -> Self {
        Self {
            socket_path: socket_path.into(),
            tick_interval_secs: 1,
            buffer_size: 4096,
        }
    }

    pub fn with_tick_interval(mut self, secs: u64) -> Self {
        self.tick_interval_secs = secs;
        self
    }

    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }
}

/// Reply to a command, optionally ending the loop after it is sent
#[derive(Debug, Clone)]
pub enum HandleResult<R> {
    Response(R),
    Shutdown(R),
}

impl<R> HandleResult<R> {
    pub fn response(r: R) -> Self {
        HandleResult::Response(r)
    }

    pub fn shutdown(r: R) -> Self {
        HandleResult::Shutdown(r)
    }
}

/// State owned by the daemon loop
///
/// Every hook runs with exclusive access; the loop never calls two at once.
#[async_trait]
pub trait DaemonHandler: Send + 'static {
    type Command: for<'de> Deserialize<'de> + Send;
    type Response: Serialize + Send + Sync;
    /// Produced inside the process, e.g. by player tasks
    type Event: Send + 'static;

    async fn handle_command(&mut self, cmd: Self::Command) -> HandleResult<Self::Response>;

    /// Handle an event received from the channel returned by `take_events`
    async fn on_event(&mut self, _event: Self::Event) {}

    /// Called when the instant from `next_wakeup` has passed, and at least
    /// once per tick interval
    async fn on_wakeup(&mut self) {}

    /// Earliest instant the handler needs `on_wakeup` to run
    fn next_wakeup(&self) -> Option<Instant> {
        None
    }

    /// Receiver for in-process events, taken once before the loop starts
    fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<Self::Event>> {
        None
    }

    /// Runs once the socket is bound
    fn on_start(&mut self) {}

    /// Runs after the loop ends, before the socket is removed
    fn on_shutdown(&mut self) {}
}

/// Serve `handler` on the configured socket until a command asks to stop
///
/// Each iteration sleeps until the handler's next wakeup (capped by the
/// tick), an in-process event arrives, or a client connects. A finished
/// client re-arms the sleep, since a command may have moved the deadline.
pub async fn run_daemon_loop<H>(config: DaemonConfig, mut handler: H) -> Result<(), DaemonError>
where
    H: DaemonHandler,
{
    socket::cleanup_socket(&config.socket_path);
    let listener = socket::create_listener(&config.socket_path)?;

    info!(socket = %config.socket_path, "daemon listening");

    let mut events = handler.take_events();
    handler.on_start();

    let handler = Arc::new(Mutex::new(handler));
    let rearm = Arc::new(Notify::new());
    let should_shutdown = Arc::new(AtomicBool::new(false));
    let tick = Duration::from_secs(config.tick_interval_secs.max(1));

    loop {
        if should_shutdown.load(Ordering::Relaxed) {
            break;
        }

        let wake_at = {
            let h = handler.lock().await;
            let cap = Instant::now() + tick;
            h.next_wakeup().map_or(cap, |at| at.min(cap))
        };

        tokio::select! {
            _ = time::sleep_until(wake_at) => {
                let mut h = handler.lock().await;
                h.on_wakeup().await;
            }

            Some(event) = next_event(&mut events) => {
                let mut h = handler.lock().await;
                h.on_event(event).await;
            }

            _ = rearm.notified() => {}

            result = listener.accept() => {
                match result {
                    Ok(mut stream) => {
                        let handler = handler.clone();
                        let buffer_size = config.buffer_size;
                        let shutdown_flag = should_shutdown.clone();
                        let rearm = rearm.clone();

                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(
                                &mut stream,
                                handler,
                                buffer_size,
                                shutdown_flag,
                            ).await {
                                warn!(error = %e, "error handling client");
                            }
                            rearm.notify_one();
                        });
                    }
                    Err(e) => warn!(error = %e, "connection error"),
                }
            }
        }
    }

    {
        let mut h = handler.lock().await;
        h.on_shutdown();
    }

    socket::cleanup_socket(&config.socket_path);
    info!("daemon stopped");

    Ok(())
}

async fn next_event<E>(events: &mut Option<mpsc::UnboundedReceiver<E>>) -> Option<E> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn handle_connection<H>(
    stream: &mut LocalSocketStream,
    handler: Arc<Mutex<H>>,
    buffer_size: usize,
    shutdown_flag: Arc<AtomicBool>,
) -> Result<(), DaemonError>
where
    H: DaemonHandler,
{
    let cmd: H::Command = match receive_message(stream, buffer_size).await {
        Ok(cmd) => cmd,
        Err(e) if e.is_closed() => {
            debug!("client disconnected without sending");
            return Ok(());
        }
        Err(e) => return Err(e),
    };

    let result = {
        let mut h = handler.lock().await;
        h.handle_command(cmd).await
    };

    match result {
        HandleResult::Response(response) => {
            send_message(stream, &response).await?;
        }
        HandleResult::Shutdown(response) => {
            send_message(stream, &response).await?;
            shutdown_flag.store(true, Ordering::Relaxed);
        }
    }

    Ok(())
}
