//! Streaming session errors
//!
//! None of these are fatal. The controller recovers locally (fallback,
//! no-op or stop) and hands the error back so callers can report it.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why the media player gave up on a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreamErrorKind {
    /// The stream could not be fetched or decoded
    Source,
    /// Audio output failed
    Renderer,
    /// The player failed in some other way
    Unexpected,
}

impl fmt::Display for StreamErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Source => "source",
            Self::Renderer => "renderer",
            Self::Unexpected => "unexpected",
        };
        f.write_str(text)
    }
}

/// Streaming session errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    #[error("No network connection")]
    NoNetwork,

    #[error("Stream unavailable ({0} error)")]
    StreamUnavailable(StreamErrorKind),

    #[error("Station #{0} not configured")]
    StationNotConfigured(usize),

    #[error("Not applicable in the current mode")]
    NotApplicable,
}

/// Result type for controller operations
pub type Result<T> = std::result::Result<T, StreamError>;
