//! Error types
//!
//! Failures are split by how far they are allowed to travel:
//!
//! - [`Error::TranscoderTerminated`] and [`Error::Capture`] are fatal to the
//!   broadcast and drive the orchestrator's stop sequence.
//! - [`ConnectionFault`] and [`HandshakeError`] stay local to one viewer.
//! - [`Error::MalformedCommand`] stays local to one control request.

use std::path::PathBuf;
use std::process::ExitStatus;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Crate-wide error type
#[derive(Debug)]
pub enum Error {
    /// I/O error not attributable to a more specific condition
    Io(std::io::Error),

    /// The transcoder process went away while frames were still being fed
    TranscoderTerminated {
        /// Exit status, if the process had already been reaped
        status: Option<ExitStatus>,
    },

    /// Stream protocol handshake failed
    Handshake(HandshakeError),

    /// A viewer connection failed
    Connection(ConnectionFault),

    /// A control request could not be parsed
    MalformedCommand(String),

    /// Invalid configuration
    Config(String),

    /// The frame source failed
    Capture(String),

    /// A static asset could not be loaded
    Asset {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Failure while upgrading a viewer transport
#[derive(Debug)]
pub enum HandshakeError {
    /// The WebSocket upgrade was rejected or the peer went away mid-upgrade
    Upgrade(String),

    /// The stream header could not be delivered
    Header(String),
}

/// Failure on an established viewer connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionFault {
    /// The viewer closed the connection
    Closed,

    /// The viewer's outgoing queue filled up
    QueueOverflow,

    /// The transport reported an error
    Transport(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::TranscoderTerminated { status: Some(status) } => {
                write!(f, "Transcoder terminated: {}", status)
            }
            Error::TranscoderTerminated { status: None } => write!(f, "Transcoder terminated"),
            Error::Handshake(e) => write!(f, "Handshake failed: {}", e),
            Error::Connection(e) => write!(f, "Connection fault: {}", e),
            Error::MalformedCommand(msg) => write!(f, "Malformed command: {}", msg),
            Error::Config(msg) => write!(f, "Invalid configuration: {}", msg),
            Error::Capture(msg) => write!(f, "Capture failed: {}", msg),
            Error::Asset { path, source } => {
                write!(f, "Failed to load asset {}: {}", path.display(), source)
            }
        }
    }
}

impl std::fmt::Display for HandshakeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HandshakeError::Upgrade(msg) => write!(f, "upgrade rejected: {}", msg),
            HandshakeError::Header(msg) => write!(f, "stream header not delivered: {}", msg),
        }
    }
}

impl std::fmt::Display for ConnectionFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionFault::Closed => write!(f, "closed by peer"),
            ConnectionFault::QueueOverflow => write!(f, "outgoing queue overflow"),
            ConnectionFault::Transport(msg) => write!(f, "transport error: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Asset { source, .. } => Some(source),
            Error::Handshake(e) => Some(e),
            Error::Connection(e) => Some(e),
            _ => None,
        }
    }
}

impl std::error::Error for HandshakeError {}

impl std::error::Error for ConnectionFault {}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<HandshakeError> for Error {
    fn from(e: HandshakeError) -> Self {
        Error::Handshake(e)
    }
}

impl From<ConnectionFault> for Error {
    fn from(e: ConnectionFault) -> Self {
        Error::Connection(e)
    }
}
