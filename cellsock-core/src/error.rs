//! Error types for CellSocket
//!
//! This module defines all error types used throughout the CellSocket crates.
//! Most failures on the polling path are absorbed into state transitions and
//! only logged; these types are what the caller-facing operations return and
//! what the logs render.

#![allow(missing_docs)]

use std::time::Duration;
use thiserror::Error;

/// Result type alias for CellSocket operations
pub type Result<T> = std::result::Result<T, Error>;

/// Comprehensive error type for CellSocket operations
#[derive(Error, Debug)]
pub enum Error {
    /// Frame errors
    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),

    /// Modem command errors
    #[error("Command error: {0}")]
    Command(#[from] CommandError),

    /// Timeout errors
    #[error("Timeout error: {0}")]
    Timeout(#[from] TimeoutError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O errors from the underlying transport
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Operation requires an established TCP session
    #[error("Not connected")]
    NotConnected,

    /// Outgoing payload exceeds what a single short frame can carry
    #[error("Payload too long: {len} bytes (max: {max})")]
    PayloadTooLong { len: usize, max: usize },

    /// Operation is not valid in the current client state
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

/// Frame decoding and encoding errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Insufficient data to decode a frame; wait for more bytes
    #[error("Insufficient data: need {needed} bytes, have {have}")]
    InsufficientData { needed: usize, have: usize },

    /// The FIN bit is not set; fragmented messages are not supported
    #[error("FIN bit not set (first byte {first_byte:#04x})")]
    FinNotSet { first_byte: u8 },

    /// The 64-bit extended payload length form was used
    #[error("64-bit payload length is not supported")]
    UnsupportedLength64,

    /// Receive buffer grew past its limit without yielding a frame
    #[error("Receive buffer overflow: {size} bytes (limit: {limit})")]
    BufferOverflow { size: usize, limit: usize },

    /// Payload does not fit the 16-bit extended length form
    #[error("Payload too large: {len} bytes (max: {max})")]
    PayloadTooLarge { len: usize, max: usize },
}

/// WebSocket upgrade handshake failures; the client logs these and keeps
/// waiting, so they are never returned from an operation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandshakeError {
    /// Peer or modem answered with a failure token
    #[error("Handshake rejected: {0}")]
    Rejected(String),

    /// Response grew past the buffer limit without resolving
    #[error("Handshake response too long: {size} bytes")]
    Overflow { size: usize },
}

/// AT command and configuration-sequence errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// The response did not satisfy the step's success predicate
    #[error("Step `{step}` failed (attempt {attempt})")]
    StepFailure { step: String, attempt: u32 },

    /// Global retry budget used up; requires an explicit reset
    #[error("Configuration abandoned after {cycles} full cycles")]
    Exhausted { cycles: u32 },

    /// Modem reported the TCP connect as failed
    #[error("TCP connect failed: {0}")]
    ConnectFailed(String),
}

/// Timeout errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimeoutError {
    /// Single AT command timeout
    #[error("Command timeout: {timeout:?}")]
    Command { timeout: Duration },

    /// Waiting for a delayed CONNECT notification
    #[error("Connect timeout: {timeout:?}")]
    Connect { timeout: Duration },

    /// WebSocket handshake timeout
    #[error("Handshake timeout: {timeout:?}")]
    Handshake { timeout: Duration },

    /// Overall configuration budget
    #[error("Configuration timeout: {timeout:?}")]
    Configuration { timeout: Duration },

    /// Reconnect budget
    #[error("Reconnect timeout: {timeout:?}")]
    Reconnect { timeout: Duration },
}

/// Configuration errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Invalid configuration value
    #[error("Invalid configuration value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    /// Missing required configuration
    #[error("Missing required configuration: {field}")]
    MissingField { field: String },

    /// Configuration validation failed
    #[error("Configuration validation failed: {0}")]
    Validation(String),
}

impl Error {
    /// Whether this error only means "not enough bytes yet"
    pub fn is_incomplete(&self) -> bool {
        matches!(self, Error::Frame(FrameError::InsufficientData { .. }))
    }
}
