//! Prelude module for CellSocket Core
//!
//! This module re-exports commonly used types and traits to make them
//! easily accessible for users of the library.

pub use crate::clock::{Clock, SystemClock};
pub use crate::disambiguate::{LinkLoss, Route, StreamPhase};
pub use crate::error::{
    CommandError, ConfigError, Error, FrameError, HandshakeError, Result, TimeoutError,
};
pub use crate::frame::{Frame, FrameKind, FrameParser, MaskMode};
pub use crate::handshake::{HandshakeRequest, HandshakeStatus};
pub use crate::protocol::Opcode;
pub use crate::transport::Transport;

// Re-export commonly used external dependencies
pub use bytes::{Bytes, BytesMut};

#[cfg(feature = "mock")]
pub use crate::clock::MockClock;
#[cfg(feature = "mock")]
pub use crate::transport::mock::MockTransport;

#[cfg(feature = "serde")]
pub use serde::{Deserialize, Serialize};
