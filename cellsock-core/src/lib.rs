//! # CellSocket Core
//!
//! Protocol layer for running a WebSocket session over the raw byte stream
//! of a cellular modem in transparent mode.
//!
//! The modem gives us a single serial channel that carries both its own
//! status text (`CLOSED`, `NO CARRIER`, ...) and the TCP payload. This crate
//! provides the pieces that make sense of that stream:
//!
//! - Error handling and types
//! - WebSocket frame encoding and incremental decoding
//! - The client side of the HTTP upgrade handshake
//! - Classification of arrived bytes into frame data or link-loss signals
//! - Transport and clock abstractions used by the client state machines

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]

// Core modules
pub mod clock;
pub mod disambiguate;
pub mod error;
pub mod frame;
pub mod handshake;
pub mod protocol;
pub mod transport;

// Prelude module with common imports
pub mod prelude;

// Re-export key types for convenience
pub use clock::{Clock, SystemClock};
pub use disambiguate::{LinkLoss, Route, StreamPhase};
pub use error::{Error, Result};
pub use frame::{Frame, FrameParser, MaskMode};
pub use handshake::{HandshakeRequest, HandshakeStatus};
pub use protocol::Opcode;
pub use transport::Transport;
