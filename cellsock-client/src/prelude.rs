//! Prelude module for CellSocket Client
//!
//! This module re-exports commonly used types and traits to make them
//! easily accessible for users of the client library.

pub use crate::client::{ModemClient, Statistics};
pub use crate::command::ConfigStep;
pub use crate::config::{ClientConfig, Delays, KeepaliveConfig, Timeouts};
pub use crate::session::SessionStatus;

// Re-export core types for convenience
pub use cellsock_core::prelude::*;
pub use cellsock_core::{Error, Result};

// Re-export commonly used external dependencies
pub use std::time::Duration;
