//! Serial Transport for CellSocket
//!
//! This module provides the UART link to the modem as a CellSocket transport.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]
#![doc(html_root_url = "https://docs.rs/cellsock-transport-serial/")]

pub mod serial;

// Re-export serial transport types
pub use serial::{available_ports, SerialTransport};

/// Prelude module
pub mod prelude {
    pub use crate::serial::{available_ports, SerialTransport};
    pub use cellsock_core::transport::Transport;
}
