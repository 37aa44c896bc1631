//! # CellSocket
//!
//! **WebSocket client for cellular modems driven over a serial AT-command link**
//!
//! CellSocket configures an LTE modem with AT commands, opens a transparent
//! TCP session through it and runs a WebSocket client over the same byte
//! stream. Everything is polled: no threads, no async runtime.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cellsock::prelude::*;
//!
//! fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
//!     cellsock::logging::init_logging()?;
//!
//!     let port = SerialTransport::open("/dev/ttyUSB0", 921_600)?;
//!     let mut client = ModemClient::new(port, ClientConfig::default());
//!     client.begin("203.0.113.7", 8080, Some("internet"))?;
//!     client.on_data(|text| println!("{text}"));
//!     client.configure()?;
//!
//!     loop {
//!         client.handle_data();
//!         std::thread::sleep(Duration::from_millis(10));
//!     }
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]
#![doc(html_root_url = "https://docs.rs/cellsock/")]

// Re-export core components
pub use cellsock_core::*;

#[cfg(feature = "client")]
pub use cellsock_client as client;

#[cfg(feature = "transport-serial")]
pub use cellsock_transport_serial as transport_serial;

pub mod logging;

/// Prelude module with common imports
pub mod prelude {
    pub use cellsock_core::prelude::*;

    #[cfg(feature = "client")]
    pub use cellsock_client::prelude::*;

    #[cfg(feature = "transport-serial")]
    pub use cellsock_transport_serial::prelude::*;
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_library_compiles() {
        assert_eq!(env!("CARGO_PKG_NAME"), "cellsock");
    }
}
