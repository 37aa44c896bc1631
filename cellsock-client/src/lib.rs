//! CellSocket Client
//!
//! Drives a cellular modem through its AT-command setup, opens a transparent
//! TCP session and optionally runs a WebSocket client over it, all by polling
//! a byte stream.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cellsock_client::prelude::*;
//!
//! fn run<T: Transport>(transport: T) -> Result<()> {
//!     let mut client = ModemClient::new(transport, ClientConfig::default());
//!     client.begin("203.0.113.7", 8080, Some("internet"))?;
//!     client.on_data(|text| println!("received: {text}"));
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
#![doc(html_root_url = "https://docs.rs/cellsock-client/")]

// Logging macros, used by every module below
#[macro_use]
mod events;

// Public modules
pub mod client;
pub mod command;
pub mod config;
pub mod configurator;
pub mod keepalive;
pub mod session;
pub mod websocket;

// Prelude module
pub mod prelude;

// Re-export key types for convenience
pub use client::{ModemClient, Statistics};
pub use command::ConfigStep;
pub use config::{ClientConfig, Delays, KeepaliveConfig, Timeouts};
pub use events::{DataCallback, EventSink, LogCallback, StatusCallback};
pub use session::SessionStatus;
