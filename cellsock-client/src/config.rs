//! Client configuration for CellSocket
//!
//! This module provides configuration options for the modem client: where
//! to connect, how the modem is set up, and every timeout, delay and retry
//! cap the state machines run on.

use cellsock_core::error::ConfigError;
use cellsock_core::frame::MaskMode;
use cellsock_core::protocol::constants::{
    DEFAULT_HANDSHAKE_TIMEOUT, DEFAULT_RECEIVE_BUFFER_LIMIT, MAX_SHORT_PAYLOAD,
};
use cellsock_core::Error;
use std::time::Duration;

/// Default modem UART speed
pub const DEFAULT_BAUD_RATE: u32 = 921_600;

/// Client configuration
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ClientConfig {
    /// Server address passed to `AT+CIPSTART`
    pub server_addr: String,
    /// Server port passed to `AT+CIPSTART`
    pub server_port: u16,
    /// Access point name for `AT+CSTT` (empty lets the network choose)
    pub apn: String,
    /// UART speed towards the modem
    pub baud_rate: u32,
    /// Run a WebSocket session over the TCP link instead of raw passthrough
    pub websocket: bool,
    /// Request path for the upgrade
    pub path: String,
    /// Masking key policy for outgoing frames
    pub mask: MaskMode,
    /// Text frame sent right after a clean upgrade
    pub greeting: Option<String>,
    /// Receive buffer limit in bytes
    pub receive_buffer_limit: usize,
    /// Timeouts
    pub timeouts: Timeouts,
    /// Delays between actions
    pub delays: Delays,
    /// Keepalive periods
    pub keepalive: KeepaliveConfig,
    /// Retries per step before the whole sequence restarts
    pub max_step_retries: u32,
    /// Sequence restarts before giving up
    pub max_global_retries: u32,
    /// Sleep between polls in the blocking helpers
    pub poll_interval: Duration,
}

/// Timeouts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Timeouts {
    /// Wait for a terminal token after an AT command
    pub command: Duration,
    /// Wait for a delayed `CONNECT` after `AT+CIPSTART`
    pub connect: Duration,
    /// Whole configuration sequence
    pub configuration: Duration,
    /// WebSocket upgrade response
    pub handshake: Duration,
    /// `reconnect()` budget
    pub reconnect: Duration,
    /// Modem queries outside the sequence
    pub query: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            command: Duration::from_secs(2),
            connect: Duration::from_secs(10),
            configuration: Duration::from_secs(300),
            handshake: DEFAULT_HANDSHAKE_TIMEOUT,
            reconnect: Duration::from_secs(30),
            query: Duration::from_millis(500),
        }
    }
}

/// Delays between actions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Delays {
    /// Modem boot time after `begin`
    pub module_boot: Duration,
    /// Between two successful steps
    pub step_interval: Duration,
    /// Before re-sending a failed step
    pub retry_backoff: Duration,
    /// Before restarting the whole sequence (added to `retry_backoff`)
    pub restart_backoff: Duration,
    /// Between `CONNECT` and the upgrade request
    pub handshake_settle: Duration,
    /// Guard time around the `+++` escape
    pub escape_guard: Duration,
}

impl Default for Delays {
    fn default() -> Self {
        Self {
            module_boot: Duration::from_secs(2),
            step_interval: Duration::from_secs(1),
            retry_backoff: Duration::from_secs(2),
            restart_backoff: Duration::from_secs(5),
            handshake_settle: Duration::from_secs(1),
            escape_guard: Duration::from_secs(1),
        }
    }
}

/// Keepalive periods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct KeepaliveConfig {
    /// Ping frame period while the WebSocket is up
    pub ping_interval: Duration,
    /// Heartbeat text period while the session is up
    pub heartbeat_interval: Duration,
}

impl Default for KeepaliveConfig {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(30),
            heartbeat_interval: Duration::from_secs(60),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_addr: String::new(),
            server_port: 0,
            apn: String::new(),
            baud_rate: DEFAULT_BAUD_RATE,
            websocket: true,
            path: "/".to_string(),
            mask: MaskMode::Random,
            greeting: None,
            receive_buffer_limit: DEFAULT_RECEIVE_BUFFER_LIMIT,
            timeouts: Timeouts::default(),
            delays: Delays::default(),
            keepalive: KeepaliveConfig::default(),
            max_step_retries: 3,
            max_global_retries: 3,
            poll_interval: Duration::from_millis(100),
        }
    }
}

impl ClientConfig {
    /// Configuration for `addr:port` with every other value at its default
    pub fn new(server_addr: impl Into<String>, server_port: u16) -> Self {
        Self {
            server_addr: server_addr.into(),
            server_port,
            ..Self::default()
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> cellsock_core::Result<()> {
        if self.server_addr.trim().is_empty() {
            return Err(Error::Config(ConfigError::MissingField {
                field: "server_addr".to_string(),
            }));
        }

        if self.server_port == 0 {
            return Err(Error::Config(ConfigError::InvalidValue {
                field: "server_port".to_string(),
                value: self.server_port.to_string(),
            }));
        }

        if self.server_addr.contains('"') || self.apn.contains('"') {
            return Err(Error::Config(ConfigError::Validation(
                "server_addr and apn must not contain quotes".to_string(),
            )));
        }

        if self.baud_rate == 0 {
            return Err(Error::Config(ConfigError::Validation(
                "baud_rate must be greater than 0".to_string(),
            )));
        }

        if !self.path.starts_with('/') {
            return Err(Error::Config(ConfigError::InvalidValue {
                field: "path".to_string(),
                value: self.path.clone(),
            }));
        }

        if let Some(greeting) = &self.greeting {
            if greeting.len() > MAX_SHORT_PAYLOAD {
                return Err(Error::Config(ConfigError::Validation(format!(
                    "greeting must be at most {} bytes",
                    MAX_SHORT_PAYLOAD
                ))));
            }
        }

        if self.receive_buffer_limit == 0 {
            return Err(Error::Config(ConfigError::Validation(
                "receive_buffer_limit must be greater than 0".to_string(),
            )));
        }

        if self.timeouts.command.is_zero()
            || self.timeouts.connect.is_zero()
            || self.timeouts.configuration.is_zero()
            || self.timeouts.handshake.is_zero()
        {
            return Err(Error::Config(ConfigError::Validation(
                "command, connect, configuration and handshake timeouts must be greater than 0"
                    .to_string(),
            )));
        }

        if self.max_step_retries == 0 || self.max_global_retries == 0 {
            return Err(Error::Config(ConfigError::Validation(
                "retry caps must be greater than 0".to_string(),
            )));
        }

        if self.keepalive.ping_interval.is_zero() || self.keepalive.heartbeat_interval.is_zero() {
            return Err(Error::Config(ConfigError::Validation(
                "keepalive intervals must be greater than 0".to_string(),
            )));
        }

        Ok(())
    }

    /// `addr:port`, as used in the Host header
    pub fn host(&self) -> String {
        format!("{}:{}", self.server_addr, self.server_port)
    }

    /// Set the server address and port
    pub fn server(mut self, addr: impl Into<String>, port: u16) -> Self {
        self.server_addr = addr.into();
        self.server_port = port;
        self
    }

    /// Set the APN
    pub fn apn(mut self, apn: impl Into<String>) -> Self {
        self.apn = apn.into();
        self
    }

    /// Set the UART speed
    pub fn baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    /// Enable or disable the WebSocket layer
    pub fn websocket(mut self, enabled: bool) -> Self {
        self.websocket = enabled;
        self
    }

    /// Set the upgrade request path
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Set the masking policy
    pub fn mask(mut self, mask: MaskMode) -> Self {
        self.mask = mask;
        self
    }

    /// Send `text` once the upgrade completes
    pub fn greeting(mut self, text: impl Into<String>) -> Self {
        self.greeting = Some(text.into());
        self
    }

    /// Set the receive buffer limit
    pub fn receive_buffer_limit(mut self, limit: usize) -> Self {
        self.receive_buffer_limit = limit;
        self
    }

    /// Set the AT command timeout
    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.command = timeout;
        self
    }

    /// Set the delayed-`CONNECT` timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.connect = timeout;
        self
    }

    /// Set the overall configuration budget
    pub fn configuration_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.configuration = timeout;
        self
    }

    /// Set the handshake timeout
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.handshake = timeout;
        self
    }

    /// Set the reconnect budget
    pub fn reconnect_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.reconnect = timeout;
        self
    }

    /// Set all delays at once
    pub fn delays(mut self, delays: Delays) -> Self {
        self.delays = delays;
        self
    }

    /// Set the keepalive periods
    pub fn keepalive(mut self, ping_interval: Duration, heartbeat_interval: Duration) -> Self {
        self.keepalive = KeepaliveConfig {
            ping_interval,
            heartbeat_interval,
        };
        self
    }

    /// Set the retry caps
    pub fn retries(mut self, per_step: u32, global: u32) -> Self {
        self.max_step_retries = per_step;
        self.max_global_retries = global;
        self
    }

    /// Set the blocking helpers' poll interval
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}
