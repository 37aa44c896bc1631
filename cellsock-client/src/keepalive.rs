//! Ping and heartbeat timers
//!
//! Pings go out every `ping_interval` while the WebSocket is up. A
//! heartbeat line (`PING_<millis since start>`) goes out every
//! `heartbeat_interval` while the TCP session is up. Nothing tracks replies.

use crate::config::KeepaliveConfig;
use std::time::{Duration, Instant};

/// Heartbeat payload prefix
pub const HEARTBEAT_PREFIX: &str = "PING_";

/// Keepalive timers
#[derive(Debug, Clone)]
pub struct Keepalive {
    ping_interval: Duration,
    heartbeat_interval: Duration,
    last_ping: Option<Instant>,
    last_heartbeat: Option<Instant>,
}

impl Keepalive {
    /// Timers for the given periods, not yet armed
    pub fn new(config: KeepaliveConfig) -> Self {
        Self {
            ping_interval: config.ping_interval,
            heartbeat_interval: config.heartbeat_interval,
            last_ping: None,
            last_heartbeat: None,
        }
    }

    /// Arm the ping timer (upgrade just finished)
    pub fn arm_ping(&mut self, now: Instant) {
        self.last_ping = Some(now);
    }

    /// Arm the heartbeat timer (session just came up)
    pub fn arm_heartbeat(&mut self, now: Instant) {
        self.last_heartbeat = Some(now);
    }

    /// Disarm both timers
    pub fn disarm(&mut self) {
        self.last_ping = None;
        self.last_heartbeat = None;
    }

    /// Whether a ping should go out now
    pub fn ping_due(&self, now: Instant) -> bool {
        self.last_ping
            .map_or(false, |last| now.saturating_duration_since(last) >= self.ping_interval)
    }

    /// Record a ping
    pub fn ping_sent(&mut self, now: Instant) {
        self.last_ping = Some(now);
    }

    /// Whether a heartbeat should go out now
    pub fn heartbeat_due(&self, now: Instant) -> bool {
        self.last_heartbeat
            .map_or(false, |last| now.saturating_duration_since(last) >= self.heartbeat_interval)
    }

    /// Record a heartbeat check
    pub fn heartbeat_checked(&mut self, now: Instant) {
        self.last_heartbeat = Some(now);
    }
}

/// `PING_<millis>` for a client started at `started`
pub fn heartbeat_payload(started: Instant, now: Instant) -> String {
    format!(
        "{}{}",
        HEARTBEAT_PREFIX,
        now.saturating_duration_since(started).as_millis()
    )
}
