//! Session state machine
//!
//! Tracks the TCP session the modem holds on our behalf. Every change of
//! [`SessionStatus`] is reported exactly once to the status callback.

use crate::events::EventSink;
use std::fmt;
use std::time::Instant;

/// State of the modem's TCP session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SessionStatus {
    /// No session
    #[default]
    Disconnected,
    /// `AT+CIPSTART` sent, waiting for `CONNECT`
    Connecting,
    /// TCP session up
    Connected,
    /// Configuration gave up; needs `reset()`
    Error,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionStatus::Disconnected => "disconnected",
            SessionStatus::Connecting => "connecting",
            SessionStatus::Connected => "connected",
            SessionStatus::Error => "error",
        };
        f.write_str(name)
    }
}

/// Owned session state
#[derive(Debug, Default)]
pub struct Session {
    status: SessionStatus,
    connected_at: Option<Instant>,
}

impl Session {
    /// Fresh, disconnected session
    pub fn new() -> Self {
        Self::default()
    }

    /// Current status
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// Whether the TCP session is up
    pub fn is_connected(&self) -> bool {
        self.status == SessionStatus::Connected
    }

    /// When the current session came up
    pub fn connected_at(&self) -> Option<Instant> {
        self.connected_at
    }

    /// Move to `to`, notifying the sink if the status changed.
    ///
    /// Returns whether a transition happened.
    pub fn transition(&mut self, to: SessionStatus, now: Instant, events: &mut EventSink) -> bool {
        if self.status == to {
            return false;
        }

        tracing::debug!(from = %self.status, to = %to, "Session transition");
        self.status = to;
        self.connected_at = (to == SessionStatus::Connected).then_some(now);
        events.status(to);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_each_change_is_reported_once() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut events = EventSink::new();
        let captured = seen.clone();
        events.set_status(Box::new(move |status| captured.borrow_mut().push(status)));

        let now = Instant::now();
        let mut session = Session::new();
        assert!(session.transition(SessionStatus::Connecting, now, &mut events));
        assert!(session.transition(SessionStatus::Connected, now, &mut events));
        assert!(!session.transition(SessionStatus::Connected, now, &mut events));
        assert!(session.is_connected());
        assert_eq!(session.connected_at(), Some(now));
        assert!(session.transition(SessionStatus::Disconnected, now, &mut events));
        assert_eq!(session.connected_at(), None);

        assert_eq!(
            *seen.borrow(),
            vec![
                SessionStatus::Connecting,
                SessionStatus::Connected,
                SessionStatus::Disconnected
            ]
        );
    }
}
