//! Event delivery to the host application
//!
//! Decoded messages, status changes and log lines leave the client through
//! [`EventSink`]. Log lines always go to `tracing`; when a log callback is
//! installed they are mirrored to it with a level prefix.

use crate::session::SessionStatus;
use std::fmt;

/// Callback receiving decoded text
pub type DataCallback = Box<dyn FnMut(&str)>;
/// Callback receiving status transitions
pub type StatusCallback = Box<dyn FnMut(SessionStatus)>;
/// Callback receiving log lines
pub type LogCallback = Box<dyn FnMut(&str)>;

/// Log a line at info level through an [`EventSink`]
macro_rules! log_info {
    ($sink:expr, $($arg:tt)*) => {{
        let line = format!($($arg)*);
        tracing::info!("{}", line);
        $sink.mirror("INFO", &line);
    }};
}

/// Log a line at warn level through an [`EventSink`]
macro_rules! log_warn {
    ($sink:expr, $($arg:tt)*) => {{
        let line = format!($($arg)*);
        tracing::warn!("{}", line);
        $sink.mirror("WARN", &line);
    }};
}

/// Log a line at error level through an [`EventSink`]
macro_rules! log_error {
    ($sink:expr, $($arg:tt)*) => {{
        let line = format!($($arg)*);
        tracing::error!("{}", line);
        $sink.mirror("ERROR", &line);
    }};
}

/// Optional callbacks of the host application
#[derive(Default)]
pub struct EventSink {
    data: Option<DataCallback>,
    status: Option<StatusCallback>,
    log: Option<LogCallback>,
}

impl EventSink {
    /// Sink with no callbacks installed
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the data callback
    pub fn set_data(&mut self, callback: DataCallback) {
        self.data = Some(callback);
    }

    /// Install the status callback
    pub fn set_status(&mut self, callback: StatusCallback) {
        self.status = Some(callback);
    }

    /// Install the log callback
    pub fn set_log(&mut self, callback: LogCallback) {
        self.log = Some(callback);
    }

    /// Deliver a decoded message
    pub fn data(&mut self, text: &str) {
        if let Some(callback) = self.data.as_mut() {
            callback(text);
        }
    }

    /// Deliver a status transition
    pub fn status(&mut self, status: SessionStatus) {
        if let Some(callback) = self.status.as_mut() {
            callback(status);
        }
    }

    /// Forward an already-traced line to the log callback
    pub fn mirror(&mut self, level: &str, line: &str) {
        if let Some(callback) = self.log.as_mut() {
            callback(&format!("[{}] {}", level, line));
        }
    }
}

impl fmt::Debug for EventSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSink")
            .field("data", &self.data.is_some())
            .field("status", &self.status.is_some())
            .field("log", &self.log.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_log_lines_are_prefixed() {
        let lines = Rc::new(RefCell::new(Vec::new()));
        let mut sink = EventSink::new();
        let captured = lines.clone();
        sink.set_log(Box::new(move |line| captured.borrow_mut().push(line.to_string())));

        log_info!(sink, "Step {} ok", 1);
        log_warn!(sink, "soft failure");
        log_error!(sink, "gone");

        assert_eq!(
            *lines.borrow(),
            vec!["[INFO] Step 1 ok", "[WARN] soft failure", "[ERROR] gone"]
        );
    }

    #[test]
    fn test_missing_callbacks_are_ignored() {
        let mut sink = EventSink::new();
        sink.data("hello");
        sink.status(SessionStatus::Connected);
        log_info!(sink, "nobody listens");
        assert_eq!(format!("{:?}", sink), "EventSink { data: false, status: false, log: false }");
    }
}
