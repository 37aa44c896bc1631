//! Modem client for CellSocket
//!
//! [`ModemClient`] owns the transport and every piece of state: the
//! configuration machine, the TCP session, the WebSocket session, keepalive
//! timers and callbacks. The host calls [`ModemClient::handle_data`]
//! repeatedly; each call does at most one of the following, in priority
//! order:
//!
//! 1. advance modem configuration (until it completes),
//! 2. advance the WebSocket upgrade,
//! 3. decode frames (or pass text through when the WebSocket is off),
//! 4. the periodic health check, on a poll where nothing above had work
//!    (including polls spent waiting for the upgrade response).
//!
//! `configure`, `reconnect` and the modem queries are blocking helpers that
//! loop over `handle_data` and [`Clock::sleep`].

use crate::command::{parse_iccid, parse_signal_strength, CommandExecutor, CommandPoll, ConfigStep};
use crate::config::ClientConfig;
use crate::configurator::{Configurator, Progress};
use crate::events::EventSink;
use crate::keepalive::{heartbeat_payload, Keepalive};
use crate::session::{Session, SessionStatus};
use crate::websocket::{HandshakeEvent, HandshakeState, WebSocketSession};
use bytes::Bytes;
use cellsock_core::clock::{Clock, SystemClock};
use cellsock_core::disambiguate::{classify, Route, StreamPhase};
use cellsock_core::error::{CommandError, Error, Result, TimeoutError};
use cellsock_core::frame::{Frame, FrameKind};
use cellsock_core::transport::Transport;
use std::fmt;
use std::time::{Duration, Instant};

/// Escape from transparent mode back to command mode
const ESCAPE_SEQUENCE: &str = "+++";

/// Close the TCP session from command mode
const CLOSE_COMMAND: &str = "AT+CIPCLOSE";

/// Cellular modem client
pub struct ModemClient<T: Transport, C: Clock = SystemClock> {
    transport: T,
    clock: C,
    config: ClientConfig,
    configurator: Configurator,
    session: Session,
    websocket: WebSocketSession,
    keepalive: Keepalive,
    events: EventSink,
    queries: CommandExecutor,
    started_at: Instant,
    ready_at: Instant,
    pending_close: Option<Instant>,
    messages_sent: u64,
    messages_received: u64,
}

impl<T: Transport> ModemClient<T, SystemClock> {
    /// Create a client on the system clock
    pub fn new(transport: T, config: ClientConfig) -> Self {
        Self::with_clock(transport, SystemClock, config)
    }
}

impl<T: Transport, C: Clock> ModemClient<T, C> {
    /// Create a client on a custom clock
    pub fn with_clock(transport: T, clock: C, config: ClientConfig) -> Self {
        let now = clock.now();
        Self {
            websocket: WebSocketSession::new(
                config.receive_buffer_limit,
                config.mask,
                config.path.clone(),
            ),
            keepalive: Keepalive::new(config.keepalive),
            transport,
            clock,
            config,
            configurator: Configurator::new(),
            session: Session::new(),
            events: EventSink::new(),
            queries: CommandExecutor::new(),
            started_at: now,
            ready_at: now,
            pending_close: None,
            messages_sent: 0,
            messages_received: 0,
        }
    }

    /// Set the server and APN; the modem gets its boot delay before the
    /// first command
    pub fn begin(&mut self, server_addr: &str, server_port: u16, apn: Option<&str>) -> Result<()> {
        self.config.server_addr = server_addr.to_string();
        self.config.server_port = server_port;
        self.config.apn = apn.unwrap_or_default().to_string();
        self.config.validate()?;

        self.ready_at = self.clock.now() + self.config.delays.module_boot;
        log_info!(self.events, "Modem client initialised at {} baud", self.config.baud_rate);
        log_info!(self.events, "Server: {}", self.config.host());
        Ok(())
    }

    /// Switch the WebSocket layer on or off
    pub fn enable_websocket(&mut self, enable: bool) {
        self.config.websocket = enable;
        log_info!(
            self.events,
            "WebSocket mode {}",
            if enable { "enabled" } else { "disabled" }
        );
    }

    /// Start configuration without waiting for it
    pub fn start_configuration(&mut self) -> Result<()> {
        self.config.validate()?;
        let now = self.clock.now();
        log_info!(self.events, "Starting modem configuration");
        self.configurator.start(now.max(self.ready_at), now);
        Ok(())
    }

    /// Configure the modem, polling until the TCP session is up.
    ///
    /// Gives up after the configuration timeout or once retries run out; the
    /// status is `Error` in both cases.
    pub fn configure(&mut self) -> Result<()> {
        self.start_configuration()?;
        let budget = self.config.timeouts.configuration;
        let deadline = self.clock.now() + budget;

        loop {
            self.handle_data();
            if self.configurator.is_completed() {
                log_info!(self.events, "Modem configured");
                return Ok(());
            }
            if self.configurator.is_failed() {
                log_error!(self.events, "Modem configuration failed");
                return Err(CommandError::Exhausted {
                    cycles: self.configurator.counters().global_retries,
                }
                .into());
            }
            if self.clock.now() >= deadline {
                break;
            }
            self.clock.sleep(self.config.poll_interval);
        }

        log_error!(self.events, "Modem configuration timed out after {:?}", budget);
        self.configurator.reset();
        let now = self.clock.now();
        self.session.transition(SessionStatus::Error, now, &mut self.events);
        Err(TimeoutError::Configuration { timeout: budget }.into())
    }

    /// Poll once. Call this repeatedly.
    pub fn handle_data(&mut self) {
        let now = self.clock.now();

        if let Some(at) = self.pending_close {
            if now >= at {
                self.pending_close = None;
                self.write_line(CLOSE_COMMAND);
                return;
            }
        }

        if !self.configurator.is_completed() {
            if self.configurator.is_running() {
                self.poll_configuration(now);
            }
            return;
        }

        if !self.session.is_connected() {
            self.discard_input();
            return;
        }

        let worked = if self.config.websocket {
            if self.websocket.handshake_complete() {
                self.poll_frames(now)
            } else {
                self.poll_handshake(now)
            }
        } else {
            self.poll_passthrough()
        };

        if !worked && self.keepalive.heartbeat_due(now) {
            self.keepalive.heartbeat_checked(now);
            self.check_connection_health(now);
        }
    }

    fn poll_configuration(&mut self, now: Instant) {
        let progress =
            self.configurator
                .poll(&mut self.transport, now, &self.config, &mut self.events);

        match progress {
            Progress::CommandSent(ConfigStep::ConnectTcp) => {
                self.session
                    .transition(SessionStatus::Connecting, now, &mut self.events);
            }
            Progress::Restarted => {
                self.websocket.clear();
                self.session
                    .transition(SessionStatus::Disconnected, now, &mut self.events);
            }
            Progress::Completed => {
                self.session
                    .transition(SessionStatus::Connected, now, &mut self.events);
                self.keepalive.arm_heartbeat(now);
                if self.config.websocket {
                    self.websocket
                        .schedule(now + self.config.delays.handshake_settle);
                }
                #[cfg(feature = "metrics")]
                metrics::counter!("cellsock_client_sessions_opened_total").increment(1);
            }
            Progress::Exhausted => {
                self.session
                    .transition(SessionStatus::Error, now, &mut self.events);
            }
            Progress::Idle | Progress::Working | Progress::CommandSent(_) => {}
        }
    }

    /// Advance the upgrade; returns whether anything was sent or read
    fn poll_handshake(&mut self, now: Instant) -> bool {
        if self.websocket.request_due(now) {
            self.send_handshake(now);
            return true;
        }

        if matches!(self.websocket.state(), HandshakeState::Idle) {
            self.websocket.schedule(now);
            return false;
        }
        if !matches!(self.websocket.state(), HandshakeState::Awaiting { .. }) {
            return false;
        }

        if self
            .websocket
            .handshake_expired(now, self.config.timeouts.handshake)
        {
            log_error!(
                self.events,
                "[WS] {}, sending a new request",
                TimeoutError::Handshake {
                    timeout: self.config.timeouts.handshake
                }
            );
            self.send_handshake(now);
            return true;
        }

        let Some(chunk) = self.read_chunk() else {
            return false;
        };
        tracing::debug!(len = chunk.len(), "[WS] handshake bytes received");

        if let Route::LinkLoss(reason) = classify(&chunk, StreamPhase::Handshake) {
            self.handle_link_loss(&reason.to_string(), now);
            return true;
        }

        match self.websocket.feed_handshake(&chunk) {
            HandshakeEvent::Pending => {}
            HandshakeEvent::Accepted {
                residue,
                accept_valid,
            } => {
                log_info!(self.events, "[WS] Handshake complete");
                if accept_valid == Some(false) {
                    log_warn!(self.events, "[WS] Sec-WebSocket-Accept does not match the request key");
                }
                self.keepalive.arm_ping(now);
                if residue > 0 {
                    log_info!(self.events, "[WS] {} bytes followed the upgrade response", residue);
                    let frames = self.websocket.process_buffer();
                    self.dispatch(frames, now);
                } else if let Some(greeting) = self.config.greeting.clone() {
                    if let Err(e) = self.send_text_frame(&greeting) {
                        log_error!(self.events, "[WS] Greeting not sent: {}", e);
                    }
                }
            }
            HandshakeEvent::FrameObserved => {
                log_info!(
                    self.events,
                    "[WS] Frame received before the upgrade response, treating upgrade as done"
                );
                self.keepalive.arm_ping(now);
            }
            HandshakeEvent::Failed(e) => {
                log_error!(self.events, "[WS] {}", e);
            }
        }
        true
    }

    fn send_handshake(&mut self, now: Instant) {
        if let Ok(dropped) = self.transport.drain() {
            if dropped > 0 {
                tracing::debug!(bytes = dropped, "Discarded input before upgrade request");
            }
        }

        let host = self.config.host();
        let request = self.websocket.begin_handshake(&host, now);
        log_info!(self.events, "[WS] Sending upgrade request to {}{}", host, request.path);
        tracing::debug!(request = %request.to_http(), "[WS] upgrade request");

        if let Err(e) = self.transport.write_all(request.to_http().as_bytes()) {
            log_error!(self.events, "[WS] Failed to send upgrade request: {}", e);
        }
    }

    fn poll_frames(&mut self, now: Instant) -> bool {
        let mut worked = false;

        if self.websocket.buffered() > 0 {
            let frames = self.websocket.process_buffer();
            worked = !frames.is_empty();
            self.dispatch(frames, now);
        }

        if let Some(chunk) = self.read_chunk() {
            worked = true;
            let phase = StreamPhase::Established {
                websocket_connected: self.websocket.is_connected(),
            };
            match classify(&chunk, phase) {
                Route::LinkLoss(reason) => {
                    self.handle_link_loss(&reason.to_string(), now);
                    return true;
                }
                Route::Frames => {
                    let frames = self.websocket.feed_frames(&chunk);
                    self.dispatch(frames, now);
                }
            }
        }

        if self.websocket.is_open() && self.keepalive.ping_due(now) {
            self.send_ping(now);
            worked = true;
        }

        worked
    }

    fn dispatch(&mut self, frames: Vec<Result<Frame>>, now: Instant) {
        for result in frames {
            match result {
                Ok(frame) => self.dispatch_frame(frame, now),
                Err(e) => log_error!(self.events, "[WS] {}", e),
            }
            if !self.session.is_connected() {
                break;
            }
        }
    }

    fn dispatch_frame(&mut self, frame: Frame, now: Instant) {
        #[cfg(feature = "metrics")]
        metrics::counter!("cellsock_client_frames_received_total").increment(1);

        match frame.kind() {
            FrameKind::Text => {
                let text = frame.text_lossy().into_owned();
                log_info!(self.events, "[WS] Received: {}", text);
                self.messages_received += 1;
                #[cfg(feature = "metrics")]
                metrics::counter!("cellsock_client_messages_received_total").increment(1);
                self.events.data(&text);
            }
            FrameKind::Binary => {
                log_info!(self.events, "[WS] Binary frame, {} bytes", frame.payload_len());
            }
            FrameKind::Close => {
                log_info!(self.events, "[WS] Close frame received");
                self.websocket.mark_closed();
                self.handle_link_loss("close frame", now);
            }
            FrameKind::Ping => {
                log_info!(self.events, "[WS] Ping received, sending pong");
                match self.websocket.pong_frame() {
                    Ok(pong) => self.write_bytes(&pong),
                    Err(e) => log_error!(self.events, "[WS] {}", e),
                }
            }
            FrameKind::Pong => tracing::debug!("[WS] pong received"),
            FrameKind::Continuation | FrameKind::Reserved => {
                log_warn!(
                    self.events,
                    "[WS] Unexpected frame opcode {:#x}",
                    frame.opcode.value()
                );
            }
        }
    }

    fn poll_passthrough(&mut self) -> bool {
        let Some(chunk) = self.read_chunk() else {
            return false;
        };
        let text = String::from_utf8_lossy(&chunk);
        let text = text.trim();
        if !text.is_empty() {
            log_info!(self.events, "[TCP] Received: {}", text);
            self.messages_received += 1;
            self.events.data(text);
        }
        true
    }

    fn send_ping(&mut self, now: Instant) {
        match self.websocket.ping_frame() {
            Ok(ping) => {
                self.write_bytes(&ping);
                tracing::debug!("[WS] ping sent");
            }
            Err(e) => log_error!(self.events, "[WS] {}", e),
        }
        self.keepalive.ping_sent(now);
    }

    fn check_connection_health(&mut self, now: Instant) {
        if !self.session.is_connected() {
            return;
        }
        let heartbeat = heartbeat_payload(self.started_at, now);
        if self.config.websocket && self.websocket.is_connected() {
            if let Err(e) = self.send_text_frame(&heartbeat) {
                log_error!(self.events, "[WS] Heartbeat not sent: {}", e);
            }
        } else {
            self.write_line(&heartbeat);
        }
        tracing::debug!(%heartbeat, "Health check heartbeat sent");
    }

    fn handle_link_loss(&mut self, reason: &str, now: Instant) {
        log_error!(self.events, "Connection lost: {}", reason);
        self.websocket.clear();
        self.keepalive.disarm();
        self.session
            .transition(SessionStatus::Disconnected, now, &mut self.events);
        #[cfg(feature = "metrics")]
        metrics::counter!("cellsock_client_link_losses_total").increment(1);
    }

    fn discard_input(&mut self) {
        if let Some(chunk) = self.read_chunk() {
            tracing::debug!(bytes = chunk.len(), "Discarding input while disconnected");
        }
    }

    fn read_chunk(&mut self) -> Option<Bytes> {
        let read = match self.transport.available() {
            Ok(0) => return None,
            Ok(_) => self.transport.read_available(),
            Err(e) => Err(e),
        };
        match read {
            Ok(chunk) if chunk.is_empty() => None,
            Ok(chunk) => Some(chunk),
            Err(e) => {
                log_error!(self.events, "Transport read failed: {}", e);
                None
            }
        }
    }

    fn write_bytes(&mut self, bytes: &[u8]) {
        if let Err(e) = self.transport.write_all(bytes) {
            log_error!(self.events, "Transport write failed: {}", e);
        }
    }

    fn write_line(&mut self, line: &str) {
        let mut bytes = Vec::with_capacity(line.len() + 2);
        bytes.extend_from_slice(line.as_bytes());
        bytes.extend_from_slice(b"\r\n");
        self.write_bytes(&bytes);
    }

    fn send_text_frame(&mut self, text: &str) -> Result<()> {
        let frame = self.websocket.text_frame(text)?;
        self.transport.write_all(&frame)?;
        log_info!(self.events, "[WS] Sent: {}", text);
        #[cfg(feature = "metrics")]
        metrics::counter!("cellsock_client_frames_sent_total").increment(1);
        Ok(())
    }

    /// Send text: a masked text frame when the WebSocket is connected, a raw
    /// line otherwise
    pub fn send_data(&mut self, text: &str) -> Result<()> {
        if !self.session.is_connected() {
            log_error!(self.events, "Send failed: not connected");
            return Err(Error::NotConnected);
        }

        let framed = self.config.websocket && self.websocket.is_connected();
        let sent = if framed {
            self.send_text_frame(text)
        } else {
            let mut line = String::with_capacity(text.len() + 2);
            line.push_str(text);
            line.push_str("\r\n");
            self.transport.write_all(line.as_bytes())
        };

        if let Err(e) = sent {
            log_error!(self.events, "Send failed: {}", e);
            return Err(e);
        }
        if !framed {
            log_info!(self.events, "[TCP] Sent: {}", text);
        }

        self.messages_sent += 1;
        #[cfg(feature = "metrics")]
        metrics::counter!("cellsock_client_messages_sent_total").increment(1);
        Ok(())
    }

    /// Send bytes: a masked binary frame when the WebSocket is connected,
    /// raw otherwise
    pub fn send_binary_data(&mut self, data: &[u8]) -> Result<()> {
        if !self.session.is_connected() {
            log_error!(self.events, "Send failed: not connected");
            return Err(Error::NotConnected);
        }

        let sent = if self.config.websocket && self.websocket.is_connected() {
            self.websocket
                .binary_frame(data)
                .and_then(|frame| self.transport.write_all(&frame))
        } else {
            self.transport.write_all(data)
        };

        if let Err(e) = sent {
            log_error!(self.events, "Binary send failed: {}", e);
            return Err(e);
        }

        log_info!(self.events, "Binary data sent, {} bytes", data.len());
        self.messages_sent += 1;
        #[cfg(feature = "metrics")]
        metrics::counter!("cellsock_client_messages_sent_total").increment(1);
        Ok(())
    }

    /// Leave transparent mode and close the TCP session.
    ///
    /// `+++` goes out now; `AT+CIPCLOSE` follows after the escape guard time
    /// on a later poll.
    pub fn disconnect(&mut self) {
        log_info!(self.events, "Disconnecting");
        let now = self.clock.now();
        self.write_line(ESCAPE_SEQUENCE);

        let guard = self.config.delays.escape_guard;
        if guard.is_zero() {
            self.write_line(CLOSE_COMMAND);
            self.pending_close = None;
        } else {
            self.pending_close = Some(now + guard);
        }

        self.websocket.clear();
        self.keepalive.disarm();
        self.session
            .transition(SessionStatus::Disconnected, now, &mut self.events);
    }

    /// Disconnect and re-run only the TCP connect step, without waiting
    pub fn start_reconnect(&mut self) -> Result<()> {
        self.config.validate()?;
        log_info!(self.events, "Reconnecting");
        self.disconnect();

        let now = self.clock.now();
        let at = now + self.config.delays.escape_guard + self.config.delays.retry_backoff;
        self.configurator.resume_at(ConfigStep::ConnectTcp, at, now);
        Ok(())
    }

    /// Disconnect and reconnect, polling until the TCP session is back
    pub fn reconnect(&mut self) -> Result<()> {
        self.start_reconnect()?;
        let budget = self.config.timeouts.reconnect;
        let deadline = self.clock.now() + budget;

        loop {
            self.handle_data();
            if self.session.is_connected() {
                return Ok(());
            }
            if self.configurator.is_failed() {
                return Err(CommandError::Exhausted {
                    cycles: self.configurator.counters().global_retries,
                }
                .into());
            }
            if self.clock.now() >= deadline {
                log_error!(self.events, "Reconnect timed out after {:?}", budget);
                return Err(TimeoutError::Reconnect { timeout: budget }.into());
            }
            self.clock.sleep(self.config.poll_interval);
        }
    }

    /// Send `PING_<millis since start>` over the active channel
    pub fn send_heartbeat(&mut self) -> Result<()> {
        let heartbeat = heartbeat_payload(self.started_at, self.clock.now());
        self.send_data(&heartbeat)?;
        log_info!(self.events, "Heartbeat sent");
        Ok(())
    }

    /// Drop all session state and start configuration again from `AT`
    pub fn reset(&mut self) -> Result<()> {
        log_info!(self.events, "Resetting modem client");
        let now = self.clock.now();
        self.configurator.reset();
        self.websocket.clear();
        self.keepalive.disarm();
        self.pending_close = None;
        self.session
            .transition(SessionStatus::Disconnected, now, &mut self.events);

        self.config.validate()?;
        self.configurator
            .start(now + self.config.delays.retry_backoff, now);
        Ok(())
    }

    fn ensure_command_mode(&self) -> Result<()> {
        if self.session.is_connected() || self.configurator.is_running() {
            return Err(Error::InvalidState(
                "modem queries need command mode with no configuration running".to_string(),
            ));
        }
        Ok(())
    }

    fn query(&mut self, command: &str) -> Result<String> {
        self.ensure_command_mode()?;
        let timeout = self.config.timeouts.query;
        self.queries
            .send(&mut self.transport, command, timeout, self.clock.now())?;

        loop {
            match self.queries.poll(&mut self.transport, self.clock.now())? {
                CommandPoll::Complete(response) | CommandPoll::TimedOut(response) => {
                    return Ok(response)
                }
                CommandPoll::Idle => return Ok(String::new()),
                CommandPoll::Pending => self.clock.sleep(self.config.poll_interval.min(timeout)),
            }
        }
    }

    /// Module identification (`ATI`)
    pub fn module_info(&mut self) -> Result<String> {
        Ok(self.query("ATI")?.trim().to_string())
    }

    /// Signal strength (`AT+CSQ`); `None` when the response has no RSSI
    pub fn signal_strength(&mut self) -> Result<Option<i32>> {
        Ok(parse_signal_strength(&self.query("AT+CSQ")?))
    }

    /// Local IP address (`AT+CIFSR`), trimmed
    pub fn ip_address(&mut self) -> Result<String> {
        Ok(self.query("AT+CIFSR")?.trim().to_string())
    }

    /// SIM ICCID (`AT+ICCID`)
    pub fn query_iccid(&mut self) -> Result<Option<String>> {
        Ok(parse_iccid(&self.query("AT+ICCID")?))
    }

    /// ICCID captured during configuration
    pub fn iccid(&self) -> Option<&str> {
        self.configurator.iccid()
    }

    /// Local IP captured during configuration
    pub fn local_ip(&self) -> Option<&str> {
        self.configurator.local_ip()
    }

    /// Session status
    pub fn status(&self) -> SessionStatus {
        self.session.status()
    }

    /// Whether configuration completed
    pub fn is_configured(&self) -> bool {
        self.configurator.is_completed()
    }

    /// Whether the TCP session is up
    pub fn is_connected(&self) -> bool {
        self.session.is_connected()
    }

    /// Whether the WebSocket upgrade finished and the socket is up
    pub fn is_websocket_connected(&self) -> bool {
        self.websocket.is_open()
    }

    /// Active configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Step the configuration machine is on
    pub fn current_step(&self) -> Option<ConfigStep> {
        self.configurator.current_step()
    }

    /// Snapshot of counters and flags
    pub fn statistics(&self) -> Statistics {
        Statistics {
            status: self.session.status(),
            configured: self.is_configured(),
            connected: self.is_connected(),
            websocket_enabled: self.config.websocket,
            websocket_connected: self.websocket.is_connected(),
            uptime: self.clock.since(self.started_at),
            messages_sent: self.messages_sent,
            messages_received: self.messages_received,
            retries: self.configurator.counters().global_retries,
        }
    }

    /// Install the callback receiving decoded text
    pub fn on_data<F>(&mut self, callback: F)
    where
        F: FnMut(&str) + 'static,
    {
        self.events.set_data(Box::new(callback));
    }

    /// Install the callback receiving status changes
    pub fn on_status<F>(&mut self, callback: F)
    where
        F: FnMut(SessionStatus) + 'static,
    {
        self.events.set_status(Box::new(callback));
    }

    /// Install the callback receiving log lines
    pub fn on_log<F>(&mut self, callback: F)
    where
        F: FnMut(&str) + 'static,
    {
        self.events.set_log(Box::new(callback));
    }
}

impl<T: Transport, C: Clock> fmt::Debug for ModemClient<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModemClient")
            .field("server", &self.config.host())
            .field("status", &self.session.status())
            .field("step", &self.configurator.current_step())
            .field("websocket", &self.websocket.state())
            .field("events", &self.events)
            .finish_non_exhaustive()
    }
}

/// Client counters and flags
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Statistics {
    /// Session status
    pub status: SessionStatus,
    /// Configuration completed
    pub configured: bool,
    /// TCP session up
    pub connected: bool,
    /// WebSocket layer enabled
    pub websocket_enabled: bool,
    /// WebSocket marked connected
    pub websocket_connected: bool,
    /// Time since the client was created
    pub uptime: Duration,
    /// Successful `send_data`/`send_binary_data` calls
    pub messages_sent: u64,
    /// Messages delivered to the data callback
    pub messages_received: u64,
    /// Full configuration restarts since the last success
    pub retries: u32,
}

impl fmt::Display for Statistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn yes_no(value: bool) -> &'static str {
            if value {
                "yes"
            } else {
                "no"
            }
        }

        writeln!(f, "========== Statistics ==========")?;
        writeln!(f, "Status: {}", self.status)?;
        writeln!(f, "Configured: {}", yes_no(self.configured))?;
        writeln!(f, "Connected: {}", yes_no(self.connected))?;
        writeln!(
            f,
            "WebSocket mode: {}",
            if self.websocket_enabled { "enabled" } else { "disabled" }
        )?;
        if self.websocket_enabled {
            writeln!(f, "WebSocket connected: {}", yes_no(self.websocket_connected))?;
        }
        writeln!(f, "Uptime: {} s", self.uptime.as_secs())?;
        writeln!(f, "Messages sent: {}", self.messages_sent)?;
        writeln!(f, "Messages received: {}", self.messages_received)?;
        writeln!(f, "Retries: {}", self.retries)?;
        write!(f, "================================")
    }
}
