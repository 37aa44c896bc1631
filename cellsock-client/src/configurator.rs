//! Modem configuration state machine
//!
//! Walks the modem through [`ConfigStep::SEQUENCE`]. Every wait (command
//! timeout, inter-step spacing, retry and restart backoff, the delayed
//! `CONNECT` window, the overall budget) is a deadline checked on each call
//! to [`Configurator::poll`]; nothing here sleeps.
//!
//! Failure policy: a hard failure re-sends the same step after the retry
//! backoff. After `max_step_retries` failures of one step the whole sequence
//! restarts from `AT` and the global counter goes up; once that counter
//! reaches `max_global_retries` the machine stops in [`Phase::Failed`] until
//! it is reset.

use crate::command::{
    connect_signal, evaluate, parse_iccid, parse_ip, CommandExecutor, CommandPoll, ConfigStep,
    ConnectSignal, StepOutcome, Target,
};
use crate::config::ClientConfig;
use crate::events::EventSink;
use cellsock_core::error::{CommandError, Result, TimeoutError};
use cellsock_core::transport::Transport;
use std::time::Instant;

/// Where the machine is
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    /// Not started
    Idle,
    /// `step` goes out once `at` has passed
    Scheduled {
        /// Step to send
        step: ConfigStep,
        /// Earliest send time
        at: Instant,
    },
    /// Command for `step` in flight
    Awaiting {
        /// Step being executed
        step: ConfigStep,
    },
    /// `AT+CIPSTART` answered `OK`; waiting for `CONNECT`
    AwaitingConnect {
        /// Give up after this
        deadline: Instant,
        /// Everything received since the command
        response: String,
    },
    /// TCP session up
    Completed,
    /// Retries exhausted
    Failed,
}

/// Retry counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConfigCounters {
    /// Consecutive failures of the current step
    pub step_retries: u32,
    /// Full-sequence restarts caused by exhausted steps
    pub global_retries: u32,
}

/// What a poll did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// Not running, or waiting on a deadline
    Idle,
    /// Running; nothing decisive happened
    Working,
    /// A command went out
    CommandSent(ConfigStep),
    /// Sequence restarted from the first step
    Restarted,
    /// Sequence finished; TCP session up
    Completed,
    /// Gave up
    Exhausted,
}

/// Configuration state machine
#[derive(Debug)]
pub struct Configurator {
    phase: Phase,
    counters: ConfigCounters,
    started_at: Option<Instant>,
    executor: CommandExecutor,
    iccid: Option<String>,
    local_ip: Option<String>,
}

impl Default for Configurator {
    fn default() -> Self {
        Self::new()
    }
}

impl Configurator {
    /// Idle machine
    pub fn new() -> Self {
        Self {
            phase: Phase::Idle,
            counters: ConfigCounters::default(),
            started_at: None,
            executor: CommandExecutor::new(),
            iccid: None,
            local_ip: None,
        }
    }

    /// Start the full sequence; the first command goes out at `at`
    pub fn start(&mut self, at: Instant, now: Instant) {
        self.counters = ConfigCounters::default();
        self.schedule_from(ConfigStep::AtTest, at, now);
    }

    /// Re-enter the sequence at `step`, keeping the global counter
    pub fn resume_at(&mut self, step: ConfigStep, at: Instant, now: Instant) {
        self.counters.step_retries = 0;
        self.schedule_from(step, at, now);
    }

    /// Restart from the first step, keeping the global counter
    pub fn restart(&mut self, at: Instant, now: Instant) {
        self.resume_at(ConfigStep::AtTest, at, now);
    }

    /// Back to idle with cleared counters
    pub fn reset(&mut self) {
        self.executor.cancel();
        self.phase = Phase::Idle;
        self.counters = ConfigCounters::default();
        self.started_at = None;
    }

    fn schedule_from(&mut self, step: ConfigStep, at: Instant, now: Instant) {
        self.executor.cancel();
        self.started_at = Some(now);
        self.phase = Phase::Scheduled { step, at };
    }

    /// Current phase
    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    /// Retry counters
    pub fn counters(&self) -> ConfigCounters {
        self.counters
    }

    /// Step being worked on, if running
    pub fn current_step(&self) -> Option<ConfigStep> {
        match self.phase {
            Phase::Scheduled { step, .. } | Phase::Awaiting { step } => Some(step),
            Phase::AwaitingConnect { .. } => Some(ConfigStep::ConnectTcp),
            Phase::Completed => Some(ConfigStep::Completed),
            Phase::Idle | Phase::Failed => None,
        }
    }

    /// Whether a sequence is in progress
    pub fn is_running(&self) -> bool {
        matches!(
            self.phase,
            Phase::Scheduled { .. } | Phase::Awaiting { .. } | Phase::AwaitingConnect { .. }
        )
    }

    /// Whether the sequence finished
    pub fn is_completed(&self) -> bool {
        self.phase == Phase::Completed
    }

    /// Whether the machine gave up
    pub fn is_failed(&self) -> bool {
        self.phase == Phase::Failed
    }

    /// ICCID read during the last `AT+ICCID` step
    pub fn iccid(&self) -> Option<&str> {
        self.iccid.as_deref()
    }

    /// Local IP read during the last `AT+CIFSR` step
    pub fn local_ip(&self) -> Option<&str> {
        self.local_ip.as_deref()
    }

    /// Commands written so far
    pub fn commands_sent(&self) -> u64 {
        self.executor.sent()
    }

    /// Advance the machine as far as `now` allows
    pub fn poll<T: Transport + ?Sized>(
        &mut self,
        transport: &mut T,
        now: Instant,
        config: &ClientConfig,
        events: &mut EventSink,
    ) -> Progress {
        if let Some(started_at) = self.started_at.filter(|_| self.is_running()) {
            if now.saturating_duration_since(started_at) > config.timeouts.configuration {
                log_error!(
                    events,
                    "Configuration exceeded {:?}, restarting sequence",
                    config.timeouts.configuration
                );
                self.restart(now + config.delays.retry_backoff, now);
                return Progress::Restarted;
            }
        }

        match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Scheduled { step, at } if now < at => {
                self.phase = Phase::Scheduled { step, at };
                Progress::Idle
            }
            Phase::Scheduled { step, .. } => self.send_step(transport, step, now, config, events),
            Phase::Awaiting { step } => match self.executor.poll(transport, now) {
                Ok(CommandPoll::Complete(response)) => self.judge(step, response.trim(), now, config, events),
                Ok(CommandPoll::TimedOut(response)) => {
                    log_warn!(
                        events,
                        "[step {}] {}",
                        step.number(),
                        TimeoutError::Command {
                            timeout: config.timeouts.command
                        }
                    );
                    self.judge(step, response.trim(), now, config, events)
                }
                Ok(CommandPoll::Pending) => {
                    self.phase = Phase::Awaiting { step };
                    Progress::Working
                }
                Ok(CommandPoll::Idle) => {
                    self.phase = Phase::Scheduled { step, at: now };
                    Progress::Working
                }
                Err(e) => {
                    log_error!(events, "Transport read failed: {}", e);
                    self.phase = Phase::Awaiting { step };
                    Progress::Working
                }
            },
            Phase::AwaitingConnect { deadline, response } => {
                self.await_connect(transport, deadline, response, now, config, events)
            }
            phase @ (Phase::Idle | Phase::Completed | Phase::Failed) => {
                self.phase = phase;
                Progress::Idle
            }
        }
    }

    fn send_step<T: Transport + ?Sized>(
        &mut self,
        transport: &mut T,
        step: ConfigStep,
        now: Instant,
        config: &ClientConfig,
        events: &mut EventSink,
    ) -> Progress {
        let target = Target {
            addr: &config.server_addr,
            port: config.server_port,
            apn: &config.apn,
        };
        let Some(command) = step.command(&target) else {
            return self.complete(events);
        };

        log_info!(events, "[step {}] {}", step.number(), step);
        log_info!(events, "[send] {}", command);
        match self
            .executor
            .send(transport, &command, config.timeouts.command, now)
        {
            Ok(()) => {
                self.phase = Phase::Awaiting { step };
                Progress::CommandSent(step)
            }
            Err(e) => {
                log_error!(events, "Failed to send `{}`: {}", command, e);
                self.fail(step, now, config, events)
            }
        }
    }

    fn judge(
        &mut self,
        step: ConfigStep,
        response: &str,
        now: Instant,
        config: &ClientConfig,
        events: &mut EventSink,
    ) -> Progress {
        log_info!(events, "[recv] {}", response);
        let outcome = evaluate(step, response);

        match (step, outcome) {
            (ConfigStep::AtTest, StepOutcome::HardFail) => {
                log_error!(events, "Modem did not answer AT; it may need a power cycle");
            }
            (ConfigStep::GetIccid, StepOutcome::Success) => {
                self.iccid = parse_iccid(response);
                log_info!(events, "SIM ICCID: {}", self.iccid.as_deref().unwrap_or(""));
            }
            (ConfigStep::GetIccid, StepOutcome::HardFail) => {
                log_error!(events, "Could not read the SIM card; check that it is inserted");
            }
            (ConfigStep::CheckGprsAttach, StepOutcome::Success) => {
                log_info!(events, "GPRS attached");
            }
            (ConfigStep::CheckGprsAttach, StepOutcome::HardFail) => {
                if response.contains("+CGATT: 0") {
                    log_error!(events, "GPRS not attached; weak signal or SIM problem");
                } else {
                    log_error!(events, "GPRS attach check failed");
                }
            }
            (ConfigStep::GetIp, StepOutcome::Success) => {
                self.local_ip = parse_ip(response);
                log_info!(events, "Local IP: {}", self.local_ip.as_deref().unwrap_or(""));
            }
            (_, StepOutcome::SoftFail) => {
                log_warn!(events, "Step {} ({}) failed, continuing", step.number(), step);
            }
            _ => {}
        }

        if step == ConfigStep::ConnectTcp {
            if outcome != StepOutcome::Success {
                log_error!(events, "{}", CommandError::ConnectFailed(response.to_owned()));
                return self.fail(step, now, config, events);
            }
            if connect_signal(response) == ConnectSignal::Connected {
                log_info!(events, "TCP connection established (OK and CONNECT)");
                return self.complete(events);
            }
            log_info!(events, "Waiting up to {:?} for CONNECT", config.timeouts.connect);
            self.phase = Phase::AwaitingConnect {
                deadline: now + config.timeouts.connect,
                response: response.to_string(),
            };
            return Progress::Working;
        }

        if !outcome.advances() {
            return self.fail(step, now, config, events);
        }

        log_info!(events, "[ok] step {} ({})", step.number(), step);
        self.counters.step_retries = 0;
        match step.next() {
            ConfigStep::Completed => self.complete(events),
            next => {
                self.phase = Phase::Scheduled {
                    step: next,
                    at: now + config.delays.step_interval,
                };
                Progress::Working
            }
        }
    }

    fn await_connect<T: Transport + ?Sized>(
        &mut self,
        transport: &mut T,
        deadline: Instant,
        mut response: String,
        now: Instant,
        config: &ClientConfig,
        events: &mut EventSink,
    ) -> Progress {
        match read_chunk(transport) {
            Ok(Some(chunk)) => {
                log_info!(events, "TCP response: {}", chunk.trim());
                response.push_str(&chunk);
            }
            Ok(None) => {}
            Err(e) => log_error!(events, "Transport read failed: {}", e),
        }

        match connect_signal(&response) {
            ConnectSignal::Connected => {
                log_info!(events, "TCP connection established");
                self.complete(events)
            }
            ConnectSignal::Failed => {
                log_error!(events, "{}", CommandError::ConnectFailed(response.trim().to_owned()));
                self.fail(ConfigStep::ConnectTcp, now, config, events)
            }
            ConnectSignal::Pending if now >= deadline => {
                log_error!(
                    events,
                    "{}",
                    TimeoutError::Connect {
                        timeout: config.timeouts.connect
                    }
                );
                self.fail(ConfigStep::ConnectTcp, now, config, events)
            }
            ConnectSignal::Pending => {
                self.phase = Phase::AwaitingConnect { deadline, response };
                Progress::Working
            }
        }
    }

    fn complete(&mut self, events: &mut EventSink) -> Progress {
        log_info!(events, "Modem configuration complete");
        self.counters = ConfigCounters::default();
        self.phase = Phase::Completed;
        Progress::Completed
    }

    fn fail(
        &mut self,
        step: ConfigStep,
        now: Instant,
        config: &ClientConfig,
        events: &mut EventSink,
    ) -> Progress {
        self.counters.step_retries += 1;
        log_error!(
            events,
            "[failed] {}",
            CommandError::StepFailure {
                step: format!("{} ({})", step.number(), step),
                attempt: self.counters.step_retries,
            }
        );

        if self.counters.step_retries < config.max_step_retries {
            log_info!(
                events,
                "Retrying step {} (attempt {})",
                step.number(),
                self.counters.step_retries + 1
            );
            self.phase = Phase::Scheduled {
                step,
                at: now + config.delays.retry_backoff,
            };
            return Progress::Working;
        }

        log_error!(
            events,
            "Step {} failed {} times",
            step.number(),
            self.counters.step_retries
        );
        self.counters.global_retries += 1;

        if self.counters.global_retries >= config.max_global_retries {
            log_error!(
                events,
                "Configuration abandoned after {} cycles; check the SIM card, signal, APN and server reachability",
                self.counters.global_retries
            );
            self.executor.cancel();
            self.phase = Phase::Failed;
            return Progress::Exhausted;
        }

        log_info!(
            events,
            "Restarting configuration (cycle {})",
            self.counters.global_retries
        );
        let at = now + config.delays.restart_backoff + config.delays.retry_backoff;
        self.restart(at, now);
        Progress::Restarted
    }
}

fn read_chunk<T: Transport + ?Sized>(transport: &mut T) -> Result<Option<String>> {
    if transport.available()? == 0 {
        return Ok(None);
    }
    let chunk = transport.read_available()?;
    Ok((!chunk.is_empty()).then(|| String::from_utf8_lossy(&chunk).into_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cellsock_core::transport::mock::MockTransport;
    use std::time::Duration;

    fn config() -> ClientConfig {
        ClientConfig::new("203.0.113.7", 8080)
    }

    fn modem(written: &[u8]) -> Option<Vec<u8>> {
        let command = String::from_utf8_lossy(written);
        let reply = match command.trim_end() {
            "AT+ICCID" => "\r\n+ICCID: 89860412345678901234\r\n\r\nOK\r\n",
            "AT+CGATT?" => "\r\n+CGATT: 1\r\n\r\nOK\r\n",
            "AT+CIFSR" => "\r\n10.64.1.23\r\n",
            c if c.starts_with("AT+CIPSTART") => "\r\nOK\r\n\r\nCONNECT\r\n",
            _ => "\r\nOK\r\n",
        };
        Some(reply.as_bytes().to_vec())
    }

    /// Poll every 100 ms until `until` returns true or `limit` passes
    fn drive(
        machine: &mut Configurator,
        transport: &mut MockTransport,
        start: Instant,
        limit: Duration,
        until: impl Fn(Progress) -> bool,
    ) -> (Progress, Instant) {
        let config = config();
        let mut events = EventSink::new();
        let mut now = start;
        while now <= start + limit {
            let progress = machine.poll(transport, now, &config, &mut events);
            if until(progress) {
                return (progress, now);
            }
            now += Duration::from_millis(100);
        }
        (Progress::Idle, now)
    }

    #[test]
    fn test_happy_path_sends_nine_commands() {
        let handle = MockTransport::with_responder(modem);
        let mut transport = handle.clone();
        let start = Instant::now();
        let mut machine = Configurator::new();
        machine.start(start, start);

        let (progress, _) = drive(&mut machine, &mut transport, start, Duration::from_secs(60), |p| {
            p == Progress::Completed
        });

        assert_eq!(progress, Progress::Completed);
        assert_eq!(machine.commands_sent(), 9);
        assert_eq!(machine.counters(), ConfigCounters::default());
        assert_eq!(machine.iccid(), Some("89860412345678901234"));
        assert_eq!(machine.local_ip(), Some("10.64.1.23"));
        assert!(handle
            .written_text()
            .ends_with("AT+CIPSTART=\"TCP\",\"203.0.113.7\",8080\r\n"));
    }

    #[test]
    fn test_failed_step_is_retried_after_backoff() {
        let mut attach_attempts = 0;
        let handle = MockTransport::with_responder(move |written| {
            if written == b"AT+CGATT?\r\n" {
                attach_attempts += 1;
                if attach_attempts == 1 {
                    return Some(b"\r\n+CGATT: 0\r\n\r\nOK\r\n".to_vec());
                }
            }
            modem(written)
        });
        let mut transport = handle.clone();
        let start = Instant::now();
        let mut machine = Configurator::new();
        machine.start(start, start);

        drive(&mut machine, &mut transport, start, Duration::from_secs(60), |p| {
            p == Progress::Completed
        });

        assert_eq!(handle.written_text().matches("AT+CGATT?").count(), 2);
        assert_eq!(machine.commands_sent(), 10);
        assert!(machine.is_completed());
    }

    #[test]
    fn test_soft_steps_never_retry() {
        let handle = MockTransport::with_responder(|written| {
            let command = String::from_utf8_lossy(written);
            if command.starts_with("AT+CIPMODE")
                || command.starts_with("AT+CSTT")
                || command.starts_with("AT+CIICR")
                || command.starts_with("AT+CIFSR")
            {
                return Some(b"\r\nERROR\r\n".to_vec());
            }
            modem(written)
        });
        let mut transport = handle.clone();
        let start = Instant::now();
        let mut machine = Configurator::new();
        machine.start(start, start);

        let (progress, _) = drive(&mut machine, &mut transport, start, Duration::from_secs(60), |p| {
            p == Progress::Completed
        });

        assert_eq!(progress, Progress::Completed);
        assert_eq!(machine.commands_sent(), 9);
        assert_eq!(machine.local_ip(), None);
    }

    #[test]
    fn test_exhaustion_stops_after_three_cycles() {
        let handle = MockTransport::with_responder(|_| Some(b"\r\nERROR\r\n".to_vec()));
        let mut transport = handle.clone();
        let start = Instant::now();
        let mut machine = Configurator::new();
        machine.start(start, start);

        let (progress, at) = drive(&mut machine, &mut transport, start, Duration::from_secs(120), |p| {
            p == Progress::Exhausted
        });

        assert_eq!(progress, Progress::Exhausted);
        assert!(machine.is_failed());
        assert_eq!(handle.writes().len(), 9);
        assert!(handle.writes().iter().all(|w| &w[..] == b"AT\r\n"));
        assert_eq!(machine.counters().global_retries, 3);

        // nothing further happens on its own
        drive(&mut machine, &mut transport, at, Duration::from_secs(600), |_| false);
        assert_eq!(handle.writes().len(), 9);
    }

    #[test]
    fn test_delayed_connect_is_awaited() {
        let handle = MockTransport::with_responder(|written| {
            if written.starts_with(b"AT+CIPSTART") {
                return Some(b"\r\nOK\r\n".to_vec());
            }
            modem(written)
        });
        let mut transport = handle.clone();
        let start = Instant::now();
        let mut machine = Configurator::new();
        machine.resume_at(ConfigStep::ConnectTcp, start, start);

        let (_, sent_at) = drive(&mut machine, &mut transport, start, Duration::from_secs(5), |p| {
            p == Progress::CommandSent(ConfigStep::ConnectTcp)
        });
        let (_, awaiting_at) = drive(&mut machine, &mut transport, sent_at, Duration::from_secs(5), |_| {
            false
        });
        assert!(matches!(machine.phase(), Phase::AwaitingConnect { .. }));

        handle.push("\r\nCONNECT\r\n");
        let (progress, _) = drive(&mut machine, &mut transport, awaiting_at, Duration::from_secs(1), |p| {
            p == Progress::Completed
        });
        assert_eq!(progress, Progress::Completed);
    }

    #[test]
    fn test_missing_connect_counts_as_failure() {
        let handle = MockTransport::with_responder(|_| Some(b"\r\nOK\r\n".to_vec()));
        let mut transport = handle.clone();
        let start = Instant::now();
        let mut machine = Configurator::new();
        machine.resume_at(ConfigStep::ConnectTcp, start, start);

        // 2 s command wait is skipped by the OK; then 10 s for CONNECT
        drive(&mut machine, &mut transport, start, Duration::from_secs(11), |_| false);
        assert_eq!(machine.counters().step_retries, 1);
        assert!(matches!(
            machine.phase(),
            Phase::Scheduled { step: ConfigStep::ConnectTcp, .. }
        ));
    }

    #[test]
    fn test_budget_restarts_running_sequence() {
        let handle = MockTransport::new();
        let mut transport = handle.clone();
        let start = Instant::now();
        let mut machine = Configurator::new();
        machine.start(start + Duration::from_secs(400), start);

        let mut events = EventSink::new();
        let progress = machine.poll(
            &mut transport,
            start + Duration::from_secs(301),
            &config(),
            &mut events,
        );
        assert_eq!(progress, Progress::Restarted);
        assert!(matches!(
            machine.phase(),
            Phase::Scheduled { step: ConfigStep::AtTest, .. }
        ));
        assert!(handle.written().is_empty());
    }
}
