//! AT commands: the configuration step table, response predicates and the
//! command executor.
//!
//! The executor never blocks. [`CommandExecutor::send`] writes a command and
//! records when it went out; [`CommandExecutor::poll`] collects whatever has
//! arrived since and reports completion once a terminal token shows up or
//! the timeout passes.

use cellsock_core::error::Result;
use cellsock_core::transport::Transport;
use std::fmt;
use std::time::{Duration, Instant};

/// Tokens that end a modem response
pub const TERMINAL_TOKENS: [&str; 4] = ["OK", "ERROR", "CONNECT", "FAIL"];

/// Line terminator appended to every command
pub const COMMAND_TERMINATOR: &str = "\r\n";

/// One step of the modem configuration sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConfigStep {
    /// `AT`
    AtTest,
    /// `ATE0`
    DisableEcho,
    /// `AT+ICCID`
    GetIccid,
    /// `AT+CGATT?`
    CheckGprsAttach,
    /// `AT+CIPMODE=1`
    SetTransparentMode,
    /// `AT+CSTT`
    SetApn,
    /// `AT+CIICR`
    ActivateGprs,
    /// `AT+CIFSR`
    GetIp,
    /// `AT+CIPSTART`
    ConnectTcp,
    /// Sequence finished
    Completed,
}

impl ConfigStep {
    /// All command-bearing steps, in order
    pub const SEQUENCE: [ConfigStep; 9] = [
        ConfigStep::AtTest,
        ConfigStep::DisableEcho,
        ConfigStep::GetIccid,
        ConfigStep::CheckGprsAttach,
        ConfigStep::SetTransparentMode,
        ConfigStep::SetApn,
        ConfigStep::ActivateGprs,
        ConfigStep::GetIp,
        ConfigStep::ConnectTcp,
    ];

    /// The step after this one
    pub fn next(self) -> ConfigStep {
        match self {
            ConfigStep::AtTest => ConfigStep::DisableEcho,
            ConfigStep::DisableEcho => ConfigStep::GetIccid,
            ConfigStep::GetIccid => ConfigStep::CheckGprsAttach,
            ConfigStep::CheckGprsAttach => ConfigStep::SetTransparentMode,
            ConfigStep::SetTransparentMode => ConfigStep::SetApn,
            ConfigStep::SetApn => ConfigStep::ActivateGprs,
            ConfigStep::ActivateGprs => ConfigStep::GetIp,
            ConfigStep::GetIp => ConfigStep::ConnectTcp,
            ConfigStep::ConnectTcp | ConfigStep::Completed => ConfigStep::Completed,
        }
    }

    /// 1-based position in the sequence
    pub fn number(self) -> usize {
        self as usize + 1
    }

    /// Whether failures of this step are ignored
    pub fn is_soft(self) -> bool {
        matches!(
            self,
            ConfigStep::SetTransparentMode
                | ConfigStep::SetApn
                | ConfigStep::ActivateGprs
                | ConfigStep::GetIp
        )
    }

    /// Human-readable description
    pub fn description(self) -> &'static str {
        match self {
            ConfigStep::AtTest => "test AT link",
            ConfigStep::DisableEcho => "disable echo",
            ConfigStep::GetIccid => "read SIM ICCID",
            ConfigStep::CheckGprsAttach => "check GPRS attach",
            ConfigStep::SetTransparentMode => "set transparent mode",
            ConfigStep::SetApn => "set APN",
            ConfigStep::ActivateGprs => "activate GPRS",
            ConfigStep::GetIp => "read local IP",
            ConfigStep::ConnectTcp => "open TCP connection",
            ConfigStep::Completed => "completed",
        }
    }

    /// Command line for this step, without terminator
    pub fn command(self, target: &Target<'_>) -> Option<String> {
        let command = match self {
            ConfigStep::AtTest => "AT".to_string(),
            ConfigStep::DisableEcho => "ATE0".to_string(),
            ConfigStep::GetIccid => "AT+ICCID".to_string(),
            ConfigStep::CheckGprsAttach => "AT+CGATT?".to_string(),
            ConfigStep::SetTransparentMode => "AT+CIPMODE=1".to_string(),
            ConfigStep::SetApn => format!("AT+CSTT=\"{}\",\"\",\"\"", target.apn),
            ConfigStep::ActivateGprs => "AT+CIICR".to_string(),
            ConfigStep::GetIp => "AT+CIFSR".to_string(),
            ConfigStep::ConnectTcp => {
                format!("AT+CIPSTART=\"TCP\",\"{}\",{}", target.addr, target.port)
            }
            ConfigStep::Completed => return None,
        };
        Some(command)
    }
}

impl fmt::Display for ConfigStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Connection parameters substituted into the step commands
#[derive(Debug, Clone, Copy)]
pub struct Target<'a> {
    /// Server address
    pub addr: &'a str,
    /// Server port
    pub port: u16,
    /// Access point name
    pub apn: &'a str,
}

/// How a step's response was judged
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Predicate satisfied
    Success,
    /// Predicate failed on a step whose failures are ignored
    SoftFail,
    /// Predicate failed; eligible for retry
    HardFail,
}

impl StepOutcome {
    /// Whether the sequence moves on
    pub fn advances(self) -> bool {
        !matches!(self, StepOutcome::HardFail)
    }
}

/// What a `AT+CIPSTART` response says about the connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectSignal {
    /// `CONNECT` without `CONNECT FAIL`
    Connected,
    /// `CONNECT FAIL` or `ERROR`
    Failed,
    /// Neither yet
    Pending,
}

/// Classify a connect response
pub fn connect_signal(response: &str) -> ConnectSignal {
    if response.contains("CONNECT") && !response.contains("CONNECT FAIL") {
        ConnectSignal::Connected
    } else if response.contains("CONNECT FAIL") || response.contains("ERROR") {
        ConnectSignal::Failed
    } else {
        ConnectSignal::Pending
    }
}

/// Judge a trimmed response for `step`.
///
/// `ConnectTcp` only checks for `OK` here; whether the connection is already
/// up is decided with [`connect_signal`].
pub fn evaluate(step: ConfigStep, response: &str) -> StepOutcome {
    let passed = match step {
        ConfigStep::AtTest => response.contains("OK"),
        ConfigStep::DisableEcho => response.contains("OK") || response.contains("NO CARRIER"),
        ConfigStep::GetIccid => response.contains("+ICCID:") && response.contains("OK"),
        ConfigStep::CheckGprsAttach => response.contains("+CGATT: 1") && response.contains("OK"),
        ConfigStep::SetTransparentMode | ConfigStep::SetApn | ConfigStep::ActivateGprs => {
            response.contains("OK")
        }
        ConfigStep::GetIp => parse_ip(response).is_some(),
        ConfigStep::ConnectTcp => response.contains("OK"),
        ConfigStep::Completed => true,
    };

    match (passed, step.is_soft()) {
        (true, _) => StepOutcome::Success,
        (false, true) => StepOutcome::SoftFail,
        (false, false) => StepOutcome::HardFail,
    }
}

/// Whether a response has reached one of the [`TERMINAL_TOKENS`]
pub fn is_terminal(response: &str) -> bool {
    TERMINAL_TOKENS.iter().any(|token| response.contains(token))
}

/// Extract the ICCID from an `AT+ICCID` response
pub fn parse_iccid(response: &str) -> Option<String> {
    let start = response.find("+ICCID: ")? + "+ICCID: ".len();
    let rest = &response[start..];
    let value = rest.lines().next().unwrap_or(rest).trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Extract the RSSI from an `AT+CSQ` response
pub fn parse_signal_strength(response: &str) -> Option<i32> {
    let start = response.find("+CSQ: ")? + "+CSQ: ".len();
    let rest = &response[start..];
    let end = rest.find(',')?;
    rest[..end].trim().parse().ok()
}

/// Extract the local IP from an `AT+CIFSR` response.
///
/// Accepted when the trimmed response is longer than 7 characters, holds a
/// dot and does not start with `ERROR`.
pub fn parse_ip(response: &str) -> Option<String> {
    let trimmed = response.trim();
    if trimmed.len() > 7 && trimmed.contains('.') && !trimmed.starts_with("ERROR") {
        let ip: String = trimmed.chars().filter(|c| *c != '\r' && *c != '\n').collect();
        Some(ip.trim().to_string())
    } else {
        None
    }
}

/// Result of polling the executor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandPoll {
    /// Nothing in flight
    Idle,
    /// Still collecting
    Pending,
    /// A terminal token arrived
    Complete(String),
    /// Timeout passed; whatever arrived is returned
    TimedOut(String),
}

#[derive(Debug)]
struct InFlight {
    command: String,
    sent_at: Instant,
    timeout: Duration,
    response: String,
}

/// Sends AT commands and collects their responses
#[derive(Debug, Default)]
pub struct CommandExecutor {
    in_flight: Option<InFlight>,
    sent: u64,
}

impl CommandExecutor {
    /// Executor with nothing in flight
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain stale input, then write `command` followed by CRLF
    pub fn send<T: Transport + ?Sized>(
        &mut self,
        transport: &mut T,
        command: &str,
        timeout: Duration,
        now: Instant,
    ) -> Result<()> {
        let stale = transport.drain()?;
        if stale > 0 {
            tracing::debug!(bytes = stale, "Discarded stale modem output");
        }

        let mut line = String::with_capacity(command.len() + COMMAND_TERMINATOR.len());
        line.push_str(command);
        line.push_str(COMMAND_TERMINATOR);
        transport.write_all(line.as_bytes())?;
        tracing::debug!(command, "AT command sent");

        self.sent += 1;
        self.in_flight = Some(InFlight {
            command: command.to_string(),
            sent_at: now,
            timeout,
            response: String::new(),
        });
        Ok(())
    }

    /// Collect arrived bytes for the command in flight
    pub fn poll<T: Transport + ?Sized>(&mut self, transport: &mut T, now: Instant) -> Result<CommandPoll> {
        let Some(in_flight) = self.in_flight.as_mut() else {
            return Ok(CommandPoll::Idle);
        };

        if transport.available()? > 0 {
            let chunk = transport.read_available()?;
            in_flight.response.push_str(&String::from_utf8_lossy(&chunk));
        }

        if is_terminal(&in_flight.response) {
            let response = std::mem::take(&mut in_flight.response);
            self.in_flight = None;
            return Ok(CommandPoll::Complete(response));
        }

        if now.saturating_duration_since(in_flight.sent_at) >= in_flight.timeout {
            tracing::debug!(command = %in_flight.command, "AT command timed out");
            let response = std::mem::take(&mut in_flight.response);
            self.in_flight = None;
            return Ok(CommandPoll::TimedOut(response));
        }

        Ok(CommandPoll::Pending)
    }

    /// Command currently awaiting its response
    pub fn in_flight(&self) -> Option<&str> {
        self.in_flight.as_ref().map(|in_flight| in_flight.command.as_str())
    }

    /// Forget the command in flight
    pub fn cancel(&mut self) {
        self.in_flight = None;
    }

    /// Commands written since creation
    pub fn sent(&self) -> u64 {
        self.sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cellsock_core::transport::mock::MockTransport;

    const TARGET: Target<'static> = Target {
        addr: "203.0.113.7",
        port: 8080,
        apn: "",
    };

    #[test]
    fn test_step_commands() {
        let commands: Vec<String> = ConfigStep::SEQUENCE
            .iter()
            .filter_map(|step| step.command(&TARGET))
            .collect();
        assert_eq!(
            commands,
            vec![
                "AT",
                "ATE0",
                "AT+ICCID",
                "AT+CGATT?",
                "AT+CIPMODE=1",
                "AT+CSTT=\"\",\"\",\"\"",
                "AT+CIICR",
                "AT+CIFSR",
                "AT+CIPSTART=\"TCP\",\"203.0.113.7\",8080",
            ]
        );
        assert_eq!(ConfigStep::Completed.command(&TARGET), None);

        let with_apn = Target { apn: "cmnet", ..TARGET };
        assert_eq!(
            ConfigStep::SetApn.command(&with_apn).as_deref(),
            Some("AT+CSTT=\"cmnet\",\"\",\"\"")
        );
    }

    #[test]
    fn test_sequence_order() {
        let mut step = ConfigStep::AtTest;
        for expected in ConfigStep::SEQUENCE.iter().skip(1) {
            step = step.next();
            assert_eq!(step, *expected);
        }
        assert_eq!(step.next(), ConfigStep::Completed);
        assert_eq!(ConfigStep::ConnectTcp.number(), 9);
    }

    #[test]
    fn test_predicates() {
        assert_eq!(evaluate(ConfigStep::AtTest, "OK"), StepOutcome::Success);
        assert_eq!(evaluate(ConfigStep::AtTest, ""), StepOutcome::HardFail);
        assert_eq!(evaluate(ConfigStep::DisableEcho, "NO CARRIER"), StepOutcome::Success);
        assert_eq!(
            evaluate(ConfigStep::GetIccid, "+ICCID: 8986\r\n\r\nOK"),
            StepOutcome::Success
        );
        assert_eq!(evaluate(ConfigStep::GetIccid, "OK"), StepOutcome::HardFail);
        assert_eq!(
            evaluate(ConfigStep::CheckGprsAttach, "+CGATT: 0\r\n\r\nOK"),
            StepOutcome::HardFail
        );
        assert_eq!(
            evaluate(ConfigStep::CheckGprsAttach, "+CGATT: 1\r\n\r\nOK"),
            StepOutcome::Success
        );
        assert_eq!(evaluate(ConfigStep::ActivateGprs, "ERROR"), StepOutcome::SoftFail);
        assert_eq!(evaluate(ConfigStep::GetIp, "ERROR"), StepOutcome::SoftFail);
        assert_eq!(evaluate(ConfigStep::GetIp, "10.64.1.23"), StepOutcome::Success);
        assert_eq!(evaluate(ConfigStep::ConnectTcp, "ERROR"), StepOutcome::HardFail);
        assert!(StepOutcome::SoftFail.advances());
    }

    #[test]
    fn test_connect_signal() {
        assert_eq!(connect_signal("OK\r\n\r\nCONNECT"), ConnectSignal::Connected);
        assert_eq!(connect_signal("OK\r\n\r\nCONNECT FAIL"), ConnectSignal::Failed);
        assert_eq!(connect_signal("ERROR"), ConnectSignal::Failed);
        assert_eq!(connect_signal("OK"), ConnectSignal::Pending);
    }

    #[test]
    fn test_response_parsers() {
        assert_eq!(
            parse_iccid("+ICCID: 89860412345678901234\r\n\r\nOK").as_deref(),
            Some("89860412345678901234")
        );
        assert_eq!(parse_iccid("+ICCID: 8986").as_deref(), Some("8986"));
        assert_eq!(parse_iccid("OK"), None);

        assert_eq!(parse_signal_strength("+CSQ: 23,99\r\n\r\nOK"), Some(23));
        assert_eq!(parse_signal_strength("+CSQ: 99"), None);
        assert_eq!(parse_signal_strength("ERROR"), None);

        assert_eq!(parse_ip("\r\n10.64.1.23\r\n").as_deref(), Some("10.64.1.23"));
        assert_eq!(parse_ip("1.2.3.4"), None);
        assert_eq!(parse_ip("ERROR: 1.2.3.4"), None);
    }

    #[test]
    fn test_executor_drains_then_collects() {
        let handle = MockTransport::new();
        let mut transport = handle.clone();
        let now = Instant::now();
        let mut executor = CommandExecutor::new();

        handle.push("stale CONNECT");
        executor
            .send(&mut transport, "AT", Duration::from_secs(2), now)
            .unwrap();
        assert_eq!(handle.written_text(), "AT\r\n");
        assert_eq!(executor.in_flight(), Some("AT"));
        assert_eq!(executor.poll(&mut transport, now).unwrap(), CommandPoll::Pending);

        handle.push("\r\nO");
        assert_eq!(executor.poll(&mut transport, now).unwrap(), CommandPoll::Pending);
        handle.push("K\r\n");
        assert_eq!(
            executor.poll(&mut transport, now).unwrap(),
            CommandPoll::Complete("\r\nOK\r\n".to_string())
        );
        assert_eq!(executor.poll(&mut transport, now).unwrap(), CommandPoll::Idle);
    }

    #[test]
    fn test_executor_times_out_with_partial_response() {
        let handle = MockTransport::new();
        let mut transport = handle.clone();
        let now = Instant::now();
        let mut executor = CommandExecutor::new();

        executor
            .send(&mut transport, "AT+CIFSR", Duration::from_secs(2), now)
            .unwrap();
        handle.push("\r\n10.0.0.2\r\n");
        assert_eq!(executor.poll(&mut transport, now).unwrap(), CommandPoll::Pending);
        assert_eq!(
            executor
                .poll(&mut transport, now + Duration::from_secs(2))
                .unwrap(),
            CommandPoll::TimedOut("\r\n10.0.0.2\r\n".to_string())
        );
        assert_eq!(executor.sent(), 1);
    }
}
