//! Serial transport implementation for CellSocket
//!
//! Wraps a `serialport` handle opened 8N1 without flow control. Reads never
//! block for longer than the port timeout; a timed-out read counts as "no
//! data yet".

use bytes::Bytes;
use cellsock_core::{transport::Transport, Error, Result};
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::fmt;
use std::io::{ErrorKind, Read, Write};
use std::time::Duration;

/// Read timeout used when none is given
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(10);

/// Largest single read
const READ_CHUNK: usize = 4096;

/// UART link to the modem
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
    path: String,
    baud_rate: u32,
}

impl SerialTransport {
    /// Open `path` at `baud_rate`, 8N1
    pub fn open(path: &str, baud_rate: u32) -> Result<Self> {
        Self::open_with_timeout(path, baud_rate, DEFAULT_READ_TIMEOUT)
    }

    /// Open with a custom read timeout
    pub fn open_with_timeout(path: &str, baud_rate: u32, timeout: Duration) -> Result<Self> {
        let port = serialport::new(path, baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(timeout)
            .open()
            .map_err(|e| Error::Io(e.into()))?;

        tracing::info!(path, baud_rate, "Opened serial port");

        Ok(Self {
            port,
            path: path.to_string(),
            baud_rate,
        })
    }

    /// Device path
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Configured speed
    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    /// Change the read timeout
    pub fn set_timeout(&mut self, timeout: Duration) -> Result<()> {
        self.port
            .set_timeout(timeout)
            .map_err(|e| Error::Io(e.into()))
    }
}

impl Transport for SerialTransport {
    fn write(&mut self, data: &[u8]) -> Result<usize> {
        Ok(self.port.write(data)?)
    }

    fn available(&mut self) -> Result<usize> {
        let pending = self
            .port
            .bytes_to_read()
            .map_err(|e| Error::Io(e.into()))?;
        Ok(pending as usize)
    }

    fn read_available(&mut self) -> Result<Bytes> {
        let pending = self.available()?;
        if pending == 0 {
            return Ok(Bytes::new());
        }

        let mut buf = vec![0u8; pending.min(READ_CHUNK)];
        match self.port.read(&mut buf) {
            Ok(n) => {
                buf.truncate(n);
                Ok(Bytes::from(buf))
            }
            Err(e) if e.kind() == ErrorKind::TimedOut => Ok(Bytes::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn flush(&mut self) -> Result<()> {
        self.port.flush()?;
        Ok(())
    }
}

impl fmt::Debug for SerialTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerialTransport")
            .field("path", &self.path)
            .field("baud_rate", &self.baud_rate)
            .finish()
    }
}

/// Names of the serial ports present on this machine
pub fn available_ports() -> Result<Vec<String>> {
    let ports = serialport::available_ports().map_err(|e| Error::Io(e.into()))?;
    Ok(ports.into_iter().map(|port| port.port_name).collect())
}
