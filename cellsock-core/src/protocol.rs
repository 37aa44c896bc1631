//! WebSocket protocol constants and utilities
//!
//! Opcodes, frame header bits and the handful of constants the modem client
//! depends on (buffer limits, default timeouts, recognised frame markers).

/// WebSocket opcodes as defined in RFC 6455 Section 5.2
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    /// Continuation frame
    Continuation = 0x0,
    /// Text frame
    Text = 0x1,
    /// Binary frame
    Binary = 0x2,
    /// Reserved for future use
    Reserved3 = 0x3,
    /// Reserved for future use
    Reserved4 = 0x4,
    /// Reserved for future use
    Reserved5 = 0x5,
    /// Reserved for future use
    Reserved6 = 0x6,
    /// Reserved for future use
    Reserved7 = 0x7,
    /// Close frame
    Close = 0x8,
    /// Ping frame
    Ping = 0x9,
    /// Pong frame
    Pong = 0xA,
    /// Reserved for future use
    ReservedB = 0xB,
    /// Reserved for future use
    ReservedC = 0xC,
    /// Reserved for future use
    ReservedD = 0xD,
    /// Reserved for future use
    ReservedE = 0xE,
    /// Reserved for future use
    ReservedF = 0xF,
}

impl Opcode {
    /// Map the low nibble of a frame's first byte to an opcode.
    ///
    /// Every 4-bit value has a variant, so this never fails; upper bits are ignored.
    pub fn from_bits(value: u8) -> Self {
        match value & frame::OPCODE_MASK {
            0x0 => Opcode::Continuation,
            0x1 => Opcode::Text,
            0x2 => Opcode::Binary,
            0x3 => Opcode::Reserved3,
            0x4 => Opcode::Reserved4,
            0x5 => Opcode::Reserved5,
            0x6 => Opcode::Reserved6,
            0x7 => Opcode::Reserved7,
            0x8 => Opcode::Close,
            0x9 => Opcode::Ping,
            0xA => Opcode::Pong,
            0xB => Opcode::ReservedB,
            0xC => Opcode::ReservedC,
            0xD => Opcode::ReservedD,
            0xE => Opcode::ReservedE,
            _ => Opcode::ReservedF,
        }
    }

    /// Get the numeric value of the opcode
    pub fn value(&self) -> u8 {
        *self as u8
    }

    /// Check if this is a control opcode
    pub fn is_control(&self) -> bool {
        matches!(self, Opcode::Close | Opcode::Ping | Opcode::Pong)
    }

    /// Check if this is a data opcode
    pub fn is_data(&self) -> bool {
        matches!(self, Opcode::Text | Opcode::Binary | Opcode::Continuation)
    }

    /// Check if this is a reserved opcode
    pub fn is_reserved(&self) -> bool {
        !(self.is_control() || self.is_data())
    }
}

/// Protocol constants
pub mod constants {
    use std::time::Duration;

    /// WebSocket protocol version
    pub const WEBSOCKET_VERSION: &str = "13";

    /// WebSocket magic string for accept calculation
    pub const WEBSOCKET_MAGIC: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

    /// WebSocket key length in raw bytes
    pub const WEBSOCKET_KEY_LEN: usize = 16;

    /// Receive buffer limit; a buffer past this without a decodable frame is dropped
    pub const DEFAULT_RECEIVE_BUFFER_LIMIT: usize = 1024;

    /// Largest payload an outgoing client frame may carry (7-bit length form only)
    pub const MAX_SHORT_PAYLOAD: usize = 125;

    /// Largest payload the codec can express without the 64-bit form
    pub const MAX_EXTENDED_PAYLOAD: usize = u16::MAX as usize;

    /// Default handshake timeout
    pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(30);

    /// First bytes that identify a frame during the handshake phase
    /// (FIN set with Text, Binary, Ping or Pong).
    pub const FRAME_MARKERS: [u8; 4] = [0x81, 0x82, 0x89, 0x8A];

    /// Mask historically hard-wired into paired custom servers
    pub const LEGACY_MASK: [u8; 4] = [0x81, 0x81, 0x81, 0x81];
}

/// Frame header bit positions and masks
pub mod frame {
    /// FIN bit position
    pub const FIN_BIT: u8 = 0x80;

    /// Opcode mask
    pub const OPCODE_MASK: u8 = 0x0F;

    /// MASK bit position
    pub const MASK_BIT: u8 = 0x80;

    /// Payload length mask for 7-bit length
    pub const PAYLOAD_LEN_MASK: u8 = 0x7F;

    /// Extended payload length (16-bit) marker
    pub const PAYLOAD_LEN_16: u8 = 126;

    /// Extended payload length (64-bit) marker
    pub const PAYLOAD_LEN_64: u8 = 127;

    /// Masking key length
    pub const MASKING_KEY_LEN: usize = 4;
}

/// HTTP pieces of the upgrade exchange
pub mod http {
    /// Status line prefix of a successful upgrade
    pub const SWITCHING_PROTOCOLS_LINE: &str = "HTTP/1.1 101";

    /// Header block terminator
    pub const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";

    /// Tokens in a handshake response that mean the upgrade failed
    pub const REJECTION_TOKENS: [&str; 4] = ["CLOSED", "ERROR", "400", "404"];

    /// Sec-WebSocket-Accept header (compared case-insensitively)
    pub const HEADER_SEC_WEBSOCKET_ACCEPT: &str = "sec-websocket-accept";
}

/// Position of `needle` in `haystack`, if present
pub(crate) fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|window| window == needle)
}

/// Whether `needle` occurs anywhere in `haystack`
pub(crate) fn contains(haystack: &[u8], needle: &str) -> bool {
    find(haystack, needle.as_bytes()).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_conversion() {
        assert_eq!(Opcode::from_bits(0x1), Opcode::Text);
        assert_eq!(Opcode::from_bits(0x81), Opcode::Text);
        assert_eq!(Opcode::from_bits(0x8A), Opcode::Pong);
        assert_eq!(Opcode::Text.value(), 0x1);
        assert!(Opcode::Ping.is_control());
        assert!(Opcode::Binary.is_data());
        assert!(Opcode::Reserved3.is_reserved());
        assert!(!Opcode::Close.is_reserved());
    }

    #[test]
    fn test_frame_markers_are_final_frames() {
        for marker in constants::FRAME_MARKERS {
            assert_eq!(marker & frame::FIN_BIT, frame::FIN_BIT);
            assert!(!Opcode::from_bits(marker).is_reserved());
        }
    }

    #[test]
    fn test_subslice_search() {
        assert_eq!(find(b"abc\r\n\r\nrest", http::HEADER_TERMINATOR), Some(3));
        assert_eq!(find(b"ab", b"abc"), None);
        assert!(contains(b"+CGATT: 1\r\nOK", "OK"));
        assert!(!contains(b"", "OK"));
    }
}
