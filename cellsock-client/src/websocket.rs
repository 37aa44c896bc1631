//! WebSocket session over the modem's transparent TCP link
//!
//! Owns the upgrade state and the receive buffer. The same buffer first
//! collects the HTTP response and, once the upgrade is accepted, keeps
//! whatever followed the header block as the start of the frame stream.

use cellsock_core::error::{Error, HandshakeError, Result};
use cellsock_core::frame::{Frame, FrameParser, MaskMode};
use cellsock_core::handshake::{classify_response, verify_accept, HandshakeRequest, HandshakeStatus};
use cellsock_core::protocol::constants::MAX_SHORT_PAYLOAD;
use bytes::Bytes;
use std::time::{Duration, Instant};

/// Upgrade progress
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeState {
    /// No TCP session to upgrade
    Idle,
    /// TCP session just came up; the request goes out at `until`
    Settling {
        /// When to send the request
        until: Instant,
    },
    /// Request sent
    Awaiting {
        /// Request on the wire
        request: HandshakeRequest,
        /// When it was sent
        started_at: Instant,
    },
    /// Upgrade done; frames flow
    Complete,
}

/// Outcome of feeding handshake bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeEvent {
    /// Still waiting
    Pending,
    /// 101 and its header block received; `residue` bytes of frame data
    /// followed the header block
    Accepted {
        /// Frame bytes already buffered
        residue: usize,
        /// Accept header check, when the header was present
        accept_valid: Option<bool>,
    },
    /// A frame arrived before any 101; the upgrade is assumed done
    FrameObserved,
    /// Failure token in the response, or the response outgrew the buffer
    /// (buffer cleared)
    Failed(HandshakeError),
}

/// Upgrade state plus receive buffer
#[derive(Debug)]
pub struct WebSocketSession {
    state: HandshakeState,
    connected: bool,
    parser: FrameParser,
    mask: MaskMode,
    path: String,
}

impl WebSocketSession {
    /// Session with the given buffer limit, mask policy and request path
    pub fn new(receive_buffer_limit: usize, mask: MaskMode, path: impl Into<String>) -> Self {
        Self {
            state: HandshakeState::Idle,
            connected: false,
            parser: FrameParser::with_limit(receive_buffer_limit),
            mask,
            path: path.into(),
        }
    }

    /// Upgrade progress
    pub fn state(&self) -> &HandshakeState {
        &self.state
    }

    /// Whether the upgrade finished
    pub fn handshake_complete(&self) -> bool {
        self.state == HandshakeState::Complete
    }

    /// Whether the WebSocket is marked connected
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Upgrade finished and still connected
    pub fn is_open(&self) -> bool {
        self.connected && self.handshake_complete()
    }

    /// Bytes waiting in the receive buffer
    pub fn buffered(&self) -> usize {
        self.parser.buffered_bytes()
    }

    /// Schedule the upgrade request for `until`
    pub fn schedule(&mut self, until: Instant) {
        self.clear();
        self.state = HandshakeState::Settling { until };
    }

    /// Whether a scheduled request is due
    pub fn request_due(&self, now: Instant) -> bool {
        matches!(self.state, HandshakeState::Settling { until } if now >= until)
    }

    /// Build a fresh request for `host` and start waiting for the answer
    pub fn begin_handshake(&mut self, host: &str, now: Instant) -> HandshakeRequest {
        let request = HandshakeRequest::new(host).with_path(self.path.clone());
        self.parser.clear();
        self.connected = false;
        self.state = HandshakeState::Awaiting {
            request: request.clone(),
            started_at: now,
        };
        request
    }

    /// Whether the request has gone unanswered for longer than `timeout`
    pub fn handshake_expired(&self, now: Instant, timeout: Duration) -> bool {
        matches!(
            &self.state,
            HandshakeState::Awaiting { started_at, .. }
                if now.saturating_duration_since(*started_at) > timeout
        )
    }

    /// Append response bytes and classify the buffered response.
    ///
    /// A 101 whose header block has not ended yet stays buffered until the
    /// terminator arrives or the buffer limit is passed.
    pub fn feed_handshake(&mut self, data: &[u8]) -> HandshakeEvent {
        self.parser.extend(data);
        let limit = self.parser.limit();

        match classify_response(self.parser.buffered(), limit) {
            HandshakeStatus::Accepted { header_len: None } if self.buffered() <= limit => {
                HandshakeEvent::Pending
            }
            HandshakeStatus::Accepted { header_len } => {
                let accept_valid = match (&self.state, header_len) {
                    (HandshakeState::Awaiting { request, .. }, Some(len)) => {
                        verify_accept(&self.parser.buffered()[..len], request)
                    }
                    _ => None,
                };
                match header_len {
                    Some(len) => self.parser.consume(len),
                    None => self.parser.clear(),
                }
                self.mark_open();
                HandshakeEvent::Accepted {
                    residue: self.parser.buffered_bytes(),
                    accept_valid,
                }
            }
            HandshakeStatus::FrameObserved => {
                self.mark_open();
                HandshakeEvent::FrameObserved
            }
            HandshakeStatus::Rejected { token } => {
                self.connected = false;
                HandshakeEvent::Failed(HandshakeError::Rejected(token.to_owned()))
            }
            HandshakeStatus::Overflow { size } => {
                self.parser.clear();
                HandshakeEvent::Failed(HandshakeError::Overflow { size })
            }
            HandshakeStatus::Pending => HandshakeEvent::Pending,
        }
    }

    fn mark_open(&mut self) {
        self.state = HandshakeState::Complete;
        self.connected = true;
    }

    /// Append frame bytes and decode what is complete
    pub fn feed_frames(&mut self, data: &[u8]) -> Vec<Result<Frame>> {
        self.parser.feed(data)
    }

    /// Decode frames already in the buffer
    pub fn process_buffer(&mut self) -> Vec<Result<Frame>> {
        if self.parser.buffered_bytes() == 0 {
            return Vec::new();
        }
        self.parser.extract_frames()
    }

    /// Mark the WebSocket closed by the peer; the upgrade state is kept
    pub fn mark_closed(&mut self) {
        self.connected = false;
    }

    /// Forget everything: no upgrade, empty buffer
    pub fn clear(&mut self) {
        self.state = HandshakeState::Idle;
        self.connected = false;
        self.parser.clear();
    }

    /// Encode a masked text frame; payloads must be shorter than 126 bytes
    pub fn text_frame(&self, text: &str) -> Result<Bytes> {
        self.short_frame(Frame::text(text.to_owned()))
    }

    /// Encode a masked binary frame; payloads must be shorter than 126 bytes
    pub fn binary_frame(&self, data: &[u8]) -> Result<Bytes> {
        self.short_frame(Frame::binary(data.to_vec()))
    }

    /// Encode a masked empty ping
    pub fn ping_frame(&self) -> Result<Bytes> {
        Frame::ping().masked(&self.mask).to_bytes()
    }

    /// Encode a masked empty pong
    pub fn pong_frame(&self) -> Result<Bytes> {
        Frame::pong().masked(&self.mask).to_bytes()
    }

    fn short_frame(&self, frame: Frame) -> Result<Bytes> {
        let len = frame.payload_len();
        if len > MAX_SHORT_PAYLOAD {
            return Err(Error::PayloadTooLong {
                len,
                max: MAX_SHORT_PAYLOAD,
            });
        }
        frame.masked(&self.mask).to_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;
    use cellsock_core::protocol::Opcode;

    fn session() -> WebSocketSession {
        WebSocketSession::new(1024, MaskMode::LEGACY, "/")
    }

    #[test]
    fn test_request_is_scheduled_then_sent() {
        let now = Instant::now();
        let mut ws = session();
        ws.schedule(now + Duration::from_secs(1));
        assert!(!ws.request_due(now));
        assert!(ws.request_due(now + Duration::from_secs(1)));

        let request = ws.begin_handshake("10.0.0.1:80", now);
        assert!(request.to_http().contains("Host: 10.0.0.1:80\r\n"));
        assert!(!ws.handshake_expired(now + Duration::from_secs(30), Duration::from_secs(30)));
        assert!(ws.handshake_expired(now + Duration::from_secs(31), Duration::from_secs(30)));
    }

    #[test]
    fn test_accept_keeps_residue() {
        let now = Instant::now();
        let mut ws = session();
        let request = ws.begin_handshake("h:1", now);

        let mut response = format!(
            "HTTP/1.1 101 Switching Protocols\r\nSec-WebSocket-Accept: {}\r\n\r\n",
            request.expected_accept()
        )
        .into_bytes();
        response.extend_from_slice(&[0x81, 0x02, b'h', b'i']);

        assert_eq!(
            ws.feed_handshake(&response),
            HandshakeEvent::Accepted {
                residue: 4,
                accept_valid: Some(true)
            }
        );
        assert!(ws.is_open());

        let frames = ws.process_buffer();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].as_ref().unwrap().text_lossy(), "hi");
        assert_eq!(ws.buffered(), 0);
    }

    #[test]
    fn test_split_response_and_rejection() {
        let now = Instant::now();
        let mut ws = session();
        ws.begin_handshake("h:1", now);

        assert_eq!(ws.feed_handshake(b"HTTP/1.1 4"), HandshakeEvent::Pending);
        assert_eq!(
            ws.feed_handshake(b"04 Not Found\r\n"),
            HandshakeEvent::Failed(HandshakeError::Rejected("404".into()))
        );
        assert!(!ws.is_connected());
        assert!(!ws.handshake_complete());
    }

    #[test]
    fn test_header_split_across_chunks() {
        let now = Instant::now();
        let mut ws = session();
        let request = ws.begin_handshake("h:1", now);

        let head = format!(
            "HTTP/1.1 101 Switching Protocols\r\nSec-WebSocket-Accept: {}\r\n",
            request.expected_accept()
        );
        assert_eq!(ws.feed_handshake(head.as_bytes()), HandshakeEvent::Pending);
        assert!(!ws.handshake_complete());

        let mut tail = b"Upgrade: websocket\r\n\r\n".to_vec();
        tail.extend_from_slice(&[0x81, 0x02, b'o', b'k']);
        assert_eq!(
            ws.feed_handshake(&tail),
            HandshakeEvent::Accepted {
                residue: 4,
                accept_valid: Some(true)
            }
        );

        let frames = ws.process_buffer();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].as_ref().unwrap().text_lossy(), "ok");
    }

    #[test]
    fn test_unterminated_header_gives_up_at_limit() {
        let mut ws = WebSocketSession::new(64, MaskMode::LEGACY, "/");
        ws.begin_handshake("h:1", Instant::now());

        assert_eq!(
            ws.feed_handshake(b"HTTP/1.1 101 Switching Protocols\r\n"),
            HandshakeEvent::Pending
        );
        let event = ws.feed_handshake(format!("X-Pad: {}\r\n", "p".repeat(40)).as_bytes());
        assert_eq!(
            event,
            HandshakeEvent::Accepted {
                residue: 0,
                accept_valid: None
            }
        );
        assert!(ws.is_open());
    }

    #[test]
    fn test_overflow_clears_buffer() {
        let mut ws = session();
        ws.begin_handshake("h:1", Instant::now());

        let junk = format!("HTTP/1.1 200 {}", "x".repeat(1100));
        assert_eq!(
            ws.feed_handshake(junk.as_bytes()),
            HandshakeEvent::Failed(HandshakeError::Overflow { size: junk.len() })
        );
        assert_eq!(ws.buffered(), 0);
        assert!(!ws.handshake_complete());
    }

    #[test]
    fn test_frame_before_response() {
        let mut ws = session();
        ws.begin_handshake("h:1", Instant::now());
        assert_eq!(ws.feed_handshake(&[0x81, 0x01, b'x']), HandshakeEvent::FrameObserved);
        assert_eq!(ws.buffered(), 3);
        assert!(ws.is_open());
    }

    #[test]
    fn test_outgoing_frames() {
        let ws = session();
        assert_eq!(
            &ws.ping_frame().unwrap()[..],
            &[0x89, 0x80, 0x81, 0x81, 0x81, 0x81]
        );
        assert_eq!(
            &ws.pong_frame().unwrap()[..],
            &[0x8A, 0x80, 0x81, 0x81, 0x81, 0x81]
        );

        let wire = ws.text_frame("abc").unwrap();
        let decoded = Frame::parse(&mut BytesMut::from(&wire[..])).unwrap();
        assert_eq!(decoded.opcode, Opcode::Text);
        assert_eq!(decoded.text_lossy(), "abc");

        assert!(ws.text_frame(&"x".repeat(125)).is_ok());
        assert!(matches!(
            ws.text_frame(&"x".repeat(126)),
            Err(Error::PayloadTooLong { len: 126, max: 125 })
        ));
        assert!(ws.binary_frame(&[0u8; 200]).is_err());
    }
}
