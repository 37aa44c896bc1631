//! WebSocket handshake implementation
//!
//! Client side of the RFC 6455 upgrade, written for a byte stream that may
//! also carry modem status text. The response is not parsed strictly: it is
//! classified by the tokens it contains, in a fixed priority order, because
//! the modem can swallow or interleave parts of the HTTP exchange.

use crate::protocol::constants::*;
use crate::protocol::http::*;
use crate::protocol::{contains, find};
use base64::{engine::general_purpose, Engine as _};
use rand::RngCore;
use sha1::{Digest, Sha1};

/// Generate a random WebSocket key (16 random bytes, base64)
pub fn generate_key() -> String {
    let mut key_bytes = [0u8; WEBSOCKET_KEY_LEN];
    rand::thread_rng().fill_bytes(&mut key_bytes);
    general_purpose::STANDARD.encode(key_bytes)
}

/// Compute WebSocket accept key from client key
pub fn compute_accept_key(client_key: &str) -> String {
    let combined = format!("{}{}", client_key, WEBSOCKET_MAGIC);
    let hash = Sha1::digest(combined.as_bytes());
    general_purpose::STANDARD.encode(hash)
}

/// Validate WebSocket key format
pub fn validate_key(key: &str) -> bool {
    key.len() == 24
        && general_purpose::STANDARD
            .decode(key)
            .map(|raw| raw.len() == WEBSOCKET_KEY_LEN)
            .unwrap_or(false)
}

/// WebSocket upgrade request sent once the TCP session is up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeRequest {
    /// Request path
    pub path: String,
    /// Host header value (`addr:port`)
    pub host: String,
    /// Sec-WebSocket-Key value
    pub key: String,
}

impl HandshakeRequest {
    /// Create a request for `/` on `host` with a fresh key
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            path: "/".to_string(),
            host: host.into(),
            key: generate_key(),
        }
    }

    /// Use a different request path
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Use a caller-provided key
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    /// Render the request as it goes on the wire
    pub fn to_http(&self) -> String {
        format!(
            "GET {} HTTP/1.1\r\n\
             Host: {}\r\n\
             Upgrade: websocket\r\n\
             Connection: Upgrade\r\n\
             Sec-WebSocket-Key: {}\r\n\
             Sec-WebSocket-Version: {}\r\n\
             \r\n",
            self.path, self.host, self.key, WEBSOCKET_VERSION
        )
    }

    /// Accept value a conforming server answers with
    pub fn expected_accept(&self) -> String {
        compute_accept_key(&self.key)
    }
}

/// Result of inspecting the buffered handshake response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeStatus {
    /// Nothing conclusive yet
    Pending,
    /// `HTTP/1.1 101` seen. `header_len` is the length of the header block
    /// including its terminator, when the terminator has arrived.
    Accepted {
        /// Bytes belonging to the HTTP response
        header_len: Option<usize>,
    },
    /// Buffer starts with a frame marker: the 101 was missed, the session is live
    FrameObserved,
    /// A failure token was found
    Rejected {
        /// The token that matched
        token: &'static str,
    },
    /// Buffer outgrew the limit without resolving
    Overflow {
        /// Buffered size when the overflow was detected
        size: usize,
    },
}

/// Classify the buffered handshake response.
///
/// Priority: 101 status, leading frame marker, failure tokens, overflow.
pub fn classify_response(buffer: &[u8], limit: usize) -> HandshakeStatus {
    if let Some(status_at) = find(buffer, SWITCHING_PROTOCOLS_LINE.as_bytes()) {
        let header_len = find(&buffer[status_at..], HEADER_TERMINATOR)
            .map(|end| status_at + end + HEADER_TERMINATOR.len());
        return HandshakeStatus::Accepted { header_len };
    }

    if buffer
        .first()
        .map_or(false, |first| FRAME_MARKERS.contains(first))
    {
        return HandshakeStatus::FrameObserved;
    }

    if let Some(token) = REJECTION_TOKENS
        .iter()
        .copied()
        .find(|token| contains(buffer, token))
    {
        return HandshakeStatus::Rejected { token };
    }

    if buffer.len() > limit {
        return HandshakeStatus::Overflow { size: buffer.len() };
    }

    HandshakeStatus::Pending
}

/// Check the `Sec-WebSocket-Accept` header of a complete response block.
///
/// Returns `None` when the block cannot be parsed or carries no accept
/// header, otherwise whether it matches the request key.
pub fn verify_accept(response: &[u8], request: &HandshakeRequest) -> Option<bool> {
    let start = find(response, SWITCHING_PROTOCOLS_LINE.as_bytes())?;
    let mut headers = [httparse::EMPTY_HEADER; 32];
    let mut parsed = httparse::Response::new(&mut headers);
    match parsed.parse(&response[start..]) {
        Ok(httparse::Status::Complete(_)) => {}
        _ => return None,
    }

    let expected = request.expected_accept();
    parsed
        .headers
        .iter()
        .find(|header| header.name.eq_ignore_ascii_case(HEADER_SEC_WEBSOCKET_ACCEPT))
        .map(|header| header.value == expected.as_bytes())
}
