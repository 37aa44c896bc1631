//! Classification of incoming byte runs
//!
//! The serial stream carries both modem status text and raw socket bytes with
//! nothing tagging which is which. Each newly arrived chunk is routed either
//! to the frame decoder or treated as a link-loss notice. The rules are a
//! heuristic: a frame payload can look like status text and vice versa, so
//! the order of the checks below is what keeps the behaviour predictable.

use crate::protocol::contains;

/// Exact status lines that mean the TCP session is gone
pub const LOSS_TOKENS: [&str; 3] = ["CLOSED", "NO CARRIER", "DISCONNECT"];

/// Chunks at least this long are never matched as an exact loss token
pub const MAX_LOSS_CHUNK_LEN: usize = 15;

/// Where the WebSocket session stands when a chunk arrives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamPhase {
    /// Upgrade request sent, no answer accepted yet
    Handshake,
    /// Handshake finished
    Established {
        /// WebSocket still marked connected
        websocket_connected: bool,
    },
}

/// Why a chunk was read as link loss
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkLoss {
    /// A short chunk that is exactly one of [`LOSS_TOKENS`]
    ExactToken(&'static str),
    /// Modem reported an error on the connection
    ConnectError,
    /// Carrier dropped
    NoCarrier,
    /// Modem reported a disconnect
    Disconnect,
}

impl std::fmt::Display for LinkLoss {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LinkLoss::ExactToken(token) => write!(f, "{}", token),
            LinkLoss::ConnectError => write!(f, "ERROR CONNECT"),
            LinkLoss::NoCarrier => write!(f, "NO CARRIER"),
            LinkLoss::Disconnect => write!(f, "DISCONNECT"),
        }
    }
}

/// Routing decision for one chunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Hand the bytes to the frame decoder
    Frames,
    /// Tear the session down
    LinkLoss(LinkLoss),
}

/// Route a just-arrived chunk.
///
/// 1. A first byte in `0x80..=0x8F` is always frame data.
/// 2. Before the handshake finishes, a trimmed chunk that is exactly a loss
///    token (and shorter than [`MAX_LOSS_CHUNK_LEN`]) is link loss.
/// 3. Any other chunk during the handshake is frame data, so an upgrade
///    response that carries its first frame is never mistaken for loss.
/// 4. Once established with the WebSocket connected, everything is frame data.
/// 5. Once established with the WebSocket down, `ERROR` together with
///    `CONNECT`, `NO CARRIER` or `DISCONNECT` anywhere in the chunk is link
///    loss; anything else is frame data.
pub fn classify(chunk: &[u8], phase: StreamPhase) -> Route {
    if matches!(chunk.first(), Some(0x80..=0x8F)) {
        return Route::Frames;
    }

    let websocket_connected = match phase {
        StreamPhase::Handshake => {
            if chunk.len() < MAX_LOSS_CHUNK_LEN {
                let trimmed = String::from_utf8_lossy(chunk);
                let trimmed = trimmed.trim();
                if let Some(token) = LOSS_TOKENS.iter().copied().find(|token| *token == trimmed)
                {
                    return Route::LinkLoss(LinkLoss::ExactToken(token));
                }
            }
            return Route::Frames;
        }
        StreamPhase::Established {
            websocket_connected,
        } => websocket_connected,
    };

    if websocket_connected {
        return Route::Frames;
    }

    if contains(chunk, "ERROR") && contains(chunk, "CONNECT") {
        Route::LinkLoss(LinkLoss::ConnectError)
    } else if contains(chunk, "NO CARRIER") {
        Route::LinkLoss(LinkLoss::NoCarrier)
    } else if contains(chunk, "DISCONNECT") {
        Route::LinkLoss(LinkLoss::Disconnect)
    } else {
        Route::Frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONNECTED: StreamPhase = StreamPhase::Established {
        websocket_connected: true,
    };
    const DROPPED: StreamPhase = StreamPhase::Established {
        websocket_connected: false,
    };

    #[test]
    fn test_frame_marker_wins() {
        assert_eq!(classify(&[0x81, 0x06], StreamPhase::Handshake), Route::Frames);
        assert_eq!(classify(&[0x88, 0x00], DROPPED), Route::Frames);
    }

    #[test]
    fn test_exact_tokens_before_handshake() {
        assert_eq!(
            classify(b"CLOSED", StreamPhase::Handshake),
            Route::LinkLoss(LinkLoss::ExactToken("CLOSED"))
        );
        assert_eq!(
            classify(b"\r\nNO CARRIER\r\n", StreamPhase::Handshake),
            Route::LinkLoss(LinkLoss::ExactToken("NO CARRIER"))
        );
    }

    #[test]
    fn test_long_chunks_skip_exact_match() {
        // 15 bytes or more never counts as an exact token
        assert_eq!(classify(b"CLOSED         ", StreamPhase::Handshake), Route::Frames);
        assert_eq!(
            classify(b"HTTP/1.1 101 Switching Protocols", StreamPhase::Handshake),
            Route::Frames
        );
    }

    #[test]
    fn test_connected_websocket_owns_the_stream() {
        assert_eq!(classify(b"CLOSED", CONNECTED), Route::Frames);
        assert_eq!(classify(b"NO CARRIER", CONNECTED), Route::Frames);
        assert_eq!(classify(b"ERROR CONNECT", CONNECTED), Route::Frames);
    }

    #[test]
    fn test_substring_loss_signals() {
        assert_eq!(
            classify(b"+CME ERROR: CONNECT", DROPPED),
            Route::LinkLoss(LinkLoss::ConnectError)
        );
        assert_eq!(
            classify(b"\r\nNO CARRIER\r\nOK\r\n", DROPPED),
            Route::LinkLoss(LinkLoss::NoCarrier)
        );
        assert_eq!(
            classify(b"link DISCONNECT now", DROPPED),
            Route::LinkLoss(LinkLoss::Disconnect)
        );
        assert_eq!(classify(b"CLOSED", DROPPED), Route::Frames);
        assert_eq!(classify(b"hello", DROPPED), Route::Frames);
    }

    #[test]
    fn test_handshake_ignores_status_words_in_long_chunks() {
        let mut chunk = b"HTTP/1.1 101 Switching Protocols\r\n\r\n".to_vec();
        chunk.extend_from_slice(&[0x81, 0x0F]);
        chunk.extend_from_slice(b"NO CARRIER test");
        assert_eq!(classify(&chunk, StreamPhase::Handshake), Route::Frames);
        assert_eq!(
            classify(b"+CME ERROR: CONNECT", StreamPhase::Handshake),
            Route::Frames
        );
    }
}
