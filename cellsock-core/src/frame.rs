//! WebSocket frame parsing and serialization
//!
//! Frames follow RFC 6455 with the restrictions of a modem-hosted client:
//! every accepted frame must be final (FIN set), payload lengths use either
//! the 7-bit or the 16-bit form, and the 64-bit form is refused.

use crate::{
    error::{FrameError, Result},
    protocol::{
        constants::{DEFAULT_RECEIVE_BUFFER_LIMIT, LEGACY_MASK, MAX_EXTENDED_PAYLOAD},
        frame::*,
        Opcode,
    },
};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::borrow::Cow;

/// How the client picks the masking key for outgoing frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MaskMode {
    /// Fresh random key per frame
    #[default]
    Random,
    /// The same key for every frame
    Fixed([u8; 4]),
}

impl MaskMode {
    /// Fixed `0x81` key expected by some paired custom servers
    pub const LEGACY: MaskMode = MaskMode::Fixed(LEGACY_MASK);

    /// Key to use for the next frame
    pub fn key(&self) -> [u8; 4] {
        match self {
            MaskMode::Random => rand::random::<[u8; 4]>(),
            MaskMode::Fixed(key) => *key,
        }
    }
}

/// Represents a WebSocket frame according to RFC 6455
///
/// `payload` always holds the unmasked application bytes; masking is applied
/// when the frame is written and removed when it is parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Indicates if this is the final frame in a message
    pub fin: bool,
    /// Frame opcode
    pub opcode: Opcode,
    /// Indicates if the payload is masked on the wire
    pub masked: bool,
    /// Masking key (if present)
    pub mask: Option<[u8; 4]>,
    /// Payload data
    pub payload: Bytes,
}

impl Frame {
    /// Create a new final, unmasked frame with the given opcode and payload
    pub fn new(opcode: Opcode, payload: impl Into<Bytes>) -> Self {
        Self {
            fin: true,
            opcode,
            masked: false,
            mask: None,
            payload: payload.into(),
        }
    }

    /// Create a text frame
    pub fn text(payload: impl Into<Bytes>) -> Self {
        Self::new(Opcode::Text, payload)
    }

    /// Create a binary frame
    pub fn binary(payload: impl Into<Bytes>) -> Self {
        Self::new(Opcode::Binary, payload)
    }

    /// Create an empty close frame
    pub fn close() -> Self {
        Self::new(Opcode::Close, Bytes::new())
    }

    /// Create an empty ping frame
    pub fn ping() -> Self {
        Self::new(Opcode::Ping, Bytes::new())
    }

    /// Create an empty pong frame
    pub fn pong() -> Self {
        Self::new(Opcode::Pong, Bytes::new())
    }

    /// Set the FIN bit
    pub fn fin(mut self, fin: bool) -> Self {
        self.fin = fin;
        self
    }

    /// Mask the frame with a key chosen by `mode` (client frames)
    pub fn masked(mut self, mode: &MaskMode) -> Self {
        self.masked = true;
        self.mask = Some(mode.key());
        self
    }

    /// Serialize the frame to bytes
    pub fn to_bytes(&self) -> Result<Bytes> {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.write_to(&mut buf)?;
        Ok(buf.freeze())
    }

    /// Number of bytes `write_to` will produce
    pub fn encoded_len(&self) -> usize {
        let len = self.payload.len();
        let length_field = if len < PAYLOAD_LEN_16 as usize { 0 } else { 2 };
        let mask_field = if self.masked { MASKING_KEY_LEN } else { 0 };
        2 + length_field + mask_field + len
    }

    /// Write the frame to a buffer
    pub fn write_to(&self, buf: &mut BytesMut) -> Result<()> {
        let payload_len = self.payload.len();
        if payload_len > MAX_EXTENDED_PAYLOAD {
            return Err(FrameError::PayloadTooLarge {
                len: payload_len,
                max: MAX_EXTENDED_PAYLOAD,
            }
            .into());
        }

        let first_byte = ((self.fin as u8) << 7) | self.opcode.value();
        buf.put_u8(first_byte);

        let mask_bit = if self.masked { MASK_BIT } else { 0 };
        if payload_len < PAYLOAD_LEN_16 as usize {
            buf.put_u8(mask_bit | payload_len as u8);
        } else {
            buf.put_u8(mask_bit | PAYLOAD_LEN_16);
            buf.put_u16(payload_len as u16);
        }

        if self.masked {
            let mask = self.mask.unwrap_or_else(|| MaskMode::Random.key());
            buf.put_slice(&mask);
            buf.extend(
                self.payload
                    .iter()
                    .enumerate()
                    .map(|(i, byte)| byte ^ mask[i % MASKING_KEY_LEN]),
            );
        } else {
            buf.put_slice(&self.payload);
        }

        Ok(())
    }

    /// Parse one frame from the front of `buf`.
    ///
    /// On success the frame's bytes are consumed. On any error `buf` is left
    /// untouched; `FrameError::InsufficientData` means "wait for more bytes",
    /// every other error means the buffer cannot be interpreted.
    pub fn parse(buf: &mut BytesMut) -> Result<Self> {
        if buf.len() < 2 {
            return Err(FrameError::InsufficientData {
                needed: 2,
                have: buf.len(),
            }
            .into());
        }

        let first_byte = buf[0];
        if first_byte & FIN_BIT == 0 {
            return Err(FrameError::FinNotSet { first_byte }.into());
        }
        let opcode = Opcode::from_bits(first_byte);

        let second_byte = buf[1];
        let masked = second_byte & MASK_BIT != 0;
        let mut header_len = 2;
        let payload_len = match second_byte & PAYLOAD_LEN_MASK {
            PAYLOAD_LEN_16 => {
                if buf.len() < 4 {
                    return Err(FrameError::InsufficientData {
                        needed: 4,
                        have: buf.len(),
                    }
                    .into());
                }
                header_len = 4;
                u16::from_be_bytes([buf[2], buf[3]]) as usize
            }
            PAYLOAD_LEN_64 => return Err(FrameError::UnsupportedLength64.into()),
            len => len as usize,
        };

        if masked {
            header_len += MASKING_KEY_LEN;
        }

        let frame_len = header_len + payload_len;
        if buf.len() < frame_len {
            return Err(FrameError::InsufficientData {
                needed: frame_len,
                have: buf.len(),
            }
            .into());
        }

        let mask = masked.then(|| {
            let start = header_len - MASKING_KEY_LEN;
            [buf[start], buf[start + 1], buf[start + 2], buf[start + 3]]
        });

        buf.advance(header_len);
        let raw = buf.split_to(payload_len);
        let payload = match mask {
            Some(mask) => raw
                .iter()
                .enumerate()
                .map(|(i, byte)| byte ^ mask[i % MASKING_KEY_LEN])
                .collect::<Vec<u8>>()
                .into(),
            None => raw.freeze(),
        };

        Ok(Frame {
            fin: true,
            opcode,
            masked,
            mask,
            payload,
        })
    }

    /// Get the frame kind
    pub fn kind(&self) -> FrameKind {
        match self.opcode {
            Opcode::Text => FrameKind::Text,
            Opcode::Binary => FrameKind::Binary,
            Opcode::Close => FrameKind::Close,
            Opcode::Ping => FrameKind::Ping,
            Opcode::Pong => FrameKind::Pong,
            Opcode::Continuation => FrameKind::Continuation,
            _ => FrameKind::Reserved,
        }
    }

    /// Payload as text, replacing invalid UTF-8
    pub fn text_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }

    /// Get the payload length
    pub fn payload_len(&self) -> usize {
        self.payload.len()
    }

    /// Check if this is a control frame
    pub fn is_control(&self) -> bool {
        self.opcode.is_control()
    }

    /// Check if this is a data frame
    pub fn is_data(&self) -> bool {
        self.opcode.is_data()
    }

    /// Check if this is the final frame
    pub fn is_final(&self) -> bool {
        self.fin
    }
}

/// Frame kind for easier matching
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// Text frame
    Text,
    /// Binary frame
    Binary,
    /// Close frame
    Close,
    /// Ping frame
    Ping,
    /// Pong frame
    Pong,
    /// Continuation frame
    Continuation,
    /// Reserved frame
    Reserved,
}

/// Incremental frame decoder over the session's receive buffer
///
/// Bytes are appended in arrival order and complete frames are taken from
/// the front. The buffer is never resynchronised: a protocol violation
/// discards everything buffered, and a buffer that outgrows its limit
/// without yielding a frame is dropped.
#[derive(Debug)]
pub struct FrameParser {
    /// Buffer for partial frame data
    buffer: BytesMut,
    /// Overflow limit in bytes
    limit: usize,
}

impl Default for FrameParser {
    fn default() -> Self {
        Self::with_limit(DEFAULT_RECEIVE_BUFFER_LIMIT)
    }
}

impl FrameParser {
    /// Create a new frame parser with the default 1024-byte limit
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a frame parser with a custom buffer limit
    pub fn with_limit(limit: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(limit.min(4096)),
            limit,
        }
    }

    /// Feed data to the parser and try to extract frames
    pub fn feed(&mut self, data: &[u8]) -> Vec<Result<Frame>> {
        self.extend(data);
        self.extract_frames()
    }

    /// Append bytes without decoding
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Extract complete frames from the buffer.
    ///
    /// Stops at the first error, which is returned as the last element.
    pub fn extract_frames(&mut self) -> Vec<Result<Frame>> {
        let mut frames = Vec::new();

        loop {
            match Frame::parse(&mut self.buffer) {
                Ok(frame) => frames.push(Ok(frame)),
                Err(e) if e.is_incomplete() => break,
                Err(e) => {
                    tracing::debug!(
                        discarded = self.buffer.len(),
                        "Dropping receive buffer: {}",
                        e
                    );
                    self.buffer.clear();
                    frames.push(Err(e));
                    return frames;
                }
            }
        }

        if self.buffer.len() > self.limit {
            let size = self.buffer.len();
            tracing::debug!(size, limit = self.limit, "Receive buffer overflow");
            self.buffer.clear();
            frames.push(Err(FrameError::BufferOverflow {
                size,
                limit: self.limit,
            }
            .into()));
        }

        frames
    }

    /// Bytes currently buffered
    pub fn buffered(&self) -> &[u8] {
        &self.buffer
    }

    /// Get the number of bytes currently buffered
    pub fn buffered_bytes(&self) -> usize {
        self.buffer.len()
    }

    /// Drop `n` bytes from the front of the buffer
    pub fn consume(&mut self, n: usize) {
        let n = n.min(self.buffer.len());
        self.buffer.advance(n);
    }

    /// Configured overflow limit
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Clear the parser buffer
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn only_frame(results: Vec<Result<Frame>>) -> Frame {
        assert_eq!(results.len(), 1, "expected exactly one result");
        results.into_iter().next().unwrap().unwrap()
    }

    #[test]
    fn test_text_frame_serialization() {
        let bytes = Frame::text("hello").to_bytes().unwrap();

        assert_eq!(bytes[0], 0x81); // FIN=1, Opcode=0001
        assert_eq!(bytes[1], 0x05); // MASK=0, Length=5
        assert_eq!(&bytes[2..], b"hello");
    }

    #[test]
    fn test_fixed_mask_frame() {
        let bytes = Frame::text("hi").masked(&MaskMode::LEGACY).to_bytes().unwrap();

        assert_eq!(&bytes[..], &[0x81, 0x82, 0x81, 0x81, 0x81, 0x81, b'h' ^ 0x81, b'i' ^ 0x81]);
    }

    #[test]
    fn test_empty_control_frames() {
        let ping = Frame::ping().masked(&MaskMode::LEGACY).to_bytes().unwrap();
        assert_eq!(&ping[..], &[0x89, 0x80, 0x81, 0x81, 0x81, 0x81]);

        let pong = Frame::pong().masked(&MaskMode::Random).to_bytes().unwrap();
        assert_eq!(pong.len(), 6);
        assert_eq!(&pong[..2], &[0x8A, 0x80]);
    }

    #[test]
    fn test_masked_hello_decodes() {
        let mask = [1u8, 2, 3, 4];
        let mut wire = vec![0x81, 0x85];
        wire.extend_from_slice(&mask);
        wire.extend(b"hello".iter().enumerate().map(|(i, b)| b ^ mask[i % 4]));

        let frame = only_frame(FrameParser::new().feed(&wire));
        assert_eq!(frame.kind(), FrameKind::Text);
        assert_eq!(frame.text_lossy(), "hello");
        assert_eq!(frame.mask, Some(mask));
    }

    #[test]
    fn test_extended_length_frame() {
        let payload = vec![b'x'; 300];
        let bytes = Frame::binary(payload.clone()).to_bytes().unwrap();
        assert_eq!(bytes[1], 126);
        assert_eq!(&bytes[2..4], &300u16.to_be_bytes());

        let mut buf = BytesMut::from(&bytes[..]);
        let parsed = Frame::parse(&mut buf).unwrap();
        assert_eq!(parsed.payload.len(), 300);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_oversized_payload_rejected() {
        let frame = Frame::binary(vec![0u8; MAX_EXTENDED_PAYLOAD + 1]);
        assert!(matches!(
            frame.to_bytes(),
            Err(Error::Frame(FrameError::PayloadTooLarge { .. }))
        ));
    }

    #[test]
    fn test_fin_unset_clears_buffer() {
        let mut parser = FrameParser::new();
        let results = parser.feed(&[0x01, 0x03, b'a', b'b', b'c', 0x81, 0x00]);

        assert_eq!(results.len(), 1);
        assert!(matches!(
            results[0],
            Err(Error::Frame(FrameError::FinNotSet { first_byte: 0x01 }))
        ));
        assert_eq!(parser.buffered_bytes(), 0);
    }

    #[test]
    fn test_64bit_length_rejected() {
        let mut parser = FrameParser::new();
        let results = parser.feed(&[0x82, 0x7F, 0, 0, 0, 0, 0, 1, 0, 0]);

        assert!(matches!(
            results[0],
            Err(Error::Frame(FrameError::UnsupportedLength64))
        ));
        assert_eq!(parser.buffered_bytes(), 0);
    }

    #[test]
    fn test_partial_frames_wait() {
        let mut parser = FrameParser::new();
        let bytes = Frame::text("frame1").to_bytes().unwrap();

        assert!(parser.feed(&bytes[..1]).is_empty());
        assert!(parser.feed(&bytes[1..5]).is_empty());
        assert_eq!(parser.buffered_bytes(), 5);

        let frame = only_frame(parser.feed(&bytes[5..]));
        assert_eq!(frame.text_lossy(), "frame1");
        assert_eq!(parser.buffered_bytes(), 0);
    }

    #[test]
    fn test_extended_length_header_split() {
        let mut parser = FrameParser::with_limit(4096);
        let bytes = Frame::text(vec![b'z'; 200]).to_bytes().unwrap();

        assert!(parser.feed(&bytes[..3]).is_empty());
        let frame = only_frame(parser.feed(&bytes[3..]));
        assert_eq!(frame.payload_len(), 200);
    }

    #[test]
    fn test_back_to_back_frames() {
        let mut wire = Frame::text("one").to_bytes().unwrap().to_vec();
        wire.extend_from_slice(&Frame::ping().to_bytes().unwrap());
        wire.extend_from_slice(&Frame::text("two").to_bytes().unwrap()[..3]);

        let mut parser = FrameParser::new();
        let frames: Vec<Frame> = parser.feed(&wire).into_iter().map(|r| r.unwrap()).collect();

        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].text_lossy(), "one");
        assert_eq!(frames[1].kind(), FrameKind::Ping);
        assert_eq!(parser.buffered_bytes(), 3);
    }

    #[test]
    fn test_buffer_overflow_resets() {
        let mut parser = FrameParser::new();
        // Header announces 2000 bytes; the buffer passes 1024 before it can resolve.
        let mut wire = vec![0x81, 126];
        wire.extend_from_slice(&2000u16.to_be_bytes());
        wire.extend(std::iter::repeat(b'a').take(1100));

        let results = parser.feed(&wire);
        assert!(matches!(
            results.last(),
            Some(Err(Error::Frame(FrameError::BufferOverflow { limit: 1024, .. })))
        ));
        assert_eq!(parser.buffered_bytes(), 0);
    }
}
