//! Transport layer abstraction
//!
//! The modem is reached over a byte channel with no framing of its own. The
//! client only needs to push bytes, ask how many are waiting and take them,
//! all without blocking. Implementations live in their own crates
//! (`cellsock-transport-serial`); a scripted in-memory double lives in
//! [`mock`] for tests.

use crate::error::Result;
use bytes::Bytes;

/// Non-blocking byte channel to the modem
pub trait Transport {
    /// Write bytes, returning how many were accepted
    fn write(&mut self, data: &[u8]) -> Result<usize>;

    /// Number of bytes ready to be read without blocking
    fn available(&mut self) -> Result<usize>;

    /// Take whatever is ready; empty when nothing has arrived
    fn read_available(&mut self) -> Result<Bytes>;

    /// Flush pending output
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    /// Write the whole buffer
    fn write_all(&mut self, mut data: &[u8]) -> Result<()> {
        while !data.is_empty() {
            let written = self.write(data)?;
            if written == 0 {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::WriteZero,
                    "transport accepted no bytes",
                )
                .into());
            }
            data = &data[written..];
        }
        self.flush()
    }

    /// Discard everything currently waiting, returning the number of bytes dropped
    fn drain(&mut self) -> Result<usize> {
        let mut dropped = 0;
        while self.available()? > 0 {
            let chunk = self.read_available()?;
            if chunk.is_empty() {
                break;
            }
            dropped += chunk.len();
        }
        Ok(dropped)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn write(&mut self, data: &[u8]) -> Result<usize> {
        (**self).write(data)
    }

    fn available(&mut self) -> Result<usize> {
        (**self).available()
    }

    fn read_available(&mut self) -> Result<Bytes> {
        (**self).read_available()
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }
}

/// In-memory transport for tests
#[cfg(any(test, feature = "mock"))]
pub mod mock {
    use super::Transport;
    use crate::error::Result;
    use bytes::Bytes;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::fmt;
    use std::rc::Rc;

    type Responder = Box<dyn FnMut(&[u8]) -> Option<Vec<u8>>>;

    #[derive(Default)]
    struct Inner {
        inbound: VecDeque<Bytes>,
        written: Vec<u8>,
        writes: Vec<Bytes>,
        responder: Option<Responder>,
        fail_writes: bool,
    }

    /// Scripted transport.
    ///
    /// Clones share state, so a test keeps one handle while the client owns
    /// the other. Each pushed chunk is delivered by exactly one
    /// `read_available` call, which keeps chunk boundaries observable.
    #[derive(Clone, Default)]
    pub struct MockTransport {
        inner: Rc<RefCell<Inner>>,
    }

    impl MockTransport {
        /// Empty transport with no responder
        pub fn new() -> Self {
            Self::default()
        }

        /// Answer every write with whatever `responder` returns
        pub fn with_responder<F>(responder: F) -> Self
        where
            F: FnMut(&[u8]) -> Option<Vec<u8>> + 'static,
        {
            let transport = Self::new();
            transport.set_responder(responder);
            transport
        }

        /// Replace the responder
        pub fn set_responder<F>(&self, responder: F)
        where
            F: FnMut(&[u8]) -> Option<Vec<u8>> + 'static,
        {
            self.inner.borrow_mut().responder = Some(Box::new(responder));
        }

        /// Remove the responder
        pub fn clear_responder(&self) {
            self.inner.borrow_mut().responder = None;
        }

        /// Queue one inbound chunk
        pub fn push(&self, chunk: impl AsRef<[u8]>) {
            self.inner
                .borrow_mut()
                .inbound
                .push_back(Bytes::copy_from_slice(chunk.as_ref()));
        }

        /// Number of inbound chunks not yet read
        pub fn pending(&self) -> usize {
            self.inner.borrow().inbound.len()
        }

        /// Everything written so far, concatenated
        pub fn written(&self) -> Vec<u8> {
            self.inner.borrow().written.clone()
        }

        /// Everything written so far, lossily decoded
        pub fn written_text(&self) -> String {
            String::from_utf8_lossy(&self.inner.borrow().written).into_owned()
        }

        /// Individual write calls, in order
        pub fn writes(&self) -> Vec<Bytes> {
            self.inner.borrow().writes.clone()
        }

        /// Return and forget everything written so far
        pub fn take_written(&self) -> Vec<u8> {
            let mut inner = self.inner.borrow_mut();
            inner.writes.clear();
            std::mem::take(&mut inner.written)
        }

        /// Make every subsequent write fail with a broken-pipe error
        pub fn fail_writes(&self, fail: bool) {
            self.inner.borrow_mut().fail_writes = fail;
        }
    }

    impl fmt::Debug for MockTransport {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            let inner = self.inner.borrow();
            f.debug_struct("MockTransport")
                .field("inbound", &inner.inbound.len())
                .field("written", &inner.written.len())
                .field("responder", &inner.responder.is_some())
                .finish()
        }
    }

    impl Transport for MockTransport {
        fn write(&mut self, data: &[u8]) -> Result<usize> {
            let mut inner = self.inner.borrow_mut();
            if inner.fail_writes {
                return Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "mock write failure").into());
            }
            inner.written.extend_from_slice(data);
            inner.writes.push(Bytes::copy_from_slice(data));

            let reply = inner.responder.as_mut().and_then(|respond| respond(data));
            if let Some(reply) = reply {
                if !reply.is_empty() {
                    inner.inbound.push_back(Bytes::from(reply));
                }
            }
            Ok(data.len())
        }

        fn available(&mut self) -> Result<usize> {
            Ok(self.inner.borrow().inbound.front().map_or(0, Bytes::len))
        }

        fn read_available(&mut self) -> Result<Bytes> {
            Ok(self.inner.borrow_mut().inbound.pop_front().unwrap_or_default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::MockTransport;
    use super::*;

    #[test]
    fn test_chunks_are_delivered_one_per_read() {
        let handle = MockTransport::new();
        let mut transport = handle.clone();
        handle.push("OK\r\n");
        handle.push("CLOSED");

        assert_eq!(transport.available().unwrap(), 4);
        assert_eq!(&transport.read_available().unwrap()[..], b"OK\r\n");
        assert_eq!(&transport.read_available().unwrap()[..], b"CLOSED");
        assert!(transport.read_available().unwrap().is_empty());
    }

    #[test]
    fn test_responder_and_drain() {
        let handle = MockTransport::with_responder(|written| {
            (written == b"AT\r\n").then(|| b"\r\nOK\r\n".to_vec())
        });
        let mut transport = handle.clone();
        handle.push("stale");
        handle.push("more stale");
        assert_eq!(transport.drain().unwrap(), 15);

        transport.write_all(b"AT\r\n").unwrap();
        transport.write_all(b"ATI\r\n").unwrap();
        assert_eq!(handle.pending(), 1);
        assert_eq!(handle.written_text(), "AT\r\nATI\r\n");
        assert_eq!(handle.writes().len(), 2);
    }

    #[test]
    fn test_write_failure() {
        let handle = MockTransport::new();
        let mut transport: Box<dyn Transport> = Box::new(handle.clone());
        handle.fail_writes(true);
        assert!(matches!(transport.write_all(b"AT\r\n"), Err(crate::Error::Io(_))));
        assert!(handle.written().is_empty());
    }
}
