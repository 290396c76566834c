//! Receive buffer sitting between the socket and the request parser.
//!
//! The buffer only ever looks at bytes that have already arrived. Every
//! operation is an immediate computation over what is buffered; when a
//! complete line (or body slice) is not yet available the caller is told so
//! and is expected to push more bytes later.

use bytes::{Buf, Bytes, BytesMut};

/// Line terminator used by the request line and header lines.
pub const CRLF: &[u8] = b"\r\n";

/// Default capacity reserved for a fresh buffer.
const INITIAL_CAPACITY: usize = 4096;

#[derive(Debug)]
pub struct ByteBuffer {
    inner: BytesMut,
    received: usize,
    // Leading bytes already searched for a terminator without success.
    scanned: usize,
}

impl Default for ByteBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl ByteBuffer {
    pub fn new() -> Self {
        Self {
            inner: BytesMut::with_capacity(INITIAL_CAPACITY),
            received: 0,
            scanned: 0,
        }
    }

    /// Appends newly received bytes.
    pub fn push(&mut self, bytes: &[u8]) {
        self.received += bytes.len();
        self.inner.extend_from_slice(bytes);
    }

    /// Returns the next CRLF-terminated line without its terminator, or
    /// `None` if the terminator has not arrived yet.
    ///
    /// The line stays buffered; call [`ByteBuffer::consume_line`] (or
    /// `consume(line.len() + 2)`) once it has been handled. Repeated calls
    /// only search the bytes pushed since the previous call.
    pub fn peek_line(&mut self) -> Option<&[u8]> {
        // A `\r` at the end of the scanned region may pair with a new `\n`.
        let start = self.scanned.saturating_sub(CRLF.len() - 1);
        match self.inner[start..].windows(CRLF.len()).position(|w| w == CRLF) {
            Some(pos) => {
                let end = start + pos;
                self.scanned = end;
                Some(&self.inner[..end])
            }
            None => {
                self.scanned = self.inner.len();
                None
            }
        }
    }

    /// Discards a line previously returned by `peek_line`, terminator
    /// included.
    pub fn consume_line(&mut self, line_len: usize) {
        self.consume(line_len + CRLF.len());
    }

    /// Discards `n` bytes from the front. Consuming more than is buffered
    /// empties the buffer.
    pub fn consume(&mut self, n: usize) {
        let n = n.min(self.inner.len());
        self.inner.advance(n);
        self.scanned = self.scanned.saturating_sub(n);
    }

    /// Splits off exactly `n` bytes if that many are buffered.
    pub fn take(&mut self, n: usize) -> Option<Bytes> {
        if self.inner.len() < n {
            return None;
        }
        self.scanned = self.scanned.saturating_sub(n);
        Some(self.inner.split_to(n).freeze())
    }

    /// Bytes currently buffered and not yet consumed.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Total number of bytes ever pushed, consumed or not.
    pub fn total_received(&self) -> usize {
        self.received
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peek_line_needs_terminator() {
        let mut buf = ByteBuffer::new();
        buf.push(b"GET / HTTP/1.1");
        assert!(buf.peek_line().is_none());

        buf.push(b"\r");
        assert!(buf.peek_line().is_none());

        buf.push(b"\n");
        assert_eq!(buf.peek_line(), Some(&b"GET / HTTP/1.1"[..]));
    }

    #[test]
    fn consume_line_advances_to_next_line() {
        let mut buf = ByteBuffer::new();
        buf.push(b"first\r\nsecond\r\n");

        let len = buf.peek_line().unwrap().len();
        buf.consume_line(len);

        assert_eq!(buf.peek_line(), Some(&b"second"[..]));
    }

    #[test]
    fn empty_line_is_a_line() {
        let mut buf = ByteBuffer::new();
        buf.push(b"\r\nrest");
        assert_eq!(buf.peek_line(), Some(&b""[..]));
    }

    #[test]
    fn take_waits_for_enough_bytes() {
        let mut buf = ByteBuffer::new();
        buf.push(b"hel");
        assert!(buf.take(5).is_none());
        assert_eq!(buf.len(), 3);

        buf.push(b"lo!");
        assert_eq!(buf.take(5).unwrap(), Bytes::from_static(b"hello"));
        assert_eq!(buf.as_slice(), b"!");
        assert_eq!(buf.total_received(), 6);
    }

    #[test]
    fn scan_resumes_across_pushes() {
        let mut buf = ByteBuffer::new();
        for chunk in [&b"Host: exa"[..], b"mple.com", b"\r", b"\nAccept: */*\r\n"] {
            buf.push(chunk);
            if buf.peek_line().is_some() {
                break;
            }
        }
        assert_eq!(buf.peek_line(), Some(&b"Host: example.com"[..]));

        buf.consume_line(b"Host: example.com".len());
        assert_eq!(buf.peek_line(), Some(&b"Accept: */*"[..]));
    }

    #[test]
    fn scan_offset_follows_take() {
        let mut buf = ByteBuffer::new();
        buf.push(b"abcdef");
        assert!(buf.peek_line().is_none());

        buf.take(4).unwrap();
        buf.push(b"\r\n");
        assert_eq!(buf.peek_line(), Some(&b"ef"[..]));
    }

    #[test]
    fn over_consume_empties() {
        let mut buf = ByteBuffer::new();
        buf.push(b"abc");
        buf.consume(10);
        assert!(buf.is_empty());
    }
}
