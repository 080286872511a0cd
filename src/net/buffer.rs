//! Growable byte buffer with greedy socket I/O
//!
//! A [`ByteBuffer`] is an append-at-tail, consume-at-head byte store. Each
//! connection owns two of them, one for input and one for output.
//!
//! Layout:
//!
//! ```text
//! 0            pos                 datasize            bufsize
//! |  consumed   |   unconsumed data   |     free tail      |
//! ```
//!
//! The buffer grows by 50% whenever the free tail drops below half a chunk
//! right after an append, and gives memory back once the consumed prefix plus
//! the free tail exceed one chunk: the unconsumed bytes are moved to offset 0
//! and half of the slack is released.

use super::{Error, Result, DEFAULT_CHUNK, MAX_LINE};
use std::io::{self, Read, Write};
use tracing::debug;

/// Outcome of a greedy receive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recv {
    /// The socket would block; this many bytes were buffered by the call
    Open(usize),
    /// The peer closed its side after this many bytes were buffered
    Eof(usize),
}

impl Recv {
    /// Bytes buffered by the call
    pub fn received(&self) -> usize {
        match *self {
            Recv::Open(n) | Recv::Eof(n) => n,
        }
    }

    /// Whether the peer closed its write side
    pub fn is_eof(&self) -> bool {
        matches!(self, Recv::Eof(_))
    }
}

/// Growable/shrinkable byte buffer
#[derive(Debug)]
pub struct ByteBuffer {
    buf: Vec<u8>,
    datasize: usize,
    pos: usize,
}

impl ByteBuffer {
    /// Create an empty buffer of one default chunk
    pub fn new() -> Self {
        ByteBuffer {
            buf: vec![0; DEFAULT_CHUNK],
            datasize: 0,
            pos: 0,
        }
    }

    /// Allocated capacity (`bufsize`)
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// End of valid data (`datasize`)
    pub fn data_size(&self) -> usize {
        self.datasize
    }

    /// Index of the first unconsumed byte (`pos`)
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Number of unconsumed bytes
    pub fn len(&self) -> usize {
        self.datasize - self.pos
    }

    /// Check if every buffered byte has been consumed
    pub fn is_empty(&self) -> bool {
        self.pos == self.datasize
    }

    /// The unconsumed bytes
    pub fn as_slice(&self) -> &[u8] {
        &self.buf[self.pos..self.datasize]
    }

    /// Append bytes at the tail, growing as needed
    pub fn extend_from_slice(&mut self, data: &[u8]) {
        self.reclaim();
        while self.capacity() - self.datasize < data.len() {
            self.grow();
        }
        self.buf[self.datasize..self.datasize + data.len()].copy_from_slice(data);
        self.datasize += data.len();
        if self.is_full() {
            self.grow();
        }
    }

    /// Keep only the first `len` unconsumed bytes
    ///
    /// Has no effect if `len` is not less than [`ByteBuffer::len`].
    pub fn truncate(&mut self, len: usize) {
        if len < self.len() {
            self.datasize = self.pos + len;
        }
    }

    /// Consume `n` bytes from the head
    ///
    /// Returns `None` without consuming anything if fewer than `n` bytes are
    /// buffered. The returned slice borrows the buffer, so it cannot outlive
    /// the next mutation.
    pub fn take(&mut self, n: usize) -> Option<&[u8]> {
        if self.len() < n {
            return None;
        }
        let start = self.pos;
        self.pos += n;
        Some(&self.buf[start..start + n])
    }

    /// Consume one line from the head
    ///
    /// Lines end with CRLF; a bare LF is accepted too. The terminator is not
    /// part of the returned line. `Ok(None)` means no complete line is
    /// buffered yet. A line longer than [`MAX_LINE`] yields
    /// [`Error::LineTooLong`].
    pub fn read_line(&mut self) -> Result<Option<String>> {
        let data = self.as_slice();
        let Some(lf) = data.iter().position(|&b| b == b'\n') else {
            // Room is left for a trailing CR that may still be followed by LF
            if data.len() > MAX_LINE + 1 {
                return Err(Error::LineTooLong { limit: MAX_LINE });
            }
            return Ok(None);
        };

        let end = if lf > 0 && data[lf - 1] == b'\r' { lf - 1 } else { lf };
        if end > MAX_LINE {
            return Err(Error::LineTooLong { limit: MAX_LINE });
        }

        let line = String::from_utf8_lossy(&data[..end]).into_owned();
        self.pos += lf + 1;
        Ok(Some(line))
    }

    /// Receive from `src` until it would block or the peer closes
    ///
    /// Requires a non-blocking source. Any error other than would-block is
    /// returned as [`Error::Io`] and is fatal for the connection.
    pub fn append_from<R: Read + ?Sized>(&mut self, src: &mut R) -> Result<Recv> {
        self.reclaim();
        let mut received = 0;

        loop {
            if self.datasize == self.capacity() {
                self.grow();
            }
            match src.read(&mut self.buf[self.datasize..]) {
                Ok(0) => {
                    debug!(received, "peer closed");
                    return Ok(Recv::Eof(received));
                }
                Ok(n) => {
                    self.datasize += n;
                    received += n;
                    if self.is_full() {
                        self.grow();
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(Error::Io(e)),
            }
        }

        debug!(received, buffered = self.len(), "receive complete");
        Ok(Recv::Open(received))
    }

    /// Send unconsumed bytes to `dst` until it would block or nothing is left
    ///
    /// Returns the number of bytes sent. Shrinks the buffer afterwards if the
    /// slack exceeds one chunk.
    pub fn drain_to<W: Write + ?Sized>(&mut self, dst: &mut W) -> Result<usize> {
        let mut sent = 0;

        while self.pos < self.datasize {
            match dst.write(&self.buf[self.pos..self.datasize]) {
                Ok(0) => {
                    return Err(Error::Io(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "peer accepted no bytes",
                    )))
                }
                Ok(n) => {
                    self.pos += n;
                    sent += n;
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(Error::Io(e)),
            }
        }

        debug!(sent, remaining = self.len(), "send complete");
        self.reclaim();
        Ok(sent)
    }

    /// Free tail below half a chunk
    fn is_full(&self) -> bool {
        self.datasize + (DEFAULT_CHUNK >> 1) > self.capacity()
    }

    /// Free tail plus consumed prefix
    fn slack(&self) -> usize {
        self.capacity() - self.datasize + self.pos
    }

    fn grow(&mut self) {
        let bufsize = self.capacity() + (self.capacity() >> 1).max(1);
        self.buf.resize(bufsize, 0);
        debug!(bufsize, datasize = self.datasize, "buffer grown");
    }

    fn reclaim(&mut self) {
        if self.slack() > DEFAULT_CHUNK {
            self.shrink();
        }
    }

    fn shrink(&mut self) {
        let slack = self.slack();
        self.buf.copy_within(self.pos..self.datasize, 0);
        self.datasize -= self.pos;
        self.pos = 0;

        let bufsize = self.capacity() - (slack >> 1);
        self.buf.truncate(bufsize);
        self.buf.shrink_to_fit();
        debug!(bufsize, datasize = self.datasize, "buffer shrunk");
    }
}

impl Default for ByteBuffer {
    fn default() -> Self {
        Self::new()
    }
}
