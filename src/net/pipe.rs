//! File-to-socket pipe
//!
//! Streams a file to a socket through one fixed staging chunk, so memory use
//! stays at [`DEFAULT_CHUNK`] bytes no matter how large the file is. Each
//! [`FilePipe::step`] performs at most one read and one send, which lets the
//! event loop resume the transfer on the next writable event.

use super::{Error, Interest, Poller, Result, DEFAULT_CHUNK};
use std::fs::File;
use std::io::{self, Read, Write};
use std::os::fd::{AsRawFd, RawFd};
use tracing::{debug, error};

/// Progress reported by one pipe step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipeStatus {
    /// More to send; call again on the next writable event
    Continue,
    /// The whole file has been sent and the source is closed
    Complete,
}

/// Streams a source descriptor to a socket in chunk-sized pieces
///
/// The pipe owns the source and closes it exactly once: on EOF, on any
/// error, or through [`FilePipe::close`] when the connection goes away.
#[derive(Debug)]
pub struct FilePipe<F: Read + AsRawFd = File> {
    from: Option<F>,
    from_fd: RawFd,
    buf: Box<[u8]>,
    offset: usize,
    datasize: usize,
}

impl<F: Read + AsRawFd> FilePipe<F> {
    /// Arm a pipe reading from `from`
    pub fn new(from: F) -> Self {
        FilePipe {
            from_fd: from.as_raw_fd(),
            from: Some(from),
            buf: vec![0; DEFAULT_CHUNK].into_boxed_slice(),
            offset: 0,
            datasize: 0,
        }
    }

    /// Source descriptor
    pub fn fd(&self) -> RawFd {
        self.from_fd
    }

    /// Check whether the source is still open
    pub fn is_open(&self) -> bool {
        self.from.is_some()
    }

    /// Bytes staged but not yet sent
    pub fn pending(&self) -> usize {
        self.datasize - self.offset
    }

    /// Move the transfer forward by at most one read and one send
    ///
    /// A short send is normal and yields [`PipeStatus::Continue`]. Read and
    /// send errors close the source before they are returned; tearing down
    /// the socket is left to the caller.
    pub fn step<W: Write + ?Sized>(
        &mut self,
        sock: &mut W,
        poller: &mut Poller,
    ) -> Result<PipeStatus> {
        let Some(from) = self.from.as_mut() else {
            return Ok(PipeStatus::Complete);
        };

        if self.offset >= self.datasize {
            match from.read(&mut self.buf) {
                Ok(0) => {
                    debug!(fd = self.from_fd, "pipe source exhausted");
                    self.close(poller);
                    return Ok(PipeStatus::Complete);
                }
                Ok(n) => {
                    self.datasize = n;
                    self.offset = 0;
                }
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
                    ) =>
                {
                    return Ok(PipeStatus::Continue)
                }
                Err(e) => {
                    error!(fd = self.from_fd, error = %e, "pipe read failed");
                    self.close(poller);
                    return Err(Error::Io(e));
                }
            }
        }

        match sock.write(&self.buf[self.offset..self.datasize]) {
            Ok(0) => {
                self.close(poller);
                Err(Error::Io(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "peer accepted no bytes",
                )))
            }
            Ok(n) => {
                self.offset += n;
                Ok(PipeStatus::Continue)
            }
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
                ) =>
            {
                Ok(PipeStatus::Continue)
            }
            Err(e) => {
                error!(fd = self.from_fd, error = %e, "pipe send failed");
                self.close(poller);
                Err(Error::Io(e))
            }
        }
    }

    /// Close the source and disarm it
    ///
    /// Returns `false` if the source was already closed.
    pub fn close(&mut self, poller: &mut Poller) -> bool {
        match self.from.take() {
            Some(from) => {
                poller.unregister(self.from_fd, Interest::Read);
                drop(from);
                true
            }
            None => false,
        }
    }
}
