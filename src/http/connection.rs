//! Client connection
//!
//! A [`ClientConnection`] owns one accepted socket together with its input
//! and output buffers, its request parser and at most one file pipe. The
//! event loop calls [`ClientConnection::on_readable`] and
//! [`ClientConnection::on_writable`] when the poller says so, then
//! [`ClientConnection::sync_interest`] to re-arm the socket.
//!
//! Responses are strictly ordered: while a file body is being piped the
//! connection stops reading, and buffered pipelined requests are parsed once
//! the pipe completes.

use super::parser::{Handler, Parsed, Reply, RequestParser};
use super::response::write_error;
use super::{Result, Status};
use crate::net::{ByteBuffer, FilePipe, Interest, PipeStatus, Poller};
use std::io::{Read, Write};
use std::net::TcpStream;
use std::os::fd::{AsRawFd, RawFd};
use tracing::{debug, warn};

/// What the connection is doing between readiness events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    /// Reading and parsing requests
    Idle,
    /// Streaming a response body from a file; input is left alone
    Piping,
}

/// One accepted client
#[derive(Debug)]
pub struct ClientConnection<S = TcpStream> {
    sock: S,
    fd: RawFd,
    input: ByteBuffer,
    output: ByteBuffer,
    parser: RequestParser,
    pipe: Option<FilePipe>,
    state: ConnState,
    closing: bool,
    peer_eof: bool,
}

impl<S: Read + Write + AsRawFd> ClientConnection<S> {
    /// Wrap a non-blocking socket
    pub fn new(sock: S) -> Self {
        ClientConnection {
            fd: sock.as_raw_fd(),
            sock,
            input: ByteBuffer::new(),
            output: ByteBuffer::new(),
            parser: RequestParser::new(),
            pipe: None,
            state: ConnState::Idle,
            closing: false,
            peer_eof: false,
        }
    }

    pub fn fd(&self) -> RawFd {
        self.fd
    }

    pub fn state(&self) -> ConnState {
        self.state
    }

    pub fn input(&self) -> &ByteBuffer {
        &self.input
    }

    pub fn output(&self) -> &ByteBuffer {
        &self.output
    }

    /// Check whether the connection will close once its output is flushed
    pub fn is_closing(&self) -> bool {
        self.closing
    }

    /// Check whether nothing is left to do and the socket can be closed
    pub fn is_finished(&self) -> bool {
        self.closing && self.output.is_empty() && self.pipe.is_none()
    }

    pub fn wants_read(&self) -> bool {
        self.state == ConnState::Idle && !self.closing && !self.peer_eof
    }

    pub fn wants_write(&self) -> bool {
        !self.output.is_empty() || self.pipe.is_some()
    }

    /// Receive everything available and serve complete requests
    ///
    /// Transport errors are returned and are fatal for the connection.
    /// Protocol errors are answered in-band and mark the connection closing.
    pub fn on_readable<H: Handler + ?Sized>(&mut self, handler: &mut H) -> Result<()> {
        if !self.wants_read() {
            return Ok(());
        }

        let recv = self.input.append_from(&mut self.sock)?;
        debug!(fd = self.fd, received = recv.received(), eof = recv.is_eof(), "readable");
        if recv.is_eof() {
            self.peer_eof = true;
        }

        self.process(handler);
        Ok(())
    }

    /// Flush queued output, then advance the file pipe
    pub fn on_writable<H: Handler + ?Sized>(
        &mut self,
        poller: &mut Poller,
        handler: &mut H,
    ) -> Result<()> {
        if !self.output.is_empty() {
            self.output.drain_to(&mut self.sock)?;
            if !self.output.is_empty() {
                return Ok(());
            }
        }

        let Some(pipe) = self.pipe.as_mut() else {
            return Ok(());
        };
        if pipe.step(&mut self.sock, poller)? == PipeStatus::Complete {
            debug!(fd = self.fd, "response body sent");
            self.pipe = None;
            self.state = ConnState::Idle;
            // Requests that arrived while piping
            self.process(handler);
        }
        Ok(())
    }

    /// Queue an error response and close after it is sent
    pub fn fail(&mut self, status: Status) {
        // A body armed by a failing handler is never sent; dropping closes it
        self.pipe = None;
        write_error(&mut self.output, status);
        self.state = ConnState::Idle;
        self.parser = RequestParser::new();
        self.closing = true;
    }

    /// Re-arm the socket for the operations the connection can make progress on
    pub fn sync_interest(&self, poller: &mut Poller) {
        for (interest, wanted) in [
            (Interest::Read, self.wants_read()),
            (Interest::Write, self.wants_write()),
        ] {
            if wanted {
                poller.register(self.fd, interest);
            } else {
                poller.unregister(self.fd, interest);
            }
        }
    }

    /// Release the pipe and disarm everything; the socket closes on drop
    pub fn teardown(&mut self, poller: &mut Poller) {
        if let Some(mut pipe) = self.pipe.take() {
            pipe.close(poller);
        }
        poller.forget(self.fd);
    }

    fn process<H: Handler + ?Sized>(&mut self, handler: &mut H) {
        while self.state == ConnState::Idle && !self.closing {
            // Responses queued before this request are kept on failure
            let mark = self.output.len();
            let reply = Reply {
                output: &mut self.output,
                pipe: &mut self.pipe,
            };
            match self.parser.parse(&mut self.input, reply, handler) {
                Ok(Parsed::Pending) => {
                    if self.peer_eof {
                        debug!(fd = self.fd, "peer finished sending");
                        self.closing = true;
                    }
                    break;
                }
                Ok(parsed) => {
                    if parsed == Parsed::Close {
                        self.closing = true;
                    }
                    if self.pipe.is_some() {
                        self.state = ConnState::Piping;
                    }
                }
                Err(e) => {
                    warn!(fd = self.fd, error = %e, "request failed");
                    self.output.truncate(mark);
                    self.fail(e.status().unwrap_or(Status::INTERNAL_SERVER_ERROR));
                }
            }
        }
    }
}
