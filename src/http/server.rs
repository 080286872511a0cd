//! HTTP server event loop
//!
//! Single-threaded and readiness driven: the only blocking call is
//! [`Poller::wait`]. Every socket is non-blocking, so one slow peer never
//! stalls the others.

use super::connection::ClientConnection;
use super::parser::Handler;
use super::Result;
use crate::net::{poller::Event, Interest, Poller};
use socket2::{Domain, Protocol, Socket, Type};
use std::collections::HashMap;
use std::io;
use std::net::{SocketAddr, TcpListener};
use std::os::fd::{AsRawFd, RawFd};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Listen backlog
const BACKLOG: i32 = 128;

/// How long accepting stays paused after a hard accept error when no
/// connection closes in the meantime
const ACCEPT_RETRY: Duration = Duration::from_millis(250);

/// HTTP server
///
/// Owns the listening socket, the poller and every live connection, and
/// dispatches complete requests to `H`.
pub struct Server<H: Handler> {
    listener: TcpListener,
    poller: Poller,
    connections: HashMap<RawFd, ClientConnection>,
    handler: H,
    accept_paused: Option<Instant>,
}

impl<H: Handler> Server<H> {
    /// Bind a non-blocking listener on `addr`
    pub fn bind(addr: SocketAddr, handler: H) -> Result<Self> {
        let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
        socket.set_reuse_address(true)?;
        socket.set_nonblocking(true)?;
        socket.bind(&addr.into())?;
        socket.listen(BACKLOG)?;
        let listener: TcpListener = socket.into();

        let mut poller = Poller::new();
        poller.register(listener.as_raw_fd(), Interest::Read);
        info!(addr = %listener.local_addr()?, "listening");

        Ok(Server {
            listener,
            poller,
            connections: HashMap::new(),
            handler,
            accept_paused: None,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Number of open client connections
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Serve forever
    pub fn run(&mut self) -> Result<()> {
        loop {
            self.turn(None)?;
        }
    }

    /// Run one loop iteration: wait for readiness, then service it
    ///
    /// Returns the number of ready descriptors; zero means the timeout
    /// elapsed. Errors from a single connection close that connection and are
    /// not returned.
    pub fn turn(&mut self, timeout: Option<Duration>) -> Result<usize> {
        let timeout = match self.accept_paused {
            Some(since) if since.elapsed() >= ACCEPT_RETRY => {
                self.resume_accept();
                timeout
            }
            Some(since) => {
                let left = ACCEPT_RETRY.saturating_sub(since.elapsed());
                Some(timeout.map_or(left, |t| t.min(left)))
            }
            None => timeout,
        };
        let ready = self.poller.wait_timeout(timeout)?;
        let events = self.poller.events().to_vec();
        let listener_fd = self.listener.as_raw_fd();

        for event in events {
            if event.fd == listener_fd {
                if event.readable {
                    self.accept_all();
                }
            } else {
                self.service(event);
            }
        }
        Ok(ready)
    }

    fn accept_all(&mut self) {
        loop {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    if let Err(e) = stream.set_nonblocking(true) {
                        warn!(peer = %peer, error = %e, "dropping connection");
                        continue;
                    }
                    let conn = ClientConnection::new(stream);
                    conn.sync_interest(&mut self.poller);
                    info!(peer = %peer, fd = conn.fd(), "accepted connection");
                    self.connections.insert(conn.fd(), conn);
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    // Out of descriptors and the like; the listener stays
                    // readable, so stop polling it until something changes
                    error!(error = %e, "accept failed");
                    self.pause_accept();
                    break;
                }
            }
        }
    }

    fn service(&mut self, event: Event) {
        let Some(conn) = self.connections.get_mut(&event.fd) else {
            debug!(fd = event.fd, "event for unknown descriptor");
            return;
        };

        let mut result = Ok(());
        if event.readable {
            result = conn.on_readable(&mut self.handler);
        }
        if result.is_ok() && event.writable {
            result = conn.on_writable(&mut self.poller, &mut self.handler);
        }

        match result {
            Err(e) => {
                warn!(fd = event.fd, error = %e, "connection error");
                self.close(event.fd);
            }
            Ok(()) if conn.is_finished() => self.close(event.fd),
            Ok(()) => conn.sync_interest(&mut self.poller),
        }
    }

    fn close(&mut self, fd: RawFd) {
        if let Some(mut conn) = self.connections.remove(&fd) {
            conn.teardown(&mut self.poller);
            info!(fd, "connection closed");
            if self.accept_paused.is_some() {
                self.resume_accept();
            }
        }
    }

    fn pause_accept(&mut self) {
        self.poller.unregister(self.listener.as_raw_fd(), Interest::Read);
        self.accept_paused = Some(Instant::now());
    }

    fn resume_accept(&mut self) {
        self.poller.register(self.listener.as_raw_fd(), Interest::Read);
        self.accept_paused = None;
        debug!("accepting again");
    }
}
