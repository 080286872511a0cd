//! Readiness multiplexor
//!
//! [`Poller`] keeps two views of the descriptors it manages:
//!
//! - the *interest* set, mutated by [`Poller::register`] and
//!   [`Poller::unregister`]
//! - the *ready* list, produced fresh by each [`Poller::wait`]
//!
//! Interest changes made while the ready list is being processed only take
//! effect on the next `wait`. The backend is `poll(2)`, so there is no upper
//! bound on descriptor values.

use super::{Error, Result};
use std::collections::BTreeMap;
use std::io;
use std::os::fd::RawFd;
use std::time::Duration;
use tracing::trace;

/// Readiness kind a descriptor can be armed for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Interest {
    Read,
    Write,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Armed {
    read: bool,
    write: bool,
}

impl Armed {
    fn set(&mut self, interest: Interest, on: bool) {
        match interest {
            Interest::Read => self.read = on,
            Interest::Write => self.write = on,
        }
    }

    fn is_empty(&self) -> bool {
        !self.read && !self.write
    }

    fn events(&self) -> libc::c_short {
        let mut events = 0;
        if self.read {
            events |= libc::POLLIN;
        }
        if self.write {
            events |= libc::POLLOUT;
        }
        events
    }
}

/// One descriptor reported ready by the last wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    pub fd: RawFd,
    pub readable: bool,
    pub writable: bool,
}

impl Event {
    /// Check the event against an interest kind
    pub fn is(&self, interest: Interest) -> bool {
        match interest {
            Interest::Read => self.readable,
            Interest::Write => self.writable,
        }
    }
}

/// Readiness multiplexor over `poll(2)`
#[derive(Debug, Default)]
pub struct Poller {
    interests: BTreeMap<RawFd, Armed>,
    ready: Vec<Event>,
}

impl Poller {
    /// Create a poller with nothing registered
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm `fd` for `interest`
    pub fn register(&mut self, fd: RawFd, interest: Interest) {
        self.interests.entry(fd).or_default().set(interest, true);
    }

    /// Disarm `fd` for `interest`
    ///
    /// Unregistering something that was never registered is a no-op.
    pub fn unregister(&mut self, fd: RawFd, interest: Interest) {
        if let Some(armed) = self.interests.get_mut(&fd) {
            armed.set(interest, false);
            if armed.is_empty() {
                self.interests.remove(&fd);
            }
        }
    }

    /// Disarm `fd` entirely; pair with closing the descriptor
    pub fn forget(&mut self, fd: RawFd) {
        self.interests.remove(&fd);
        self.ready.retain(|event| event.fd != fd);
    }

    /// Check whether `fd` is currently armed for `interest`
    pub fn is_registered(&self, fd: RawFd, interest: Interest) -> bool {
        self.interests.get(&fd).is_some_and(|armed| match interest {
            Interest::Read => armed.read,
            Interest::Write => armed.write,
        })
    }

    /// Block until at least one registered descriptor is ready
    ///
    /// Returns the number of ready descriptors.
    pub fn wait(&mut self) -> Result<usize> {
        self.wait_timeout(None)
    }

    /// Like [`Poller::wait`] but gives up after `timeout`
    ///
    /// A timeout produces an empty ready list.
    pub fn wait_timeout(&mut self, timeout: Option<Duration>) -> Result<usize> {
        let mut fds: Vec<libc::pollfd> = self
            .interests
            .iter()
            .map(|(&fd, armed)| libc::pollfd {
                fd,
                events: armed.events(),
                revents: 0,
            })
            .collect();

        let timeout_ms = timeout
            .map(|d| d.as_millis().min(libc::c_int::MAX as u128) as libc::c_int)
            .unwrap_or(-1); // -1 = infinite

        let result = loop {
            let result =
                unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, timeout_ms) };
            if result >= 0 {
                break result;
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(Error::Io(err));
            }
        };

        // Hang-ups and errors surface through whichever operation is armed
        let broken = libc::POLLHUP | libc::POLLERR | libc::POLLNVAL;
        self.ready.clear();
        for pfd in fds.iter().filter(|pfd| pfd.revents != 0) {
            self.ready.push(Event {
                fd: pfd.fd,
                readable: pfd.events & libc::POLLIN != 0
                    && pfd.revents & (libc::POLLIN | broken) != 0,
                writable: pfd.events & libc::POLLOUT != 0
                    && pfd.revents & (libc::POLLOUT | broken) != 0,
            });
        }

        trace!(registered = fds.len(), ready = result, "poll returned");
        Ok(self.ready.len())
    }

    /// Descriptors reported ready by the last wait
    pub fn events(&self) -> &[Event] {
        &self.ready
    }

    /// Check whether `fd` was ready for `interest` in the last wait
    pub fn is_ready(&self, fd: RawFd, interest: Interest) -> bool {
        self.ready
            .iter()
            .any(|event| event.fd == fd && event.is(interest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::net::{TcpListener, TcpStream};
    use std::os::fd::AsRawFd;

    fn pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let client = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let (server, _) = listener.accept().unwrap();
        (client, server)
    }

    #[test]
    fn test_register_unregister() {
        let mut poller = Poller::new();
        poller.register(5, Interest::Read);
        poller.register(5, Interest::Write);
        assert!(poller.is_registered(5, Interest::Read));
        assert!(poller.is_registered(5, Interest::Write));

        poller.unregister(5, Interest::Read);
        assert!(!poller.is_registered(5, Interest::Read));
        assert!(poller.is_registered(5, Interest::Write));

        poller.unregister(5, Interest::Write);
        assert!(!poller.is_registered(5, Interest::Write));

        // Never registered
        poller.unregister(42, Interest::Read);
    }

    #[test]
    fn test_wait_reports_readable() {
        let (mut client, server) = pair();
        let mut poller = Poller::new();
        poller.register(server.as_raw_fd(), Interest::Read);

        assert_eq!(
            poller.wait_timeout(Some(Duration::from_millis(50))).unwrap(),
            0
        );
        assert!(!poller.is_ready(server.as_raw_fd(), Interest::Read));

        client.write_all(b"ping").unwrap();
        assert_eq!(poller.wait().unwrap(), 1);
        assert!(poller.is_ready(server.as_raw_fd(), Interest::Read));
        assert!(!poller.is_ready(server.as_raw_fd(), Interest::Write));
    }

    #[test]
    fn test_wait_reports_writable() {
        let (client, _server) = pair();
        let mut poller = Poller::new();
        poller.register(client.as_raw_fd(), Interest::Write);

        assert_eq!(poller.wait().unwrap(), 1);
        let event = poller.events()[0];
        assert_eq!(event.fd, client.as_raw_fd());
        assert!(event.writable);
        assert!(!event.readable);
    }

    #[test]
    fn test_changes_apply_on_next_wait() {
        let (mut client, server) = pair();
        let fd = server.as_raw_fd();
        let mut poller = Poller::new();
        poller.register(fd, Interest::Read);
        client.write_all(b"x").unwrap();

        poller.wait().unwrap();
        poller.unregister(fd, Interest::Read);
        // Result of the previous wait is untouched
        assert!(poller.is_ready(fd, Interest::Read));

        poller.register(client.as_raw_fd(), Interest::Write);
        poller.wait().unwrap();
        assert!(!poller.is_ready(fd, Interest::Read));
        assert!(poller.is_ready(client.as_raw_fd(), Interest::Write));
    }

    #[test]
    fn test_peer_close_is_readable() {
        let (client, server) = pair();
        let mut poller = Poller::new();
        poller.register(server.as_raw_fd(), Interest::Read);
        drop(client);

        poller.wait().unwrap();
        assert!(poller.is_ready(server.as_raw_fd(), Interest::Read));
    }

    #[test]
    fn test_forget_drops_ready_entry() {
        let (mut client, server) = pair();
        let fd = server.as_raw_fd();
        let mut poller = Poller::new();
        poller.register(fd, Interest::Read);
        client.write_all(b"x").unwrap();
        poller.wait().unwrap();

        poller.forget(fd);
        assert!(!poller.is_ready(fd, Interest::Read));
        assert!(!poller.is_registered(fd, Interest::Read));
    }
}
