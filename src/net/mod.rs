//! Non-blocking transport core
//!
//! This module holds the pieces that move bytes between descriptors without
//! ever blocking the event loop:
//!
//! - [`ByteBuffer`] - per-connection growable/shrinkable byte store with
//!   greedy socket fill and drain
//! - [`Poller`] - readiness multiplexor built on `poll(2)`
//! - [`FilePipe`] - streams a file to a socket through one fixed chunk
//!
//! "Would block" is never reported as an error by anything in here. It is the
//! normal signal to stop and wait for the next readiness event.

pub mod buffer;
pub mod pipe;
pub mod poller;

pub use buffer::{ByteBuffer, Recv};
pub use pipe::{FilePipe, PipeStatus};
pub use poller::{Interest, Poller};

/// Result type for transport operations
pub type Result<T> = std::result::Result<T, Error>;

/// Transport errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Hard I/O failure; the connection must be torn down
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A buffered line exceeds the maximum line length
    #[error("Line exceeds {limit} bytes")]
    LineTooLong { limit: usize },
}

/// Default chunk size in bytes
///
/// Initial buffer capacity, the unit of the grow/shrink thresholds and the
/// staging size of a [`FilePipe`].
pub const DEFAULT_CHUNK: usize = 8192;

/// Maximum length of one line, terminator excluded
pub const MAX_LINE: usize = 8192;
