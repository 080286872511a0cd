//! HTTP/1.1 origin server core
//!
//! This module turns bytes buffered by the [`net`](crate::net) layer into
//! requests, hands complete requests to a [`Handler`], and drives
//! connections from an event loop.
//!
//! # Architecture
//!
//! - [`RequestParser`] is an incremental state machine. It consumes complete
//!   lines from a connection's input buffer and never blocks: when data is
//!   missing it reports [`Parsed::Pending`] and resumes on the next call.
//! - [`Handler`] is the dispatch seam. A handler writes the response head
//!   into the output buffer and may arm a [`FilePipe`](crate::net::FilePipe)
//!   for the body.
//! - [`ClientConnection`] owns the socket, both buffers, the parser and the
//!   pipe, and reacts to readiness events.
//! - [`Server`] accepts connections and runs the readiness loop.
//!
//! # Examples
//!
//! ```no_run
//! use liso::http::{files::StaticFiles, Server};
//!
//! let handler = StaticFiles::new("./www");
//! let mut server = Server::bind("127.0.0.1:8080".parse().unwrap(), handler).unwrap();
//! server.run().unwrap();
//! ```

pub mod connection;
pub mod files;
pub mod headers;
pub mod message;
pub mod parser;
pub mod response;
pub mod server;

pub use connection::{ClientConnection, ConnState};
pub use headers::Headers;
pub use message::{HttpRequest, Method, Status, Version};
pub use parser::{Handler, HandlerResult, Parsed, Reply, RequestParser};
pub use server::Server;

/// Result type for HTTP operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ways a request can be malformed
///
/// All of them are answered with `400 Bad Request`; the variants exist so
/// logs and tests can tell them apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BadRequest {
    LineTooLong,
    MalformedRequestLine,
    MalformedHeader,
    TooManyHeaders,
    InvalidContentLength,
}

impl std::fmt::Display for BadRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let reason = match self {
            BadRequest::LineTooLong => "line too long",
            BadRequest::MalformedRequestLine => "malformed request line",
            BadRequest::MalformedHeader => "malformed header",
            BadRequest::TooManyHeaders => "too many headers",
            BadRequest::InvalidContentLength => "invalid Content-Length",
        };
        f.write_str(reason)
    }
}

/// HTTP operation errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Net(crate::net::Error),

    #[error("Bad request: {0}")]
    BadRequest(BadRequest),

    #[error("Method not allowed: {0}")]
    MethodNotAllowed(String),

    #[error("HTTP version not supported: {0}")]
    VersionNotSupported(String),

    #[error("Length required")]
    LengthRequired,

    #[error("Handler failed with status {0}")]
    Handler(Status),
}

impl From<crate::net::Error> for Error {
    fn from(err: crate::net::Error) -> Self {
        match err {
            crate::net::Error::LineTooLong { .. } => Error::BadRequest(BadRequest::LineTooLong),
            other => Error::Net(other),
        }
    }
}

impl Error {
    /// Status of the error response owed to the peer
    ///
    /// Transport errors have none: the connection is simply dropped.
    pub fn status(&self) -> Option<Status> {
        match self {
            Error::Io(_) | Error::Net(_) => None,
            Error::BadRequest(_) => Some(Status::BAD_REQUEST),
            Error::MethodNotAllowed(_) => Some(Status::METHOD_NOT_ALLOWED),
            Error::VersionNotSupported(_) => Some(Status::HTTP_VERSION_NOT_SUPPORTED),
            Error::LengthRequired => Some(Status::LENGTH_REQUIRED),
            Error::Handler(status) => Some(*status),
        }
    }
}

/// Maximum number of headers per request
pub const MAX_HEADERS: usize = 100;

/// CRLF line ending
pub const CRLF: &str = "\r\n";

/// Value of the `Server` response header
pub const SERVER_NAME: &str = "Liso/1.0";
