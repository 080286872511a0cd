//! Incremental request parser
//!
//! [`RequestParser`] pulls complete lines out of a connection's input buffer
//! and walks through
//!
//! ```text
//! RequestLine -> Headers -> Body(len) -> dispatch
//!      ^                                    |
//!      +------------ keep-alive ------------+
//! ```
//!
//! Partial progress lives entirely in the buffer's head position and in the
//! request held by the current state, so a request split across any number of
//! readiness events parses exactly like one that arrived whole.

use super::{BadRequest, Error, Headers, HttpRequest, Method, Result, Status, Version};
use crate::net::{ByteBuffer, FilePipe};
use tracing::{debug, info, warn};

/// Where a handler puts its response
pub struct Reply<'c> {
    /// Output buffer for the status line, headers and any inline body
    pub output: &'c mut ByteBuffer,
    /// Slot for a file body streamed after the output buffer drains
    pub pipe: &'c mut Option<FilePipe>,
}

/// Outcome of a handler call: `Err` carries the error response status
pub type HandlerResult = std::result::Result<(), Status>;

/// Request dispatch seam
///
/// Each method returns `Ok(())` once the response has been queued, or the
/// status of the error response the connection should send before closing.
pub trait Handler {
    fn handle_get(&mut self, req: &HttpRequest<'_>, reply: &mut Reply<'_>) -> HandlerResult;

    fn handle_head(&mut self, req: &HttpRequest<'_>, reply: &mut Reply<'_>) -> HandlerResult;

    fn handle_post(&mut self, req: &HttpRequest<'_>, reply: &mut Reply<'_>) -> HandlerResult;
}

/// Result of one parse call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parsed {
    /// Not enough buffered input yet; call again after the next receive
    Pending,
    /// A request was dispatched; keep serving this connection
    KeepAlive,
    /// A request was dispatched; close once the response is flushed
    Close,
}

#[derive(Debug, Default)]
enum ParserState {
    #[default]
    RequestLine,
    Headers(HttpRequest<'static>),
    Body(HttpRequest<'static>),
}

/// Per-connection request state machine
#[derive(Debug, Default)]
pub struct RequestParser {
    state: ParserState,
}

impl RequestParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether the parser is between requests
    pub fn is_idle(&self) -> bool {
        matches!(self.state, ParserState::RequestLine)
    }

    /// Request whose head is being parsed or whose body is awaited
    pub fn pending(&self) -> Option<&HttpRequest<'static>> {
        match &self.state {
            ParserState::RequestLine => None,
            ParserState::Headers(req) | ParserState::Body(req) => Some(req),
        }
    }

    /// Consume buffered input until one request is dispatched or input runs out
    ///
    /// At most one request is dispatched per call. Errors leave the parser
    /// idle; the caller owes the peer the error's [`Error::status`] and must
    /// close the connection afterwards.
    pub fn parse<H: Handler + ?Sized>(
        &mut self,
        input: &mut ByteBuffer,
        mut reply: Reply<'_>,
        handler: &mut H,
    ) -> Result<Parsed> {
        loop {
            match std::mem::take(&mut self.state) {
                ParserState::RequestLine => {
                    let Some(line) = input.read_line()? else {
                        return Ok(Parsed::Pending);
                    };
                    // Stray blank lines between requests
                    if line.is_empty() {
                        continue;
                    }
                    debug!(line = %line, "request line");
                    self.state = ParserState::Headers(parse_request_line(&line)?);
                }
                ParserState::Headers(mut req) => {
                    let Some(line) = input.read_line()? else {
                        self.state = ParserState::Headers(req);
                        return Ok(Parsed::Pending);
                    };

                    if !line.is_empty() {
                        debug!(line = %line, "header");
                        let (name, value) = Headers::parse_header_line(&line).inspect_err(|_| {
                            warn!(line = %line, "bad request header format");
                        })?;
                        if !req.headers_mut().insert(name, value) {
                            return Err(Error::BadRequest(BadRequest::TooManyHeaders));
                        }
                        self.state = ParserState::Headers(req);
                        continue;
                    }

                    match req.method() {
                        Method::Get | Method::Head => {
                            return dispatch(req, &mut reply, handler);
                        }
                        Method::Post => {
                            let len = content_length(req.headers())?;
                            req.set_content_length(len);
                            self.state = ParserState::Body(req);
                        }
                    }
                }
                ParserState::Body(req) => {
                    let len = req.content_length().unwrap_or(0);
                    if input.len() < len {
                        debug!(have = input.len(), want = len, "body incomplete");
                        self.state = ParserState::Body(req);
                        return Ok(Parsed::Pending);
                    }
                    let body = input.take(len).unwrap_or_default();
                    return dispatch(req.with_body(body), &mut reply, handler);
                }
            }
        }
    }
}

/// Split a request line into method, URI and version
///
/// Method is checked before version, so `FOO / HTTP/9` is reported as a
/// disallowed method.
pub fn parse_request_line(line: &str) -> Result<HttpRequest<'static>> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    let [method, uri, version] = parts[..] else {
        warn!(line = %line, "bad request line");
        return Err(Error::BadRequest(BadRequest::MalformedRequestLine));
    };

    let method = Method::parse(method).inspect_err(|e| warn!(error = %e, "rejecting request"))?;
    let version = Version::parse(version).inspect_err(|e| warn!(error = %e, "rejecting request"))?;

    Ok(HttpRequest::new(method, uri, version))
}

/// Validate `Content-Length`: ASCII digits only, no sign, no blanks
fn content_length(headers: &Headers) -> Result<usize> {
    let value = headers.get("Content-Length").ok_or(Error::LengthRequired)?;
    let invalid = || {
        warn!(value = %value, "invalid Content-Length");
        Error::BadRequest(BadRequest::InvalidContentLength)
    };

    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    value.parse::<usize>().map_err(|_| invalid())
}

fn dispatch<H: Handler + ?Sized>(
    req: HttpRequest<'_>,
    reply: &mut Reply<'_>,
    handler: &mut H,
) -> Result<Parsed> {
    info!(method = %req.method(), uri = %req.uri(), "handling request");

    match req.method() {
        Method::Get => handler.handle_get(&req, reply),
        Method::Head => handler.handle_head(&req, reply),
        Method::Post => handler.handle_post(&req, reply),
    }
    .map_err(Error::Handler)?;

    Ok(if req.wants_close() {
        Parsed::Close
    } else {
        Parsed::KeepAlive
    })
}
