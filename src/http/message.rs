//! HTTP message types
//!
//! Request-side types produced by the parser, and the status codes handlers
//! answer with.

use super::{Error, Headers, Result};
use std::fmt;

/// Methods the server accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Head,
    Post,
}

impl Method {
    /// Parse a method token, ignoring ASCII case
    pub fn parse(s: &str) -> Result<Self> {
        if s.eq_ignore_ascii_case("GET") {
            Ok(Method::Get)
        } else if s.eq_ignore_ascii_case("HEAD") {
            Ok(Method::Head)
        } else if s.eq_ignore_ascii_case("POST") {
            Ok(Method::Post)
        } else {
            Err(Error::MethodNotAllowed(s.to_string()))
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Protocol version
///
/// Only HTTP/1.1 is spoken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Version {
    #[default]
    Http11,
}

impl Version {
    /// Parse a version token, ignoring ASCII case
    pub fn parse(s: &str) -> Result<Self> {
        if s.eq_ignore_ascii_case("HTTP/1.1") {
            Ok(Version::Http11)
        } else {
            Err(Error::VersionNotSupported(s.to_string()))
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Version::Http11 => "HTTP/1.1",
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// HTTP status code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Status {
    code: u16,
}

impl Status {
    /// Create a status code in the 100..600 range
    pub fn new(code: u16) -> Option<Self> {
        (100..600).contains(&code).then_some(Status { code })
    }

    pub fn code(&self) -> u16 {
        self.code
    }

    /// Reason phrase for the statuses this server sends
    pub fn reason_phrase(&self) -> &'static str {
        match self.code {
            200 => "OK",
            400 => "Bad Request",
            404 => "Not Found",
            405 => "Method Not Allowed",
            411 => "Length Required",
            500 => "Internal Server Error",
            501 => "Not Implemented",
            505 => "HTTP Version Not Supported",
            _ => "Unknown",
        }
    }

    pub const OK: Status = Status { code: 200 };
    pub const BAD_REQUEST: Status = Status { code: 400 };
    pub const NOT_FOUND: Status = Status { code: 404 };
    pub const METHOD_NOT_ALLOWED: Status = Status { code: 405 };
    pub const LENGTH_REQUIRED: Status = Status { code: 411 };
    pub const INTERNAL_SERVER_ERROR: Status = Status { code: 500 };
    pub const NOT_IMPLEMENTED: Status = Status { code: 501 };
    pub const HTTP_VERSION_NOT_SUPPORTED: Status = Status { code: 505 };
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code, self.reason_phrase())
    }
}

/// A parsed request
///
/// The body borrows the connection's input buffer, so a request with a body
/// cannot outlive the dispatch call it was built for. Requests held by the
/// parser between readiness events carry an empty `'static` body.
#[derive(Debug, Clone)]
pub struct HttpRequest<'b> {
    method: Method,
    uri: String,
    version: Version,
    headers: Headers,
    content_len: Option<usize>,
    body: &'b [u8],
}

impl HttpRequest<'static> {
    /// Start a request from a parsed request line
    pub fn new(method: Method, uri: impl Into<String>, version: Version) -> Self {
        HttpRequest {
            method,
            uri: uri.into(),
            version,
            headers: Headers::new(),
            content_len: None,
            body: &[],
        }
    }

    pub fn builder() -> HttpRequestBuilder {
        HttpRequestBuilder::new()
    }
}

impl<'b> HttpRequest<'b> {
    pub fn method(&self) -> Method {
        self.method
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    /// Body length announced by `Content-Length`, once headers are complete
    pub fn content_length(&self) -> Option<usize> {
        self.content_len
    }

    pub(crate) fn set_content_length(&mut self, len: usize) {
        self.content_len = Some(len);
    }

    pub fn body(&self) -> &'b [u8] {
        self.body
    }

    /// Attach a body, rebinding the request to the body's lifetime
    pub fn with_body<'a>(self, body: &'a [u8]) -> HttpRequest<'a> {
        HttpRequest {
            method: self.method,
            uri: self.uri,
            version: self.version,
            headers: self.headers,
            content_len: self.content_len,
            body,
        }
    }

    /// Whether the peer asked for the connection to close after this exchange
    pub fn wants_close(&self) -> bool {
        self.headers
            .get("Connection")
            .is_some_and(|value| value.eq_ignore_ascii_case("close"))
    }
}

/// Builder for requests, mostly useful for exercising handlers
#[derive(Debug, Default)]
pub struct HttpRequestBuilder {
    method: Option<Method>,
    uri: Option<String>,
    headers: Headers,
}

impl HttpRequestBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    pub fn uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn build(self) -> HttpRequest<'static> {
        let mut req = HttpRequest::new(
            self.method.unwrap_or(Method::Get),
            self.uri.unwrap_or_else(|| "/".to_string()),
            Version::Http11,
        );
        req.headers = self.headers;
        req
    }
}
