//! Response emission helpers
//!
//! Handlers build responses directly in a connection's output buffer:
//! status line, then header lines, then the blank line, then (optionally) an
//! inline body. Larger bodies go through a [`FilePipe`](crate::net::FilePipe).

use super::{Status, Version, CRLF, SERVER_NAME};
use crate::net::ByteBuffer;
use std::time::SystemTime;

/// Append `HTTP/1.1 <code> <reason>`
pub fn write_status_line(out: &mut ByteBuffer, status: Status) {
    let line = format!(
        "{} {} {}{}",
        Version::Http11,
        status.code(),
        status.reason_phrase(),
        CRLF
    );
    out.extend_from_slice(line.as_bytes());
}

/// Append `Name: value`
pub fn write_header(out: &mut ByteBuffer, name: &str, value: &str) {
    let line = format!("{}: {}{}", name, value, CRLF);
    out.extend_from_slice(line.as_bytes());
}

/// Append the blank line that ends the header section
pub fn end_headers(out: &mut ByteBuffer) {
    out.extend_from_slice(CRLF.as_bytes());
}

/// Current time as an HTTP-date
pub fn http_date_now() -> String {
    httpdate::fmt_http_date(SystemTime::now())
}

/// Queue a complete error response
///
/// The response always announces `Connection: close`; the caller closes the
/// connection once the output buffer has drained.
pub fn write_error(out: &mut ByteBuffer, status: Status) {
    let body = format!(
        "<html><head><title>{status}</title></head><body><h1>{status}</h1></body></html>\n",
        status = status
    );

    write_status_line(out, status);
    write_header(out, "Content-Type", "text/html");
    write_header(out, "Content-Length", &body.len().to_string());
    write_header(out, "Date", &http_date_now());
    write_header(out, "Server", SERVER_NAME);
    write_header(out, "Connection", "close");
    end_headers(out);
    out.extend_from_slice(body.as_bytes());
}
