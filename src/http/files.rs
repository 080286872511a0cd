//! Static file handler
//!
//! Serves files below a root folder. GET queues the response head and arms a
//! [`FilePipe`] for the body; HEAD sends the same head without a body. POST
//! requests are parsed in full but answered with `501 Not Implemented`.

use super::parser::{Handler, HandlerResult, Reply};
use super::response::{end_headers, http_date_now, write_header, write_status_line};
use super::{HttpRequest, Status, SERVER_NAME};
use crate::net::FilePipe;
use std::fs::{self, File};
use std::path::{Component, Path, PathBuf};
use tracing::{error, info};

/// Content type by file extension
pub fn mime_type(path: &Path) -> &'static str {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    if ext.eq_ignore_ascii_case("html") {
        "text/html"
    } else if ext.eq_ignore_ascii_case("css") {
        "text/css"
    } else if ext.eq_ignore_ascii_case("png") {
        "image/png"
    } else if ext.eq_ignore_ascii_case("jpg") {
        "image/jpg"
    } else if ext.eq_ignore_ascii_case("gif") {
        "image/gif"
    } else {
        "application/octet-stream"
    }
}

/// Handler serving a directory tree
#[derive(Debug, Clone)]
pub struct StaticFiles {
    root: PathBuf,
}

impl StaticFiles {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        StaticFiles { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a request URI to a file below the root
    ///
    /// Directories resolve to their `index.html`. URIs that would leave the
    /// root are treated as missing.
    pub fn resolve(&self, uri: &str) -> Result<PathBuf, Status> {
        let root = fs::canonicalize(&self.root).map_err(|e| {
            error!(root = %self.root.display(), error = %e, "cannot resolve www folder");
            Status::INTERNAL_SERVER_ERROR
        })?;

        let path = uri.split(&['?', '#'][..]).next().unwrap_or("");
        let relative = Path::new(path.trim_start_matches('/'));
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(Status::NOT_FOUND);
        }

        let mut full = root.join(relative);
        let meta = fs::metadata(&full).map_err(|_| Status::NOT_FOUND)?;
        if meta.is_dir() {
            full.push("index.html");
            if !full.is_file() {
                return Err(Status::NOT_FOUND);
            }
        }
        Ok(full)
    }

    fn serve(
        &self,
        req: &HttpRequest<'_>,
        reply: &mut Reply<'_>,
        with_body: bool,
    ) -> HandlerResult {
        let path = self.resolve(req.uri())?;

        let file = File::open(&path).map_err(|e| {
            error!(path = %path.display(), error = %e, "open failed");
            Status::INTERNAL_SERVER_ERROR
        })?;
        let meta = file.metadata().map_err(|e| {
            error!(path = %path.display(), error = %e, "metadata failed");
            Status::INTERNAL_SERVER_ERROR
        })?;
        let last_modified = meta
            .modified()
            .map(httpdate::fmt_http_date)
            .unwrap_or_else(|_| http_date_now());

        let out = &mut *reply.output;
        write_status_line(out, Status::OK);
        write_header(out, "Content-Type", mime_type(&path));
        write_header(out, "Content-Length", &meta.len().to_string());
        write_header(out, "Date", &http_date_now());
        write_header(out, "Last-Modified", &last_modified);
        write_header(out, "Server", SERVER_NAME);
        let connection = if req.wants_close() { "close" } else { "keep-alive" };
        write_header(out, "Connection", connection);
        end_headers(out);

        if with_body {
            *reply.pipe = Some(FilePipe::new(file));
        }
        Ok(())
    }
}

impl Handler for StaticFiles {
    fn handle_get(&mut self, req: &HttpRequest<'_>, reply: &mut Reply<'_>) -> HandlerResult {
        info!(uri = %req.uri(), "handle GET");
        self.serve(req, reply, true)
    }

    fn handle_head(&mut self, req: &HttpRequest<'_>, reply: &mut Reply<'_>) -> HandlerResult {
        info!(uri = %req.uri(), "handle HEAD");
        self.serve(req, reply, false)
    }

    fn handle_post(&mut self, req: &HttpRequest<'_>, _reply: &mut Reply<'_>) -> HandlerResult {
        info!(uri = %req.uri(), body_len = req.body().len(), "handle POST");
        // No CGI support
        Err(Status::NOT_IMPLEMENTED)
    }
}
