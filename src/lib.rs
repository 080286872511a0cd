//! Liso - a small readiness-driven HTTP/1.1 origin server
//!
//! This crate provides the connection-handling core of the server: a
//! `poll(2)` readiness multiplexor, growable per-connection byte buffers,
//! an incremental request parser and a file-to-socket pipe.

pub mod config;
pub mod http;
pub mod net;
