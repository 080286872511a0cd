//! Integration tests for the HTTP server
//!
//! These tests run a real server over loopback: the server loop turns on the
//! test thread while clients talk to it from spawned threads.

use liso::http::{files::StaticFiles, Server};
use liso::net::DEFAULT_CHUNK;
use std::fs;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tempfile::TempDir;

fn site() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("index.html"), "<h1>welcome</h1>").unwrap();
    fs::write(dir.path().join("big.bin"), big_content()).unwrap();
    dir
}

fn big_content() -> Vec<u8> {
    (0..DEFAULT_CHUNK * 12 + 777).map(|i| (i * 31 % 256) as u8).collect()
}

fn start(dir: &TempDir) -> (Server<StaticFiles>, SocketAddr) {
    let listen = "127.0.0.1:0".parse().unwrap();
    let server = Server::bind(listen, StaticFiles::new(dir.path())).unwrap();
    let addr = server.local_addr().unwrap();
    (server, addr)
}

/// Turn the server until every client thread has finished
fn serve_until_done(server: &mut Server<StaticFiles>, clients: Vec<JoinHandle<()>>) {
    while !clients.iter().all(|c| c.is_finished()) {
        server.turn(Some(Duration::from_millis(10))).unwrap();
    }
    for client in clients {
        client.join().unwrap();
    }
}

fn connect(addr: SocketAddr) -> TcpStream {
    let stream = TcpStream::connect(addr).unwrap();
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();
    stream
}

/// Read one response; the body length comes from `Content-Length`
fn read_response(stream: &mut TcpStream, expect_body: bool) -> (String, Vec<u8>) {
    let mut head = Vec::new();
    let mut byte = [0u8; 1];
    while !head.ends_with(b"\r\n\r\n") {
        let n = stream.read(&mut byte).unwrap();
        assert_eq!(n, 1, "connection closed inside response head");
        head.push(byte[0]);
    }
    let head = String::from_utf8(head).unwrap();

    let len: usize = head
        .lines()
        .find_map(|l| l.strip_prefix("Content-Length: "))
        .map(|v| v.trim().parse().unwrap())
        .unwrap_or(0);

    let mut body = vec![0u8; if expect_body { len } else { 0 }];
    stream.read_exact(&mut body).unwrap();
    (head, body)
}

fn assert_closed(stream: &mut TcpStream) {
    let mut rest = Vec::new();
    stream.read_to_end(&mut rest).unwrap();
    assert!(rest.is_empty(), "unexpected trailing bytes: {:?}", rest);
}

#[test]
fn test_large_file_then_keep_alive() {
    let dir = site();
    let (mut server, addr) = start(&dir);

    let client = thread::spawn(move || {
        let mut stream = connect(addr);
        stream.write_all(b"GET /big.bin HTTP/1.1\r\nHost: localhost\r\n\r\n").unwrap();
        let (head, body) = read_response(&mut stream, true);
        assert!(head.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(head.contains("Content-Type: application/octet-stream\r\n"));
        assert!(head.contains("Connection: keep-alive\r\n"));
        assert_eq!(body, big_content());

        stream.write_all(b"GET / HTTP/1.1\r\nConnection: close\r\n\r\n").unwrap();
        let (head, body) = read_response(&mut stream, true);
        assert!(head.contains("Content-Type: text/html\r\n"));
        assert!(head.contains("Connection: close\r\n"));
        assert_eq!(body, b"<h1>welcome</h1>");
        assert_closed(&mut stream);
    });

    serve_until_done(&mut server, vec![client]);
    assert_eq!(server.connection_count(), 0);
}

#[test]
fn test_head_sends_no_body() {
    let dir = site();
    let (mut server, addr) = start(&dir);

    let client = thread::spawn(move || {
        let mut stream = connect(addr);
        stream
            .write_all(b"HEAD /index.html HTTP/1.1\r\nConnection: close\r\n\r\n")
            .unwrap();
        let (head, _) = read_response(&mut stream, false);
        assert!(head.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(head.contains("Content-Length: 16\r\n"));
        assert_closed(&mut stream);
    });

    serve_until_done(&mut server, vec![client]);
}

#[test]
fn test_request_trickled_byte_by_byte() {
    let dir = site();
    let (mut server, addr) = start(&dir);

    let client = thread::spawn(move || {
        let mut stream = connect(addr);
        stream.set_nodelay(true).unwrap();
        for byte in b"GET /index.html HTTP/1.1\r\nConnection: close\r\n\r\n" {
            stream.write_all(std::slice::from_ref(byte)).unwrap();
            thread::sleep(Duration::from_millis(1));
        }
        let (head, body) = read_response(&mut stream, true);
        assert!(head.starts_with("HTTP/1.1 200 OK\r\n"));
        assert_eq!(body, b"<h1>welcome</h1>");
    });

    serve_until_done(&mut server, vec![client]);
}

#[test]
fn test_post_is_not_implemented() {
    let dir = site();
    let (mut server, addr) = start(&dir);

    let client = thread::spawn(move || {
        let mut stream = connect(addr);
        stream
            .write_all(b"POST /form HTTP/1.1\r\nContent-Length: 10\r\n\r\nhello")
            .unwrap();
        thread::sleep(Duration::from_millis(50));
        stream.write_all(b"world").unwrap();

        let (head, _) = read_response(&mut stream, true);
        assert!(head.starts_with("HTTP/1.1 501 Not Implemented\r\n"));
        assert!(head.contains("Connection: close\r\n"));
        assert_closed(&mut stream);
    });

    serve_until_done(&mut server, vec![client]);
}

#[test]
fn test_error_statuses() {
    let dir = site();
    let (mut server, addr) = start(&dir);

    let cases: Vec<(Vec<u8>, &'static str)> = vec![
        (b"GET /missing.html HTTP/1.1\r\n\r\n".to_vec(), "404 Not Found"),
        (b"DELETE / HTTP/1.1\r\n\r\n".to_vec(), "405 Method Not Allowed"),
        (b"GET / HTTP/1.0\r\n\r\n".to_vec(), "505 HTTP Version Not Supported"),
        (b"POST / HTTP/1.1\r\n\r\n".to_vec(), "411 Length Required"),
        (
            b"POST / HTTP/1.1\r\nContent-Length: abc\r\n\r\n".to_vec(),
            "400 Bad Request",
        ),
        (b"GET / HTTP/1.1\r\nbroken header\r\n\r\n".to_vec(), "400 Bad Request"),
        (
            [b"GET /".to_vec(), vec![b'a'; 9_000], b" HTTP/1.1\r\n\r\n".to_vec()].concat(),
            "400 Bad Request",
        ),
    ];

    let clients = cases
        .into_iter()
        .map(|(request, status)| {
            thread::spawn(move || {
                let mut stream = connect(addr);
                // The server may answer and close before the whole request is sent
                let _ = stream.write_all(&request);
                let (head, _) = read_response(&mut stream, true);
                assert!(
                    head.starts_with(&format!("HTTP/1.1 {}\r\n", status)),
                    "expected {} got {:?}",
                    status,
                    head
                );
            })
        })
        .collect();

    serve_until_done(&mut server, clients);
}

#[test]
fn test_concurrent_clients() {
    let dir = site();
    let (mut server, addr) = start(&dir);

    let clients = (0..8)
        .map(|_| {
            thread::spawn(move || {
                let mut stream = connect(addr);
                for _ in 0..3 {
                    stream.write_all(b"GET /big.bin HTTP/1.1\r\n\r\n").unwrap();
                    let (_, body) = read_response(&mut stream, true);
                    assert_eq!(body, big_content());
                }
            })
        })
        .collect();

    serve_until_done(&mut server, clients);
}

#[test]
fn test_pipelined_requests() {
    let dir = site();
    let (mut server, addr) = start(&dir);

    let client = thread::spawn(move || {
        let mut stream = connect(addr);
        stream
            .write_all(
                b"GET /big.bin HTTP/1.1\r\n\r\n\
                  HEAD / HTTP/1.1\r\n\r\n\
                  GET / HTTP/1.1\r\nConnection: close\r\n\r\n",
            )
            .unwrap();

        let (_, body) = read_response(&mut stream, true);
        assert_eq!(body, big_content());
        let (head, _) = read_response(&mut stream, false);
        assert!(head.contains("Content-Length: 16\r\n"));
        let (_, body) = read_response(&mut stream, true);
        assert_eq!(body, b"<h1>welcome</h1>");
        assert_closed(&mut stream);
    });

    serve_until_done(&mut server, vec![client]);
}
