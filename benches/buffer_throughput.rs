//! Buffer and parser benchmarks
//!
//! Measures:
//! - greedy fill and drain of a ByteBuffer through scripted transports
//! - request parsing, whole and split into small pieces
//!
//! Run with: cargo bench --bench buffer_throughput

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use liso::http::{Handler, HandlerResult, HttpRequest, Parsed, Reply, RequestParser};
use liso::net::{ByteBuffer, DEFAULT_CHUNK};
use std::io::{self, Read, Write};

/// Hands out `data` in `step`-sized reads, then would-block
struct Source {
    data: Bytes,
    step: usize,
}

impl Read for Source {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.data.is_empty() {
            return Err(io::ErrorKind::WouldBlock.into());
        }
        let n = self.step.min(buf.len()).min(self.data.len());
        buf[..n].copy_from_slice(&self.data.split_to(n));
        Ok(n)
    }
}

struct Sink;

impl Write for Sink {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        Ok(black_box(data.len()))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

struct Discard;

impl Handler for Discard {
    fn handle_get(&mut self, _: &HttpRequest<'_>, _: &mut Reply<'_>) -> HandlerResult {
        Ok(())
    }

    fn handle_head(&mut self, _: &HttpRequest<'_>, _: &mut Reply<'_>) -> HandlerResult {
        Ok(())
    }

    fn handle_post(&mut self, req: &HttpRequest<'_>, _: &mut Reply<'_>) -> HandlerResult {
        black_box(req.body());
        Ok(())
    }
}

fn bench_fill_drain(c: &mut Criterion) {
    let mut group = c.benchmark_group("buffer_fill_drain");

    for size in [DEFAULT_CHUNK, DEFAULT_CHUNK * 16, DEFAULT_CHUNK * 128].iter() {
        let payload = Bytes::from(vec![0xabu8; *size]);
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| {
                let mut buf = ByteBuffer::new();
                let mut src = Source {
                    data: payload.clone(),
                    step: 1460,
                };
                buf.append_from(&mut src).unwrap();
                buf.drain_to(&mut Sink).unwrap();
                black_box(buf.capacity());
            });
        });
    }

    group.finish();
}

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("request_parse");
    let wire = Bytes::from_static(
        b"POST /submit HTTP/1.1\r\n\
          Host: localhost\r\n\
          User-Agent: bench\r\n\
          Accept: */*\r\n\
          Content-Length: 16\r\n\r\n\
          0123456789abcdef",
    );
    group.throughput(Throughput::Bytes(wire.len() as u64));

    for piece in [wire.len(), 16, 1].iter() {
        group.bench_with_input(BenchmarkId::new("pieces_of", piece), piece, |b, &piece| {
            b.iter(|| {
                let mut parser = RequestParser::new();
                let mut input = ByteBuffer::new();
                let mut output = ByteBuffer::new();
                let mut pipe = None;
                let mut last = Parsed::Pending;
                for chunk in wire.chunks(piece) {
                    input.extend_from_slice(chunk);
                    let reply = Reply {
                        output: &mut output,
                        pipe: &mut pipe,
                    };
                    last = parser.parse(&mut input, reply, &mut Discard).unwrap();
                }
                assert_eq!(last, Parsed::KeepAlive);
            });
        });
    }

    group.finish();
}

criterion_group! {
    name = buffer_benches;
    config = Criterion::default().sample_size(50);
    targets = bench_fill_drain, bench_parse
}

criterion_main!(buffer_benches);
