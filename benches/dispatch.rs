//! Dispatch benchmarks
//!
//! This benchmark suite measures:
//! - Header block parsing and serialization
//! - Route resolution against the default route
//! - Internal dispatch of a plain controller and a REST controller
//! - Response parsing of chunked bodies
//!
//! Run with: cargo bench --bench dispatch

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use serde_json::{json, Value};

use ko7_dispatch::dispatch::FnController;
use ko7_dispatch::http::{Headers, ResponseParser};
use ko7_dispatch::rest::{Resource, RestController};
use ko7_dispatch::route::Router;
use ko7_dispatch::{App, Config, Context, Request, Result};

// ========== Header Benchmarks ==========

fn header_block(count: usize) -> String {
    let mut raw = String::from("Host: example.com\r\nAccept: text/html;q=0.9, */*;q=0.1\r\n");
    for i in 0..count {
        raw.push_str(&format!("x-custom-{}: value {}\r\n", i, i));
    }
    raw.push_str("X-Folded: first\r\n  second\r\n");
    raw
}

fn bench_headers(c: &mut Criterion) {
    let mut group = c.benchmark_group("headers");

    for count in [4usize, 32, 128] {
        let raw = header_block(count);
        group.throughput(Throughput::Bytes(raw.len() as u64));

        group.bench_with_input(BenchmarkId::new("parse", count), &raw, |b, raw| {
            b.iter(|| black_box(Headers::parse(black_box(raw))));
        });

        let headers = Headers::parse(&raw);
        group.bench_with_input(BenchmarkId::new("serialize", count), &headers, |b, headers| {
            b.iter(|| black_box(headers.to_string()));
        });
    }

    group.finish();
}

// ========== Routing Benchmarks ==========

fn bench_routing(c: &mut Criterion) {
    let router = Router::with_default_route();
    let mut group = c.benchmark_group("routing");

    for uri in ["/", "/welcome", "/users/edit/42.json"] {
        group.bench_with_input(BenchmarkId::new("resolve", uri), uri, |b, uri| {
            b.iter(|| black_box(router.resolve(black_box(uri))));
        });
    }

    group.finish();
}

// ========== Dispatch Benchmarks ==========

struct Catalog;

impl Resource for Catalog {
    fn index(&mut self, _cx: &mut Context<'_>) -> Result<Value> {
        Ok(json!([{"id": 1, "name": "widget"}, {"id": 2, "name": "gadget"}]))
    }
}

fn bench_dispatch(c: &mut Criterion) {
    let mut app = App::new(Config::default());
    app.handlers_mut()
        .register("", "welcome", || {
            FnController::new(|_: &str, cx: &mut Context<'_>| {
                cx.response_mut().set_body("hello, world!");
                Ok(())
            })
        })
        .register("", "catalog", || RestController::new(Catalog));

    let mut group = c.benchmark_group("dispatch");

    group.bench_function("internal_welcome", |b| {
        b.iter(|| black_box(app.execute(Request::factory(black_box("/welcome")))));
    });

    group.bench_function("internal_not_found", |b| {
        b.iter(|| black_box(app.execute(Request::factory(black_box("/missing")))));
    });

    for format in ["json", "xml"] {
        let uri = format!("/catalog.{}", format);
        group.bench_with_input(BenchmarkId::new("rest_index", format), &uri, |b, uri| {
            b.iter(|| black_box(app.execute(Request::factory(uri))));
        });
    }

    group.finish();
}

// ========== Response Parsing Benchmarks ==========

fn chunked_response(chunks: usize, size: usize) -> Vec<u8> {
    let mut wire = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n".to_vec();
    let chunk = vec![b'a'; size];
    for _ in 0..chunks {
        wire.extend_from_slice(format!("{:x}\r\n", size).as_bytes());
        wire.extend_from_slice(&chunk);
        wire.extend_from_slice(b"\r\n");
    }
    wire.extend_from_slice(b"0\r\n\r\n");
    wire
}

fn bench_response_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("response_parsing");

    for (chunks, size) in [(1usize, 1024usize), (64, 1024), (16, 64 * 1024)] {
        let wire = chunked_response(chunks, size);
        group.throughput(Throughput::Bytes(wire.len() as u64));
        group.bench_with_input(
            BenchmarkId::new("chunked", format!("{}x{}", chunks, size)),
            &wire,
            |b, wire| {
                b.iter(|| {
                    let mut parser = ResponseParser::new(false);
                    black_box(parser.parse(black_box(wire)).unwrap())
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_headers,
    bench_routing,
    bench_dispatch,
    bench_response_parsing
);
criterion_main!(benches);
