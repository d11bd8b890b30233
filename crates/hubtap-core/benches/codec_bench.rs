//! Criterion benchmarks for the hub protocol codec path.
//!
//! Measures the per-frame costs on the inbound hot path: frame delimiting,
//! catch-all classification, and dynamic value decoding. These run once per
//! server message, so regressions here show up directly as dispatch latency.
//!
//! Run with:
//! ```bash
//! cargo bench --package hubtap-core --bench codec_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use hubtap_core::protocol::frame::{self, FrameBuffer};
use hubtap_core::value::DynamicValue;
use hubtap_core::{CatchAllCodec, HubCodec, InvocationBinder, JsonHubCodec};

// ── Fixtures ──────────────────────────────────────────────────────────────────

/// Binder knowing one two-parameter method, like a client with a single
/// subscription.
struct SingleBinding;

impl InvocationBinder for SingleBinding {
    fn parameter_count(&self, target: &str) -> Option<usize> {
        (target == "ReportStatus").then_some(2)
    }
}

fn known_invocation_frame() -> Vec<u8> {
    let mut out = Vec::new();
    frame::write_frame(
        &mut out,
        br#"{"type":1,"target":"ReportStatus","arguments":["ok",200]}"#,
    );
    out
}

fn unknown_invocation_frame() -> Vec<u8> {
    let mut out = Vec::new();
    frame::write_frame(
        &mut out,
        br#"{"type":1,"target":"Telemetry","arguments":[{"cpu":0.93,"mem":1024},"node-7"]}"#,
    );
    out
}

fn nested_payload() -> &'static [u8] {
    br#"{"device":{"id":4711,"name":"relay","tags":["edge","eu-west"],"metrics":{"cpu":0.93,"mem":1024,"uptime":86400.5}},"reported":"2024-05-01T10:30:00Z"}"#
}

// ── Benchmark groups ──────────────────────────────────────────────────────────

/// Frame delimiting over a stream of buffered frames.
fn bench_frame_splitting(c: &mut Criterion) {
    let mut stream = Vec::new();
    for _ in 0..16 {
        stream.extend_from_slice(&known_invocation_frame());
    }

    c.bench_function("frame_split_16", |b| {
        b.iter(|| {
            let mut buf = FrameBuffer::new();
            buf.push(black_box(&stream));
            let mut count = 0;
            while let Some(frame) = buf.next_frame() {
                count += black_box(frame).len();
            }
            count
        })
    });
}

/// Catch-all classification for the two interesting cases: a bound target
/// that falls through, and an unbound one that reroutes.
fn bench_router(c: &mut Criterion) {
    let codec = CatchAllCodec::new(JsonHubCodec::new());
    let binder = SingleBinding;

    let known = known_invocation_frame();
    c.bench_function("router_pass_through", |b| {
        b.iter(|| {
            codec
                .try_parse_message(black_box(&known), &binder)
                .unwrap()
        })
    });

    let unknown = unknown_invocation_frame();
    c.bench_function("router_reroute", |b| {
        b.iter(|| {
            codec
                .try_parse_message(black_box(&unknown), &binder)
                .unwrap()
        })
    });
}

/// Dynamic value decode and encode of a realistic nested payload.
fn bench_value_model(c: &mut Criterion) {
    let payload = nested_payload();

    c.bench_function("value_decode_nested", |b| {
        b.iter(|| DynamicValue::decode(black_box(payload)).unwrap())
    });

    let decoded = DynamicValue::decode(payload).unwrap();
    c.bench_function("value_encode_nested", |b| {
        b.iter(|| black_box(&decoded).encode().unwrap())
    });
}

criterion_group!(benches, bench_frame_splitting, bench_router, bench_value_model);
criterion_main!(benches);
