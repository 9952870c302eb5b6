//! Benchmarks for the append path with a transport that accepts everything.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use pulse_appender::{
    AppenderBuilder, HttpAppender, Level, LogEvent, Transport, TransportError,
};

struct NullTransport;

impl Transport for NullTransport {
    fn send(&mut self, payload: &str) -> bool {
        black_box(payload);
        true
    }

    fn close(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}

fn appender(buffer_size: usize) -> HttpAppender {
    let now = Arc::new(AtomicU64::new(1_000_000));
    AppenderBuilder::new()
        .with_address("http://localhost:9999/json")
        .with_hostname("bench-host")
        .with_buffer_size(buffer_size)
        .with_flush_interval_ms(60_000)
        .build_with_transport(
            Box::new(NullTransport),
            Arc::new(move || now.load(Ordering::Relaxed)),
        )
        .expect("appender")
}

fn bench_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("append");
    group.throughput(Throughput::Elements(1));
    for buffer_size in [1, 100, 1_000] {
        let appender = appender(buffer_size);
        group.bench_with_input(
            BenchmarkId::new("info", buffer_size),
            &buffer_size,
            |b, _| {
                b.iter(|| {
                    appender.append(LogEvent::new("bench", Level::Info, "order placed"));
                })
            },
        );
    }
    let appender = appender(1_000);
    group.bench_function("escalated", |b| {
        b.iter(|| appender.append(LogEvent::new("bench", Level::Error, "payment failed")))
    });
    group.finish();
}

criterion_group!(benches, bench_append);
criterion_main!(benches);
