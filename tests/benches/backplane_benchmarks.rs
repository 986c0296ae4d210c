//! # Backplane Benchmarks
//!
//! | Area | Operation | Target |
//! |------|-----------|--------|
//! | Buffer pool | rent + return, pooled tier | < 1µs |
//! | Wire codec | encode 1/16/128 message batch | < 50µs |
//! | Wire codec | parse sequenced frame | < 1µs |
//! | Publish path | in-process publish round trip | < 100µs |

use std::sync::Arc;
use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use backplane_bus::{MemoryPool, MessageBus};
use backplane_redis::{
    ConnectionState, InMemoryBackplane, InMemoryConnector, RedisMessageBus,
    RedisScaleoutConfiguration,
};
use backplane_types::{Message, ScaleoutBatch, SequencedFrame};

// ============================================================================
// Buffer pool
// ============================================================================

fn bench_buffer_pool(c: &mut Criterion) {
    let mut group = c.benchmark_group("buffer-pool");
    let pool = MemoryPool::new();

    for size in [64usize, 1024, 2000, 4096] {
        group.bench_with_input(BenchmarkId::new("alloc_free_byte", size), &size, |b, &size| {
            b.iter(|| {
                let buffer = pool.alloc_byte(black_box(size));
                pool.free_byte(buffer);
            })
        });
    }

    group.bench_function("pooled_writer_json", |b| {
        let value = serde_json::json!({"user": "alice", "text": "hello world", "n": 42});
        b.iter(|| {
            let mut writer = pool.writer();
            serde_json::to_writer(&mut writer, black_box(&value)).unwrap();
            black_box(writer.finish())
        })
    });

    group.finish();
}

// ============================================================================
// Wire codec
// ============================================================================

fn batch(len: usize) -> Vec<Message> {
    (0..len)
        .map(|i| {
            Message::new(
                "conn-1",
                "hub.chat",
                format!(r#"{{"n":{i},"text":"benchmark payload"}}"#).into_bytes(),
            )
        })
        .collect()
}

fn bench_wire_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("wire-codec");

    for len in [1usize, 16, 128] {
        let messages = batch(len);
        group.throughput(Throughput::Elements(len as u64));
        group.bench_with_input(BenchmarkId::new("encode_batch", len), &messages, |b, messages| {
            b.iter(|| black_box(ScaleoutBatch::encode(messages).unwrap()))
        });
    }

    let payload = SequencedFrame::format(123_456_789, &ScaleoutBatch::encode(&batch(16)).unwrap());
    group.bench_function("parse_frame", |b| {
        b.iter(|| black_box(SequencedFrame::parse(black_box(&payload)).unwrap().sequence))
    });

    group.finish();
}

// ============================================================================
// Publish path
// ============================================================================

fn bench_publish(c: &mut Criterion) {
    let mut group = c.benchmark_group("publish");
    group.measurement_time(Duration::from_secs(5));

    let runtime = tokio::runtime::Runtime::new().unwrap();
    let backplane = Arc::new(InMemoryBackplane::new());
    let bus = runtime.block_on(async {
        let bus = RedisMessageBus::with_connector(
            RedisScaleoutConfiguration::new("memory", "bench"),
            Arc::new(InMemoryConnector::new(backplane.clone())),
        )
        .unwrap();
        while bus.connection().state() != ConnectionState::Connected {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        bus
    });

    let message = batch(1).remove(0);
    group.bench_function("in_memory_round_trip", |b| {
        b.iter(|| runtime.block_on(bus.publish(message.clone())).unwrap())
    });

    runtime.block_on(bus.dispose());
    group.finish();
}

criterion_group!(benches, bench_buffer_pool, bench_wire_codec, bench_publish);
criterion_main!(benches);
