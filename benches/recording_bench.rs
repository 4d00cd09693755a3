// benches/recording_bench.rs
//! Buffer append and flush throughput

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use keytrail::recording::{FlushWriter, RecordBuffer, RecordLayout};
use keytrail::{EventKind, EventRecord};
use serde_json::{Map, Value};

fn key_event(i: usize) -> EventRecord {
    let mut meta = Map::new();
    meta.insert("vk".to_string(), Value::from(i % 256));
    EventRecord::capture(EventKind::Keyboard, format!("k{}", i % 64), meta)
}

fn bench_append(c: &mut Criterion) {
    let buffer = RecordBuffer::new(100);
    let record = key_event(65);

    c.bench_function("buffer_append", |b| {
        b.iter(|| {
            let _ = black_box(buffer.append(record.clone()));
        })
    });
}

fn bench_flush(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let writer = FlushWriter::new(RecordLayout::new(dir.path()));

    let mut group = c.benchmark_group("flush");
    for shuffle in [false, true] {
        group.bench_function(if shuffle { "100_rows_shuffled" } else { "100_rows" }, |b| {
            b.iter_batched(
                || (0..100).map(key_event).collect::<Vec<_>>(),
                |records| writer.flush(records, shuffle).unwrap(),
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

criterion_group!(benches, bench_append, bench_flush);
criterion_main!(benches);
