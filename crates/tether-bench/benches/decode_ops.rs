//! Criterion micro-benchmarks for result record decoding.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use tether_abi::decode_record;
use tether_bench::{record_image, RECORD_COUNT};
use tether_core::{MemoryModel, RecordLayout, RecordShape};

fn bench_decode(c: &mut Criterion, name: &str, shape: RecordShape, model: MemoryModel) {
    let (image, offsets) = record_image(shape, model, RECORD_COUNT);
    c.bench_function(name, |b| {
        b.iter(|| {
            for &off in &offsets {
                let _ = black_box(decode_record(&image, off, shape, model));
            }
        });
    });
}

fn bench_decode_value_wasm32(c: &mut Criterion) {
    bench_decode(c, "decode_value_wasm32_1k", RecordShape::Value, MemoryModel::WASM32);
}

fn bench_decode_tx_wasm32(c: &mut Criterion) {
    bench_decode(c, "decode_tx_wasm32_1k", RecordShape::Tx, MemoryModel::WASM32);
}

fn bench_decode_tx_wasm64(c: &mut Criterion) {
    bench_decode(c, "decode_tx_wasm64_1k", RecordShape::Tx, MemoryModel::WASM64);
}

fn bench_layout(c: &mut Criterion) {
    c.bench_function("record_layout_tx_wasm64", |b| {
        b.iter(|| black_box(RecordLayout::new(black_box(RecordShape::Tx), MemoryModel::WASM64)));
    });
}

criterion_group!(
    benches,
    bench_decode_value_wasm32,
    bench_decode_tx_wasm32,
    bench_decode_tx_wasm64,
    bench_layout
);
criterion_main!(benches);
