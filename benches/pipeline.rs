//! Benchmarks for the encpipe hot paths.
//!
//! Run with: `cargo bench`
//! View reports in: `target/criterion/report/index.html`

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;

use encpipe_lib::pipeline::{Pipeline, PipelineConfig};
use encpipe_lib::queue::{Block, BlockQueue};
use encpipe_lib::worker::{BlockTransform, XorTransform};

/// Benchmark the reference transform at a few block sizes.
fn bench_xor_transform(c: &mut Criterion) {
    let mut group = c.benchmark_group("xor_transform");
    for size in [64usize, 4096, 65536] {
        let input = vec![0xA5u8; size];
        let mut output = vec![0u8; size];
        let transform = XorTransform::new(0x6B);
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                transform.apply(black_box(&input), black_box(&mut output));
            });
        });
    }
    group.finish();
}

/// Benchmark raw queue operations without any locking.
fn bench_block_queue(c: &mut Criterion) {
    let mut group = c.benchmark_group("block_queue");
    let payload = [0x5Au8; 64];
    group.throughput(Throughput::Bytes(64));
    group.bench_function("push_pop_64b", |b| {
        let mut queue = BlockQueue::new(8, 64);
        b.iter(|| {
            let block = Block::copy_from(black_box(&payload)).unwrap();
            queue.push(block).unwrap();
            black_box(queue.pop());
        });
    });
    group.finish();
}

/// Benchmark a full write -> transform -> read round trip with concurrent
/// writer and reader, including pipeline startup and shutdown.
fn bench_pipeline_roundtrip(c: &mut Criterion) {
    const TOTAL: usize = 64 * 1024;

    let mut group = c.benchmark_group("pipeline_roundtrip");
    group.sample_size(20);
    group.throughput(Throughput::Bytes(TOTAL as u64));
    group.bench_function("64k_through_64b_blocks", |b| {
        let payload = vec![0xC3u8; TOTAL];
        b.iter(|| {
            let config = PipelineConfig { max_blocks: 8, max_block_len: 64, max_sessions: 1 };
            let pipeline =
                Pipeline::start(config, Box::new(XorTransform::new(0x6B))).unwrap();
            let session = pipeline.open().unwrap();

            std::thread::scope(|scope| {
                scope.spawn(|| {
                    for chunk in payload.chunks(64) {
                        session.write(chunk).unwrap();
                    }
                });

                let mut buf = [0u8; 64];
                let mut received = 0usize;
                while received < TOTAL {
                    match session.read(&mut buf).unwrap() {
                        0 => std::thread::yield_now(),
                        n => received += n,
                    }
                }
            });

            drop(session);
            pipeline.shutdown();
        });
    });
    group.finish();
}

criterion_group!(benches, bench_xor_transform, bench_block_queue, bench_pipeline_roundtrip);
criterion_main!(benches);
