//! Benchmarks for order book and queue operations.
//!
//! Run with: `cargo bench`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use bookstream::orderbook::{OrderBook, SharedOrderBook};
use bookstream::queue::UpdateQueue;
use bookstream::types::{Order, Side, Snapshot, Update, SCALE};

/// Book with `size` orders per side around a mid price of 1000
fn populated_snapshot(size: i64) -> Snapshot {
    let bids = (1..=size)
        .map(|i| Order::bid(i, (1000 - i % 50) * SCALE, SCALE))
        .collect();
    let asks = (1..=size)
        .map(|i| Order::ask(size + i, (1001 + i % 50) * SCALE, SCALE))
        .collect();
    Snapshot::new(0, bids, asks)
}

/// A create, a partial fill and a delete, cycling through fresh ids
fn update_for(sequence: u64, size: i64) -> Update {
    let id = 10 * size + sequence as i64;
    match sequence % 3 {
        1 => Update::new(sequence).with_create(Order::bid(id, 999 * SCALE, SCALE)),
        2 => Update::new(sequence).with_trade(id - 1, SCALE / 2),
        _ => Update::new(sequence).with_delete(id - 2),
    }
}

fn bench_apply(c: &mut Criterion) {
    let mut group = c.benchmark_group("orderbook_apply");

    for size in [10, 100, 1000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let mut book = OrderBook::from_snapshot(&populated_snapshot(size));
            let mut sequence = 0u64;

            b.iter(|| {
                sequence += 1;
                let update = update_for(sequence, size);
                black_box(book.apply(black_box(&update)).ok());
            });
        });
    }

    group.finish();
}

fn bench_initialize(c: &mut Criterion) {
    let mut group = c.benchmark_group("orderbook_initialize");

    for size in [100, 1000, 10_000].iter() {
        let snapshot = populated_snapshot(*size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &snapshot, |b, snapshot| {
            let mut book = OrderBook::new();
            b.iter(|| book.initialize(black_box(snapshot)));
        });
    }

    group.finish();
}

fn bench_reads(c: &mut Criterion) {
    let book = SharedOrderBook::new("BENCH");
    book.initialize(&populated_snapshot(1000));

    c.bench_function("shared_snapshot_1000", |b| {
        b.iter(|| black_box(book.snapshot()));
    });

    c.bench_function("shared_best_bid_1000", |b| {
        b.iter(|| black_box(book.best_bid()));
    });

    c.bench_function("shared_depth_10", |b| {
        b.iter(|| black_box(book.depth(Side::Ask, 10)));
    });
}

fn bench_queue(c: &mut Criterion) {
    let queue = UpdateQueue::new();

    c.bench_function("queue_enqueue_dequeue", |b| {
        let mut sequence = 0u64;
        b.iter(|| {
            sequence += 1;
            let _ = queue.try_enqueue(Update::new(sequence));
            black_box(queue.try_dequeue());
        });
    });
}

criterion_group!(benches, bench_apply, bench_initialize, bench_reads, bench_queue);
criterion_main!(benches);
