//! Benchmarks for the pending-queue hot path: insert/coalesce and the
//! per-cycle sort + drain.

use std::time::Duration;

use cadre_core::op::{Priority, SubmitOp, Visibility};
use cadre_core::queue::PendingQueue;
use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use web_time::Instant;

const PRIORITIES: [Priority; 3] = [Priority::High, Priority::Medium, Priority::Low];
const VISIBILITIES: [Visibility; 3] =
    [Visibility::Unknown, Visibility::Visible, Visibility::Hidden];

fn build_queue(n: usize) -> PendingQueue {
    let base = Instant::now();
    let mut queue = PendingQueue::new();
    for i in 0..n {
        let mut op = SubmitOp::new(format!("op-{i}"), || Ok(()))
            .priority(PRIORITIES[i % 3])
            .into_op(base + Duration::from_micros((i % 977) as u64), i as u64);
        op.visible = VISIBILITIES[i % 3];
        queue.insert(op, true);
    }
    queue
}

fn bench_drain(c: &mut Criterion) {
    let mut group = c.benchmark_group("drain_batch");
    for &n in &[100usize, 1_000, 10_000] {
        group.bench_function(format!("cap50_of_{n}"), |b| {
            b.iter_batched(
                || build_queue(n),
                |mut queue| queue.drain_batch(50, true),
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

fn bench_coalesce(c: &mut Criterion) {
    c.bench_function("coalesce_1000_into_10_slots", |b| {
        b.iter_batched(
            || (PendingQueue::new(), Instant::now()),
            |(mut queue, base)| {
                for i in 0..1_000u64 {
                    let op = SubmitOp::new(format!("slot-{}", i % 10), || Ok(()))
                        .into_op(base, i);
                    queue.insert(op, true);
                }
                queue
            },
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, bench_drain, bench_coalesce);
criterion_main!(benches);
