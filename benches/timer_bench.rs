use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::sync::mpsc;
use timed_callback_bridge::{TimedCallbackService, TimerConfig};

fn bench_blocking_zero(c: &mut Criterion) {
    let service = TimedCallbackService::new(TimerConfig::default()).unwrap();

    c.bench_function("run_blocking_0ms", |b| {
        b.iter(|| service.run_blocking(black_box(0), Some(|| ())).unwrap())
    });
}

fn bench_non_blocking_round_trip(c: &mut Criterion) {
    let service = TimedCallbackService::new(TimerConfig::default()).unwrap();

    c.bench_function("run_non_blocking_0ms_round_trip", |b| {
        b.iter(|| {
            let (tx, rx) = mpsc::channel();
            service
                .run_non_blocking(black_box(0), Some(move || tx.send(()).unwrap()))
                .unwrap();
            rx.recv().unwrap();
        })
    });
}

fn bench_scheduling_only(c: &mut Criterion) {
    let service = TimedCallbackService::new(TimerConfig::new().with_max_pending(1 << 20)).unwrap();

    c.bench_function("run_non_blocking_schedule", |b| {
        b.iter(|| service.run_non_blocking(black_box(1), Some(|| ())).unwrap())
    });

    service.shutdown();
}

criterion_group!(
    benches,
    bench_blocking_zero,
    bench_non_blocking_round_trip,
    bench_scheduling_only
);
criterion_main!(benches);
