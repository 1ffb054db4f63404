//! Benchmark: dependency tracking and trigger fan-out.
//!
//! Measures:
//! - An effect re-running over N tracked keys after one write
//! - N effects subscribed to the same key, all re-run by one write
//! - Queued effects batched into a single flush

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use weft_core::{effect, flush_jobs, reactive, EffectOptions, ReactiveEffect, Target, Value};

fn wide_object(size: usize) -> Value {
    reactive(Target::object_from(
        (0..size).map(|i| (format!("k{i}"), Value::from(i))),
    ))
}

fn bench_rerun_over_keys(c: &mut Criterion) {
    let mut group = c.benchmark_group("rerun_over_keys");
    for size in [10usize, 100, 1000] {
        let state = wide_object(size);
        let reader = state.clone();
        let _effect = ReactiveEffect::new(move || {
            (0..size)
                .map(|i| reader.get(format!("k{i}")).as_f64().unwrap_or_default())
                .sum::<f64>()
        });

        let mut tick = 0u64;
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                tick += 1;
                state.set("k0", black_box(tick));
            })
        });
    }
    group.finish();
}

fn bench_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("fan_out");
    for subscribers in [1usize, 10, 100] {
        let state = wide_object(1);
        let effects: Vec<ReactiveEffect> = (0..subscribers)
            .map(|_| {
                let reader = state.clone();
                ReactiveEffect::new(move || reader.get("k0"))
            })
            .collect();

        let mut tick = 0u64;
        group.bench_with_input(
            BenchmarkId::from_parameter(subscribers),
            &subscribers,
            |b, _| {
                b.iter(|| {
                    tick += 1;
                    state.set("k0", black_box(tick));
                })
            },
        );
        drop(effects);
    }
    group.finish();
}

fn bench_batched_flush(c: &mut Criterion) {
    let state = wide_object(1);
    let effects: Vec<ReactiveEffect> = (0..50)
        .map(|_| {
            let reader = state.clone();
            effect(move || reader.get("k0"), EffectOptions::default().queued())
        })
        .collect();

    let mut tick = 0u64;
    c.bench_function("batched_flush_50", |b| {
        b.iter(|| {
            for _ in 0..10 {
                tick += 1;
                state.set("k0", tick);
            }
            flush_jobs().ok();
        })
    });
    drop(effects);
}

criterion_group!(benches, bench_rerun_over_keys, bench_fan_out, bench_batched_flush);
criterion_main!(benches);
