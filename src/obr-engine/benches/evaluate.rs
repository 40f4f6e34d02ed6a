// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Benchmarks for normalizing and evaluating model equations, alone and
//! as a parallel batch.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use obr_engine::{Env, SpecRow, evaluate, evaluate_rows, normalize};

const EQUATIONS: &[&str] = &[
    "@dlog(GDPM(-1)) * 0.5 + 0.3 * d(CONS)",
    "recode(date = @dateval(\"\"2023:02\"\"), 1, 0)",
    "@elem(PBRENT, 2009Q3) * ERUS^(-1)",
    "d(GDPM / CONS) + dlog(GDPM  /  CONS(-1))",
];

fn env() -> Env {
    let mut env = Env::with_date(202302);
    for base in ["GDPM", "CONS", "ERUS"] {
        env.set(base, 100.0);
        for lag in 1..=4 {
            env.set(obr_engine::lag_name(base, lag), 100.0 - lag as f64);
        }
    }
    env.set("PBRENT_2009Q3", 62.5);
    env
}

fn bench_normalize(c: &mut Criterion) {
    c.bench_function("normalize", |b| {
        b.iter(|| {
            for eqn in EQUATIONS {
                black_box(normalize(black_box(eqn)));
            }
        })
    });
}

fn bench_evaluate(c: &mut Criterion) {
    let env = env();
    let normalized: Vec<String> = EQUATIONS.iter().map(|e| normalize(e)).collect();

    let mut group = c.benchmark_group("evaluate");
    for (i, eqn) in normalized.iter().enumerate() {
        group.bench_with_input(BenchmarkId::from_parameter(i), eqn, |b, eqn| {
            b.iter(|| evaluate(black_box(eqn), &env))
        });
    }
    group.finish();
}

fn bench_batch(c: &mut Criterion) {
    let env = env();
    let mut group = c.benchmark_group("evaluate_rows");
    for size in [100usize, 1000] {
        let rows: Vec<SpecRow> = EQUATIONS
            .iter()
            .cycle()
            .take(size)
            .map(|e| SpecRow::new(e))
            .collect();
        group.bench_with_input(BenchmarkId::from_parameter(size), &rows, |b, rows| {
            b.iter(|| evaluate_rows(black_box(rows), &env))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_normalize, bench_evaluate, bench_batch);
criterion_main!(benches);
