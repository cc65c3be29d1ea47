//! Benchmarks for the CPI and Fibonacci pipelines.

use std::sync::atomic::AtomicBool;

use chrono::{Duration, NaiveDate};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use yacpi::prelude::*;

/// Generate realistic random bars
fn generate_bars(n: usize) -> Vec<Bar> {
  let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
  let mut bars = Vec::with_capacity(n);
  let mut price = 100.0;

  for i in 0..n {
    let change = ((i * 7 + 13) % 100) as f64 / 50.0 - 1.0; // Deterministic "random"
    let volatility = 0.5 + ((i * 37) % 17) as f64 / 4.0;

    let o = price;
    let c = price + change;
    let h = o.max(c) + volatility * 0.5;
    let l = o.min(c) - volatility * 0.5;

    // Weekdays only
    let date = start + Duration::days((i + 2 * (i / 5)) as i64);
    bars.push(Bar::new(date, o, h, l, c, 1_000));
    price = c;
  }

  bars
}

fn bench_cpi(c: &mut Criterion) {
  let bars = generate_bars(1000);

  let engine = EngineBuilder::new().build().unwrap();

  c.bench_function("scan_cpi_1000_bars", |b| {
    b.iter(|| {
      let _ = black_box(engine.scan_cpi(black_box(&bars)));
    })
  });
}

fn bench_fibonacci(c: &mut Criterion) {
  let bars = generate_bars(1000);

  let engine = EngineBuilder::new()
    .min_separation_bars(Period::new(3).unwrap())
    .retrace_filter(LevelFilter::all())
    .extension_filter(LevelFilter::all())
    .build()
    .unwrap();

  c.bench_function("scan_fibonacci_1000_bars", |b| {
    b.iter(|| {
      let _ = black_box(engine.scan_fibonacci(black_box("BENCH"), black_box(&bars)));
    })
  });
}

fn bench_scaling(c: &mut Criterion) {
  let engine = EngineBuilder::new().build().unwrap();

  let mut group = c.benchmark_group("scaling");

  for size in [100, 500, 1000, 5000, 10000].iter() {
    let bars = generate_bars(*size);

    group.bench_with_input(BenchmarkId::new("scan_symbol", size), size, |b, _| {
      b.iter(|| {
        let _ = black_box(engine.scan_symbol(black_box("BENCH"), black_box(&bars)));
      })
    });
  }

  group.finish();
}

fn bench_parallel_scan(c: &mut Criterion) {
  let bars1 = generate_bars(1000);
  let bars2 = generate_bars(1000);
  let bars3 = generate_bars(1000);
  let bars4 = generate_bars(1000);

  let engine = EngineBuilder::new().build().unwrap();
  let stop = AtomicBool::new(false);

  let instruments: Vec<(&str, &[Bar])> =
    vec![("SYM1", &bars1), ("SYM2", &bars2), ("SYM3", &bars3), ("SYM4", &bars4)];

  c.bench_function("parallel_scan_4_instruments", |b| {
    b.iter(|| {
      let _ = black_box(scan_parallel(black_box(&engine), black_box(instruments.clone()), &stop));
    })
  });
}

fn bench_swings(c: &mut Criterion) {
  let bars = generate_bars(1000);

  let engine = EngineBuilder::new().build().unwrap();

  c.bench_function("find_swings_1000_bars", |b| {
    b.iter(|| {
      let _ = black_box(engine.find_swings(black_box(&bars)));
    })
  });
}

criterion_group!(benches, bench_cpi, bench_fibonacci, bench_scaling, bench_parallel_scan, bench_swings,);

criterion_main!(benches);
