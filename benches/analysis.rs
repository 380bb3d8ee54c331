//! Benchmarks for intraday analysis, batch scanning and similarity.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tickpoint::prelude::*;

/// Deterministic minute series; 240 ticks is one full session
fn generate_series(n: usize, seed: usize) -> TickSeries {
  let mut price = 10.0;
  let obs = (0..n)
    .map(|i| {
      let step = ((i * 7 + seed * 13) % 100) as f64 / 5000.0 - 0.0099;
      price = (price * (1.0 + step)).max(0.5);
      let volume = 1000.0 + ((i * 31 + seed) % 17) as f64 * 150.0;
      TickObservation::new(SessionTime::new_const(9, 30 + i as u16), price, volume, price * volume)
    })
    .collect();
  TickSeries::new(obs).unwrap()
}

fn generate_instruments(n: usize, points: usize) -> Vec<InstrumentSeries> {
  (0..n)
    .map(|k| {
      let change_percent = (0..points)
        .map(|i| (((i * (k + 3) + k * 11) % 41) as f64 - 20.0) / 4.0)
        .collect();
      InstrumentSeries { change_percent, ..InstrumentSeries::new(format!("SYM{k}")) }
    })
    .collect()
}

fn bench_single_pass(c: &mut Criterion) {
  let series = generate_series(240, 1);
  let context = InstrumentContext::new().with_limits(11.0, 9.0);
  let engine = EngineBuilder::new().with_all_defaults().build().unwrap();

  c.bench_function("analyze_sell_240_ticks", |b| {
    b.iter(|| {
      let _ = black_box(engine.analyze_sell(black_box(&series), &context, &[]));
    })
  });

  c.bench_function("analyze_both_240_ticks", |b| {
    b.iter(|| {
      let _ = black_box(engine.analyze_both(black_box(&series), &context, &[]));
    })
  });
}

fn bench_stagnation_with_peers(c: &mut Criterion) {
  let series = generate_series(240, 2);
  let peers: Vec<TickSeries> = (3..8).map(|seed| generate_series(240, seed)).collect();
  let context = InstrumentContext::new();
  let engine = EngineBuilder::new()
    .add(BuiltinDetector::Stagnation(StagnationDetector::with_defaults()))
    .build()
    .unwrap();

  c.bench_function("stagnation_5_peers", |b| {
    b.iter(|| {
      let _ = black_box(engine.analyze_sell(black_box(&series), &context, black_box(&peers)));
    })
  });
}

fn bench_parallel_scan(c: &mut Criterion) {
  let engine = EngineBuilder::new().with_all_defaults().build().unwrap();
  let context = InstrumentContext::new();
  let series: Vec<TickSeries> = (0..64).map(|seed| generate_series(240, seed)).collect();
  let symbols: Vec<String> = (0..series.len()).map(|i| format!("{:06}", 600000 + i)).collect();

  let instruments: Vec<(&str, &TickSeries, &InstrumentContext)> =
    symbols.iter().zip(&series).map(|(s, t)| (s.as_str(), t, &context)).collect();

  c.bench_function("scan_parallel_64_instruments", |b| {
    b.iter(|| {
      let _ = black_box(scan_parallel(black_box(&engine), Side::Buy, instruments.clone()));
    })
  });
}

fn bench_similarity_matrix(c: &mut Criterion) {
  let options = SimilarityOptions::default();
  let mut group = c.benchmark_group("similarity_matrix");

  for size in [10, 50, 100].iter() {
    let instruments = generate_instruments(*size, 240);

    group.bench_with_input(BenchmarkId::new("instruments", size), size, |b, _| {
      b.iter(|| {
        let _ = black_box(similarity_matrix(black_box(&instruments), &options));
      })
    });
  }

  group.finish();
}

criterion_group!(
  benches,
  bench_single_pass,
  bench_stagnation_with_peers,
  bench_parallel_scan,
  bench_similarity_matrix,
);

criterion_main!(benches);
