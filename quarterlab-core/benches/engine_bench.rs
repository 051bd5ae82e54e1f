//! Criterion benchmarks for QuarterLab hot paths.
//!
//! Benchmarks:
//! 1. Feature computation (declared indicators + helper columns)
//! 2. Signalize (features + confluence + entry rules)
//! 3. Simulator pass over a signalized frame

use chrono::{Duration, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use quarterlab_core::backtest::{simulate, SimulationParams};
use quarterlab_core::domain::Bar;
use quarterlab_core::engine::{add_features, signalize, FeatureConfig};
use quarterlab_core::spec::{CompiledStrategy, StrategySpec};

// ── Helpers ──────────────────────────────────────────────────────────

fn make_bars(n: usize) -> Vec<Bar> {
    let start = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
    (0..n)
        .map(|i| {
            let close = 1.1000 + (i as f64 * 0.05).sin() * 0.0080 + (i as f64 * 0.013).cos() * 0.0030;
            let open = close - 0.0002;
            Bar {
                timestamp: start + Duration::minutes(15 * i as i64),
                open,
                high: close + 0.0006,
                low: open - 0.0006,
                close,
                volume: 1_000.0,
            }
        })
        .collect()
}

fn strategy() -> CompiledStrategy {
    let doc = r#"{
      "name": "bench",
      "timeframe": "M15",
      "instruments": ["EURUSD"],
      "indicators": [
        {"name": "RSI", "params": {"period": 14}, "alias": "RSI_14"},
        {"name": "ATR", "params": {"period": 14}, "alias": "ATR_14"},
        {"name": "EMA", "params": {"period": 50}, "alias": "EMA_50"},
        {"name": "MACD", "params": {}, "alias": "MACD"},
        {"name": "QuarterGrid", "params": {"size_pips": 25, "pip_scale": 0.0001}, "alias": "QG"}
      ],
      "entries": [
        {"side": "LONG", "condition": "(RSI_14 < 35) and (Close > EMA_50) and (QG == 'Q1')", "session": "London"},
        {"side": "SHORT", "condition": "(RSI_14 > 65) and (Close < EMA_50) and MACD_hist < 0"}
      ],
      "exits": [{"type": "TP_SL", "params": {"tp_rr": 2.0, "sl_atr_mult": 1.5}}],
      "risk": {"fixed_fraction": 0.01, "max_positions": 1}
    }"#;
    match StrategySpec::from_json(doc).and_then(|s| s.compile()) {
        Ok(s) => s,
        Err(e) => panic!("bench strategy does not compile: {e}"),
    }
}

// ── 1. Features ──────────────────────────────────────────────────────

fn bench_features(c: &mut Criterion) {
    let mut group = c.benchmark_group("add_features");
    let strategy = strategy();
    let cfg = FeatureConfig::default();

    for &bar_count in &[1_000, 10_000] {
        let bars = make_bars(bar_count);
        group.bench_with_input(BenchmarkId::new("spec_plus_helpers", bar_count), &bar_count, |b, _| {
            b.iter(|| add_features(black_box(bars.clone()), &strategy, &cfg));
        });
    }
    group.finish();
}

// ── 2. Signalize ─────────────────────────────────────────────────────

fn bench_signalize(c: &mut Criterion) {
    let mut group = c.benchmark_group("signalize");
    let strategy = strategy();
    let cfg = FeatureConfig::default();

    for &bar_count in &[1_000, 10_000] {
        let bars = make_bars(bar_count);
        group.bench_with_input(BenchmarkId::new("two_rules", bar_count), &bar_count, |b, _| {
            b.iter(|| signalize(black_box(bars.clone()), &strategy, &cfg));
        });
    }
    group.finish();
}

// ── 3. Simulator ─────────────────────────────────────────────────────

fn bench_simulate(c: &mut Criterion) {
    let strategy = strategy();
    let frame = signalize(make_bars(10_000), &strategy, &FeatureConfig::default());
    let params = SimulationParams::from_strategy(&strategy);

    c.bench_function("simulate_10k", |b| {
        b.iter(|| simulate(black_box(&frame), black_box(&params)));
    });
}

criterion_group!(benches, bench_features, bench_signalize, bench_simulate);
criterion_main!(benches);
