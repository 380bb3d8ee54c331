//! Integration tests for the intraday analysis engine.
//!
//! Fixtures are hand-built minute series starting at 09:30.

use tickpoint::prelude::*;

fn minute(i: usize) -> SessionTime {
    SessionTime::new_const(9, 30 + i as u16)
}

/// `(price, volume, turnover factor)` per tick; turnover = price * volume * factor
fn series(ticks: &[(f64, f64, f64)]) -> TickSeries {
    let obs = ticks
        .iter()
        .enumerate()
        .map(|(i, &(p, v, k))| TickObservation::new(minute(i), p, v, p * v * k))
        .collect();
    TickSeries::new(obs).unwrap()
}

/// Six flat buckets: three quiet, then volume swelling while trade size shrinks
fn stagnation_ticks(last_factor: f64) -> Vec<(f64, f64, f64)> {
    let plan = [
        (100.0, 1.0),
        (100.0, 1.0),
        (100.0, 1.0),
        (150.0, 1.0),
        (300.0, 0.85),
        (1200.0, last_factor),
    ];
    plan.iter()
        .flat_map(|&(v, k)| std::iter::repeat((10.0, v, k)).take(5))
        .collect()
}

/// Twenty quiet ticks, then ten rising ticks on `volume`
fn surge_ticks(volume: f64) -> Vec<(f64, f64, f64)> {
    let mut ticks = vec![(10.0, 100.0, 1.0); 20];
    ticks.extend((1..=10).map(|j| (10.0 + 0.012 * j as f64, volume, 1.0)));
    ticks
}

fn engine_with(detector: BuiltinDetector) -> AnalysisEngine {
    EngineBuilder::new().add(detector).build().unwrap()
}

// ============================================================
// SELL SIDE
// ============================================================

#[test]
fn test_stagnation_fires_on_last_bucket() {
    let engine = engine_with(BuiltinDetector::Stagnation(StagnationDetector::default()));
    let s = series(&stagnation_ticks(0.7));

    let report = engine.analyze_sell(&s, &InstrumentContext::new(), &[]).unwrap();

    assert_eq!(report.events.len(), 1);
    let event = &report.events[0];
    assert_eq!(event.kind, SignalKind::StagnationAtHighs);
    assert_eq!(event.severity, Severity::Strong);
    assert_eq!(event.source_index, 29);
    assert_eq!(event.time.to_string(), "09:59");
    assert_eq!(event.volume, 6000.0);
    assert_eq!(report.summary.risk_level, RiskLevel::Low);
}

#[test]
fn test_stagnation_needs_shrinking_trade_size() {
    let engine = engine_with(BuiltinDetector::Stagnation(StagnationDetector::default()));
    let s = series(&stagnation_ticks(0.8));

    let report = engine.analyze_sell(&s, &InstrumentContext::new(), &[]).unwrap();
    assert!(report.events.is_empty());
}

#[test]
fn test_stagnation_peer_confirmation() {
    let engine = engine_with(BuiltinDetector::Stagnation(StagnationDetector::default()));
    let s = series(&stagnation_ticks(0.7));
    let context = InstrumentContext::new();

    let one_peer = [s.clone()];
    let report = engine.analyze_sell(&s, &context, &one_peer).unwrap();
    assert!(report.events.is_empty());

    let two_peers = [s.clone(), s.clone()];
    let report = engine.analyze_sell(&s, &context, &two_peers).unwrap();
    assert_eq!(report.events.len(), 1);
}

#[test]
fn test_sealed_limit_up_skips_sell_detectors() {
    let engine = EngineBuilder::new().with_all_defaults().build().unwrap();
    let s = series(&stagnation_ticks(0.7));
    let context = InstrumentContext::new().with_limits(10.0, 8.2);

    let report = engine.analyze_sell(&s, &context, &[]).unwrap();
    assert!(report.events.is_empty());
    assert_eq!(report.summary.limit_regime, Some(LimitRegime::LimitUp));
    assert_eq!(report.summary.risk_level, RiskLevel::Low);

    // Buy side is not guarded by limit-up
    let report = engine.analyze_buy(&s, &context, &[]).unwrap();
    assert!(report.summary.limit_regime.is_none());
}

#[test]
fn test_pinned_limit_down_blocks_buying() {
    let engine = EngineBuilder::new().with_all_defaults().build().unwrap();
    let s = series(&[(9.0, 500.0, 1.0); 40]);
    let context = InstrumentContext::new().with_limits(11.0, 9.0);

    let report = engine.analyze_buy(&s, &context, &[]).unwrap();
    assert_eq!(report.summary.limit_regime, Some(LimitRegime::LimitDown));
    assert_eq!(report.summary.risk_level, RiskLevel::High);
}

// ============================================================
// BUY SIDE
// ============================================================

#[test]
fn test_volume_surge_fires() {
    let engine = engine_with(BuiltinDetector::VolumeSurge(VolumeSurgeDetector::default()));
    let s = series(&surge_ticks(300.0));

    let report = engine.analyze_buy(&s, &InstrumentContext::new(), &[]).unwrap();

    assert_eq!(report.events.len(), 1);
    let event = &report.events[0];
    assert_eq!(event.kind, SignalKind::VolumeSurge);
    assert_eq!(event.source_index, 26);
    assert!((event.price - 10.084).abs() < 1e-9);
    // Whole window volume: four quiet ticks and seven surge ticks
    assert_eq!(event.volume, 2500.0);
}

#[test]
fn test_volume_surge_needs_volume() {
    let engine = engine_with(BuiltinDetector::VolumeSurge(VolumeSurgeDetector::default()));
    let s = series(&surge_ticks(120.0));

    let report = engine.analyze_buy(&s, &InstrumentContext::new(), &[]).unwrap();
    assert!(report.events.is_empty());
}

#[test]
fn test_sell_detectors_ignored_on_buy_pass() {
    let engine = EngineBuilder::new().with_sell_defaults().build().unwrap();
    let report = engine
        .analyze_buy(&series(&surge_ticks(300.0)), &InstrumentContext::new(), &[])
        .unwrap();
    assert!(report.events.is_empty());
    assert_eq!(report.summary.recommendations, vec!["No clear buy signal, no entry signal"]);
}

// ============================================================
// SUMMARY AND BATCH
// ============================================================

struct Fixed(SignalKind);

impl SignalDetector for Fixed {
    fn kind(&self) -> SignalKind {
        self.0
    }

    fn min_observations(&self) -> usize {
        1
    }

    fn detect(&self, input: &DetectionInput<'_>) -> Vec<SignalEvent> {
        let obs = input.series.observations();
        vec![SignalEvent::at(self.0, &obs[0], 0, Severity::Weak, "fixed")]
    }
}

#[test]
fn test_recommendations_follow_registration_order() {
    let engine = EngineBuilder::new()
        .add_custom(Fixed(SignalKind::LimitUpOpened))
        .add_custom(Fixed(SignalKind::FirstPullback))
        .add_custom(Fixed(SignalKind::WeakRebound))
        .build()
        .unwrap();

    let report = engine
        .analyze_sell(&series(&[(10.0, 100.0, 1.0); 3]), &InstrumentContext::new(), &[])
        .unwrap();

    assert_eq!(report.summary.risk_level, RiskLevel::High);
    assert_eq!(report.summary.recommendations.len(), 4);
    assert_eq!(report.summary.recommendations[0], SignalKind::LimitUpOpened.recommendation());
    assert_eq!(report.summary.recommendations[1], SignalKind::FirstPullback.recommendation());
    assert_eq!(report.summary.recommendations[2], SignalKind::WeakRebound.recommendation());
}

#[test]
fn test_scan_parallel_keeps_input_order() {
    let engine = engine_with(BuiltinDetector::VolumeSurge(VolumeSurgeDetector::default()));
    let surge = series(&surge_ticks(300.0));
    let quiet = series(&surge_ticks(100.0));
    let empty = TickSeries::default();
    let context = InstrumentContext::new();

    let instruments: Vec<(&str, &TickSeries, &InstrumentContext)> = vec![
        ("000001", &quiet, &context),
        ("000002", &empty, &context),
        ("000003", &surge, &context),
        ("000004", &quiet, &context),
    ];
    let (ok, failed) = scan_parallel(&engine, Side::Buy, instruments);

    let symbols: Vec<&str> = ok.iter().map(|r| r.symbol.as_str()).collect();
    assert_eq!(symbols, vec!["000001", "000003", "000004"]);
    assert_eq!(ok[1].report.summary.signal_count, 1);
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].symbol, "000002");
    assert!(matches!(failed[0].error, SignalError::InvalidInput(_)));
}

#[test]
fn test_scan_parallel_passes_peers() {
    let engine = engine_with(BuiltinDetector::Stagnation(StagnationDetector::default()));
    let s = series(&stagnation_ticks(0.7));
    let context = InstrumentContext::new();
    let one_peer = [s.clone()];
    let two_peers = [s.clone(), s.clone()];

    let instruments = vec![
        ScanInput::new("600001", &s, &context),
        ScanInput::new("600002", &s, &context).with_peers(&one_peer),
        ScanInput::new("600003", &s, &context).with_peers(&two_peers),
    ];
    let (ok, failed) = scan_parallel(&engine, Side::Sell, instruments);

    assert!(failed.is_empty());
    let counts: Vec<usize> = ok.iter().map(|r| r.report.summary.signal_count).collect();
    // No peers skips confirmation; one peer is short of the two required
    assert_eq!(counts, vec![1, 0, 1]);

    let tuples: Vec<(&str, &TickSeries, &InstrumentContext, &[TickSeries])> =
        vec![("600002", &s, &context, &one_peer[..])];
    let (ok, _) = scan_parallel(&engine, Side::Sell, tuples);
    assert_eq!(ok[0].report.summary.signal_count, 0);
}

#[test]
fn test_multi_day_rollup() {
    let engine = engine_with(BuiltinDetector::VolumeSurge(VolumeSurgeDetector::default()));
    let surge = series(&surge_ticks(300.0));
    let quiet = series(&surge_ticks(100.0));
    let sessions = [
        SessionInput::new("20240102", &quiet),
        SessionInput::new("20240103", &surge),
        SessionInput::new("20240104", &surge),
    ];

    let report = analyze_sessions(&engine, Side::Buy, &sessions, &InstrumentContext::new()).unwrap();

    assert_eq!(report.total_signals, 2);
    assert_eq!(report.pattern.consecutive_signal_days, 2);
    assert_eq!(report.pattern.trend_strength, TrendStrength::Strong);
    assert_eq!(report.pattern.key_day.as_deref(), Some("20240103"));
    assert_eq!(report.risk_level, RiskLevel::Low);
    assert_eq!(report.events[0].date, "20240104");
    assert_eq!(report.events[0].day_index, 2);

    let sell = analyze_sessions(&engine, Side::Sell, &sessions, &InstrumentContext::new()).unwrap();
    assert_eq!(sell.total_signals, 0);
    assert_eq!(sell.pattern.danger, Some(DangerPattern::Normal));
    assert_eq!(sell.risk_level, RiskLevel::Low);
}

// ============================================================
// INGESTION
// ============================================================

#[test]
fn test_vendor_json_ingestion() {
    let json = r#"{
        "09:31:00": { "NEW": "10.05", "VOL": 900, "money": 9045 },
        "09:30:00": { "NEW": 10.00, "VOL": 1200, "money": 12000 },
        "09:32:00": { "NEW": 10.02 }
    }"#;
    let s = TickSeries::from_json_str(json).unwrap();

    assert_eq!(s.len(), 3);
    assert_eq!(s.first().unwrap().time.to_string(), "09:30");
    assert_eq!(s.get(1).unwrap().price, 10.05);
    assert_eq!(s.last().unwrap().volume, 0.0);
}

#[test]
fn test_ingestion_rejects_missing_price() {
    let json = r#"{ "09:30:00": { "VOL": 100 } }"#;
    assert!(matches!(
        TickSeries::from_json_str(json),
        Err(SignalError::MissingField { .. })
    ));
}

#[test]
fn test_report_serializes() {
    let engine = engine_with(BuiltinDetector::VolumeSurge(VolumeSurgeDetector::default()));
    let report = engine
        .analyze_buy(&series(&surge_ticks(300.0)), &InstrumentContext::new(), &[])
        .unwrap();
    let json = serde_json::to_value(&report).unwrap();

    assert_eq!(json["events"][0]["type"], "volume_surge");
    assert_eq!(json["events"][0]["sourceIndex"], 26);
    assert_eq!(json["summary"]["riskLevel"], "low");
}
