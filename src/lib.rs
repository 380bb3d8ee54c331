//! # tickpoint - intraday buy/sell point detection
//!
//! Heuristic signal detection over one trading day of minute ticks, plus
//! the relative tools that sit next to it: Pearson similarity between
//! instruments and multi-factor ranking of a watch-list.
//!
//! ## Quick Start
//!
//! ```rust
//! use tickpoint::prelude::*;
//!
//! let json = r#"{
//!     "09:30:00": { "NEW": 10.00, "VOL": 1200, "money": 12000 },
//!     "09:31:00": { "NEW": 10.05, "VOL": 900,  "money": 9045 }
//! }"#;
//! let series = TickSeries::from_json_str(json).unwrap();
//! let context = InstrumentContext::new().with_limits(11.0, 9.0);
//!
//! let engine = EngineBuilder::new().with_all_defaults().build().unwrap();
//!
//! let report = engine.analyze_sell(&series, &context, &[]).unwrap();
//! println!("{:?}: {:?}", report.summary.risk_level, report.summary.recommendations);
//! ```

pub mod cache;
pub mod config;
pub mod detectors;
pub mod multi_day;
pub mod params;
pub mod ranking;
pub mod series;
pub mod similarity;
pub mod summary;
pub mod window;

pub use series::{InstrumentContext, RawTick, SessionTime, TickObservation, TickSeries};
pub use summary::{AnalysisSummary, LimitRegime, RiskLevel, SignalAggregator, Wording};
pub use window::{Field, WindowAggregator, WindowBucket};

pub mod prelude {
    pub use crate::{
        // Caches
        cache::{BucketCache, TtlCache},
        // Configuration
        config::AnalysisConfig,
        // Detectors
        detectors::*,
        // Multi-session roll-up
        multi_day::{analyze_sessions, DangerPattern, MultiDayReport, SessionInput, TrendStrength},
        // Parameters
        params::{
            builtin_with_params, get_multiplier, get_period, get_ratio, ParamMeta, ParamType,
            ParameterizedDetector,
        },
        // Ranking
        ranking::{
            classify_candidates, ConceptClassifier, ConceptMatch, DailyBar, LexicalConceptMatcher,
            RankedCandidate, RankingCandidate, RankingScorer, ScoreBreakdown,
        },
        // Parallel
        scan_parallel,
        // Similarity
        similarity::{
            correlation_label, most_similar, pearson_correlation, similarity, similarity_matrix,
            CorrelationDirection, CorrelationLabel, CorrelationStrength, InstrumentSeries,
            SeriesField, SimilarPair, SimilarityOptions, SimilarityReport,
        },
        // Engine
        AnalysisEngine,
        AnalysisReport,
        AnalysisSummary,
        BuiltinDetector,
        DetectionInput,
        EngineBuilder,
        Field,
        InstrumentContext,
        LimitRegime,
        Multiplier,
        Period,
        Ratio,
        Result,
        RiskLevel,
        ScanError,
        ScanInput,
        ScanResult,
        SessionTime,
        Severity,
        Side,
        SignalAggregator,
        // Errors
        SignalError,
        SignalDetector,
        SignalEvent,
        SignalKind,
        TickObservation,
        TickSeries,
        WindowAggregator,
        WindowBucket,
        Wording,
    };
}

// ============================================================
// ERRORS
// ============================================================

pub type Result<T> = std::result::Result<T, SignalError>;

/// Errors surfaced by ingestion, configuration and the top-level analysis call.
///
/// Individual detectors never fail; they report no signal instead.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SignalError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid tick at index {index}: {reason}")]
    InvalidTick { index: usize, reason: &'static str },

    #[error("Tick at {time} is missing {field}")]
    MissingField { time: String, field: &'static str },

    #[error("Duplicate observation at {0}")]
    DuplicateTime(String),

    #[error("Invalid session time: {0}")]
    InvalidTime(String),

    #[error("Invalid value: {0}")]
    InvalidValue(&'static str),

    #[error("{field} = {value} out of range [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Invalid config: {0}")]
    InvalidConfig(String),
}

// ============================================================
// VALIDATED TYPES
// ============================================================

/// Fraction in range 0.0..=1.0 (0.01 == 1%)
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Ratio(f64);

impl Ratio {
    /// Create a new Ratio, validating the value is in [0.0, 1.0]
    pub fn new(value: f64) -> Result<Self> {
        if value.is_nan() || value.is_infinite() {
            return Err(SignalError::InvalidValue("Ratio cannot be NaN or infinite"));
        }
        if !(0.0..=1.0).contains(&value) {
            return Err(SignalError::OutOfRange {
                field: "Ratio",
                value,
                min: 0.0,
                max: 1.0,
            });
        }
        Ok(Self(value))
    }

    /// Create a Ratio from a compile-time constant (library internal use)
    #[doc(hidden)]
    pub const fn new_const(value: f64) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> f64 {
        self.0
    }
}

impl serde::Serialize for Ratio {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> serde::Deserialize<'de> for Ratio {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = f64::deserialize(d)?;
        Ratio::new(value).map_err(serde::de::Error::custom)
    }
}

/// Positive scale factor applied to a baseline (1.5 == 150% of average)
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Multiplier(f64);

impl Multiplier {
    pub fn new(value: f64) -> Result<Self> {
        if !value.is_finite() {
            return Err(SignalError::InvalidValue("Multiplier must be finite"));
        }
        if value <= 0.0 {
            return Err(SignalError::InvalidValue("Multiplier must be > 0"));
        }
        Ok(Self(value))
    }

    #[doc(hidden)]
    pub const fn new_const(value: f64) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> f64 {
        self.0
    }
}

impl serde::Serialize for Multiplier {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> serde::Deserialize<'de> for Multiplier {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = f64::deserialize(d)?;
        Multiplier::new(value).map_err(serde::de::Error::custom)
    }
}

/// Period (must be > 0)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Period(usize);

impl Period {
    /// Create a new Period, validating value is > 0
    pub fn new(value: usize) -> Result<Self> {
        if value == 0 {
            return Err(SignalError::InvalidValue("Period must be > 0"));
        }
        Ok(Self(value))
    }

    #[doc(hidden)]
    pub const fn new_const(value: usize) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> usize {
        self.0
    }
}

impl serde::Serialize for Period {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> serde::Deserialize<'de> for Period {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = usize::deserialize(d)?;
        Period::new(value).map_err(serde::de::Error::custom)
    }
}

// ============================================================
// SIGNALS
// ============================================================

/// Which side of a trade an analysis pass looks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Buy,
    Sell,
}

/// Qualitative strength of a signal
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Weak,
    Medium,
    Strong,
}

/// Chart marker for a signal kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Marker {
    pub symbol: &'static str,
    /// Degrees, clockwise
    pub rotation: u16,
    pub color: &'static str,
}

/// Closed set of detectable conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    // Sell side
    StagnationAtHighs,
    FirstPullback,
    WeakRebound,
    EndOfDayBreakdown,
    SuddenDropOnVolume,
    LimitUpOpened,
    // Buy side
    LowLevelBreakout,
    Acceleration,
    VolumeSurge,
    EndOfDayRush,
}

impl SignalKind {
    pub const SELL: [SignalKind; 6] = [
        SignalKind::StagnationAtHighs,
        SignalKind::FirstPullback,
        SignalKind::WeakRebound,
        SignalKind::EndOfDayBreakdown,
        SignalKind::SuddenDropOnVolume,
        SignalKind::LimitUpOpened,
    ];

    pub const BUY: [SignalKind; 4] = [
        SignalKind::LowLevelBreakout,
        SignalKind::Acceleration,
        SignalKind::VolumeSurge,
        SignalKind::EndOfDayRush,
    ];

    pub fn side(self) -> Side {
        match self {
            SignalKind::StagnationAtHighs
            | SignalKind::FirstPullback
            | SignalKind::WeakRebound
            | SignalKind::EndOfDayBreakdown
            | SignalKind::SuddenDropOnVolume
            | SignalKind::LimitUpOpened => Side::Sell,
            SignalKind::LowLevelBreakout
            | SignalKind::Acceleration
            | SignalKind::VolumeSurge
            | SignalKind::EndOfDayRush => Side::Buy,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SignalKind::StagnationAtHighs => "stagnation_at_highs",
            SignalKind::FirstPullback => "first_pullback",
            SignalKind::WeakRebound => "weak_rebound",
            SignalKind::EndOfDayBreakdown => "end_of_day_breakdown",
            SignalKind::SuddenDropOnVolume => "sudden_drop_on_volume",
            SignalKind::LimitUpOpened => "limit_up_opened",
            SignalKind::LowLevelBreakout => "low_level_breakout",
            SignalKind::Acceleration => "acceleration",
            SignalKind::VolumeSurge => "volume_surge",
            SignalKind::EndOfDayRush => "end_of_day_rush",
        }
    }

    /// Advice appended to the summary when this kind fires
    pub fn recommendation(self) -> &'static str {
        match self {
            SignalKind::StagnationAtHighs => "Heavy volume stalling at the high, consider closing the position",
            SignalKind::FirstPullback => "First pullback from the high, watch the downside",
            SignalKind::WeakRebound => "Rebound lacks volume, consider selling",
            SignalKind::EndOfDayBreakdown => "Late-session breakdown, weakness may carry into tomorrow",
            SignalKind::SuddenDropOnVolume => "Sudden drop on heavy volume, cut short-term exposure",
            SignalKind::LimitUpOpened => "Limit-up board opened on volume, beware of a pullback",
            SignalKind::LowLevelBreakout => "Volume breakout from a low base, consider buying",
            SignalKind::Acceleration => "Rally accelerating, momentum entry possible",
            SignalKind::VolumeSurge => "Intraday volume surge, short-term opportunity",
            SignalKind::EndOfDayRush => "Late-session accumulation, a higher open is likely",
        }
    }

    /// Short chart label
    pub fn label(self) -> &'static str {
        match self {
            SignalKind::StagnationAtHighs => "High stall",
            SignalKind::FirstPullback => "Pullback",
            SignalKind::WeakRebound => "Weak rebound",
            SignalKind::EndOfDayBreakdown => "Late breakdown",
            SignalKind::SuddenDropOnVolume => "Volume drop",
            SignalKind::LimitUpOpened => "Board opened",
            SignalKind::LowLevelBreakout => "Breakout",
            SignalKind::Acceleration => "Acceleration",
            SignalKind::VolumeSurge => "Volume surge",
            SignalKind::EndOfDayRush => "Late rush",
        }
    }

    pub fn marker(self) -> Marker {
        let (symbol, rotation, color) = match self {
            SignalKind::StagnationAtHighs => ("diamond", 0, "#ff4d4f"),
            SignalKind::FirstPullback => ("arrow", 180, "#fa8c16"),
            SignalKind::WeakRebound => ("circle", 0, "#722ed1"),
            SignalKind::EndOfDayBreakdown => ("rect", 0, "#eb2f96"),
            SignalKind::SuddenDropOnVolume => ("arrow", 180, "#f5222d"),
            SignalKind::LimitUpOpened => ("star", 0, "#faad14"),
            // Buy markers share one style
            _ => ("arrow", 0, "#52c41a"),
        };
        Marker {
            symbol,
            rotation,
            color,
        }
    }
}

impl std::fmt::Display for SignalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One detected condition
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalEvent {
    #[serde(rename = "type")]
    pub kind: SignalKind,
    pub time: SessionTime,
    pub price: f64,
    pub volume: f64,
    pub description: String,
    pub severity: Severity,
    /// Position in the source series
    pub source_index: usize,
}

impl SignalEvent {
    /// Event anchored at observation `index` of the series.
    pub fn at(
        kind: SignalKind,
        obs: &TickObservation,
        index: usize,
        severity: Severity,
        description: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            time: obs.time,
            price: obs.price,
            volume: obs.volume,
            description: description.into(),
            severity,
            source_index: index,
        }
    }
}

// ============================================================
// DETECTOR TRAIT
// ============================================================

/// Everything a detector may read during one pass
#[derive(Debug, Clone, Copy)]
pub struct DetectionInput<'a> {
    pub series: &'a TickSeries,
    pub context: &'a InstrumentContext,
    /// Buckets of `series`, computed once per pass
    pub buckets: &'a [WindowBucket],
    /// Same-concept instruments, used for confirmation only
    pub peers: &'a [TickSeries],
    pub aggregator: WindowAggregator,
}

/// A single intraday heuristic
pub trait SignalDetector: Send + Sync {
    fn kind(&self) -> SignalKind;

    /// Observations required before the detector runs at all
    fn min_observations(&self) -> usize;

    /// Whole window buckets required before the detector runs. The tick
    /// count this implies depends on the engine's window size.
    fn min_buckets(&self) -> usize {
        0
    }

    /// Pure evaluation. Returns every match in detection order, or nothing.
    fn detect(&self, input: &DetectionInput<'_>) -> Vec<SignalEvent>;

    fn validate_config(&self) -> Result<()> {
        Ok(())
    }

    fn side(&self) -> Side {
        self.kind().side()
    }
}

// ============================================================
// BUILTIN DETECTORS - generated via macro
// ============================================================

use detectors::*;

/// Macro to generate BuiltinDetector enum without boilerplate
macro_rules! define_builtin_detectors {
    (
        $(
            $variant:ident($detector:ty)
        ),* $(,)?
    ) => {
        /// All builtin detectors - enum dispatch, no vtable
        #[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
        #[serde(tag = "detector", rename_all = "snake_case")]
        pub enum BuiltinDetector {
            $($variant($detector)),*
        }

        impl BuiltinDetector {
            #[inline]
            pub fn detect(&self, input: &DetectionInput<'_>) -> Vec<SignalEvent> {
                match self {
                    $(Self::$variant(d) => SignalDetector::detect(d, input)),*
                }
            }

            #[inline]
            pub fn kind(&self) -> SignalKind {
                match self {
                    $(Self::$variant(d) => SignalDetector::kind(d)),*
                }
            }

            #[inline]
            pub fn min_observations(&self) -> usize {
                match self {
                    $(Self::$variant(d) => SignalDetector::min_observations(d)),*
                }
            }

            #[inline]
            pub fn min_buckets(&self) -> usize {
                match self {
                    $(Self::$variant(d) => SignalDetector::min_buckets(d)),*
                }
            }

            pub fn validate_config(&self) -> Result<()> {
                match self {
                    $(Self::$variant(d) => SignalDetector::validate_config(d)),*
                }
            }

            #[inline]
            pub fn side(&self) -> Side {
                self.kind().side()
            }
        }
    };
}

define_builtin_detectors! {
    // Sell side, in execution order
    Stagnation(StagnationDetector),
    FirstPullback(FirstPullbackDetector),
    WeakRebound(WeakReboundDetector),
    EndOfDayBreakdown(EndOfDayBreakdownDetector),
    SuddenDrop(SuddenDropDetector),
    LimitUpOpened(LimitUpOpenedDetector),

    // Buy side, in execution order
    LowLevelBreakout(LowLevelBreakoutDetector),
    Acceleration(AccelerationDetector),
    VolumeSurge(VolumeSurgeDetector),
    EndOfDayRush(EndOfDayRushDetector),
}

// ============================================================
// ANALYSIS ENGINE
// ============================================================

/// Engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub min_severity: Option<Severity>,
    /// Price distance treated as "at the limit" by the regime guard
    pub limit_tolerance: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_severity: None,
            limit_tolerance: detectors::helpers::LIMIT_TOLERANCE,
        }
    }
}

/// Result of one analysis pass
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    pub side: Side,
    pub events: Vec<SignalEvent>,
    pub summary: AnalysisSummary,
}

/// Runs registered detectors over a series and summarizes the result
pub struct AnalysisEngine {
    builtin: Vec<BuiltinDetector>,
    custom: Vec<Box<dyn SignalDetector>>,
    aggregator: WindowAggregator,
    summarizer: SignalAggregator,
    config: EngineConfig,
}

impl std::fmt::Debug for AnalysisEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalysisEngine")
            .field("builtin", &self.builtin)
            .field("custom", &self.custom.len())
            .field("aggregator", &self.aggregator)
            .field("config", &self.config)
            .finish()
    }
}

impl AnalysisEngine {
    pub fn builtin(&self) -> &[BuiltinDetector] {
        &self.builtin
    }

    /// Kinds of every registered detector in execution order (custom last)
    pub fn kinds(&self) -> Vec<SignalKind> {
        self.builtin
            .iter()
            .map(|d| d.kind())
            .chain(self.custom.iter().map(|d| d.kind()))
            .collect()
    }

    pub fn aggregator(&self) -> WindowAggregator {
        self.aggregator
    }

    /// Full pass for one side.
    ///
    /// Fails only when the series is empty; every other problem degrades to
    /// "no signal" for the detector concerned.
    pub fn analyze(
        &self,
        side: Side,
        series: &TickSeries,
        context: &InstrumentContext,
        peers: &[TickSeries],
    ) -> Result<AnalysisReport> {
        if series.is_empty() {
            tracing::warn!(symbol = ?context.symbol, "rejecting empty tick series");
            return Err(SignalError::InvalidInput("tick series is empty".into()));
        }
        if let Some(report) = self.limit_guard(side, series, context) {
            return Ok(report);
        }
        let buckets = self.aggregator.buckets(series);
        Ok(self.run(side, series, context, peers, &buckets))
    }

    /// Same as [`analyze`](Self::analyze) with precomputed buckets, for callers
    /// holding a [`cache::BucketCache`].
    pub fn analyze_with_buckets(
        &self,
        side: Side,
        series: &TickSeries,
        context: &InstrumentContext,
        peers: &[TickSeries],
        buckets: &[WindowBucket],
    ) -> Result<AnalysisReport> {
        if series.is_empty() {
            return Err(SignalError::InvalidInput("tick series is empty".into()));
        }
        if let Some(report) = self.limit_guard(side, series, context) {
            return Ok(report);
        }
        Ok(self.run(side, series, context, peers, buckets))
    }

    pub fn analyze_sell(
        &self,
        series: &TickSeries,
        context: &InstrumentContext,
        peers: &[TickSeries],
    ) -> Result<AnalysisReport> {
        self.analyze(Side::Sell, series, context, peers)
    }

    pub fn analyze_buy(
        &self,
        series: &TickSeries,
        context: &InstrumentContext,
        peers: &[TickSeries],
    ) -> Result<AnalysisReport> {
        self.analyze(Side::Buy, series, context, peers)
    }

    /// Buy and sell passes sharing one bucket computation.
    pub fn analyze_both(
        &self,
        series: &TickSeries,
        context: &InstrumentContext,
        peers: &[TickSeries],
    ) -> Result<(AnalysisReport, AnalysisReport)> {
        let buckets = self.aggregator.buckets(series);
        let buy = self.analyze_with_buckets(Side::Buy, series, context, peers, &buckets)?;
        let sell = self.analyze_with_buckets(Side::Sell, series, context, peers, &buckets)?;
        Ok((buy, sell))
    }

    // ===========================================
    // Internal helpers
    // ===========================================

    fn limit_guard(
        &self,
        side: Side,
        series: &TickSeries,
        context: &InstrumentContext,
    ) -> Option<AnalysisReport> {
        let regime = LimitRegime::guarding(side);
        let limit = match regime {
            LimitRegime::LimitUp => context.limit_up_price,
            LimitRegime::LimitDown => context.limit_down_price,
        }?;
        if !series.pinned_at(limit, self.config.limit_tolerance) {
            return None;
        }

        tracing::debug!(symbol = ?context.symbol, ?side, ?regime, "limit regime, skipping detectors");
        Some(AnalysisReport {
            side,
            events: Vec::new(),
            summary: self.summarizer.limit_regime(side),
        })
    }

    fn run(
        &self,
        side: Side,
        series: &TickSeries,
        context: &InstrumentContext,
        peers: &[TickSeries],
        buckets: &[WindowBucket],
    ) -> AnalysisReport {
        let input = DetectionInput {
            series,
            context,
            buckets,
            peers,
            aggregator: self.aggregator,
        };

        let mut events = Vec::new();

        // Fast path: enum dispatch
        for detector in self.builtin.iter().filter(|d| d.side() == side) {
            if series.len() < detector.min_observations() || buckets.len() < detector.min_buckets() {
                continue;
            }
            let found = detector.detect(&input);
            self.collect(&mut events, detector.kind(), found, context);
        }

        // Slow path: custom detectors (vtable)
        for detector in self.custom.iter().filter(|d| d.side() == side) {
            if series.len() < detector.min_observations() || buckets.len() < detector.min_buckets() {
                continue;
            }
            let found = detector.detect(&input);
            self.collect(&mut events, detector.kind(), found, context);
        }

        let summary = self.summarizer.summarize(side, &events);
        tracing::trace!(?side, signals = summary.signal_count, risk = ?summary.risk_level, "pass complete");
        AnalysisReport {
            side,
            events,
            summary,
        }
    }

    fn collect(
        &self,
        events: &mut Vec<SignalEvent>,
        kind: SignalKind,
        found: Vec<SignalEvent>,
        context: &InstrumentContext,
    ) {
        if !found.is_empty() {
            tracing::debug!(symbol = ?context.symbol, %kind, count = found.len(), "detector fired");
        }
        events.extend(found.into_iter().filter(|e| self.should_include(e)));
    }

    fn should_include(&self, e: &SignalEvent) -> bool {
        match self.config.min_severity {
            Some(min) => e.severity >= min,
            None => true,
        }
    }

    fn validate(&self) -> Result<()> {
        for d in &self.builtin {
            d.validate_config()?;
        }
        for d in &self.custom {
            d.validate_config()?;
        }
        Ok(())
    }
}

// ============================================================
// BUILDER
// ============================================================

/// Builder for creating AnalysisEngine instances
pub struct EngineBuilder {
    builtin: Vec<BuiltinDetector>,
    custom: Vec<Box<dyn SignalDetector>>,
    aggregator: WindowAggregator,
    summarizer: SignalAggregator,
    config: EngineConfig,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Generate an array of `BuiltinDetector` variants using `Default::default()` for each inner type.
macro_rules! builtin_defaults {
  ($($variant:ident),* $(,)?) => {
    [$(BuiltinDetector::$variant(Default::default())),*]
  };
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self {
            builtin: Vec::new(),
            custom: Vec::new(),
            aggregator: WindowAggregator::default(),
            summarizer: SignalAggregator::default(),
            config: EngineConfig::default(),
        }
    }

    /// Seed the builder from a loaded configuration.
    pub fn with_config(mut self, config: &AnalysisConfig) -> Self {
        self.aggregator = WindowAggregator::new(config.bucket_size);
        self.config.limit_tolerance = config.limit_tolerance;
        self.config.min_severity = config.min_severity;
        self.summarizer = SignalAggregator::new(config.wording);
        self.builtin.extend(config.detectors());
        self
    }

    /// Add every builtin detector with defaults
    pub fn with_all_defaults(self) -> Self {
        self.with_sell_defaults().with_buy_defaults()
    }

    /// Add the sell-side detectors with defaults, in execution order
    pub fn with_sell_defaults(mut self) -> Self {
        self.builtin.extend(builtin_defaults![
            Stagnation,
            FirstPullback,
            WeakRebound,
            EndOfDayBreakdown,
            SuddenDrop,
            LimitUpOpened,
        ]);
        self
    }

    /// Add the buy-side detectors with defaults, in execution order
    pub fn with_buy_defaults(mut self) -> Self {
        self.builtin.extend(builtin_defaults![
            LowLevelBreakout,
            Acceleration,
            VolumeSurge,
            EndOfDayRush,
        ]);
        self
    }

    /// Append a detector; it runs after everything already registered
    #[allow(clippy::should_implement_trait)]
    pub fn add(mut self, detector: BuiltinDetector) -> Self {
        self.builtin.push(detector);
        self
    }

    /// Add with config validation
    pub fn add_checked(mut self, detector: BuiltinDetector) -> Result<Self> {
        detector.validate_config()?;
        self.builtin.push(detector);
        Ok(self)
    }

    /// Add a custom detector (slow path). Custom detectors of a side run
    /// after every builtin detector of that side.
    pub fn add_custom<D: SignalDetector + 'static>(mut self, detector: D) -> Self {
        self.custom.push(Box::new(detector));
        self
    }

    pub fn bucket_size(mut self, size: Period) -> Self {
        self.aggregator = WindowAggregator::new(size);
        self
    }

    /// Drop events weaker than `severity`
    pub fn min_severity(mut self, severity: Severity) -> Self {
        self.config.min_severity = Some(severity);
        self
    }

    pub fn limit_tolerance(mut self, tolerance: f64) -> Self {
        self.config.limit_tolerance = tolerance;
        self
    }

    /// Build the engine
    pub fn build(self) -> Result<AnalysisEngine> {
        if !(self.config.limit_tolerance.is_finite() && self.config.limit_tolerance > 0.0) {
            return Err(SignalError::InvalidConfig(format!(
                "limit_tolerance must be positive, got {}",
                self.config.limit_tolerance
            )));
        }
        let engine = AnalysisEngine {
            builtin: self.builtin,
            custom: self.custom,
            aggregator: self.aggregator,
            summarizer: self.summarizer,
            config: self.config,
        };
        engine.validate()?;
        Ok(engine)
    }
}

// ============================================================
// PARALLEL SCANNING
// ============================================================

use config::AnalysisConfig;
use rayon::prelude::*;

/// Result of scanning a single instrument
#[derive(Debug)]
pub struct ScanResult {
    pub symbol: String,
    pub report: AnalysisReport,
}

/// Error from scanning a single instrument
#[derive(Debug)]
pub struct ScanError {
    pub symbol: String,
    pub error: SignalError,
}

/// One instrument of a batch scan.
///
/// `peers` feeds detectors that look for confirmation across related
/// instruments; it is empty unless set.
#[derive(Debug, Clone, Copy)]
pub struct ScanInput<'a> {
    pub symbol: &'a str,
    pub series: &'a TickSeries,
    pub context: &'a InstrumentContext,
    pub peers: &'a [TickSeries],
}

impl<'a> ScanInput<'a> {
    pub fn new(symbol: &'a str, series: &'a TickSeries, context: &'a InstrumentContext) -> Self {
        Self {
            symbol,
            series,
            context,
            peers: &[],
        }
    }

    pub fn with_peers(mut self, peers: &'a [TickSeries]) -> Self {
        self.peers = peers;
        self
    }
}

impl<'a> From<(&'a str, &'a TickSeries, &'a InstrumentContext)> for ScanInput<'a> {
    fn from((symbol, series, context): (&'a str, &'a TickSeries, &'a InstrumentContext)) -> Self {
        Self::new(symbol, series, context)
    }
}

impl<'a> From<(&'a str, &'a TickSeries, &'a InstrumentContext, &'a [TickSeries])> for ScanInput<'a> {
    fn from(
        (symbol, series, context, peers): (&'a str, &'a TickSeries, &'a InstrumentContext, &'a [TickSeries]),
    ) -> Self {
        Self::new(symbol, series, context).with_peers(peers)
    }
}

/// Parallel analysis of multiple instruments.
///
/// Items are `ScanInput`s or tuples convertible into one, with or without a
/// peers slice. Both output lists keep the relative order of `instruments`.
pub fn scan_parallel<'a, I>(
    engine: &AnalysisEngine,
    side: Side,
    instruments: I,
) -> (Vec<ScanResult>, Vec<ScanError>)
where
    I: IntoParallelIterator,
    I::Item: Into<ScanInput<'a>>,
{
    let results: Vec<_> = instruments
        .into_par_iter()
        .map(|item| {
            let input: ScanInput<'a> = item.into();
            engine
                .analyze(side, input.series, input.context, input.peers)
                .map(|report| ScanResult {
                    symbol: input.symbol.to_string(),
                    report,
                })
                .map_err(|error| ScanError {
                    symbol: input.symbol.to_string(),
                    error,
                })
        })
        .collect();

    let mut successes = Vec::new();
    let mut errors = Vec::new();

    for result in results {
        match result {
            Ok(r) => successes.push(r),
            Err(e) => errors.push(e),
        }
    }

    (successes, errors)
}

// ============================================================
// TESTS
// ============================================================
