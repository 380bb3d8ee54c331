//! Pearson similarity between instruments' intraday series
//!
//! Missing points are represented as `NaN` and dropped pairwise. Degenerate
//! inputs (fewer than two valid pairs, zero variance) correlate at exactly 0.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Default `min_similarity` for [`most_similar`]
pub const DEFAULT_MIN_SIMILARITY: u32 = 60;

/// Default daily limit move, in percent
pub const DEFAULT_LIMIT_MOVE_PERCENT: f64 = 10.0;

// ============================================================
// CORRELATION
// ============================================================

/// Population Pearson correlation over the paired prefix of `a` and `b`.
///
/// Pairs where either side is not finite are skipped. Always in `[-1, 1]`.
pub fn pearson_correlation(a: &[f64], b: &[f64]) -> f64 {
    let pairs: Vec<(f64, f64)> = valid_pairs(a, b).collect();
    if pairs.len() < 2 {
        return 0.0;
    }
    // Rounding in the mean would otherwise leave a constant side with a tiny variance
    let (x0, y0) = pairs[0];
    if pairs.iter().all(|p| p.0 == x0) || pairs.iter().all(|p| p.1 == y0) {
        return 0.0;
    }

    let n = pairs.len() as f64;
    let mean_a = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_b = pairs.iter().map(|p| p.1).sum::<f64>() / n;

    let (mut cov, mut var_a, mut var_b) = (0.0, 0.0, 0.0);
    for &(x, y) in &pairs {
        let (dx, dy) = (x - mean_a, y - mean_b);
        cov += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }

    let denominator = (var_a * var_b).sqrt();
    if denominator == 0.0 || !denominator.is_finite() {
        return 0.0;
    }
    let r = cov / denominator;
    if r.is_finite() {
        r.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

fn valid_pairs<'a>(a: &'a [f64], b: &'a [f64]) -> impl Iterator<Item = (f64, f64)> + 'a {
    a.iter()
        .zip(b)
        .map(|(&x, &y)| (x, y))
        .filter(|(x, y)| x.is_finite() && y.is_finite())
}

/// Qualitative strength of `|r|`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationStrength {
    None,
    VeryWeak,
    Weak,
    Moderate,
    Strong,
    ExtremelyStrong,
    /// Matrix diagonal only
    Perfect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationDirection {
    Positive,
    Negative,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrelationLabel {
    pub strength: CorrelationStrength,
    pub direction: CorrelationDirection,
    /// `round(|r| * 100)`
    pub similarity: u32,
}

impl CorrelationLabel {
    pub const PERFECT: CorrelationLabel = CorrelationLabel {
        strength: CorrelationStrength::Perfect,
        direction: CorrelationDirection::Positive,
        similarity: 100,
    };

    pub const NONE: CorrelationLabel = CorrelationLabel {
        strength: CorrelationStrength::None,
        direction: CorrelationDirection::None,
        similarity: 0,
    };
}

pub fn correlation_label(r: f64) -> CorrelationLabel {
    let r = if r.is_finite() { r.clamp(-1.0, 1.0) } else { 0.0 };
    let abs = r.abs();
    let strength = if abs >= 0.9 {
        CorrelationStrength::ExtremelyStrong
    } else if abs >= 0.8 {
        CorrelationStrength::Strong
    } else if abs >= 0.6 {
        CorrelationStrength::Moderate
    } else if abs >= 0.4 {
        CorrelationStrength::Weak
    } else if abs >= 0.2 {
        CorrelationStrength::VeryWeak
    } else {
        CorrelationStrength::None
    };
    let direction = if r > 0.0 {
        CorrelationDirection::Positive
    } else if r < 0.0 {
        CorrelationDirection::Negative
    } else {
        CorrelationDirection::None
    };
    CorrelationLabel {
        strength,
        direction,
        similarity: (abs * 100.0).round() as u32,
    }
}

/// Express percent changes as a share of the instrument's limit move.
pub fn normalize_change_percent(values: &[f64], limit_move_percent: f64) -> Vec<f64> {
    let limit = limit_move_percent.max(0.01);
    values.iter().map(|v| v / limit * 100.0).collect()
}

// ============================================================
// INSTRUMENT REPORTS
// ============================================================

/// One instrument's intraday series as fed to the similarity tools
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InstrumentSeries {
    pub symbol: String,
    pub prices: Vec<f64>,
    pub change_percent: Vec<f64>,
    pub prev_prices: Vec<f64>,
    pub prev_change_percent: Vec<f64>,
    /// Daily limit move in percent (10 for main board, 20 for growth boards)
    pub limit_move_percent: f64,
}

impl Default for InstrumentSeries {
    fn default() -> Self {
        Self {
            symbol: String::new(),
            prices: Vec::new(),
            change_percent: Vec::new(),
            prev_prices: Vec::new(),
            prev_change_percent: Vec::new(),
            limit_move_percent: DEFAULT_LIMIT_MOVE_PERCENT,
        }
    }
}

impl InstrumentSeries {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            ..Self::default()
        }
    }

    fn current(&self, options: &SimilarityOptions) -> Vec<f64> {
        self.select(options, &self.prices, &self.change_percent)
    }

    fn previous(&self, options: &SimilarityOptions) -> Vec<f64> {
        self.select(options, &self.prev_prices, &self.prev_change_percent)
    }

    fn select(&self, options: &SimilarityOptions, prices: &[f64], changes: &[f64]) -> Vec<f64> {
        match options.field {
            SeriesField::Prices => prices.to_vec(),
            SeriesField::ChangePercent if options.normalize => {
                normalize_change_percent(changes, self.limit_move_percent)
            },
            SeriesField::ChangePercent => changes.to_vec(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeriesField {
    Prices,
    ChangePercent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SimilarityOptions {
    pub field: SeriesField,
    /// Scale change percents by each instrument's limit move
    pub normalize: bool,
    pub include_previous: bool,
}

impl Default for SimilarityOptions {
    fn default() -> Self {
        Self {
            field: SeriesField::ChangePercent,
            normalize: true,
            include_previous: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviousSession {
    pub correlation: f64,
    #[serde(flatten)]
    pub label: CorrelationLabel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimilarityReport {
    pub symbol_a: String,
    pub symbol_b: String,
    pub correlation: f64,
    #[serde(flatten)]
    pub label: CorrelationLabel,
    pub previous: Option<PreviousSession>,
    /// Pairs where both sides were usable
    pub valid_points: usize,
    pub total_points: usize,
    /// False when either side had no points at all
    pub has_data: bool,
}

impl SimilarityReport {
    #[inline]
    pub fn similarity(&self) -> u32 {
        self.label.similarity
    }

    fn diagonal(series: &InstrumentSeries) -> Self {
        Self {
            symbol_a: series.symbol.clone(),
            symbol_b: series.symbol.clone(),
            correlation: 1.0,
            label: CorrelationLabel::PERFECT,
            previous: None,
            valid_points: 0,
            total_points: 0,
            has_data: true,
        }
    }
}

/// Compare two instruments' current (and optionally previous) sessions.
pub fn similarity(a: &InstrumentSeries, b: &InstrumentSeries, options: &SimilarityOptions) -> SimilarityReport {
    let (xa, xb) = (a.current(options), b.current(options));
    let total_points = xa.len().max(xb.len());

    if xa.is_empty() || xb.is_empty() {
        return SimilarityReport {
            symbol_a: a.symbol.clone(),
            symbol_b: b.symbol.clone(),
            correlation: 0.0,
            label: CorrelationLabel::NONE,
            previous: None,
            valid_points: 0,
            total_points,
            has_data: false,
        };
    }

    let correlation = pearson_correlation(&xa, &xb);
    let previous = options
        .include_previous
        .then(|| (a.previous(options), b.previous(options)))
        .filter(|(pa, pb)| !pa.is_empty() && !pb.is_empty())
        .map(|(pa, pb)| {
            let correlation = pearson_correlation(&pa, &pb);
            PreviousSession {
                correlation,
                label: correlation_label(correlation),
            }
        });

    SimilarityReport {
        symbol_a: a.symbol.clone(),
        symbol_b: b.symbol.clone(),
        correlation,
        label: correlation_label(correlation),
        previous,
        valid_points: valid_pairs(&xa, &xb).count(),
        total_points,
        has_data: true,
    }
}

// ============================================================
// BATCH
// ============================================================

/// Full pairwise matrix; the diagonal is fixed at "perfect".
///
/// Returns an empty matrix for fewer than two instruments.
pub fn similarity_matrix(
    instruments: &[InstrumentSeries],
    options: &SimilarityOptions,
) -> Vec<Vec<SimilarityReport>> {
    if instruments.len() < 2 {
        return Vec::new();
    }
    tracing::trace!(instruments = instruments.len(), "computing similarity matrix");

    instruments
        .par_iter()
        .enumerate()
        .map(|(i, a)| {
            instruments
                .iter()
                .enumerate()
                .map(|(j, b)| {
                    if i == j {
                        SimilarityReport::diagonal(a)
                    } else {
                        similarity(a, b, options)
                    }
                })
                .collect::<Vec<_>>()
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimilarPair {
    /// Indices into the input, `first < second`
    pub pair: (usize, usize),
    pub report: SimilarityReport,
}

/// Pairs at or above `min_similarity`, most similar first.
///
/// Ties keep input pair order. `top_k = None` returns every qualifying pair.
pub fn most_similar(
    instruments: &[InstrumentSeries],
    options: &SimilarityOptions,
    min_similarity: u32,
    top_k: Option<usize>,
) -> Vec<SimilarPair> {
    if instruments.len() < 2 {
        return Vec::new();
    }
    let n = instruments.len();
    let pairs: Vec<(usize, usize)> = (0..n).flat_map(|i| (i + 1..n).map(move |j| (i, j))).collect();

    let mut found: Vec<SimilarPair> = pairs
        .into_par_iter()
        .filter_map(|(i, j)| {
            let report = similarity(&instruments[i], &instruments[j], options);
            (report.similarity() >= min_similarity).then_some(SimilarPair { pair: (i, j), report })
        })
        .collect();

    found.sort_by(|a, b| b.report.similarity().cmp(&a.report.similarity()));
    if let Some(k) = top_k {
        found.truncate(k);
    }
    found
}
