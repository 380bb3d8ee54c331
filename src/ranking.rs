//! Multi-factor ranking of a watch-list
//!
//! A candidate's score is the sum of independent sub-scores computed from its
//! daily bars plus an opaque concept-match score supplied from outside. The
//! scorer never classifies text itself; [`LexicalConceptMatcher`] is the
//! deterministic stand-in for callers without an external classifier.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{Period, Ratio};

// ============================================================
// INPUTS
// ============================================================

/// One trading day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyBar {
    /// `YYYYMMDD` or `YYYY-MM-DD`; only used for ordering and display
    pub date: String,
    pub open: f64,
    pub close: f64,
    pub pre_close: f64,
    #[serde(default)]
    pub volume: f64,
    #[serde(default)]
    pub turnover: f64,
}

impl DailyBar {
    /// Close-over-previous-close change, in percent; 0 without a previous close
    pub fn change_percent(&self) -> f64 {
        if self.pre_close > 0.0 {
            (self.close - self.pre_close) / self.pre_close * 100.0
        } else {
            0.0
        }
    }
}

/// Externally supplied concept-match result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConceptMatch {
    pub score: f64,
    pub matched_concepts: Vec<String>,
}

impl ConceptMatch {
    pub fn is_match(&self) -> bool {
        !self.matched_concepts.is_empty() || self.score > 0.0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RankingCandidate {
    pub symbol: String,
    pub name: Option<String>,
    /// Today's change, in percent; the tie-breaker
    pub change_percent: f64,
    /// Daily bars, oldest first
    pub history: Vec<DailyBar>,
    /// Concepts behind the instrument's recent move
    pub concepts: Vec<String>,
    /// None when the classifier was unavailable
    pub concept_match: Option<ConceptMatch>,
}

impl RankingCandidate {
    pub fn new(symbol: impl Into<String>, change_percent: f64) -> Self {
        Self {
            symbol: symbol.into(),
            change_percent,
            ..Self::default()
        }
    }

    pub fn with_history(mut self, history: Vec<DailyBar>) -> Self {
        self.history = history;
        self
    }
}

// ============================================================
// CONCEPT CLASSIFICATION
// ============================================================

/// Matches a candidate's concepts against today's hot concepts
pub trait ConceptClassifier: Send + Sync {
    fn classify(&self, concepts: &[String], hot_concepts: &[String]) -> ConceptMatch;
}

/// Substring match in either direction, case-sensitive
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LexicalConceptMatcher {
    /// Score awarded on any match
    pub bonus: f64,
}

impl Default for LexicalConceptMatcher {
    fn default() -> Self {
        Self { bonus: 1.0 }
    }
}

impl ConceptClassifier for LexicalConceptMatcher {
    fn classify(&self, concepts: &[String], hot_concepts: &[String]) -> ConceptMatch {
        let matched_concepts: Vec<String> = concepts
            .iter()
            .filter(|c| !c.is_empty())
            .filter(|c| {
                hot_concepts
                    .iter()
                    .any(|hot| !hot.is_empty() && (hot.contains(c.as_str()) || c.contains(hot.as_str())))
            })
            .cloned()
            .collect();
        ConceptMatch {
            score: if matched_concepts.is_empty() { 0.0 } else { self.bonus },
            matched_concepts,
        }
    }
}

/// Fill `concept_match` on every candidate from `classifier`.
pub fn classify_candidates<C: ConceptClassifier + ?Sized>(
    candidates: &mut [RankingCandidate],
    classifier: &C,
    hot_concepts: &[String],
) {
    candidates.par_iter_mut().for_each(|c| {
        c.concept_match = Some(classifier.classify(&c.concepts, hot_concepts));
    });
}

// ============================================================
// SCORER
// ============================================================

/// Per-factor outcome for one candidate
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBreakdown {
    pub uptrend: bool,
    pub second_wave: bool,
    pub no_limit_down: bool,
    pub concept: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedCandidate {
    pub candidate: RankingCandidate,
    pub score: f64,
    pub breakdown: ScoreBreakdown,
    pub max_score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RankingScorer {
    /// Bars per trend half
    pub trend_window: Period,
    /// Recent half must beat the prior half by this much
    pub trend_rise: Ratio,
    pub trend_bonus: f64,

    pub wave_window: Period,
    pub min_pullback: Ratio,
    pub max_pullback: Ratio,
    pub min_rebound: Ratio,
    /// Bars whose low anchors the rebound
    pub rebound_window: Period,
    /// The trough may not sit in this many final bars
    pub trough_exclusion: usize,
    pub wave_bonus: f64,

    pub limit_down_lookback: Period,
    /// Daily change at or below this counts as limit-down, in percent
    pub limit_down_percent: f64,
    pub no_limit_down_bonus: f64,

    /// Upper bound of the concept score, used for `max_score`
    pub concept_max: f64,
}

impl Default for RankingScorer {
    fn default() -> Self {
        Self {
            trend_window: Period::new_const(20),
            trend_rise: Ratio::new_const(0.02),
            trend_bonus: 1.0,
            wave_window: Period::new_const(30),
            min_pullback: Ratio::new_const(0.10),
            max_pullback: Ratio::new_const(0.30),
            min_rebound: Ratio::new_const(0.05),
            rebound_window: Period::new_const(5),
            trough_exclusion: 3,
            wave_bonus: 2.0,
            limit_down_lookback: Period::new_const(60),
            limit_down_percent: -9.8,
            no_limit_down_bonus: 1.0,
            concept_max: 1.0,
        }
    }
}

impl RankingScorer {
    pub fn max_score(&self) -> f64 {
        self.trend_bonus + self.wave_bonus + self.no_limit_down_bonus + self.concept_max
    }

    /// Mean close of the last window beats the window before it by `trend_rise`.
    pub fn is_uptrend(&self, bars: &[DailyBar]) -> bool {
        let w = self.trend_window.get();
        if bars.len() < 2 * w {
            return false;
        }
        let recent = &bars[bars.len() - w..];
        let prior = &bars[bars.len() - 2 * w..bars.len() - w];
        mean_close(recent) > mean_close(prior) * (1.0 + self.trend_rise.get())
    }

    /// Pullback from a recent peak, then a fresh rebound off the lows.
    pub fn is_second_wave(&self, bars: &[DailyBar]) -> bool {
        let w = self.wave_window.get();
        if bars.len() < w {
            return false;
        }
        let closes: Vec<f64> = bars[bars.len() - w..].iter().map(|b| b.close).collect();

        let Some(peak) = first_extreme(&closes, 0, |a, b| a > b) else {
            return false;
        };
        let Some(trough) = first_extreme(&closes, peak, |a, b| a < b) else {
            return false;
        };
        let (high, low) = (closes[peak], closes[trough]);
        if high <= 0.0 {
            return false;
        }
        let pullback = (high - low) / high;

        let tail_start = closes.len().saturating_sub(self.rebound_window.get());
        let recent_low = closes[tail_start..].iter().copied().fold(f64::INFINITY, f64::min);
        let Some(&current) = closes.last() else {
            return false;
        };
        if recent_low <= 0.0 {
            return false;
        }
        let rebound = (current - recent_low) / recent_low;

        pullback >= self.min_pullback.get()
            && pullback <= self.max_pullback.get()
            && rebound >= self.min_rebound.get()
            && trough + self.trough_exclusion < closes.len()
    }

    /// No limit-down day in the trailing lookback. False without history.
    pub fn has_no_limit_down(&self, bars: &[DailyBar]) -> bool {
        if bars.is_empty() {
            return false;
        }
        let start = bars.len().saturating_sub(self.limit_down_lookback.get());
        !bars[start..]
            .iter()
            .any(|b| b.change_percent() <= self.limit_down_percent)
    }

    pub fn breakdown(&self, candidate: &RankingCandidate) -> ScoreBreakdown {
        let bars = &candidate.history;
        if bars.is_empty() {
            tracing::warn!(symbol = %candidate.symbol, "no daily history, scoring concept only");
        }
        ScoreBreakdown {
            uptrend: self.is_uptrend(bars),
            second_wave: self.is_second_wave(bars),
            no_limit_down: self.has_no_limit_down(bars),
            concept: candidate
                .concept_match
                .as_ref()
                .map(|m| m.score)
                .filter(|s| s.is_finite())
                .unwrap_or(0.0),
        }
    }

    pub fn score(&self, breakdown: &ScoreBreakdown) -> f64 {
        let mut score = breakdown.concept;
        if breakdown.uptrend {
            score += self.trend_bonus;
        }
        if breakdown.second_wave {
            score += self.wave_bonus;
        }
        if breakdown.no_limit_down {
            score += self.no_limit_down_bonus;
        }
        score
    }

    /// Score every candidate and sort by score, then today's change, both
    /// descending. Equal keys keep input order.
    pub fn rank(&self, candidates: Vec<RankingCandidate>) -> Vec<RankedCandidate> {
        let max_score = self.max_score();
        let mut ranked: Vec<RankedCandidate> = candidates
            .into_par_iter()
            .map(|candidate| {
                let breakdown = self.breakdown(&candidate);
                RankedCandidate {
                    score: self.score(&breakdown),
                    candidate,
                    breakdown,
                    max_score,
                }
            })
            .collect();

        ranked.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then(b.candidate.change_percent.total_cmp(&a.candidate.change_percent))
        });
        tracing::trace!(candidates = ranked.len(), "ranking complete");
        ranked
    }
}

fn mean_close(bars: &[DailyBar]) -> f64 {
    if bars.is_empty() {
        return 0.0;
    }
    bars.iter().map(|b| b.close).sum::<f64>() / bars.len() as f64
}

/// First index at or after `from` whose value beats every other under `better`.
fn first_extreme(values: &[f64], from: usize, better: impl Fn(f64, f64) -> bool) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, &v) in values.iter().enumerate().skip(from) {
        if !v.is_finite() {
            continue;
        }
        match best {
            Some(b) if !better(v, values[b]) => {},
            _ => best = Some(i),
        }
    }
    best
}
