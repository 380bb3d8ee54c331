//! Reduce one pass's signal events to a risk level and advice list

use serde::{Deserialize, Serialize};

use crate::{Side, SignalEvent, SignalKind};

/// Ordinal risk derived from the number of events
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

/// Price regime in which the normal detectors are not meaningful
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitRegime {
    /// Sealed at limit-up for the whole series
    LimitUp,
    /// Pinned at limit-down for the whole series
    LimitDown,
}

impl LimitRegime {
    /// The one limit that suspends a side's detectors: limit-up for
    /// selling, limit-down for buying.
    pub fn guarding(side: Side) -> Self {
        match side {
            Side::Sell => LimitRegime::LimitUp,
            Side::Buy => LimitRegime::LimitDown,
        }
    }
}

/// How much text a summary carries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Wording {
    /// One line per triggered detector plus the closing line
    #[default]
    Full,
    /// Closing line only
    Brief,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisSummary {
    pub risk_level: RiskLevel,
    pub signal_count: usize,
    pub recommendations: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit_regime: Option<LimitRegime>,
}

impl AnalysisSummary {
    pub fn has_signals(&self) -> bool {
        self.signal_count > 0
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SignalAggregator {
    wording: Wording,
}

impl SignalAggregator {
    pub fn new(wording: Wording) -> Self {
        Self { wording }
    }

    /// `>= 3` events is high risk, 2 medium, 1 or none low.
    pub fn risk_level(count: usize) -> RiskLevel {
        match count {
            0 | 1 => RiskLevel::Low,
            2 => RiskLevel::Medium,
            _ => RiskLevel::High,
        }
    }

    /// Summarize events that are already in detector execution order.
    ///
    /// A detector that fired several times contributes one recommendation.
    pub fn summarize(&self, side: Side, events: &[SignalEvent]) -> AnalysisSummary {
        let risk_level = Self::risk_level(events.len());

        let mut recommendations = Vec::new();
        if self.wording == Wording::Full {
            let mut seen: Vec<SignalKind> = Vec::new();
            for event in events {
                if !seen.contains(&event.kind) {
                    seen.push(event.kind);
                    recommendations.push(event.kind.recommendation().to_string());
                }
            }
        }
        recommendations.push(closing_line(side, risk_level, events.is_empty()).to_string());

        AnalysisSummary {
            risk_level,
            signal_count: events.len(),
            recommendations,
            limit_regime: None,
        }
    }

    /// Fixed result when the series sits all session on the limit that
    /// guards `side`.
    pub fn limit_regime(&self, side: Side) -> AnalysisSummary {
        let regime = LimitRegime::guarding(side);
        let (risk_level, text) = match side {
            Side::Sell => (
                RiskLevel::Low,
                "Sealed at limit-up all session, normal sell signals do not apply",
            ),
            Side::Buy => (RiskLevel::High, "Pinned at limit-down all session, do not buy"),
        };
        AnalysisSummary {
            risk_level,
            signal_count: 0,
            recommendations: vec![text.to_string()],
            limit_regime: Some(regime),
        }
    }
}

fn closing_line(side: Side, risk: RiskLevel, none: bool) -> &'static str {
    match (side, none, risk) {
        (Side::Sell, true, _) => "No clear sell signal, continue holding",
        (Side::Sell, false, RiskLevel::Low) => "Isolated sell signal, stay alert",
        (Side::Sell, false, RiskLevel::Medium) => "Several sell signals, consider reducing the position",
        (Side::Sell, false, RiskLevel::High) => "Multiple sell signals, consider exiting",
        (Side::Buy, true, _) => "No clear buy signal, no entry signal",
        (Side::Buy, false, RiskLevel::Low) => "Isolated buy signal, a small trial position at most",
        (Side::Buy, false, RiskLevel::Medium) => "Several buy signals, consider entering in batches",
        (Side::Buy, false, RiskLevel::High) => "Multiple buy signals, entry favoured",
    }
}
