//! Serde-loadable analysis configuration
//!
//! Every field defaults to the reference thresholds, so a config file only
//! needs the values it changes. Keys are camelCase at every level, detector
//! thresholds included:
//!
//! ```rust
//! use tickpoint::config::AnalysisConfig;
//!
//! let config = AnalysisConfig::from_json_str(r#"{
//!     "suddenDrop": { "drop": 0.02, "volumeMultiple": 2.5 },
//!     "disabled": ["end_of_day_rush"]
//! }"#).unwrap();
//! assert_eq!(config.sudden_drop.drop.get(), 0.02);
//! assert_eq!(config.sudden_drop.volume_multiple.get(), 2.5);
//! ```

use serde::{Deserialize, Serialize};

use crate::{
    detectors::{helpers::LIMIT_TOLERANCE, *},
    ranking::RankingScorer,
    summary::Wording,
    BuiltinDetector, Period, Result, Severity, SignalError, SignalKind,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AnalysisConfig {
    /// Observations per bucket
    pub bucket_size: Period,
    pub limit_tolerance: f64,
    pub min_severity: Option<Severity>,
    pub wording: Wording,
    /// Kinds left out of the engine
    pub disabled: Vec<SignalKind>,

    pub stagnation: StagnationDetector,
    pub first_pullback: FirstPullbackDetector,
    pub weak_rebound: WeakReboundDetector,
    pub end_of_day_breakdown: EndOfDayBreakdownDetector,
    pub sudden_drop: SuddenDropDetector,
    pub limit_up_opened: LimitUpOpenedDetector,

    pub low_level_breakout: LowLevelBreakoutDetector,
    pub acceleration: AccelerationDetector,
    pub volume_surge: VolumeSurgeDetector,
    pub end_of_day_rush: EndOfDayRushDetector,

    pub ranking: RankingScorer,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            bucket_size: Period::new_const(5),
            limit_tolerance: LIMIT_TOLERANCE,
            min_severity: None,
            wording: Wording::default(),
            disabled: Vec::new(),
            stagnation: StagnationDetector::default(),
            first_pullback: FirstPullbackDetector::default(),
            weak_rebound: WeakReboundDetector::default(),
            end_of_day_breakdown: EndOfDayBreakdownDetector::default(),
            sudden_drop: SuddenDropDetector::default(),
            limit_up_opened: LimitUpOpenedDetector::default(),
            low_level_breakout: LowLevelBreakoutDetector::default(),
            acceleration: AccelerationDetector::default(),
            volume_surge: VolumeSurgeDetector::default(),
            end_of_day_rush: EndOfDayRushDetector::default(),
            ranking: RankingScorer::default(),
        }
    }
}

impl AnalysisConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| SignalError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| SignalError::InvalidConfig(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.limit_tolerance.is_finite() && self.limit_tolerance > 0.0) {
            return Err(SignalError::InvalidConfig(format!(
                "limitTolerance must be positive, got {}",
                self.limit_tolerance
            )));
        }
        for detector in self.detectors() {
            detector.validate_config()?;
        }
        Ok(())
    }

    /// Enabled detectors, sell side then buy side, each in execution order
    pub fn detectors(&self) -> Vec<BuiltinDetector> {
        [
            BuiltinDetector::Stagnation(self.stagnation.clone()),
            BuiltinDetector::FirstPullback(self.first_pullback.clone()),
            BuiltinDetector::WeakRebound(self.weak_rebound.clone()),
            BuiltinDetector::EndOfDayBreakdown(self.end_of_day_breakdown.clone()),
            BuiltinDetector::SuddenDrop(self.sudden_drop.clone()),
            BuiltinDetector::LimitUpOpened(self.limit_up_opened.clone()),
            BuiltinDetector::LowLevelBreakout(self.low_level_breakout.clone()),
            BuiltinDetector::Acceleration(self.acceleration.clone()),
            BuiltinDetector::VolumeSurge(self.volume_surge.clone()),
            BuiltinDetector::EndOfDayRush(self.end_of_day_rush.clone()),
        ]
        .into_iter()
        .filter(|d| !self.disabled.contains(&d.kind()))
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EngineBuilder;

    #[test]
    fn test_empty_json_is_default() {
        let config = AnalysisConfig::from_json_str("{}").unwrap();
        assert_eq!(config.bucket_size.get(), 5);
        assert_eq!(config.detectors().len(), 10);
        assert_eq!(config.stagnation.max_amplitude.get(), 0.01);
        assert_eq!(config.volume_surge.window.get(), 10);
    }

    #[test]
    fn test_partial_override_and_disable() {
        let config = AnalysisConfig::from_json_str(
            r#"{
                "minSeverity": "medium",
                "endOfDayRush": { "notBefore": "14:45" },
                "disabled": ["end_of_day_rush", "stagnation_at_highs"]
            }"#,
        )
        .unwrap();
        assert_eq!(config.min_severity, Some(Severity::Medium));
        assert_eq!(config.detectors().len(), 8);
        assert_eq!(config.end_of_day_rush.not_before.to_string(), "14:45");
    }

    #[test]
    fn test_detector_keys_are_camel_case() {
        let config = AnalysisConfig::from_json_str(
            r#"{
                "lowLevelBreakout": { "earlyBreakout": 0.01, "minBuckets": 5 },
                "ranking": { "trendWindow": 10 }
            }"#,
        )
        .unwrap();
        assert_eq!(config.low_level_breakout.early_breakout.get(), 0.01);
        assert_eq!(config.low_level_breakout.min_buckets.get(), 5);
        assert_eq!(config.ranking.trend_window.get(), 10);

        let json = serde_json::to_value(&config).unwrap();
        assert!(json["stagnation"]["maxAmplitude"].is_number());
        assert!(json["stagnation"].get("max_amplitude").is_none());
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(AnalysisConfig::from_json_str(r#"{ "bucketSize": 0 }"#).is_err());
        assert!(AnalysisConfig::from_json_str(r#"{ "firstPullback": { "pullback": 1.5 } }"#).is_err());
        assert!(AnalysisConfig::from_json_str(r#"{ "limitTolerance": -1 }"#).is_err());
    }

    #[test]
    fn test_round_trip_feeds_builder() {
        let json = AnalysisConfig::default().to_json_string().unwrap();
        let config = AnalysisConfig::from_json_str(&json).unwrap();
        let engine = EngineBuilder::new().with_config(&config).build().unwrap();
        assert_eq!(engine.kinds().len(), 10);
    }
}
