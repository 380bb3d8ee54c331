//! Buy-side detectors
//!
//! Execution order: low-level breakout, acceleration, volume surge,
//! end-of-day rush. Each reports at most one event per pass.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::helpers::{
    mean_bucket_volume, mean_of, pct_change, prior_volume_mean, CLOSING_RUSH_START,
    EARLY_SESSION_END,
};
use crate::{
    params::{get_multiplier, get_period, get_ratio, ParamMeta, ParameterizedDetector},
    DetectionInput, Multiplier, Period, Ratio, Result, SessionTime, Severity, SignalDetector,
    SignalError, SignalEvent, SignalKind,
};

impl_with_defaults!(
    LowLevelBreakoutDetector,
    AccelerationDetector,
    VolumeSurgeDetector,
    EndOfDayRushDetector,
);

// ============================================================
// LOW-LEVEL BREAKOUT
// ============================================================

/// Three rising buckets closing above the prior two-bucket high on growing
/// turnover, without the trade size collapsing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LowLevelBreakoutDetector {
    pub min_buckets: Period,
    /// Buckets ending at or before this use the early thresholds
    pub early_session_end: SessionTime,
    pub early_breakout: Ratio,
    pub late_breakout: Ratio,
    /// Bucket volume against the day's mean bucket volume
    pub early_volume_multiple: Multiplier,
    pub late_volume_multiple: Multiplier,
    /// Floor on the step-over-step average trade size
    pub trade_size_floor: Ratio,
}

impl Default for LowLevelBreakoutDetector {
    fn default() -> Self {
        Self {
            min_buckets: Period::new_const(4),
            early_session_end: EARLY_SESSION_END,
            early_breakout: Ratio::new_const(0.008),
            late_breakout: Ratio::new_const(0.005),
            early_volume_multiple: Multiplier::new_const(2.0),
            late_volume_multiple: Multiplier::new_const(1.5),
            trade_size_floor: Ratio::new_const(0.95),
        }
    }
}

impl LowLevelBreakoutDetector {
    /// The pattern itself spans three buckets
    fn required_buckets(&self) -> usize {
        self.min_buckets.get().max(3)
    }
}

impl SignalDetector for LowLevelBreakoutDetector {
    fn kind(&self) -> SignalKind {
        SignalKind::LowLevelBreakout
    }

    /// Every bucket holds at least one tick
    fn min_observations(&self) -> usize {
        self.required_buckets()
    }

    fn min_buckets(&self) -> usize {
        self.required_buckets()
    }

    fn detect(&self, input: &DetectionInput<'_>) -> Vec<SignalEvent> {
        let buckets = input.buckets;
        if buckets.len() < self.required_buckets() {
            return Vec::new();
        }
        let day_avg = mean_bucket_volume(buckets);
        let floor = self.trade_size_floor.get();

        for i in 2..buckets.len() {
            let (b2, b1, b0) = (&buckets[i - 2], &buckets[i - 1], &buckets[i]);
            if !(b0.is_up() && b1.is_up() && b2.is_up()) {
                continue;
            }

            let early = b0.end_time <= self.early_session_end;
            let (min_breakout, volume_multiple) = if early {
                (self.early_breakout.get(), self.early_volume_multiple.get())
            } else {
                (self.late_breakout.get(), self.late_volume_multiple.get())
            };

            let prior_high = b1.high.max(b2.high);
            let breakout = pct_change(prior_high, b0.close);
            if breakout < min_breakout || b0.volume_sum < day_avg * volume_multiple {
                continue;
            }

            if !(b0.turnover_sum > b1.turnover_sum && b1.turnover_sum > b2.turnover_sum) {
                continue;
            }

            if !(b0.average_trade_size > b1.average_trade_size * floor
                && b1.average_trade_size > b2.average_trade_size * floor)
            {
                continue;
            }

            return vec![SignalEvent {
                kind: self.kind(),
                time: b0.end_time,
                price: b0.close,
                volume: b0.volume_sum,
                description: format!(
                    "Broke {:.2}% above the prior high {:.2} on {:.1}x average volume",
                    breakout * 100.0,
                    prior_high,
                    if day_avg > 0.0 { b0.volume_sum / day_avg } else { 0.0 }
                ),
                severity: Severity::Strong,
                source_index: b0.end_index,
            }];
        }
        Vec::new()
    }
}

// ============================================================
// ACCELERATION
// ============================================================

/// Minute-over-minute rise speeding up on expanding volume, in the latest
/// few observations only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AccelerationDetector {
    pub min_history: Period,
    /// Trailing observations scanned
    pub lookback: Period,
    /// Current rise against the previous rise
    pub acceleration: Multiplier,
    pub min_rise: Ratio,
    pub volume_period: Period,
    pub volume_multiple: Multiplier,
}

impl Default for AccelerationDetector {
    fn default() -> Self {
        Self {
            min_history: Period::new_const(30),
            lookback: Period::new_const(5),
            acceleration: Multiplier::new_const(1.5),
            min_rise: Ratio::new_const(0.003),
            volume_period: Period::new_const(5),
            volume_multiple: Multiplier::new_const(1.8),
        }
    }
}

impl SignalDetector for AccelerationDetector {
    fn kind(&self) -> SignalKind {
        SignalKind::Acceleration
    }

    fn min_observations(&self) -> usize {
        self.min_history.get()
    }

    fn detect(&self, input: &DetectionInput<'_>) -> Vec<SignalEvent> {
        let obs = input.series.observations();
        let n = obs.len();
        if n < self.min_history.get().max(3) {
            return Vec::new();
        }
        let start = n.saturating_sub(self.lookback.get()).max(self.volume_period.get()).max(2);

        (start..n)
            .find_map(|i| {
                let rise = pct_change(obs[i - 1].price, obs[i].price);
                let prev_rise = pct_change(obs[i - 2].price, obs[i - 1].price);
                let baseline = prior_volume_mean(obs, i, self.volume_period.get());
                let fires = rise > prev_rise * self.acceleration.get()
                    && rise >= self.min_rise.get()
                    && obs[i].volume > baseline * self.volume_multiple.get();
                fires.then(|| {
                    SignalEvent::at(
                        self.kind(),
                        &obs[i],
                        i,
                        Severity::Medium,
                        format!(
                            "Rise accelerating to {:.2}% per minute from {:.2}%",
                            rise * 100.0,
                            prev_rise * 100.0
                        ),
                    )
                })
            })
            .into_iter()
            .collect()
    }
}

// ============================================================
// VOLUME SURGE
// ============================================================

/// A 10-minute window rising on at least twice the preceding volume
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VolumeSurgeDetector {
    pub min_history: Period,
    /// Surge window, in observations
    pub window: Period,
    /// Observations before the window that form the volume baseline
    pub baseline: Period,
    pub min_rise: Ratio,
    pub volume_ratio: Multiplier,
}

impl Default for VolumeSurgeDetector {
    fn default() -> Self {
        Self {
            min_history: Period::new_const(15),
            window: Period::new_const(10),
            baseline: Period::new_const(20),
            min_rise: Ratio::new_const(0.008),
            volume_ratio: Multiplier::new_const(2.0),
        }
    }
}

impl SignalDetector for VolumeSurgeDetector {
    fn kind(&self) -> SignalKind {
        SignalKind::VolumeSurge
    }

    fn min_observations(&self) -> usize {
        self.min_history.get()
    }

    fn detect(&self, input: &DetectionInput<'_>) -> Vec<SignalEvent> {
        let obs = input.series.observations();
        let window = self.window.get();
        if obs.len() < self.min_history.get() || obs.len() <= window {
            return Vec::new();
        }

        (window..obs.len())
            .find_map(|i| {
                let first = i - window;
                let rise = pct_change(obs[first].price, obs[i].price);
                if rise < self.min_rise.get() {
                    return None;
                }

                let span = &obs[first..=i];
                let total: f64 = span.iter().map(|o| o.volume).sum();
                let avg = total / span.len() as f64;
                let history = &obs[first.saturating_sub(self.baseline.get())..first];
                let hist_avg = if history.is_empty() { avg } else { mean_of(history, |o| o.volume) };
                let denominator = hist_avg.max(avg * 0.1);
                let ratio = if denominator > 0.0 { avg / denominator } else { 0.0 };
                if ratio < self.volume_ratio.get() {
                    return None;
                }

                Some(SignalEvent {
                    volume: total,
                    ..SignalEvent::at(
                        self.kind(),
                        &obs[i],
                        i,
                        Severity::Medium,
                        format!(
                            "Up {:.2}% over {} minutes on {:.1}x volume",
                            rise * 100.0,
                            window,
                            ratio
                        ),
                    )
                })
            })
            .into_iter()
            .collect()
    }
}

// ============================================================
// END-OF-DAY RUSH
// ============================================================

/// Buying into the close: late ticks above the closing-window average on
/// double volume.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EndOfDayRushDetector {
    pub window: Period,
    /// Minimum observations inside the window
    pub min_window: Period,
    /// Trailing ticks of the window that are scanned
    pub scan_tail: Period,
    pub min_premium: Ratio,
    pub volume_multiple: Multiplier,
    pub not_before: SessionTime,
}

impl Default for EndOfDayRushDetector {
    fn default() -> Self {
        Self {
            window: Period::new_const(30),
            min_window: Period::new_const(20),
            scan_tail: Period::new_const(5),
            min_premium: Ratio::new_const(0.005),
            volume_multiple: Multiplier::new_const(2.0),
            not_before: CLOSING_RUSH_START,
        }
    }
}

impl SignalDetector for EndOfDayRushDetector {
    fn kind(&self) -> SignalKind {
        SignalKind::EndOfDayRush
    }

    fn min_observations(&self) -> usize {
        self.min_window.get()
    }

    fn detect(&self, input: &DetectionInput<'_>) -> Vec<SignalEvent> {
        let obs = input.series.observations();
        let start = obs.len().saturating_sub(self.window.get());
        let tail = &obs[start..];
        if tail.len() < self.min_window.get() {
            return Vec::new();
        }

        let avg_price = mean_of(tail, |o| o.price);
        let avg_volume = mean_of(tail, |o| o.volume);
        let price_floor = avg_price * (1.0 + self.min_premium.get());

        let from = tail.len().saturating_sub(self.scan_tail.get());
        tail.iter()
            .enumerate()
            .skip(from)
            .find(|(_, o)| {
                o.time >= self.not_before
                    && o.price >= price_floor
                    && o.volume > avg_volume * self.volume_multiple.get()
            })
            .map(|(k, o)| {
                SignalEvent::at(
                    self.kind(),
                    o,
                    start + k,
                    Severity::Weak,
                    format!(
                        "Late buying at {:.2}, {:.2}% above the closing average",
                        o.price,
                        pct_change(avg_price, o.price) * 100.0
                    ),
                )
            })
            .into_iter()
            .collect()
    }

    fn validate_config(&self) -> Result<()> {
        if self.min_window > self.window {
            return Err(SignalError::InvalidConfig(
                "end-of-day rush min_window exceeds window".into(),
            ));
        }
        Ok(())
    }
}

// ============================================================
// PARAMETER METADATA
// ============================================================

const LOW_LEVEL_BREAKOUT_PARAMS: &[ParamMeta] = &[
    ParamMeta::period("min_buckets", 4.0, (3.0, 8.0, 1.0), "Buckets required"),
    ParamMeta::ratio("early_breakout", 0.008, (0.002, 0.02, 0.002), "Breakout before 11:00"),
    ParamMeta::ratio("late_breakout", 0.005, (0.002, 0.02, 0.001), "Breakout after 11:00"),
    ParamMeta::multiplier("early_volume_multiple", 2.0, (1.0, 4.0, 0.5), "Early volume vs day mean"),
    ParamMeta::multiplier("late_volume_multiple", 1.5, (1.0, 4.0, 0.5), "Late volume vs day mean"),
    ParamMeta::ratio("trade_size_floor", 0.95, (0.8, 1.0, 0.05), "Trade size floor per step"),
];

const ACCELERATION_PARAMS: &[ParamMeta] = &[
    ParamMeta::period("min_history", 30.0, (10.0, 60.0, 10.0), "Observations required"),
    ParamMeta::period("lookback", 5.0, (3.0, 10.0, 1.0), "Trailing observations scanned"),
    ParamMeta::multiplier("acceleration", 1.5, (1.0, 3.0, 0.25), "Rise vs previous rise"),
    ParamMeta::ratio("min_rise", 0.003, (0.001, 0.01, 0.001), "Minimum one-minute rise"),
    ParamMeta::period("volume_period", 5.0, (3.0, 10.0, 1.0), "Volume baseline window"),
    ParamMeta::multiplier("volume_multiple", 1.8, (1.0, 3.0, 0.2), "Volume vs baseline"),
];

const VOLUME_SURGE_PARAMS: &[ParamMeta] = &[
    ParamMeta::period("min_history", 15.0, (11.0, 30.0, 1.0), "Observations required"),
    ParamMeta::period("window", 10.0, (5.0, 20.0, 5.0), "Surge window"),
    ParamMeta::period("baseline", 20.0, (10.0, 40.0, 10.0), "Volume baseline length"),
    ParamMeta::ratio("min_rise", 0.008, (0.002, 0.02, 0.002), "Rise over the window"),
    ParamMeta::multiplier("volume_ratio", 2.0, (1.5, 4.0, 0.5), "Window volume vs baseline"),
];

const END_OF_DAY_RUSH_PARAMS: &[ParamMeta] = &[
    ParamMeta::period("window", 30.0, (20.0, 60.0, 10.0), "Closing window length"),
    ParamMeta::period("min_window", 20.0, (10.0, 30.0, 5.0), "Observations required in window"),
    ParamMeta::period("scan_tail", 5.0, (1.0, 10.0, 1.0), "Trailing ticks scanned"),
    ParamMeta::ratio("min_premium", 0.005, (0.001, 0.02, 0.001), "Premium over window average"),
    ParamMeta::multiplier("volume_multiple", 2.0, (1.0, 4.0, 0.5), "Volume vs window average"),
];

impl ParameterizedDetector for LowLevelBreakoutDetector {
    fn param_meta() -> &'static [ParamMeta] {
        LOW_LEVEL_BREAKOUT_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        Ok(Self {
            min_buckets: get_period(params, "min_buckets", 4)?,
            early_breakout: get_ratio(params, "early_breakout", 0.008)?,
            late_breakout: get_ratio(params, "late_breakout", 0.005)?,
            early_volume_multiple: get_multiplier(params, "early_volume_multiple", 2.0)?,
            late_volume_multiple: get_multiplier(params, "late_volume_multiple", 1.5)?,
            trade_size_floor: get_ratio(params, "trade_size_floor", 0.95)?,
            ..Self::default()
        })
    }

    fn signal_kind() -> SignalKind {
        SignalKind::LowLevelBreakout
    }
}

impl ParameterizedDetector for AccelerationDetector {
    fn param_meta() -> &'static [ParamMeta] {
        ACCELERATION_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        Ok(Self {
            min_history: get_period(params, "min_history", 30)?,
            lookback: get_period(params, "lookback", 5)?,
            acceleration: get_multiplier(params, "acceleration", 1.5)?,
            min_rise: get_ratio(params, "min_rise", 0.003)?,
            volume_period: get_period(params, "volume_period", 5)?,
            volume_multiple: get_multiplier(params, "volume_multiple", 1.8)?,
        })
    }

    fn signal_kind() -> SignalKind {
        SignalKind::Acceleration
    }
}

impl ParameterizedDetector for VolumeSurgeDetector {
    fn param_meta() -> &'static [ParamMeta] {
        VOLUME_SURGE_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        Ok(Self {
            min_history: get_period(params, "min_history", 15)?,
            window: get_period(params, "window", 10)?,
            baseline: get_period(params, "baseline", 20)?,
            min_rise: get_ratio(params, "min_rise", 0.008)?,
            volume_ratio: get_multiplier(params, "volume_ratio", 2.0)?,
        })
    }

    fn signal_kind() -> SignalKind {
        SignalKind::VolumeSurge
    }
}

impl ParameterizedDetector for EndOfDayRushDetector {
    fn param_meta() -> &'static [ParamMeta] {
        END_OF_DAY_RUSH_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        Ok(Self {
            window: get_period(params, "window", 30)?,
            min_window: get_period(params, "min_window", 20)?,
            scan_tail: get_period(params, "scan_tail", 5)?,
            min_premium: get_ratio(params, "min_premium", 0.005)?,
            volume_multiple: get_multiplier(params, "volume_multiple", 2.0)?,
            ..Self::default()
        })
    }

    fn signal_kind() -> SignalKind {
        SignalKind::EndOfDayRush
    }
}

// ============================================================
// TESTS
// ============================================================
