//! Sell-side detectors
//!
//! Execution order: stagnation at highs, first pullback, weak rebound,
//! end-of-day breakdown, sudden drop on volume, limit-up opened.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::helpers::{
    self, mean_bucket_volume, mean_of, pct_change, prior_volume_mean, LATE_SESSION,
    LIMIT_TOLERANCE, PRICE_EPSILON,
};
use crate::{
    params::{
        get_count, get_multiplier, get_period, get_ratio, get_value, ParamMeta,
        ParameterizedDetector,
    },
    DetectionInput, Multiplier, Period, Ratio, Result, SessionTime, Severity, SignalDetector,
    SignalError, SignalEvent, SignalKind, WindowBucket,
};

impl_with_defaults!(
    StagnationDetector,
    FirstPullbackDetector,
    WeakReboundDetector,
    EndOfDayBreakdownDetector,
    SuddenDropDetector,
    LimitUpOpenedDetector,
);

// ============================================================
// STAGNATION AT HIGHS
// ============================================================

/// Three flat 5-minute buckets on swelling volume while the average trade
/// size shrinks: large holders distributing into retail bids.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StagnationDetector {
    /// Bucket range ceiling, `(high - low) / low`
    pub max_amplitude: Ratio,
    /// Range ceiling once the bucket ends at or after `late_session`
    pub late_max_amplitude: Ratio,
    pub late_session: SessionTime,
    /// Bucket-over-bucket volume step on a strong day
    pub volume_step: Multiplier,
    /// Bucket-over-bucket volume step when the day is up less than `strong_day_percent`
    pub weak_day_volume_step: Multiplier,
    pub strong_day_percent: f64,
    /// Bucket volume against the day's mean bucket volume
    pub day_volume_multiple: Multiplier,
    /// Required shrink of the average trade size per step
    pub trade_size_decline: Ratio,
    /// Peers that must show the same pattern when peers are supplied
    pub min_peer_confirmations: usize,
}

impl Default for StagnationDetector {
    fn default() -> Self {
        Self {
            max_amplitude: Ratio::new_const(0.01),
            late_max_amplitude: Ratio::new_const(0.015),
            late_session: LATE_SESSION,
            volume_step: Multiplier::new_const(1.5),
            weak_day_volume_step: Multiplier::new_const(2.0),
            strong_day_percent: 5.0,
            day_volume_multiple: Multiplier::new_const(3.0),
            trade_size_decline: Ratio::new_const(0.10),
            min_peer_confirmations: 2,
        }
    }
}

impl StagnationDetector {
    fn is_flat(&self, buckets: &[WindowBucket], j: usize, max_amplitude: f64) -> bool {
        let bucket = &buckets[j];
        if bucket.amplitude() > max_amplitude {
            return false;
        }
        // No breakout above the two preceding buckets
        let prior_high = buckets[j.saturating_sub(2)..j]
            .iter()
            .map(|b| b.high)
            .fold(f64::NEG_INFINITY, f64::max);
        prior_high == f64::NEG_INFINITY || bucket.close <= prior_high
    }

    fn peers_confirm(&self, input: &DetectionInput<'_>, index: usize) -> bool {
        if input.peers.is_empty() {
            return true;
        }
        let confirmations = input
            .peers
            .iter()
            .filter(|peer| {
                let buckets = input.aggregator.buckets(peer);
                let day_avg = mean_bucket_volume(&buckets);
                buckets.get(index).is_some_and(|b| {
                    b.amplitude() <= self.max_amplitude.get()
                        && b.volume_sum >= day_avg * self.day_volume_multiple.get()
                })
            })
            .count();
        confirmations >= self.min_peer_confirmations
    }
}

impl SignalDetector for StagnationDetector {
    fn kind(&self) -> SignalKind {
        SignalKind::StagnationAtHighs
    }

    /// Every bucket holds at least one tick
    fn min_observations(&self) -> usize {
        3
    }

    fn min_buckets(&self) -> usize {
        3
    }

    fn detect(&self, input: &DetectionInput<'_>) -> Vec<SignalEvent> {
        let buckets = input.buckets;
        if buckets.len() < 3 {
            return Vec::new();
        }

        let day_avg = mean_bucket_volume(buckets);
        let step = if input.context.change_percent >= self.strong_day_percent {
            self.volume_step.get()
        } else {
            self.weak_day_volume_step.get()
        };
        let keep = 1.0 - self.trade_size_decline.get();

        for i in 2..buckets.len() {
            let (b2, b1, b0) = (&buckets[i - 2], &buckets[i - 1], &buckets[i]);

            let max_amplitude = if b0.end_time >= self.late_session {
                self.late_max_amplitude.get()
            } else {
                self.max_amplitude.get()
            };
            if !(i - 2..=i).all(|j| self.is_flat(buckets, j, max_amplitude)) {
                continue;
            }

            if b0.volume_sum < b1.volume_sum * step
                || b0.volume_sum < day_avg * self.day_volume_multiple.get()
            {
                continue;
            }

            if !(b0.average_trade_size < b1.average_trade_size * keep
                && b1.average_trade_size < b2.average_trade_size * keep)
            {
                continue;
            }

            if !self.peers_confirm(input, i) {
                continue;
            }

            return vec![SignalEvent {
                kind: self.kind(),
                time: b0.end_time,
                price: b0.close,
                volume: b0.volume_sum,
                description: format!(
                    "Stalling at {:.2} on {:.1}x volume while trade size shrinks",
                    b0.close,
                    if b1.volume_sum > 0.0 { b0.volume_sum / b1.volume_sum } else { 0.0 }
                ),
                severity: Severity::Strong,
                source_index: b0.end_index,
            }];
        }
        Vec::new()
    }

    fn validate_config(&self) -> Result<()> {
        if !self.strong_day_percent.is_finite() {
            return Err(SignalError::InvalidConfig(
                "stagnation strong_day_percent must be finite".into(),
            ));
        }
        if self.late_max_amplitude < self.max_amplitude {
            return Err(SignalError::InvalidConfig(
                "stagnation late_max_amplitude must not be below max_amplitude".into(),
            ));
        }
        Ok(())
    }
}

// ============================================================
// FIRST PULLBACK
// ============================================================

/// First point after the day's high that gives back `pullback`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FirstPullbackDetector {
    pub pullback: Ratio,
}

impl Default for FirstPullbackDetector {
    fn default() -> Self {
        Self {
            pullback: Ratio::new_const(0.01),
        }
    }
}

impl SignalDetector for FirstPullbackDetector {
    fn kind(&self) -> SignalKind {
        SignalKind::FirstPullback
    }

    fn min_observations(&self) -> usize {
        2
    }

    fn detect(&self, input: &DetectionInput<'_>) -> Vec<SignalEvent> {
        let obs = input.series.observations();
        let Some((peak, index)) = helpers::first_pullback(obs, self.pullback.get()) else {
            return Vec::new();
        };
        let high = obs[peak].price;
        let drop = -pct_change(high, obs[index].price);

        vec![SignalEvent::at(
            self.kind(),
            &obs[index],
            index,
            Severity::Medium,
            format!("Down {:.2}% from the day high {:.2}", drop * 100.0, high),
        )]
    }
}

// ============================================================
// WEAK REBOUND
// ============================================================

/// After the first pullback, the first bounce off the low that trades
/// thinner than the day's high did.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WeakReboundDetector {
    pub pullback: Ratio,
    /// Bounce off the post-pullback low
    pub rebound: Ratio,
}

impl Default for WeakReboundDetector {
    fn default() -> Self {
        Self {
            pullback: Ratio::new_const(0.01),
            rebound: Ratio::new_const(0.01),
        }
    }
}

impl SignalDetector for WeakReboundDetector {
    fn kind(&self) -> SignalKind {
        SignalKind::WeakRebound
    }

    fn min_observations(&self) -> usize {
        3
    }

    fn detect(&self, input: &DetectionInput<'_>) -> Vec<SignalEvent> {
        let obs = input.series.observations();
        let Some((peak, pullback)) = helpers::first_pullback(obs, self.pullback.get()) else {
            return Vec::new();
        };

        // First occurrence of the low from the pullback on
        let trough = (pullback..obs.len()).fold(pullback, |best, i| {
            if obs[i].price < obs[best].price {
                i
            } else {
                best
            }
        });
        let target = obs[trough].price * (1.0 + self.rebound.get());

        let Some(index) = (trough + 1..obs.len()).find(|&i| obs[i].price >= target) else {
            return Vec::new();
        };
        let peak_volume = obs[peak].volume;
        if obs[index].volume >= peak_volume {
            return Vec::new();
        }

        vec![SignalEvent::at(
            self.kind(),
            &obs[index],
            index,
            Severity::Strong,
            format!(
                "Rebound of {:.2}% off {:.2} on volume {:.0} below the high's {:.0}",
                pct_change(obs[trough].price, obs[index].price) * 100.0,
                obs[trough].price,
                obs[index].volume,
                peak_volume
            ),
        )]
    }
}

// ============================================================
// END-OF-DAY BREAKDOWN
// ============================================================

/// Closing-window ticks trading below the window average on heavy volume
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EndOfDayBreakdownDetector {
    /// Closing window length
    pub window: Period,
    /// Discount to the window average price
    pub price_discount: Ratio,
    pub volume_multiple: Multiplier,
}

impl Default for EndOfDayBreakdownDetector {
    fn default() -> Self {
        Self {
            window: Period::new_const(30),
            price_discount: Ratio::new_const(0.01),
            volume_multiple: Multiplier::new_const(1.2),
        }
    }
}

impl SignalDetector for EndOfDayBreakdownDetector {
    fn kind(&self) -> SignalKind {
        SignalKind::EndOfDayBreakdown
    }

    fn min_observations(&self) -> usize {
        2
    }

    fn detect(&self, input: &DetectionInput<'_>) -> Vec<SignalEvent> {
        let obs = input.series.observations();
        let start = obs.len().saturating_sub(self.window.get());
        let tail = &obs[start..];

        let avg_price = mean_of(tail, |o| o.price);
        let avg_volume = mean_of(tail, |o| o.volume);
        let price_floor = avg_price * (1.0 - self.price_discount.get());
        let volume_floor = avg_volume * self.volume_multiple.get();

        // Newest first
        tail.iter()
            .enumerate()
            .rev()
            .filter(|(_, o)| o.price < price_floor && o.volume > volume_floor)
            .map(|(k, o)| {
                SignalEvent::at(
                    self.kind(),
                    o,
                    start + k,
                    Severity::Strong,
                    format!(
                        "Late breakdown to {:.2}, {:.2}% under the closing average",
                        o.price,
                        -pct_change(avg_price, o.price) * 100.0
                    ),
                )
            })
            .collect()
    }
}

// ============================================================
// SUDDEN DROP ON VOLUME
// ============================================================

/// One-minute drop on a volume spike
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SuddenDropDetector {
    /// Observations skipped before the scan starts
    pub warmup: Period,
    /// Drop against the previous tick
    pub drop: Ratio,
    /// Trailing window for the volume baseline
    pub volume_period: Period,
    pub volume_multiple: Multiplier,
}

impl Default for SuddenDropDetector {
    fn default() -> Self {
        Self {
            warmup: Period::new_const(5),
            drop: Ratio::new_const(0.01),
            volume_period: Period::new_const(5),
            volume_multiple: Multiplier::new_const(1.5),
        }
    }
}

impl SignalDetector for SuddenDropDetector {
    fn kind(&self) -> SignalKind {
        SignalKind::SuddenDropOnVolume
    }

    fn min_observations(&self) -> usize {
        self.warmup.get() + 1
    }

    fn detect(&self, input: &DetectionInput<'_>) -> Vec<SignalEvent> {
        let obs = input.series.observations();
        let keep = 1.0 - self.drop.get();

        (self.warmup.get()..obs.len())
            .filter_map(|i| {
                let (prev, cur) = (&obs[i - 1], &obs[i]);
                let baseline = prior_volume_mean(obs, i, self.volume_period.get());
                if cur.price >= prev.price * keep || cur.volume <= baseline * self.volume_multiple.get() {
                    return None;
                }
                Some(SignalEvent::at(
                    self.kind(),
                    cur,
                    i,
                    Severity::Strong,
                    format!(
                        "Dropped {:.2}% in one minute on {:.1}x volume",
                        -pct_change(prev.price, cur.price) * 100.0,
                        if baseline > 0.0 { cur.volume / baseline } else { 0.0 }
                    ),
                ))
            })
            .collect()
    }
}

// ============================================================
// LIMIT-UP OPENED
// ============================================================

/// Price leaves the limit-up board on heavy volume
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LimitUpOpenedDetector {
    /// Absolute price distance treated as "on the board"
    pub price_tolerance: f64,
    pub volume_period: Period,
    pub volume_multiple: Multiplier,
}

impl Default for LimitUpOpenedDetector {
    fn default() -> Self {
        Self {
            price_tolerance: LIMIT_TOLERANCE,
            volume_period: Period::new_const(5),
            volume_multiple: Multiplier::new_const(1.5),
        }
    }
}

impl SignalDetector for LimitUpOpenedDetector {
    fn kind(&self) -> SignalKind {
        SignalKind::LimitUpOpened
    }

    fn min_observations(&self) -> usize {
        2
    }

    fn detect(&self, input: &DetectionInput<'_>) -> Vec<SignalEvent> {
        let Some(limit) = input.context.limit_up_price else {
            return Vec::new();
        };
        let obs = input.series.observations();
        let tolerance = self.price_tolerance;

        (1..obs.len())
            .filter_map(|i| {
                let (prev, cur) = (&obs[i - 1], &obs[i]);
                let was_sealed = (prev.price - limit).abs() < tolerance;
                let opened = limit - cur.price >= tolerance - PRICE_EPSILON;
                let baseline = prior_volume_mean(obs, i, self.volume_period.get());
                if !(was_sealed && opened && cur.volume > baseline * self.volume_multiple.get()) {
                    return None;
                }
                Some(SignalEvent::at(
                    self.kind(),
                    cur,
                    i,
                    Severity::Strong,
                    format!("Limit-up {:.2} opened to {:.2} on heavy volume", limit, cur.price),
                ))
            })
            .collect()
    }

    fn validate_config(&self) -> Result<()> {
        if !(self.price_tolerance.is_finite() && self.price_tolerance > 0.0) {
            return Err(SignalError::InvalidConfig(format!(
                "limit-up price_tolerance must be positive, got {}",
                self.price_tolerance
            )));
        }
        Ok(())
    }
}

// ============================================================
// PARAMETER METADATA
// ============================================================

const STAGNATION_PARAMS: &[ParamMeta] = &[
    ParamMeta::ratio("max_amplitude", 0.01, (0.005, 0.02, 0.005), "Bucket range ceiling"),
    ParamMeta::ratio("late_max_amplitude", 0.015, (0.01, 0.03, 0.005), "Range ceiling after 14:50"),
    ParamMeta::multiplier("volume_step", 1.5, (1.0, 3.0, 0.5), "Volume step on a strong day"),
    ParamMeta::multiplier("weak_day_volume_step", 2.0, (1.0, 4.0, 0.5), "Volume step on a weak day"),
    ParamMeta::multiplier("day_volume_multiple", 3.0, (1.5, 5.0, 0.5), "Bucket volume vs day mean"),
    ParamMeta::ratio("trade_size_decline", 0.10, (0.0, 0.3, 0.05), "Trade size shrink per step"),
    ParamMeta::value("strong_day_percent", 5.0, (2.0, 10.0, 1.0), "Day gain for the strong step"),
    ParamMeta::count("min_peer_confirmations", 2.0, (0.0, 5.0, 1.0), "Peers with the same pattern"),
];

const FIRST_PULLBACK_PARAMS: &[ParamMeta] = &[ParamMeta::ratio(
    "pullback",
    0.01,
    (0.005, 0.05, 0.005),
    "Give-back from the day high",
)];

const WEAK_REBOUND_PARAMS: &[ParamMeta] = &[
    ParamMeta::ratio("pullback", 0.01, (0.005, 0.05, 0.005), "Give-back from the day high"),
    ParamMeta::ratio("rebound", 0.01, (0.005, 0.05, 0.005), "Bounce off the low"),
];

const END_OF_DAY_BREAKDOWN_PARAMS: &[ParamMeta] = &[
    ParamMeta::period("window", 30.0, (10.0, 60.0, 10.0), "Closing window length"),
    ParamMeta::ratio("price_discount", 0.01, (0.005, 0.03, 0.005), "Discount to window average"),
    ParamMeta::multiplier("volume_multiple", 1.2, (1.0, 3.0, 0.2), "Volume vs window average"),
];

const SUDDEN_DROP_PARAMS: &[ParamMeta] = &[
    ParamMeta::period("warmup", 5.0, (1.0, 10.0, 1.0), "Observations skipped first"),
    ParamMeta::ratio("drop", 0.01, (0.005, 0.03, 0.005), "Drop against the previous tick"),
    ParamMeta::period("volume_period", 5.0, (3.0, 10.0, 1.0), "Volume baseline window"),
    ParamMeta::multiplier("volume_multiple", 1.5, (1.0, 3.0, 0.25), "Volume vs baseline"),
];

const LIMIT_UP_OPENED_PARAMS: &[ParamMeta] = &[
    ParamMeta::value("price_tolerance", LIMIT_TOLERANCE, (0.005, 0.05, 0.005), "On-board price distance"),
    ParamMeta::period("volume_period", 5.0, (3.0, 10.0, 1.0), "Volume baseline window"),
    ParamMeta::multiplier("volume_multiple", 1.5, (1.0, 3.0, 0.25), "Volume vs baseline"),
];

impl ParameterizedDetector for StagnationDetector {
    fn param_meta() -> &'static [ParamMeta] {
        STAGNATION_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        Ok(Self {
            max_amplitude: get_ratio(params, "max_amplitude", 0.01)?,
            late_max_amplitude: get_ratio(params, "late_max_amplitude", 0.015)?,
            volume_step: get_multiplier(params, "volume_step", 1.5)?,
            weak_day_volume_step: get_multiplier(params, "weak_day_volume_step", 2.0)?,
            day_volume_multiple: get_multiplier(params, "day_volume_multiple", 3.0)?,
            trade_size_decline: get_ratio(params, "trade_size_decline", 0.10)?,
            strong_day_percent: get_value(params, "strong_day_percent", 5.0)?,
            min_peer_confirmations: get_count(params, "min_peer_confirmations", 2)?,
            ..Self::default()
        })
    }

    fn signal_kind() -> SignalKind {
        SignalKind::StagnationAtHighs
    }
}

impl ParameterizedDetector for FirstPullbackDetector {
    fn param_meta() -> &'static [ParamMeta] {
        FIRST_PULLBACK_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        Ok(Self {
            pullback: get_ratio(params, "pullback", 0.01)?,
        })
    }

    fn signal_kind() -> SignalKind {
        SignalKind::FirstPullback
    }
}

impl ParameterizedDetector for WeakReboundDetector {
    fn param_meta() -> &'static [ParamMeta] {
        WEAK_REBOUND_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        Ok(Self {
            pullback: get_ratio(params, "pullback", 0.01)?,
            rebound: get_ratio(params, "rebound", 0.01)?,
        })
    }

    fn signal_kind() -> SignalKind {
        SignalKind::WeakRebound
    }
}

impl ParameterizedDetector for EndOfDayBreakdownDetector {
    fn param_meta() -> &'static [ParamMeta] {
        END_OF_DAY_BREAKDOWN_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        Ok(Self {
            window: get_period(params, "window", 30)?,
            price_discount: get_ratio(params, "price_discount", 0.01)?,
            volume_multiple: get_multiplier(params, "volume_multiple", 1.2)?,
        })
    }

    fn signal_kind() -> SignalKind {
        SignalKind::EndOfDayBreakdown
    }
}

impl ParameterizedDetector for SuddenDropDetector {
    fn param_meta() -> &'static [ParamMeta] {
        SUDDEN_DROP_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        Ok(Self {
            warmup: get_period(params, "warmup", 5)?,
            drop: get_ratio(params, "drop", 0.01)?,
            volume_period: get_period(params, "volume_period", 5)?,
            volume_multiple: get_multiplier(params, "volume_multiple", 1.5)?,
        })
    }

    fn signal_kind() -> SignalKind {
        SignalKind::SuddenDropOnVolume
    }
}

impl ParameterizedDetector for LimitUpOpenedDetector {
    fn param_meta() -> &'static [ParamMeta] {
        LIMIT_UP_OPENED_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        let detector = Self {
            price_tolerance: get_value(params, "price_tolerance", LIMIT_TOLERANCE)?,
            volume_period: get_period(params, "volume_period", 5)?,
            volume_multiple: get_multiplier(params, "volume_multiple", 1.5)?,
        };
        detector.validate_config()?;
        Ok(detector)
    }

    fn signal_kind() -> SignalKind {
        SignalKind::LimitUpOpened
    }
}

// ============================================================
// TESTS
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{InstrumentContext, TickObservation, TickSeries, WindowAggregator};

    fn at(i: usize) -> SessionTime {
        let m = 9 * 60 + 30 + i as u16;
        SessionTime::new_const(m / 60, m % 60)
    }

    fn series(prices: &[f64], volumes: &[f64]) -> TickSeries {
        let obs = prices
            .iter()
            .zip(volumes)
            .enumerate()
            .map(|(i, (&p, &v))| TickObservation::new(at(i), p, v, p * v))
            .collect();
        TickSeries::new(obs).unwrap()
    }

    fn run<D: SignalDetector>(d: &D, s: &TickSeries, ctx: &InstrumentContext) -> Vec<SignalEvent> {
        let aggregator = WindowAggregator::default();
        let buckets = aggregator.buckets(s);
        d.detect(&DetectionInput {
            series: s,
            context: ctx,
            buckets: &buckets,
            peers: &[],
            aggregator,
        })
    }

    #[test]
    fn test_first_pullback_fires_once_at_threshold() {
        let s = series(&[10.0, 10.5, 10.45, 10.3, 10.0], &[1.0; 5]);
        let events = run(&FirstPullbackDetector::default(), &s, &InstrumentContext::new());

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].source_index, 3);
        assert_eq!(events[0].severity, Severity::Medium);
    }

    #[test]
    fn test_first_pullback_none_on_steady_rise() {
        let s = series(&[10.0, 10.1, 10.2, 10.3], &[1.0; 4]);
        assert!(run(&FirstPullbackDetector::default(), &s, &InstrumentContext::new()).is_empty());
    }

    #[test]
    fn test_weak_rebound() {
        // peak 10.5 @1 (vol 500), pullback @2, low 10.0 @3, bounce to 10.2 @4 on 100
        let s = series(&[10.0, 10.5, 10.3, 10.0, 10.2], &[100.0, 500.0, 200.0, 200.0, 100.0]);
        let events = run(&WeakReboundDetector::default(), &s, &InstrumentContext::new());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].source_index, 4);

        // Same bounce on heavier volume than the peak is not weak
        let s = series(&[10.0, 10.5, 10.3, 10.0, 10.2], &[100.0, 500.0, 200.0, 200.0, 600.0]);
        assert!(run(&WeakReboundDetector::default(), &s, &InstrumentContext::new()).is_empty());
    }

    #[test]
    fn test_end_of_day_breakdown_scans_backward() {
        let mut prices = vec![10.0; 30];
        let mut volumes = vec![100.0; 30];
        prices[20] = 9.7;
        volumes[20] = 400.0;
        prices[28] = 9.7;
        volumes[28] = 400.0;
        let s = series(&prices, &volumes);
        let events = run(&EndOfDayBreakdownDetector::default(), &s, &InstrumentContext::new());

        let idx: Vec<usize> = events.iter().map(|e| e.source_index).collect();
        assert_eq!(idx, vec![28, 20]);
    }

    #[test]
    fn test_sudden_drop_multiple_matches() {
        let prices = [10.0, 10.0, 10.0, 10.0, 10.0, 9.8, 9.8, 9.6];
        let volumes = [100.0, 100.0, 100.0, 100.0, 100.0, 300.0, 100.0, 400.0];
        let s = series(&prices, &volumes);
        let events = run(&SuddenDropDetector::default(), &s, &InstrumentContext::new());

        let idx: Vec<usize> = events.iter().map(|e| e.source_index).collect();
        assert_eq!(idx, vec![5, 7]);
    }

    #[test]
    fn test_sudden_drop_ignores_warmup() {
        let s = series(&[10.0, 9.0, 9.0], &[100.0, 1000.0, 100.0]);
        assert!(run(&SuddenDropDetector::default(), &s, &InstrumentContext::new()).is_empty());
    }

    #[test]
    fn test_limit_up_opened_requires_limit() {
        let s = series(&[11.0, 11.0, 10.9], &[100.0, 100.0, 500.0]);
        let d = LimitUpOpenedDetector::default();
        assert!(run(&d, &s, &InstrumentContext::new()).is_empty());

        let ctx = InstrumentContext::new().with_limit_up(11.0);
        let events = run(&d, &s, &ctx);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].source_index, 2);
    }

    #[test]
    fn test_limit_up_opened_quiet_volume() {
        let s = series(&[11.0, 11.0, 10.9], &[100.0, 100.0, 120.0]);
        let ctx = InstrumentContext::new().with_limit_up(11.0);
        assert!(run(&LimitUpOpenedDetector::default(), &s, &ctx).is_empty());
    }

    #[test]
    fn test_stagnation_needs_three_buckets() {
        let s = series(&[10.0; 10], &[100.0; 10]);
        assert!(run(&StagnationDetector::default(), &s, &InstrumentContext::new()).is_empty());
    }

    #[test]
    fn test_invalid_config() {
        let d = StagnationDetector {
            late_max_amplitude: Ratio::new_const(0.005),
            ..Default::default()
        };
        assert!(d.validate_config().is_err());

        let d = LimitUpOpenedDetector {
            price_tolerance: 0.0,
            ..Default::default()
        };
        assert!(d.validate_config().is_err());
    }
}
