//! Shared thresholds and price/volume helpers for intraday detectors.

use crate::{window, SessionTime, TickObservation, WindowBucket};

// ============================================================
// THRESHOLDS
// ============================================================

/// Price distance treated as "at the limit" (one tick on a 0.01 grid)
pub const LIMIT_TOLERANCE: f64 = 0.01;

/// Slack applied to strict price comparisons against the limit
pub const PRICE_EPSILON: f64 = 1e-9;

/// Bucket ends at or after this time use the late-session amplitude ceiling
pub const LATE_SESSION: SessionTime = SessionTime::new_const(14, 50);

/// Bucket ends at or before this time use the early breakout thresholds
pub const EARLY_SESSION_END: SessionTime = SessionTime::new_const(11, 0);

/// Earliest time an end-of-day rush can fire
pub const CLOSING_RUSH_START: SessionTime = SessionTime::new_const(14, 30);

// ============================================================
// HELPER FUNCTIONS
// ============================================================

/// Relative change from `from` to `to`; 0 when `from` is not positive.
#[inline]
pub fn pct_change(from: f64, to: f64) -> f64 {
    if from > 0.0 {
        (to - from) / from
    } else {
        0.0
    }
}

/// Mean volume of the `period` observations ending just before `index`.
///
/// This is the baseline a tick's own volume is compared against, so the tick
/// itself never inflates it.
#[inline]
pub fn prior_volume_mean(obs: &[TickObservation], index: usize, period: usize) -> f64 {
    if index == 0 || obs.is_empty() {
        return 0.0;
    }
    let end = index.min(obs.len());
    let start = end.saturating_sub(period.max(1));
    let slice = &obs[start..end];
    slice.iter().map(|o| o.volume).sum::<f64>() / slice.len() as f64
}

/// Index of the first occurrence of the day's highest price.
pub fn peak_index(obs: &[TickObservation]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, o) in obs.iter().enumerate() {
        match best {
            Some((_, p)) if o.price <= p => {},
            _ => best = Some((i, o.price)),
        }
    }
    best.map(|(i, _)| i)
}

/// First index after the peak where price has given back at least `pullback`.
///
/// Returns `(peak_index, pullback_index)`.
pub fn first_pullback(obs: &[TickObservation], pullback: f64) -> Option<(usize, usize)> {
    let peak = peak_index(obs)?;
    let threshold = obs[peak].price * (1.0 - pullback);
    obs.iter()
        .enumerate()
        .skip(peak + 1)
        .find(|(_, o)| o.price <= threshold)
        .map(|(i, _)| (peak, i))
}

/// Mean bucket volume over the whole day.
#[inline]
pub fn mean_bucket_volume(buckets: &[WindowBucket]) -> f64 {
    let volumes: Vec<f64> = buckets.iter().map(|b| b.volume_sum).collect();
    window::mean(&volumes)
}

/// Mean of `f` over `obs`.
#[inline]
pub fn mean_of(obs: &[TickObservation], f: impl Fn(&TickObservation) -> f64) -> f64 {
    if obs.is_empty() {
        0.0
    } else {
        obs.iter().map(f).sum::<f64>() / obs.len() as f64
    }
}
