//! Fixed-size window rollups and trailing averages
//!
//! Buckets are built from complete runs only; a trailing partial run is
//! dropped. Nothing here is persisted: buckets are recomputed per pass unless
//! the caller holds a [`crate::cache::BucketCache`].

use serde::{Deserialize, Serialize};

use crate::{series::SessionTime, Period, TickObservation, TickSeries};

/// Aggregate over one contiguous run of observations
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowBucket {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume_sum: f64,
    pub turnover_sum: f64,
    /// `turnover_sum / volume_sum`, 0 when the bucket traded nothing
    pub average_trade_size: f64,
    pub start_time: SessionTime,
    pub end_time: SessionTime,
    /// Index of the first observation in the source series
    pub start_index: usize,
    /// Index of the last observation in the source series
    pub end_index: usize,
}

impl WindowBucket {
    fn from_run(run: &[TickObservation], start_index: usize) -> Option<Self> {
        let first = run.first()?;
        let last = run.last()?;
        let (high, low) = run.iter().fold((f64::MIN, f64::MAX), |(h, l), o| {
            (h.max(o.price), l.min(o.price))
        });
        let volume_sum: f64 = run.iter().map(|o| o.volume).sum();
        let turnover_sum: f64 = run.iter().map(|o| o.turnover).sum();
        let average_trade_size = if volume_sum > 0.0 {
            turnover_sum / volume_sum
        } else {
            0.0
        };

        Some(Self {
            open: first.price,
            high,
            low,
            close: last.price,
            volume_sum,
            turnover_sum,
            average_trade_size,
            start_time: first.time,
            end_time: last.time,
            start_index,
            end_index: start_index + run.len() - 1,
        })
    }

    /// `(high - low) / low`
    #[inline]
    pub fn amplitude(&self) -> f64 {
        if self.low > 0.0 {
            (self.high - self.low) / self.low
        } else {
            0.0
        }
    }

    #[inline]
    pub fn is_up(&self) -> bool {
        self.close > self.open
    }
}

/// Numeric field of an observation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Price,
    Volume,
    Turnover,
}

impl Field {
    #[inline]
    pub fn of(self, obs: &TickObservation) -> f64 {
        match self {
            Field::Price => obs.price,
            Field::Volume => obs.volume,
            Field::Turnover => obs.turnover,
        }
    }
}

/// Partitions a series into buckets of `size` observations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowAggregator {
    pub size: Period,
}

impl Default for WindowAggregator {
    fn default() -> Self {
        Self {
            size: Period::new_const(5),
        }
    }
}

impl WindowAggregator {
    pub fn new(size: Period) -> Self {
        Self { size }
    }

    /// Consecutive, non-overlapping buckets in time order.
    pub fn buckets(&self, series: &TickSeries) -> Vec<WindowBucket> {
        let size = self.size.get();
        series
            .observations()
            .chunks_exact(size)
            .enumerate()
            .filter_map(|(n, run)| WindowBucket::from_run(run, n * size))
            .collect()
    }

    /// Mean of the last `period` observations ending at `index` (inclusive).
    pub fn moving_average(series: &TickSeries, field: Field, index: usize, period: usize) -> f64 {
        let obs = series.observations();
        if obs.is_empty() {
            return 0.0;
        }
        let end = index.min(obs.len() - 1);
        let start = (end + 1).saturating_sub(period.max(1));
        let slice = &obs[start..=end];
        slice.iter().map(|o| field.of(o)).sum::<f64>() / slice.len() as f64
    }

    /// Moving average at every index.
    pub fn moving_average_series(series: &TickSeries, field: Field, period: usize) -> Vec<f64> {
        let values: Vec<f64> = series.observations().iter().map(|o| field.of(o)).collect();
        (0..values.len())
            .map(|i| trailing_mean(&values, i, period))
            .collect()
    }
}

/// Mean of `values[i + 1 - period ..= i]`, clamped at the start of the slice.
#[inline]
pub fn trailing_mean(values: &[f64], index: usize, period: usize) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let end = index.min(values.len() - 1);
    let start = (end + 1).saturating_sub(period.max(1));
    let slice = &values[start..=end];
    slice.iter().sum::<f64>() / slice.len() as f64
}

/// Arithmetic mean; 0 for an empty slice.
#[inline]
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}
