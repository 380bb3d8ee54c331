//! Tick series data model
//!
//! A trading day arrives from the quote vendor as a map keyed by `"HH:MM:SS"`.
//! It is parsed once into a [`TickSeries`], sorted by session time, and that
//! ordered form is what every window and detector reads.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{Result, SignalError};

// ============================================================
// SESSION TIME
// ============================================================

/// Minute of the trading session (`HH:MM`, exchange-local).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionTime(u16);

impl SessionTime {
    /// Build from hour and minute. Returns an error outside `00:00..=23:59`.
    pub fn new(hour: u16, minute: u16) -> Result<Self> {
        if hour > 23 || minute > 59 {
            return Err(SignalError::InvalidTime(format!("{hour:02}:{minute:02}")));
        }
        Ok(Self(hour * 60 + minute))
    }

    #[doc(hidden)]
    pub const fn new_const(hour: u16, minute: u16) -> Self {
        Self(hour * 60 + minute)
    }

    /// Minutes since midnight
    #[inline]
    pub fn minutes(self) -> u16 {
        self.0
    }

    #[inline]
    pub fn hour(self) -> u16 {
        self.0 / 60
    }

    #[inline]
    pub fn minute(self) -> u16 {
        self.0 % 60
    }
}

impl fmt::Display for SessionTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

impl FromStr for SessionTime {
    type Err = SignalError;

    /// Accepts `HH:MM` or `HH:MM:SS`; seconds are dropped.
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || SignalError::InvalidTime(s.to_string());
        let mut parts = s.trim().split(':');
        let hour = parts.next().ok_or_else(invalid)?;
        let minute = parts.next().ok_or_else(invalid)?;
        if let Some(second) = parts.next() {
            second.parse::<u16>().map_err(|_| invalid())?;
        }
        if parts.next().is_some() {
            return Err(invalid());
        }
        let hour = hour.parse::<u16>().map_err(|_| invalid())?;
        let minute = minute.parse::<u16>().map_err(|_| invalid())?;
        Self::new(hour, minute)
    }
}

impl Serialize for SessionTime {
    fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SessionTime {
    fn deserialize<D: Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(d)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// ============================================================
// OBSERVATIONS
// ============================================================

/// One minute's trade snapshot
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TickObservation {
    pub time: SessionTime,
    /// Last trade price
    pub price: f64,
    /// Shares traded since the previous observation
    pub volume: f64,
    /// Notional traded since the previous observation
    pub turnover: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average_price: Option<f64>,
}

impl TickObservation {
    pub fn new(time: SessionTime, price: f64, volume: f64, turnover: f64) -> Self {
        Self {
            time,
            price,
            volume,
            turnover,
            average_price: None,
        }
    }

    fn validate(&self, index: usize) -> Result<()> {
        if !self.price.is_finite() {
            return Err(SignalError::InvalidTick {
                index,
                reason: "price is not finite",
            });
        }
        if self.price <= 0.0 {
            return Err(SignalError::InvalidTick {
                index,
                reason: "price must be positive",
            });
        }
        if !self.volume.is_finite() || self.volume < 0.0 {
            return Err(SignalError::InvalidTick {
                index,
                reason: "volume must be finite and non-negative",
            });
        }
        if !self.turnover.is_finite() || self.turnover < 0.0 {
            return Err(SignalError::InvalidTick {
                index,
                reason: "turnover must be finite and non-negative",
            });
        }
        Ok(())
    }
}

/// Vendor-shaped tick as it appears in the keyed map.
///
/// Field names follow the quote API (`NEW`, `VOL`, `money`) with readable
/// aliases. Numbers may arrive as strings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawTick {
    #[serde(
        default,
        alias = "NEW",
        alias = "new",
        deserialize_with = "lenient_f64"
    )]
    pub price: Option<f64>,
    #[serde(
        default,
        alias = "VOL",
        alias = "vol",
        deserialize_with = "lenient_f64"
    )]
    pub volume: Option<f64>,
    #[serde(
        default,
        alias = "money",
        alias = "amount",
        deserialize_with = "lenient_f64"
    )]
    pub turnover: Option<f64>,
    #[serde(
        default,
        alias = "avg",
        alias = "averagePrice",
        deserialize_with = "lenient_f64"
    )]
    pub average_price: Option<f64>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Numeric {
    Number(f64),
    Text(String),
}

fn lenient_f64<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Option<f64>, D::Error> {
    match Option::<Numeric>::deserialize(d)? {
        None => Ok(None),
        Some(Numeric::Number(v)) => Ok(Some(v)),
        Some(Numeric::Text(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            trimmed
                .parse::<f64>()
                .map(Some)
                .map_err(serde::de::Error::custom)
        }
    }
}

// ============================================================
// TICK SERIES
// ============================================================

/// Time-ordered minute observations for one instrument on one day.
///
/// Immutable once built; the ordering is established at construction and
/// never re-sorted downstream.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TickSeries {
    observations: Vec<TickObservation>,
}

impl TickSeries {
    /// Build from observations in any order.
    pub fn new(mut observations: Vec<TickObservation>) -> Result<Self> {
        for (i, obs) in observations.iter().enumerate() {
            obs.validate(i)?;
        }
        observations.sort_by_key(|o| o.time);
        if let Some(pair) = observations.windows(2).find(|w| w[0].time == w[1].time) {
            return Err(SignalError::DuplicateTime(pair[0].time.to_string()));
        }
        Ok(Self { observations })
    }

    /// Build from a keyed map (`time -> tick`), the shape the quote API returns.
    ///
    /// Missing volume/turnover default to zero; a missing price is rejected.
    pub fn from_keyed<I, K>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, RawTick)>,
        K: AsRef<str>,
    {
        let observations = entries
            .into_iter()
            .map(|(key, raw)| {
                let time: SessionTime = key.as_ref().parse()?;
                let price = raw.price.ok_or_else(|| SignalError::MissingField {
                    time: time.to_string(),
                    field: "price",
                })?;
                Ok(TickObservation {
                    time,
                    price,
                    volume: raw.volume.unwrap_or(0.0),
                    turnover: raw.turnover.unwrap_or(0.0),
                    average_price: raw.average_price,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(observations)
    }

    /// Parse a JSON object keyed by time.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let map: BTreeMap<String, RawTick> =
            serde_json::from_str(json).map_err(|e| SignalError::InvalidInput(e.to_string()))?;
        Self::from_keyed(map)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.observations.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    #[inline]
    pub fn observations(&self) -> &[TickObservation] {
        &self.observations
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&TickObservation> {
        self.observations.get(index)
    }

    pub fn first(&self) -> Option<&TickObservation> {
        self.observations.first()
    }

    pub fn last(&self) -> Option<&TickObservation> {
        self.observations.last()
    }

    pub fn prices(&self) -> Vec<f64> {
        self.observations.iter().map(|o| o.price).collect()
    }

    pub fn volumes(&self) -> Vec<f64> {
        self.observations.iter().map(|o| o.volume).collect()
    }

    pub fn total_volume(&self) -> f64 {
        self.observations.iter().map(|o| o.volume).sum()
    }

    /// Index of the observation at `time`, if present.
    pub fn position(&self, time: SessionTime) -> Option<usize> {
        self.observations.binary_search_by_key(&time, |o| o.time).ok()
    }

    /// True when every observation sits within `tolerance` of `price`.
    pub fn pinned_at(&self, price: f64, tolerance: f64) -> bool {
        !self.is_empty()
            && self
                .observations
                .iter()
                .all(|o| (o.price - price).abs() < tolerance)
    }
}

impl<'a> IntoIterator for &'a TickSeries {
    type Item = &'a TickObservation;
    type IntoIter = std::slice::Iter<'a, TickObservation>;

    fn into_iter(self) -> Self::IntoIter {
        self.observations.iter()
    }
}

// ============================================================
// INSTRUMENT CONTEXT
// ============================================================

/// Static metadata accompanying a series; read-only to the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InstrumentContext {
    pub symbol: Option<String>,
    pub limit_up_price: Option<f64>,
    pub limit_down_price: Option<f64>,
    pub previous_close: Option<f64>,
    /// Today's change in percent (5.0 == +5%)
    pub change_percent: f64,
    pub concept_tags: BTreeSet<String>,
}

impl InstrumentContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = Some(symbol.into());
        self
    }

    pub fn with_limits(mut self, limit_up: f64, limit_down: f64) -> Self {
        self.limit_up_price = Some(limit_up);
        self.limit_down_price = Some(limit_down);
        self
    }

    pub fn with_limit_up(mut self, limit_up: f64) -> Self {
        self.limit_up_price = Some(limit_up);
        self
    }

    pub fn with_limit_down(mut self, limit_down: f64) -> Self {
        self.limit_down_price = Some(limit_down);
        self
    }

    pub fn with_previous_close(mut self, previous_close: f64) -> Self {
        self.previous_close = Some(previous_close);
        self
    }

    pub fn with_change_percent(mut self, change_percent: f64) -> Self {
        self.change_percent = change_percent;
        self
    }

    pub fn with_concepts<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.concept_tags.extend(tags.into_iter().map(Into::into));
        self
    }
}
