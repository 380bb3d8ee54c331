//! Parameter metadata for signal detectors
//!
//! Every threshold a detector exposes is described here, which is what drives
//! threshold sweeps and the JSON configuration layer.
//!
//! # Example
//!
//! ```rust
//! use std::collections::HashMap;
//! use tickpoint::params::{ParameterizedDetector, ParamType};
//! use tickpoint::prelude::*;
//!
//! for param in SuddenDropDetector::param_meta() {
//!     println!("{}: {:?} (default: {})", param.name, param.param_type, param.default);
//! }
//!
//! let mut params = HashMap::new();
//! params.insert("volume_multiple", 2.0);
//! let detector = SuddenDropDetector::with_params(&params).unwrap();
//! assert_eq!(detector.volume_multiple.get(), 2.0);
//! ```

use std::collections::HashMap;

use crate::{BuiltinDetector, Multiplier, Period, Ratio, Result, SignalError, SignalKind};

// ============================================================
// PARAMETER TYPES
// ============================================================

/// Type of parameter value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
  /// Fraction in 0.0..=1.0
  Ratio,
  /// Positive scale factor against a baseline
  Multiplier,
  /// Positive integer count of observations or buckets
  Period,
  /// Non-negative integer count, zero allowed
  Count,
  /// Plain finite number: a percent or a price distance
  Value,
}

/// Metadata for a single detector parameter
#[derive(Debug, Clone)]
pub struct ParamMeta {
  pub name: &'static str,
  pub param_type: ParamType,
  pub default: f64,
  /// Sweep range: (min, max, step)
  pub range: (f64, f64, f64),
  pub description: &'static str,
}

impl ParamMeta {
  pub const fn ratio(
    name: &'static str,
    default: f64,
    range: (f64, f64, f64),
    description: &'static str,
  ) -> Self {
    Self { name, param_type: ParamType::Ratio, default, range, description }
  }

  pub const fn multiplier(
    name: &'static str,
    default: f64,
    range: (f64, f64, f64),
    description: &'static str,
  ) -> Self {
    Self { name, param_type: ParamType::Multiplier, default, range, description }
  }

  pub const fn period(
    name: &'static str,
    default: f64,
    range: (f64, f64, f64),
    description: &'static str,
  ) -> Self {
    Self { name, param_type: ParamType::Period, default, range, description }
  }

  pub const fn count(
    name: &'static str,
    default: f64,
    range: (f64, f64, f64),
    description: &'static str,
  ) -> Self {
    Self { name, param_type: ParamType::Count, default, range, description }
  }

  pub const fn value(
    name: &'static str,
    default: f64,
    range: (f64, f64, f64),
    description: &'static str,
  ) -> Self {
    Self { name, param_type: ParamType::Value, default, range, description }
  }

  /// All values of the sweep range, inclusive
  pub fn generate_grid(&self) -> Vec<f64> {
    let (min, max, step) = self.range;
    if step <= 0.0 {
      return vec![min];
    }
    let mut values = Vec::new();
    let mut v = min;
    while v <= max + f64::EPSILON {
      values.push(v);
      v += step;
    }
    values
  }

  /// Validate a value for this parameter
  pub fn validate(&self, value: f64) -> Result<()> {
    let (min, max, _) = self.range;
    if value < min || value > max {
      return Err(SignalError::OutOfRange { field: self.name, value, min, max });
    }
    match self.param_type {
      ParamType::Ratio => Ratio::new(value).map(|_| ()),
      ParamType::Multiplier => Multiplier::new(value).map(|_| ()),
      ParamType::Period => {
        if value < 1.0 || value.fract() != 0.0 {
          return Err(SignalError::InvalidValue("Period must be a positive integer"));
        }
        Ok(())
      },
      ParamType::Count => {
        if value < 0.0 || value.fract() != 0.0 {
          return Err(SignalError::InvalidValue("Count must be a non-negative integer"));
        }
        Ok(())
      },
      ParamType::Value => {
        if !value.is_finite() {
          return Err(SignalError::InvalidValue("Value must be finite"));
        }
        Ok(())
      },
    }
  }
}

// ============================================================
// PARAMETERIZED DETECTOR TRAIT
// ============================================================

/// Detectors whose thresholds can be set by name
pub trait ParameterizedDetector: Sized {
  /// Returns metadata for all configurable parameters
  fn param_meta() -> &'static [ParamMeta];

  /// Creates a detector with parameters from a HashMap
  ///
  /// Missing parameters use their default values.
  fn with_params(params: &HashMap<&str, f64>) -> Result<Self>;

  fn signal_kind() -> SignalKind;
}

/// Build the builtin detector for `kind` from named parameters.
///
/// Unknown keys are rejected so that typos in a configuration file surface.
pub fn builtin_with_params(kind: SignalKind, params: &HashMap<&str, f64>) -> Result<BuiltinDetector> {
  use crate::detectors::*;

  fn build<D: ParameterizedDetector>(params: &HashMap<&str, f64>) -> Result<D> {
    if let Some(unknown) = params.keys().find(|k| !D::param_meta().iter().any(|m| m.name == **k)) {
      return Err(SignalError::InvalidConfig(format!(
        "unknown parameter `{unknown}` for {}",
        D::signal_kind()
      )));
    }
    D::with_params(params)
  }

  Ok(match kind {
    SignalKind::StagnationAtHighs => BuiltinDetector::Stagnation(build::<StagnationDetector>(params)?),
    SignalKind::FirstPullback => BuiltinDetector::FirstPullback(build::<FirstPullbackDetector>(params)?),
    SignalKind::WeakRebound => BuiltinDetector::WeakRebound(build::<WeakReboundDetector>(params)?),
    SignalKind::EndOfDayBreakdown => {
      BuiltinDetector::EndOfDayBreakdown(build::<EndOfDayBreakdownDetector>(params)?)
    },
    SignalKind::SuddenDropOnVolume => BuiltinDetector::SuddenDrop(build::<SuddenDropDetector>(params)?),
    SignalKind::LimitUpOpened => BuiltinDetector::LimitUpOpened(build::<LimitUpOpenedDetector>(params)?),
    SignalKind::LowLevelBreakout => {
      BuiltinDetector::LowLevelBreakout(build::<LowLevelBreakoutDetector>(params)?)
    },
    SignalKind::Acceleration => BuiltinDetector::Acceleration(build::<AccelerationDetector>(params)?),
    SignalKind::VolumeSurge => BuiltinDetector::VolumeSurge(build::<VolumeSurgeDetector>(params)?),
    SignalKind::EndOfDayRush => BuiltinDetector::EndOfDayRush(build::<EndOfDayRushDetector>(params)?),
  })
}

// ============================================================
// PARAMETER VALUE HELPERS
// ============================================================

/// Helper to get a Ratio from params with default fallback
pub fn get_ratio(params: &HashMap<&str, f64>, key: &str, default: f64) -> Result<Ratio> {
  let value = params.get(key).copied().unwrap_or(default);
  Ratio::new(value)
}

/// Helper to get a Multiplier from params with default fallback
pub fn get_multiplier(params: &HashMap<&str, f64>, key: &str, default: f64) -> Result<Multiplier> {
  let value = params.get(key).copied().unwrap_or(default);
  Multiplier::new(value)
}

/// Helper to get a Period from params with default fallback
pub fn get_period(params: &HashMap<&str, f64>, key: &str, default: usize) -> Result<Period> {
  let value = params.get(key).copied().unwrap_or(default as f64);
  if value < 1.0 || value.fract() != 0.0 {
    return Err(SignalError::InvalidValue("Period must be a positive integer"));
  }
  Period::new(value as usize)
}

/// Helper to get a non-negative count from params with default fallback
pub fn get_count(params: &HashMap<&str, f64>, key: &str, default: usize) -> Result<usize> {
  let value = params.get(key).copied().unwrap_or(default as f64);
  if !value.is_finite() || value < 0.0 || value.fract() != 0.0 {
    return Err(SignalError::InvalidValue("Count must be a non-negative integer"));
  }
  Ok(value as usize)
}

/// Helper to get a finite number from params with default fallback
pub fn get_value(params: &HashMap<&str, f64>, key: &str, default: f64) -> Result<f64> {
  let value = params.get(key).copied().unwrap_or(default);
  if !value.is_finite() {
    return Err(SignalError::InvalidValue("Value must be finite"));
  }
  Ok(value)
}

// ============================================================
// TESTS
// ============================================================

#[cfg(test)]
mod tests {
  use super::*;
  use crate::detectors::*;

  #[test]
  fn test_param_meta_constructors() {
    let meta = ParamMeta::multiplier("volume_multiple", 1.5, (1.0, 3.0, 0.5), "Volume vs baseline");
    assert_eq!(meta.param_type, ParamType::Multiplier);
    assert_eq!(meta.default, 1.5);

    let meta = ParamMeta::period("window", 30.0, (10.0, 60.0, 10.0), "Window length");
    assert_eq!(meta.param_type, ParamType::Period);
  }

  #[test]
  fn test_generate_grid() {
    let meta = ParamMeta::ratio("drop", 0.01, (0.005, 0.015, 0.005), "Drop");

    let grid = meta.generate_grid();
    assert_eq!(grid.len(), 3);
    assert!((grid[0] - 0.005).abs() < 1e-12);
    assert!((grid[2] - 0.015).abs() < 1e-12);
  }

  #[test]
  fn test_validate() {
    let meta = ParamMeta::period("window", 30.0, (10.0, 60.0, 10.0), "Window");
    assert!(meta.validate(30.0).is_ok());
    assert!(meta.validate(5.0).is_err());
    assert!(meta.validate(30.5).is_err());

    let meta = ParamMeta::ratio("drop", 0.01, (0.0, 0.05, 0.005), "Drop");
    assert!(meta.validate(0.02).is_ok());
    assert!(meta.validate(0.06).is_err());
  }

  #[test]
  fn test_helpers_fall_back_to_defaults() {
    let mut params = HashMap::new();
    params.insert("key1", 0.8);
    params.insert("bad_period", 2.5);

    assert!((get_ratio(&params, "key1", 0.5).unwrap().get() - 0.8).abs() < f64::EPSILON);
    assert!((get_ratio(&params, "key2", 0.5).unwrap().get() - 0.5).abs() < f64::EPSILON);
    assert_eq!(get_multiplier(&params, "missing", 1.8).unwrap().get(), 1.8);
    assert_eq!(get_period(&params, "missing", 5).unwrap().get(), 5);
    assert!(get_period(&params, "bad_period", 5).is_err());
    assert!(get_multiplier(&HashMap::from([("m", 0.0)]), "m", 1.0).is_err());

    let counts = HashMap::from([("zero", 0.0), ("half", 1.5)]);
    assert_eq!(get_count(&counts, "zero", 2).unwrap(), 0);
    assert_eq!(get_count(&counts, "missing", 2).unwrap(), 2);
    assert!(get_count(&counts, "half", 2).is_err());
    assert!(get_value(&HashMap::from([("v", f64::NAN)]), "v", 1.0).is_err());
  }

  #[test]
  fn test_validate_count_and_value() {
    let meta = ParamMeta::count("min_peer_confirmations", 2.0, (0.0, 5.0, 1.0), "Peers");
    assert!(meta.validate(0.0).is_ok());
    assert!(meta.validate(1.5).is_err());

    let meta = ParamMeta::value("strong_day_percent", 5.0, (2.0, 10.0, 1.0), "Percent");
    assert!(meta.validate(7.5).is_ok());
    assert!(meta.validate(12.0).is_err());
  }

  #[test]
  fn test_every_default_is_within_its_range() {
    let all: [&[ParamMeta]; 10] = [
      StagnationDetector::param_meta(),
      FirstPullbackDetector::param_meta(),
      WeakReboundDetector::param_meta(),
      EndOfDayBreakdownDetector::param_meta(),
      SuddenDropDetector::param_meta(),
      LimitUpOpenedDetector::param_meta(),
      LowLevelBreakoutDetector::param_meta(),
      AccelerationDetector::param_meta(),
      VolumeSurgeDetector::param_meta(),
      EndOfDayRushDetector::param_meta(),
    ];
    for meta in all.iter().flat_map(|m| m.iter()) {
      assert!(meta.validate(meta.default).is_ok(), "{} default out of range", meta.name);
    }
  }

  #[test]
  fn test_builtin_with_params() {
    let params = HashMap::from([("drop", 0.02)]);
    let detector = builtin_with_params(SignalKind::SuddenDropOnVolume, &params).unwrap();
    assert_eq!(detector.kind(), SignalKind::SuddenDropOnVolume);

    let params = HashMap::from([
      ("strong_day_percent", 7.0),
      ("min_peer_confirmations", 0.0),
      ("max_amplitude", 0.015),
    ]);
    match builtin_with_params(SignalKind::StagnationAtHighs, &params).unwrap() {
      BuiltinDetector::Stagnation(d) => {
        assert_eq!(d.strong_day_percent, 7.0);
        assert_eq!(d.min_peer_confirmations, 0);
        assert_eq!(d.max_amplitude.get(), 0.015);
      },
      other => panic!("unexpected detector {other:?}"),
    }

    let params = HashMap::from([("price_tolerance", 0.02)]);
    match builtin_with_params(SignalKind::LimitUpOpened, &params).unwrap() {
      BuiltinDetector::LimitUpOpened(d) => assert_eq!(d.price_tolerance, 0.02),
      other => panic!("unexpected detector {other:?}"),
    }
    let params = HashMap::from([("price_tolerance", -0.01)]);
    assert!(builtin_with_params(SignalKind::LimitUpOpened, &params).is_err());

    let typo = HashMap::from([("dorp", 0.02)]);
    let err = builtin_with_params(SignalKind::SuddenDropOnVolume, &typo).unwrap_err();
    assert!(matches!(err, SignalError::InvalidConfig(_)));
  }
}
