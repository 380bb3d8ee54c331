//! Intraday signal detectors
//!
//! # Categories
//!
//! - **Sell (6)**: stagnation at highs, first pullback, weak rebound,
//!   end-of-day breakdown, sudden drop on volume, limit-up opened
//! - **Buy (4)**: low-level breakout, acceleration, volume surge,
//!   end-of-day rush
//!
//! Tick-level detectors read the series directly; the stagnation and breakout
//! detectors read the 5-minute buckets carried in [`crate::DetectionInput`].

pub mod helpers;

/// Generate `with_defaults()` -> `Self::default()` for multiple detector types.
macro_rules! impl_with_defaults {
  ($($detector:ty),* $(,)?) => {
    $(impl $detector {
      pub fn with_defaults() -> Self { Self::default() }
    })*
  };
}

pub mod buy;
pub mod sell;

pub use buy::*;
pub use sell::*;
