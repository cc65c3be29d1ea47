//! Tunable detector parameters and their accepted bounds
//!
//! Each detector lists its tunables as [`ParamMeta`] and reports the values
//! it currently holds. [`ParameterizedDetector::validate_params`] checks one
//! against the other; [`ScanConfig::validate`](crate::config::ScanConfig::validate)
//! and [`EngineBuilder::build`](crate::EngineBuilder::build) run it, so a value
//! outside its bounds is rejected before any scan starts.
//!
//! ```rust
//! use yacpi::params::ParameterizedDetector;
//! use yacpi::prelude::*;
//!
//! for param in Nr7BreakoutDetector::param_meta() {
//!     println!("{} in [{}, {}] (default {})", param.name, param.min, param.max, param.default);
//! }
//! assert!(Nr7BreakoutDetector::default().validate_params().is_ok());
//! ```

use crate::{PatternError, Percent, Result};

/// Kind of value a parameter holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
  /// Percentage points (0.0..=100.0)
  Percent,
  /// Whole count of bars or calendar days
  Period,
}

/// Bounds and documentation for one detector parameter
#[derive(Debug, Clone)]
pub struct ParamMeta {
  /// Matches the [`ScanConfig`](crate::config::ScanConfig) field it comes from
  pub name: &'static str,
  pub param_type: ParamType,
  pub default: f64,
  /// Inclusive lower bound
  pub min: f64,
  /// Inclusive upper bound
  pub max: f64,
  pub description: &'static str,
}

impl ParamMeta {
  /// Check `value` against the bounds and the parameter type.
  pub fn check(&self, value: f64) -> Result<()> {
    match self.param_type {
      ParamType::Percent => {
        Percent::new(value)?;
      },
      ParamType::Period => {
        if value < 1.0 || value.fract() != 0.0 {
          return Err(PatternError::InvalidValue("Period must be a positive integer"));
        }
      },
    }
    if value < self.min || value > self.max {
      return Err(PatternError::OutOfRange {
        field: self.name,
        value,
        min: self.min,
        max: self.max,
      });
    }
    Ok(())
  }
}

/// Detector with bounded, documented parameters
pub trait ParameterizedDetector {
  /// Metadata for every tunable parameter
  fn param_meta() -> &'static [ParamMeta];

  /// Current value of each parameter, by [`ParamMeta::name`]
  fn param_values(&self) -> Vec<(&'static str, f64)>;

  fn detector_id_str() -> &'static str;

  /// Check every current value against its metadata.
  ///
  /// Failures come back as [`PatternError::InvalidConfig`] naming the detector.
  fn validate_params(&self) -> Result<()> {
    let meta = Self::param_meta();
    for (name, value) in self.param_values() {
      let Some(param) = meta.iter().find(|m| m.name == name) else {
        return Err(PatternError::InvalidConfig(format!(
          "{}: unknown parameter {name}",
          Self::detector_id_str()
        )));
      };
      param
        .check(value)
        .map_err(|e| PatternError::InvalidConfig(format!("{}: {e}", Self::detector_id_str())))?;
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::detectors::{FibonacciMatcher, Nr7BreakoutDetector};

  static DAYS: ParamMeta = ParamMeta {
    name: "days",
    param_type: ParamType::Period,
    default: 7.0,
    min: 3.0,
    max: 14.0,
    description: "Test days",
  };

  static TOLERANCE: ParamMeta = ParamMeta {
    name: "tolerance",
    param_type: ParamType::Percent,
    default: 2.0,
    min: 0.5,
    max: 5.0,
    description: "Test tolerance",
  };

  struct Fixed(Vec<(&'static str, f64)>);

  impl ParameterizedDetector for Fixed {
    fn param_meta() -> &'static [ParamMeta] {
      std::slice::from_ref(&DAYS)
    }

    fn param_values(&self) -> Vec<(&'static str, f64)> {
      self.0.clone()
    }

    fn detector_id_str() -> &'static str {
      "FIXED"
    }
  }

  #[test]
  fn test_check_period() {
    assert!(DAYS.check(7.0).is_ok());
    assert!(DAYS.check(3.0).is_ok());
    assert!(DAYS.check(14.0).is_ok());
    assert!(DAYS.check(7.5).is_err());
    assert!(matches!(DAYS.check(2.0), Err(PatternError::OutOfRange { .. })));
    assert!(matches!(DAYS.check(15.0), Err(PatternError::OutOfRange { .. })));
  }

  #[test]
  fn test_check_percent() {
    assert!(TOLERANCE.check(0.5).is_ok());
    assert!(TOLERANCE.check(5.0).is_ok());
    assert!(TOLERANCE.check(0.4).is_err());
    assert!(TOLERANCE.check(f64::NAN).is_err());
  }

  #[test]
  fn test_validate_params_names_detector() {
    assert!(Fixed(vec![("days", 10.0)]).validate_params().is_ok());

    match Fixed(vec![("days", 20.0)]).validate_params() {
      Err(PatternError::InvalidConfig(msg)) => assert!(msg.starts_with("FIXED: days")),
      other => panic!("unexpected: {other:?}"),
    }
    assert!(matches!(
      Fixed(vec![("weeks", 1.0)]).validate_params(),
      Err(PatternError::InvalidConfig(_))
    ));
  }

  #[test]
  fn test_detector_defaults_within_bounds() {
    for meta in Nr7BreakoutDetector::param_meta().iter().chain(FibonacciMatcher::param_meta()) {
      assert!(meta.check(meta.default).is_ok(), "{} default out of range", meta.name);
    }
    assert!(Nr7BreakoutDetector::default().validate_params().is_ok());
    assert!(FibonacciMatcher::default().validate_params().is_ok());
  }
}
