//! Scan configuration
//!
//! Everything a scan needs besides the bars themselves is carried here and
//! passed explicitly into the engine. Configurations deserialize from any
//! serde format; missing fields fall back to the defaults below.
//!
//! ```rust
//! use yacpi::config::ScanConfig;
//!
//! let config: ScanConfig = serde_json::from_str(r#"{ "breakout_window_days": 5 }"#).unwrap();
//! assert_eq!(config.breakout_window_days.get(), 5);
//! assert!(config.validate().is_ok());
//! ```

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::{
    detectors::{FibonacciMatcher, LevelFilter, Nr7BreakoutDetector},
    indicator::DisplayMode,
    PatternError, Percent, Period, Result,
};

/// Inclusive calendar-day range a CPI scan covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl ScanWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        let window = Self { start, end };
        window.validate()?;
        Ok(window)
    }

    #[inline]
    pub fn contains(&self, date: NaiveDateTime) -> bool {
        let day = date.date();
        self.start <= day && day <= self.end
    }

    pub fn validate(&self) -> Result<()> {
        if self.start > self.end {
            return Err(PatternError::InvalidConfig(format!(
                "scan window start {} is after end {}",
                self.start, self.end
            )));
        }
        Ok(())
    }
}

/// Full configuration for both pipelines
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// CPI window; `None` scans the whole series
    pub window: Option<ScanWindow>,
    pub display_mode: DisplayMode,
    /// Calendar days an NR7 setup may wait for its breakout
    pub breakout_window_days: Period,
    /// CPI percent at or above which a day is Bullish
    pub bullish_threshold: Percent,
    /// CPI percent at or below which a day is Bearish
    pub bearish_threshold: Percent,
    /// Bars on each side a swing point must dominate
    pub min_separation_bars: Period,
    pub retrace: LevelFilter,
    pub extension: LevelFilter,
    /// Check prices and date order before scanning
    pub validate_data: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            window: None,
            display_mode: DisplayMode::default(),
            breakout_window_days: Period::new_const(7),
            bullish_threshold: Percent::new_const(65.0),
            bearish_threshold: Percent::new_const(35.0),
            min_separation_bars: Period::new_const(5),
            retrace: LevelFilter::default(),
            extension: LevelFilter::default(),
            validate_data: true,
        }
    }
}

impl ScanConfig {
    /// Reject a configuration no scan should run with.
    pub fn validate(&self) -> Result<()> {
        if let Some(window) = &self.window {
            window.validate()?;
        }
        Nr7BreakoutDetector::from_config(self).validate_config()?;
        FibonacciMatcher::from_config(self).validate_config()?;
        if self.bearish_threshold >= self.bullish_threshold {
            return Err(PatternError::InvalidConfig(format!(
                "bearish threshold {} must be below bullish threshold {}",
                self.bearish_threshold.get(),
                self.bullish_threshold.get()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::FibLevel;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = ScanConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.breakout_window_days.get(), 7);
        assert_eq!(config.bullish_threshold.get(), 65.0);
        assert_eq!(config.bearish_threshold.get(), 35.0);
    }

    #[test]
    fn test_window_contains_is_inclusive() {
        let window = ScanWindow::new(date(2024, 3, 1), date(2024, 3, 31)).unwrap();
        assert!(window.contains(date(2024, 3, 1).and_hms_opt(0, 0, 0).unwrap()));
        assert!(window.contains(date(2024, 3, 31).and_hms_opt(23, 59, 0).unwrap()));
        assert!(!window.contains(date(2024, 4, 1).and_hms_opt(0, 0, 0).unwrap()));
        assert!(!window.contains(date(2024, 2, 29).and_hms_opt(16, 0, 0).unwrap()));
    }

    #[test]
    fn test_inverted_window_rejected() {
        assert!(ScanWindow::new(date(2024, 3, 2), date(2024, 3, 1)).is_err());
    }

    #[test]
    fn test_inverted_thresholds_rejected() {
        let config = ScanConfig {
            bullish_threshold: Percent::new_const(40.0),
            bearish_threshold: Percent::new_const(60.0),
            ..ScanConfig::default()
        };
        assert!(matches!(config.validate(), Err(PatternError::InvalidConfig(_))));
    }

    #[test]
    fn test_deserialize_partial_json() {
        let json = r#"{
            "window": { "start": "2024-01-01", "end": "2024-06-30" },
            "display_mode": "ShowAll",
            "retrace": { "match_all": false, "levels": ["50", "62"], "tolerance": 1.5 },
            "extension": { "match_all": true }
        }"#;
        let config: ScanConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.window.unwrap().start, date(2024, 1, 1));
        assert_eq!(config.display_mode, DisplayMode::ShowAll);
        assert_eq!(config.retrace.levels, vec![FibLevel::Level50, FibLevel::Level62]);
        assert_eq!(config.retrace.tolerance.get(), 1.5);
        assert!(config.extension.match_all);
        assert_eq!(config.breakout_window_days.get(), 7);
    }

    #[test]
    fn test_deserialize_rejects_zero_period() {
        let result: std::result::Result<ScanConfig, _> =
            serde_json::from_str(r#"{ "min_separation_bars": 0 }"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_deserialize_rejects_tolerance_out_of_range() {
        let result: std::result::Result<ScanConfig, _> =
            serde_json::from_str(r#"{ "retrace": { "tolerance": 120.0 } }"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_oversized_breakout_window_rejected() {
        let config: ScanConfig =
            serde_json::from_str(r#"{ "breakout_window_days": 200000000 }"#).unwrap();
        match config.validate() {
            Err(PatternError::InvalidConfig(msg)) => {
                assert!(msg.contains("breakout_window_days"), "{msg}")
            }
            other => panic!("unexpected: {other:?}"),
        }

        let config: ScanConfig =
            serde_json::from_str(r#"{ "breakout_window_days": 30 }"#).unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_wide_tolerance_rejected() {
        let config: ScanConfig =
            serde_json::from_str(r#"{ "extension": { "tolerance": 40.0 } }"#).unwrap();
        assert!(matches!(config.validate(), Err(PatternError::InvalidConfig(_))));
    }
}
