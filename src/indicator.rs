//! Composite pattern indicator (CPI)
//!
//! Turns signal buckets into a bull-share percentage per day, classifies it,
//! and derives the marker values a chart would plot for the chosen
//! [`DisplayMode`].

use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::{aggregate::SignalBucket, config::ScanConfig, Direction, PatternError, Percent, Result};

/// Which markers accompany the percent line
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DisplayMode {
    /// Markers only where the classification flips
    #[default]
    ShowChanges,
    /// A marker on every Bullish or Bearish day
    ShowAll,
    /// No markers
    ShowIndicatorOnly,
}

/// One day of the CPI series
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CpiPoint {
    pub date: NaiveDateTime,
    pub percent: u32,
    pub classification: Direction,
    /// Close on plotted Bullish days, else 0
    pub bull_plot: f64,
    /// Close on plotted Bearish days, else 0
    pub bear_plot: f64,
}

/// Whether the scan had enough data to produce a series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataStatus {
    Ready,
    InsufficientBars { need: usize, got: usize },
    /// No bar falls inside the scan window
    EmptyWindow,
}

/// State at the end of the scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpiSummary {
    pub last_percent: u32,
    pub last_classification: Direction,
    /// Counts of the final bucket
    pub bull: u32,
    pub bear: u32,
    pub pending: u32,
    /// NR7 setups still open when the series ended
    pub indeterminate: usize,
}

impl fmt::Display for CpiSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CPI {}% {} | bullish {}, bearish {}, awaiting breakout {}",
            self.last_percent, self.last_classification, self.bull, self.bear, self.pending
        )?;
        if self.indeterminate > 0 {
            write!(f, ", indeterminate {}", self.indeterminate)?;
        }
        Ok(())
    }
}

/// Output of the CPI pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CpiReport {
    pub status: DataStatus,
    pub points: Vec<CpiPoint>,
    /// Present when `status` is `Ready`
    pub summary: Option<CpiSummary>,
}

impl CpiReport {
    pub fn insufficient(need: usize, got: usize) -> Self {
        Self {
            status: DataStatus::InsufficientBars { need, got },
            points: Vec::new(),
            summary: None,
        }
    }

    pub fn empty_window() -> Self {
        Self {
            status: DataStatus::EmptyWindow,
            points: Vec::new(),
            summary: None,
        }
    }

    #[inline]
    pub fn is_ready(&self) -> bool {
        self.status == DataStatus::Ready
    }

    /// Text for a status line, covering the no-data cases
    pub fn summary_text(&self) -> String {
        match (self.status, &self.summary) {
            (DataStatus::Ready, Some(summary)) => summary.to_string(),
            (DataStatus::Ready, None) | (DataStatus::EmptyWindow, _) => {
                "No bars in scan window".to_string()
            }
            (DataStatus::InsufficientBars { got: 0, .. }, _) => "No data".to_string(),
            (DataStatus::InsufficientBars { need, got }, _) => {
                format!("Insufficient data: need {need} bars, got {got}")
            }
        }
    }
}

/// Percent oscillator over signal buckets
#[derive(Debug, Clone)]
pub struct CompositeIndicator {
    pub mode: DisplayMode,
    pub bullish_threshold: Percent,
    pub bearish_threshold: Percent,
}

impl Default for CompositeIndicator {
    fn default() -> Self {
        Self {
            mode: DisplayMode::default(),
            bullish_threshold: Percent::new_const(65.0),
            bearish_threshold: Percent::new_const(35.0),
        }
    }
}

impl CompositeIndicator {
    pub fn from_config(config: &ScanConfig) -> Self {
        Self {
            mode: config.display_mode,
            bullish_threshold: config.bullish_threshold,
            bearish_threshold: config.bearish_threshold,
        }
    }

    pub fn validate_config(&self) -> Result<()> {
        if self.bearish_threshold >= self.bullish_threshold {
            return Err(PatternError::InvalidConfig(
                "bearish threshold must be below bullish threshold".to_string(),
            ));
        }
        Ok(())
    }

    /// Rounded bull share of directional signals; `None` without any.
    #[inline]
    pub fn percent_of(bull: u32, bear: u32) -> Option<u32> {
        let total = u64::from(bull) + u64::from(bear);
        (total > 0).then(|| (100.0 * f64::from(bull) / total as f64).round() as u32)
    }

    #[inline]
    pub fn classify(&self, percent: u32) -> Direction {
        let p = f64::from(percent);
        if p >= self.bullish_threshold.get() {
            Direction::Bullish
        } else if p <= self.bearish_threshold.get() {
            Direction::Bearish
        } else {
            Direction::Neutral
        }
    }

    /// CPI series for `buckets`. Days without directional signals carry the previous percent.
    pub fn compute(&self, buckets: &[SignalBucket], mode: DisplayMode) -> Vec<CpiPoint> {
        let mut points = Vec::with_capacity(buckets.len());
        let mut percent = 0;
        let mut previous: Option<Direction> = None;

        for bucket in buckets {
            if let Some(p) = Self::percent_of(bucket.bull, bucket.bear) {
                percent = p;
            }
            let classification = self.classify(percent);
            let repeated = mode == DisplayMode::ShowChanges && previous == Some(classification);

            let (bull_plot, bear_plot) = match (mode, classification) {
                (DisplayMode::ShowIndicatorOnly, _) => (0.0, 0.0),
                _ if repeated => (0.0, 0.0),
                (_, Direction::Bullish) => (bucket.close, 0.0),
                (_, Direction::Bearish) => (0.0, bucket.close),
                (_, Direction::Neutral) => (0.0, 0.0),
            };

            previous = Some(classification);
            points.push(CpiPoint {
                date: bucket.date,
                percent,
                classification,
                bull_plot,
                bear_plot,
            });
        }

        points
    }

    pub fn summarize(
        &self,
        buckets: &[SignalBucket],
        points: &[CpiPoint],
        indeterminate: usize,
    ) -> Option<CpiSummary> {
        let bucket = buckets.last()?;
        let point = points.last()?;
        Some(CpiSummary {
            last_percent: point.percent,
            last_classification: point.classification,
            bull: bucket.bull,
            bear: bucket.bear,
            pending: bucket.pending,
            indeterminate,
        })
    }

    /// Series plus summary
    pub fn report(
        &self,
        buckets: &[SignalBucket],
        mode: DisplayMode,
        indeterminate: usize,
    ) -> CpiReport {
        if buckets.is_empty() {
            return CpiReport::empty_window();
        }
        let points = self.compute(buckets, mode);
        let summary = self.summarize(buckets, &points, indeterminate);
        CpiReport {
            status: DataStatus::Ready,
            points,
            summary,
        }
    }
}
