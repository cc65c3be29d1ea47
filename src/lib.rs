//! # YACPI - Yet Another Composite Pattern Indicator
//!
//! NR7 breakout and Fibonacci retracement/extension detection over daily or
//! intraday OHLCV series.
//!
//! Two pipelines run over the same read-only bars:
//!
//! - **CPI**: NR7 narrow-range setups are tracked until they break out (or time
//!   out), the outcome is attributed to per-day signal buckets, and the buckets
//!   are turned into a bull/bear percentage oscillator.
//! - **Fibonacci**: swing tops and bottoms are paired into turning-point triples
//!   whose retracement/extension ratio is matched against 38/50/62% levels.
//!
//! ## Quick Start
//!
//! ```rust
//! use chrono::{Duration, NaiveDate};
//! use yacpi::prelude::*;
//!
//! let day = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap().and_hms_opt(0, 0, 0).unwrap();
//! let bars: Vec<Bar> = (0..30)
//!     .map(|i| Bar::new(day + Duration::days(i), 100.0, 101.0, 99.0, 100.5, 1_000))
//!     .collect();
//!
//! let engine = EngineBuilder::new().build().unwrap();
//!
//! let report = engine.scan_cpi(&bars).unwrap();
//! println!("{}", report.summary_text());
//!
//! let matches = engine.scan_fibonacci("DEMO", &bars).unwrap();
//! assert!(matches.is_empty());
//! ```

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{NaiveDate, NaiveDateTime};
use tracing::{debug, info, warn};

pub mod aggregate;
pub mod config;
pub mod detectors;
pub mod indicator;
pub mod params;

pub mod prelude {
    pub use crate::{
        // Aggregation
        aggregate::{SignalAggregator, SignalBucket},
        // Configuration
        config::{ScanConfig, ScanWindow},
        // Detectors
        detectors::*,
        // Indicator
        indicator::{CompositeIndicator, CpiPoint, CpiReport, CpiSummary, DataStatus, DisplayMode},
        // Parameters
        params::{ParamMeta, ParamType, ParameterizedDetector},
        // Batch
        scan_batch,
        scan_parallel,
        validate_series,
        // Types
        Bar,
        Direction,
        // Engine
        EngineBuilder,
        OHLCVExt,
        // Errors
        PatternError,
        Percent,
        Period,
        Result,
        ScanEngine,
        ScanError,
        ScanResult,
        OHLCV,
    };
}

// ============================================================
// ERRORS
// ============================================================

pub type Result<T> = std::result::Result<T, PatternError>;

/// Errors that can occur during a scan
#[derive(Debug, Clone, thiserror::Error)]
pub enum PatternError {
    #[error("Invalid value: {0}")]
    InvalidValue(&'static str),

    #[error("{field} = {value} out of range [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Invalid OHLCV at index {index}: {reason}")]
    InvalidOHLCV { index: usize, reason: &'static str },

    #[error("Bar index {index} out of range for series of {len} bars")]
    IndexOutOfRange { index: usize, len: usize },
}

// ============================================================
// VALIDATED TYPES
// ============================================================

/// Percentage value in range 0.0..=100.0
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Percent(f64);

impl Percent {
    /// Create a new Percent, validating the value is in [0.0, 100.0]
    pub fn new(value: f64) -> Result<Self> {
        if value.is_nan() || value.is_infinite() {
            return Err(PatternError::InvalidValue(
                "Percent cannot be NaN or infinite",
            ));
        }
        if !(0.0..=100.0).contains(&value) {
            return Err(PatternError::OutOfRange {
                field: "Percent",
                value,
                min: 0.0,
                max: 100.0,
            });
        }
        Ok(Self(value))
    }

    /// Create a Percent from a compile-time constant (library internal use)
    #[doc(hidden)]
    pub const fn new_const(value: f64) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> f64 {
        self.0
    }
}

impl serde::Serialize for Percent {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> serde::Deserialize<'de> for Percent {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = f64::deserialize(d)?;
        Percent::new(value).map_err(serde::de::Error::custom)
    }
}

/// Period (must be > 0)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Period(usize);

impl Period {
    /// Create a new Period, validating value is > 0
    pub fn new(value: usize) -> Result<Self> {
        if value == 0 {
            return Err(PatternError::InvalidValue("Period must be > 0"));
        }
        Ok(Self(value))
    }

    #[doc(hidden)]
    pub const fn new_const(value: usize) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> usize {
        self.0
    }
}

impl serde::Serialize for Period {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> serde::Deserialize<'de> for Period {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = usize::deserialize(d)?;
        Period::new(value).map_err(serde::de::Error::custom)
    }
}

// ============================================================
// OHLCV TRAITS
// ============================================================

/// Core OHLCV data trait
///
/// Bars are expected in strictly ascending `date()` order; see [`validate_series`].
pub trait OHLCV {
    fn open(&self) -> f64;
    fn high(&self) -> f64;
    fn low(&self) -> f64;
    fn close(&self) -> f64;
    fn volume(&self) -> u64;
    fn date(&self) -> NaiveDateTime;
}

/// Extension trait with computed properties for OHLCV data
pub trait OHLCVExt: OHLCV {
    #[inline]
    fn range(&self) -> f64 {
        self.high() - self.low()
    }

    /// Calendar day of the bar
    #[inline]
    fn day(&self) -> NaiveDate {
        self.date().date()
    }

    /// Validate OHLCV data consistency
    fn validate(&self) -> Result<()> {
        if self.open().is_nan()
            || self.high().is_nan()
            || self.low().is_nan()
            || self.close().is_nan()
        {
            return Err(PatternError::InvalidOHLCV {
                index: 0,
                reason: "NaN in OHLCV",
            });
        }
        if self.open().is_infinite()
            || self.high().is_infinite()
            || self.low().is_infinite()
            || self.close().is_infinite()
        {
            return Err(PatternError::InvalidOHLCV {
                index: 0,
                reason: "Infinite value in OHLCV",
            });
        }
        if self.high() < self.low() {
            return Err(PatternError::InvalidOHLCV {
                index: 0,
                reason: "high < low",
            });
        }
        Ok(())
    }
}

impl<T: OHLCV> OHLCVExt for T {}

/// A single OHLCV observation
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Bar {
    pub date: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

impl Bar {
    pub fn new(date: NaiveDateTime, open: f64, high: f64, low: f64, close: f64, volume: u64) -> Self {
        Self {
            date,
            open,
            high,
            low,
            close,
            volume,
        }
    }
}

impl OHLCV for Bar {
    fn open(&self) -> f64 {
        self.open
    }

    fn high(&self) -> f64 {
        self.high
    }

    fn low(&self) -> f64 {
        self.low
    }

    fn close(&self) -> f64 {
        self.close
    }

    fn volume(&self) -> u64 {
        self.volume
    }

    fn date(&self) -> NaiveDateTime {
        self.date
    }
}

/// Validate every bar and the strictly ascending date order of the series
pub fn validate_series<T: OHLCV>(bars: &[T]) -> Result<()> {
    for (i, bar) in bars.iter().enumerate() {
        bar.validate().map_err(|e| match e {
            PatternError::InvalidOHLCV { reason, .. } => {
                PatternError::InvalidOHLCV { index: i, reason }
            }
            other => other,
        })?;
    }
    if let Some(i) = bars.windows(2).position(|w| w[0].date() >= w[1].date()) {
        return Err(PatternError::InvalidOHLCV {
            index: i + 1,
            reason: "dates not strictly ascending",
        });
    }
    Ok(())
}

// ============================================================
// CLASSIFICATION
// ============================================================

/// Sentiment classification of a CPI reading
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Direction {
    Bullish,
    #[default]
    Neutral,
    Bearish,
}

impl Direction {
    #[inline]
    pub fn is_bullish(self) -> bool {
        matches!(self, Direction::Bullish)
    }

    #[inline]
    pub fn is_bearish(self) -> bool {
        matches!(self, Direction::Bearish)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Direction::Bullish => "Bullish",
            Direction::Neutral => "Neutral",
            Direction::Bearish => "Bearish",
        })
    }
}

// ============================================================
// SCAN ENGINE
// ============================================================

use aggregate::SignalAggregator;
use config::{ScanConfig, ScanWindow};
use detectors::*;
use indicator::{CompositeIndicator, CpiReport, DisplayMode};

/// Main scan engine. Holds one detector per pipeline, all built from a validated [`ScanConfig`].
pub struct ScanEngine<F: SwingPointFinder = PivotSwingFinder> {
    nr7: Nr7BreakoutDetector,
    fibonacci: FibonacciMatcher,
    indicator: CompositeIndicator,
    swing_finder: F,
    config: ScanConfig,
}

impl<F: SwingPointFinder> ScanEngine<F> {
    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub fn nr7(&self) -> &Nr7BreakoutDetector {
        &self.nr7
    }

    pub fn fibonacci(&self) -> &FibonacciMatcher {
        &self.fibonacci
    }

    pub fn indicator(&self) -> &CompositeIndicator {
        &self.indicator
    }

    // ===========================================
    // CPI pipeline
    // ===========================================

    /// Run the CPI pipeline over the configured scan window.
    pub fn scan_cpi<T: OHLCV>(&self, bars: &[T]) -> Result<CpiReport> {
        self.scan_cpi_window(bars, self.config.window.as_ref())
    }

    /// Run the CPI pipeline over an explicit window (`None` = whole series).
    pub fn scan_cpi_window<T: OHLCV>(
        &self,
        bars: &[T],
        window: Option<&ScanWindow>,
    ) -> Result<CpiReport> {
        self.run_cpi(bars, window, self.indicator.mode)
    }

    /// Run the CPI pipeline with a display mode other than the configured one.
    pub fn scan_cpi_with_mode<T: OHLCV>(&self, bars: &[T], mode: DisplayMode) -> Result<CpiReport> {
        self.run_cpi(bars, self.config.window.as_ref(), mode)
    }

    fn run_cpi<T: OHLCV>(
        &self,
        bars: &[T],
        window: Option<&ScanWindow>,
        mode: DisplayMode,
    ) -> Result<CpiReport> {
        if self.config.validate_data {
            validate_series(bars)?;
        }
        if bars.len() < Nr7BreakoutDetector::MIN_BARS {
            return Ok(CpiReport::insufficient(Nr7BreakoutDetector::MIN_BARS, bars.len()));
        }

        let mut aggregator = SignalAggregator::new(bars, window, self.nr7.breakout_window());
        if aggregator.is_empty() {
            return Ok(CpiReport::empty_window());
        }

        let mut indeterminate = 0;
        for (i, bar) in bars.iter().enumerate().skip(Nr7BreakoutDetector::MIN_BARS - 1) {
            if !window.map_or(true, |w| w.contains(bar.date())) {
                continue;
            }
            match self.nr7.evaluate(bars, i) {
                Nr7Outcome::Resolved(m) => aggregator.apply_signal(bars, &m),
                Nr7Outcome::Indeterminate => indeterminate += 1,
                Nr7Outcome::NotQualified => {}
            }
        }

        debug!(
            buckets = aggregator.len(),
            attributed = aggregator.attributed(),
            dropped = aggregator.dropped(),
            indeterminate,
            "CPI scan complete"
        );

        Ok(self.indicator.report(aggregator.buckets(), mode, indeterminate))
    }

    // ===========================================
    // Fibonacci pipeline
    // ===========================================

    /// Find swing points with the configured finder and separation.
    pub fn find_swings<T: OHLCV>(&self, bars: &[T]) -> SwingPoints {
        self.swing_finder
            .find_swings(bars, self.config.min_separation_bars.get())
    }

    /// Run the Fibonacci pipeline using the engine's swing finder.
    pub fn scan_fibonacci<T: OHLCV>(
        &self,
        symbol: &str,
        bars: &[T],
    ) -> Result<Vec<RetracementExtensionResult>> {
        if self.config.validate_data {
            validate_series(bars)?;
        }
        let swings = self.find_swings(bars);
        self.fibonacci.scan(symbol, bars, &swings)
    }

    /// Run the Fibonacci pipeline with swing points computed elsewhere.
    pub fn scan_fibonacci_with<T: OHLCV>(
        &self,
        symbol: &str,
        bars: &[T],
        swings: &SwingPoints,
    ) -> Result<Vec<RetracementExtensionResult>> {
        if self.config.validate_data {
            validate_series(bars)?;
        }
        self.fibonacci.scan(symbol, bars, swings)
    }

    // ===========================================
    // Both pipelines
    // ===========================================

    /// Scan one instrument with both pipelines.
    pub fn scan_symbol<T: OHLCV>(&self, symbol: &str, bars: &[T]) -> Result<ScanResult> {
        let cpi = self.scan_cpi(bars)?;
        let fibonacci = self.scan_fibonacci(symbol, bars)?;
        Ok(ScanResult {
            symbol: symbol.to_string(),
            cpi,
            fibonacci,
        })
    }
}

// ============================================================
// BUILDER
// ============================================================

/// Builder for creating ScanEngine instances
pub struct EngineBuilder<F: SwingPointFinder = PivotSwingFinder> {
    swing_finder: F,
    config: ScanConfig,
}

impl Default for EngineBuilder<PivotSwingFinder> {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineBuilder<PivotSwingFinder> {
    pub fn new() -> Self {
        Self {
            swing_finder: PivotSwingFinder,
            config: ScanConfig::default(),
        }
    }
}

impl<F: SwingPointFinder> EngineBuilder<F> {
    /// Change swing point finder
    pub fn swing_finder<F2: SwingPointFinder>(self, finder: F2) -> EngineBuilder<F2> {
        EngineBuilder {
            swing_finder: finder,
            config: self.config,
        }
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: ScanConfig) -> Self {
        self.config = config;
        self
    }

    /// Restrict the CPI pipeline to an inclusive calendar-day window
    pub fn window(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.config.window = Some(ScanWindow { start, end });
        self
    }

    pub fn display_mode(mut self, mode: DisplayMode) -> Self {
        self.config.display_mode = mode;
        self
    }

    /// Calendar days an NR7 setup may wait for its breakout
    pub fn breakout_window_days(mut self, days: Period) -> Self {
        self.config.breakout_window_days = days;
        self
    }

    pub fn min_separation_bars(mut self, bars: Period) -> Self {
        self.config.min_separation_bars = bars;
        self
    }

    pub fn retrace_filter(mut self, filter: LevelFilter) -> Self {
        self.config.retrace = filter;
        self
    }

    pub fn extension_filter(mut self, filter: LevelFilter) -> Self {
        self.config.extension = filter;
        self
    }

    /// Enable/disable data validation
    pub fn validate_data(mut self, enable: bool) -> Self {
        self.config.validate_data = enable;
        self
    }

    /// Build the engine
    pub fn build(self) -> Result<ScanEngine<F>> {
        self.config.validate()?;
        let engine = ScanEngine {
            nr7: Nr7BreakoutDetector::from_config(&self.config),
            fibonacci: FibonacciMatcher::from_config(&self.config),
            indicator: CompositeIndicator::from_config(&self.config),
            swing_finder: self.swing_finder,
            config: self.config,
        };
        engine.nr7.validate_config()?;
        engine.fibonacci.validate_config()?;
        engine.indicator.validate_config()?;
        Ok(engine)
    }
}

// ============================================================
// BATCH SCANNING
// ============================================================

use rayon::prelude::*;

/// Result of scanning a single instrument
#[derive(Debug, Clone, serde::Serialize)]
pub struct ScanResult {
    pub symbol: String,
    pub cpi: CpiReport,
    pub fibonacci: Vec<RetracementExtensionResult>,
}

/// Error from scanning a single instrument
#[derive(Debug, Clone, thiserror::Error)]
#[error("{symbol}: {error}")]
pub struct ScanError {
    pub symbol: String,
    pub error: PatternError,
}

fn scan_one<T: OHLCV, F: SwingPointFinder>(
    engine: &ScanEngine<F>,
    symbol: &str,
    bars: &[T],
) -> std::result::Result<ScanResult, ScanError> {
    engine.scan_symbol(symbol, bars).map_err(|error| {
        warn!(symbol, %error, "symbol scan failed");
        ScanError {
            symbol: symbol.to_string(),
            error,
        }
    })
}

fn split_outcomes(
    outcomes: Vec<std::result::Result<ScanResult, ScanError>>,
) -> (Vec<ScanResult>, Vec<ScanError>) {
    let mut successes = Vec::new();
    let mut errors = Vec::new();

    for outcome in outcomes {
        match outcome {
            Ok(r) => successes.push(r),
            Err(e) => errors.push(e),
        }
    }

    (successes, errors)
}

/// Sequential scanning of multiple instruments.
///
/// `stop` is checked between symbols only; a symbol already being scanned runs to completion.
pub fn scan_batch<'a, T, I, F>(
    engine: &ScanEngine<F>,
    instruments: I,
    stop: &AtomicBool,
) -> (Vec<ScanResult>, Vec<ScanError>)
where
    T: OHLCV + 'a,
    I: IntoIterator<Item = (&'a str, &'a [T])>,
    F: SwingPointFinder,
{
    let mut outcomes = Vec::new();
    for (symbol, bars) in instruments {
        if stop.load(Ordering::Relaxed) {
            info!(scanned = outcomes.len(), "batch scan stopped on request");
            break;
        }
        outcomes.push(scan_one(engine, symbol, bars));
    }
    split_outcomes(outcomes)
}

/// Parallel scanning of multiple instruments.
///
/// Symbols not yet started when `stop` is set are skipped.
pub fn scan_parallel<'a, T, I, F>(
    engine: &ScanEngine<F>,
    instruments: I,
    stop: &AtomicBool,
) -> (Vec<ScanResult>, Vec<ScanError>)
where
    T: OHLCV + Sync + 'a,
    I: IntoParallelIterator<Item = (&'a str, &'a [T])>,
    F: SwingPointFinder + Sync,
{
    let outcomes: Vec<_> = instruments
        .into_par_iter()
        .filter(|_| !stop.load(Ordering::Relaxed))
        .map(|(symbol, bars)| scan_one(engine, symbol, bars))
        .collect();

    split_outcomes(outcomes)
}

// ============================================================
// TYPE ALIASES
// ============================================================

/// Default engine with PivotSwingFinder
pub type DefaultEngine = ScanEngine<PivotSwingFinder>;

// ============================================================
// TESTS
// ============================================================
