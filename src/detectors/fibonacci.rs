//! Fibonacci retracement/extension matcher
//!
//! Works on turning-point triples built from alternating swing points:
//!
//! - **uptrend**: top, bottom, top, with a later bottom confirming the second top
//! - **downtrend**: bottom, top, bottom, with a later top confirming the second bottom
//!
//! The move from the middle point to the confirmed point is measured against
//! the first leg. Overshooting the first point is an extension, falling short
//! of it a retracement.

use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::helpers::{round_to, LEVEL_EPSILON};
use super::swing::SwingPoints;
use crate::{
    config::ScanConfig,
    params::{ParamMeta, ParamType, ParameterizedDetector},
    PatternError, Percent, Result, OHLCV,
};

impl_with_defaults!(FibonacciMatcher);

// ============================================================
// LEVELS
// ============================================================

/// Fibonacci level a ratio can be matched against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FibLevel {
    #[serde(rename = "38")]
    Level38,
    #[serde(rename = "50")]
    Level50,
    #[serde(rename = "62")]
    Level62,
}

impl FibLevel {
    pub const ALL: [FibLevel; 3] = [FibLevel::Level38, FibLevel::Level50, FibLevel::Level62];

    #[inline]
    pub fn percent(self) -> f64 {
        match self {
            FibLevel::Level38 => 38.0,
            FibLevel::Level50 => 50.0,
            FibLevel::Level62 => 62.0,
        }
    }
}

/// Which family of levels a measurement is checked against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LevelKind {
    Retrace,
    Extension,
}

/// Level selection for one [`LevelKind`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelFilter {
    /// Accept every ratio regardless of levels
    pub match_all: bool,
    pub levels: Vec<FibLevel>,
    /// Allowed distance from a level, in percentage points
    pub tolerance: Percent,
}

impl Default for LevelFilter {
    fn default() -> Self {
        Self {
            match_all: false,
            levels: FibLevel::ALL.to_vec(),
            tolerance: Percent::new_const(2.0),
        }
    }
}

impl LevelFilter {
    /// Accept everything
    pub fn all() -> Self {
        Self {
            match_all: true,
            ..Self::default()
        }
    }

    /// Accept nothing
    pub fn disabled() -> Self {
        Self {
            match_all: false,
            levels: Vec::new(),
            ..Self::default()
        }
    }

    pub fn levels(levels: impl IntoIterator<Item = FibLevel>, tolerance: Percent) -> Self {
        Self {
            match_all: false,
            levels: levels.into_iter().collect(),
            tolerance,
        }
    }

    /// True when `ratio_percent` is within tolerance of an enabled level
    pub fn accepts(&self, ratio_percent: f64) -> bool {
        if self.match_all {
            return true;
        }
        let tolerance = self.tolerance.get() + LEVEL_EPSILON;
        self.levels
            .iter()
            .any(|level| (ratio_percent - level.percent()).abs() <= tolerance)
    }
}

// ============================================================
// TRIPLES AND RESULTS
// ============================================================

/// Label of a matched measurement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FibPatternKind {
    #[serde(rename = "+Extension")]
    UpExtension,
    #[serde(rename = "+Retrace")]
    UpRetrace,
    #[serde(rename = "-Extension")]
    DownExtension,
    #[serde(rename = "-Retrace")]
    DownRetrace,
}

impl FibPatternKind {
    pub fn label(self) -> &'static str {
        match self {
            FibPatternKind::UpExtension => "+Extension",
            FibPatternKind::UpRetrace => "+Retrace",
            FibPatternKind::DownExtension => "-Extension",
            FibPatternKind::DownRetrace => "-Retrace",
        }
    }

    pub fn level_kind(self) -> LevelKind {
        match self {
            FibPatternKind::UpExtension | FibPatternKind::DownExtension => LevelKind::Extension,
            FibPatternKind::UpRetrace | FibPatternKind::DownRetrace => LevelKind::Retrace,
        }
    }
}

impl fmt::Display for FibPatternKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SwingTrend {
    /// top, bottom, top
    Up,
    /// bottom, top, bottom
    Down,
}

/// Three alternating turning points, as bar indices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SwingTriple {
    pub trend: SwingTrend,
    pub first: usize,
    pub middle: usize,
    pub confirm: usize,
}

/// One accepted measurement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetracementExtensionResult {
    pub symbol: String,
    pub last_close: f64,
    pub kind: FibPatternKind,
    pub turn1_date: NaiveDateTime,
    pub turn2_date: NaiveDateTime,
    pub confirm_turn_date: NaiveDateTime,
    /// Ratio in percent, one decimal place
    pub ratio_percent: f64,
}

// ============================================================
// MATCHER
// ============================================================

#[derive(Debug, Clone, Default)]
pub struct FibonacciMatcher {
    pub retrace: LevelFilter,
    pub extension: LevelFilter,
}

impl FibonacciMatcher {
    /// Widest accepted level tolerance, in percentage points
    pub const MAX_TOLERANCE: f64 = 10.0;

    pub fn from_config(config: &ScanConfig) -> Self {
        Self {
            retrace: config.retrace.clone(),
            extension: config.extension.clone(),
        }
    }

    pub fn id(&self) -> &'static str {
        "FIB_RETRACE_EXTENSION"
    }

    pub fn validate_config(&self) -> Result<()> {
        self.validate_params()
    }

    /// All valid triples, ordered by their first turning point.
    ///
    /// A point with no predecessor of the opposite kind is treated as
    /// preceded by one.
    pub fn triples(swings: &SwingPoints) -> Vec<SwingTriple> {
        let tops = &swings.tops;
        let bottoms = &swings.bottoms;
        let mut triples = Vec::new();

        for pair in tops.windows(2) {
            let (t1, t2) = (pair[0], pair[1]);
            for (j, &b) in bottoms.iter().enumerate() {
                if !(t1 < b && b < t2) {
                    continue;
                }
                let confirmed = bottoms.get(j + 1).is_some_and(|&next| t2 < next);
                let preceded = j == 0 || bottoms[j - 1] < t1;
                if confirmed && preceded {
                    triples.push(SwingTriple {
                        trend: SwingTrend::Up,
                        first: t1,
                        middle: b,
                        confirm: t2,
                    });
                }
            }
        }

        for pair in bottoms.windows(2) {
            let (b1, b2) = (pair[0], pair[1]);
            for (i, &t) in tops.iter().enumerate() {
                if !(b1 < t && t < b2) {
                    continue;
                }
                let confirmed = tops.get(i + 1).is_some_and(|&next| b2 < next);
                let preceded = i == 0 || tops[i - 1] < b1;
                if confirmed && preceded {
                    triples.push(SwingTriple {
                        trend: SwingTrend::Down,
                        first: b1,
                        middle: t,
                        confirm: b2,
                    });
                }
            }
        }

        triples.sort_by_key(|t| (t.first, t.middle));
        triples
    }

    /// Classify a triple and compute its ratio. `None` for a zero or negative swing.
    pub fn measure<T: OHLCV>(bars: &[T], triple: &SwingTriple) -> Option<(FibPatternKind, f64)> {
        let first = bars.get(triple.first)?;
        let middle = bars.get(triple.middle)?;
        let confirm = bars.get(triple.confirm)?;

        match triple.trend {
            SwingTrend::Up => {
                let swing = first.high() - middle.low();
                if swing.is_nan() || swing <= 0.0 {
                    return None;
                }
                if confirm.high() > first.high() {
                    Some((
                        FibPatternKind::UpExtension,
                        (confirm.high() - first.high()) / swing,
                    ))
                } else {
                    Some((
                        FibPatternKind::UpRetrace,
                        (confirm.high() - middle.low()) / swing,
                    ))
                }
            }
            SwingTrend::Down => {
                let swing = middle.high() - first.low();
                if swing.is_nan() || swing <= 0.0 {
                    return None;
                }
                if confirm.low() < first.low() {
                    Some((
                        FibPatternKind::DownExtension,
                        (first.low() - confirm.low()) / swing,
                    ))
                } else {
                    Some((
                        FibPatternKind::DownRetrace,
                        (middle.high() - confirm.low()) / swing,
                    ))
                }
            }
        }
    }

    /// Level check for a ratio already expressed in percent.
    pub fn check_values(&self, kind: LevelKind, ratio_percent: f64) -> bool {
        match kind {
            LevelKind::Retrace => self.retrace.accepts(ratio_percent),
            LevelKind::Extension => self.extension.accepts(ratio_percent),
        }
    }

    /// Measure every valid triple and keep the ones passing the level filters.
    pub fn scan<T: OHLCV>(
        &self,
        symbol: &str,
        bars: &[T],
        swings: &SwingPoints,
    ) -> Result<Vec<RetracementExtensionResult>> {
        if let Some(max) = swings.max_index() {
            if max >= bars.len() {
                return Err(PatternError::IndexOutOfRange {
                    index: max,
                    len: bars.len(),
                });
            }
        }
        let Some(last) = bars.last() else {
            return Ok(Vec::new());
        };
        let last_close = last.close();

        let results = Self::triples(swings)
            .iter()
            .filter_map(|triple| {
                let (kind, ratio) = Self::measure(bars, triple)?;
                let ratio_percent = round_to(ratio * 100.0, 1);
                if !self.check_values(kind.level_kind(), ratio_percent) {
                    return None;
                }
                Some(RetracementExtensionResult {
                    symbol: symbol.to_string(),
                    last_close,
                    kind,
                    turn1_date: bars[triple.first].date(),
                    turn2_date: bars[triple.middle].date(),
                    confirm_turn_date: bars[triple.confirm].date(),
                    ratio_percent,
                })
            })
            .collect();

        Ok(results)
    }
}

// ============================================================
// PARAMETERIZED DETECTOR IMPLEMENTATION
// ============================================================

static FIBONACCI_PARAMS: &[ParamMeta] = &[
    ParamMeta {
        name: "retrace_tolerance",
        param_type: ParamType::Percent,
        default: 2.0,
        min: 0.0,
        max: FibonacciMatcher::MAX_TOLERANCE,
        description: "Percentage points a retracement may sit from a level",
    },
    ParamMeta {
        name: "extension_tolerance",
        param_type: ParamType::Percent,
        default: 2.0,
        min: 0.0,
        max: FibonacciMatcher::MAX_TOLERANCE,
        description: "Percentage points an extension may sit from a level",
    },
];

impl ParameterizedDetector for FibonacciMatcher {
    fn param_meta() -> &'static [ParamMeta] {
        FIBONACCI_PARAMS
    }

    fn param_values(&self) -> Vec<(&'static str, f64)> {
        vec![
            ("retrace_tolerance", self.retrace.tolerance.get()),
            ("extension_tolerance", self.extension.tolerance.get()),
        ]
    }

    fn detector_id_str() -> &'static str {
        "FIB_RETRACE_EXTENSION"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Bar;
    use chrono::{Duration, NaiveDate};

    fn day(n: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            + Duration::days(n)
    }

    /// Ten filler bars between 88 and 90 with the given (index, high, low) overrides.
    fn series(points: &[(usize, f64, f64)]) -> Vec<Bar> {
        let mut bars: Vec<Bar> = (0..10)
            .map(|i| Bar::new(day(i), 89.0, 90.0, 88.0, 89.0, 100))
            .collect();
        for &(i, high, low) in points {
            bars[i].high = high;
            bars[i].low = low;
            bars[i].open = low;
            bars[i].close = low;
        }
        bars
    }

    fn uptrend(second_top_high: f64) -> (Vec<Bar>, SwingPoints) {
        let bars = series(&[(1, 100.0, 95.0), (3, 85.0, 80.0), (5, second_top_high, 90.0), (7, 86.0, 84.0)]);
        (bars, SwingPoints::new(vec![1, 5], vec![3, 7]))
    }

    fn matcher(tolerance: f64) -> FibonacciMatcher {
        let filter = LevelFilter::levels(FibLevel::ALL, Percent::new(tolerance).unwrap());
        FibonacciMatcher {
            retrace: filter.clone(),
            extension: filter,
        }
    }

    #[test]
    fn test_uptrend_triple() {
        let swings = SwingPoints::new(vec![1, 5], vec![3, 7]);
        let triples = FibonacciMatcher::triples(&swings);
        assert_eq!(
            triples,
            vec![SwingTriple {
                trend: SwingTrend::Up,
                first: 1,
                middle: 3,
                confirm: 5
            }]
        );
    }

    #[test]
    fn test_unconfirmed_top_is_not_a_triple() {
        let swings = SwingPoints::new(vec![1, 5], vec![3]);
        assert!(FibonacciMatcher::triples(&swings).is_empty());
    }

    #[test]
    fn test_non_alternating_points_rejected() {
        let swings = SwingPoints::new(vec![1, 5], vec![2, 3, 7]);
        assert!(FibonacciMatcher::triples(&swings).is_empty());
    }

    #[test]
    fn test_both_trends_ordered_by_first_point() {
        let swings = SwingPoints::new(vec![1, 5, 9], vec![3, 7]);
        let triples = FibonacciMatcher::triples(&swings);
        let firsts: Vec<_> = triples.iter().map(|t| (t.trend, t.first)).collect();
        assert_eq!(firsts, vec![(SwingTrend::Up, 1), (SwingTrend::Down, 3)]);
    }

    #[test]
    fn test_extension_at_sixty_percent() {
        let (bars, swings) = uptrend(112.0);
        let (kind, ratio) = FibonacciMatcher::measure(&bars, &FibonacciMatcher::triples(&swings)[0]).unwrap();
        assert_eq!(kind, FibPatternKind::UpExtension);
        assert!((ratio - 0.6).abs() < 1e-12);

        let hits = matcher(2.0).scan("TEST", &bars, &swings).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].kind.label(), "+Extension");
        assert_eq!(hits[0].ratio_percent, 60.0);
        assert_eq!(hits[0].turn1_date, day(1));
        assert_eq!(hits[0].turn2_date, day(3));
        assert_eq!(hits[0].confirm_turn_date, day(5));
        assert_eq!(hits[0].last_close, 89.0);

        assert!(matcher(1.9).scan("TEST", &bars, &swings).unwrap().is_empty());
    }

    #[test]
    fn test_retrace_when_second_top_is_lower() {
        let (bars, swings) = uptrend(95.0);
        let (kind, ratio) = FibonacciMatcher::measure(&bars, &FibonacciMatcher::triples(&swings)[0]).unwrap();
        assert_eq!(kind, FibPatternKind::UpRetrace);
        assert!((ratio - 0.75).abs() < 1e-12);

        // 75% is far from every level
        assert!(matcher(2.0).scan("TEST", &bars, &swings).unwrap().is_empty());

        let all = FibonacciMatcher {
            retrace: LevelFilter::all(),
            extension: LevelFilter::disabled(),
        };
        let hits = all.scan("TEST", &bars, &swings).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].ratio_percent, 75.0);
    }

    #[test]
    fn test_downtrend_retrace() {
        let bars = series(&[(1, 55.0, 50.0), (3, 70.0, 65.0), (5, 62.0, 60.0), (7, 80.0, 75.0)]);
        let swings = SwingPoints::new(vec![3, 7], vec![1, 5]);

        let hits = matcher(1.0).scan("DOWN", &bars, &swings).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].kind, FibPatternKind::DownRetrace);
        assert_eq!(hits[0].ratio_percent, 50.0);
    }

    #[test]
    fn test_downtrend_extension() {
        let bars = series(&[(1, 55.0, 50.0), (3, 70.0, 65.0), (5, 47.0, 42.4), (7, 80.0, 75.0)]);
        let swings = SwingPoints::new(vec![3, 7], vec![1, 5]);

        let hits = matcher(1.0).scan("DOWN", &bars, &swings).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].kind, FibPatternKind::DownExtension);
        assert_eq!(hits[0].ratio_percent, 38.0);
    }

    #[test]
    fn test_zero_swing_skipped() {
        let bars = series(&[(1, 80.0, 75.0), (3, 85.0, 80.0), (5, 90.0, 85.0), (7, 86.0, 84.0)]);
        let swings = SwingPoints::new(vec![1, 5], vec![3, 7]);
        let all = FibonacciMatcher {
            retrace: LevelFilter::all(),
            extension: LevelFilter::all(),
        };
        assert!(all.scan("FLAT", &bars, &swings).unwrap().is_empty());
    }

    #[test]
    fn test_swing_index_out_of_range() {
        let bars = series(&[]);
        let swings = SwingPoints::new(vec![1, 12], vec![3]);
        assert!(matches!(
            FibonacciMatcher::default().scan("BAD", &bars, &swings),
            Err(PatternError::IndexOutOfRange { index: 12, len: 10 })
        ));
    }

    #[test]
    fn test_level_filter_serde_labels() {
        let json = serde_json::to_string(&FibPatternKind::DownRetrace).unwrap();
        assert_eq!(json, "\"-Retrace\"");
        let levels: Vec<FibLevel> = serde_json::from_str(r#"["38","62"]"#).unwrap();
        assert_eq!(levels, vec![FibLevel::Level38, FibLevel::Level62]);
    }

    #[test]
    fn test_tolerance_bounds() {
        let matcher = |tolerance| FibonacciMatcher {
            retrace: LevelFilter::default(),
            extension: LevelFilter::levels(FibLevel::ALL, Percent::new_const(tolerance)),
        };
        assert!(matcher(0.0).validate_config().is_ok());
        assert!(matcher(FibonacciMatcher::MAX_TOLERANCE).validate_config().is_ok());
        match matcher(12.5).validate_config() {
            Err(PatternError::InvalidConfig(msg)) => {
                assert!(msg.contains("extension_tolerance"), "{msg}")
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(FibonacciMatcher::detector_id_str(), matcher(2.0).id());
    }
}
