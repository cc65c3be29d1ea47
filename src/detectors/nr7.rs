//! NR7 narrow-range breakout detector
//!
//! A bar is NR7 when its high-low range is strictly narrower than each of the
//! six bars before it. Once confirmed, the seven-bar consolidation range
//! (highest high / lowest low of the NR7 bar and its six predecessors) is
//! watched for a close outside it. The watch is bounded by calendar days, not
//! bars, so weekends, holidays and intraday gaps do not stretch it.

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::helpers::{highest_high_index, lowest_low_index, NR7_LOOKBACK};
use crate::{
    config::ScanConfig,
    params::{ParamMeta, ParamType, ParameterizedDetector},
    OHLCVExt, Period, Result, OHLCV,
};

impl_with_defaults!(Nr7BreakoutDetector);

/// Direction an NR7 setup resolved in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BreakoutDirection {
    /// Close above the consolidation high (+1)
    Bull,
    /// Close below the consolidation low (-1)
    Bear,
    /// Breakout window elapsed with every close inside the range (0)
    NoBreakout,
}

impl BreakoutDirection {
    #[inline]
    pub fn signum(self) -> i8 {
        match self {
            BreakoutDirection::Bull => 1,
            BreakoutDirection::Bear => -1,
            BreakoutDirection::NoBreakout => 0,
        }
    }
}

/// A resolved NR7 setup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Nr7Match {
    /// Bar where the narrow range is confirmed
    pub origin_index: usize,
    pub highest_high_index: usize,
    pub lowest_low_index: usize,
    pub direction: BreakoutDirection,
    /// Bar whose close left the range; `None` on timeout
    pub breakout_index: Option<usize>,
}

/// Result of evaluating one bar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Nr7Outcome {
    /// Not an NR7 bar (or too early in the series)
    NotQualified,
    /// NR7, but the series ends before a breakout or the window cutoff
    Indeterminate,
    Resolved(Nr7Match),
}

impl Nr7Outcome {
    #[inline]
    pub fn resolved(self) -> Option<Nr7Match> {
        match self {
            Nr7Outcome::Resolved(m) => Some(m),
            _ => None,
        }
    }
}

/// NR7 setup and breakout tracker
#[derive(Debug, Clone)]
pub struct Nr7BreakoutDetector {
    /// Calendar days after the NR7 bar a breakout may still occur
    pub breakout_window_days: Period,
}

impl Default for Nr7BreakoutDetector {
    fn default() -> Self {
        Self {
            breakout_window_days: Period::new_const(7),
        }
    }
}

impl Nr7BreakoutDetector {
    /// The NR7 bar plus its six predecessors
    pub const MIN_BARS: usize = NR7_LOOKBACK + 1;

    /// Longest accepted breakout window, in calendar days
    pub const MAX_BREAKOUT_WINDOW_DAYS: usize = 30;

    pub fn from_config(config: &ScanConfig) -> Self {
        Self {
            breakout_window_days: config.breakout_window_days,
        }
    }

    pub fn id(&self) -> &'static str {
        "NR7_BREAKOUT"
    }

    pub fn validate_config(&self) -> Result<()> {
        self.validate_params()
    }

    /// Breakout window as a duration; saturates instead of overflowing.
    #[inline]
    pub fn breakout_window(&self) -> Duration {
        i64::try_from(self.breakout_window_days.get())
            .ok()
            .and_then(Duration::try_days)
            .unwrap_or(Duration::MAX)
    }

    /// Last instant a setup opened at `date` may break out.
    #[inline]
    pub fn cutoff(&self, date: NaiveDateTime) -> NaiveDateTime {
        date.checked_add_signed(self.breakout_window())
            .unwrap_or(NaiveDateTime::MAX)
    }

    /// True when `bars[index]` is strictly narrower than each of the six bars before it.
    pub fn is_nr7<T: OHLCV>(bars: &[T], index: usize) -> bool {
        if index < NR7_LOOKBACK || index >= bars.len() {
            return false;
        }
        let range = bars[index].range();
        (1..=NR7_LOOKBACK).all(|k| range < bars[index - k].range())
    }

    /// Evaluate the bar at `index`, distinguishing a still-open setup from a non-setup.
    pub fn evaluate<T: OHLCV>(&self, bars: &[T], index: usize) -> Nr7Outcome {
        if !Self::is_nr7(bars, index) {
            return Nr7Outcome::NotQualified;
        }

        let start = index - NR7_LOOKBACK;
        let (Some(hh), Some(ll)) = (
            highest_high_index(bars, start, index),
            lowest_low_index(bars, start, index),
        ) else {
            // Every low in the range is zero
            return Nr7Outcome::NotQualified;
        };

        let ceiling = bars[hh].high();
        let floor = bars[ll].low();
        let cutoff = self.cutoff(bars[index].date());

        let resolved = |direction, breakout_index| {
            Nr7Outcome::Resolved(Nr7Match {
                origin_index: index,
                highest_high_index: hh,
                lowest_low_index: ll,
                direction,
                breakout_index,
            })
        };

        for (j, bar) in bars.iter().enumerate().skip(index + 1) {
            if bar.date() > cutoff {
                return resolved(BreakoutDirection::NoBreakout, None);
            }
            if bar.close() > ceiling {
                return resolved(BreakoutDirection::Bull, Some(j));
            }
            if bar.close() < floor {
                return resolved(BreakoutDirection::Bear, Some(j));
            }
        }

        Nr7Outcome::Indeterminate
    }

    /// Detect a resolved NR7 setup at `index`.
    #[inline]
    pub fn detect<T: OHLCV>(&self, bars: &[T], index: usize) -> Option<Nr7Match> {
        self.evaluate(bars, index).resolved()
    }
}

// ============================================================
// PARAMETERIZED DETECTOR IMPLEMENTATION
// ============================================================

static NR7_BREAKOUT_PARAMS: &[ParamMeta] = &[ParamMeta {
    name: "breakout_window_days",
    param_type: ParamType::Period,
    default: 7.0,
    min: 1.0,
    max: Nr7BreakoutDetector::MAX_BREAKOUT_WINDOW_DAYS as f64,
    description: "Calendar days a setup may wait for its breakout",
}];

impl ParameterizedDetector for Nr7BreakoutDetector {
    fn param_meta() -> &'static [ParamMeta] {
        NR7_BREAKOUT_PARAMS
    }

    fn param_values(&self) -> Vec<(&'static str, f64)> {
        vec![("breakout_window_days", self.breakout_window_days.get() as f64)]
    }

    fn detector_id_str() -> &'static str {
        "NR7_BREAKOUT"
    }
}
