//! Per-day signal buckets
//!
//! One bucket exists for every bar inside the scan window. Each resolved NR7
//! setup adds one count to every bucket between its origin and its breakout
//! (bull or bear), or to every bucket inside its breakout window when it timed
//! out (pending).

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    config::ScanWindow,
    detectors::{BreakoutDirection, Nr7Match},
    OHLCV,
};

/// Cumulative signal counts for one bar of the scan window
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalBucket {
    pub date: NaiveDateTime,
    /// Close of the bar, used for plot markers
    pub close: f64,
    pub bull: u32,
    pub bear: u32,
    pub pending: u32,
}

impl SignalBucket {
    pub fn new(date: NaiveDateTime, close: f64) -> Self {
        Self {
            date,
            close,
            bull: 0,
            bear: 0,
            pending: 0,
        }
    }

    #[inline]
    pub fn total(&self) -> u32 {
        self.bull + self.bear + self.pending
    }
}

/// Attributes NR7 outcomes to signal buckets
#[derive(Debug, Clone)]
pub struct SignalAggregator {
    buckets: Vec<SignalBucket>,
    breakout_window: Duration,
    /// Bucket of the last successful attribution; next lookup starts here
    cursor: usize,
    attributed: u64,
    dropped: u64,
}

impl SignalAggregator {
    /// Allocate one empty bucket per bar inside `window` (`None` = every bar).
    pub fn new<T: OHLCV>(
        bars: &[T],
        window: Option<&ScanWindow>,
        breakout_window: Duration,
    ) -> Self {
        let buckets = bars
            .iter()
            .filter(|bar| window.map_or(true, |w| w.contains(bar.date())))
            .map(|bar| SignalBucket::new(bar.date(), bar.close()))
            .collect();

        Self {
            buckets,
            breakout_window,
            cursor: 0,
            attributed: 0,
            dropped: 0,
        }
    }

    #[inline]
    pub fn buckets(&self) -> &[SignalBucket] {
        &self.buckets
    }

    pub fn into_buckets(self) -> Vec<SignalBucket> {
        self.buckets
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Counts added to buckets so far
    #[inline]
    pub fn attributed(&self) -> u64 {
        self.attributed
    }

    /// Attributions whose date had no bucket
    #[inline]
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Attribute a resolved setup to the buckets of the bars it spans.
    pub fn apply_signal<T: OHLCV>(&mut self, bars: &[T], signal: &Nr7Match) {
        let origin = signal.origin_index;
        match signal.direction {
            BreakoutDirection::Bull | BreakoutDirection::Bear => {
                let Some(end) = signal.breakout_index else {
                    return;
                };
                let Some(span) = bars.get(origin..=end) else {
                    return;
                };
                for bar in span {
                    self.attribute(bar.date(), signal.direction);
                }
            }
            BreakoutDirection::NoBreakout => {
                let Some(first) = bars.get(origin) else {
                    return;
                };
                let cutoff = first
                    .date()
                    .checked_add_signed(self.breakout_window)
                    .unwrap_or(NaiveDateTime::MAX);
                for bar in bars[origin..].iter().take_while(|b| b.date() <= cutoff) {
                    self.attribute(bar.date(), signal.direction);
                }
            }
        }
    }

    /// Bucket dated exactly `target`.
    ///
    /// Searches forward from `from` while bucket dates do not pass `target`,
    /// then backward from `from - 1`.
    pub fn find_bucket(&self, from: usize, target: NaiveDateTime) -> Option<usize> {
        let mut k = from;
        while k < self.buckets.len() && self.buckets[k].date <= target {
            if self.buckets[k].date == target {
                return Some(k);
            }
            k += 1;
        }
        (0..from.min(self.buckets.len()))
            .rev()
            .find(|&k| self.buckets[k].date == target)
    }

    fn attribute(&mut self, date: NaiveDateTime, direction: BreakoutDirection) {
        let Some(idx) = self.find_bucket(self.cursor, date) else {
            self.dropped += 1;
            debug!(%date, ?direction, "no signal bucket for date, attribution dropped");
            return;
        };

        self.cursor = idx;
        let bucket = &mut self.buckets[idx];
        match direction {
            BreakoutDirection::Bull => bucket.bull += 1,
            BreakoutDirection::Bear => bucket.bear += 1,
            BreakoutDirection::NoBreakout => bucket.pending += 1,
        }
        self.attributed += 1;
    }
}
