//! Swing point (top/bottom) detection
//!
//! The Fibonacci matcher only needs ascending index lists of tops and bottoms;
//! where they come from is pluggable through [`SwingPointFinder`].

use serde::{Deserialize, Serialize};

use crate::OHLCV;

/// Ascending, 0-indexed swing tops and bottoms
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwingPoints {
    pub tops: Vec<usize>,
    pub bottoms: Vec<usize>,
}

impl SwingPoints {
    pub fn new(tops: Vec<usize>, bottoms: Vec<usize>) -> Self {
        Self { tops, bottoms }
    }

    /// Adapt lists whose slot 0 is an unused sentinel and whose points start at slot 1.
    pub fn from_one_indexed(tops: &[usize], bottoms: &[usize]) -> Self {
        Self {
            tops: tops.iter().skip(1).copied().collect(),
            bottoms: bottoms.iter().skip(1).copied().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tops.is_empty() && self.bottoms.is_empty()
    }

    /// Largest referenced bar index
    pub fn max_index(&self) -> Option<usize> {
        self.tops.iter().chain(&self.bottoms).copied().max()
    }
}

/// Source of swing points for a series
pub trait SwingPointFinder: Send + Sync {
    fn find_swings<T: OHLCV>(&self, bars: &[T], min_separation: usize) -> SwingPoints;
}

/// Pivot-based finder: a top's high is strictly above the highs of the
/// `min_separation` bars on each side (bottoms mirror on lows). Consecutive
/// points of the same kind collapse to the more extreme one, so the output
/// alternates between tops and bottoms.
#[derive(Debug, Clone, Copy, Default)]
pub struct PivotSwingFinder;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PivotKind {
    Top,
    Bottom,
}

fn is_pivot_high<T: OHLCV>(bars: &[T], i: usize, k: usize) -> bool {
    if i < k || i + k >= bars.len() {
        return false;
    }
    let hi = bars[i].high();
    bars[i - k..i].iter().all(|b| b.high() < hi) && bars[i + 1..=i + k].iter().all(|b| b.high() < hi)
}

fn is_pivot_low<T: OHLCV>(bars: &[T], i: usize, k: usize) -> bool {
    if i < k || i + k >= bars.len() {
        return false;
    }
    let lo = bars[i].low();
    bars[i - k..i].iter().all(|b| b.low() > lo) && bars[i + 1..=i + k].iter().all(|b| b.low() > lo)
}

impl SwingPointFinder for PivotSwingFinder {
    fn find_swings<T: OHLCV>(&self, bars: &[T], min_separation: usize) -> SwingPoints {
        let k = min_separation.max(1);
        let mut pivots: Vec<(usize, PivotKind)> = Vec::new();

        for i in 0..bars.len() {
            for kind in [PivotKind::Top, PivotKind::Bottom] {
                let found = match kind {
                    PivotKind::Top => is_pivot_high(bars, i, k),
                    PivotKind::Bottom => is_pivot_low(bars, i, k),
                };
                if !found {
                    continue;
                }
                match pivots.last_mut() {
                    Some(last) if last.1 == kind => {
                        let more_extreme = match kind {
                            PivotKind::Top => bars[i].high() > bars[last.0].high(),
                            PivotKind::Bottom => bars[i].low() < bars[last.0].low(),
                        };
                        if more_extreme {
                            last.0 = i;
                        }
                    }
                    _ => pivots.push((i, kind)),
                }
            }
        }

        let mut swings = SwingPoints::default();
        for (i, kind) in pivots {
            match kind {
                PivotKind::Top => swings.tops.push(i),
                PivotKind::Bottom => swings.bottoms.push(i),
            }
        }
        swings
    }
}
