//! Common helper functions shared across the detector modules.

use crate::OHLCV;

/// NR7 compares the candidate bar with this many preceding bars
pub const NR7_LOOKBACK: usize = 6;

/// Slack for comparing rounded percentages against a tolerance band
pub const LEVEL_EPSILON: f64 = 1e-9;

/// Index of the highest high in `bars[start..=end]`. Ties keep the earliest bar.
#[inline]
pub fn highest_high_index<T: OHLCV>(bars: &[T], start: usize, end: usize) -> Option<usize> {
    let slice = bars.get(start..=end)?;
    let mut best: Option<(usize, f64)> = None;
    for (offset, bar) in slice.iter().enumerate() {
        let high = bar.high();
        if best.map_or(true, |(_, h)| high > h) {
            best = Some((start + offset, high));
        }
    }
    best.map(|(i, _)| i)
}

/// Index of the lowest low in `bars[start..=end]`, skipping bars whose low is exactly 0.
/// Ties keep the earliest bar.
#[inline]
pub fn lowest_low_index<T: OHLCV>(bars: &[T], start: usize, end: usize) -> Option<usize> {
    let slice = bars.get(start..=end)?;
    let mut best: Option<(usize, f64)> = None;
    for (offset, bar) in slice.iter().enumerate() {
        let low = bar.low();
        if low == 0.0 {
            continue;
        }
        if best.map_or(true, |(_, l)| low < l) {
            best = Some((start + offset, low));
        }
    }
    best.map(|(i, _)| i)
}

/// Round half away from zero to `decimals` places
#[inline]
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}
