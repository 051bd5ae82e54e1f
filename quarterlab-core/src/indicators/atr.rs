//! Average True Range (ATR).
//!
//! True Range: max(high-low, |high-prev_close|, |low-prev_close|), TR[0] = high-low.
//! ATR is the simple rolling mean of TR over `period` bars.
//! Lookback: period - 1.

use super::{sma_of_series, Indicator};
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct Atr {
    period: usize,
    name: String,
}

impl Atr {
    pub fn new(period: usize) -> Self {
        let period = period.max(1);
        Self {
            period,
            name: format!("atr_{period}"),
        }
    }
}

/// Compute the True Range series from bars.
pub fn true_range(bars: &[Bar]) -> Vec<f64> {
    let mut tr = Vec::with_capacity(bars.len());
    for (i, bar) in bars.iter().enumerate() {
        let hl = bar.high - bar.low;
        if i == 0 {
            tr.push(hl);
            continue;
        }
        let pc = bars[i - 1].close;
        // f64::max ignores NaN, so check explicitly
        if hl.is_nan() || pc.is_nan() {
            tr.push(f64::NAN);
        } else {
            tr.push(hl.max((bar.high - pc).abs()).max((bar.low - pc).abs()));
        }
    }
    tr
}

impl Indicator for Atr {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period - 1
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        sma_of_series(&true_range(bars), self.period)
    }
}
