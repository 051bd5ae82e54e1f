//! Liquidity sweep flags (wick through a recent extreme, close back inside).
//!
//! For bar t, the prior extremes are taken over the `lookback` bars strictly
//! before t. A high sweep needs High[t] > prior_max + pad and
//! Close[t] < prior_max. A low sweep mirrors this against the prior minimum
//! Low. The first `lookback` bars are never flagged.

use crate::domain::Bar;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LiquiditySweeps {
    pub lookback: usize,
    pub pad_pips: f64,
    pub pip: f64,
}

impl Default for LiquiditySweeps {
    fn default() -> Self {
        Self {
            lookback: 20,
            pad_pips: 5.0,
            pip: 0.0001,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepFlags {
    pub high: Vec<bool>,
    pub low: Vec<bool>,
}

impl LiquiditySweeps {
    pub fn new(lookback: usize, pad_pips: f64, pip: f64) -> Self {
        Self {
            lookback: lookback.max(1),
            pad_pips,
            pip,
        }
    }

    pub fn compute(&self, bars: &[Bar]) -> SweepFlags {
        let n = bars.len();
        let mut high = vec![false; n];
        let mut low = vec![false; n];
        let pad = self.pad_pips * self.pip;

        for t in self.lookback..n {
            let window = &bars[t - self.lookback..t];
            if window.iter().any(|b| b.high.is_nan() || b.low.is_nan()) {
                continue;
            }
            let prior_max = window.iter().map(|b| b.high).fold(f64::MIN, f64::max);
            let prior_min = window.iter().map(|b| b.low).fold(f64::MAX, f64::min);
            let bar = &bars[t];

            // NaN comparisons are false, so void bars never flag
            high[t] = bar.high > prior_max + pad && bar.close < prior_max;
            low[t] = bar.low < prior_min - pad && bar.close > prior_min;
        }

        SweepFlags { high, low }
    }
}
