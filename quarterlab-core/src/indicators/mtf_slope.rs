//! Multi-timeframe slope: first difference of an EMA on coarser bars.
//!
//! Native bars are grouped into buckets of `coarse_minutes` aligned to the
//! UTC epoch. A bucket's close is the close of its last native bar. The
//! coarse EMA and its first difference are computed over completed buckets.
//! A bucket counts as completed once a native bar from a later bucket has
//! arrived, and its slope is forward-filled from that bar onward. The value
//! at bar t therefore never depends on bars after t.

use super::{ema_of_series, Indicator};
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct MtfSlope {
    coarse_minutes: i64,
    period: usize,
    name: String,
}

impl Default for MtfSlope {
    fn default() -> Self {
        Self::new(60, 50)
    }
}

impl MtfSlope {
    pub fn new(coarse_minutes: i64, period: usize) -> Self {
        let coarse_minutes = coarse_minutes.max(1);
        let period = period.max(1);
        Self {
            coarse_minutes,
            period,
            name: format!("mtf_slope_{coarse_minutes}m_{period}"),
        }
    }

    fn bucket_of(&self, bar: &Bar) -> i64 {
        bar.timestamp
            .timestamp()
            .div_euclid(self.coarse_minutes * 60)
    }
}

impl Indicator for MtfSlope {
    fn name(&self) -> &str {
        &self.name
    }

    /// Warm-up depends on how many native bars fit in a bucket, so this is a
    /// lower bound: `period` completed buckets are needed before the first value.
    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let n = bars.len();
        let mut result = vec![f64::NAN; n];
        if n == 0 {
            return result;
        }

        // Index of the first native bar of each bucket after the first.
        // Bucket k is complete at `completed_at[k]`.
        let mut coarse_closes = Vec::new();
        let mut completed_at = Vec::new();
        for i in 1..n {
            if self.bucket_of(&bars[i]) != self.bucket_of(&bars[i - 1]) {
                coarse_closes.push(bars[i - 1].close);
                completed_at.push(i);
            }
        }

        let coarse_ema = ema_of_series(&coarse_closes, self.period);
        let mut current = f64::NAN;
        let mut next_bucket = 0;
        for (i, slot) in result.iter_mut().enumerate() {
            while next_bucket < completed_at.len() && completed_at[next_bucket] == i {
                current = if next_bucket == 0 {
                    f64::NAN
                } else {
                    coarse_ema[next_bucket] - coarse_ema[next_bucket - 1]
                };
                next_bucket += 1;
            }
            *slot = current;
        }

        result
    }
}
