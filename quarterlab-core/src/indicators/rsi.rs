//! Relative Strength Index (RSI).
//!
//! Wilder smoothing of gains and losses as an exponential average with
//! alpha = 1/period, seeded at the first price change:
//!   avg[1] = x[1], avg[t] = alpha * x[t] + (1 - alpha) * avg[t-1]
//! RSI = 100 - 100 / (1 + avg_gain / (avg_loss + 1e-12))
//! Lookback: period.
//!
//! A flat series has zero average gain and reads 0, not 50.

use super::{closes, Indicator};
use crate::domain::Bar;

/// Added to the average loss so an all-gain window does not divide by zero.
pub const RSI_EPSILON: f64 = 1e-12;

#[derive(Debug, Clone)]
pub struct Rsi {
    period: usize,
    name: String,
}

impl Rsi {
    pub fn new(period: usize) -> Self {
        let period = period.max(1);
        Self {
            period,
            name: format!("rsi_{period}"),
        }
    }
}

impl Indicator for Rsi {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        rsi_of_series(&closes(bars), self.period)
    }
}

/// RSI of an arbitrary price series. A NaN price taints every later value.
pub fn rsi_of_series(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];
    if period == 0 || n < 2 {
        return result;
    }

    let alpha = 1.0 / period as f64;
    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;

    for i in 1..n {
        let change = values[i] - values[i - 1];
        if change.is_nan() {
            for val in result.iter_mut().skip(i) {
                *val = f64::NAN;
            }
            return result;
        }
        let gain = change.max(0.0);
        let loss = (-change).max(0.0);

        if i == 1 {
            avg_gain = gain;
            avg_loss = loss;
        } else {
            avg_gain = alpha * gain + (1.0 - alpha) * avg_gain;
            avg_loss = alpha * loss + (1.0 - alpha) * avg_loss;
        }

        if i >= period {
            result[i] = 100.0 - 100.0 / (1.0 + avg_gain / (avg_loss + RSI_EPSILON));
        }
    }

    result
}
