//! Exponential Moving Average (EMA).
//!
//! Recursive: EMA[t] = alpha * x[t] + (1 - alpha) * EMA[t-1], alpha = 2/(period+1).
//! Seed: EMA at the first available value equals that value.
//! The recurrence runs from the seed, but the first `period - 1` outputs
//! after the seed are reported as NaN (warm-up).
//! Lookback: period - 1.

use super::{closes, Indicator};
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct Ema {
    period: usize,
    name: String,
}

impl Ema {
    pub fn new(period: usize) -> Self {
        let period = period.max(1);
        Self {
            period,
            name: format!("ema_{period}"),
        }
    }
}

impl Indicator for Ema {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period - 1
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        ema_of_series(&closes(bars), self.period)
    }
}

/// EMA of an arbitrary series.
///
/// Leading NaNs are skipped; the first non-NaN value seeds the recurrence.
/// A NaN after the seed taints every later value.
pub fn ema_of_series(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];
    if period == 0 {
        return result;
    }

    let Some(seed_idx) = values.iter().position(|v| !v.is_nan()) else {
        return result;
    };

    let alpha = 2.0 / (period as f64 + 1.0);
    let first_valid = seed_idx.saturating_add(period - 1);
    let mut prev = values[seed_idx];
    if seed_idx >= first_valid {
        result[seed_idx] = prev;
    }

    for i in (seed_idx + 1)..n {
        let v = values[i];
        if v.is_nan() {
            for val in result.iter_mut().skip(i) {
                *val = f64::NAN;
            }
            return result;
        }
        prev = alpha * v + (1.0 - alpha) * prev;
        if i >= first_valid {
            result[i] = prev;
        }
    }

    result
}
