//! Moving Average Convergence/Divergence (MACD).
//!
//! line = EMA(fast) - EMA(slow), signal = EMA(signal) of the line,
//! histogram = line - signal. Lookback: slow - 1 for the line,
//! slow + signal - 2 for signal and histogram.

use super::{closes, ema_of_series};
use crate::domain::Bar;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Macd {
    pub fast: usize,
    pub slow: usize,
    pub signal: usize,
}

impl Default for Macd {
    fn default() -> Self {
        Self {
            fast: 12,
            slow: 26,
            signal: 9,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MacdOutput {
    pub line: Vec<f64>,
    pub signal: Vec<f64>,
    pub histogram: Vec<f64>,
}

impl Macd {
    pub fn new(fast: usize, slow: usize, signal: usize) -> Self {
        Self {
            fast: fast.max(1),
            slow: slow.max(1),
            signal: signal.max(1),
        }
    }

    pub fn compute(&self, bars: &[Bar]) -> MacdOutput {
        let prices = closes(bars);
        let fast = ema_of_series(&prices, self.fast);
        let slow = ema_of_series(&prices, self.slow);
        let line: Vec<f64> = fast.iter().zip(&slow).map(|(f, s)| f - s).collect();
        let signal = ema_of_series(&line, self.signal);
        let histogram = line.iter().zip(&signal).map(|(l, s)| l - s).collect();
        MacdOutput {
            line,
            signal,
            histogram,
        }
    }
}
