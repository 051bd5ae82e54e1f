//! Feature library: pure indicator functions over an ordered bar sequence.
//!
//! Every function returns a series aligned with its input. Values that cannot
//! be computed yet (warm-up, NaN inputs) are `f64::NAN`, never zero. Boolean
//! features use `false` for "not available".
//!
//! Single-series indicators implement [`Indicator`]. Multi-output features
//! (MACD, quarter grid, sweeps) return small output structs instead.

pub mod atr;
pub mod ema;
pub mod macd;
pub mod mtf_slope;
pub mod quarter_grid;
pub mod rolling;
pub mod rsi;
pub mod sma;
pub mod sweep;

pub use atr::{true_range, Atr};
pub use ema::{ema_of_series, Ema};
pub use macd::{Macd, MacdOutput};
pub use mtf_slope::MtfSlope;
pub use quarter_grid::{QuarterGrid, QuarterGridOutput, Quartile};
pub use rolling::{lag, rolling_max, rolling_min};
pub use rsi::{rsi_of_series, Rsi};
pub use sma::{sma_of_series, Sma};
pub use sweep::{LiquiditySweeps, SweepFlags};

use crate::domain::Bar;

/// Trait for single-series indicators.
///
/// # Look-ahead contamination guard
/// No indicator value at bar t may depend on price data from bar t+1 or later.
/// Every indicator must pass the truncated-vs-full series test.
pub trait Indicator: Send + Sync {
    /// Human-readable name (e.g., "sma_50", "atr_14").
    fn name(&self) -> &str;

    /// Number of leading bars that are always `NaN`.
    fn lookback(&self) -> usize;

    /// Compute the indicator for the entire bar series.
    ///
    /// Returns a `Vec<f64>` of the same length as `bars`.
    fn compute(&self, bars: &[Bar]) -> Vec<f64>;
}

/// Close prices of a bar slice.
pub fn closes(bars: &[Bar]) -> Vec<f64> {
    bars.iter().map(|b| b.close).collect()
}

/// Create synthetic 15-minute bars from close prices for testing.
///
/// open = prev_close (or close for the first bar),
/// high = max(open,close) + 0.0010, low = min(open,close) - 0.0010.
#[cfg(test)]
pub fn make_bars(closes: &[f64]) -> Vec<Bar> {
    use chrono::TimeZone;
    let start = chrono::Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Bar {
                timestamp: start + chrono::Duration::minutes(15 * i as i64),
                open,
                high: open.max(close) + 0.0010,
                low: open.min(close) - 0.0010,
                close,
                volume: 100.0,
            }
        })
        .collect()
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
