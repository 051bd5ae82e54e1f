//! Performance metrics over a simulated equity curve.
//!
//! Every metric is a pure function of the equity curve and/or trade list.

use serde::{Deserialize, Serialize};

use super::simulator::TradeRecord;

/// Added to the return deviation so a constant curve gives a Sharpe of 0.
pub const SHARPE_EPSILON: f64 = 1e-9;

/// Summary statistics for one simulation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub total_return: f64,
    pub sharpe: f64,
    pub max_drawdown: f64,
    pub trade_count: usize,
    pub win_rate: f64,
}

impl Metrics {
    /// `periods_per_year` is the annualization factor for the bar interval.
    pub fn compute(
        equity_curve: &[f64],
        trades: &[TradeRecord],
        initial_equity: f64,
        periods_per_year: f64,
    ) -> Self {
        Self {
            total_return: total_return(equity_curve, initial_equity),
            sharpe: sharpe_ratio(equity_curve, periods_per_year),
            max_drawdown: max_drawdown(equity_curve),
            trade_count: trades.len(),
            win_rate: win_rate(trades),
        }
    }
}

// ─── Individual metric functions ────────────────────────────────────

/// Final equity over the starting equity, minus one.
pub fn total_return(equity_curve: &[f64], initial_equity: f64) -> f64 {
    match equity_curve.last() {
        Some(&last) if initial_equity > 0.0 && equity_curve.len() >= 2 => {
            last / initial_equity - 1.0
        }
        _ => 0.0,
    }
}

/// Annualized mean/std of period returns.
///
/// Uses the population standard deviation plus [`SHARPE_EPSILON`].
pub fn sharpe_ratio(equity_curve: &[f64], periods_per_year: f64) -> f64 {
    let returns = period_returns(equity_curve);
    if returns.is_empty() {
        return 0.0;
    }
    let mean = mean_f64(&returns);
    let std = population_std(&returns);
    mean / (std + SHARPE_EPSILON) * periods_per_year.sqrt()
}

/// Largest peak-to-trough loss as a negative fraction (e.g. -0.03).
pub fn max_drawdown(equity_curve: &[f64]) -> f64 {
    if equity_curve.len() < 2 {
        return 0.0;
    }
    let mut peak = equity_curve[0];
    let mut max_dd = 0.0_f64;
    for &eq in equity_curve {
        peak = peak.max(eq);
        if peak > 0.0 {
            max_dd = max_dd.min(eq / peak - 1.0);
        }
    }
    max_dd
}

/// Fraction of closed trades that hit their target.
pub fn win_rate(trades: &[TradeRecord]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    let winners = trades.iter().filter(|t| t.is_winner()).count();
    winners as f64 / trades.len() as f64
}

// ─── Helpers ────────────────────────────────────────────────────────

/// Bar-over-bar fractional change of the equity curve.
pub fn period_returns(equity_curve: &[f64]) -> Vec<f64> {
    equity_curve
        .windows(2)
        .map(|w| if w[0] > 0.0 { w[1] / w[0] - 1.0 } else { 0.0 })
        .collect()
}

pub(crate) fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

pub(crate) fn population_std(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mean = mean_f64(values);
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}
