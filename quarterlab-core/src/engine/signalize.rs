//! Per-bar signal classification.
//!
//! Precedence per bar: the built-in confluence heuristic, then the
//! strategy's entry rules in declared order (first match wins), then FLAT.
//! Rule evaluation errors never escape: a rule that cannot be evaluated on
//! a bar simply does not match there.

use serde::{Deserialize, Serialize};
use tracing::{info, trace};

use super::features::{ConfluenceConfig, FeatureConfig};
use super::frame::{HelperColumns, SignalFrame};
use crate::domain::{Bar, Signal};
use crate::spec::{CompiledStrategy, Env, Expr};

/// Number of bars per signal label.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalCounts {
    pub buy: usize,
    pub sell: usize,
    pub flat: usize,
}

impl SignalCounts {
    pub fn of(signals: &[Signal]) -> Self {
        let mut counts = Self::default();
        for signal in signals {
            match signal {
                Signal::Buy => counts.buy += 1,
                Signal::Sell => counts.sell += 1,
                Signal::Flat => counts.flat += 1,
            }
        }
        counts
    }
}

/// Compute features and label every bar.
pub fn signalize(bars: Vec<Bar>, strategy: &CompiledStrategy, cfg: &FeatureConfig) -> SignalFrame {
    let mut frame = SignalFrame::new(bars);
    frame.add_features(strategy, cfg);
    frame.signalize(strategy, &cfg.confluence);
    frame
}

impl SignalFrame {
    /// Relabel every bar. Features must already be computed.
    pub fn signalize(&mut self, strategy: &CompiledStrategy, confluence: &ConfluenceConfig) {
        let signals: Vec<Signal> = (0..self.len())
            .map(|i| self.classify(i, strategy, confluence))
            .collect();
        self.signals = signals;

        let counts = SignalCounts::of(&self.signals);
        info!(
            strategy = strategy.name(),
            buy = counts.buy,
            sell = counts.sell,
            flat = counts.flat,
            "signals computed"
        );
    }

    fn classify(&self, i: usize, strategy: &CompiledStrategy, confluence: &ConfluenceConfig) -> Signal {
        if confluence.enabled {
            if let Some(signal) = confluence_signal(&self.helpers, i, confluence) {
                return signal;
            }
        }

        let row = self.row(i);
        let session = row.session();
        for (index, rule) in strategy.rules.iter().enumerate() {
            if !rule.applies_in(session) {
                continue;
            }
            match rule.evaluate(&row) {
                Ok(true) => return rule.side.signal(),
                Ok(false) => {}
                Err(err) => trace!(bar = i, rule = index, error = %err, "rule not evaluated"),
            }
        }
        Signal::Flat
    }
}

/// The spec-independent sweep/RSI/grid/trend heuristic.
///
/// Every comparison against an unavailable value is false, so bars in any
/// helper's warm-up never fire.
pub fn confluence_signal(h: &HelperColumns, i: usize, cfg: &ConfluenceConfig) -> Option<Signal> {
    let rsi = *h.rsi_now.get(i)?;
    let dist = *h.qg_dist_pips.get(i)?;
    let fast = *h.ema_fast.get(i)?;
    let slow = *h.ema_slow.get(i)?;
    let near_boundary = dist <= cfg.max_grid_distance_pips;
    let swept_low = h.sweep_low.get(i).copied().unwrap_or(false);
    let swept_high = h.sweep_high.get(i).copied().unwrap_or(false);

    if swept_low && rsi > cfg.rsi_floor && near_boundary && fast > slow {
        return Some(Signal::Buy);
    }
    if swept_high && rsi < cfg.rsi_ceiling && near_boundary && fast < slow {
        return Some(Signal::Sell);
    }
    None
}

/// Parse and evaluate `expression` against one bar.
///
/// Parse errors, unknown names, type errors and unavailable values all
/// evaluate to `false`.
pub fn evaluate_condition(row: &dyn Env, expression: &str) -> bool {
    match Expr::parse(expression) {
        Ok(expr) => expr.eval_bool(row).unwrap_or(false),
        Err(err) => {
            trace!(expression, error = %err, "condition does not parse");
            false
        }
    }
}
