//! Validated, parsed form of a strategy document.

use crate::domain::{Session, Side};
use crate::indicators::{Macd, QuarterGrid};

use super::expr::{Env, EvalError, Expr};
use super::{StrategySpec, Timeframe};

/// An indicator with its parameters resolved and defaults applied.
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureKind {
    Sma { period: usize },
    Ema { period: usize },
    Rsi { period: usize },
    Atr { period: usize },
    Macd(Macd),
    QuarterGrid(QuarterGrid),
    Session,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedIndicator {
    pub alias: String,
    pub kind: FeatureKind,
}

impl ResolvedIndicator {
    /// Column names this indicator writes into the frame.
    pub fn output_names(&self) -> Vec<String> {
        let alias = &self.alias;
        match self.kind {
            FeatureKind::Macd(_) => vec![
                alias.clone(),
                format!("{alias}_signal"),
                format!("{alias}_hist"),
            ],
            FeatureKind::QuarterGrid(_) => vec![alias.clone(), format!("{alias}_dist")],
            _ => vec![alias.clone()],
        }
    }
}

/// One entry rule with its condition parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledRule {
    pub side: Side,
    pub session: Option<Session>,
    pub condition: String,
    pub expr: Expr,
}

impl CompiledRule {
    pub fn applies_in(&self, session: Session) -> bool {
        self.session.map_or(true, |s| s == session)
    }

    /// Evaluate the condition for one bar. Errors are returned, not swallowed;
    /// the signal engine decides how to treat them.
    pub fn evaluate(&self, row: &dyn Env) -> Result<bool, EvalError> {
        self.expr.eval_bool(row)
    }
}

/// Immutable, validated strategy shared read-only by the engine and simulator.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledStrategy {
    pub spec: StrategySpec,
    pub indicators: Vec<ResolvedIndicator>,
    pub rules: Vec<CompiledRule>,
    /// Target distance as a multiple of stop distance (TP_SL exit).
    pub tp_rr: f64,
    /// Stop distance as a multiple of ATR (TP_SL exit).
    pub sl_atr_mult: f64,
    /// BLAKE3 hex digest of the canonical JSON document.
    pub fingerprint: String,
}

impl CompiledStrategy {
    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn timeframe(&self) -> Timeframe {
        self.spec.timeframe
    }

    /// Every column name written by the declared indicators, in declaration order.
    pub fn output_columns(&self) -> Vec<String> {
        self.indicators
            .iter()
            .flat_map(|ind| ind.output_names())
            .collect()
    }
}
