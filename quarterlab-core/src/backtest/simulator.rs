//! Single-position trade simulator.
//!
//! State machine over the signal-annotated bars, in chronological order:
//!
//! - FLAT + BUY/SELL opens a position at the bar's close, with the stop
//!   `sl_atr_mult × ATR` away and the target `tp_rr ×` the stop distance on
//!   the other side.
//! - IN_POSITION checks the stop before the target on every later bar.
//!   A close multiplies equity by `1 − loss_fraction` or `1 + gain_fraction`
//!   regardless of the price distance travelled.
//! - Signals that arrive while a position is open are ignored, and the bar
//!   that closes a position cannot open the next one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::domain::{Bar, Side, Signal, TradeAction};
use crate::engine::{SignalFrame, ATR_COLUMN};
use crate::spec::CompiledStrategy;

#[derive(Debug, Error, PartialEq)]
pub enum SimulationError {
    #[error("ATR column '{0}' is not present in the frame")]
    MissingColumn(String),

    #[error("series length mismatch: {bars} bars, {signals} signals, {atr} ATR values")]
    LengthMismatch {
        bars: usize,
        signals: usize,
        atr: usize,
    },
}

/// Simulator settings.
///
/// Equity moves by the fixed `gain_fraction`/`loss_fraction` per closed
/// trade, independent of the price distance `tp_rr` and `sl_atr_mult` put
/// between entry, stop and target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationParams {
    pub initial_equity: f64,
    pub tp_rr: f64,
    pub sl_atr_mult: f64,
    pub gain_fraction: f64,
    pub loss_fraction: f64,
    pub atr_column: String,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            initial_equity: 10_000.0,
            tp_rr: 2.0,
            sl_atr_mult: 1.5,
            gain_fraction: 0.02,
            loss_fraction: 0.01,
            atr_column: ATR_COLUMN.to_string(),
        }
    }
}

impl SimulationParams {
    /// Defaults with the strategy's TP/SL multiples.
    pub fn from_strategy(strategy: &CompiledStrategy) -> Self {
        Self {
            tp_rr: strategy.tp_rr,
            sl_atr_mult: strategy.sl_atr_mult,
            ..Self::default()
        }
    }
}

/// The position currently held.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OpenPosition {
    pub side: Side,
    pub entry_index: usize,
    pub entry_price: f64,
    pub stop: f64,
    pub target: f64,
}

impl OpenPosition {
    fn open(side: Side, index: usize, price: f64, atr: f64, params: &SimulationParams) -> Self {
        let risk = params.sl_atr_mult * atr;
        let (stop, target) = match side {
            Side::Long => (price - risk, price + params.tp_rr * risk),
            Side::Short => (price + risk, price - params.tp_rr * risk),
        };
        Self {
            side,
            entry_index: index,
            entry_price: price,
            stop,
            target,
        }
    }

    /// Exit touched by this bar, stop first.
    fn exit_on(&self, bar: &Bar) -> Option<TradeOutcome> {
        let (stop_hit, target_hit) = match self.side {
            Side::Long => (bar.low <= self.stop, bar.high >= self.target),
            Side::Short => (bar.high >= self.stop, bar.low <= self.target),
        };
        if stop_hit {
            Some(TradeOutcome::StopLoss)
        } else if target_hit {
            Some(TradeOutcome::TakeProfit)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeOutcome {
    TakeProfit,
    StopLoss,
}

impl TradeOutcome {
    pub fn action(&self) -> TradeAction {
        match self {
            TradeOutcome::TakeProfit => TradeAction::ExitTp,
            TradeOutcome::StopLoss => TradeAction::ExitSl,
        }
    }
}

/// A closed trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub side: Side,
    pub entry_index: usize,
    pub entry_time: DateTime<Utc>,
    pub entry_price: f64,
    pub stop: f64,
    pub target: f64,
    pub exit_index: usize,
    pub exit_time: DateTime<Utc>,
    pub outcome: TradeOutcome,
}

impl TradeRecord {
    pub fn is_winner(&self) -> bool {
        self.outcome == TradeOutcome::TakeProfit
    }

    pub fn bars_held(&self) -> usize {
        self.exit_index - self.entry_index
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationResult {
    /// Action per bar; `None` where nothing happened.
    pub actions: Vec<Option<TradeAction>>,
    /// Equity after each bar.
    pub equity: Vec<f64>,
    pub trades: Vec<TradeRecord>,
    /// Position still open when the data ran out. Not closed, not counted.
    pub open_position: Option<OpenPosition>,
}

/// Run the simulator over a signalized frame.
pub fn simulate(frame: &SignalFrame, params: &SimulationParams) -> Result<SimulationResult, SimulationError> {
    let atr = frame
        .numeric(&params.atr_column)
        .ok_or_else(|| SimulationError::MissingColumn(params.atr_column.clone()))?;
    simulate_series(&frame.bars, &frame.signals, atr, params)
}

/// Run the simulator over aligned bars, signals and ATR values.
pub fn simulate_series(
    bars: &[Bar],
    signals: &[Signal],
    atr: &[f64],
    params: &SimulationParams,
) -> Result<SimulationResult, SimulationError> {
    if bars.len() != signals.len() || bars.len() != atr.len() {
        return Err(SimulationError::LengthMismatch {
            bars: bars.len(),
            signals: signals.len(),
            atr: atr.len(),
        });
    }

    let n = bars.len();
    let mut equity = params.initial_equity;
    let mut position: Option<OpenPosition> = None;
    let mut actions = Vec::with_capacity(n);
    let mut curve = Vec::with_capacity(n);
    let mut trades = Vec::new();
    let mut skipped = 0usize;

    for (i, bar) in bars.iter().enumerate() {
        let mut action = None;

        match position {
            None => {
                let side = match signals[i] {
                    Signal::Buy => Some(Side::Long),
                    Signal::Sell => Some(Side::Short),
                    Signal::Flat => None,
                };
                if let Some(side) = side {
                    if atr[i].is_finite() && bar.close.is_finite() {
                        position = Some(OpenPosition::open(side, i, bar.close, atr[i], params));
                        action = Some(match side {
                            Side::Long => TradeAction::Buy,
                            Side::Short => TradeAction::Sell,
                        });
                    } else {
                        skipped += 1;
                    }
                }
            }
            Some(open) => {
                if let Some(outcome) = open.exit_on(bar) {
                    equity *= match outcome {
                        TradeOutcome::StopLoss => 1.0 - params.loss_fraction,
                        TradeOutcome::TakeProfit => 1.0 + params.gain_fraction,
                    };
                    trades.push(TradeRecord {
                        side: open.side,
                        entry_index: open.entry_index,
                        entry_time: bars[open.entry_index].timestamp,
                        entry_price: open.entry_price,
                        stop: open.stop,
                        target: open.target,
                        exit_index: i,
                        exit_time: bar.timestamp,
                        outcome,
                    });
                    action = Some(outcome.action());
                    position = None;
                }
            }
        }

        actions.push(action);
        curve.push(equity);
    }

    if skipped > 0 {
        debug!(skipped, "entries skipped without ATR");
    }
    info!(
        bars = n,
        trades = trades.len(),
        final_equity = equity,
        open = position.is_some(),
        "simulation complete"
    );

    Ok(SimulationResult {
        actions,
        equity: curve,
        trades,
        open_position: position,
    })
}
