//! The signal-annotated bar table.
//!
//! Bars, sessions, helper features and signals are statically declared
//! fields. Indicator outputs from the strategy live in an alias map. A
//! [`BarRow`] exposes one bar of the frame to condition expressions.

use std::collections::BTreeMap;

use crate::domain::{Bar, Session, Signal};
use crate::indicators::Quartile;
use crate::spec::{Env, Value};

/// Raw bar fields visible to conditions.
pub const BAR_FIELDS: [&str; 5] = ["Open", "High", "Low", "Close", "Volume"];

pub const SESSION_COLUMN: &str = "Session";

/// Column the simulator reads ATR from. Always present after `add_features`.
pub const ATR_COLUMN: &str = "ATR_14";

/// Names of the always-computed helper columns.
pub const HELPER_COLUMNS: [&str; 11] = [
    "RSI_now",
    "RSI_prev",
    "ATR_pips",
    "QG_label",
    "QG_dist_pips",
    "QG_signed_pips",
    "MTF_slope",
    "EMA_fast",
    "EMA_slow",
    "Sweep_high",
    "Sweep_low",
];

/// A computed series keyed by alias.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    /// NaN marks "not available".
    Numeric(Vec<f64>),
    /// `None` marks "not available".
    Label(Vec<Option<String>>),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Numeric(v) => v.len(),
            Column::Label(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn value(&self, index: usize) -> Value<'_> {
        match self {
            Column::Numeric(v) => match v.get(index) {
                Some(x) if !x.is_nan() => Value::Number(*x),
                _ => Value::Missing,
            },
            Column::Label(v) => match v.get(index) {
                Some(Some(s)) => Value::Text(s),
                _ => Value::Missing,
            },
        }
    }

    pub fn as_numeric(&self) -> Option<&[f64]> {
        match self {
            Column::Numeric(v) => Some(v),
            Column::Label(_) => None,
        }
    }

    /// Cell rendered for CSV export; empty when not available.
    pub fn render(&self, index: usize) -> String {
        match self.value(index) {
            Value::Number(x) => x.to_string(),
            Value::Text(s) => s.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Missing => String::new(),
        }
    }
}

/// Spec-independent features backing the confluence heuristic.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HelperColumns {
    pub rsi_now: Vec<f64>,
    pub rsi_prev: Vec<f64>,
    pub atr_pips: Vec<f64>,
    pub qg_label: Vec<Option<Quartile>>,
    pub qg_dist_pips: Vec<f64>,
    pub qg_signed_pips: Vec<f64>,
    pub mtf_slope: Vec<f64>,
    pub ema_fast: Vec<f64>,
    pub ema_slow: Vec<f64>,
    pub sweep_high: Vec<bool>,
    pub sweep_low: Vec<bool>,
}

impl HelperColumns {
    pub fn lookup(&self, name: &str, i: usize) -> Option<Value<'_>> {
        let number = |v: &[f64]| match v.get(i) {
            Some(x) if !x.is_nan() => Value::Number(*x),
            _ => Value::Missing,
        };
        let value = match name {
            "RSI_now" => number(&self.rsi_now),
            "RSI_prev" => number(&self.rsi_prev),
            "ATR_pips" => number(&self.atr_pips),
            "QG_label" => match self.qg_label.get(i) {
                Some(Some(q)) => Value::Text(q.as_str()),
                _ => Value::Missing,
            },
            "QG_dist_pips" => number(&self.qg_dist_pips),
            "QG_signed_pips" => number(&self.qg_signed_pips),
            "MTF_slope" => number(&self.mtf_slope),
            "EMA_fast" => number(&self.ema_fast),
            "EMA_slow" => number(&self.ema_slow),
            "Sweep_high" => Value::Bool(self.sweep_high.get(i).copied().unwrap_or(false)),
            "Sweep_low" => Value::Bool(self.sweep_low.get(i).copied().unwrap_or(false)),
            _ => return None,
        };
        Some(value)
    }
}

/// Bars plus everything the engine derives from them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SignalFrame {
    pub bars: Vec<Bar>,
    pub sessions: Vec<Session>,
    pub helpers: HelperColumns,
    /// One label per bar; all `Flat` until the frame is signalized.
    pub signals: Vec<Signal>,
    columns: BTreeMap<String, Column>,
    column_order: Vec<String>,
}

impl SignalFrame {
    /// Wrap bars and annotate sessions. No indicators are computed yet.
    pub fn new(bars: Vec<Bar>) -> Self {
        let sessions = bars.iter().map(|b| Session::of(&b.timestamp)).collect();
        let signals = vec![Signal::Flat; bars.len()];
        Self {
            bars,
            sessions,
            signals,
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Insert or overwrite an alias column. Overwrites keep their position.
    pub fn insert_column(&mut self, name: impl Into<String>, column: Column) {
        let name = name.into();
        if !self.columns.contains_key(&name) {
            self.column_order.push(name.clone());
        }
        self.columns.insert(name, column);
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.get(name)
    }

    pub fn numeric(&self, name: &str) -> Option<&[f64]> {
        self.column(name).and_then(Column::as_numeric)
    }

    /// Alias column names in insertion order.
    pub fn column_names(&self) -> &[String] {
        &self.column_order
    }

    pub fn row(&self, index: usize) -> BarRow<'_> {
        BarRow { frame: self, index }
    }

    pub fn last_row(&self) -> Option<BarRow<'_>> {
        self.len().checked_sub(1).map(|i| self.row(i))
    }
}

/// Read-only view of one bar for condition evaluation.
#[derive(Debug, Clone, Copy)]
pub struct BarRow<'a> {
    frame: &'a SignalFrame,
    index: usize,
}

impl<'a> BarRow<'a> {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn bar(&self) -> &'a Bar {
        &self.frame.bars[self.index]
    }

    pub fn session(&self) -> Session {
        self.frame.sessions[self.index]
    }

    pub fn signal(&self) -> Signal {
        self.frame.signals[self.index]
    }

    /// Numeric value of a named column, `None` when missing or not numeric.
    pub fn number(&self, name: &str) -> Option<f64> {
        match self.lookup(name) {
            Some(Value::Number(x)) => Some(x),
            _ => None,
        }
    }
}

impl Env for BarRow<'_> {
    fn lookup(&self, name: &str) -> Option<Value<'_>> {
        let bar = self.bar();
        let value = match name {
            "Open" => Value::Number(bar.open),
            "High" => Value::Number(bar.high),
            "Low" => Value::Number(bar.low),
            "Close" => Value::Number(bar.close),
            "Volume" => Value::Number(bar.volume),
            SESSION_COLUMN => Value::Text(self.session().as_str()),
            _ => {
                if let Some(column) = self.frame.columns.get(name) {
                    return Some(column.value(self.index));
                }
                return self.frame.helpers.lookup(name, self.index);
            }
        };
        Some(value)
    }
}
