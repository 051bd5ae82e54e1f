//! Categorical outputs of the signal engine and the simulator.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Per-bar signal emitted by the signal engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Signal {
    Buy,
    Sell,
    #[default]
    Flat,
}

impl Signal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::Buy => "BUY",
            Signal::Sell => "SELL",
            Signal::Flat => "FLAT",
        }
    }

    pub fn parse(label: &str) -> Option<Self> {
        match label.to_ascii_uppercase().as_str() {
            "BUY" => Some(Signal::Buy),
            "SELL" => Some(Signal::Sell),
            "FLAT" => Some(Signal::Flat),
            _ => None,
        }
    }

    pub fn is_entry(&self) -> bool {
        !matches!(self, Signal::Flat)
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Direction of an entry rule or an open position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Long,
    Short,
}

impl Side {
    pub fn signal(&self) -> Signal {
        match self {
            Side::Long => Signal::Buy,
            Side::Short => Signal::Sell,
        }
    }
}

/// Simulator action label for a bar. Bars without an action carry `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TradeAction {
    #[serde(rename = "BUY")]
    Buy,
    #[serde(rename = "SELL")]
    Sell,
    #[serde(rename = "EXIT-TP")]
    ExitTp,
    #[serde(rename = "EXIT-SL")]
    ExitSl,
}

impl TradeAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeAction::Buy => "BUY",
            TradeAction::Sell => "SELL",
            TradeAction::ExitTp => "EXIT-TP",
            TradeAction::ExitSl => "EXIT-SL",
        }
    }

    pub fn is_exit(&self) -> bool {
        matches!(self, TradeAction::ExitTp | TradeAction::ExitSl)
    }
}

impl fmt::Display for TradeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_labels() {
        assert_eq!(Signal::Buy.to_string(), "BUY");
        assert_eq!(Signal::parse("sell"), Some(Signal::Sell));
        assert_eq!(Signal::parse("hold"), None);
        assert_eq!(Signal::default(), Signal::Flat);
    }

    #[test]
    fn side_maps_to_signal() {
        assert_eq!(Side::Long.signal(), Signal::Buy);
        assert_eq!(Side::Short.signal(), Signal::Sell);
    }

    #[test]
    fn trade_action_serializes_with_dash() {
        assert_eq!(
            serde_json::to_string(&TradeAction::ExitSl).unwrap(),
            "\"EXIT-SL\""
        );
        assert!(TradeAction::ExitTp.is_exit());
        assert!(!TradeAction::Buy.is_exit());
    }
}
