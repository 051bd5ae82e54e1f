//! Strategy specification: the declarative document that drives a run.
//!
//! Documents are JSON (as produced by the spec generator) or TOML. Field names
//! follow the generator's schema exactly. A loaded [`StrategySpec`] is plain
//! data; [`StrategySpec::compile`] validates it and parses every entry
//! condition into an [`Expr`], producing an immutable [`CompiledStrategy`].

pub mod compiled;
pub mod expr;
pub mod validate;

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{Session, Side};

pub use compiled::{CompiledRule, CompiledStrategy, FeatureKind, ResolvedIndicator};
pub use expr::{Env, EvalError, Expr, ParseError, Value};

/// Errors from loading or validating a strategy document. All are fatal for a run.
#[derive(Debug, Error)]
pub enum SpecError {
    #[error("failed to read strategy file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid JSON strategy document: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid TOML strategy document: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("strategy name is empty")]
    EmptyName,
    #[error("strategy lists no instruments")]
    NoInstruments,
    #[error("indicator #{index} has an empty alias")]
    EmptyAlias { index: usize },
    #[error("duplicate column name '{0}'")]
    DuplicateAlias(String),
    #[error("alias '{0}' shadows a built-in column")]
    ReservedAlias(String),
    #[error("indicator '{alias}': parameter '{param}' {reason}")]
    InvalidParam {
        alias: String,
        param: String,
        reason: String,
    },
    #[error("entry rule #{index}: {source}")]
    Condition {
        index: usize,
        #[source]
        source: ParseError,
    },
    #[error("entry rule #{index} references unknown name '{name}'")]
    UnknownName { index: usize, name: String },
    #[error("invalid risk parameters: {0}")]
    InvalidRisk(String),
    #[error("invalid exit parameters: {0}")]
    InvalidExit(String),
}

// ─── Document types ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    M5,
    M15,
    H1,
    H4,
    D1,
}

impl Timeframe {
    pub fn minutes(&self) -> u32 {
        match self {
            Timeframe::M5 => 5,
            Timeframe::M15 => 15,
            Timeframe::H1 => 60,
            Timeframe::H4 => 240,
            Timeframe::D1 => 1440,
        }
    }

    /// Bars per year on a 252-day calendar. M15 gives 252 * 24 * 4.
    pub fn periods_per_year(&self) -> f64 {
        252.0 * (1440.0 / self.minutes() as f64)
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Timeframe::M5 => "M5",
            Timeframe::M15 => "M15",
            Timeframe::H1 => "H1",
            Timeframe::H4 => "H4",
            Timeframe::D1 => "D1",
        };
        f.write_str(label)
    }
}

/// Indicator kind. Unrecognized names deserialize to `Unknown` and are
/// skipped at compile time instead of failing the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum IndicatorKind {
    Sma,
    Ema,
    Rsi,
    Atr,
    Macd,
    QuarterGrid,
    Session,
    Unknown(String),
}

impl From<String> for IndicatorKind {
    fn from(name: String) -> Self {
        match name.as_str() {
            "SMA" => IndicatorKind::Sma,
            "EMA" => IndicatorKind::Ema,
            "RSI" => IndicatorKind::Rsi,
            "ATR" => IndicatorKind::Atr,
            "MACD" => IndicatorKind::Macd,
            "QuarterGrid" => IndicatorKind::QuarterGrid,
            "Session" => IndicatorKind::Session,
            _ => IndicatorKind::Unknown(name),
        }
    }
}

impl From<IndicatorKind> for String {
    fn from(kind: IndicatorKind) -> Self {
        match kind {
            IndicatorKind::Sma => "SMA".into(),
            IndicatorKind::Ema => "EMA".into(),
            IndicatorKind::Rsi => "RSI".into(),
            IndicatorKind::Atr => "ATR".into(),
            IndicatorKind::Macd => "MACD".into(),
            IndicatorKind::QuarterGrid => "QuarterGrid".into(),
            IndicatorKind::Session => "Session".into(),
            IndicatorKind::Unknown(name) => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorDef {
    #[serde(rename = "name")]
    pub kind: IndicatorKind,
    #[serde(default)]
    pub params: BTreeMap<String, serde_json::Value>,
    pub alias: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryRule {
    pub side: Side,
    pub condition: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<Session>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExitKind {
    #[serde(rename = "TP_SL")]
    TpSl,
    IndicatorCross,
    Time,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExitRule {
    #[serde(rename = "type")]
    pub kind: ExitKind,
    #[serde(default)]
    pub params: BTreeMap<String, serde_json::Value>,
}

/// Declared risk sizing. Only a single concurrent position is simulated;
/// `max_positions` is carried for documents that set it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskRule {
    #[serde(default = "default_fixed_fraction")]
    pub fixed_fraction: f64,
    #[serde(default = "default_max_positions")]
    pub max_positions: u32,
}

fn default_fixed_fraction() -> f64 {
    0.01
}

fn default_max_positions() -> u32 {
    1
}

impl Default for RiskRule {
    fn default() -> Self {
        Self {
            fixed_fraction: default_fixed_fraction(),
            max_positions: default_max_positions(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategySpec {
    pub name: String,
    pub timeframe: Timeframe,
    pub instruments: Vec<String>,
    #[serde(default)]
    pub indicators: Vec<IndicatorDef>,
    #[serde(default)]
    pub entries: Vec<EntryRule>,
    #[serde(default)]
    pub exits: Vec<ExitRule>,
    #[serde(default)]
    pub risk: RiskRule,
}

// ─── Loading ────────────────────────────────────────────────────────

impl StrategySpec {
    /// Parse a JSON document. A surrounding markdown code fence is stripped.
    pub fn from_json(text: &str) -> Result<Self, SpecError> {
        Ok(serde_json::from_str(strip_code_fence(text))?)
    }

    pub fn from_toml(text: &str) -> Result<Self, SpecError> {
        Ok(toml::from_str(text)?)
    }

    /// Load from disk. `.toml` files are TOML, anything else is JSON.
    pub fn from_file(path: &Path) -> Result<Self, SpecError> {
        let text = std::fs::read_to_string(path).map_err(|source| SpecError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => Self::from_toml(&text),
            _ => Self::from_json(&text),
        }
    }

    /// Load and compile in one step.
    pub fn load(path: &Path) -> Result<CompiledStrategy, SpecError> {
        Self::from_file(path)?.compile()
    }
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") on the opening fence line.
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// A document in the shape the spec generator emits.
#[cfg(test)]
pub(crate) const GENERATOR_SAMPLE: &str = r#"{
  "name": "USDMXN quarters pullback",
  "timeframe": "M15",
  "instruments": ["USDMXN"],
  "indicators": [
    {"name": "RSI", "params": {"period": 14}, "alias": "RSI_14"},
    {"name": "ATR", "params": {"period": 14}, "alias": "ATR_14"},
    {"name": "EMA", "params": {"period": 50}, "alias": "EMA_50"},
    {"name": "QuarterGrid", "params": {"size_pips": 25, "pip_scale": 0.0001}, "alias": "QG"}
  ],
  "entries": [
    {"side": "LONG", "condition": "(RSI_14 < 35) and (Close > EMA_50) and (QG == 'Q1')", "session": "London"},
    {"side": "SHORT", "condition": "(RSI_14 > 65) and (Close < EMA_50) and (QG == 'Q4')", "session": "NY"}
  ],
  "exits": [{"type": "TP_SL", "params": {"tp_rr": 2.0, "sl_atr_mult": 1.5}}],
  "risk": {"fixed_fraction": 0.01, "max_positions": 1}
}"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_generator_document() {
        let spec = StrategySpec::from_json(GENERATOR_SAMPLE).unwrap();
        assert_eq!(spec.timeframe, Timeframe::M15);
        assert_eq!(spec.indicators.len(), 4);
        assert_eq!(spec.indicators[3].kind, IndicatorKind::QuarterGrid);
        assert_eq!(spec.entries[0].side, Side::Long);
        assert_eq!(spec.entries[1].session, Some(Session::NewYork));
        assert_eq!(spec.exits[0].kind, ExitKind::TpSl);
    }

    #[test]
    fn strips_markdown_fence() {
        let fenced = format!("```json\n{GENERATOR_SAMPLE}\n```\n");
        let spec = StrategySpec::from_json(&fenced).unwrap();
        assert_eq!(spec.name, "USDMXN quarters pullback");
        assert_eq!(strip_code_fence("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fence(" {} "), "{}");
    }

    #[test]
    fn unknown_indicator_kind_deserializes() {
        let json = r#"{"name": "Ichimoku", "params": {}, "alias": "ICH"}"#;
        let def: IndicatorDef = serde_json::from_str(json).unwrap();
        assert_eq!(def.kind, IndicatorKind::Unknown("Ichimoku".into()));
        let back = serde_json::to_string(&def).unwrap();
        assert!(back.contains("\"Ichimoku\""));
    }

    #[test]
    fn risk_defaults_when_absent() {
        let json = r#"{"name": "x", "timeframe": "H1", "instruments": ["EURUSD"]}"#;
        let spec = StrategySpec::from_json(json).unwrap();
        assert_eq!(spec.risk, RiskRule::default());
        assert!(spec.entries.is_empty());
    }

    #[test]
    fn rejects_unknown_timeframe() {
        let json = r#"{"name": "x", "timeframe": "M1", "instruments": ["EURUSD"]}"#;
        assert!(matches!(StrategySpec::from_json(json), Err(SpecError::Json(_))));
    }

    #[test]
    fn parses_toml_document() {
        let text = r#"
name = "toml strategy"
timeframe = "H1"
instruments = ["USDMXN"]

[[indicators]]
name = "SMA"
alias = "SMA_50"
params = { period = 50 }

[[entries]]
side = "SHORT"
condition = "Close < SMA_50"
"#;
        let spec = StrategySpec::from_toml(text).unwrap();
        assert_eq!(spec.indicators[0].kind, IndicatorKind::Sma);
        assert_eq!(spec.entries[0].side, Side::Short);
    }

    #[test]
    fn periods_per_year_by_timeframe() {
        assert_eq!(Timeframe::M15.periods_per_year(), 252.0 * 24.0 * 4.0);
        assert_eq!(Timeframe::D1.periods_per_year(), 252.0);
        assert_eq!(Timeframe::H4.to_string(), "H4");
    }
}
