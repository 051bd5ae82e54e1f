//! Run configuration loaded from TOML, and the alert sink settings loaded
//! from the environment.
//!
//! Every section and field has a default, so an empty file is a valid
//! configuration:
//!
//! ```toml
//! [run]
//! bars = "data/USDMXN_M15.csv"
//! spec = "specs/usdmxn_quarters.json"
//! output_dir = "outputs"
//!
//! [simulation]
//! initial_equity = 10000.0
//! tp_rr = 2.5            # overrides the strategy's TP_SL exit
//!
//! [features]
//! pip = 0.0001
//! [features.confluence]
//! enabled = true
//!
//! [alert]
//! sessions = ["London", "NY"]
//! checkpoint = "outputs/alerts/last_alert.json"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use quarterlab_core::backtest::SimulationParams;
use quarterlab_core::domain::Session;
use quarterlab_core::engine::{FeatureConfig, ATR_COLUMN};
use quarterlab_core::spec::CompiledStrategy;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("missing setting: {0}")]
    Missing(&'static str),

    #[error("environment variable {0} is not set")]
    MissingEnv(&'static str),
}

/// Top-level run configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub run: RunSection,
    pub simulation: SimulationConfig,
    pub features: FeatureConfig,
    pub alert: AlertSettings,
}

/// Inputs and outputs of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSection {
    /// CSV file with `Datetime,Open,High,Low,Close[,Volume]`.
    pub bars: Option<PathBuf>,
    /// Strategy document (`.json` or `.toml`).
    pub spec: Option<PathBuf>,
    pub output_dir: PathBuf,
    /// Generate this many synthetic bars instead of reading `bars`.
    pub synthetic_bars: Option<usize>,
    /// Instrument label; defaults to the strategy's first instrument.
    pub instrument: Option<String>,
}

impl Default for RunSection {
    fn default() -> Self {
        Self {
            bars: None,
            spec: None,
            output_dir: PathBuf::from("outputs"),
            synthetic_bars: None,
            instrument: None,
        }
    }
}

/// Simulator settings. TP/SL multiples fall back to the strategy's exit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub initial_equity: f64,
    pub tp_rr: Option<f64>,
    pub sl_atr_mult: Option<f64>,
    pub gain_fraction: f64,
    pub loss_fraction: f64,
    pub atr_column: String,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        let base = SimulationParams::default();
        Self {
            initial_equity: base.initial_equity,
            tp_rr: None,
            sl_atr_mult: None,
            gain_fraction: base.gain_fraction,
            loss_fraction: base.loss_fraction,
            atr_column: ATR_COLUMN.to_string(),
        }
    }
}

impl SimulationConfig {
    /// Simulator parameters for `strategy`, with overrides applied.
    pub fn params_for(&self, strategy: &CompiledStrategy) -> SimulationParams {
        SimulationParams {
            initial_equity: self.initial_equity,
            tp_rr: self.tp_rr.unwrap_or(strategy.tp_rr),
            sl_atr_mult: self.sl_atr_mult.unwrap_or(strategy.sl_atr_mult),
            gain_fraction: self.gain_fraction,
            loss_fraction: self.loss_fraction,
            atr_column: self.atr_column.clone(),
        }
    }
}

/// Alert candidate filtering and checkpoint location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertSettings {
    /// Sessions in which a signal is alert-worthy.
    pub sessions: Vec<Session>,
    pub checkpoint: PathBuf,
}

impl Default for AlertSettings {
    fn default() -> Self {
        Self {
            sessions: vec![Session::London, Session::NewYork],
            checkpoint: PathBuf::from("outputs/alerts/last_alert.json"),
        }
    }
}

impl RunConfig {
    /// Load a run configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate a run configuration.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let sim = &self.simulation;
        positive("simulation.initial_equity", sim.initial_equity)?;
        fraction("simulation.gain_fraction", sim.gain_fraction)?;
        fraction("simulation.loss_fraction", sim.loss_fraction)?;
        if let Some(tp) = sim.tp_rr {
            positive("simulation.tp_rr", tp)?;
        }
        if let Some(sl) = sim.sl_atr_mult {
            positive("simulation.sl_atr_mult", sl)?;
        }
        if sim.atr_column.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "simulation.atr_column",
                reason: "must not be empty".into(),
            });
        }

        let f = &self.features;
        positive("features.pip", f.pip)?;
        positive("features.grid_size_pips", f.grid_size_pips)?;
        if f.sweep_lookback == 0 || f.ema_fast == 0 || f.ema_slow == 0 || f.mtf_period == 0 {
            return Err(ConfigError::Invalid {
                field: "features",
                reason: "periods and lookbacks must be at least 1".into(),
            });
        }
        if f.mtf_minutes <= 0 {
            return Err(ConfigError::Invalid {
                field: "features.mtf_minutes",
                reason: format!("{} is not a positive interval", f.mtf_minutes),
            });
        }
        if self.run.synthetic_bars == Some(0) {
            return Err(ConfigError::Invalid {
                field: "run.synthetic_bars",
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }
}

fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            field,
            reason: format!("{value} is not a positive number"),
        })
    }
}

fn fraction(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            field,
            reason: format!("{value} is outside [0, 1)"),
        })
    }
}

// ─── Alert sink configuration ───────────────────────────────────────

/// Delivery settings for the alert sink, passed to its constructor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertConfig {
    pub to: String,
    pub from: String,
    pub outbox_dir: PathBuf,
}

impl AlertConfig {
    pub const TO_VAR: &'static str = "ALERT_TO";
    pub const FROM_VAR: &'static str = "ALERT_FROM";
    pub const OUTBOX_VAR: &'static str = "ALERT_OUTBOX_DIR";

    /// Read `ALERT_TO`, `ALERT_FROM` and `ALERT_OUTBOX_DIR`, after loading
    /// a `.env` file from the working directory when one exists.
    pub fn from_env() -> Result<Self, ConfigError> {
        // A missing .env file is fine; the process environment still applies.
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. The outbox defaults to `outputs/alerts/outbox`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &'static str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::MissingEnv(key))
        };
        Ok(Self {
            to: required(Self::TO_VAR)?,
            from: required(Self::FROM_VAR)?,
            outbox_dir: lookup(Self::OUTBOX_VAR)
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("outputs/alerts/outbox")),
        })
    }
}
