//! Backtest runner: wires together spec loading, bar loading, the signal
//! engine, the simulator, and metrics.
//!
//! Two entry points:
//! - `run_pipeline()`: resolves inputs from a `RunConfig`. Used by the CLI.
//! - `run_backtest_from_data()`: takes a compiled strategy and loaded bars. No I/O.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use quarterlab_core::backtest::{
    simulate, Metrics, OpenPosition, SimulationError, SimulationParams, SimulationResult,
    TradeRecord,
};
use quarterlab_core::engine::{signalize, FeatureConfig, SignalCounts, SignalFrame};
use quarterlab_core::spec::{CompiledStrategy, SpecError, StrategySpec};

use crate::config::{ConfigError, RunConfig, RunSection};
use crate::data_loader::{load_bars_csv, synthetic_data, LoadError, LoadedBars};

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("strategy error: {0}")]
    Spec(#[from] SpecError),
    #[error("data error: {0}")]
    Data(#[from] LoadError),
    #[error("simulation error: {0}")]
    Simulation(#[from] SimulationError),
}

/// Current schema version for persisted artifacts.
pub const SCHEMA_VERSION: u32 = 1;

/// Serializable summary of one backtest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestReport {
    /// Schema version for forward-compatible deserialization.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub strategy_name: String,
    pub strategy_fingerprint: String,
    pub instrument: String,
    pub timeframe: String,
    pub dataset_hash: String,
    pub synthetic: bool,
    pub bar_count: usize,
    pub first_bar: Option<String>,
    pub last_bar: Option<String>,
    pub signal_counts: SignalCounts,
    pub metrics: Metrics,
    pub trades: Vec<TradeRecord>,
    pub open_position: Option<OpenPosition>,
    pub params: SimulationParams,
    pub data_quality_warnings: Vec<String>,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Everything a run produced, for export.
#[derive(Debug, Clone)]
pub struct BacktestRun {
    pub strategy: CompiledStrategy,
    pub frame: SignalFrame,
    pub simulation: SimulationResult,
    pub report: BacktestReport,
}

/// Load and compile a strategy document. Any validation failure stops the run.
pub fn load_strategy(section: &RunSection) -> Result<CompiledStrategy, RunError> {
    let path = section.spec.as_deref().ok_or(ConfigError::Missing("run.spec"))?;
    let strategy = StrategySpec::load(path)?;
    info!(
        strategy = strategy.name(),
        fingerprint = %strategy.fingerprint,
        rules = strategy.rules.len(),
        "strategy compiled"
    );
    Ok(strategy)
}

/// Bars from the configured CSV, or synthetic bars when requested.
pub fn load_input(section: &RunSection, strategy: &CompiledStrategy) -> Result<LoadedBars, RunError> {
    if let Some(count) = section.synthetic_bars {
        return Ok(synthetic_data(&instrument_of(section, strategy), count, strategy.timeframe()));
    }
    let path = section.bars.as_deref().ok_or(ConfigError::Missing("run.bars"))?;
    Ok(load_bars_csv(path)?)
}

/// Instrument label: configured, else the strategy's first instrument.
pub fn instrument_of(section: &RunSection, strategy: &CompiledStrategy) -> String {
    section
        .instrument
        .clone()
        .or_else(|| strategy.spec.instruments.first().cloned())
        .unwrap_or_default()
}

/// Run the full pipeline from a configuration.
///
/// Returns `Ok(None)` when there are no bars to process.
pub fn run_pipeline(config: &RunConfig) -> Result<Option<BacktestRun>, RunError> {
    let strategy = load_strategy(&config.run)?;
    let loaded = load_input(&config.run, &strategy)?;
    let instrument = instrument_of(&config.run, &strategy);
    let params = config.simulation.params_for(&strategy);
    run_backtest_from_data(strategy, loaded, &instrument, &config.features, &params)
}

/// Signalize, simulate and summarize pre-loaded bars.
pub fn run_backtest_from_data(
    strategy: CompiledStrategy,
    loaded: LoadedBars,
    instrument: &str,
    features: &FeatureConfig,
    params: &SimulationParams,
) -> Result<Option<BacktestRun>, RunError> {
    if loaded.bars.is_empty() {
        warn!(strategy = strategy.name(), "no bars to process; nothing to report");
        return Ok(None);
    }

    let LoadedBars {
        bars,
        dataset_hash,
        synthetic,
        warnings,
    } = loaded;
    let frame = signalize(bars, &strategy, features);
    let simulation = simulate(&frame, params)?;
    let metrics = Metrics::compute(
        &simulation.equity,
        &simulation.trades,
        params.initial_equity,
        strategy.timeframe().periods_per_year(),
    );

    let report = BacktestReport {
        schema_version: SCHEMA_VERSION,
        strategy_name: strategy.name().to_string(),
        strategy_fingerprint: strategy.fingerprint.clone(),
        instrument: instrument.to_string(),
        timeframe: strategy.timeframe().to_string(),
        dataset_hash,
        synthetic,
        bar_count: frame.len(),
        first_bar: frame.bars.first().map(|b| b.timestamp.to_rfc3339()),
        last_bar: frame.bars.last().map(|b| b.timestamp.to_rfc3339()),
        signal_counts: SignalCounts::of(&frame.signals),
        metrics,
        trades: simulation.trades.clone(),
        open_position: simulation.open_position,
        params: params.clone(),
        data_quality_warnings: warnings,
    };
    info!(
        trades = report.metrics.trade_count,
        total_return = report.metrics.total_return,
        sharpe = report.metrics.sharpe,
        "backtest complete"
    );

    Ok(Some(BacktestRun {
        strategy,
        frame,
        simulation,
        report,
    }))
}
