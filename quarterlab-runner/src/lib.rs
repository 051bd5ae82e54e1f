//! QuarterLab Runner: everything around the pure core that touches files.
//!
//! This crate builds on `quarterlab-core` to provide:
//! - Run configuration (TOML) and alert sink settings (environment)
//! - Bar loading from CSV, with deterministic synthetic bars as a fallback
//! - The backtest pipeline and its serializable report
//! - Parallel sweeps over exit parameters
//! - CSV/JSON artifact export
//! - Alert candidate selection, last-alert checkpoint, and message composition

pub mod alert;
pub mod config;
pub mod data_loader;
pub mod export;
pub mod runner;
pub mod sweep;

pub use alert::{
    compose_alert, latest_candidate, process_alert, AlertCandidate, AlertCheckpoint, AlertError,
    AlertMessage, AlertOutcome, AlertSink, CheckpointError, LogSink, OutboxSink, SkipReason,
};
pub use config::{AlertConfig, AlertSettings, ConfigError, RunConfig, RunSection, SimulationConfig};
pub use data_loader::{generate_synthetic_bars, load_bars_csv, LoadError, LoadedBars};
pub use export::{export_json, import_json, save_artifacts};
pub use runner::{run_backtest_from_data, run_pipeline, BacktestReport, BacktestRun, RunError, SCHEMA_VERSION};
pub use sweep::{run_sweep, ParamGrid, SweepPoint};
