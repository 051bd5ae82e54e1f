//! Backtest simulation and performance metrics.

pub mod metrics;
pub mod simulator;

pub use metrics::{max_drawdown, sharpe_ratio, total_return, win_rate, Metrics};
pub use simulator::{
    simulate, simulate_series, OpenPosition, SimulationError, SimulationParams, SimulationResult,
    TradeOutcome, TradeRecord,
};
