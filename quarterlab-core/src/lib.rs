//! QuarterLab Core: feature library, strategy specification, signal engine,
//! trade simulator.
//!
//! This crate is pure and synchronous: bars in, signals, equity and metrics out.
//! - Domain types (bars, sessions, signals, trade actions)
//! - Indicators over an ordered bar sequence, NaN during warm-up
//! - Strategy documents, validation and the condition expression language
//! - Signal engine: feature computation, confluence heuristic, entry rules
//! - Single-position simulator and performance metrics
//! - Session/sentiment annotation for alert text

pub mod backtest;
pub mod domain;
pub mod engine;
pub mod indicators;
pub mod sentiment;
pub mod spec;

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: everything shared across sweep workers is Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        // Domain types
        require_send::<domain::Bar>();
        require_sync::<domain::Bar>();
        require_send::<domain::Session>();
        require_sync::<domain::Session>();
        require_send::<domain::Signal>();
        require_sync::<domain::Signal>();

        // Strategy
        require_send::<spec::StrategySpec>();
        require_sync::<spec::StrategySpec>();
        require_send::<spec::CompiledStrategy>();
        require_sync::<spec::CompiledStrategy>();
        require_send::<spec::Expr>();
        require_sync::<spec::Expr>();

        // Engine
        require_send::<engine::SignalFrame>();
        require_sync::<engine::SignalFrame>();
        require_send::<engine::FeatureConfig>();
        require_sync::<engine::FeatureConfig>();

        // Simulator
        require_send::<backtest::SimulationParams>();
        require_sync::<backtest::SimulationParams>();
        require_send::<backtest::SimulationResult>();
        require_sync::<backtest::SimulationResult>();
        require_send::<backtest::Metrics>();
        require_sync::<backtest::Metrics>();
    }

    /// Architecture contract: condition evaluation sees one bar through `Env`
    /// and nothing else.
    #[test]
    fn rules_evaluate_against_env_only() {
        fn _check(rule: &spec::CompiledRule, row: &engine::BarRow<'_>) -> bool {
            rule.evaluate(row).unwrap_or(false)
        }
    }
}
