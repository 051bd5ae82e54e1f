//! Parameter sweeps over the simulator's exit multiples.
//!
//! Signals do not depend on exit parameters, so the frame is built once and
//! shared read-only across the rayon workers. Each point owns its own
//! simulation and equity curve.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use quarterlab_core::backtest::{simulate, Metrics, SimulationError, SimulationParams};
use quarterlab_core::engine::SignalFrame;

/// Values to try for each exit parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamGrid {
    pub tp_rr: Vec<f64>,
    pub sl_atr_mult: Vec<f64>,
}

impl Default for ParamGrid {
    fn default() -> Self {
        Self {
            tp_rr: vec![1.5, 2.0, 3.0],
            sl_atr_mult: vec![1.0, 1.5, 2.0],
        }
    }
}

impl ParamGrid {
    /// Returns the total number of combinations in this grid.
    pub fn size(&self) -> usize {
        self.tp_rr.len() * self.sl_atr_mult.len()
    }

    /// Every combination applied on top of `base`, tp_rr-major.
    pub fn generate_params(&self, base: &SimulationParams) -> Vec<SimulationParams> {
        let mut out = Vec::with_capacity(self.size());
        for &tp_rr in &self.tp_rr {
            for &sl_atr_mult in &self.sl_atr_mult {
                out.push(SimulationParams {
                    tp_rr,
                    sl_atr_mult,
                    ..base.clone()
                });
            }
        }
        out
    }
}

/// Outcome of one grid point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepPoint {
    pub tp_rr: f64,
    pub sl_atr_mult: f64,
    pub metrics: Metrics,
}

/// Simulate every grid point against `frame` and rank by Sharpe, best first.
pub fn run_sweep(
    frame: &SignalFrame,
    grid: &ParamGrid,
    base: &SimulationParams,
    periods_per_year: f64,
) -> Result<Vec<SweepPoint>, SimulationError> {
    let params = grid.generate_params(base);
    info!(points = params.len(), bars = frame.len(), "starting sweep");

    let mut points = params
        .par_iter()
        .map(|p| {
            let sim = simulate(frame, p)?;
            let metrics = Metrics::compute(&sim.equity, &sim.trades, p.initial_equity, periods_per_year);
            Ok(SweepPoint {
                tp_rr: p.tp_rr,
                sl_atr_mult: p.sl_atr_mult,
                metrics,
            })
        })
        .collect::<Result<Vec<_>, SimulationError>>()?;

    points.sort_by(|a, b| b.metrics.sharpe.total_cmp(&a.metrics.sharpe));
    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use quarterlab_core::domain::{Bar, Signal};
    use quarterlab_core::engine::{Column, ATR_COLUMN};

    fn bare_frame() -> SignalFrame {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap();
        let closes = [1.1000, 1.1000, 1.1010, 1.1030, 1.1000, 1.0990, 1.1000, 1.1040];
        let bars: Vec<Bar> = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Bar {
                timestamp: start + Duration::minutes(15 * i as i64),
                open: c,
                high: c + 0.0002,
                low: c - 0.0002,
                close: c,
                volume: 0.0,
            })
            .collect();
        let mut f = SignalFrame::new(bars);
        f.signals = vec![Signal::Flat; 8];
        f.signals[1] = Signal::Buy;
        f.signals[4] = Signal::Sell;
        f
    }

    fn frame() -> SignalFrame {
        let mut f = bare_frame();
        f.insert_column(ATR_COLUMN, Column::Numeric(vec![0.001; 8]));
        f
    }

    #[test]
    fn grid_size_and_order() {
        let grid = ParamGrid {
            tp_rr: vec![1.0, 2.0],
            sl_atr_mult: vec![0.5, 1.0, 1.5],
        };
        assert_eq!(grid.size(), 6);
        let params = grid.generate_params(&SimulationParams::default());
        assert_eq!(params.len(), 6);
        assert_eq!((params[0].tp_rr, params[0].sl_atr_mult), (1.0, 0.5));
        assert_eq!((params[5].tp_rr, params[5].sl_atr_mult), (2.0, 1.5));
        assert!(params.iter().all(|p| p.initial_equity == 10_000.0));
    }

    #[test]
    fn sweep_ranks_by_sharpe() {
        let points = run_sweep(&frame(), &ParamGrid::default(), &SimulationParams::default(), 252.0)
            .unwrap();
        assert_eq!(points.len(), 9);
        for pair in points.windows(2) {
            assert!(pair[0].metrics.sharpe >= pair[1].metrics.sharpe);
        }
    }

    #[test]
    fn sweep_matches_single_runs() {
        let f = frame();
        let base = SimulationParams::default();
        let points = run_sweep(&f, &ParamGrid::default(), &base, 252.0).unwrap();
        for point in &points {
            let params = SimulationParams {
                tp_rr: point.tp_rr,
                sl_atr_mult: point.sl_atr_mult,
                ..base.clone()
            };
            let sim = simulate(&f, &params).unwrap();
            let expected = Metrics::compute(&sim.equity, &sim.trades, base.initial_equity, 252.0);
            assert_eq!(point.metrics, expected);
        }
    }

    #[test]
    fn empty_grid_yields_nothing() {
        let grid = ParamGrid {
            tp_rr: vec![],
            sl_atr_mult: vec![1.0],
        };
        let points = run_sweep(&frame(), &grid, &SimulationParams::default(), 252.0).unwrap();
        assert!(points.is_empty());
    }

    #[test]
    fn missing_atr_column_is_an_error() {
        let err = run_sweep(&bare_frame(), &ParamGrid::default(), &SimulationParams::default(), 252.0)
            .unwrap_err();
        assert_eq!(err, SimulationError::MissingColumn(ATR_COLUMN.to_string()));
    }
}
