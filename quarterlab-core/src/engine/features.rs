//! Feature computation: declared indicators plus the always-on helpers.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::frame::{Column, HelperColumns, SignalFrame, ATR_COLUMN};
use crate::domain::Bar;
use crate::indicators::{
    closes, lag, Atr, Ema, Indicator, LiquiditySweeps, MtfSlope, QuarterGrid, Rsi, Sma,
};
use crate::spec::{CompiledStrategy, FeatureKind, ResolvedIndicator};

/// Period of the ATR the simulator reads when the strategy declares none.
pub const DEFAULT_ATR_PERIOD: usize = 14;
/// Period behind the `RSI_now`/`RSI_prev` helpers.
pub const HELPER_RSI_PERIOD: usize = 14;

/// Thresholds of the built-in confluence heuristic.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfluenceConfig {
    pub enabled: bool,
    /// BUY needs RSI above this.
    pub rsi_floor: f64,
    /// SELL needs RSI below this.
    pub rsi_ceiling: f64,
    pub max_grid_distance_pips: f64,
}

impl Default for ConfluenceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            rsi_floor: 30.0,
            rsi_ceiling: 70.0,
            max_grid_distance_pips: 6.0,
        }
    }
}

/// Parameters of the spec-independent helper columns.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    pub pip: f64,
    pub grid_size_pips: f64,
    pub sweep_lookback: usize,
    pub sweep_pad_pips: f64,
    pub ema_fast: usize,
    pub ema_slow: usize,
    pub mtf_minutes: i64,
    pub mtf_period: usize,
    pub confluence: ConfluenceConfig,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            pip: 0.0001,
            grid_size_pips: 25.0,
            sweep_lookback: 20,
            sweep_pad_pips: 5.0,
            ema_fast: 21,
            ema_slow: 50,
            mtf_minutes: 60,
            mtf_period: 50,
            confluence: ConfluenceConfig::default(),
        }
    }
}

impl FeatureConfig {
    pub fn grid(&self) -> QuarterGrid {
        QuarterGrid::new(self.grid_size_pips, self.pip)
    }
}

/// Build a frame from bars and compute every feature the strategy needs.
pub fn add_features(bars: Vec<Bar>, strategy: &CompiledStrategy, cfg: &FeatureConfig) -> SignalFrame {
    let mut frame = SignalFrame::new(bars);
    frame.add_features(strategy, cfg);
    frame
}

impl SignalFrame {
    /// Compute declared indicators and helper columns in place.
    ///
    /// Existing columns with the same alias are overwritten. All inputs are
    /// the bars themselves, so a second call yields bit-identical values.
    pub fn add_features(&mut self, strategy: &CompiledStrategy, cfg: &FeatureConfig) {
        for indicator in &strategy.indicators {
            self.compute_indicator(indicator);
        }

        if self.numeric(ATR_COLUMN).is_none() {
            let atr = Atr::new(DEFAULT_ATR_PERIOD).compute(&self.bars);
            self.insert_column(ATR_COLUMN, Column::Numeric(atr));
        }

        self.helpers = compute_helpers(&self.bars, cfg);
        debug!(
            bars = self.len(),
            columns = self.column_names().len(),
            "features computed"
        );
    }

    fn compute_indicator(&mut self, indicator: &ResolvedIndicator) {
        let alias = indicator.alias.as_str();
        match &indicator.kind {
            FeatureKind::Sma { period } => {
                let values = Sma::new(*period).compute(&self.bars);
                self.insert_column(alias, Column::Numeric(values));
            }
            FeatureKind::Ema { period } => {
                let values = Ema::new(*period).compute(&self.bars);
                self.insert_column(alias, Column::Numeric(values));
            }
            FeatureKind::Rsi { period } => {
                let values = Rsi::new(*period).compute(&self.bars);
                self.insert_column(alias, Column::Numeric(values));
            }
            FeatureKind::Atr { period } => {
                let values = Atr::new(*period).compute(&self.bars);
                self.insert_column(alias, Column::Numeric(values));
            }
            FeatureKind::Macd(macd) => {
                let out = macd.compute(&self.bars);
                self.insert_column(alias, Column::Numeric(out.line));
                self.insert_column(format!("{alias}_signal"), Column::Numeric(out.signal));
                self.insert_column(format!("{alias}_hist"), Column::Numeric(out.histogram));
            }
            FeatureKind::QuarterGrid(grid) => {
                let out = grid.compute_prices(&closes(&self.bars));
                let labels = out
                    .labels
                    .iter()
                    .map(|q| q.map(|q| q.as_str().to_string()))
                    .collect();
                self.insert_column(alias, Column::Label(labels));
                self.insert_column(format!("{alias}_dist"), Column::Numeric(out.dist_pips));
            }
            FeatureKind::Session => {
                let labels = self
                    .sessions
                    .iter()
                    .map(|s| Some(s.as_str().to_string()))
                    .collect();
                self.insert_column(alias, Column::Label(labels));
            }
        }
    }
}

fn compute_helpers(bars: &[Bar], cfg: &FeatureConfig) -> HelperColumns {
    let rsi_now = Rsi::new(HELPER_RSI_PERIOD).compute(bars);
    let rsi_prev = lag(&rsi_now, 1);
    let atr_pips = Atr::new(DEFAULT_ATR_PERIOD)
        .compute(bars)
        .into_iter()
        .map(|v| v / cfg.pip)
        .collect();
    let grid = cfg.grid().compute_prices(&closes(bars));
    let sweeps = LiquiditySweeps::new(cfg.sweep_lookback, cfg.sweep_pad_pips, cfg.pip).compute(bars);

    HelperColumns {
        rsi_now,
        rsi_prev,
        atr_pips,
        qg_label: grid.labels,
        qg_dist_pips: grid.dist_pips,
        qg_signed_pips: grid.signed_pips,
        mtf_slope: MtfSlope::new(cfg.mtf_minutes, cfg.mtf_period).compute(bars),
        ema_fast: Ema::new(cfg.ema_fast).compute(bars),
        ema_slow: Ema::new(cfg.ema_slow).compute(bars),
        sweep_high: sweeps.high,
        sweep_low: sweeps.low,
    }
}
