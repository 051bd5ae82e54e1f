//! Quarter grid: position of price inside a band of four quarter steps.
//!
//! A quarter step is `size_pips * pip` (25 pips by default). Four steps form
//! one band, so boundaries sit at the 00/25/50/75 levels. A price in
//! `[k*step, (k+1)*step)` is labelled by `k mod 4`: Q1 for the lowest quarter
//! of its band through Q4 for the highest. Distances are measured in pips to
//! the nearest quarter boundary.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Slack for prices that sit on a boundary but land a hair below it in f64.
const BOUNDARY_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Quartile {
    Q1,
    Q2,
    Q3,
    Q4,
}

impl Quartile {
    fn from_index(k: i64) -> Self {
        match k.rem_euclid(4) {
            0 => Quartile::Q1,
            1 => Quartile::Q2,
            2 => Quartile::Q3,
            _ => Quartile::Q4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Quartile::Q1 => "Q1",
            Quartile::Q2 => "Q2",
            Quartile::Q3 => "Q3",
            Quartile::Q4 => "Q4",
        }
    }

    /// The quartile that follows when price climbs through the next boundary.
    pub fn next(&self) -> Self {
        match self {
            Quartile::Q1 => Quartile::Q2,
            Quartile::Q2 => Quartile::Q3,
            Quartile::Q3 => Quartile::Q4,
            Quartile::Q4 => Quartile::Q1,
        }
    }
}

impl fmt::Display for Quartile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuarterGrid {
    pub size_pips: f64,
    pub pip: f64,
}

impl Default for QuarterGrid {
    fn default() -> Self {
        Self {
            size_pips: 25.0,
            pip: 0.0001,
        }
    }
}

/// Per-bar quarter-grid features.
#[derive(Debug, Clone, PartialEq)]
pub struct QuarterGridOutput {
    pub labels: Vec<Option<Quartile>>,
    /// Price minus nearest boundary, in pips.
    pub signed_pips: Vec<f64>,
    /// Absolute distance to the nearest boundary, in pips.
    pub dist_pips: Vec<f64>,
}

impl QuarterGrid {
    pub fn new(size_pips: f64, pip: f64) -> Self {
        Self { size_pips, pip }
    }

    pub fn step(&self) -> f64 {
        self.size_pips * self.pip
    }

    fn is_usable(&self) -> bool {
        self.step() > 0.0 && self.step().is_finite()
    }

    pub fn label(&self, price: f64) -> Option<Quartile> {
        if !self.is_usable() || !price.is_finite() {
            return None;
        }
        let k = (price / self.step() + BOUNDARY_EPSILON).floor() as i64;
        Some(Quartile::from_index(k))
    }

    /// Signed distance in pips from `price` to the nearest quarter boundary.
    pub fn signed_distance_pips(&self, price: f64) -> f64 {
        if !self.is_usable() || !price.is_finite() {
            return f64::NAN;
        }
        let step = self.step();
        let nearest = (price / step).round() * step;
        (price - nearest) / self.pip
    }

    pub fn compute_prices(&self, prices: &[f64]) -> QuarterGridOutput {
        let labels = prices.iter().map(|&p| self.label(p)).collect();
        let signed_pips: Vec<f64> = prices
            .iter()
            .map(|&p| self.signed_distance_pips(p))
            .collect();
        let dist_pips = signed_pips.iter().map(|d| d.abs()).collect();
        QuarterGridOutput {
            labels,
            signed_pips,
            dist_pips,
        }
    }
}
