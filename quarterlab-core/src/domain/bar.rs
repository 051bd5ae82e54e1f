//! Bar: the fundamental market data unit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// OHLCV bar for one fixed interval of a single currency pair.
///
/// Timestamps are UTC. Volume is tick volume for FX feeds and may be zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Errors for bar sequences that violate ordering or uniqueness.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BarError {
    #[error("duplicate timestamp {timestamp} at bar {index}")]
    DuplicateTimestamp {
        index: usize,
        timestamp: DateTime<Utc>,
    },
    #[error("timestamp {timestamp} at bar {index} is earlier than its predecessor")]
    OutOfOrder {
        index: usize,
        timestamp: DateTime<Utc>,
    },
}

impl Bar {
    /// Returns true if any OHLCV field is NaN.
    pub fn is_void(&self) -> bool {
        self.open.is_nan()
            || self.high.is_nan()
            || self.low.is_nan()
            || self.close.is_nan()
            || self.volume.is_nan()
    }

    /// OHLC sanity: High >= max(Open, Close) >= min(Open, Close) >= Low,
    /// positive prices, non-negative volume.
    pub fn is_sane(&self) -> bool {
        if self.is_void() {
            return false;
        }
        self.high >= self.open.max(self.close)
            && self.open.min(self.close) >= self.low
            && self.low > 0.0
            && self.volume >= 0.0
    }
}

/// Check that timestamps are strictly increasing (monotonic and unique).
pub fn validate_series(bars: &[Bar]) -> Result<(), BarError> {
    for (i, pair) in bars.windows(2).enumerate() {
        let (prev, curr) = (&pair[0], &pair[1]);
        if curr.timestamp == prev.timestamp {
            return Err(BarError::DuplicateTimestamp {
                index: i + 1,
                timestamp: curr.timestamp,
            });
        }
        if curr.timestamp < prev.timestamp {
            return Err(BarError::OutOfOrder {
                index: i + 1,
                timestamp: curr.timestamp,
            });
        }
    }
    Ok(())
}
