//! Bar loading for the runner.
//!
//! Two sources:
//! 1. A CSV file with `Datetime,Open,High,Low,Close[,Volume]`
//! 2. Deterministic synthetic bars (`--synthetic`), seeded from the symbol
//!
//! Synthetic data is a developer-only debug mode. Results produced on
//! synthetic data are tagged in the report.

use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

use quarterlab_core::domain::{validate_series, Bar, BarError};
use quarterlab_core::spec::Timeframe;

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to open bars file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("row {row}: unrecognised timestamp '{value}'")]
    Timestamp { row: usize, value: String },

    #[error("bar series rejected: {0}")]
    Series(#[from] BarError),
}

/// Bars plus provenance.
#[derive(Debug, Clone)]
pub struct LoadedBars {
    pub bars: Vec<Bar>,
    /// BLAKE3 over timestamps and OHLCV, for reproducibility checks.
    pub dataset_hash: String,
    pub synthetic: bool,
    /// Data-quality problems that did not stop the load.
    pub warnings: Vec<String>,
}

impl LoadedBars {
    pub fn new(bars: Vec<Bar>, synthetic: bool, warnings: Vec<String>) -> Self {
        let dataset_hash = compute_dataset_hash(&bars);
        Self {
            bars,
            dataset_hash,
            synthetic,
            warnings,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(alias = "Date", alias = "Timestamp", alias = "timestamp", alias = "datetime")]
    #[serde(rename = "Datetime")]
    datetime: String,
    #[serde(rename = "Open", alias = "open")]
    open: f64,
    #[serde(rename = "High", alias = "high")]
    high: f64,
    #[serde(rename = "Low", alias = "low")]
    low: f64,
    #[serde(rename = "Close", alias = "close")]
    close: f64,
    #[serde(rename = "Volume", alias = "volume", default)]
    volume: Option<f64>,
}

/// Load bars from a CSV file.
pub fn load_bars_csv(path: &Path) -> Result<LoadedBars, LoadError> {
    let file = std::fs::File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let loaded = read_bars_csv(file)?;
    info!(
        path = %path.display(),
        bars = loaded.bars.len(),
        warnings = loaded.warnings.len(),
        "bars loaded"
    );
    Ok(loaded)
}

/// Read bars from any CSV source.
///
/// Rows are sorted by timestamp. Duplicate timestamps are an error; bars
/// that break the OHLC inequalities are kept and reported as warnings.
pub fn read_bars_csv<R: Read>(reader: R) -> Result<LoadedBars, LoadError> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut bars = Vec::new();

    for (i, row) in rdr.deserialize::<CsvRow>().enumerate() {
        let row = row?;
        let timestamp = parse_timestamp(&row.datetime).ok_or_else(|| LoadError::Timestamp {
            row: i + 1,
            value: row.datetime.clone(),
        })?;
        bars.push(Bar {
            timestamp,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume.unwrap_or(0.0),
        });
    }

    bars.sort_by_key(|b| b.timestamp);
    validate_series(&bars)?;

    let warnings: Vec<String> = bars
        .iter()
        .filter(|b| !b.is_sane())
        .map(|b| format!("{}: OHLC values out of order or non-positive", b.timestamp.to_rfc3339()))
        .collect();
    if !warnings.is_empty() {
        warn!(count = warnings.len(), "bars failed sanity checks");
    }

    Ok(LoadedBars::new(bars, false, warnings))
}

/// RFC 3339, or `YYYY-MM-DD HH:MM[:SS]` / `YYYY-MM-DDTHH:MM[:SS]` read as UTC.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%:z") {
        return Some(dt.with_timezone(&Utc));
    }
    const NAIVE_FORMATS: [&str; 4] = [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M",
    ];
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Deterministic BLAKE3 hash over every bar.
pub fn compute_dataset_hash(bars: &[Bar]) -> String {
    let mut hasher = blake3::Hasher::new();
    for bar in bars {
        hasher.update(&bar.timestamp.timestamp().to_le_bytes());
        hasher.update(&bar.open.to_le_bytes());
        hasher.update(&bar.high.to_le_bytes());
        hasher.update(&bar.low.to_le_bytes());
        hasher.update(&bar.close.to_le_bytes());
        hasher.update(&bar.volume.to_le_bytes());
    }
    hasher.finalize().to_hex().to_string()
}

/// Start of every synthetic series.
pub fn synthetic_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// Generate `count` synthetic FX bars at `timeframe` spacing.
///
/// A random walk from 1.1000 with per-bar moves of up to ±8 pips. Same
/// symbol, same bars.
pub fn generate_synthetic_bars(
    symbol: &str,
    start: DateTime<Utc>,
    count: usize,
    timeframe: Timeframe,
) -> Vec<Bar> {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    // Deterministic seed from symbol name
    let seed: [u8; 32] = *blake3::hash(symbol.as_bytes()).as_bytes();
    let mut rng = StdRng::from_seed(seed);
    let step = Duration::minutes(timeframe.minutes() as i64);

    let mut bars = Vec::with_capacity(count);
    let mut price = 1.1000_f64;
    for i in 0..count {
        let open = price;
        let close = (open + rng.gen_range(-0.0008..0.0008)).max(0.01);
        let high = open.max(close) + rng.gen_range(0.0..0.0005);
        let low = open.min(close) - rng.gen_range(0.0..0.0005);
        bars.push(Bar {
            timestamp: start + step * i as i32,
            open,
            high,
            low,
            close,
            volume: rng.gen_range(100.0..5_000.0_f64).round(),
        });
        price = close;
    }
    bars
}

/// Synthetic bars wrapped as a tagged load result.
pub fn synthetic_data(symbol: &str, count: usize, timeframe: Timeframe) -> LoadedBars {
    warn!(symbol, count, "generating synthetic data; results will be tagged as synthetic");
    let bars = generate_synthetic_bars(symbol, synthetic_start(), count, timeframe);
    LoadedBars::new(bars, true, Vec::new())
}
