//! Artifact export: signal-annotated CSV, equity and trade CSVs, and the
//! JSON report.
//!
//! The JSON report carries a `schema_version` field. Newer versions are
//! rejected on load.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use quarterlab_core::backtest::{SimulationResult, TradeRecord};
use quarterlab_core::domain::Side;
use quarterlab_core::engine::SignalFrame;

use crate::runner::{BacktestReport, BacktestRun, SCHEMA_VERSION};

// ─── JSON export ────────────────────────────────────────────────────

/// Serialize a `BacktestReport` to pretty JSON.
pub fn export_json(report: &BacktestReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("failed to serialize BacktestReport to JSON")
}

/// Deserialize a `BacktestReport` from JSON, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<BacktestReport> {
    let report: BacktestReport =
        serde_json::from_str(json).context("failed to deserialize BacktestReport from JSON")?;
    if report.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            report.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(report)
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Export the signal-annotated frame, one row per bar.
///
/// Columns: timestamp, Open, High, Low, Close, Volume, Session, every alias
/// column in declaration order, Signal, and when a simulation is given,
/// TradeAction and Equity. Unavailable values are empty cells.
pub fn export_signals_csv(frame: &SignalFrame, simulation: Option<&SimulationResult>) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    let mut header: Vec<&str> = vec!["timestamp", "Open", "High", "Low", "Close", "Volume", "Session"];
    header.extend(frame.column_names().iter().map(String::as_str));
    header.push("Signal");
    if simulation.is_some() {
        header.extend(["TradeAction", "Equity"]);
    }
    wtr.write_record(&header)?;

    for i in 0..frame.len() {
        let bar = &frame.bars[i];
        let mut record = vec![
            bar.timestamp.to_rfc3339(),
            bar.open.to_string(),
            bar.high.to_string(),
            bar.low.to_string(),
            bar.close.to_string(),
            bar.volume.to_string(),
            frame.sessions[i].to_string(),
        ];
        for name in frame.column_names() {
            let cell = frame.column(name).map(|c| c.render(i)).unwrap_or_default();
            record.push(cell);
        }
        record.push(frame.signals[i].to_string());
        if let Some(sim) = simulation {
            let action = sim.actions.get(i).copied().flatten();
            record.push(action.map(|a| a.to_string()).unwrap_or_default());
            record.push(sim.equity.get(i).map(|e| format!("{:.2}", e)).unwrap_or_default());
        }
        wtr.write_record(&record)?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Export a trade list as CSV.
///
/// Columns: side, entry_index, entry_time, entry_price, stop, target,
/// exit_index, exit_time, outcome, bars_held
pub fn export_trades_csv(trades: &[TradeRecord]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "side",
        "entry_index",
        "entry_time",
        "entry_price",
        "stop",
        "target",
        "exit_index",
        "exit_time",
        "outcome",
        "bars_held",
    ])?;

    for t in trades {
        let side = match t.side {
            Side::Long => "LONG",
            Side::Short => "SHORT",
        };
        wtr.write_record([
            side.to_string(),
            t.entry_index.to_string(),
            t.entry_time.to_rfc3339(),
            format!("{:.5}", t.entry_price),
            format!("{:.5}", t.stop),
            format!("{:.5}", t.target),
            t.exit_index.to_string(),
            t.exit_time.to_rfc3339(),
            t.outcome.action().to_string(),
            t.bars_held().to_string(),
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Export an equity curve as CSV with timestamp and equity columns.
pub fn export_equity_csv(frame: &SignalFrame, equity_curve: &[f64]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["timestamp", "equity"])?;
    for (bar, eq) in frame.bars.iter().zip(equity_curve) {
        wtr.write_record([bar.timestamp.to_rfc3339(), format!("{:.2}", eq)])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Save the full artifact set for a single backtest run.
///
/// Creates `output_dir` if needed and writes:
/// - `report.json`: the `BacktestReport`
/// - `signals.csv`: bars with features, signals, actions and equity
/// - `equity.csv`: bar-by-bar equity curve
/// - `trades.csv`: closed trades
///
/// Returns the path of `report.json`.
pub fn save_artifacts(run: &BacktestRun, output_dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create artifact dir: {}", output_dir.display()))?;

    let report_path = output_dir.join("report.json");
    write(&report_path, &export_json(&run.report)?)?;
    write(
        &output_dir.join("signals.csv"),
        &export_signals_csv(&run.frame, Some(&run.simulation))?,
    )?;
    write(
        &output_dir.join("equity.csv"),
        &export_equity_csv(&run.frame, &run.simulation.equity)?,
    )?;
    write(&output_dir.join("trades.csv"), &export_trades_csv(&run.simulation.trades)?)?;

    Ok(report_path)
}

/// Load a `BacktestReport` from an artifact directory's report.json.
///
/// Rejects unknown schema versions.
pub fn load_report(dir: &Path) -> Result<BacktestReport> {
    let path = dir.join("report.json");
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    import_json(&json)
}

fn write(path: &Path, content: &str) -> Result<()> {
    std::fs::write(path, content).with_context(|| format!("failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use quarterlab_core::backtest::{simulate, SimulationParams, TradeOutcome};
    use quarterlab_core::domain::{Bar, Signal};
    use quarterlab_core::engine::{Column, ATR_COLUMN};

    fn frame() -> SignalFrame {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap();
        let bars: Vec<Bar> = (0..4)
            .map(|i| Bar {
                timestamp: start + Duration::minutes(15 * i),
                open: 1.1,
                high: 1.1002,
                low: 1.0998,
                close: 1.1,
                volume: 5.0,
            })
            .collect();
        let mut f = SignalFrame::new(bars);
        f.insert_column("RSI_14", Column::Numeric(vec![f64::NAN, 40.0, 30.5, 55.0]));
        f.insert_column(
            "QG",
            Column::Label(vec![None, Some("Q1".into()), Some("Q2".into()), Some("Q2".into())]),
        );
        f.insert_column(ATR_COLUMN, Column::Numeric(vec![0.001; 4]));
        f.signals[1] = Signal::Buy;
        f
    }

    fn trade() -> TradeRecord {
        TradeRecord {
            side: Side::Short,
            entry_index: 3,
            entry_time: Utc.with_ymd_and_hms(2024, 1, 1, 8, 45, 0).unwrap(),
            entry_price: 1.1,
            stop: 1.1015,
            target: 1.097,
            exit_index: 9,
            exit_time: Utc.with_ymd_and_hms(2024, 1, 1, 10, 15, 0).unwrap(),
            outcome: TradeOutcome::StopLoss,
        }
    }

    #[test]
    fn signals_csv_header_and_blanks() {
        let csv = export_signals_csv(&frame(), None).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 5);
        assert_eq!(
            lines[0],
            "timestamp,Open,High,Low,Close,Volume,Session,RSI_14,QG,ATR_14,Signal"
        );
        assert!(lines[1].starts_with("2024-01-01T08:00:00+00:00,1.1,1.1002,1.0998,1.1,5,London,,,0.001,FLAT"));
        assert!(lines[2].ends_with(",London,40,Q1,0.001,BUY"));
    }

    #[test]
    fn signals_csv_with_simulation() {
        let f = frame();
        let sim = simulate(&f, &SimulationParams::default()).unwrap();
        let csv = export_signals_csv(&f, Some(&sim)).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert!(lines[0].ends_with("Signal,TradeAction,Equity"));
        assert!(lines[1].ends_with("FLAT,,10000.00"));
        assert!(lines[2].ends_with("BUY,BUY,10000.00"));
    }

    #[test]
    fn trades_csv_content() {
        let csv = export_trades_csv(&[trade()]).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("side,entry_index"));
        assert_eq!(
            lines[1],
            "SHORT,3,2024-01-01T08:45:00+00:00,1.10000,1.10150,1.09700,9,2024-01-01T10:15:00+00:00,EXIT-SL,6"
        );
    }

    #[test]
    fn csv_empty_trades() {
        let csv = export_trades_csv(&[]).unwrap();
        assert_eq!(csv.lines().count(), 1);
    }

    #[test]
    fn equity_csv_rows() {
        let csv = export_equity_csv(&frame(), &[10_000.0, 10_000.0, 10_200.0, 10_200.0]).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "timestamp,equity");
        assert_eq!(lines[3], "2024-01-01T08:30:00+00:00,10200.00");
    }
}
