//! Alerting path: pick the latest alert-worthy bar, suppress repeats with a
//! last-alert checkpoint, compose the message, and hand it to a sink.
//!
//! Delivery itself is external. `OutboxSink` leaves a message file for a
//! mailer to pick up; `LogSink` only logs.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use quarterlab_core::domain::{Session, Signal};
use quarterlab_core::engine::SignalFrame;
use quarterlab_core::sentiment::market_sentiment;
use quarterlab_core::spec::{Env, Value};

use crate::config::{AlertConfig, AlertSettings};

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("failed to access checkpoint {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid checkpoint JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum AlertError {
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),
    #[error("failed to write alert to {path}: {source}")]
    Outbox {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Why the latest bar is not alert-worthy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SkipReason {
    #[error("no bars")]
    NoBars,
    #[error("latest bar has unavailable values")]
    Incomplete,
    #[error("session {0} is not alertable")]
    Session(Session),
    #[error("no entry signal")]
    NoSignal,
}

// ─── Candidate selection ────────────────────────────────────────────

/// The bar an alert would be sent for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlertCandidate {
    pub index: usize,
    pub timestamp: DateTime<Utc>,
    pub signal: Signal,
    pub price: f64,
    pub session: Session,
    /// Test mode: signal and session were forced and filters bypassed.
    pub forced: bool,
}

/// Select the latest bar as an alert candidate.
///
/// The bar must have every alias column available, fall in an alertable
/// session, and carry BUY or SELL. `force` replaces the signal, pins the
/// session to London and bypasses those filters.
pub fn latest_candidate(
    frame: &SignalFrame,
    settings: &AlertSettings,
    force: Option<Signal>,
) -> Result<AlertCandidate, SkipReason> {
    let row = frame.last_row().ok_or(SkipReason::NoBars)?;
    let i = row.index();
    let bar = row.bar();

    if let Some(signal) = force {
        return Ok(AlertCandidate {
            index: i,
            timestamp: bar.timestamp,
            signal,
            price: bar.close,
            session: Session::London,
            forced: true,
        });
    }

    let incomplete = frame
        .column_names()
        .iter()
        .filter_map(|name| frame.column(name))
        .any(|column| column.value(i) == Value::Missing);
    if incomplete {
        return Err(SkipReason::Incomplete);
    }
    if !settings.sessions.contains(&row.session()) {
        return Err(SkipReason::Session(row.session()));
    }
    if !row.signal().is_entry() {
        return Err(SkipReason::NoSignal);
    }

    Ok(AlertCandidate {
        index: i,
        timestamp: bar.timestamp,
        signal: row.signal(),
        price: bar.close,
        session: row.session(),
        forced: false,
    })
}

// ─── Checkpoint ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointPayload {
    pub signal: Signal,
    pub price: f64,
    pub session: Session,
}

/// Last alerted bar, persisted as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertCheckpoint {
    pub last_bar: DateTime<Utc>,
    pub payload: CheckpointPayload,
}

impl AlertCheckpoint {
    pub fn of(candidate: &AlertCandidate) -> Self {
        Self {
            last_bar: candidate.timestamp,
            payload: CheckpointPayload {
                signal: candidate.signal,
                price: candidate.price,
                session: candidate.session,
            },
        }
    }

    pub fn load(path: &Path) -> Result<Self, CheckpointError> {
        let text = std::fs::read_to_string(path).map_err(|source| CheckpointError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Write the checkpoint, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> Result<(), CheckpointError> {
        let io_err = |source| CheckpointError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(io_err)
    }
}

/// Whether `timestamp` was already alerted. A missing or unreadable
/// checkpoint counts as not alerted.
pub fn already_alerted(path: &Path, timestamp: DateTime<Utc>) -> bool {
    match AlertCheckpoint::load(path) {
        Ok(checkpoint) => checkpoint.last_bar == timestamp,
        Err(CheckpointError::Io { source, .. }) if source.kind() == std::io::ErrorKind::NotFound => false,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "ignoring unreadable checkpoint");
            false
        }
    }
}

// ─── Composition ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertMessage {
    pub subject: String,
    pub body: String,
    pub bar_time: DateTime<Utc>,
}

/// Build the subject and body for a candidate.
pub fn compose_alert(
    frame: &SignalFrame,
    candidate: &AlertCandidate,
    instrument: &str,
    strategy_name: &str,
    timeframe: &str,
) -> AlertMessage {
    let row = frame.row(candidate.index);
    let subject = format!(
        "[{instrument} {timeframe}] {} @ {:.5} ({})",
        candidate.signal, candidate.price, candidate.session
    );

    let mut context = Vec::new();
    let quartile = match row.lookup("QG") {
        Some(Value::Text(q)) => Some(q.to_string()),
        _ => frame.helpers.qg_label.get(candidate.index).copied().flatten().map(|q| q.to_string()),
    };
    if let Some(q) = quartile {
        context.push(format!("QG: {q}"));
    }
    if let Some(rsi) = row.number("RSI_14") {
        context.push(format!("RSI_14: {rsi:.2}"));
    }
    if let Some(ema) = row.number("EMA_50") {
        context.push(format!("EMA_50: {ema:.5}"));
    }

    let mut body = format!(
        "{instrument} {} signal\nTime (UTC): {}\nSession: {}\nClose: {}\n",
        candidate.signal,
        candidate.timestamp.format("%Y-%m-%d %H:%M:%S"),
        candidate.session,
        candidate.price,
    );
    if !context.is_empty() {
        body.push_str(&context.join(" | "));
        body.push('\n');
    }
    body.push_str(&format!(
        "Strategy: {strategy_name}\nTimeframe: {timeframe}\n(Generated from BTMM + Quarters context)\n"
    ));
    if let Some(sentiment) = market_sentiment(frame) {
        body.push_str("\nMarket Sentiment:\n");
        body.push_str(&sentiment.to_string());
    }

    AlertMessage {
        subject,
        body,
        bar_time: candidate.timestamp,
    }
}

// ─── Sinks ──────────────────────────────────────────────────────────

pub trait AlertSink {
    fn deliver(&self, message: &AlertMessage) -> Result<(), AlertError>;
}

/// Writes each message as a file under the configured outbox directory.
#[derive(Debug, Clone)]
pub struct OutboxSink {
    config: AlertConfig,
}

impl OutboxSink {
    pub fn new(config: AlertConfig) -> Self {
        Self { config }
    }

    /// Path the message for `bar_time` is written to.
    pub fn message_path(&self, bar_time: DateTime<Utc>) -> PathBuf {
        self.config
            .outbox_dir
            .join(format!("alert_{}.txt", bar_time.format("%Y%m%dT%H%M%SZ")))
    }
}

impl AlertSink for OutboxSink {
    fn deliver(&self, message: &AlertMessage) -> Result<(), AlertError> {
        let path = self.message_path(message.bar_time);
        let outbox_err = |source| AlertError::Outbox {
            path: path.clone(),
            source,
        };
        std::fs::create_dir_all(&self.config.outbox_dir).map_err(outbox_err)?;
        let content = format!(
            "To: {}\nFrom: {}\nSubject: {}\n\n{}",
            self.config.to, self.config.from, message.subject, message.body
        );
        std::fs::write(&path, content).map_err(outbox_err)?;
        info!(path = %path.display(), subject = %message.subject, "alert written to outbox");
        Ok(())
    }
}

/// Emits messages through `tracing` only.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl AlertSink for LogSink {
    fn deliver(&self, message: &AlertMessage) -> Result<(), AlertError> {
        info!(subject = %message.subject, body = %message.body, "alert");
        Ok(())
    }
}

/// What `process_alert` did.
#[derive(Debug, Clone, PartialEq)]
pub enum AlertOutcome {
    Skipped(SkipReason),
    AlreadyAlerted(DateTime<Utc>),
    Sent(AlertMessage),
}

/// Candidate selection, repeat suppression, composition and delivery.
///
/// Forced test mode bypasses the session and signal filters but not repeat
/// suppression. The checkpoint is written after a successful delivery, except
/// in forced test mode.
pub fn process_alert(
    frame: &SignalFrame,
    settings: &AlertSettings,
    force: Option<Signal>,
    labels: (&str, &str, &str),
    sink: &dyn AlertSink,
) -> Result<AlertOutcome, AlertError> {
    let (instrument, strategy_name, timeframe) = labels;
    let candidate = match latest_candidate(frame, settings, force) {
        Ok(c) => c,
        Err(reason) => {
            info!(%reason, "no alert");
            return Ok(AlertOutcome::Skipped(reason));
        }
    };
    if already_alerted(&settings.checkpoint, candidate.timestamp) {
        info!(bar = %candidate.timestamp, "already alerted for this bar");
        return Ok(AlertOutcome::AlreadyAlerted(candidate.timestamp));
    }

    let message = compose_alert(frame, &candidate, instrument, strategy_name, timeframe);
    sink.deliver(&message)?;
    if !candidate.forced {
        AlertCheckpoint::of(&candidate).save(&settings.checkpoint)?;
    }
    Ok(AlertOutcome::Sent(message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use quarterlab_core::domain::Bar;
    use quarterlab_core::engine::Column;

    /// Three bars ending at `last_hour` UTC, last one signalled `signal`.
    fn frame(last_hour: u32, signal: Signal) -> SignalFrame {
        let end = Utc.with_ymd_and_hms(2024, 3, 4, last_hour, 0, 0).unwrap();
        let bars: Vec<Bar> = (0..3)
            .map(|i| Bar {
                timestamp: end - Duration::minutes(15 * (2 - i)),
                open: 17.05,
                high: 17.06,
                low: 17.04,
                close: 17.0512,
                volume: 0.0,
            })
            .collect();
        let mut f = SignalFrame::new(bars);
        f.insert_column("RSI_14", Column::Numeric(vec![f64::NAN, 31.0, 28.456]));
        f.insert_column("EMA_50", Column::Numeric(vec![f64::NAN, 17.01, 17.01236]));
        f.insert_column("QG", Column::Label(vec![None, Some("Q1".into()), Some("Q1".into())]));
        f.signals[2] = signal;
        f
    }

    fn settings(dir: &Path) -> AlertSettings {
        AlertSettings {
            checkpoint: dir.join("alerts").join("last_alert.json"),
            ..AlertSettings::default()
        }
    }

    #[test]
    fn candidate_in_london_with_buy() {
        let c = latest_candidate(&frame(9, Signal::Buy), &AlertSettings::default(), None).unwrap();
        assert_eq!(c.index, 2);
        assert_eq!(c.signal, Signal::Buy);
        assert_eq!(c.session, Session::London);
        assert_eq!(c.price, 17.0512);
        assert!(!c.forced);
    }

    #[test]
    fn filters_reject_session_and_flat() {
        let s = AlertSettings::default();
        assert_eq!(
            latest_candidate(&frame(3, Signal::Buy), &s, None),
            Err(SkipReason::Session(Session::Asia))
        );
        assert_eq!(
            latest_candidate(&frame(13, Signal::Flat), &s, None),
            Err(SkipReason::NoSignal)
        );
        assert_eq!(
            latest_candidate(&SignalFrame::default(), &s, None),
            Err(SkipReason::NoBars)
        );
    }

    #[test]
    fn incomplete_latest_bar_is_skipped() {
        let mut f = frame(9, Signal::Sell);
        f.insert_column("RSI_14", Column::Numeric(vec![30.0, 31.0, f64::NAN]));
        assert_eq!(
            latest_candidate(&f, &AlertSettings::default(), None),
            Err(SkipReason::Incomplete)
        );
    }

    #[test]
    fn force_bypasses_filters() {
        let c = latest_candidate(&frame(3, Signal::Flat), &AlertSettings::default(), Some(Signal::Sell))
            .unwrap();
        assert_eq!(c.signal, Signal::Sell);
        assert_eq!(c.session, Session::London);
        assert!(c.forced);
    }

    #[test]
    fn subject_and_body() {
        let f = frame(9, Signal::Buy);
        let c = latest_candidate(&f, &AlertSettings::default(), None).unwrap();
        let msg = compose_alert(&f, &c, "USDMXN", "quarters pullback", "M15");
        assert_eq!(msg.subject, "[USDMXN M15] BUY @ 17.05120 (London)");
        assert!(msg.body.starts_with(
            "USDMXN BUY signal\nTime (UTC): 2024-03-04 09:00:00\nSession: London\nClose: 17.0512\n"
        ));
        assert!(msg.body.contains("QG: Q1 | RSI_14: 28.46 | EMA_50: 17.01236\n"));
        assert!(msg.body.contains("Strategy: quarters pullback\nTimeframe: M15\n"));
        assert!(msg.body.contains("\nMarket Sentiment:\n- PF: "));
        assert!(msg.body.ends_with("- Bias: Neutral bias\n"));
    }

    #[test]
    fn checkpoint_round_trip_and_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("last.json");
        let ts = Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap();
        assert!(!already_alerted(&path, ts));

        let candidate = AlertCandidate {
            index: 0,
            timestamp: ts,
            signal: Signal::Buy,
            price: 17.05,
            session: Session::London,
            forced: false,
        };
        AlertCheckpoint::of(&candidate).save(&path).unwrap();
        assert!(already_alerted(&path, ts));
        assert!(!already_alerted(&path, ts + Duration::minutes(15)));

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["payload"]["signal"], "BUY");
        assert_eq!(json["payload"]["session"], "London");
        assert!(json["last_bar"].as_str().unwrap().starts_with("2024-03-04T09:00:00"));

        std::fs::write(&path, "{not json").unwrap();
        assert!(!already_alerted(&path, ts));
    }

    #[test]
    fn process_writes_outbox_then_suppresses_repeat() {
        let dir = tempfile::tempdir().unwrap();
        let s = settings(dir.path());
        let sink = OutboxSink::new(AlertConfig {
            to: "desk@example.com".into(),
            from: "bot@example.com".into(),
            outbox_dir: dir.path().join("outbox"),
        });
        let f = frame(14, Signal::Sell);
        let labels = ("USDMXN", "pullback", "M15");

        let first = process_alert(&f, &s, None, labels, &sink).unwrap();
        let msg = match first {
            AlertOutcome::Sent(msg) => msg,
            other => panic!("expected an alert, got {other:?}"),
        };
        assert_eq!(msg.subject, "[USDMXN M15] SELL @ 17.05120 (NY)");
        let written = std::fs::read_to_string(sink.message_path(msg.bar_time)).unwrap();
        assert!(written.starts_with("To: desk@example.com\nFrom: bot@example.com\nSubject: [USDMXN M15]"));
        assert!(s.checkpoint.exists());

        let second = process_alert(&f, &s, None, labels, &sink).unwrap();
        assert_eq!(second, AlertOutcome::AlreadyAlerted(msg.bar_time));
    }

    #[test]
    fn forced_alert_leaves_checkpoint_alone() {
        let dir = tempfile::tempdir().unwrap();
        let s = settings(dir.path());
        let f = frame(3, Signal::Flat);
        let out = process_alert(&f, &s, Some(Signal::Buy), ("USDMXN", "p", "M15"), &LogSink).unwrap();
        assert!(matches!(out, AlertOutcome::Sent(_)));
        assert!(!s.checkpoint.exists());
    }

    #[test]
    fn forced_alert_still_respects_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let s = settings(dir.path());
        let f = frame(3, Signal::Flat);
        let candidate = latest_candidate(&f, &s, Some(Signal::Buy)).unwrap();
        AlertCheckpoint::of(&candidate).save(&s.checkpoint).unwrap();

        let out = process_alert(&f, &s, Some(Signal::Buy), ("USDMXN", "p", "M15"), &LogSink).unwrap();
        assert_eq!(out, AlertOutcome::AlreadyAlerted(candidate.timestamp));
    }
}
