//! QuarterLab CLI: backtest, signal, alert, validation and sweep commands.
//!
//! Commands:
//! - `backtest`: run the full pipeline and save report.json plus CSV artifacts
//! - `signals`: write the signal-annotated bar CSV
//! - `alert`: check the latest bar and hand an alert to a sink
//! - `validate`: compile a strategy document and print a summary
//! - `sweep`: grid over TP/SL multiples, ranked by Sharpe
//!
//! Logging goes through `tracing`; set `RUST_LOG` to change the level.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use quarterlab_core::domain::Signal;
use quarterlab_core::engine::{signalize, SignalCounts, SignalFrame};
use quarterlab_core::spec::{CompiledStrategy, StrategySpec};
use quarterlab_runner::export::export_signals_csv;
use quarterlab_runner::runner::{instrument_of, load_input, load_strategy};
use quarterlab_runner::{
    process_alert, run_pipeline, run_sweep, save_artifacts, AlertConfig, AlertOutcome, AlertSink,
    BacktestReport, LogSink, OutboxSink, ParamGrid, RunConfig,
};

#[derive(Parser)]
#[command(
    name = "quarterlab",
    about = "QuarterLab CLI: rule-based FX signals and backtests"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Where bars and the strategy come from. Flags override the config file.
#[derive(Args, Debug, Clone)]
struct InputArgs {
    /// Run configuration TOML.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Bar CSV (Datetime,Open,High,Low,Close[,Volume]).
    #[arg(long)]
    bars: Option<PathBuf>,

    /// Strategy document (.json or .toml).
    #[arg(long)]
    spec: Option<PathBuf>,

    /// Generate this many synthetic bars instead of reading --bars.
    #[arg(long)]
    synthetic: Option<usize>,

    /// Instrument label. Defaults to the strategy's first instrument.
    #[arg(long)]
    instrument: Option<String>,
}

/// Signal forced by `alert --force`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum ForceSignal {
    #[value(name = "BUY", alias = "buy")]
    Buy,
    #[value(name = "SELL", alias = "sell")]
    Sell,
}

impl ForceSignal {
    fn signal(self) -> Signal {
        match self {
            ForceSignal::Buy => Signal::Buy,
            ForceSignal::Sell => Signal::Sell,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run a backtest and save its artifacts.
    Backtest {
        #[command(flatten)]
        input: InputArgs,

        /// Output directory. Overrides [run].output_dir.
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Write the signal-annotated bar CSV.
    Signals {
        #[command(flatten)]
        input: InputArgs,

        /// Output CSV path.
        #[arg(long, default_value = "outputs/signals.csv")]
        output: PathBuf,
    },
    /// Check the latest bar and emit an alert when it qualifies.
    Alert {
        #[command(flatten)]
        input: InputArgs,

        /// Last-alert checkpoint. Overrides [alert].checkpoint.
        #[arg(long)]
        checkpoint: Option<PathBuf>,

        /// Test mode: force BUY or SELL, skip filters, leave the checkpoint alone.
        #[arg(long, value_enum)]
        force: Option<ForceSignal>,

        /// Write to the outbox configured by ALERT_TO/ALERT_FROM/ALERT_OUTBOX_DIR
        /// instead of logging.
        #[arg(long, default_value_t = false)]
        outbox: bool,
    },
    /// Compile a strategy document and print a summary.
    Validate {
        /// Strategy document (.json or .toml).
        #[arg(long)]
        spec: PathBuf,
    },
    /// Sweep TP/SL multiples over one signalized series.
    Sweep {
        #[command(flatten)]
        input: InputArgs,

        /// Comma-separated reward/risk multiples.
        #[arg(long, value_delimiter = ',', default_values_t = [1.5, 2.0, 3.0])]
        tp_rr: Vec<f64>,

        /// Comma-separated ATR stop multiples.
        #[arg(long, value_delimiter = ',', default_values_t = [1.0, 1.5, 2.0])]
        sl_atr_mult: Vec<f64>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Backtest { input, output_dir } => run_backtest_cmd(&input, output_dir),
        Commands::Signals { input, output } => run_signals_cmd(&input, &output),
        Commands::Alert {
            input,
            checkpoint,
            force,
            outbox,
        } => run_alert_cmd(&input, checkpoint, force, outbox),
        Commands::Validate { spec } => run_validate_cmd(&spec),
        Commands::Sweep {
            input,
            tp_rr,
            sl_atr_mult,
        } => run_sweep_cmd(&input, tp_rr, sl_atr_mult),
    }
}

/// Config file (or defaults) with command-line overrides applied.
fn resolve_config(input: &InputArgs) -> Result<RunConfig> {
    let mut config = match &input.config {
        Some(path) => RunConfig::from_file(path)?,
        None => RunConfig::default(),
    };
    if input.bars.is_some() {
        config.run.bars = input.bars.clone();
    }
    if input.spec.is_some() {
        config.run.spec = input.spec.clone();
    }
    if input.synthetic.is_some() {
        config.run.synthetic_bars = input.synthetic;
    }
    if input.instrument.is_some() {
        config.run.instrument = input.instrument.clone();
    }
    config.validate()?;
    if config.run.spec.is_none() {
        bail!("a strategy is required: pass --spec or set [run].spec");
    }
    if config.run.bars.is_none() && config.run.synthetic_bars.is_none() {
        bail!("bars are required: pass --bars, --synthetic, or set [run].bars");
    }
    Ok(config)
}

/// Strategy plus its signalized frame, without simulating.
fn signal_frame(config: &RunConfig) -> Result<(CompiledStrategy, SignalFrame)> {
    let strategy = load_strategy(&config.run)?;
    let loaded = load_input(&config.run, &strategy)?;
    for w in &loaded.warnings {
        tracing::warn!("{w}");
    }
    let frame = signalize(loaded.bars, &strategy, &config.features);
    Ok((strategy, frame))
}

fn run_backtest_cmd(input: &InputArgs, output_dir: Option<PathBuf>) -> Result<()> {
    let mut config = resolve_config(input)?;
    if let Some(dir) = output_dir {
        config.run.output_dir = dir;
    }

    let Some(run) = run_pipeline(&config)? else {
        println!("No bars to process.");
        return Ok(());
    };

    print_summary(&run.report);

    let report_path = save_artifacts(&run, &config.run.output_dir)?;
    println!("Artifacts saved to: {}", config.run.output_dir.display());
    println!("Report: {}", report_path.display());

    Ok(())
}

fn run_signals_cmd(input: &InputArgs, output: &Path) -> Result<()> {
    let config = resolve_config(input)?;
    let (strategy, frame) = signal_frame(&config)?;

    let csv = export_signals_csv(&frame, None)?;
    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(output, csv).with_context(|| format!("failed to write {}", output.display()))?;

    let counts = SignalCounts::of(&frame.signals);
    println!(
        "{}: {} bars, {} BUY, {} SELL, {} FLAT",
        strategy.name(),
        frame.len(),
        counts.buy,
        counts.sell,
        counts.flat
    );
    println!("Signals saved to: {}", output.display());
    Ok(())
}

fn run_alert_cmd(
    input: &InputArgs,
    checkpoint: Option<PathBuf>,
    force: Option<ForceSignal>,
    outbox: bool,
) -> Result<()> {
    let mut config = resolve_config(input)?;
    if let Some(path) = checkpoint {
        config.alert.checkpoint = path;
    }
    let force = force.map(ForceSignal::signal);

    let (strategy, frame) = signal_frame(&config)?;
    let instrument = instrument_of(&config.run, &strategy);
    let timeframe = strategy.timeframe().to_string();

    let sink: Box<dyn AlertSink> = if outbox {
        Box::new(OutboxSink::new(AlertConfig::from_env()?))
    } else {
        Box::new(LogSink)
    };

    let outcome = process_alert(
        &frame,
        &config.alert,
        force,
        (&instrument, strategy.name(), &timeframe),
        sink.as_ref(),
    )?;
    match outcome {
        AlertOutcome::Skipped(reason) => println!("No alert: {reason}."),
        AlertOutcome::AlreadyAlerted(bar) => println!("Already alerted for bar {bar}."),
        AlertOutcome::Sent(message) => {
            println!("{}", message.subject);
            println!();
            print!("{}", message.body);
        }
    }
    Ok(())
}

fn run_validate_cmd(spec: &Path) -> Result<()> {
    let strategy = StrategySpec::load(spec)
        .with_context(|| format!("strategy {} is invalid", spec.display()))?;

    println!("=== Strategy ===");
    println!("Name:           {}", strategy.name());
    println!("Timeframe:      {}", strategy.timeframe());
    println!("Instruments:    {}", strategy.spec.instruments.join(", "));
    println!("Columns:        {}", strategy.output_columns().join(", "));
    println!("Entry rules:    {}", strategy.rules.len());
    for rule in &strategy.rules {
        let session = rule.session.map(|s| format!(" [{s}]")).unwrap_or_default();
        println!("  {:?}{session}: {}", rule.side, rule.condition);
    }
    println!("TP (R:R):       {}", strategy.tp_rr);
    println!("SL (x ATR):     {}", strategy.sl_atr_mult);
    println!("Fingerprint:    {}", strategy.fingerprint);
    Ok(())
}

fn run_sweep_cmd(input: &InputArgs, tp_rr: Vec<f64>, sl_atr_mult: Vec<f64>) -> Result<()> {
    let config = resolve_config(input)?;
    let (strategy, frame) = signal_frame(&config)?;
    if frame.is_empty() {
        println!("No bars to process.");
        return Ok(());
    }

    let grid = ParamGrid { tp_rr, sl_atr_mult };
    let base = config.simulation.params_for(&strategy);
    let points = run_sweep(&frame, &grid, &base, strategy.timeframe().periods_per_year())?;

    println!(
        "{:>6} {:>6} {:>10} {:>8} {:>8} {:>7} {:>8}",
        "TP_RR", "SL_ATR", "Return", "Sharpe", "MaxDD", "Trades", "WinRate"
    );
    for p in &points {
        let m = &p.metrics;
        println!(
            "{:>6.2} {:>6.2} {:>9.2}% {:>8.3} {:>7.2}% {:>7} {:>7.1}%",
            p.tp_rr,
            p.sl_atr_mult,
            m.total_return * 100.0,
            m.sharpe,
            m.max_drawdown * 100.0,
            m.trade_count,
            m.win_rate * 100.0
        );
    }
    Ok(())
}

fn print_summary(report: &BacktestReport) {
    println!();
    println!("=== Backtest Result ===");
    println!("Strategy:       {}", report.strategy_name);
    println!("Instrument:     {} {}", report.instrument, report.timeframe);
    if let (Some(first), Some(last)) = (&report.first_bar, &report.last_bar) {
        println!("Period:         {first} to {last}");
    }
    println!("Bars:           {}", report.bar_count);
    let c = report.signal_counts;
    println!("Signals:        {} BUY / {} SELL / {} FLAT", c.buy, c.sell, c.flat);
    println!("Trades:         {}", report.metrics.trade_count);
    if let Some(open) = &report.open_position {
        println!("Open position:  {:?} from bar {}", open.side, open.entry_index);
    }
    println!();
    println!("--- Performance ---");
    println!("Total Return:   {:.2}%", report.metrics.total_return * 100.0);
    println!("Sharpe:         {:.3}", report.metrics.sharpe);
    println!("Max Drawdown:   {:.2}%", report.metrics.max_drawdown * 100.0);
    println!("Win Rate:       {:.1}%", report.metrics.win_rate * 100.0);
    if report.synthetic {
        println!();
        println!("WARNING: Results based on SYNTHETIC data");
    }
    for warn in &report.data_quality_warnings {
        println!("WARNING: {warn}");
    }
}
