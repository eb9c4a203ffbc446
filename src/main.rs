//! Levitator — host entry point.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  WriterLink        LogEventSink   JsonConfigFile   HostClock   │
//! │  (ActuationLink)   (EventSink)    (ConfigPort)     (Clock)     │
//! │  LinkReader        HistoryFileSink                             │
//! │  (SampleFeed)      (HistorySink)                               │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │            ControlArbiter (pure logic)                 │    │
//! │  │  ModeMachine · FuzzyController · Proportional          │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  runtime (control thread) · calibration (offline)              │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Subcommands: `convert`, `calibrate`, `defaults`, `replay` and `run`
//! (see `levitator --help`).  A global `--config <path>` loads tuning,
//! including any saved calibration, from a JSON file.
//!
//! `replay` and `run` also accept operator lines between samples:
//! `!height <cm>`, `!mode`, `!power <pct>` and `!calibrate <history.csv>`.

use std::cell::Cell;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueHint};
use log::{info, warn};

use levitator::adapters::config_file::JsonConfigFile;
use levitator::adapters::console_logger;
use levitator::adapters::history_file::HistoryFileSink;
use levitator::adapters::log_sink::LogEventSink;
use levitator::adapters::operator_console::{calibrate_from_file, parse_operator_line, resolve};
use levitator::adapters::serial_link::WriterLink;
use levitator::adapters::time::{HostClock, format_unix_ms};
use levitator::app::ports::{Clock, ConfigPort, HistorySink};
use levitator::app::service::{ControlArbiter, TickOutcome};
use levitator::calibration::history::{HistoryRecord, TIMESTAMP_LEN};
use levitator::calibration::raw::{parse_raw_log, to_csv};
use levitator::config::SystemConfig;
use levitator::runtime::{self, LoopIo};
use levitator::sensors::{LinkLine, SampleFeed};

#[derive(Parser)]
#[command(author, version, about = "Fan-driven levitation controller")]
struct Cli {
    /// JSON config file; defaults are used when omitted
    #[arg(long, global = true, value_hint = ValueHint::FilePath)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Convert a raw PWM sweep log into `pwm,distance_cm` CSV
    Convert {
        #[arg(value_hint = ValueHint::FilePath)]
        input: PathBuf,
        /// Output file; stdout when omitted
        #[arg(value_hint = ValueHint::FilePath)]
        output: Option<PathBuf>,
    },

    /// Calibrate from a history log and print the result as JSON
    Calibrate {
        #[arg(value_hint = ValueHint::FilePath)]
        history: PathBuf,
        /// Config file to store the calibration in
        #[arg(value_hint = ValueHint::FilePath)]
        save_to: Option<PathBuf>,
    },

    /// Print the default config as JSON
    Defaults,

    /// Tick once per line of a sample file, writing PWM lines to stdout
    Replay {
        #[arg(value_hint = ValueHint::FilePath)]
        samples: PathBuf,
        /// History log to append to
        #[arg(value_hint = ValueHint::FilePath)]
        history: Option<PathBuf>,
    },

    /// Run the live loop with link lines on stdin and PWM lines on stdout
    Run {
        #[arg(value_hint = ValueHint::FilePath, default_value = "history.csv")]
        history: PathBuf,
    },
}

fn main() -> Result<()> {
    console_logger::init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => JsonConfigFile::new(path)
            .load()
            .with_context(|| format!("loading config {}", path.display()))?,
        None => SystemConfig::default(),
    };

    match cli.command {
        Command::Convert { input, output } => convert(&config, &input, output.as_deref()),
        Command::Calibrate { history, save_to } => calibrate(&config, &history, save_to.as_deref()),
        Command::Defaults => {
            println!("{}", serde_json::to_string_pretty(&SystemConfig::default())?);
            Ok(())
        }
        Command::Replay { samples, history } => replay(&config, &samples, history.as_deref()),
        Command::Run { history } => run(&config, &history),
    }
}

// ── convert ───────────────────────────────────────────────────

fn convert(config: &SystemConfig, input: &Path, output: Option<&Path>) -> Result<()> {
    let text = std::fs::read_to_string(input)
        .with_context(|| format!("reading {}", input.display()))?;
    let (samples, report) = parse_raw_log(&text, &config.spike_filter);
    let csv = to_csv(&samples);
    match output {
        Some(path) => std::fs::write(path, csv)
            .with_context(|| format!("writing {}", path.display()))?,
        None => print!("{csv}"),
    }
    info!(
        "convert: {} parsed, {} saturated, {} spikes, {} kept",
        report.parsed,
        report.saturated,
        report.spikes,
        samples.len()
    );
    Ok(())
}

// ── calibrate ─────────────────────────────────────────────────

/// Print the calibration result.  With a config path, the result is also
/// stored in that file and installed whenever the config is loaded.
fn calibrate(config: &SystemConfig, input: &Path, save_to: Option<&Path>) -> Result<()> {
    let result = calibrate_from_file(input, config)?;
    println!("{}", serde_json::to_string_pretty(&result)?);

    if let Some(path) = save_to {
        let port = JsonConfigFile::new(path);
        let mut updated = port
            .load()
            .with_context(|| format!("loading {}", path.display()))?;
        if let Some(gain) = result.trim_gain {
            updated.fuzzy.trim_gain = gain;
        }
        updated.fuzzy.calibrated = Some(result);
        port.save(&updated)
            .with_context(|| format!("saving {}", path.display()))?;
        info!("calibrate: calibration saved to {}", path.display());
    }
    Ok(())
}

// ── replay ────────────────────────────────────────────────────

/// Simulated time for replay: one control period per input line.
struct ReplayClock {
    now: Cell<u64>,
    wall_origin: i64,
}

impl Clock for ReplayClock {
    fn now_ms(&self) -> u64 {
        self.now.get()
    }

    fn wall_time_iso(&self) -> heapless::String<TIMESTAMP_LEN> {
        format_unix_ms(self.wall_origin + self.now.get() as i64)
    }
}

/// Drops records.
struct NoHistory;

impl HistorySink for NoHistory {
    fn record(&mut self, _: &HistoryRecord) {}
}

fn replay(config: &SystemConfig, input: &Path, history_path: Option<&Path>) -> Result<()> {
    let file = std::fs::File::open(input)
        .with_context(|| format!("opening {}", input.display()))?;
    let period = u64::from(config.arbiter.control_period_ms);
    let clock = ReplayClock {
        now: Cell::new(0),
        wall_origin: Utc::now().timestamp_millis(),
    };
    let mut history: Box<dyn HistorySink> = match history_path {
        Some(path) => Box::new(HistoryFileSink::open(path)?),
        None => Box::new(NoHistory),
    };
    let mut link = WriterLink::new(std::io::stdout().lock());
    let mut events = LogEventSink::new();
    let feed = SampleFeed::new();

    let mut arbiter = ControlArbiter::new(config);
    arbiter.start(&mut events);

    let mut dispatched = 0u64;
    for line in BufReader::new(file).lines() {
        let line = line.with_context(|| format!("reading {}", input.display()))?;
        if let Some(op) = parse_operator_line(&line) {
            match resolve(op, config) {
                Ok(cmd) => arbiter.handle_command(cmd, &mut link, &mut events),
                Err(e) => warn!("replay: {e:#}"),
            }
            continue;
        }
        clock.now.set(clock.now.get() + period);
        if let LinkLine::Distance(_) = feed.push_line(&line, clock.now_ms()) {
            while let Some(sample) = feed.try_receive() {
                arbiter.cache().publish(sample);
            }
        }
        if let TickOutcome::Dispatched(_) = arbiter.tick(&clock, &mut link, &mut history, &mut events) {
            dispatched += 1;
        }
    }
    info!(
        "replay: {} ticks, {} skipped, {} dispatched, final mode {}",
        arbiter.tick_count(),
        arbiter.skipped_ticks(),
        dispatched,
        arbiter.mode()
    );
    Ok(())
}

// ── run ───────────────────────────────────────────────────────

fn run(config: &SystemConfig, history_path: &Path) -> Result<()> {
    let clock = HostClock::new();
    let io = LoopIo {
        link: WriterLink::new(std::io::stdout()),
        history: HistoryFileSink::open(history_path)?,
        events: LogEventSink::new(),
        clock,
    };
    let handle = runtime::spawn(
        ControlArbiter::new(config),
        io,
        Duration::from_millis(u64::from(config.arbiter.control_period_ms)),
    )?;
    let feed = handle.feed();
    let commands = handle.commands();

    for line in std::io::stdin().lock().lines() {
        let line = line.context("reading stdin")?;
        if let Some(op) = parse_operator_line(&line) {
            match resolve(op, config) {
                Ok(cmd) => {
                    if !commands.submit(cmd) {
                        warn!("run: command queue full, command dropped");
                    }
                }
                Err(e) => warn!("run: {e:#}"),
            }
            continue;
        }
        match feed.push_line(&line, clock.now_ms()) {
            LinkLine::Ready => info!("run: sensor ready"),
            LinkLine::Error => warn!("run: sensor reported an error"),
            LinkLine::Distance(_) | LinkLine::Unknown => {}
        }
    }

    let (arbiter, mut io) = handle.stop()?;
    io.history.flush()?;
    std::io::stdout().flush().context("flushing stdout")?;
    info!(
        "run: stopped in {} after {} ticks, last power {:?}",
        arbiter.mode(),
        arbiter.tick_count(),
        arbiter.last_dispatched()
    );
    Ok(())
}
