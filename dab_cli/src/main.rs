use clap::{Args, Parser, Subcommand};
use dab_core::*;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, TryRecvError};
use std::thread;
use std::time::{Duration, Instant};

#[derive(Parser)]
#[command(name = "dabtimer")]
#[command(about = "Two-phase heat/cool dab timer with a session log", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Read configuration from this file instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override session log location
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a heat/cool countdown and log it when done (default)
    Start {
        #[command(flatten)]
        settings: SettingsArgs,

        #[command(flatten)]
        run: RunArgs,
    },

    /// Show heat and cool durations without starting the timer
    Calc {
        #[command(flatten)]
        settings: SettingsArgs,
    },

    /// List logged sessions
    Log {
        /// Print records as JSON
        #[arg(long)]
        json: bool,
    },

    /// Rate a logged session (1-5)
    Rate {
        /// Position in the log, as shown by `log`
        index: usize,

        #[arg(required_unless_present = "clear")]
        rating: Option<Rating>,

        /// Remove the rating instead
        #[arg(long, conflicts_with = "rating")]
        clear: bool,
    },

    /// Delete a logged session
    Delete {
        /// Position in the log, as shown by `log`
        index: usize,
    },

    /// Load a logged session's settings and run them again
    Replay {
        /// Position in the log, as shown by `log`
        index: usize,

        #[command(flatten)]
        run: RunArgs,
    },

    /// List configured materials, styles and waxes
    Categories,
}

/// Form values; anything omitted falls back to the config defaults
#[derive(Args, Clone, Default)]
struct SettingsArgs {
    /// Nail material (e.g. Quartz, Titanium, Ceramic)
    #[arg(long)]
    material: Option<String>,

    /// Banger style (e.g. "Flat Top", Slanted, Thermal, "Terp Slurper")
    #[arg(long)]
    style: Option<String>,

    /// Consumable (e.g. Shatter, Budder, "Live Resin")
    #[arg(long)]
    wax: Option<String>,

    /// Flame intensity multiplier, 0.5-2.0
    #[arg(long)]
    intensity: Option<f64>,
}

impl SettingsArgs {
    fn resolve(self, config: &Config) -> SessionSettings {
        let defaults = config.defaults.to_settings();
        SessionSettings::new(
            self.material.unwrap_or(defaults.material),
            self.style.unwrap_or(defaults.style),
            self.wax.unwrap_or(defaults.wax),
            self.intensity.unwrap_or(defaults.intensity),
        )
    }
}

#[derive(Args, Clone, Default)]
struct RunArgs {
    /// Milliseconds per countdown tick (default from config, normally 1000)
    #[arg(long)]
    tick_ms: Option<u64>,

    /// Do not ring the terminal bell
    #[arg(long)]
    quiet: bool,
}

fn main() -> Result<()> {
    // Initialize logging
    dab_core::logging::init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let log_path = cli
        .log_file
        .clone()
        .unwrap_or_else(|| config.data.log_path.clone());
    let mut log = CsvSessionLog::new(log_path);

    match cli.command {
        Some(Commands::Start { settings, run }) => {
            let settings = settings.resolve(&config);
            run_session(&config, &mut log, settings, &run)
        }
        Some(Commands::Calc { settings }) => cmd_calc(&config, settings.resolve(&config)),
        Some(Commands::Log { json }) => cmd_log(&log, json),
        Some(Commands::Rate {
            index,
            rating,
            clear,
        }) => cmd_rate(&log, index, if clear { None } else { rating }),
        Some(Commands::Delete { index }) => cmd_delete(&log, index),
        Some(Commands::Replay { index, run }) => cmd_replay(&config, &mut log, index, &run),
        Some(Commands::Categories) => cmd_categories(&config),
        None => {
            // Default to "start" with the configured form values
            let settings = SettingsArgs::default().resolve(&config);
            run_session(&config, &mut log, settings, &RunArgs::default())
        }
    }
}

// ============================================================================
// Countdown
// ============================================================================

/// Run one session to completion or until the user stops it
fn run_session<S: SessionSink>(
    config: &Config,
    sink: &mut S,
    settings: SessionSettings,
    run: &RunArgs,
) -> Result<()> {
    settings.validate()?;

    let mut timer = PhaseTimer::new();
    timer.start(&config.tables, settings)?;

    let interval = Duration::from_millis(run.tick_ms.unwrap_or(config.timer.tick_millis));
    let bell = config.timer.bell && !run.quiet;

    println!("{}", timer.display());
    println!("(type 's' + Enter to stop)");

    let mut clock = Clock::new(interval, spawn_stop_listener());

    loop {
        if let ClockEvent::Stop = clock.wait() {
            timer.stop();
            println!("{}", timer.display());
            return Ok(());
        }

        let phase_before = timer.phase();
        match timer.tick() {
            Some(TickResult::Finished(record)) => {
                ring(bell)?;
                println!("{}", timer.display());
                sink.append(&record)?;
                println!(
                    "✓ Session logged ({}s heat, {}s cool)",
                    record.heat_seconds, record.cool_seconds
                );
                return Ok(());
            }
            Some(result) => {
                if timer.phase() != phase_before {
                    ring(bell)?;
                }
                println!("{}", result.display());
            }
            None => return Ok(()),
        }
    }
}

enum ClockEvent {
    Tick,
    Stop,
}

/// One-second scheduler feeding the timer
///
/// Waits on the stop channel until the next tick is due, so a stop request
/// interrupts the wait. Once stdin closes it falls back to plain sleeping.
struct Clock {
    interval: Duration,
    next_tick: Instant,
    stop_requests: Option<Receiver<()>>,
}

impl Clock {
    fn new(interval: Duration, stop_requests: Receiver<()>) -> Self {
        Self {
            interval,
            next_tick: Instant::now() + interval,
            stop_requests: Some(stop_requests),
        }
    }

    fn wait(&mut self) -> ClockEvent {
        loop {
            if self.poll_stop(None) {
                return ClockEvent::Stop;
            }

            let now = Instant::now();
            if now >= self.next_tick {
                self.next_tick += self.interval;
                return ClockEvent::Tick;
            }
            let remaining = self.next_tick - now;

            if self.stop_requests.is_some() {
                if self.poll_stop(Some(remaining)) {
                    return ClockEvent::Stop;
                }
            } else {
                thread::sleep(remaining);
            }
        }
    }

    /// Check for a stop request, blocking up to `timeout` if given
    fn poll_stop(&mut self, timeout: Option<Duration>) -> bool {
        let Some(rx) = &self.stop_requests else {
            return false;
        };

        // Err(true) means the listener is gone
        let received = match timeout {
            None => rx
                .try_recv()
                .map_err(|e| matches!(e, TryRecvError::Disconnected)),
            Some(timeout) => rx
                .recv_timeout(timeout)
                .map_err(|e| matches!(e, RecvTimeoutError::Disconnected)),
        };

        match received {
            Ok(()) => true,
            Err(disconnected) => {
                if disconnected {
                    self.stop_requests = None;
                }
                false
            }
        }
    }
}

/// Forward "s"/"stop" lines from stdin as stop requests
fn spawn_stop_listener() -> Receiver<()> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if matches!(line.trim().to_lowercase().as_str(), "s" | "stop") && tx.send(()).is_err() {
                break;
            }
        }
    });
    rx
}

fn ring(bell: bool) -> Result<()> {
    if bell {
        print!("\x07");
        io::stdout().flush()?;
    }
    Ok(())
}

// ============================================================================
// Other commands
// ============================================================================

fn cmd_calc(config: &Config, settings: SessionSettings) -> Result<()> {
    settings.validate()?;
    let (heat, cool) = compute_durations(&config.tables, &settings)?;

    println!(
        "{} / {} / {} at {:.1}x",
        settings.material, settings.style, settings.wax, settings.intensity
    );
    println!("  Heat: {}s", heat);
    println!("  Cool: {}s", cool);
    Ok(())
}

fn cmd_log(log: &CsvSessionLog, json: bool) -> Result<()> {
    let records = log.load_all()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("No sessions logged yet.");
        return Ok(());
    }

    for (index, record) in records.iter().enumerate() {
        println!("{}", format_log_row(index, record));
    }
    Ok(())
}

fn format_log_row(index: usize, record: &SessionRecord) -> String {
    use chrono::Datelike;

    let ts = record.timestamp;
    let rating = record
        .rating
        .map(|r| r.to_string())
        .unwrap_or_else(|| "-".into());
    format!(
        "[{}] {}/{}/{}  {}  rating: {}",
        index,
        ts.month(),
        ts.day(),
        ts.year(),
        record.summary(),
        rating
    )
}

fn cmd_rate(log: &CsvSessionLog, index: usize, rating: Option<Rating>) -> Result<()> {
    match rating {
        Some(rating) => {
            log.update_rating(index, rating)?;
            println!("✓ Rated session {} as {}", index, rating);
        }
        None => {
            log.clear_rating(index)?;
            println!("✓ Cleared rating of session {}", index);
        }
    }
    Ok(())
}

fn cmd_delete(log: &CsvSessionLog, index: usize) -> Result<()> {
    let removed = log.delete(index)?;
    println!("✓ Deleted session {}: {}", index, removed.summary());
    Ok(())
}

fn cmd_replay(config: &Config, log: &mut CsvSessionLog, index: usize, run: &RunArgs) -> Result<()> {
    let record = log.get(index)?;
    let settings = SessionSettings::from(&record);
    println!(
        "Loaded session {}: {} / {} / {} at {:.1}x",
        index, settings.material, settings.style, settings.wax, settings.intensity
    );
    run_session(config, log, settings, run)
}

fn cmd_categories(config: &Config) -> Result<()> {
    let tables = &config.tables;

    println!("Materials:");
    for (name, secs) in &tables.material_times {
        println!("  {:<14} {}s", name, secs);
    }
    println!("Styles:");
    for (name, modifier) in &tables.style_modifiers {
        println!("  {:<14} x{}", name, modifier);
    }
    println!("Waxes:");
    for (name, secs) in &tables.wax_cool_times {
        println!("  {:<14} {}s", name, secs);
    }
    Ok(())
}
