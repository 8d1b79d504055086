//! Pulse CLI - Command-line interface for Synheart Pulse
//!
//! Commands:
//! - detect: Detect sessions in a sample file (batch mode)
//! - run: Detect sessions from stdin as samples arrive (streaming mode)
//! - zones: Print the heart-rate zone bands for a max heart rate
//! - doctor: Check configuration and environment

use chrono::{DateTime, Utc};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, BufRead, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::EnvFilter;

use synheart_pulse::config::{EngineConfig, ZoneAllocation};
use synheart_pulse::encoder::SessionEncoder;
use synheart_pulse::source::{MemorySampleSource, SampleParser, SampleQuery};
use synheart_pulse::types::{Sample, SessionResponse};
use synheart_pulse::zones::ZoneModel;
use synheart_pulse::{ComputeError, SessionEngine, PRODUCER_NAME, PULSE_VERSION};

/// Pulse - Exercise session detection from heart-rate telemetry
#[derive(Parser)]
#[command(name = "pulse")]
#[command(author = "Synheart AI Inc")]
#[command(version = PULSE_VERSION)]
#[command(about = "Detect exercise sessions in heart-rate samples", long_about = None)]
struct Cli {
    /// Log at debug level (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect sessions in a sample file (batch mode)
    Detect {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Output format
        #[arg(long, default_value = "json")]
        output_format: OutputFormat,

        /// Inclusive range start (RFC 3339); defaults to the earliest sample
        #[arg(long)]
        start: Option<DateTime<Utc>>,

        /// Inclusive range end (RFC 3339); defaults to the latest sample
        #[arg(long)]
        end: Option<DateTime<Utc>>,

        /// Only keep samples with exactly this activity tag
        #[arg(long)]
        sport: Option<String>,

        /// Maximum number of samples to consider
        #[arg(long)]
        limit: Option<usize>,

        #[command(flatten)]
        tuning: Tuning,
    },

    /// Detect sessions from stdin as samples arrive (streaming mode)
    Run {
        /// Flush output after each session (`--flush false` to buffer)
        #[arg(long, default_value_t = true, action = ArgAction::Set)]
        flush: bool,

        #[command(flatten)]
        tuning: Tuning,
    },

    /// Print heart-rate zone bands
    Zones {
        /// Max heart rate the zones derive from (defaults to configuration)
        #[arg(long)]
        max_hr: Option<f64>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check configuration and environment
    Doctor {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Overrides applied on top of the `PULSE_*` environment configuration
#[derive(Args)]
struct Tuning {
    /// Minimum session length (minutes)
    #[arg(long)]
    min_session: Option<f64>,

    /// Largest gap tolerated inside a session (minutes)
    #[arg(long)]
    max_gap: Option<f64>,

    /// Max heart rate used for zones (bpm)
    #[arg(long)]
    max_hr: Option<f64>,

    /// Zone-minute allocation strategy
    #[arg(long)]
    allocation: Option<Allocation>,
}

impl Tuning {
    fn engine(&self) -> Result<SessionEngine, PulseCliError> {
        let mut config = EngineConfig::from_env();
        if let Some(minutes) = self.min_session {
            config.detection.min_session_minutes = minutes;
        }
        if let Some(minutes) = self.max_gap {
            config.detection.max_gap_minutes = minutes;
        }
        if let Some(max_hr) = self.max_hr {
            config = config.with_zone_max_heart_rate(max_hr);
        }
        if let Some(allocation) = self.allocation {
            config = config.with_zone_allocation(allocation.into());
        }
        Ok(SessionEngine::new(config)?)
    }
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// Newline-delimited JSON (one sample per line)
    Ndjson,
    /// JSON array of samples
    Json,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Newline-delimited JSON (one session per line)
    Ndjson,
    /// JSON array of sessions
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

#[derive(Clone, Copy, ValueEnum)]
enum Allocation {
    /// Split session time evenly across samples
    Uniform,
    /// Credit each sample with the time until the next one
    Interval,
}

impl From<Allocation> for ZoneAllocation {
    fn from(allocation: Allocation) -> Self {
        match allocation {
            Allocation::Uniform => ZoneAllocation::Uniform,
            Allocation::Interval => ZoneAllocation::SampleInterval,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e)).unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<(), PulseCliError> {
    match cli.command {
        Commands::Detect {
            input,
            output,
            input_format,
            output_format,
            start,
            end,
            sport,
            limit,
            tuning,
        } => {
            let engine = tuning.engine()?;
            let query = QueryArgs {
                start,
                end,
                sport,
                limit,
            };
            cmd_detect(&engine, &input, &output, input_format, output_format, query)
        }

        Commands::Run { flush, tuning } => cmd_run(&tuning.engine()?, flush),

        Commands::Zones { max_hr, json } => cmd_zones(max_hr, json),

        Commands::Doctor { json } => cmd_doctor(json),
    }
}

struct QueryArgs {
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    sport: Option<String>,
    limit: Option<usize>,
}

fn cmd_detect(
    engine: &SessionEngine,
    input: &Path,
    output: &Path,
    input_format: InputFormat,
    output_format: OutputFormat,
    args: QueryArgs,
) -> Result<(), PulseCliError> {
    let input_data = read_input(input)?;

    let samples = match input_format {
        InputFormat::Ndjson => SampleParser::parse_ndjson(&input_data)?,
        InputFormat::Json => SampleParser::parse_array(&input_data)?,
    };

    let (Some(first), Some(last)) = (
        samples.iter().map(|s| s.timestamp).min(),
        samples.iter().map(|s| s.timestamp).max(),
    ) else {
        return Err(PulseCliError::NoSamples);
    };

    let mut query = SampleQuery::new(args.start.unwrap_or(first), args.end.unwrap_or(last));
    if let Some(sport) = args.sport {
        query = query.with_activity(sport);
    }
    if let Some(limit) = args.limit {
        query = query.with_limit(limit);
    }

    let total = samples.len();
    let source = MemorySampleSource::new(samples);
    let records = engine.process_source(&source, query)?;
    info!(samples = total, sessions = records.len(), "Detection finished");

    let responses = SessionEncoder::new().encode_all(&records);
    let output_data = format_output(&responses, &output_format)?;

    if output.to_string_lossy() == "-" {
        print!("{output_data}");
    } else {
        fs::write(output, output_data)?;
    }

    Ok(())
}

fn cmd_run(engine: &SessionEngine, flush: bool) -> Result<(), PulseCliError> {
    let mut streaming = engine.streaming();
    let encoder = SessionEncoder::new();
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for (line_num, line) in stdin.lock().lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let sample: Sample = SampleParser::parse_line(&line, line_num + 1)?;
        if let Some(record) = streaming.push(sample) {
            writeln!(stdout, "{}", encoder.encode_to_json(&record)?)?;
            if flush {
                stdout.flush()?;
            }
        }
    }

    if let Some(record) = streaming.finish() {
        writeln!(stdout, "{}", encoder.encode_to_json(&record)?)?;
    }
    stdout.flush()?;

    info!(dropped = streaming.dropped(), "Stream closed");
    Ok(())
}

fn cmd_zones(max_hr: Option<f64>, json: bool) -> Result<(), PulseCliError> {
    let mut config = EngineConfig::from_env();
    if let Some(max_hr) = max_hr {
        config = config.with_zone_max_heart_rate(max_hr);
    }
    config.validate().map_err(ComputeError::from)?;

    let model = ZoneModel::with_fractions(config.zone_max_heart_rate, &config.zone_fractions);

    if json {
        println!("{}", serde_json::to_string_pretty(&model)?);
    } else {
        println!("Heart-rate zones (max {} bpm)", model.max_heart_rate);
        println!("==============================");
        for band in &model.bands {
            println!(
                "  {}: {:>5.0} - {:>5.0} bpm  ({} kcal/min)",
                band.zone.label(),
                band.lower_bound,
                band.upper_bound,
                config.calorie_table.per_minute(band.zone)
            );
        }
    }

    Ok(())
}

fn cmd_doctor(json: bool) -> Result<(), PulseCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "pulse_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Pulse version {PULSE_VERSION}"),
    });

    let config = EngineConfig::from_env();
    checks.push(match config.validate() {
        Ok(()) => DoctorCheck {
            name: "configuration".to_string(),
            status: CheckStatus::Ok,
            message: format!(
                "min session {} min, max gap {} min, plausible {}-{} bpm, zone max {} bpm, {:?} allocation",
                config.detection.min_session_minutes,
                config.detection.max_gap_minutes,
                config.detection.min_heart_rate,
                config.detection.max_heart_rate,
                config.zone_max_heart_rate,
                config.zone_allocation
            ),
        },
        Err(e) => DoctorCheck {
            name: "configuration".to_string(),
            status: CheckStatus::Error,
            message: e.to_string(),
        },
    });

    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Warning,
            message: "stdin is a TTY; `pulse run` expects piped NDJSON".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe (streaming mode ready)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: PULSE_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Pulse Doctor Report");
        println!("===================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report
        .checks
        .iter()
        .any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(PulseCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

// Helper functions

fn read_input(input: &Path) -> Result<String, PulseCliError> {
    if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn format_output(sessions: &[SessionResponse], format: &OutputFormat) -> Result<String, PulseCliError> {
    match format {
        OutputFormat::Ndjson => {
            let mut lines: Vec<String> = Vec::new();
            for session in sessions {
                lines.push(serde_json::to_string(session)?);
            }
            Ok(lines.join("\n") + "\n")
        }
        OutputFormat::Json => Ok(serde_json::to_string(sessions)? + "\n"),
        OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(sessions)? + "\n"),
    }
}

// Error types

#[derive(Debug)]
enum PulseCliError {
    Io(io::Error),
    Compute(ComputeError),
    Json(serde_json::Error),
    NoSamples,
    DoctorFailed,
}

impl From<io::Error> for PulseCliError {
    fn from(e: io::Error) -> Self {
        PulseCliError::Io(e)
    }
}

impl From<ComputeError> for PulseCliError {
    fn from(e: ComputeError) -> Self {
        PulseCliError::Compute(e)
    }
}

impl From<serde_json::Error> for PulseCliError {
    fn from(e: serde_json::Error) -> Self {
        PulseCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<PulseCliError> for CliError {
    fn from(e: PulseCliError) -> Self {
        match e {
            PulseCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            PulseCliError::Compute(e) => {
                let (code, hint) = match &e {
                    ComputeError::InvalidConfig(_) => {
                        ("CONFIG_ERROR", "Run 'pulse doctor' to inspect the configuration")
                    }
                    ComputeError::InvalidQuery(_) => ("QUERY_ERROR", "Check --start and --end"),
                    ComputeError::SourceUnavailable(_) => {
                        ("SOURCE_ERROR", "The sample source could not be read; retry later")
                    }
                    ComputeError::ParseError(_) | ComputeError::JsonError(_) => (
                        "PARSE_ERROR",
                        "Each sample needs an RFC 3339 timestamp and a heart_rate",
                    ),
                };
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            PulseCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            PulseCliError::NoSamples => CliError {
                code: "NO_SAMPLES".to_string(),
                message: "No samples found in input".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
            PulseCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
