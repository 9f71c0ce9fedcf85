//! Gate CLI - Command-line interface for Capture Gate
//!
//! Commands:
//! - replay: Replay a capture trace through the decision engine
//! - scan: Scan a view-tree snapshot
//! - config: Print or validate engine configuration
//! - doctor: Diagnose installation and configuration

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use capture_gate::config::GateConfig;
use capture_gate::replay::{replay_trace, ReplayReport};
use capture_gate::scanner::ViewHierarchyScanner;
use capture_gate::schema::{
    SnapshotTree, TraceEvent, SNAPSHOT_SCHEMA_VERSION, TRACE_SCHEMA_VERSION,
};
use capture_gate::tree::{NodeId, ViewTree};
use capture_gate::{GATE_VERSION, PRODUCER_NAME};

/// Gate - capture decision engine for session replay
#[derive(Parser)]
#[command(name = "gate")]
#[command(version = GATE_VERSION)]
#[command(about = "Decide when to capture, defer or reuse session replay frames", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace); RUST_LOG takes precedence
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a capture trace through the decision engine
    Replay {
        /// Input trace path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Output format
        #[arg(long, default_value = "json-pretty")]
        output_format: OutputFormat,

        /// Engine configuration file (GateConfig JSON)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Scan a view-tree snapshot and print the scan result
    Scan {
        /// Snapshot path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Primary container id (defaults to the first container)
        #[arg(long)]
        primary: Option<u64>,

        /// Scan only the primary container
        #[arg(long)]
        primary_only: bool,

        /// Timestamp recorded in the result
        #[arg(long, default_value = "0")]
        now: f64,

        /// Output format
        #[arg(long, default_value = "json-pretty")]
        output_format: ScanFormat,

        /// Engine configuration file (GateConfig JSON)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Print the default configuration, or validate a configuration file
    Config {
        /// Configuration file to validate
        #[arg(long)]
        validate: Option<PathBuf>,
    },

    /// Diagnose installation and configuration
    Doctor {
        /// Check a configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// Newline-delimited JSON (one event per line)
    Ndjson,
    /// JSON array of events
    Json,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Newline-delimited JSON (one decision per line)
    Ndjson,
    /// Compact JSON
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

/// A scan yields one document, so there is no line-delimited form
#[derive(Clone, ValueEnum)]
enum ScanFormat {
    /// Compact JSON
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

fn run(cli: Cli) -> Result<(), GateCliError> {
    match cli.command {
        Commands::Replay {
            input,
            output,
            input_format,
            output_format,
            config,
        } => cmd_replay(
            &input,
            &output,
            input_format,
            output_format,
            config.as_deref(),
        ),

        Commands::Scan {
            input,
            primary,
            primary_only,
            now,
            output_format,
            config,
        } => cmd_scan(
            &input,
            primary,
            primary_only,
            now,
            output_format,
            config.as_deref(),
        ),

        Commands::Config { validate } => cmd_config(validate.as_deref()),

        Commands::Doctor { config, json } => cmd_doctor(config.as_deref(), json),
    }
}

fn cmd_replay(
    input: &Path,
    output: &Path,
    input_format: InputFormat,
    output_format: OutputFormat,
    config: Option<&Path>,
) -> Result<(), GateCliError> {
    let config = load_config(config)?;
    let input_data = read_input(input)?;

    let events = match input_format {
        InputFormat::Ndjson => TraceEvent::parse_ndjson(&input_data)?,
        InputFormat::Json => TraceEvent::parse_array(&input_data)?,
    };

    if events.is_empty() {
        return Err(GateCliError::NoEvents);
    }

    let report = replay_trace(&events, &config)?;
    let output_data = format_report(&report, &output_format)?;
    write_output(output, &output_data)
}

fn cmd_scan(
    input: &Path,
    primary: Option<u64>,
    primary_only: bool,
    now: f64,
    output_format: ScanFormat,
    config: Option<&Path>,
) -> Result<(), GateCliError> {
    let config = load_config(config)?;
    let tree = SnapshotTree::from_json(&read_input(input)?)?;

    let primary = match primary {
        Some(id) => NodeId(id),
        None => tree
            .containers()
            .first()
            .copied()
            .ok_or(GateCliError::NoContainers)?,
    };

    let mut scanner = ViewHierarchyScanner::with_config(config.scanner);
    let scan = if primary_only {
        scanner.scan(&tree, primary, now)
    } else {
        scanner.scan_all_containers(&tree, primary, now)
    };
    let scan = scan.ok_or(GateCliError::NothingScanned(primary.0))?;

    let output_data = match output_format {
        ScanFormat::JsonPretty => serde_json::to_string_pretty(&scan)?,
        ScanFormat::Json => serde_json::to_string(&scan)?,
    };
    println!("{}", output_data);
    Ok(())
}

fn cmd_config(validate: Option<&Path>) -> Result<(), GateCliError> {
    match validate {
        Some(path) => {
            let config = GateConfig::from_json(&fs::read_to_string(path)?)?;
            println!("{}", config.to_json_pretty()?);
        }
        None => println!("{}", GateConfig::default().to_json_pretty()?),
    }
    Ok(())
}

fn cmd_doctor(config: Option<&Path>, json: bool) -> Result<(), GateCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "gate_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Capture Gate version {}", GATE_VERSION),
    });

    checks.push(DoctorCheck {
        name: "schema_versions".to_string(),
        status: CheckStatus::Ok,
        message: format!(
            "Snapshot schema: {}, trace schema: {}",
            SNAPSHOT_SCHEMA_VERSION, TRACE_SCHEMA_VERSION
        ),
    });

    if let Some(config_path) = config {
        if config_path.exists() {
            match fs::read_to_string(config_path) {
                Ok(content) => match GateConfig::from_json(&content) {
                    Ok(config) => checks.push(DoctorCheck {
                        name: "config".to_string(),
                        status: CheckStatus::Ok,
                        message: format!(
                            "Config valid (grace {}s, max stale {}s, max views {})",
                            config.heuristics.capture_grace_seconds,
                            config.heuristics.max_stale_seconds,
                            config.scanner.max_view_count
                        ),
                    }),
                    Err(e) => checks.push(DoctorCheck {
                        name: "config".to_string(),
                        status: CheckStatus::Error,
                        message: format!("Invalid config: {}", e),
                    }),
                },
                Err(e) => checks.push(DoctorCheck {
                    name: "config".to_string(),
                    status: CheckStatus::Error,
                    message: format!("Cannot read config file: {}", e),
                }),
            }
        } else {
            checks.push(DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Warning,
                message: "Config file does not exist, defaults will be used".to_string(),
            });
        }
    }

    // Prewarming exercises the classification tables end to end
    let mut scanner = ViewHierarchyScanner::new();
    scanner.prewarm();
    checks.push(DoctorCheck {
        name: "scanner".to_string(),
        status: if scanner.is_prewarmed() {
            CheckStatus::Ok
        } else {
            CheckStatus::Error
        },
        message: "Classification cache prewarmed".to_string(),
    });

    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a TTY (pass traces with --input FILE)".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe (--input - ready)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: GATE_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Gate Doctor Report");
        println!("==================");
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
        Err(GateCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

// Helper functions

fn load_config(path: Option<&Path>) -> Result<GateConfig, GateCliError> {
    match path {
        Some(path) => Ok(GateConfig::from_json(&fs::read_to_string(path)?)?),
        None => Ok(GateConfig::default()),
    }
}

fn read_input(input: &Path) -> Result<String, GateCliError> {
    if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn write_output(output: &Path, data: &str) -> Result<(), GateCliError> {
    if output.to_string_lossy() == "-" {
        print!("{}", data);
    } else {
        fs::write(output, data)?;
    }
    Ok(())
}

fn format_report(report: &ReplayReport, format: &OutputFormat) -> Result<String, GateCliError> {
    match format {
        OutputFormat::Ndjson => {
            let mut lines: Vec<String> = Vec::new();
            for tick in &report.ticks {
                lines.push(serde_json::to_string(tick)?);
            }
            Ok(lines.join("\n") + "\n")
        }
        OutputFormat::Json => Ok(report.to_json()? + "\n"),
        OutputFormat::JsonPretty => Ok(report.to_json_pretty()? + "\n"),
    }
}

// Error types

#[derive(Debug)]
enum GateCliError {
    Io(io::Error),
    Gate(capture_gate::GateError),
    Json(serde_json::Error),
    NoEvents,
    NoContainers,
    NothingScanned(u64),
    DoctorFailed,
}

impl From<io::Error> for GateCliError {
    fn from(e: io::Error) -> Self {
        GateCliError::Io(e)
    }
}

impl From<capture_gate::GateError> for GateCliError {
    fn from(e: capture_gate::GateError) -> Self {
        GateCliError::Gate(e)
    }
}

impl From<serde_json::Error> for GateCliError {
    fn from(e: serde_json::Error) -> Self {
        GateCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<GateCliError> for CliError {
    fn from(e: GateCliError) -> Self {
        match e {
            GateCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            GateCliError::Gate(e) => CliError {
                code: "INPUT_ERROR".to_string(),
                message: e.to_string(),
                hint: Some(format!(
                    "Ensure input matches {} or {}",
                    TRACE_SCHEMA_VERSION, SNAPSHOT_SCHEMA_VERSION
                )),
            },
            GateCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            GateCliError::NoEvents => CliError {
                code: "NO_EVENTS".to_string(),
                message: "No events found in trace".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
            GateCliError::NoContainers => CliError {
                code: "NO_CONTAINERS".to_string(),
                message: "Snapshot has no containers".to_string(),
                hint: Some("Add at least one container node".to_string()),
            },
            GateCliError::NothingScanned(id) => CliError {
                code: "NOTHING_SCANNED".to_string(),
                message: format!("Container {} is missing or not visible", id),
                hint: Some("Pass --primary with a visible container id".to_string()),
            },
            GateCliError::DoctorFailed => CliError {
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
