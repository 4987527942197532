//! Sentinel CLI - Command-line interface for Affect Sentinel
//!
//! Commands:
//! - assess: Process utterance records into risk assessments (batch mode)
//! - doctor: Diagnose configuration and baseline snapshot health

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use affect_sentinel::{
    EngineConfig, EngineError, LexiconSet, SentinelProcessor, UtteranceRecord, ENGINE_VERSION,
    PRODUCER_NAME,
};

/// Sentinel - Multi-signal risk and dissonance assessment engine
#[derive(Parser)]
#[command(name = "sentinel")]
#[command(version = ENGINE_VERSION)]
#[command(about = "Assess risk from voice session records", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process utterance records into risk assessments (batch mode)
    Assess {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long)]
        output: PathBuf,

        /// Output format
        #[arg(long, default_value = "ndjson")]
        output_format: OutputFormat,

        /// Engine configuration file (JSON); defaults apply when omitted
        #[arg(long)]
        config: Option<PathBuf>,

        /// Load baseline snapshot from file
        #[arg(long)]
        load_baselines: Option<PathBuf>,

        /// Save baseline snapshot to file after processing
        #[arg(long)]
        save_baselines: Option<PathBuf>,

        /// Fold each record's features into the user's baselines after
        /// assessment
        #[arg(long)]
        fold: bool,
    },

    /// Diagnose configuration and baseline snapshot health
    Doctor {
        /// Engine configuration file to check
        #[arg(long)]
        config: Option<PathBuf>,

        /// Baseline snapshot file to check
        #[arg(long)]
        baselines: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Newline-delimited JSON (one assessment per line)
    Ndjson,
    /// Pretty-printed JSON array
    JsonPretty,
}

#[derive(Debug, serde::Serialize)]
struct CliError {
    error: String,
}

impl From<EngineError> for CliError {
    fn from(e: EngineError) -> Self {
        Self {
            error: e.to_string(),
        }
    }
}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self {
            error: e.to_string(),
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&e).unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Assess {
            input,
            output,
            output_format,
            config,
            load_baselines,
            save_baselines,
            fold,
        } => cmd_assess(
            &input,
            &output,
            output_format,
            config.as_deref(),
            load_baselines.as_deref(),
            save_baselines.as_deref(),
            fold,
        ),
        Commands::Doctor {
            config,
            baselines,
            json,
        } => cmd_doctor(config.as_deref(), baselines.as_deref(), json),
    }
}

fn cmd_assess(
    input: &Path,
    output: &Path,
    output_format: OutputFormat,
    config: Option<&Path>,
    load_baselines: Option<&Path>,
    save_baselines: Option<&Path>,
    fold: bool,
) -> Result<(), CliError> {
    let engine_config = match config {
        Some(path) => {
            let raw = fs::read_to_string(path)?;
            serde_json::from_str(&raw).map_err(|e| CliError {
                error: format!("invalid config {}: {}", path.display(), e),
            })?
        }
        None => EngineConfig::default(),
    };

    let processor = SentinelProcessor::with_config(engine_config, LexiconSet::english());

    if let Some(path) = load_baselines {
        let snapshot = fs::read_to_string(path)?;
        processor.load_baselines(&snapshot).map_err(CliError::from)?;
    }

    let lines = read_lines(input)?;
    let mut assessments = Vec::new();

    for (index, line) in lines.iter().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let record: UtteranceRecord = serde_json::from_str(line).map_err(|e| CliError {
            error: format!("line {}: {}", index + 1, e),
        })?;

        let assessment = processor.assess_utterance(&record).map_err(|e| CliError {
            error: format!("line {}: {}", index + 1, e),
        })?;

        if fold {
            processor
                .fold_session_features(
                    &record.user_id,
                    &record.session_id,
                    &record.voice_features,
                    assessment.assessed_at,
                    index as u32,
                )
                .map_err(CliError::from)?;
        }

        assessments.push(assessment);
    }

    let rendered = match output_format {
        OutputFormat::Ndjson => {
            let mut buf = String::new();
            for a in &assessments {
                buf.push_str(&serde_json::to_string(a).map_err(|e| CliError {
                    error: e.to_string(),
                })?);
                buf.push('\n');
            }
            buf
        }
        OutputFormat::JsonPretty => serde_json::to_string_pretty(&assessments)
            .map_err(|e| CliError {
                error: e.to_string(),
            })?,
    };

    write_output(output, &rendered)?;

    if let Some(path) = save_baselines {
        let snapshot = processor.save_baselines().map_err(CliError::from)?;
        fs::write(path, snapshot)?;
    }

    Ok(())
}

#[derive(Debug, serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    config_ok: bool,
    config_detail: String,
    baselines_ok: bool,
    baselines_detail: String,
}

fn cmd_doctor(
    config: Option<&Path>,
    baselines: Option<&Path>,
    json: bool,
) -> Result<(), CliError> {
    let (config_ok, config_detail) = match config {
        Some(path) => match fs::read_to_string(path) {
            Ok(raw) => match serde_json::from_str::<EngineConfig>(&raw) {
                Ok(_) => (true, format!("{} parsed", path.display())),
                Err(e) => (false, format!("{}: {}", path.display(), e)),
            },
            Err(e) => (false, format!("{}: {}", path.display(), e)),
        },
        None => (true, "using built-in defaults".to_string()),
    };

    let (baselines_ok, baselines_detail) = match baselines {
        Some(path) => match fs::read_to_string(path) {
            Ok(raw) => {
                let processor = SentinelProcessor::new();
                match processor.load_baselines(&raw) {
                    Ok(()) => (true, format!("{} parsed", path.display())),
                    Err(e) => (false, format!("{}: {}", path.display(), e)),
                }
            }
            Err(e) => (false, format!("{}: {}", path.display(), e)),
        },
        None => (true, "no snapshot supplied".to_string()),
    };

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: ENGINE_VERSION.to_string(),
        config_ok,
        config_detail,
        baselines_ok,
        baselines_detail,
    };

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).map_err(|e| CliError {
                error: e.to_string()
            })?
        );
    } else {
        println!("{} {}", report.producer, report.version);
        println!(
            "config:    {} ({})",
            if report.config_ok { "ok" } else { "FAIL" },
            report.config_detail
        );
        println!(
            "baselines: {} ({})",
            if report.baselines_ok { "ok" } else { "FAIL" },
            report.baselines_detail
        );
    }

    if report.config_ok && report.baselines_ok {
        Ok(())
    } else {
        Err(CliError {
            error: "doctor found problems".to_string(),
        })
    }
}

fn read_lines(input: &Path) -> Result<Vec<String>, CliError> {
    if input == Path::new("-") {
        let stdin = io::stdin();
        let mut lines = Vec::new();
        for line in stdin.lock().lines() {
            lines.push(line?);
        }
        Ok(lines)
    } else {
        let raw = fs::read_to_string(input)?;
        Ok(raw.lines().map(|l| l.to_string()).collect())
    }
}

fn write_output(output: &Path, rendered: &str) -> Result<(), CliError> {
    if output == Path::new("-") {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle.write_all(rendered.as_bytes())?;
        if atty::is(atty::Stream::Stdout) && !rendered.ends_with('\n') {
            handle.write_all(b"\n")?;
        }
        Ok(())
    } else {
        fs::write(output, rendered)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doctor_report_identifies_producer() {
        let report = DoctorReport {
            producer: PRODUCER_NAME.to_string(),
            version: ENGINE_VERSION.to_string(),
            config_ok: true,
            config_detail: "using built-in defaults".to_string(),
            baselines_ok: true,
            baselines_detail: "no snapshot supplied".to_string(),
        };

        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"producer\":\"affect-sentinel\""));
        assert!(json.contains(ENGINE_VERSION));
    }
}
