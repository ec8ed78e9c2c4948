//! u-allocation CLI
//!
//! Validates, remediates, and applies rules to a dataset stored as JSON
//! (`{"clients": [...], "workers": [...], "tasks": [...]}`).
//!
//! # Usage
//!
//! ```bash
//! u-allocation validate --data dataset.json --format json
//! u-allocation remediate --data dataset.json --output fixed.json
//! u-allocation apply-rules --data dataset.json --rules rules.json --output ruled.json
//! u-allocation suggest --data dataset.json
//! ```
//!
//! # Exit Codes
//!
//! - 0: Success
//! - 1: The dataset has findings (`validate` only)
//! - 3: Invalid input (dataset, rules, or configuration)
//! - 4: File not found or inaccessible

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info};

use u_allocation::{AllocationError, Dataset, EngineConfig, Result, Rule, Session};

#[derive(Debug, Parser)]
#[command(name = "u-allocation", version, about = "Certify and repair task-allocation datasets")]
struct Cli {
    /// Engine configuration (TOML).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Report every finding.
    Validate {
        #[arg(long)]
        data: PathBuf,
        #[arg(long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },
    /// Repair the dataset and print the audit log.
    Remediate {
        #[arg(long)]
        data: PathBuf,
        /// Where to write the repaired dataset; stdout when omitted.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Apply a JSON array of rules in order.
    ApplyRules {
        #[arg(long)]
        data: PathBuf,
        #[arg(long)]
        rules: PathBuf,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Print one suggested correction per finding.
    Suggest {
        #[arg(long)]
        data: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Json,
}

fn load_session(cli_config: Option<&Path>, data: &Path) -> Result<Session> {
    let config = match cli_config {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::default(),
    };
    let dataset = Dataset::from_json(&fs::read_to_string(data)?)?;
    info!(rows = dataset.len(), path = %data.display(), "dataset loaded");
    Ok(Session::create(dataset).with_config(config))
}

fn write_dataset(dataset: &Dataset, output: Option<&Path>) -> Result<()> {
    let text = dataset.to_json()?;
    match output {
        Some(path) => fs::write(path, text)?,
        None => println!("{text}"),
    }
    Ok(())
}

fn run(cli: Cli) -> Result<ExitCode> {
    let config = cli.config.as_deref();
    match cli.command {
        Command::Validate { data, format } => {
            let findings = load_session(config, &data)?.validate();
            match format {
                Format::Json => println!("{}", serde_json::to_string_pretty(&findings)?),
                Format::Text => {
                    for finding in &findings {
                        println!("{finding}");
                    }
                    println!("{} findings", findings.len());
                }
            }
            Ok(if findings.is_empty() {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(1)
            })
        }
        Command::Remediate { data, output } => {
            let mut session = load_session(config, &data)?;
            let summary = session.apply_corrections();
            if let Some(report) = &summary.report {
                for fix in &report.applied_fixes {
                    eprintln!("{fix}");
                }
            }
            eprintln!("{}", summary.summary);
            write_dataset(session.dataset(), output.as_deref())?;
            Ok(ExitCode::SUCCESS)
        }
        Command::ApplyRules { data, rules, output } => {
            let mut session = load_session(config, &data)?;
            let rules: Vec<Rule> = serde_json::from_str(&fs::read_to_string(&rules)?)
                .map_err(|e| AllocationError::invalid_rule(e.to_string()))?;
            for rule in rules {
                session.add_rule(rule);
            }
            for outcome in session.apply_rules() {
                eprintln!("{} ({} changes)", outcome.description, outcome.changes_made);
            }
            write_dataset(session.dataset(), output.as_deref())?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Suggest { data } => {
            for suggestion in load_session(config, &data)?.suggest_corrections() {
                println!("{}", suggestion.suggestion);
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            error!(error = %err, "command failed");
            eprintln!("error: {err}");
            if err.is_user_error() {
                ExitCode::from(3)
            } else {
                ExitCode::from(4)
            }
        }
    }
}
