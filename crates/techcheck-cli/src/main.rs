// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// TechCheck — thesis formatting validator.
//
// Entry point. Initialises logging, loads the rule configuration, and runs a
// document through the Job Manager.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use techcheck_core::TechcheckError;
use techcheck_core::config::TechcheckConfig;
use techcheck_core::error::Result;
use techcheck_core::human_errors::humanize_error;
use techcheck_core::types::JobState;
use techcheck_jobs::JobManager;
use techcheck_rules::enabled_rules;

#[derive(Parser)]
#[command(name = "techcheck")]
#[command(version)]
#[command(about = "Check a thesis PDF against the faculty formatting rules", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a thesis and write the annotated copy
    Validate {
        /// Thesis PDF
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Rule configuration (.json, .yaml or .yml)
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Annotated PDF (defaults to <input>.checked.pdf)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Write the JSON report here
        #[arg(short, long, value_name = "FILE")]
        report: Option<PathBuf>,
    },

    /// Print the default configuration
    Rules {
        #[arg(long, value_enum, default_value = "yaml")]
        format: Format,

        /// Print the enabled rule catalog instead
        #[arg(long)]
        catalog: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Json,
    Yaml,
}

/// How a validation run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verdict {
    Passed,
    /// CRITICAL or MAJOR findings.
    Failed,
    /// The job itself failed; no findings were produced.
    Rejected,
}

impl From<Verdict> for ExitCode {
    fn from(verdict: Verdict) -> Self {
        match verdict {
            Verdict::Passed => ExitCode::SUCCESS,
            Verdict::Failed => ExitCode::from(1),
            Verdict::Rejected => ExitCode::from(2),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let outcome = match cli.command {
        Commands::Validate {
            input,
            config,
            output,
            report,
        } => validate(&input, config.as_deref(), output, report.as_deref())
            .await
            .map(ExitCode::from),
        Commands::Rules { format, catalog } => {
            print_rules(format, catalog).map(|()| ExitCode::SUCCESS)
        }
    };

    match outcome {
        Ok(code) => code,
        Err(err) => {
            let human = humanize_error(&err);
            eprintln!("error: {}\n  {}\n  ({err})", human.message, human.suggestion);
            ExitCode::from(2)
        }
    }
}

fn default_output(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "thesis".to_string());
    input.with_file_name(format!("{stem}.checked.pdf"))
}

async fn validate(
    input: &Path,
    config: Option<&Path>,
    output: Option<PathBuf>,
    report_path: Option<&Path>,
) -> Result<Verdict> {
    let config = match config {
        Some(path) => TechcheckConfig::from_path(path)?,
        None => TechcheckConfig::default(),
    };
    let bytes = std::fs::read(input)?;
    tracing::info!(input = %input.display(), bytes = bytes.len(), "validating");

    let manager = JobManager::new(&config);
    let id = manager.submit(bytes);
    let job = manager.wait(id).await?;

    if job.state == JobState::Failed {
        let failure = job
            .failure
            .ok_or_else(|| TechcheckError::Worker(format!("job {id} failed without a reason")))?;
        eprintln!("{}\n  {}", failure.reason, failure.suggestion);
        return Ok(Verdict::Rejected);
    }

    let report = manager.report(id)?;
    for finding in &report.findings {
        let page = finding
            .page
            .map(|page| format!("page {page}"))
            .unwrap_or_else(|| "document".to_string());
        println!(
            "{:<8} {:<28} {:<9} {}",
            finding.severity.label(),
            finding.rule_id,
            page,
            finding.message
        );
    }
    println!("{}", report.summary_line());

    let output = output.unwrap_or_else(|| default_output(input));
    std::fs::write(&output, manager.artifact(id)?.as_slice())?;
    println!("annotated copy: {}", output.display());

    if let Some(path) = report_path {
        std::fs::write(path, report.to_json()?)?;
        println!("report: {}", path.display());
    }

    Ok(if report.passed() {
        Verdict::Passed
    } else {
        Verdict::Failed
    })
}

fn rules_text(format: Format, catalog: bool) -> Result<String> {
    let config = TechcheckConfig::default();
    if catalog {
        let rules = enabled_rules(&config.rules);
        return Ok(match format {
            Format::Json => serde_json::to_string_pretty(&rules)?,
            Format::Yaml => serde_yaml::to_string(&rules)?,
        });
    }
    match format {
        Format::Json => config.to_json_string(),
        Format::Yaml => config.to_yaml_string(),
    }
}

fn print_rules(format: Format, catalog: bool) -> Result<()> {
    println!("{}", rules_text(format, catalog)?);
    Ok(())
}
