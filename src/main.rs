//! yaml-assist CLI - schema checks for YAML files from the command line

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use rayon::prelude::*;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::Level;
use tracing_subscriber::EnvFilter;
use yaml_assist::error::format_diagnostic;
use yaml_assist::{cli, Diagnostic, LanguageService, Position, ServiceConfig};

#[derive(Parser)]
#[command(name = "yaml-assist")]
#[command(about = "Validate, complete and document YAML files against a JSON Schema", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate YAML files against a schema
    Validate {
        /// YAML files to validate (can specify multiple)
        #[arg(value_name = "FILE", num_args = 0..)]
        files: Vec<PathBuf>,

        /// Schema file (JSON or YAML)
        #[arg(short, long, value_name = "SCHEMA")]
        schema: PathBuf,

        /// Validate files matching glob pattern (e.g., "deploy/**/*.yaml")
        #[arg(short, long, value_name = "PATTERN")]
        pattern: Option<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Exit with status 0 even if validation fails
        #[arg(long)]
        no_fail: bool,
    },

    /// List completion suggestions at a position
    Complete {
        /// YAML file
        file: PathBuf,

        #[arg(short, long, value_name = "SCHEMA")]
        schema: PathBuf,

        /// Line (1-based)
        #[arg(short, long)]
        line: usize,

        /// Column (1-based)
        #[arg(short, long, default_value_t = 1)]
        column: usize,

        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Show hover documentation at a position
    Hover {
        /// YAML file
        file: PathBuf,

        #[arg(short, long, value_name = "SCHEMA")]
        schema: PathBuf,

        /// Line (1-based)
        #[arg(short, long)]
        line: usize,

        /// Column (1-based)
        #[arg(short, long, default_value_t = 1)]
        column: usize,

        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Print the flattened schema index as JSON
    Index {
        #[arg(short, long, value_name = "SCHEMA")]
        schema: PathBuf,
    },
}

#[derive(Serialize)]
struct FileReport {
    file: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    diagnostics: Vec<Diagnostic>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging; stdout is reserved for results
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::WARN
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str())),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Validate {
            files,
            schema,
            pattern,
            format,
            no_fail,
        } => {
            let files = collect_files(files, pattern.as_deref(), &schema)?;
            let service = load_service(&schema)?;
            let failed = run_validate(&service, &files, format)?;
            if failed && !no_fail {
                std::process::exit(1);
            }
        }

        Commands::Complete {
            file,
            schema,
            line,
            column,
            format,
        } => {
            let service = load_service(&schema)?;
            let text = read_document(&file)?;
            let suggestions = service.complete(&text, Position::new(line, column));

            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&suggestions)?),
                OutputFormat::Text => {
                    if suggestions.is_empty() {
                        cli::info("No suggestions");
                    }
                    for suggestion in &suggestions {
                        println!(
                            "{} {} {}",
                            suggestion.sort_bucket.to_string().dimmed(),
                            suggestion.label.cyan().bold(),
                            suggestion.documentation.as_deref().unwrap_or("").dimmed()
                        );
                    }
                }
            }
        }

        Commands::Hover {
            file,
            schema,
            line,
            column,
            format,
        } => {
            let service = load_service(&schema)?;
            let text = read_document(&file)?;
            let hover = service.hover(&text, Position::new(line, column));

            match (format, hover) {
                (OutputFormat::Json, hover) => {
                    println!("{}", serde_json::to_string_pretty(&hover)?)
                }
                (OutputFormat::Text, Some(hover)) => println!("{}", hover.markdown()),
                (OutputFormat::Text, None) => cli::info("No documentation at this position"),
            }
        }

        Commands::Index { schema } => {
            let service = load_service(&schema)?;
            println!("{}", serde_json::to_string_pretty(service.index())?);
        }
    }

    Ok(())
}

fn load_service(schema: &Path) -> Result<LanguageService> {
    LanguageService::load(schema, ServiceConfig::from_env())
}

fn read_document(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read file: {}", path.display()))
}

/// Explicit files plus YAML files matching `pattern`; the schema itself is
/// never picked up by the pattern
fn collect_files(
    mut files: Vec<PathBuf>,
    pattern: Option<&str>,
    schema: &Path,
) -> Result<Vec<PathBuf>> {
    if let Some(pattern) = pattern {
        let glob_paths =
            glob::glob(pattern).with_context(|| format!("Invalid glob pattern: {}", pattern))?;
        for path in glob_paths {
            let path = path?;
            if cli::is_yaml_file(&path) && !same_file(&path, schema) {
                files.push(path);
            }
        }
    }

    if files.is_empty() {
        anyhow::bail!("No files specified. Provide files directly or use --pattern");
    }

    files.sort();
    files.dedup();
    Ok(files)
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

/// Validate every file in parallel; returns true when anything failed
fn run_validate(
    service: &LanguageService,
    files: &[PathBuf],
    format: OutputFormat,
) -> Result<bool> {
    let start_time = Instant::now();

    let results: Vec<(FileReport, Option<String>)> = files
        .par_iter()
        .map(|file| match read_document(file) {
            Ok(text) => {
                let report = FileReport {
                    file: file.clone(),
                    error: None,
                    diagnostics: service.validate(&text),
                };
                (report, Some(text))
            }
            Err(err) => {
                let report = FileReport {
                    file: file.clone(),
                    error: Some(format!("{err:#}")),
                    diagnostics: Vec::new(),
                };
                (report, None)
            }
        })
        .collect();

    let failed_count = results
        .iter()
        .filter(|(report, _)| report.error.is_some() || cli::error_count(&report.diagnostics) > 0)
        .count();

    match format {
        OutputFormat::Json => {
            let reports: Vec<&FileReport> = results.iter().map(|(report, _)| report).collect();
            println!("{}", serde_json::to_string_pretty(&reports)?);
        }
        OutputFormat::Text => {
            for (report, text) in &results {
                print_report(report, text.as_deref());
            }

            println!();
            let summary = format!(
                "{} file(s) checked in {}",
                files.len(),
                cli::format_duration(start_time.elapsed())
            );
            if failed_count == 0 {
                cli::success(&summary);
            } else {
                cli::error(&format!("{} of {}", failed_count, summary));
            }
        }
    }

    Ok(failed_count > 0)
}

fn print_report(report: &FileReport, text: Option<&str>) {
    let display_path = report.file.display().to_string();

    if let Some(error) = &report.error {
        cli::error(&format!("{}: {}", display_path, error));
        return;
    }

    let errors = cli::error_count(&report.diagnostics);
    if report.diagnostics.is_empty() {
        cli::success(&display_path);
    } else if errors == 0 {
        cli::warning(&format!("{} - {} warning(s)", display_path, report.diagnostics.len()));
    } else {
        cli::error(&format!("{} - {} error(s)", display_path, errors));
    }

    let input = text.unwrap_or("");
    for diagnostic in &report.diagnostics {
        eprintln!("{}", format_diagnostic(diagnostic, input, &display_path));
    }
}
