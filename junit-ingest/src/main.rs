use std::{fs, path::PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use junit_ingest::{Suite, Totals};
use tracing_subscriber::{prelude::*, EnvFilter};

#[derive(Debug, Parser)]
#[command(version, about = "Utilities for inspecting JUnit XML reports.")]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "lower")]
enum OutputFormat {
    Json,
    Debug,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Print the aggregated suite tree of each report
    Ingest {
        /// Glob patterns of JUnit XML files to ingest
        #[arg(required = true)]
        junit_paths: Vec<String>,
        /// How to render the suites
        #[arg(long, value_enum, env = "JUNIT_UTIL_FORMAT", default_value = "json")]
        format: OutputFormat,
    },
    /// Print the summed totals of each report
    Totals {
        /// Glob patterns of JUnit XML files to ingest
        #[arg(required = true)]
        junit_paths: Vec<String>,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let Cli { command } = Cli::parse();
    match command {
        Command::Ingest {
            junit_paths,
            format,
        } => {
            for (path, suites) in ingest_paths(&junit_paths)? {
                println!("{}:", path.display());
                match format {
                    OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&suites)?),
                    OutputFormat::Debug => println!("{:#?}", suites),
                }
            }
        }
        Command::Totals { junit_paths } => {
            for (path, suites) in ingest_paths(&junit_paths)? {
                let totals = suites.iter().fold(Totals::default(), |mut acc, suite| {
                    acc += &suite.totals;
                    acc
                });
                println!(
                    "{}: {} tests, {} passed, {} skipped, {} failed, {} errored in {:?}",
                    path.display(),
                    totals.tests,
                    totals.passed,
                    totals.skipped,
                    totals.failed,
                    totals.error,
                    totals.duration,
                );
            }
        }
    }
    Ok(())
}

fn ingest_paths(junit_paths: &[String]) -> anyhow::Result<Vec<(PathBuf, Vec<Suite>)>> {
    let mut ingested = Vec::new();
    for junit_path in junit_paths {
        let paths = glob::glob(junit_path)?.collect::<Result<Vec<_>, _>>()?;
        if paths.is_empty() {
            tracing::warn!(pattern = %junit_path, "no files matched");
        }
        for path in paths {
            tracing::info!(path = %path.display(), "ingesting junit xml");
            let data = fs::read(&path)?;
            let suites = junit_ingest::ingest(data)
                .map_err(|e| anyhow::anyhow!("{}: {}", path.display(), e))?;
            ingested.push((path, suites));
        }
    }
    Ok(ingested)
}
