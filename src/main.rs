//! Site-Audit main entry point
//!
//! Command-line interface around the single-URL analyzer.

use anyhow::Context;
use clap::Parser;
use site_audit::config::{load_config_with_hash, Config};
use site_audit::{AnalysisOptions, Analyzer, ResultSource};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Site-Audit: score a website
///
/// Fetches one page, extracts metadata, contact details, social profiles and
/// feeds, consults the configured intelligence providers, and prints a scored
/// JSON report with recommendations.
#[derive(Parser, Debug)]
#[command(name = "site-audit")]
#[command(version)]
#[command(about = "Analyze and score a website", long_about = None)]
struct Cli {
    /// URL to analyze
    #[arg(value_name = "URL")]
    url: String,

    /// Path to TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Skip intelligence providers and feed discovery
    #[arg(long)]
    quick: bool,

    /// Neither read nor write the result cache
    #[arg(long)]
    no_cache: bool,

    /// Pretty-print the JSON report
    #[arg(long)]
    pretty: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("failed to load {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            config
        }
        None => Config::default(),
    };

    let mut options = if cli.quick {
        AnalysisOptions::quick()
    } else {
        AnalysisOptions::default()
    };
    options.use_cache = !cli.no_cache;

    let analyzer = Analyzer::new(config).context("failed to set up the analyzer")?;
    let (result, source) = analyzer.analyze_with_source(&cli.url, &options).await?;

    match source {
        ResultSource::Fresh => {}
        ResultSource::Cache => tracing::info!("Result served from cache"),
        ResultSource::Stale => tracing::warn!("Page unreachable; showing a stale cached result"),
    }
    for error in &result.errors {
        tracing::warn!("{} ({}): {}", error.category, error.kind, error.message);
    }

    let report = if cli.pretty {
        serde_json::to_string_pretty(&result)?
    } else {
        serde_json::to_string(&result)?
    };
    println!("{}", report);

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("site_audit=info,warn"),
            1 => EnvFilter::new("site_audit=debug,info"),
            2 => EnvFilter::new("site_audit=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    // the report goes to stdout, logs to stderr
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}
