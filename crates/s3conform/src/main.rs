//! s3conform: conformance scenarios for S3- and IAM-compatible endpoints.

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use s3conform_core::{HarnessConfig, LogFormat};
use s3conform_harness::{
    catalogue, AwsTransport, ScenarioReport, ScenarioRunner, EXIT_TRANSPORT,
};
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod cli;

use cli::{Cli, Commands, RunArgs};

/// Region variables consulted, in order, when `--region`/`S3_REGION` is unset.
const REGION_FALLBACKS: &[&str] = &["IAM_REGION", "AWS_REGION", "AWS_DEFAULT_REGION"];

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Run(args) => match run(&cli, args).await {
            Ok(code) => ExitCode::from(code),
            Err(e) => {
                eprintln!("error: {e:#}");
                ExitCode::from(EXIT_TRANSPORT)
            }
        },
        Commands::List => {
            for scenario in catalogue() {
                println!("{:<14} {}", scenario.name, scenario.description);
            }
            ExitCode::SUCCESS
        }
        Commands::Version => {
            println!("s3conform {}", env!("CARGO_PKG_VERSION"));
            ExitCode::SUCCESS
        }
    }
}

async fn run(cli: &Cli, args: &RunArgs) -> Result<u8> {
    let mut config = load_config(cli.config.as_deref())?;
    let warnings = args.apply(&mut config);
    if args.region.is_none() {
        if let Some(region) = fallback_region(|var| std::env::var(var).ok()) {
            config.region = region;
        }
    }
    if let Some(level) = &cli.log_level {
        config.logging.level.clone_from(level);
    }
    if let Some(format) = cli.log_format {
        config.logging.format = format.into();
    }
    config.validate().context("Invalid configuration")?;

    init_logging(&config)?;
    for warning in &warnings {
        warn!("{warning}");
    }
    info!(
        endpoint = %config.endpoint,
        iam_endpoint = %config.iam_endpoint(),
        region = %config.region,
        addressing = %config.addressing_style,
        "Starting s3conform {}",
        env!("CARGO_PKG_VERSION")
    );

    let config = Arc::new(config);
    let transport = Arc::new(AwsTransport::new(Arc::clone(&config)));
    let runner = ScenarioRunner::new(config, transport);

    let scenarios: Vec<_> = args.selected().into_iter().map(|name| name.scenario()).collect();
    let reports = runner.run_all(&scenarios).await;

    for report in &reports {
        println!("{report}");
        if !report.teardown.is_clean() {
            warn!(scenario = report.scenario, teardown = %report.teardown, "Resources may remain");
        }
    }

    let Some(failed) = first_failure(&reports) else {
        return Ok(0);
    };
    if reports.len() > 1 {
        println!("exit status {} from {}", failed.exit_code, failed.scenario);
    }
    Ok(failed.exit_code)
}

/// The report whose exit code becomes the process exit status.
fn first_failure(reports: &[ScenarioReport]) -> Option<&ScenarioReport> {
    reports.iter().find(|r| !r.passed())
}

fn load_config(path: Option<&Path>) -> Result<HarnessConfig> {
    match path {
        Some(path) => HarnessConfig::from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display())),
        None => Ok(HarnessConfig::default()),
    }
}

fn fallback_region(lookup: impl Fn(&str) -> Option<String>) -> Option<String> {
    REGION_FALLBACKS.iter().find_map(|var| lookup(var).filter(|v| !v.is_empty()))
}

fn init_logging(config: &HarnessConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));

    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    match config.logging.format {
        LogFormat::Json => {
            tracing_subscriber::registry().with(filter).with(fmt_layer.json()).try_init()?;
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry().with(filter).with(fmt_layer).try_init()?;
        }
    }

    Ok(())
}
