//! Command line interface definition.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use s3conform_core::{AddressingStyle, DenialStrictness, HarnessConfig, LogFormat};
use s3conform_harness::ScenarioName;

/// s3conform: conformance scenarios for S3- and IAM-compatible endpoints.
#[derive(Parser)]
#[command(name = "s3conform")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level filter (overridden by RUST_LOG).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Log output format.
    #[arg(long, global = true)]
    pub log_format: Option<LogFormatArg>,

    /// Command to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Run scenarios against an endpoint.
    ///
    /// Every selected scenario runs. The exit status is the code of the first
    /// scenario that failed, or 0 when all passed.
    Run(RunArgs),
    /// List the built-in scenarios.
    List,
    /// Print version information.
    Version,
}

/// Log output format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormatArg {
    /// Human-readable output.
    Pretty,
    /// JSON lines.
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Pretty => Self::Pretty,
            LogFormatArg::Json => Self::Json,
        }
    }
}

/// Arguments for the run command.
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Scenarios to run, in order. Runs the whole catalogue when empty.
    pub scenarios: Vec<ScenarioName>,

    /// Object-storage endpoint URL.
    #[arg(long, env = "S3_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Identity endpoint URL (defaults to the storage endpoint).
    #[arg(long, env = "IAM_ENDPOINT")]
    pub iam_endpoint: Option<String>,

    /// Signing region.
    #[arg(long, env = "S3_REGION")]
    pub region: Option<String>,

    /// Prefix for generated bucket names.
    #[arg(long, env = "BUCKET_PREFIX")]
    pub bucket_prefix: Option<String>,

    /// Bucket addressing style (auto, virtual, path).
    #[arg(long, env = "S3_ADDRESSING_STYLE")]
    pub addressing_style: Option<String>,

    /// Access key id for the unscoped clients.
    #[arg(long, env = "S3_ACCESS_KEY")]
    pub access_key: Option<String>,

    /// Secret access key for the unscoped clients.
    #[arg(long, env = "S3_SECRET_KEY", hide_env_values = true)]
    pub secret_key: Option<String>,

    /// IAM user that policies are attached to.
    #[arg(long, env = "IAM_USER")]
    pub iam_user: Option<String>,

    /// How an unexpected error code on an expected denial is treated.
    #[arg(long, env = "S3CONFORM_DENIAL_STRICTNESS")]
    pub denial_strictness: Option<DenialStrictness>,
}

impl RunArgs {
    /// Overlays the flags that were given onto `config`.
    ///
    /// Returns warnings for values that were accepted with a fallback.
    pub fn apply(&self, config: &mut HarnessConfig) -> Vec<String> {
        let mut warnings = Vec::new();

        if let Some(endpoint) = &self.endpoint {
            config.endpoint.clone_from(endpoint);
        }
        if let Some(iam_endpoint) = &self.iam_endpoint {
            config.iam_endpoint = Some(iam_endpoint.clone());
        }
        if let Some(region) = &self.region {
            config.region.clone_from(region);
        }
        if let Some(prefix) = &self.bucket_prefix {
            config.bucket_prefix = Some(prefix.clone());
        }
        if let Some(style) = &self.addressing_style {
            let (parsed, known) = AddressingStyle::parse_lenient(style);
            if !known {
                warnings.push(format!("unknown addressing style {style:?}, using {parsed}"));
            }
            config.addressing_style = parsed;
        }
        if let Some(access_key) = &self.access_key {
            config.credentials.access_key_id.clone_from(access_key);
        }
        if let Some(secret_key) = &self.secret_key {
            config.credentials.secret_access_key.clone_from(secret_key);
        }
        if let Some(user) = &self.iam_user {
            config.iam_user = Some(user.clone());
        }
        if let Some(strictness) = self.denial_strictness {
            config.denial.strictness = strictness;
        }

        warnings
    }

    /// The selected scenario names, or the whole catalogue.
    pub fn selected(&self) -> Vec<ScenarioName> {
        if self.scenarios.is_empty() {
            ScenarioName::ALL.to_vec()
        } else {
            self.scenarios.clone()
        }
    }
}
