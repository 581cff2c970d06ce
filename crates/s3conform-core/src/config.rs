//! Configuration management for the harness.
//!
//! The configuration is an immutable value handed to the scenario runner at
//! construction. Nothing in the engine reads the process environment; the CLI
//! layer resolves flags, environment variables and an optional TOML file into
//! a [`HarnessConfig`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Default service endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://acceleratedprod.com";
/// Default signing region.
pub const DEFAULT_REGION: &str = "global";
/// Default access key id used when none is configured.
pub const DEFAULT_ACCESS_KEY: &str = "ExampleAccessKey";
/// Default secret access key used when none is configured.
pub const DEFAULT_SECRET_KEY: &str = "ExampleSecretKey";
/// Longest bucket prefix that still fits a `{prefix}-{uuid}` name in 63 characters.
pub const MAX_BUCKET_PREFIX_LEN: usize = 63 - 37;

/// Main configuration for a harness run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Object-storage endpoint URL.
    pub endpoint: String,
    /// Identity endpoint URL (defaults to `endpoint`).
    pub iam_endpoint: Option<String>,
    /// Signing region.
    pub region: String,
    /// Bucket name prefix; each scenario has its own default.
    pub bucket_prefix: Option<String>,
    /// Bucket addressing style.
    pub addressing_style: AddressingStyle,
    /// Static credential pair for the unscoped clients.
    pub credentials: StaticCredentials,
    /// IAM principal that policies are attached to.
    /// When unset, the id of the freshly issued access key is used.
    pub iam_user: Option<String>,
    /// How denial checks treat unexpected error codes.
    pub denial: DenialConfig,
    /// Logging configuration.
    pub logging: LoggingConfig,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            iam_endpoint: None,
            region: DEFAULT_REGION.to_string(),
            bucket_prefix: None,
            addressing_style: AddressingStyle::default(),
            credentials: StaticCredentials::default(),
            iam_user: None,
            denial: DenialConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl HarnessConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(crate::Error::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string cannot be parsed.
    pub fn parse(content: &str) -> crate::Result<Self> {
        toml::from_str(content).map_err(|e| crate::Error::Config(e.to_string()))
    }

    /// Returns the identity endpoint, falling back to the storage endpoint.
    #[must_use]
    pub fn iam_endpoint(&self) -> &str {
        self.iam_endpoint.as_deref().unwrap_or(&self.endpoint)
    }

    /// Returns the configured bucket prefix or the scenario's default.
    #[must_use]
    pub fn bucket_prefix_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.bucket_prefix.as_deref().unwrap_or(default)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first invalid field.
    pub fn validate(&self) -> crate::Result<()> {
        validate_endpoint("endpoint", &self.endpoint)?;
        if let Some(iam) = &self.iam_endpoint {
            validate_endpoint("iam_endpoint", iam)?;
        }
        if self.region.trim().is_empty() {
            return Err(crate::Error::Config("region must not be empty".to_string()));
        }
        let creds = &self.credentials;
        if creds.access_key_id.is_empty() || creds.secret_access_key.is_empty() {
            return Err(crate::Error::Config(
                "credentials must have both an access key id and a secret".to_string(),
            ));
        }
        if let Some(prefix) = &self.bucket_prefix {
            if prefix.is_empty() || prefix.len() > MAX_BUCKET_PREFIX_LEN {
                return Err(crate::Error::Config(format!(
                    "bucket_prefix must be between 1 and {MAX_BUCKET_PREFIX_LEN} characters"
                )));
            }
        }
        if self.denial.codes.is_empty() {
            return Err(crate::Error::Config(
                "denial.codes must list at least one error code".to_string(),
            ));
        }
        Ok(())
    }
}

fn validate_endpoint(field: &str, value: &str) -> crate::Result<()> {
    if value.starts_with("http://") || value.starts_with("https://") {
        Ok(())
    } else {
        Err(crate::Error::Config(format!("{field} must be an http(s) URL, got {value:?}")))
    }
}

/// Bucket addressing style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressingStyle {
    /// Let the client decide.
    Auto,
    /// Bucket name in the host header.
    #[default]
    Virtual,
    /// Bucket name in the request path.
    Path,
}

impl AddressingStyle {
    /// Returns the style name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Virtual => "virtual",
            Self::Path => "path",
        }
    }

    /// Parses a style, falling back to [`AddressingStyle::Virtual`] for unknown values.
    ///
    /// Returns the style and whether the input was recognized.
    #[must_use]
    pub fn parse_lenient(s: &str) -> (Self, bool) {
        match s.parse() {
            Ok(style) => (style, true),
            Err(_) => (Self::Virtual, false),
        }
    }
}

impl FromStr for AddressingStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "virtual" => Ok(Self::Virtual),
            "path" => Ok(Self::Path),
            other => Err(format!("unknown addressing style: {other}")),
        }
    }
}

impl fmt::Display for AddressingStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A static access key / secret pair.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StaticCredentials {
    /// Access key id.
    pub access_key_id: String,
    /// Secret access key.
    pub secret_access_key: String,
}

impl Default for StaticCredentials {
    fn default() -> Self {
        Self {
            access_key_id: DEFAULT_ACCESS_KEY.to_string(),
            secret_access_key: DEFAULT_SECRET_KEY.to_string(),
        }
    }
}

impl fmt::Debug for StaticCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}

/// How an unexpected error code on an expected denial is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DenialStrictness {
    /// Report a warning and keep going.
    #[default]
    Lenient,
    /// Fail the scenario.
    Strict,
}

impl FromStr for DenialStrictness {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lenient" => Ok(Self::Lenient),
            "strict" => Ok(Self::Strict),
            other => Err(format!("unknown denial strictness: {other}")),
        }
    }
}

/// Denial check configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DenialConfig {
    /// Strictness for unexpected codes.
    pub strictness: DenialStrictness,
    /// Error codes accepted as a denial.
    pub codes: Vec<String>,
}

impl Default for DenialConfig {
    fn default() -> Self {
        Self {
            strictness: DenialStrictness::Lenient,
            codes: vec!["AccessDenied".to_string(), "Forbidden".to_string()],
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable format.
    #[default]
    Pretty,
    /// JSON format.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    pub level: String,
    /// Log output format.
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: LogFormat::Pretty }
    }
}
