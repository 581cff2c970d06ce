//! Fail-fast execution of scenario steps with guaranteed teardown.

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use bytes::Bytes;
use futures::future::BoxFuture;
use futures::FutureExt;
use s3conform_core::{Error, HarnessConfig, MultipartError, MultipartSession, ScopedCredential};
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::scenarios::Scenario;
use crate::teardown::{teardown, TeardownReport};
use crate::tracker::Tracker;
use crate::transport::Transport;
use crate::verifier::Verdict;

/// Exit code for transport errors and faults.
pub const EXIT_TRANSPORT: u8 = 1;

/// Result of one step.
#[derive(Debug)]
pub enum Outcome {
    /// Proceed to the next step.
    Continue,
    /// A check failed.
    AssertionFailed {
        /// Diagnostic for the failed check.
        message: String,
        /// Scenario-specific exit code.
        exit_code: u8,
    },
    /// A remote call failed or the step faulted.
    TransportFailed(Error),
}

impl Outcome {
    /// Process exit code for this outcome.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Continue => 0,
            Self::AssertionFailed { exit_code, .. } => *exit_code,
            Self::TransportFailed(_) => EXIT_TRANSPORT,
        }
    }

    /// Returns true for [`Outcome::Continue`].
    #[must_use]
    pub const fn is_continue(&self) -> bool {
        matches!(self, Self::Continue)
    }
}

/// Early exit from a step body.
#[derive(Debug)]
pub enum StepFailure {
    /// A check failed.
    Assertion {
        /// Diagnostic.
        message: String,
        /// Scenario-specific exit code.
        exit_code: u8,
    },
    /// A remote call failed.
    Transport(Error),
}

impl StepFailure {
    /// An assertion failure with the given exit code.
    pub fn assertion(exit_code: u8, message: impl Into<String>) -> Self {
        Self::Assertion { message: message.into(), exit_code }
    }
}

impl From<Error> for StepFailure {
    fn from(err: Error) -> Self {
        Self::Transport(err)
    }
}

impl From<MultipartError> for StepFailure {
    fn from(err: MultipartError) -> Self {
        Self::Transport(Error::Multipart(err))
    }
}

/// What step bodies return.
pub type StepResult = Result<(), StepFailure>;

impl From<StepResult> for Outcome {
    fn from(result: StepResult) -> Self {
        match result {
            Ok(()) => Self::Continue,
            Err(StepFailure::Assertion { message, exit_code }) => {
                Self::AssertionFailed { message, exit_code }
            }
            Err(StepFailure::Transport(err)) => Self::TransportFailed(err),
        }
    }
}

/// Turns a failed verdict into an assertion failure with `exit_code`.
pub fn check(verdict: Verdict, exit_code: u8) -> StepResult {
    match verdict {
        Verdict::Pass => Ok(()),
        Verdict::Fail(message) => Err(StepFailure::assertion(exit_code, message)),
    }
}

/// A step: borrows the scenario state for the duration of its future.
pub type StepFn = for<'a> fn(&'a mut ScenarioState) -> BoxFuture<'a, Outcome>;

/// A named step.
#[derive(Clone, Copy)]
pub struct Step {
    /// Name for logs.
    pub name: &'static str,
    /// The step body.
    pub run: StepFn,
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Step").field("name", &self.name).finish_non_exhaustive()
    }
}

/// Mutable context threaded through a scenario's steps.
pub struct ScenarioState {
    /// Run configuration.
    pub config: Arc<HarnessConfig>,
    /// Transport signing with the configured static credentials.
    pub transport: Arc<dyn Transport>,
    /// Ledger of created resources.
    pub tracker: Tracker,
    /// The scenario's primary bucket.
    pub bucket: Option<String>,
    /// The object key under test.
    pub key: Option<String>,
    /// Content written by the scenario, for later comparison.
    pub payload: Bytes,
    /// The open multipart upload.
    pub multipart: Option<MultipartSession>,
    /// The freshly issued access key.
    pub credential: Option<ScopedCredential>,
    /// ARN of the policy created by the scenario.
    pub policy_arn: Option<String>,
    /// Transport signing with [`ScenarioState::credential`].
    pub scoped: Option<Arc<dyn Transport>>,
    /// Non-fatal findings.
    pub warnings: Vec<String>,
}

impl ScenarioState {
    /// Creates an empty state.
    pub fn new(config: Arc<HarnessConfig>, transport: Arc<dyn Transport>) -> Self {
        Self {
            config,
            transport,
            tracker: Tracker::new(),
            bucket: None,
            key: None,
            payload: Bytes::new(),
            multipart: None,
            credential: None,
            policy_arn: None,
            scoped: None,
            warnings: Vec::new(),
        }
    }

    /// Returns the primary bucket.
    pub fn bucket(&self) -> Result<&str, StepFailure> {
        self.bucket.as_deref().ok_or_else(|| missing("bucket"))
    }

    /// Returns the object key under test.
    pub fn key(&self) -> Result<&str, StepFailure> {
        self.key.as_deref().ok_or_else(|| missing("object key"))
    }

    /// Returns the issued credential.
    pub fn credential(&self) -> Result<&ScopedCredential, StepFailure> {
        self.credential.as_ref().ok_or_else(|| missing("scoped credential"))
    }

    /// Returns the created policy's ARN.
    pub fn policy_arn(&self) -> Result<&str, StepFailure> {
        self.policy_arn.as_deref().ok_or_else(|| missing("policy ARN"))
    }

    /// Returns the scoped transport.
    pub fn scoped(&self) -> Result<Arc<dyn Transport>, StepFailure> {
        self.scoped.clone().ok_or_else(|| missing("scoped transport"))
    }

    /// Returns the open multipart session.
    pub fn multipart(&mut self) -> Result<&mut MultipartSession, StepFailure> {
        self.multipart.as_mut().ok_or_else(|| missing("multipart session"))
    }

    /// The principal policies are attached to: the configured IAM user, or
    /// the issued access key id.
    pub fn principal(&self) -> Result<String, StepFailure> {
        match &self.config.iam_user {
            Some(user) => Ok(user.clone()),
            None => Ok(self.credential()?.access_key_id.clone()),
        }
    }

    /// Records a non-fatal finding.
    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!(warning = %message, "Scenario warning");
        self.warnings.push(message);
    }
}

fn missing(what: &str) -> StepFailure {
    StepFailure::Transport(Error::Fault(format!("{what} not set by an earlier step")))
}

/// Result of one scenario run.
#[derive(Debug)]
pub struct ScenarioReport {
    /// Scenario name.
    pub scenario: &'static str,
    /// Outcome of the last step executed.
    pub outcome: Outcome,
    /// Process exit code.
    pub exit_code: u8,
    /// Steps executed, including the failing one.
    pub steps_run: usize,
    /// Non-fatal findings.
    pub warnings: Vec<String>,
    /// Teardown results.
    pub teardown: TeardownReport,
}

impl ScenarioReport {
    /// Returns true if every step passed.
    #[must_use]
    pub const fn passed(&self) -> bool {
        self.exit_code == 0
    }
}

impl fmt::Display for ScenarioReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            Outcome::Continue => write!(f, "PASS {} ({} steps)", self.scenario, self.steps_run)?,
            Outcome::AssertionFailed { message, exit_code } => {
                write!(f, "FAIL {} (exit {exit_code}): {message}", self.scenario)?;
            }
            Outcome::TransportFailed(err) => {
                write!(f, "ERROR {} (exit {}): {err}", self.scenario, EXIT_TRANSPORT)?;
            }
        }
        if !self.warnings.is_empty() {
            write!(f, " [{} warnings]", self.warnings.len())?;
        }
        Ok(())
    }
}

/// Runs scenarios against one transport and configuration.
pub struct ScenarioRunner {
    config: Arc<HarnessConfig>,
    transport: Arc<dyn Transport>,
}

impl ScenarioRunner {
    /// Creates a runner.
    pub fn new(config: Arc<HarnessConfig>, transport: Arc<dyn Transport>) -> Self {
        Self { config, transport }
    }

    /// Runs a scenario. Teardown always runs, whatever the outcome.
    pub async fn run(&self, scenario: &Scenario) -> ScenarioReport {
        let span = info_span!("scenario", name = scenario.name.as_str());
        self.run_inner(scenario).instrument(span).await
    }

    /// Runs scenarios one after another.
    pub async fn run_all(&self, scenarios: &[Scenario]) -> Vec<ScenarioReport> {
        let mut reports = Vec::with_capacity(scenarios.len());
        for scenario in scenarios {
            reports.push(self.run(scenario).await);
        }
        reports
    }

    async fn run_inner(&self, scenario: &Scenario) -> ScenarioReport {
        info!(transport = self.transport.name(), "Starting scenario");
        let mut state = ScenarioState::new(Arc::clone(&self.config), Arc::clone(&self.transport));
        let mut outcome = Outcome::Continue;
        let mut steps_run = 0;

        for step in &scenario.steps {
            steps_run += 1;
            debug!(step = step.name, "Running step");

            outcome = match AssertUnwindSafe((step.run)(&mut state)).catch_unwind().await {
                Ok(outcome) => outcome,
                Err(panic) => Outcome::TransportFailed(Error::Fault(panic_message(&*panic))),
            };

            match &outcome {
                Outcome::Continue => {}
                Outcome::AssertionFailed { message, exit_code } => {
                    error!(step = step.name, exit_code, diagnostic = %message, "Check failed");
                    break;
                }
                Outcome::TransportFailed(err) => {
                    error!(step = step.name, error = %err, "Step failed");
                    break;
                }
            }
        }

        let teardown = teardown(&state.tracker, self.transport.as_ref()).await;
        let exit_code = outcome.exit_code();
        info!(exit_code, steps_run, "Scenario finished");

        ScenarioReport {
            scenario: scenario.name.as_str(),
            outcome,
            exit_code,
            steps_run,
            warnings: state.warnings,
            teardown,
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "step panicked".to_string()
    }
}
