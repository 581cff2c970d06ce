//! The scenario catalogue.
//!
//! Each scenario is a fixed, ordered list of steps. Steps are `async fn`s
//! taking `&mut ScenarioState` and returning [`StepResult`]; the `step!`
//! macro adapts them to [`Step`].
//!
//! [`StepResult`]: crate::runner::StepResult

use std::fmt;
use std::str::FromStr;

use crate::runner::Step;

/// Wraps `async fn name(&mut ScenarioState) -> StepResult` into a [`Step`].
macro_rules! step {
    ($f:ident) => {
        $crate::runner::Step {
            name: stringify!($f),
            run: |state| {
                ::futures::FutureExt::boxed(async move {
                    $crate::runner::Outcome::from($f(state).await)
                })
            },
        }
    };
}

mod access_key;
mod basics;
mod bucket;
mod common;
mod copy;
mod multipart;
mod object;
mod scoped_policy;

/// Names of the built-in scenarios.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScenarioName {
    /// Put/get smoke test.
    Basics,
    /// Bucket create, head and list.
    Bucket,
    /// Object put, head, get and prefix listing.
    Object,
    /// Server-side copy.
    Copy,
    /// Two-part multipart upload.
    Multipart,
    /// Access key lifecycle.
    AccessKey,
    /// Bucket-scoped credential enforcement.
    ScopedPolicy,
}

impl ScenarioName {
    /// Every scenario, in catalogue order.
    pub const ALL: [Self; 7] = [
        Self::Basics,
        Self::Bucket,
        Self::Object,
        Self::Copy,
        Self::Multipart,
        Self::AccessKey,
        Self::ScopedPolicy,
    ];

    /// Returns the scenario's command-line name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Basics => "basics",
            Self::Bucket => "bucket",
            Self::Object => "object",
            Self::Copy => "copy",
            Self::Multipart => "multipart",
            Self::AccessKey => "access-key",
            Self::ScopedPolicy => "scoped-policy",
        }
    }

    /// Builds the scenario.
    #[must_use]
    pub fn scenario(self) -> Scenario {
        match self {
            Self::Basics => basics::scenario(),
            Self::Bucket => bucket::scenario(),
            Self::Object => object::scenario(),
            Self::Copy => copy::scenario(),
            Self::Multipart => multipart::scenario(),
            Self::AccessKey => access_key::scenario(),
            Self::ScopedPolicy => scoped_policy::scenario(),
        }
    }
}

impl fmt::Display for ScenarioName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScenarioName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|name| name.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown scenario: {s}"))
    }
}

/// A named, ordered list of steps.
#[derive(Debug, Clone)]
pub struct Scenario {
    /// Scenario name.
    pub name: ScenarioName,
    /// One-line description.
    pub description: &'static str,
    /// Steps in execution order.
    pub steps: Vec<Step>,
}

/// Builds every scenario in catalogue order.
#[must_use]
pub fn catalogue() -> Vec<Scenario> {
    ScenarioName::ALL.into_iter().map(ScenarioName::scenario).collect()
}
