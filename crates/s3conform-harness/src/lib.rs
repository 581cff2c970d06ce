// Copyright 2024 The Rucket Authors
// SPDX-License-Identifier: Apache-2.0

//! Scenario engine for S3 and IAM conformance checks.
//!
//! A scenario is an ordered list of steps run against a [`Transport`]. Every
//! resource a step creates is recorded in a [`Tracker`], and the runner tears
//! all of them down once the scenario ends, whether it passed, failed an
//! assertion or hit a transport error.
//!
//! The [`aws`] module talks to a real endpoint through the AWS SDK; the
//! [`testing`] module provides an in-memory service with fault injection.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod aws;
pub mod naming;
pub mod runner;
pub mod scenarios;
pub mod teardown;
pub mod testing;
pub mod tracker;
pub mod transport;
pub mod verifier;

pub use aws::AwsTransport;
pub use runner::{
    Outcome, ScenarioReport, ScenarioRunner, ScenarioState, Step, StepFailure, StepResult,
    EXIT_TRANSPORT,
};
pub use scenarios::{catalogue, Scenario, ScenarioName};
pub use teardown::{teardown, Disposition, TeardownReport};
pub use tracker::Tracker;
pub use transport::{AccessKeyInfo, ObjectData, ObjectHead, PutObject, Transport};
pub use verifier::{DenialCheck, Verdict};
