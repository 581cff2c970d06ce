// Copyright 2024 The Rucket Authors
// SPDX-License-Identifier: Apache-2.0

//! Core types for the s3conform conformance harness.
//!
//! This crate provides the building blocks shared by the harness engine and the CLI:
//! - Harness configuration (endpoints, credentials, addressing style, denial strictness)
//! - The error taxonomy for service, transport and local failures
//! - The remote resource model (handles, multipart sessions, scoped credentials)
//! - IAM policy documents

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod multipart;
pub mod policy;
pub mod types;

pub use config::{
    AddressingStyle, DenialConfig, DenialStrictness, HarnessConfig, LogFormat, LoggingConfig,
    StaticCredentials, MAX_BUCKET_PREFIX_LEN,
};
pub use error::{code_for_status, Error, Result};
pub use multipart::{MultipartError, MultipartSession, MIN_PART_SIZE};
pub use policy::PolicyDocument;
pub use types::{mask_key_id, AccessKeyStatus, ResourceHandle, ResourceKind, ScopedCredential};
