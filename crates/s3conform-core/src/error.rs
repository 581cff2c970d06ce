// Copyright 2024 The Rucket Authors
// SPDX-License-Identifier: Apache-2.0

//! Error types for the harness.
//!
//! Service errors keep the wire error code so callers can tell an expected
//! denial from an unexpected failure without string matching on messages.

use thiserror::Error;

use crate::multipart::MultipartError;

/// A specialized `Result` type for harness operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error codes that mean "the resource does not exist".
const NOT_FOUND_CODES: &[&str] =
    &["NoSuchBucket", "NoSuchKey", "NoSuchUpload", "NoSuchEntity", "NotFound"];

/// Error codes that mean "the caller is not allowed".
const ACCESS_DENIED_CODES: &[&str] = &["AccessDenied", "Forbidden"];

/// Errors produced while talking to the services under test.
#[derive(Debug, Error)]
pub enum Error {
    /// The remote endpoint answered with a structured error.
    #[error("{operation} failed: {code}: {message}")]
    Service {
        /// The API operation that failed (e.g. `CreateBucket`).
        operation: &'static str,
        /// The service error code (e.g. `AccessDenied`).
        code: String,
        /// A human-readable error message.
        message: String,
        /// HTTP status of the response, when one was received.
        status: Option<u16>,
    },

    /// The request never produced a service response (connect, timeout, signing, ...).
    #[error("{operation} dispatch failed: {message}")]
    Dispatch {
        /// The API operation that failed.
        operation: &'static str,
        /// Description of the transport failure.
        message: String,
    },

    /// A successful response did not carry a field the protocol requires.
    #[error("{operation} returned a malformed response: {detail}")]
    MalformedResponse {
        /// The API operation.
        operation: &'static str,
        /// What was missing or wrong.
        detail: String,
    },

    /// A local multipart session invariant was violated.
    #[error("multipart session error: {0}")]
    Multipart(#[from] MultipartError),

    /// A step panicked.
    #[error("unexpected fault: {0}")]
    Fault(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Creates a service error.
    pub fn service(
        operation: &'static str,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Service { operation, code: code.into(), message: message.into(), status: None }
    }

    /// Creates a malformed-response error.
    pub fn malformed(operation: &'static str, detail: impl Into<String>) -> Self {
        Self::MalformedResponse { operation, detail: detail.into() }
    }

    /// Returns the service error code, if this is a service error.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Service { code, .. } => Some(code),
            _ => None,
        }
    }

    /// Returns the failed operation name, if known.
    #[must_use]
    pub fn operation(&self) -> Option<&'static str> {
        match self {
            Self::Service { operation, .. }
            | Self::Dispatch { operation, .. }
            | Self::MalformedResponse { operation, .. } => Some(operation),
            _ => None,
        }
    }

    /// Returns true if the service reported that the resource does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Service { code, status, .. } => {
                NOT_FOUND_CODES.contains(&code.as_str()) || *status == Some(404)
            }
            _ => false,
        }
    }

    /// Returns true if the service refused the request for lack of permission.
    #[must_use]
    pub fn is_access_denied(&self) -> bool {
        match self {
            Self::Service { code, status, .. } => {
                ACCESS_DENIED_CODES.contains(&code.as_str()) || *status == Some(403)
            }
            _ => false,
        }
    }
}

/// Derives an error code for responses that carry none (HEAD requests have no body).
#[must_use]
pub fn code_for_status(status: u16) -> String {
    match status {
        403 => "Forbidden".to_string(),
        404 => "NotFound".to_string(),
        other => other.to_string(),
    }
}
