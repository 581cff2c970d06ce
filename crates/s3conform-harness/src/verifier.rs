//! Pure checks over service responses.
//!
//! None of these retry, poll or touch the network. Every check yields a
//! diagnostic on failure so the runner can print exactly one line per failed
//! check.

use std::fmt;

use s3conform_core::{DenialStrictness, Error, Result};

/// Result of a single check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// The check held.
    Pass,
    /// The check failed, with a diagnostic.
    Fail(String),
}

impl Verdict {
    /// Returns true if the check held.
    #[must_use]
    pub const fn is_pass(&self) -> bool {
        matches!(self, Self::Pass)
    }
}

/// Checks that `expected` appears in `listing`.
///
/// `what` names the listing in the diagnostic (e.g. `"bucket list"`).
pub fn contains<S: AsRef<str>>(what: &str, expected: &str, listing: &[S]) -> Verdict {
    if listing.iter().any(|item| item.as_ref() == expected) {
        Verdict::Pass
    } else {
        Verdict::Fail(format!("{expected} not found in {what} ({} entries)", listing.len()))
    }
}

/// Checks that two byte strings are identical.
pub fn bytes_equal(what: &str, expected: &[u8], observed: &[u8]) -> Verdict {
    if expected == observed {
        return Verdict::Pass;
    }
    let first_diff = expected.iter().zip(observed).position(|(a, b)| a != b);
    match first_diff {
        Some(offset) => Verdict::Fail(format!(
            "{what} mismatch at byte {offset} (expected {} bytes, got {})",
            expected.len(),
            observed.len()
        )),
        None => Verdict::Fail(format!(
            "{what} mismatch: expected {} bytes, got {}",
            expected.len(),
            observed.len()
        )),
    }
}

/// Checks a reported length. A missing length is a failure.
pub fn length_equals(what: &str, expected: i64, observed: Option<i64>) -> Verdict {
    match observed {
        Some(len) if len == expected => Verdict::Pass,
        Some(len) => Verdict::Fail(format!("{what}: expected {expected}, got {len}")),
        None => Verdict::Fail(format!("{what}: expected {expected}, service reported none")),
    }
}

/// Classification of a call that was expected to be refused.
#[derive(Debug)]
pub enum DenialCheck<T> {
    /// Refused with one of the allowed codes.
    Denied(String),
    /// Refused with some other service error code.
    UnexpectedCode {
        /// The code the service returned.
        code: String,
        /// The service message.
        message: String,
        /// True when the configured strictness turns this into a failure.
        strict: bool,
    },
    /// The call succeeded.
    Allowed(T),
    /// The call failed without a service error code (dispatch fault, ...).
    NotADenial(Error),
}

impl<T> DenialCheck<T> {
    /// Returns true if the outcome counts as a refusal under the configured strictness.
    #[must_use]
    pub const fn is_refusal(&self) -> bool {
        match self {
            Self::Denied(_) => true,
            Self::UnexpectedCode { strict, .. } => !*strict,
            Self::Allowed(_) | Self::NotADenial(_) => false,
        }
    }
}

impl<T> fmt::Display for DenialCheck<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Denied(code) => write!(f, "denied with {code}"),
            Self::UnexpectedCode { code, message, .. } => {
                write!(f, "refused with unexpected code {code}: {message}")
            }
            Self::Allowed(_) => f.write_str("request was allowed"),
            Self::NotADenial(err) => write!(f, "request failed without a service code: {err}"),
        }
    }
}

/// Classifies the result of a call that the service should have refused.
pub fn expect_denied<T, S: AsRef<str>>(
    result: Result<T>,
    allowed_codes: &[S],
    strictness: DenialStrictness,
) -> DenialCheck<T> {
    match result {
        Ok(value) => DenialCheck::Allowed(value),
        Err(Error::Service { code, message, .. }) => {
            if allowed_codes.iter().any(|c| c.as_ref() == code) {
                DenialCheck::Denied(code)
            } else {
                DenialCheck::UnexpectedCode {
                    code,
                    message,
                    strict: strictness == DenialStrictness::Strict,
                }
            }
        }
        Err(other) => DenialCheck::NotADenial(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CODES: &[&str] = &["AccessDenied", "Forbidden"];

    #[test]
    fn test_contains() {
        let listing = vec!["a".to_string(), "b".to_string()];
        assert!(contains("bucket list", "b", &listing).is_pass());

        let Verdict::Fail(diag) = contains("bucket list", "c", &listing) else {
            panic!("expected failure");
        };
        assert_eq!(diag, "c not found in bucket list (2 entries)");
    }

    #[test]
    fn test_bytes_equal() {
        assert!(bytes_equal("content", b"hello", b"hello").is_pass());
        assert_eq!(
            bytes_equal("content", b"hello", b"help!"),
            Verdict::Fail("content mismatch at byte 3 (expected 5 bytes, got 5)".into())
        );
        assert_eq!(
            bytes_equal("content", b"hello", b"hell"),
            Verdict::Fail("content mismatch: expected 5 bytes, got 4".into())
        );
    }

    #[test]
    fn test_length_equals() {
        assert!(length_equals("size", 7_340_032, Some(7_340_032)).is_pass());
        assert!(!length_equals("size", 5, Some(4)).is_pass());
        assert!(!length_equals("size", 5, None).is_pass());
    }

    #[test]
    fn test_expect_denied_allowed_code() {
        let result: Result<()> = Err(Error::service("CreateBucket", "AccessDenied", "no"));
        let check = expect_denied(result, CODES, DenialStrictness::Lenient);
        assert!(matches!(check, DenialCheck::Denied(ref c) if c == "AccessDenied"));
        assert!(check.is_refusal());
    }

    #[test]
    fn test_expect_denied_unexpected_code_strictness() {
        let lenient = expect_denied::<(), _>(
            Err(Error::service("CreateBucket", "InvalidAccessKeyId", "bad key")),
            CODES,
            DenialStrictness::Lenient,
        );
        assert!(matches!(lenient, DenialCheck::UnexpectedCode { strict: false, .. }));
        assert!(lenient.is_refusal());

        let strict = expect_denied::<(), _>(
            Err(Error::service("CreateBucket", "InvalidAccessKeyId", "bad key")),
            CODES,
            DenialStrictness::Strict,
        );
        assert!(!strict.is_refusal());
        assert_eq!(strict.to_string(), "refused with unexpected code InvalidAccessKeyId: bad key");
    }

    #[test]
    fn test_expect_denied_success_and_faults() {
        let allowed = expect_denied(Ok(42), CODES, DenialStrictness::Lenient);
        assert!(matches!(allowed, DenialCheck::Allowed(42)));
        assert!(!allowed.is_refusal());

        let fault = expect_denied::<(), _>(
            Err(Error::Dispatch { operation: "CreateBucket", message: "timeout".into() }),
            CODES,
            DenialStrictness::Lenient,
        );
        assert!(matches!(fault, DenialCheck::NotADenial(_)));
    }
}
