// Copyright 2024 The Rucket Authors
// SPDX-License-Identifier: Apache-2.0

//! Remote resource model shared by the tracker, the scenarios and teardown.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of a remotely-created resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    /// A bucket.
    Bucket,
    /// An object in a bucket.
    Object,
    /// An in-progress multipart upload.
    MultipartUpload,
    /// An IAM access key.
    AccessKey,
    /// A managed IAM policy.
    Policy,
    /// A policy attached to a principal.
    PolicyAttachment,
}

impl ResourceKind {
    /// Returns the kind name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Bucket => "bucket",
            Self::Object => "object",
            Self::MultipartUpload => "multipart-upload",
            Self::AccessKey => "access-key",
            Self::Policy => "policy",
            Self::PolicyAttachment => "policy-attachment",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handle to a resource whose creation the service confirmed.
///
/// Each variant carries the kind-specific identifier plus the identifiers of
/// the resources it lives under.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceHandle {
    /// A bucket, identified by name.
    Bucket {
        /// Bucket name.
        bucket: String,
    },
    /// An object, identified by key within its bucket.
    Object {
        /// Owning bucket.
        bucket: String,
        /// Object key.
        key: String,
    },
    /// A multipart upload, identified by upload id within bucket and key.
    MultipartUpload {
        /// Owning bucket.
        bucket: String,
        /// Target object key.
        key: String,
        /// Upload id returned by the initiate call.
        upload_id: String,
    },
    /// An access key, identified by its id.
    AccessKey {
        /// Access key id.
        access_key_id: String,
    },
    /// A managed policy, identified by ARN.
    Policy {
        /// Policy ARN.
        arn: String,
    },
    /// A policy bound to a principal.
    PolicyAttachment {
        /// Principal (user name) the policy is attached to.
        user: String,
        /// Attached policy ARN.
        policy_arn: String,
    },
}

impl ResourceHandle {
    /// Handle for a bucket.
    pub fn bucket(bucket: impl Into<String>) -> Self {
        Self::Bucket { bucket: bucket.into() }
    }

    /// Handle for an object.
    pub fn object(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self::Object { bucket: bucket.into(), key: key.into() }
    }

    /// Handle for a multipart upload.
    pub fn multipart_upload(
        bucket: impl Into<String>,
        key: impl Into<String>,
        upload_id: impl Into<String>,
    ) -> Self {
        Self::MultipartUpload {
            bucket: bucket.into(),
            key: key.into(),
            upload_id: upload_id.into(),
        }
    }

    /// Handle for an access key.
    pub fn access_key(access_key_id: impl Into<String>) -> Self {
        Self::AccessKey { access_key_id: access_key_id.into() }
    }

    /// Handle for a policy.
    pub fn policy(arn: impl Into<String>) -> Self {
        Self::Policy { arn: arn.into() }
    }

    /// Handle for a policy attachment.
    pub fn policy_attachment(user: impl Into<String>, policy_arn: impl Into<String>) -> Self {
        Self::PolicyAttachment { user: user.into(), policy_arn: policy_arn.into() }
    }

    /// Returns the resource kind.
    #[must_use]
    pub const fn kind(&self) -> ResourceKind {
        match self {
            Self::Bucket { .. } => ResourceKind::Bucket,
            Self::Object { .. } => ResourceKind::Object,
            Self::MultipartUpload { .. } => ResourceKind::MultipartUpload,
            Self::AccessKey { .. } => ResourceKind::AccessKey,
            Self::Policy { .. } => ResourceKind::Policy,
            Self::PolicyAttachment { .. } => ResourceKind::PolicyAttachment,
        }
    }

    /// Returns the kind-specific identifier.
    #[must_use]
    pub fn identifier(&self) -> &str {
        match self {
            Self::Bucket { bucket } => bucket,
            Self::Object { key, .. } => key,
            Self::MultipartUpload { upload_id, .. } => upload_id,
            Self::AccessKey { access_key_id } => access_key_id,
            Self::Policy { arn } => arn,
            Self::PolicyAttachment { policy_arn, .. } => policy_arn,
        }
    }

    /// Returns the identifiers of the resources this one lives under.
    #[must_use]
    pub fn parent_identifiers(&self) -> Vec<&str> {
        match self {
            Self::Bucket { .. } | Self::AccessKey { .. } | Self::Policy { .. } => Vec::new(),
            Self::Object { bucket, .. } => vec![bucket],
            Self::MultipartUpload { bucket, key, .. } => vec![bucket, key],
            Self::PolicyAttachment { user, .. } => vec![user],
        }
    }
}

impl fmt::Display for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bucket { bucket } => write!(f, "bucket {bucket}"),
            Self::Object { bucket, key } => write!(f, "object {bucket}/{key}"),
            Self::MultipartUpload { bucket, key, upload_id } => {
                write!(f, "multipart upload {upload_id} on {bucket}/{key}")
            }
            Self::AccessKey { access_key_id } => {
                write!(f, "access key {}", mask_key_id(access_key_id))
            }
            Self::Policy { arn } => write!(f, "policy {arn}"),
            Self::PolicyAttachment { user, policy_arn } => {
                write!(f, "attachment of {policy_arn} to {}", mask_key_id(user))
            }
        }
    }
}

/// Masks an access key id down to its first four characters.
#[must_use]
pub fn mask_key_id(id: &str) -> String {
    let visible: String = id.chars().take(4).collect();
    format!("{visible}****")
}

/// Status of an access key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AccessKeyStatus {
    /// Usable for signing.
    #[default]
    Active,
    /// Present but rejected for signing.
    Inactive,
}

impl AccessKeyStatus {
    /// Returns the wire value.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "Active",
            Self::Inactive => "Inactive",
        }
    }
}

impl fmt::Display for AccessKeyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An access key issued by the identity service.
#[derive(Clone, PartialEq, Eq)]
pub struct ScopedCredential {
    /// Access key id.
    pub access_key_id: String,
    /// Secret access key.
    pub secret_key: String,
    /// Current status.
    pub status: AccessKeyStatus,
}

impl ScopedCredential {
    /// Creates an active credential.
    pub fn new(access_key_id: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_key: secret_key.into(),
            status: AccessKeyStatus::Active,
        }
    }
}

impl fmt::Debug for ScopedCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopedCredential")
            .field("access_key_id", &mask_key_id(&self.access_key_id))
            .field("secret_key", &"<redacted>")
            .field("status", &self.status)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_kind_and_identifiers() {
        let upload = ResourceHandle::multipart_upload("b", "large/data.bin", "u-1");
        assert_eq!(upload.kind(), ResourceKind::MultipartUpload);
        assert_eq!(upload.identifier(), "u-1");
        assert_eq!(upload.parent_identifiers(), vec!["b", "large/data.bin"]);

        let attachment = ResourceHandle::policy_attachment("AKIA1234", "arn:aws:iam::1:policy/p");
        assert_eq!(attachment.kind(), ResourceKind::PolicyAttachment);
        assert_eq!(attachment.parent_identifiers(), vec!["AKIA1234"]);

        assert!(ResourceHandle::bucket("b").parent_identifiers().is_empty());
    }

    #[test]
    fn test_handle_display_masks_key_ids() {
        let handle = ResourceHandle::access_key("AKIAEXAMPLEKEY");
        assert_eq!(handle.to_string(), "access key AKIA****");
        assert_eq!(ResourceHandle::object("b", "k").to_string(), "object b/k");
    }

    #[test]
    fn test_credential_debug_redacts_secret() {
        let cred = ScopedCredential::new("AKIAEXAMPLEKEY", "s3cr3t");
        let debug = format!("{cred:?}");
        assert!(!debug.contains("s3cr3t"));
        assert!(!debug.contains("EXAMPLEKEY"));
        assert_eq!(cred.status, AccessKeyStatus::Active);
    }

    #[test]
    fn test_mask_short_id() {
        assert_eq!(mask_key_id("AB"), "AB****");
    }
}
