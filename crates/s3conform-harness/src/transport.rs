//! The transport seam between scenarios and the services under test.
//!
//! Every remote call a scenario makes goes through [`Transport`]. The
//! production implementation wraps the AWS SDK clients; tests use the
//! in-memory service in [`crate::testing`].

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use s3conform_core::{AccessKeyStatus, Result, ScopedCredential};

/// Body and metadata returned by a get-object call.
#[derive(Debug, Clone, Default)]
pub struct ObjectData {
    /// Object content.
    pub body: Bytes,
    /// Content type, if the service returned one.
    pub content_type: Option<String>,
    /// User-defined metadata (without the `x-amz-meta-` prefix).
    pub metadata: HashMap<String, String>,
    /// Entity tag.
    pub etag: Option<String>,
}

/// Headers returned by a head-object call.
#[derive(Debug, Clone, Default)]
pub struct ObjectHead {
    /// Content length, if the service reported one.
    pub content_length: Option<i64>,
    /// Content type.
    pub content_type: Option<String>,
    /// Entity tag.
    pub etag: Option<String>,
}

/// An access key as reported by a list call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessKeyInfo {
    /// Access key id.
    pub access_key_id: String,
    /// Current status.
    pub status: AccessKeyStatus,
}

/// A request to put an object.
#[derive(Debug, Clone)]
pub struct PutObject<'a> {
    /// Target bucket.
    pub bucket: &'a str,
    /// Target key.
    pub key: &'a str,
    /// Object content.
    pub body: Bytes,
    /// Content type to store.
    pub content_type: Option<&'a str>,
    /// User-defined metadata.
    pub metadata: Vec<(&'a str, &'a str)>,
}

impl<'a> PutObject<'a> {
    /// A plain put with no content type or metadata.
    pub fn new(bucket: &'a str, key: &'a str, body: impl Into<Bytes>) -> Self {
        Self { bucket, key, body: body.into(), content_type: None, metadata: Vec::new() }
    }

    /// Sets the content type.
    #[must_use]
    pub fn content_type(mut self, content_type: &'a str) -> Self {
        self.content_type = Some(content_type);
        self
    }

    /// Adds one user metadata entry.
    #[must_use]
    pub fn metadata(mut self, name: &'a str, value: &'a str) -> Self {
        self.metadata.push((name, value));
        self
    }
}

/// Client for the object-storage and identity services under test.
///
/// Implementations return [`s3conform_core::Error::Service`] for structured
/// service errors so that callers can classify denials and not-found errors.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Returns a short name for log output.
    fn name(&self) -> &str;

    /// Returns a transport of the same kind that signs with `credential`.
    fn with_credentials(&self, credential: &ScopedCredential) -> Result<Arc<dyn Transport>>;

    // Buckets

    /// Creates a bucket.
    async fn create_bucket(&self, bucket: &str) -> Result<()>;

    /// Checks that a bucket exists and is accessible.
    async fn head_bucket(&self, bucket: &str) -> Result<()>;

    /// Lists the names of all buckets visible to the caller.
    async fn list_buckets(&self) -> Result<Vec<String>>;

    /// Deletes an empty bucket.
    async fn delete_bucket(&self, bucket: &str) -> Result<()>;

    // Objects

    /// Stores an object and returns its ETag, if any.
    async fn put_object(&self, request: PutObject<'_>) -> Result<Option<String>>;

    /// Reads an object.
    async fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectData>;

    /// Reads an object's headers.
    async fn head_object(&self, bucket: &str, key: &str) -> Result<ObjectHead>;

    /// Lists object keys under `prefix` (list-objects-v2).
    async fn list_objects_v2(&self, bucket: &str, prefix: Option<&str>) -> Result<Vec<String>>;

    /// Deletes an object.
    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()>;

    /// Server-side copy of `src_bucket/src_key` to `dst_bucket/dst_key`.
    async fn copy_object(
        &self,
        src_bucket: &str,
        src_key: &str,
        dst_bucket: &str,
        dst_key: &str,
    ) -> Result<()>;

    // Multipart uploads

    /// Initiates a multipart upload and returns its upload id.
    async fn create_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        content_type: Option<&str>,
    ) -> Result<String>;

    /// Uploads one part and returns its ETag.
    async fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: i32,
        body: Bytes,
    ) -> Result<String>;

    /// Completes an upload from ordered `(part_number, etag)` pairs.
    async fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: &[(i32, String)],
    ) -> Result<()>;

    /// Aborts an upload.
    async fn abort_multipart_upload(&self, bucket: &str, key: &str, upload_id: &str)
        -> Result<()>;

    // Access keys

    /// Issues a new access key for the caller.
    async fn create_access_key(&self) -> Result<ScopedCredential>;

    /// Lists the caller's access keys.
    async fn list_access_keys(&self) -> Result<Vec<AccessKeyInfo>>;

    /// Changes the status of an access key.
    async fn update_access_key(&self, access_key_id: &str, status: AccessKeyStatus) -> Result<()>;

    /// Deletes an access key.
    async fn delete_access_key(&self, access_key_id: &str) -> Result<()>;

    // Policies

    /// Creates a managed policy and returns its ARN.
    ///
    /// `Ok(None)` means the service reported success without an ARN.
    async fn create_policy(
        &self,
        name: &str,
        document: &str,
        description: &str,
    ) -> Result<Option<String>>;

    /// Deletes a managed policy.
    async fn delete_policy(&self, policy_arn: &str) -> Result<()>;

    /// Attaches a policy to a user.
    async fn attach_user_policy(&self, user: &str, policy_arn: &str) -> Result<()>;

    /// Lists the ARNs of policies attached to a user.
    async fn list_attached_user_policies(&self, user: &str) -> Result<Vec<String>>;

    /// Detaches a policy from a user.
    async fn detach_user_policy(&self, user: &str, policy_arn: &str) -> Result<()>;
}
