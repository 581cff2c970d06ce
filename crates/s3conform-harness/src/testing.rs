//! In-memory object-storage and identity service for exercising scenarios
//! without a network.
//!
//! [`InMemoryService`] implements [`Transport`] against shared state, so a
//! scoped view from [`Transport::with_credentials`] sees the same buckets as
//! the unscoped one. Scoped requests are authorized by evaluating the
//! policies attached to the signing key.
//!
//! Faults are injected per operation with [`InMemoryService::fail_on`], and
//! misbehaving services are modelled through [`Quirks`].
//!
//! ```ignore
//! use s3conform_harness::testing::{InMemoryService, Op};
//!
//! let service = InMemoryService::new();
//! service.fail_on(Op::PutObject, Error::service("PutObject", "SlowDown", "busy"));
//! // The next put fails; later ones succeed.
//! ```

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use parking_lot::Mutex;
use s3conform_core::policy::{bucket_arn, object_arn, PolicyDecision};
use s3conform_core::{
    AccessKeyStatus, Error, PolicyDocument, Result, ScopedCredential, MIN_PART_SIZE,
};
use tracing::trace;

use crate::transport::{AccessKeyInfo, ObjectData, ObjectHead, PutObject, Transport};

/// Account id used in generated policy ARNs.
const ACCOUNT_ID: &str = "000000000000";

/// Operations understood by the in-memory service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    /// `CreateBucket`.
    CreateBucket,
    /// `HeadBucket`.
    HeadBucket,
    /// `ListBuckets`.
    ListBuckets,
    /// `DeleteBucket`.
    DeleteBucket,
    /// `PutObject`.
    PutObject,
    /// `GetObject`.
    GetObject,
    /// `HeadObject`.
    HeadObject,
    /// `ListObjectsV2`.
    ListObjectsV2,
    /// `DeleteObject`.
    DeleteObject,
    /// `CopyObject`.
    CopyObject,
    /// `CreateMultipartUpload`.
    CreateMultipartUpload,
    /// `UploadPart`.
    UploadPart,
    /// `CompleteMultipartUpload`.
    CompleteMultipartUpload,
    /// `AbortMultipartUpload`.
    AbortMultipartUpload,
    /// `CreateAccessKey`.
    CreateAccessKey,
    /// `ListAccessKeys`.
    ListAccessKeys,
    /// `UpdateAccessKey`.
    UpdateAccessKey,
    /// `DeleteAccessKey`.
    DeleteAccessKey,
    /// `CreatePolicy`.
    CreatePolicy,
    /// `DeletePolicy`.
    DeletePolicy,
    /// `AttachUserPolicy`.
    AttachUserPolicy,
    /// `ListAttachedUserPolicies`.
    ListAttachedUserPolicies,
    /// `DetachUserPolicy`.
    DetachUserPolicy,
}

impl Op {
    /// Returns the API operation name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::CreateBucket => "CreateBucket",
            Self::HeadBucket => "HeadBucket",
            Self::ListBuckets => "ListBuckets",
            Self::DeleteBucket => "DeleteBucket",
            Self::PutObject => "PutObject",
            Self::GetObject => "GetObject",
            Self::HeadObject => "HeadObject",
            Self::ListObjectsV2 => "ListObjectsV2",
            Self::DeleteObject => "DeleteObject",
            Self::CopyObject => "CopyObject",
            Self::CreateMultipartUpload => "CreateMultipartUpload",
            Self::UploadPart => "UploadPart",
            Self::CompleteMultipartUpload => "CompleteMultipartUpload",
            Self::AbortMultipartUpload => "AbortMultipartUpload",
            Self::CreateAccessKey => "CreateAccessKey",
            Self::ListAccessKeys => "ListAccessKeys",
            Self::UpdateAccessKey => "UpdateAccessKey",
            Self::DeleteAccessKey => "DeleteAccessKey",
            Self::CreatePolicy => "CreatePolicy",
            Self::DeletePolicy => "DeletePolicy",
            Self::AttachUserPolicy => "AttachUserPolicy",
            Self::ListAttachedUserPolicies => "ListAttachedUserPolicies",
            Self::DetachUserPolicy => "DetachUserPolicy",
        }
    }
}

/// Deviations from standard service behavior, for driving failure paths.
#[derive(Debug, Clone)]
pub struct Quirks {
    /// Authorize scoped requests against attached policies.
    pub enforce_policies: bool,
    /// Error code returned when a scoped request is refused.
    pub denial_code: String,
    /// Report policy creation success without an ARN.
    pub omit_policy_arn: bool,
    /// Issue access keys with an empty secret.
    pub omit_secret: bool,
    /// Hide issued access keys from list calls.
    pub hide_access_keys: bool,
    /// Hide buckets from list-buckets.
    pub hide_buckets: bool,
    /// Hide policy attachments from list-attached-user-policies.
    pub hide_attachments: bool,
    /// Hide objects from list-objects-v2.
    pub hide_listed_objects: bool,
    /// Drop the last byte of every object body on read.
    pub truncate_reads: bool,
    /// Report this content length on head-object instead of the real one.
    pub head_length_override: Option<i64>,
}

impl Default for Quirks {
    fn default() -> Self {
        Self {
            enforce_policies: true,
            denial_code: "AccessDenied".to_string(),
            omit_policy_arn: false,
            omit_secret: false,
            hide_access_keys: false,
            hide_buckets: false,
            hide_attachments: false,
            hide_listed_objects: false,
            truncate_reads: false,
            head_length_override: None,
        }
    }
}

#[derive(Debug, Clone)]
struct StoredObject {
    body: Bytes,
    content_type: Option<String>,
    metadata: HashMap<String, String>,
    etag: String,
}

#[derive(Debug)]
struct Upload {
    bucket: String,
    key: String,
    content_type: Option<String>,
    parts: BTreeMap<i32, (Bytes, String)>,
}

#[derive(Debug)]
struct KeyEntry {
    secret: String,
    status: AccessKeyStatus,
}

#[derive(Debug, Default)]
struct State {
    buckets: BTreeMap<String, BTreeMap<String, StoredObject>>,
    uploads: HashMap<String, Upload>,
    access_keys: BTreeMap<String, KeyEntry>,
    policies: BTreeMap<String, PolicyDocument>,
    attachments: BTreeMap<String, Vec<String>>,
    faults: HashMap<Op, VecDeque<Error>>,
    calls: Vec<Op>,
    quirks: Quirks,
    counter: u64,
}

impl State {
    fn next_id(&mut self) -> u64 {
        self.counter += 1;
        self.counter
    }

    fn next_etag(&mut self) -> String {
        format!("\"{:032x}\"", self.next_id())
    }

    fn bucket(&self, op: Op, bucket: &str) -> Result<&BTreeMap<String, StoredObject>> {
        self.buckets.get(bucket).ok_or_else(|| no_such_bucket(op, bucket))
    }

    fn bucket_mut(
        &mut self,
        op: Op,
        bucket: &str,
    ) -> Result<&mut BTreeMap<String, StoredObject>> {
        self.buckets.get_mut(bucket).ok_or_else(|| no_such_bucket(op, bucket))
    }

    fn object(&self, op: Op, bucket: &str, key: &str) -> Result<&StoredObject> {
        self.bucket(op, bucket)?.get(key).ok_or_else(|| {
            if op == Op::HeadObject {
                status_error(op, "NotFound", "Not Found", 404)
            } else {
                status_error(op, "NoSuchKey", &format!("no such key: {key}"), 404)
            }
        })
    }
}

#[derive(Debug, Clone)]
enum Principal {
    Root,
    Scoped { access_key_id: String, secret: String },
}

/// An in-memory S3 and IAM service.
///
/// Cloning yields another handle to the same state and principal.
#[derive(Debug, Clone)]
pub struct InMemoryService {
    state: Arc<Mutex<State>>,
    principal: Principal,
    user_name: Arc<str>,
}

impl Default for InMemoryService {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryService {
    /// Creates an empty service whose root principal is the user `s3conform`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_quirks(Quirks::default())
    }

    /// Creates an empty service with the given quirks.
    #[must_use]
    pub fn with_quirks(quirks: Quirks) -> Self {
        Self {
            state: Arc::new(Mutex::new(State { quirks, ..State::default() })),
            principal: Principal::Root,
            user_name: Arc::from("s3conform"),
        }
    }

    /// Name of the user that owns issued access keys.
    #[must_use]
    pub fn user_name(&self) -> &str {
        &self.user_name
    }

    /// Makes the next call of `op` fail with `error`. Repeated calls queue errors.
    pub fn fail_on(&self, op: Op, error: Error) {
        self.state.lock().faults.entry(op).or_default().push_back(error);
    }

    /// Replaces the quirks.
    pub fn set_quirks(&self, quirks: Quirks) {
        self.state.lock().quirks = quirks;
    }

    /// Returns every operation invoked so far, scoped views included.
    #[must_use]
    pub fn calls(&self) -> Vec<Op> {
        self.state.lock().calls.clone()
    }

    /// Forgets the recorded calls.
    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    /// Returns true if no resource of any kind exists.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        let state = self.state.lock();
        state.buckets.is_empty()
            && state.uploads.is_empty()
            && state.access_keys.is_empty()
            && state.policies.is_empty()
            && state.attachments.values().all(Vec::is_empty)
    }

    /// Returns the names of existing buckets.
    #[must_use]
    pub fn bucket_names(&self) -> Vec<String> {
        self.state.lock().buckets.keys().cloned().collect()
    }

    /// Returns the ids of existing access keys.
    #[must_use]
    pub fn access_key_ids(&self) -> Vec<String> {
        self.state.lock().access_keys.keys().cloned().collect()
    }

    /// Returns the number of in-progress multipart uploads.
    #[must_use]
    pub fn open_uploads(&self) -> usize {
        self.state.lock().uploads.len()
    }

    /// Records the call, pops an injected fault and authorizes the principal.
    fn begin(&self, op: Op, requests: &[(&str, String)]) -> Result<()> {
        let mut state = self.state.lock();
        state.calls.push(op);
        trace!(operation = op.name(), "In-memory call");

        if let Some(err) = state.faults.get_mut(&op).and_then(VecDeque::pop_front) {
            return Err(err);
        }

        let Principal::Scoped { access_key_id, secret } = &self.principal else {
            return Ok(());
        };
        match state.access_keys.get(access_key_id) {
            Some(entry) if entry.status == AccessKeyStatus::Active => {
                if entry.secret != *secret {
                    return Err(status_error(
                        op,
                        "SignatureDoesNotMatch",
                        "signature does not match",
                        403,
                    ));
                }
            }
            _ => {
                return Err(status_error(
                    op,
                    "InvalidAccessKeyId",
                    "the access key id is not valid",
                    403,
                ))
            }
        }

        if !state.quirks.enforce_policies {
            return Ok(());
        }
        let allowed = requests.iter().all(|(action, resource)| {
            let mut decision = false;
            for principal in [access_key_id.as_str(), &*self.user_name] {
                for arn in state.attachments.get(principal).into_iter().flatten() {
                    let Some(doc) = state.policies.get(arn) else { continue };
                    match doc.evaluate(action, resource) {
                        PolicyDecision::Deny => return false,
                        PolicyDecision::Allow => decision = true,
                        PolicyDecision::DefaultDeny => {}
                    }
                }
            }
            decision
        });
        if allowed {
            Ok(())
        } else {
            Err(status_error(op, &state.quirks.denial_code, "Access Denied", 403))
        }
    }
}

fn status_error(op: Op, code: &str, message: &str, status: u16) -> Error {
    Error::Service {
        operation: op.name(),
        code: code.to_string(),
        message: message.to_string(),
        status: Some(status),
    }
}

fn no_such_bucket(op: Op, bucket: &str) -> Error {
    if op == Op::HeadBucket {
        status_error(op, "NotFound", "Not Found", 404)
    } else {
        status_error(op, "NoSuchBucket", &format!("no such bucket: {bucket}"), 404)
    }
}

fn no_such_entity(op: Op, what: &str) -> Error {
    status_error(op, "NoSuchEntity", &format!("{what} does not exist"), 404)
}

fn valid_bucket_name(name: &str) -> bool {
    (3..=63).contains(&name.len())
        && name
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-' || b == b'.')
        && name.starts_with(|c: char| c.is_ascii_alphanumeric())
        && name.ends_with(|c: char| c.is_ascii_alphanumeric())
}

const ANY: &str = "*";

#[async_trait]
impl Transport for InMemoryService {
    fn name(&self) -> &str {
        "in-memory"
    }

    fn with_credentials(&self, credential: &ScopedCredential) -> Result<Arc<dyn Transport>> {
        Ok(Arc::new(Self {
            state: Arc::clone(&self.state),
            principal: Principal::Scoped {
                access_key_id: credential.access_key_id.clone(),
                secret: credential.secret_key.clone(),
            },
            user_name: Arc::clone(&self.user_name),
        }))
    }

    async fn create_bucket(&self, bucket: &str) -> Result<()> {
        let op = Op::CreateBucket;
        self.begin(op, &[("s3:CreateBucket", bucket_arn(bucket))])?;
        if !valid_bucket_name(bucket) {
            return Err(status_error(op, "InvalidBucketName", "invalid bucket name", 400));
        }
        let mut state = self.state.lock();
        if state.buckets.contains_key(bucket) {
            return Err(status_error(op, "BucketAlreadyOwnedByYou", "bucket exists", 409));
        }
        state.buckets.insert(bucket.to_string(), BTreeMap::new());
        Ok(())
    }

    async fn head_bucket(&self, bucket: &str) -> Result<()> {
        let op = Op::HeadBucket;
        self.begin(op, &[("s3:ListBucket", bucket_arn(bucket))])?;
        self.state.lock().bucket(op, bucket).map(|_| ())
    }

    async fn list_buckets(&self) -> Result<Vec<String>> {
        self.begin(Op::ListBuckets, &[("s3:ListAllMyBuckets", "arn:aws:s3:::*".to_string())])?;
        if self.state.lock().quirks.hide_buckets {
            return Ok(Vec::new());
        }
        Ok(self.bucket_names())
    }

    async fn delete_bucket(&self, bucket: &str) -> Result<()> {
        let op = Op::DeleteBucket;
        self.begin(op, &[("s3:DeleteBucket", bucket_arn(bucket))])?;
        let mut state = self.state.lock();
        if !state.bucket(op, bucket)?.is_empty() {
            return Err(status_error(op, "BucketNotEmpty", "the bucket is not empty", 409));
        }
        state.buckets.remove(bucket);
        Ok(())
    }

    async fn put_object(&self, request: PutObject<'_>) -> Result<Option<String>> {
        let op = Op::PutObject;
        self.begin(op, &[("s3:PutObject", object_arn(request.bucket, request.key))])?;
        let mut state = self.state.lock();
        state.bucket(op, request.bucket)?;
        let etag = state.next_etag();
        let object = StoredObject {
            body: request.body,
            content_type: request.content_type.map(str::to_string),
            metadata: request
                .metadata
                .iter()
                .map(|(k, v)| (k.to_ascii_lowercase(), (*v).to_string()))
                .collect(),
            etag: etag.clone(),
        };
        state.bucket_mut(op, request.bucket)?.insert(request.key.to_string(), object);
        Ok(Some(etag))
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectData> {
        let op = Op::GetObject;
        self.begin(op, &[("s3:GetObject", object_arn(bucket, key))])?;
        let state = self.state.lock();
        let object = state.object(op, bucket, key)?;
        let mut body = object.body.clone();
        if state.quirks.truncate_reads && !body.is_empty() {
            body.truncate(body.len() - 1);
        }
        Ok(ObjectData {
            body,
            content_type: object.content_type.clone(),
            metadata: object.metadata.clone(),
            etag: Some(object.etag.clone()),
        })
    }

    async fn head_object(&self, bucket: &str, key: &str) -> Result<ObjectHead> {
        let op = Op::HeadObject;
        self.begin(op, &[("s3:GetObject", object_arn(bucket, key))])?;
        let state = self.state.lock();
        let object = state.object(op, bucket, key)?;
        let real = i64::try_from(object.body.len()).ok();
        Ok(ObjectHead {
            content_length: state.quirks.head_length_override.or(real),
            content_type: object.content_type.clone(),
            etag: Some(object.etag.clone()),
        })
    }

    async fn list_objects_v2(&self, bucket: &str, prefix: Option<&str>) -> Result<Vec<String>> {
        let op = Op::ListObjectsV2;
        self.begin(op, &[("s3:ListBucket", bucket_arn(bucket))])?;
        let state = self.state.lock();
        let objects = state.bucket(op, bucket)?;
        if state.quirks.hide_listed_objects {
            return Ok(Vec::new());
        }
        Ok(objects
            .keys()
            .filter(|k| prefix.map_or(true, |p| k.starts_with(p)))
            .cloned()
            .collect())
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
        let op = Op::DeleteObject;
        self.begin(op, &[("s3:DeleteObject", object_arn(bucket, key))])?;
        self.state.lock().bucket_mut(op, bucket)?.remove(key);
        Ok(())
    }

    async fn copy_object(
        &self,
        src_bucket: &str,
        src_key: &str,
        dst_bucket: &str,
        dst_key: &str,
    ) -> Result<()> {
        let op = Op::CopyObject;
        self.begin(
            op,
            &[
                ("s3:GetObject", object_arn(src_bucket, src_key)),
                ("s3:PutObject", object_arn(dst_bucket, dst_key)),
            ],
        )?;

        let mut state = self.state.lock();
        let mut object = state.object(op, src_bucket, src_key)?.clone();
        state.bucket(op, dst_bucket)?;
        object.etag = state.next_etag();
        state.bucket_mut(op, dst_bucket)?.insert(dst_key.to_string(), object);
        Ok(())
    }

    async fn create_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        content_type: Option<&str>,
    ) -> Result<String> {
        let op = Op::CreateMultipartUpload;
        self.begin(op, &[("s3:PutObject", object_arn(bucket, key))])?;
        let mut state = self.state.lock();
        state.bucket(op, bucket)?;
        let upload_id = format!("upload-{}", state.next_id());
        state.uploads.insert(
            upload_id.clone(),
            Upload {
                bucket: bucket.to_string(),
                key: key.to_string(),
                content_type: content_type.map(str::to_string),
                parts: BTreeMap::new(),
            },
        );
        Ok(upload_id)
    }

    async fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: i32,
        body: Bytes,
    ) -> Result<String> {
        let op = Op::UploadPart;
        self.begin(op, &[("s3:PutObject", object_arn(bucket, key))])?;
        if !(1..=10_000).contains(&part_number) {
            return Err(status_error(op, "InvalidArgument", "part number out of range", 400));
        }
        let mut state = self.state.lock();
        let etag = state.next_etag();
        let upload = state
            .uploads
            .get_mut(upload_id)
            .filter(|u| u.bucket == bucket && u.key == key)
            .ok_or_else(|| status_error(op, "NoSuchUpload", "no such upload", 404))?;
        upload.parts.insert(part_number, (body, etag.clone()));
        Ok(etag)
    }

    async fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: &[(i32, String)],
    ) -> Result<()> {
        let op = Op::CompleteMultipartUpload;
        self.begin(op, &[("s3:PutObject", object_arn(bucket, key))])?;
        let mut state = self.state.lock();
        let upload = state
            .uploads
            .get(upload_id)
            .filter(|u| u.bucket == bucket && u.key == key)
            .ok_or_else(|| status_error(op, "NoSuchUpload", "no such upload", 404))?;

        if parts.is_empty() {
            return Err(status_error(op, "MalformedXML", "no parts given", 400));
        }
        if parts.windows(2).any(|w| w[0].0 >= w[1].0) {
            return Err(status_error(op, "InvalidPartOrder", "parts must be ascending", 400));
        }

        let mut body = BytesMut::new();
        for (i, (number, etag)) in parts.iter().enumerate() {
            let Some((data, stored_etag)) = upload.parts.get(number) else {
                return Err(status_error(op, "InvalidPart", "part was not uploaded", 400));
            };
            if stored_etag != etag {
                return Err(status_error(op, "InvalidPart", "etag mismatch", 400));
            }
            let is_last = i + 1 == parts.len();
            if !is_last && (data.len() as u64) < MIN_PART_SIZE {
                return Err(status_error(op, "EntityTooSmall", "part below minimum size", 400));
            }
            body.extend_from_slice(data);
        }

        let content_type = upload.content_type.clone();
        let etag = format!("\"{:032x}-{}\"", state.next_id(), parts.len());
        state.uploads.remove(upload_id);
        let object = StoredObject {
            body: body.freeze(),
            content_type,
            metadata: HashMap::new(),
            etag,
        };
        state.bucket_mut(op, bucket)?.insert(key.to_string(), object);
        Ok(())
    }

    async fn abort_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
    ) -> Result<()> {
        let op = Op::AbortMultipartUpload;
        self.begin(op, &[("s3:AbortMultipartUpload", object_arn(bucket, key))])?;
        let mut state = self.state.lock();
        let matches =
            state.uploads.get(upload_id).is_some_and(|u| u.bucket == bucket && u.key == key);
        if !matches {
            return Err(status_error(op, "NoSuchUpload", "no such upload", 404));
        }
        state.uploads.remove(upload_id);
        Ok(())
    }

    async fn create_access_key(&self) -> Result<ScopedCredential> {
        self.begin(Op::CreateAccessKey, &[("iam:CreateAccessKey", ANY.to_string())])?;
        let mut state = self.state.lock();
        let access_key_id = format!("AKIAMEM{:013}", state.next_id());
        let secret = if state.quirks.omit_secret {
            String::new()
        } else {
            uuid::Uuid::new_v4().simple().to_string()
        };
        state.access_keys.insert(
            access_key_id.clone(),
            KeyEntry { secret: secret.clone(), status: AccessKeyStatus::Active },
        );
        Ok(ScopedCredential::new(access_key_id, secret))
    }

    async fn list_access_keys(&self) -> Result<Vec<AccessKeyInfo>> {
        self.begin(Op::ListAccessKeys, &[("iam:ListAccessKeys", ANY.to_string())])?;
        let state = self.state.lock();
        if state.quirks.hide_access_keys {
            return Ok(Vec::new());
        }
        Ok(state
            .access_keys
            .iter()
            .map(|(id, entry)| AccessKeyInfo { access_key_id: id.clone(), status: entry.status })
            .collect())
    }

    async fn update_access_key(&self, access_key_id: &str, status: AccessKeyStatus) -> Result<()> {
        let op = Op::UpdateAccessKey;
        self.begin(op, &[("iam:UpdateAccessKey", ANY.to_string())])?;
        let mut state = self.state.lock();
        let entry = state
            .access_keys
            .get_mut(access_key_id)
            .ok_or_else(|| no_such_entity(op, "access key"))?;
        entry.status = status;
        Ok(())
    }

    async fn delete_access_key(&self, access_key_id: &str) -> Result<()> {
        let op = Op::DeleteAccessKey;
        self.begin(op, &[("iam:DeleteAccessKey", ANY.to_string())])?;
        self.state
            .lock()
            .access_keys
            .remove(access_key_id)
            .map(|_| ())
            .ok_or_else(|| no_such_entity(op, "access key"))
    }

    async fn create_policy(
        &self,
        name: &str,
        document: &str,
        _description: &str,
    ) -> Result<Option<String>> {
        let op = Op::CreatePolicy;
        self.begin(op, &[("iam:CreatePolicy", ANY.to_string())])?;
        let doc = PolicyDocument::from_json(document)
            .map_err(|e| status_error(op, "MalformedPolicyDocument", &e.to_string(), 400))?;
        doc.validate().map_err(|e| status_error(op, "MalformedPolicyDocument", &e, 400))?;

        let arn = format!("arn:aws:iam::{ACCOUNT_ID}:policy/{name}");
        let mut state = self.state.lock();
        if state.policies.contains_key(&arn) {
            return Err(status_error(op, "EntityAlreadyExists", "policy exists", 409));
        }
        state.policies.insert(arn.clone(), doc);
        Ok((!state.quirks.omit_policy_arn).then_some(arn))
    }

    async fn delete_policy(&self, policy_arn: &str) -> Result<()> {
        let op = Op::DeletePolicy;
        self.begin(op, &[("iam:DeletePolicy", ANY.to_string())])?;
        let mut state = self.state.lock();
        if !state.policies.contains_key(policy_arn) {
            return Err(no_such_entity(op, "policy"));
        }
        if state.attachments.values().any(|arns| arns.iter().any(|a| a == policy_arn)) {
            return Err(status_error(op, "DeleteConflict", "policy is still attached", 409));
        }
        state.policies.remove(policy_arn);
        Ok(())
    }

    async fn attach_user_policy(&self, user: &str, policy_arn: &str) -> Result<()> {
        let op = Op::AttachUserPolicy;
        self.begin(op, &[("iam:AttachUserPolicy", ANY.to_string())])?;
        let mut state = self.state.lock();
        if !state.policies.contains_key(policy_arn) {
            return Err(no_such_entity(op, "policy"));
        }
        let known_user = user == &*self.user_name || state.access_keys.contains_key(user);
        if !known_user {
            return Err(no_such_entity(op, "user"));
        }
        let attached = state.attachments.entry(user.to_string()).or_default();
        if !attached.iter().any(|a| a == policy_arn) {
            attached.push(policy_arn.to_string());
        }
        Ok(())
    }

    async fn list_attached_user_policies(&self, user: &str) -> Result<Vec<String>> {
        let op = Op::ListAttachedUserPolicies;
        self.begin(op, &[("iam:ListAttachedUserPolicies", ANY.to_string())])?;
        let state = self.state.lock();
        if state.quirks.hide_attachments {
            return Ok(Vec::new());
        }
        Ok(state.attachments.get(user).cloned().unwrap_or_default())
    }

    async fn detach_user_policy(&self, user: &str, policy_arn: &str) -> Result<()> {
        let op = Op::DetachUserPolicy;
        self.begin(op, &[("iam:DetachUserPolicy", ANY.to_string())])?;
        let mut state = self.state.lock();
        let Some(arns) = state.attachments.get_mut(user) else {
            return Err(no_such_entity(op, "attachment"));
        };
        let Some(index) = arns.iter().position(|a| a == policy_arn) else {
            return Err(no_such_entity(op, "attachment"));
        };
        arns.remove(index);
        if arns.is_empty() {
            state.attachments.remove(user);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIB: usize = 1024 * 1024;

    #[tokio::test]
    async fn test_bucket_lifecycle() {
        let service = InMemoryService::new();
        service.create_bucket("b-1").await.unwrap();
        service.head_bucket("b-1").await.unwrap();
        assert_eq!(service.list_buckets().await.unwrap(), vec!["b-1"]);

        let err = service.head_bucket("missing").await.unwrap_err();
        assert_eq!(err.code(), Some("NotFound"));
        assert!(err.is_not_found());

        service.put_object(PutObject::new("b-1", "k", "v")).await.unwrap();
        let err = service.delete_bucket("b-1").await.unwrap_err();
        assert_eq!(err.code(), Some("BucketNotEmpty"));

        service.delete_object("b-1", "k").await.unwrap();
        service.delete_bucket("b-1").await.unwrap();
        assert!(service.is_empty());
    }

    #[tokio::test]
    async fn test_object_metadata_and_listing() {
        let service = InMemoryService::new();
        service.create_bucket("bkt").await.unwrap();
        let request = PutObject::new("bkt", "folder/a.txt", "abc")
            .content_type("text/plain")
            .metadata("Owner", "examples");
        service.put_object(request).await.unwrap();
        service.put_object(PutObject::new("bkt", "other.txt", "x")).await.unwrap();

        let data = service.get_object("bkt", "folder/a.txt").await.unwrap();
        assert_eq!(&data.body[..], b"abc");
        assert_eq!(data.content_type.as_deref(), Some("text/plain"));
        assert_eq!(data.metadata.get("owner").map(String::as_str), Some("examples"));

        let head = service.head_object("bkt", "folder/a.txt").await.unwrap();
        assert_eq!(head.content_length, Some(3));

        let keys = service.list_objects_v2("bkt", Some("folder/")).await.unwrap();
        assert_eq!(keys, vec!["folder/a.txt"]);
    }

    #[tokio::test]
    async fn test_multipart_rules() {
        let service = InMemoryService::new();
        service.create_bucket("mpu").await.unwrap();
        let id = service
            .create_multipart_upload("mpu", "k", Some("application/octet-stream"))
            .await
            .unwrap();

        let big = Bytes::from(vec![b'a'; MIB]);
        let e1 = service.upload_part("mpu", "k", &id, 1, big).await.unwrap();
        let e2 = service.upload_part("mpu", "k", &id, 2, Bytes::from_static(b"b")).await.unwrap();

        let err = service
            .complete_multipart_upload("mpu", "k", &id, &[(2, e2.clone()), (1, e1.clone())])
            .await
            .unwrap_err();
        assert_eq!(err.code(), Some("InvalidPartOrder"));

        let err = service
            .complete_multipart_upload("mpu", "k", &id, &[(1, e1.clone()), (2, e2.clone())])
            .await
            .unwrap_err();
        assert_eq!(err.code(), Some("EntityTooSmall"));

        service.abort_multipart_upload("mpu", "k", &id).await.unwrap();
        let err = service.abort_multipart_upload("mpu", "k", &id).await.unwrap_err();
        assert_eq!(err.code(), Some("NoSuchUpload"));
        assert_eq!(service.open_uploads(), 0);
    }

    #[tokio::test]
    async fn test_scoped_credentials_follow_attached_policy() {
        let service = InMemoryService::new();
        service.create_bucket("allowed").await.unwrap();
        let cred = service.create_access_key().await.unwrap();

        let doc = PolicyDocument::bucket_scoped("allowed").to_json_pretty().unwrap();
        let arn = service.create_policy("p", &doc, "test").await.unwrap().unwrap();
        service.attach_user_policy(&cred.access_key_id, &arn).await.unwrap();

        let scoped = service.with_credentials(&cred).unwrap();
        scoped.head_bucket("allowed").await.unwrap();
        scoped.put_object(PutObject::new("allowed", "k", "v")).await.unwrap();

        let err = scoped.create_bucket("elsewhere").await.unwrap_err();
        assert_eq!(err.code(), Some("AccessDenied"));
        assert!(err.is_access_denied());

        service.update_access_key(&cred.access_key_id, AccessKeyStatus::Inactive).await.unwrap();
        let err = scoped.head_bucket("allowed").await.unwrap_err();
        assert_eq!(err.code(), Some("InvalidAccessKeyId"));
    }

    #[tokio::test]
    async fn test_policy_delete_conflicts_while_attached() {
        let service = InMemoryService::new();
        let doc = PolicyDocument::bucket_scoped("b").to_json_pretty().unwrap();
        let arn = service.create_policy("p", &doc, "").await.unwrap().unwrap();
        service.attach_user_policy("s3conform", &arn).await.unwrap();

        let err = service.delete_policy(&arn).await.unwrap_err();
        assert_eq!(err.code(), Some("DeleteConflict"));

        service.detach_user_policy("s3conform", &arn).await.unwrap();
        service.delete_policy(&arn).await.unwrap();
        assert!(service.is_empty());
    }

    #[tokio::test]
    async fn test_fault_injection_is_one_shot() {
        let service = InMemoryService::new();
        service.fail_on(Op::CreateBucket, Error::service("CreateBucket", "SlowDown", "busy"));

        let err = service.create_bucket("bkt").await.unwrap_err();
        assert_eq!(err.code(), Some("SlowDown"));
        service.create_bucket("bkt").await.unwrap();
        assert_eq!(service.calls(), vec![Op::CreateBucket, Op::CreateBucket]);
    }
}
