//! [`Transport`] backed by the AWS SDK S3 and IAM clients.

use std::sync::Arc;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_iam::types::StatusType;
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::config::{Region, RequestChecksumCalculation, ResponseChecksumValidation};
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use bytes::Bytes;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use s3conform_core::{
    code_for_status, AccessKeyStatus, AddressingStyle, Error, HarnessConfig, Result,
    ScopedCredential,
};
use tracing::debug;

use crate::transport::{AccessKeyInfo, ObjectData, ObjectHead, PutObject, Transport};

/// Provider name recorded on SDK credentials.
const PROVIDER_NAME: &str = "s3conform";

/// Characters escaped in the copy-source header; `/` separates bucket and key.
const COPY_SOURCE: &AsciiSet =
    &NON_ALPHANUMERIC.remove(b'/').remove(b'-').remove(b'_').remove(b'.').remove(b'~');

/// Maps an SDK error onto the harness error taxonomy.
fn sdk_error<E>(operation: &'static str, err: SdkError<E, HttpResponse>) -> Error
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    match &err {
        SdkError::ServiceError(ctx) => {
            let status = ctx.raw().status().as_u16();
            let code = ctx.err().code().map_or_else(|| code_for_status(status), str::to_string);
            let message = ctx.err().message().unwrap_or_default().to_string();
            Error::Service { operation, code, message, status: Some(status) }
        }
        _ => Error::Dispatch { operation, message: DisplayErrorContext(&err).to_string() },
    }
}

/// S3 and IAM clients signing with one credential pair.
#[derive(Clone)]
pub struct AwsTransport {
    s3: aws_sdk_s3::Client,
    iam: aws_sdk_iam::Client,
    config: Arc<HarnessConfig>,
    label: String,
}

impl AwsTransport {
    /// Builds clients for the configured endpoints using the static credentials.
    pub fn new(config: Arc<HarnessConfig>) -> Self {
        let creds = &config.credentials;
        let credentials = Credentials::new(
            &creds.access_key_id,
            &creds.secret_access_key,
            None,
            None,
            PROVIDER_NAME,
        );
        Self::with_sdk_credentials(config, credentials, "aws")
    }

    fn with_sdk_credentials(
        config: Arc<HarnessConfig>,
        credentials: Credentials,
        label: &str,
    ) -> Self {
        let mut s3_config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .endpoint_url(&config.endpoint)
            .credentials_provider(credentials.clone())
            .request_checksum_calculation(RequestChecksumCalculation::WhenRequired)
            .response_checksum_validation(ResponseChecksumValidation::WhenRequired);
        match config.addressing_style {
            AddressingStyle::Path => s3_config = s3_config.force_path_style(true),
            AddressingStyle::Virtual => s3_config = s3_config.force_path_style(false),
            AddressingStyle::Auto => {}
        }

        let iam_config = aws_sdk_iam::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(aws_sdk_iam::config::Region::new(config.region.clone()))
            .endpoint_url(config.iam_endpoint())
            .credentials_provider(credentials)
            .build();

        debug!(
            endpoint = %config.endpoint,
            iam_endpoint = %config.iam_endpoint(),
            region = %config.region,
            addressing = %config.addressing_style,
            "Built SDK clients"
        );

        Self {
            s3: aws_sdk_s3::Client::from_conf(s3_config.build()),
            iam: aws_sdk_iam::Client::from_conf(iam_config),
            config,
            label: label.to_string(),
        }
    }
}

#[async_trait]
impl Transport for AwsTransport {
    fn name(&self) -> &str {
        &self.label
    }

    fn with_credentials(&self, credential: &ScopedCredential) -> Result<Arc<dyn Transport>> {
        let credentials = Credentials::new(
            &credential.access_key_id,
            &credential.secret_key,
            None,
            None,
            PROVIDER_NAME,
        );
        let config = Arc::clone(&self.config);
        Ok(Arc::new(Self::with_sdk_credentials(config, credentials, "aws-scoped")))
    }

    async fn create_bucket(&self, bucket: &str) -> Result<()> {
        self.s3
            .create_bucket()
            .bucket(bucket)
            .send()
            .await
            .map_err(|e| sdk_error("CreateBucket", e))?;
        Ok(())
    }

    async fn head_bucket(&self, bucket: &str) -> Result<()> {
        self.s3.head_bucket().bucket(bucket).send().await.map_err(|e| sdk_error("HeadBucket", e))?;
        Ok(())
    }

    async fn list_buckets(&self) -> Result<Vec<String>> {
        let output = self.s3.list_buckets().send().await.map_err(|e| sdk_error("ListBuckets", e))?;
        Ok(output.buckets().iter().filter_map(|b| b.name().map(str::to_string)).collect())
    }

    async fn delete_bucket(&self, bucket: &str) -> Result<()> {
        self.s3
            .delete_bucket()
            .bucket(bucket)
            .send()
            .await
            .map_err(|e| sdk_error("DeleteBucket", e))?;
        Ok(())
    }

    async fn put_object(&self, request: PutObject<'_>) -> Result<Option<String>> {
        let mut builder = self
            .s3
            .put_object()
            .bucket(request.bucket)
            .key(request.key)
            .body(ByteStream::from(request.body))
            .set_content_type(request.content_type.map(str::to_string));
        for (name, value) in &request.metadata {
            builder = builder.metadata(*name, *value);
        }
        let output = builder.send().await.map_err(|e| sdk_error("PutObject", e))?;
        Ok(output.e_tag().map(str::to_string))
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectData> {
        let output = self
            .s3
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| sdk_error("GetObject", e))?;

        let content_type = output.content_type().map(str::to_string);
        let metadata = output.metadata().cloned().unwrap_or_default();
        let etag = output.e_tag().map(str::to_string);
        let body = output.body.collect().await.map_err(|e| Error::Dispatch {
            operation: "GetObject",
            message: format!("failed to read body: {e}"),
        })?;

        Ok(ObjectData { body: body.into_bytes(), content_type, metadata, etag })
    }

    async fn head_object(&self, bucket: &str, key: &str) -> Result<ObjectHead> {
        let output = self
            .s3
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| sdk_error("HeadObject", e))?;
        Ok(ObjectHead {
            content_length: output.content_length(),
            content_type: output.content_type().map(str::to_string),
            etag: output.e_tag().map(str::to_string),
        })
    }

    async fn list_objects_v2(&self, bucket: &str, prefix: Option<&str>) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let output = self
                .s3
                .list_objects_v2()
                .bucket(bucket)
                .set_prefix(prefix.map(str::to_string))
                .set_continuation_token(token.take())
                .send()
                .await
                .map_err(|e| sdk_error("ListObjectsV2", e))?;

            keys.extend(output.contents().iter().filter_map(|o| o.key().map(str::to_string)));

            match output.next_continuation_token() {
                Some(next) if output.is_truncated().unwrap_or(false) => {
                    token = Some(next.to_string());
                }
                _ => break,
            }
        }
        Ok(keys)
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
        self.s3
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| sdk_error("DeleteObject", e))?;
        Ok(())
    }

    async fn copy_object(
        &self,
        src_bucket: &str,
        src_key: &str,
        dst_bucket: &str,
        dst_key: &str,
    ) -> Result<()> {
        let source = format!("{src_bucket}/{src_key}");
        let source = utf8_percent_encode(&source, COPY_SOURCE).to_string();
        self.s3
            .copy_object()
            .copy_source(source)
            .bucket(dst_bucket)
            .key(dst_key)
            .send()
            .await
            .map_err(|e| sdk_error("CopyObject", e))?;
        Ok(())
    }

    async fn create_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        content_type: Option<&str>,
    ) -> Result<String> {
        let output = self
            .s3
            .create_multipart_upload()
            .bucket(bucket)
            .key(key)
            .set_content_type(content_type.map(str::to_string))
            .send()
            .await
            .map_err(|e| sdk_error("CreateMultipartUpload", e))?;
        output
            .upload_id()
            .map(str::to_string)
            .ok_or_else(|| Error::malformed("CreateMultipartUpload", "missing upload id"))
    }

    async fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: i32,
        body: Bytes,
    ) -> Result<String> {
        let output = self
            .s3
            .upload_part()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .part_number(part_number)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| sdk_error("UploadPart", e))?;
        output
            .e_tag()
            .map(str::to_string)
            .ok_or_else(|| {
                Error::malformed("UploadPart", format!("part {part_number} has no ETag"))
            })
    }

    async fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: &[(i32, String)],
    ) -> Result<()> {
        let completed: Vec<CompletedPart> = parts
            .iter()
            .map(|(number, etag)| CompletedPart::builder().part_number(*number).e_tag(etag).build())
            .collect();
        let upload = CompletedMultipartUpload::builder().set_parts(Some(completed)).build();

        self.s3
            .complete_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .multipart_upload(upload)
            .send()
            .await
            .map_err(|e| sdk_error("CompleteMultipartUpload", e))?;
        Ok(())
    }

    async fn abort_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
    ) -> Result<()> {
        self.s3
            .abort_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .send()
            .await
            .map_err(|e| sdk_error("AbortMultipartUpload", e))?;
        Ok(())
    }

    async fn create_access_key(&self) -> Result<ScopedCredential> {
        let output = self
            .iam
            .create_access_key()
            .send()
            .await
            .map_err(|e| sdk_error("CreateAccessKey", e))?;
        let key = output
            .access_key()
            .ok_or_else(|| Error::malformed("CreateAccessKey", "missing access key"))?;
        if key.access_key_id().is_empty() {
            return Err(Error::malformed("CreateAccessKey", "missing access key id"));
        }
        Ok(ScopedCredential::new(key.access_key_id(), key.secret_access_key()))
    }

    async fn list_access_keys(&self) -> Result<Vec<AccessKeyInfo>> {
        let output = self
            .iam
            .list_access_keys()
            .send()
            .await
            .map_err(|e| sdk_error("ListAccessKeys", e))?;
        Ok(output
            .access_key_metadata()
            .iter()
            .filter_map(|meta| {
                let access_key_id = meta.access_key_id()?.to_string();
                let status = match meta.status() {
                    Some(StatusType::Inactive) => AccessKeyStatus::Inactive,
                    _ => AccessKeyStatus::Active,
                };
                Some(AccessKeyInfo { access_key_id, status })
            })
            .collect())
    }

    async fn update_access_key(&self, access_key_id: &str, status: AccessKeyStatus) -> Result<()> {
        let status = match status {
            AccessKeyStatus::Active => StatusType::Active,
            AccessKeyStatus::Inactive => StatusType::Inactive,
        };
        self.iam
            .update_access_key()
            .access_key_id(access_key_id)
            .status(status)
            .send()
            .await
            .map_err(|e| sdk_error("UpdateAccessKey", e))?;
        Ok(())
    }

    async fn delete_access_key(&self, access_key_id: &str) -> Result<()> {
        self.iam
            .delete_access_key()
            .access_key_id(access_key_id)
            .send()
            .await
            .map_err(|e| sdk_error("DeleteAccessKey", e))?;
        Ok(())
    }

    async fn create_policy(
        &self,
        name: &str,
        document: &str,
        description: &str,
    ) -> Result<Option<String>> {
        let output = self
            .iam
            .create_policy()
            .policy_name(name)
            .policy_document(document)
            .description(description)
            .send()
            .await
            .map_err(|e| sdk_error("CreatePolicy", e))?;
        Ok(output.policy().and_then(|p| p.arn()).map(str::to_string))
    }

    async fn delete_policy(&self, policy_arn: &str) -> Result<()> {
        self.iam
            .delete_policy()
            .policy_arn(policy_arn)
            .send()
            .await
            .map_err(|e| sdk_error("DeletePolicy", e))?;
        Ok(())
    }

    async fn attach_user_policy(&self, user: &str, policy_arn: &str) -> Result<()> {
        self.iam
            .attach_user_policy()
            .user_name(user)
            .policy_arn(policy_arn)
            .send()
            .await
            .map_err(|e| sdk_error("AttachUserPolicy", e))?;
        Ok(())
    }

    async fn list_attached_user_policies(&self, user: &str) -> Result<Vec<String>> {
        let output = self
            .iam
            .list_attached_user_policies()
            .user_name(user)
            .send()
            .await
            .map_err(|e| sdk_error("ListAttachedUserPolicies", e))?;
        Ok(output
            .attached_policies()
            .iter()
            .filter_map(|p| p.policy_arn().map(str::to_string))
            .collect())
    }

    async fn detach_user_policy(&self, user: &str, policy_arn: &str) -> Result<()> {
        self.iam
            .detach_user_policy()
            .user_name(user)
            .policy_arn(policy_arn)
            .send()
            .await
            .map_err(|e| sdk_error("DetachUserPolicy", e))?;
        Ok(())
    }
}
