//! Bucket-scoped credential enforcement.
//!
//! Issues an access key, attaches a policy allowing `s3:*` on one bucket, and
//! checks that the key can use that bucket but cannot create another one.

use bytes::Bytes;
use s3conform_core::{mask_key_id, AccessKeyStatus, Error, PolicyDocument, ResourceHandle};
use tracing::info;
use uuid::Uuid;

use super::{Scenario, ScenarioName};
use crate::naming;
use crate::runner::{check, ScenarioState, StepFailure, StepResult};
use crate::transport::PutObject;
use crate::verifier::{self, DenialCheck};

const DEFAULT_PREFIX: &str = "iam-policy-test";
const FOREIGN_PREFIX: &str = "unauthorized-bucket";
const TEST_BODY: &[u8] = b"test data";

const EXIT_KEY_NOT_LISTED: u8 = 2;
const EXIT_POLICY_WITHOUT_ARN: u8 = 3;
const EXIT_POLICY_NOT_ATTACHED: u8 = 4;
const EXIT_SECRET_MISSING: u8 = 5;
const EXIT_ALLOWED_ACCESS_REFUSED: u8 = 6;
const EXIT_FOREIGN_CREATE_ALLOWED: u8 = 7;
const EXIT_SCOPED_WRITE_FAILED: u8 = 8;

pub(super) fn scenario() -> Scenario {
    Scenario {
        name: ScenarioName::ScopedPolicy,
        description: "attach a bucket-scoped policy to a new key and check what it may do",
        steps: vec![
            step!(create_bucket),
            step!(create_access_key),
            step!(list_access_keys),
            step!(create_policy),
            step!(attach_policy),
            step!(verify_attachment),
            step!(scoped_client),
            step!(scoped_head_bucket),
            step!(scoped_create_foreign_bucket),
            step!(scoped_put_object),
            step!(deactivate_access_key),
        ],
    }
}

async fn create_bucket(state: &mut ScenarioState) -> StepResult {
    let name = naming::uuid_name(state.config.bucket_prefix_or(DEFAULT_PREFIX));
    state.transport.create_bucket(&name).await?;
    state.tracker.register(ResourceHandle::bucket(name.as_str()));
    info!(bucket = %name, "Created test bucket");
    state.bucket = Some(name);
    Ok(())
}

async fn create_access_key(state: &mut ScenarioState) -> StepResult {
    let credential = state.transport.create_access_key().await?;
    state.tracker.register(ResourceHandle::access_key(credential.access_key_id.as_str()));
    info!(access_key = %mask_key_id(&credential.access_key_id), "Created access key");
    state.credential = Some(credential);
    Ok(())
}

async fn list_access_keys(state: &mut ScenarioState) -> StepResult {
    let keys = state.transport.list_access_keys().await?;
    let ids: Vec<&str> = keys.iter().map(|k| k.access_key_id.as_str()).collect();
    let expected = &state.credential()?.access_key_id;
    check(verifier::contains("access key list", expected, &ids), EXIT_KEY_NOT_LISTED)
}

async fn create_policy(state: &mut ScenarioState) -> StepResult {
    let bucket = state.bucket()?;
    let document = PolicyDocument::bucket_scoped(bucket)
        .to_json_pretty()
        .map_err(|e| Error::Fault(format!("policy serialization: {e}")))?;
    let name = format!("S3BucketPolicy-{}", Uuid::new_v4());
    let description = format!("Allow all S3 operations on bucket {bucket}");

    let Some(arn) = state.transport.create_policy(&name, &document, &description).await? else {
        return Err(StepFailure::assertion(
            EXIT_POLICY_WITHOUT_ARN,
            format!("policy {name} was created without an ARN"),
        ));
    };
    state.tracker.register(ResourceHandle::policy(arn.as_str()));
    info!(policy = %name, arn = %arn, "Created policy");
    state.policy_arn = Some(arn);
    Ok(())
}

async fn attach_policy(state: &mut ScenarioState) -> StepResult {
    let principal = state.principal()?;
    let arn = state.policy_arn()?.to_string();
    state.transport.attach_user_policy(&principal, &arn).await?;
    state.tracker.register(ResourceHandle::policy_attachment(principal.as_str(), arn.as_str()));
    info!(principal = %mask_key_id(&principal), "Attached policy");
    Ok(())
}

async fn verify_attachment(state: &mut ScenarioState) -> StepResult {
    let principal = state.principal()?;
    let attached = state.transport.list_attached_user_policies(&principal).await?;
    let arn = state.policy_arn()?;
    check(verifier::contains("attached policies", arn, &attached), EXIT_POLICY_NOT_ATTACHED)
}

async fn scoped_client(state: &mut ScenarioState) -> StepResult {
    let credential = state.credential()?;
    if credential.secret_key.is_empty() {
        return Err(StepFailure::assertion(
            EXIT_SECRET_MISSING,
            "the issued access key has no secret",
        ));
    }
    let scoped = state.transport.with_credentials(credential)?;
    state.scoped = Some(scoped);
    Ok(())
}

async fn scoped_head_bucket(state: &mut ScenarioState) -> StepResult {
    let scoped = state.scoped()?;
    let bucket = state.bucket()?;
    match scoped.head_bucket(bucket).await {
        Ok(()) => {
            info!(bucket = %bucket, "Policy allows access to bucket");
            Ok(())
        }
        Err(err @ Error::Service { .. }) => Err(StepFailure::assertion(
            EXIT_ALLOWED_ACCESS_REFUSED,
            format!("policy should allow access to {bucket}: {err}"),
        )),
        Err(err) => Err(err.into()),
    }
}

async fn scoped_create_foreign_bucket(state: &mut ScenarioState) -> StepResult {
    let scoped = state.scoped()?;
    let foreign = naming::uuid_name(FOREIGN_PREFIX);
    let denial = &state.config.denial;
    let result = scoped.create_bucket(&foreign).await;

    match verifier::expect_denied(result, &denial.codes, denial.strictness) {
        DenialCheck::Denied(code) => {
            info!(bucket = %foreign, code = %code, "Policy denied foreign bucket");
            Ok(())
        }
        DenialCheck::Allowed(()) => {
            state.tracker.register(ResourceHandle::bucket(foreign.as_str()));
            Err(StepFailure::assertion(
                EXIT_FOREIGN_CREATE_ALLOWED,
                format!("policy should have denied creating bucket {foreign}"),
            ))
        }
        DenialCheck::UnexpectedCode { code, message, strict: false } => {
            state.warn(format!("expected an access-denied code but got {code}: {message}"));
            Ok(())
        }
        DenialCheck::UnexpectedCode { code, message, strict: true } => {
            Err(StepFailure::assertion(
                EXIT_FOREIGN_CREATE_ALLOWED,
                format!("expected an access-denied code but got {code}: {message}"),
            ))
        }
        DenialCheck::NotADenial(err) => Err(err.into()),
    }
}

async fn scoped_put_object(state: &mut ScenarioState) -> StepResult {
    let scoped = state.scoped()?;
    let bucket = state.bucket()?.to_string();
    let key = format!("test-object-{}.txt", Uuid::new_v4());

    let request = PutObject::new(&bucket, &key, Bytes::from_static(TEST_BODY));
    match scoped.put_object(request).await {
        Ok(_) => {}
        Err(err @ Error::Service { .. }) => {
            return Err(StepFailure::assertion(
                EXIT_SCOPED_WRITE_FAILED,
                format!("policy should allow writing to {bucket}: {err}"),
            ))
        }
        Err(err) => return Err(err.into()),
    }
    state.tracker.register(ResourceHandle::object(bucket.as_str(), key.as_str()));
    info!(bucket = %bucket, key = %key, "Policy allows writing to bucket");

    // Read back with the unscoped credentials.
    let data = match state.transport.get_object(&bucket, &key).await {
        Ok(data) => data,
        Err(err) if err.is_not_found() => {
            return Err(StepFailure::assertion(
                EXIT_SCOPED_WRITE_FAILED,
                format!("object written with the scoped key is not readable: {err}"),
            ))
        }
        Err(err) => return Err(err.into()),
    };
    let content = verifier::bytes_equal("scoped write", TEST_BODY, &data.body);
    check(content, EXIT_SCOPED_WRITE_FAILED)
}

async fn deactivate_access_key(state: &mut ScenarioState) -> StepResult {
    let id = state.credential()?.access_key_id.clone();
    state.transport.update_access_key(&id, AccessKeyStatus::Inactive).await?;
    if let Some(credential) = state.credential.as_mut() {
        credential.status = AccessKeyStatus::Inactive;
    }
    info!(access_key = %mask_key_id(&id), "Deactivated access key");
    Ok(())
}
