//! Building blocks shared by several scenarios.

use bytes::Bytes;
use s3conform_core::ResourceHandle;
use tracing::info;

use crate::naming;
use crate::runner::{check, ScenarioState, StepResult};
use crate::transport::PutObject;
use crate::verifier;

/// Returns a timestamped bucket name under the configured or default prefix.
pub(super) fn bucket_name(state: &ScenarioState, default_prefix: &str) -> String {
    naming::timestamped_bucket_name(state.config.bucket_prefix_or(default_prefix))
}

/// Creates `name`, registers it and makes it the scenario's bucket.
pub(super) async fn create_bucket(state: &mut ScenarioState, name: String) -> StepResult {
    state.transport.create_bucket(&name).await?;
    state.tracker.register(ResourceHandle::bucket(name.clone()));
    info!(bucket = %name, "Created bucket");
    state.bucket = Some(name);
    Ok(())
}

/// Puts `request` into the scenario's bucket, registers it and remembers its
/// key and body for later checks.
pub(super) async fn put_object(state: &mut ScenarioState, request: PutObject<'_>) -> StepResult {
    let bucket = request.bucket.to_string();
    let key = request.key.to_string();
    let body = request.body.clone();
    state.transport.put_object(request).await?;
    state.tracker.register(ResourceHandle::object(bucket.as_str(), key.as_str()));
    info!(bucket = %bucket, key = %key, bytes = body.len(), "Put object");
    state.key = Some(key);
    state.payload = body;
    Ok(())
}

/// Reads `bucket/key` and compares it with the remembered payload.
pub(super) async fn verify_content(
    state: &ScenarioState,
    bucket: &str,
    key: &str,
    exit_code: u8,
) -> StepResult {
    let data = state.transport.get_object(bucket, key).await?;
    check(verifier::bytes_equal("object content", &state.payload, &data.body), exit_code)?;
    info!(key = %key, bytes = data.body.len(), "Object content verified");
    Ok(())
}

/// `len` copies of `byte`.
pub(super) fn filled(byte: u8, len: usize) -> Bytes {
    Bytes::from(vec![byte; len])
}
