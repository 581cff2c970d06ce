//! Two-part multipart upload.

use bytes::BytesMut;
use s3conform_core::{MultipartSession, ResourceHandle};
use tracing::info;

use super::common;
use super::{Scenario, ScenarioName};
use crate::runner::{check, ScenarioState, StepResult};
use crate::verifier;

const DEFAULT_PREFIX: &str = "mpuploadtest";
const KEY: &str = "large/data.bin";
const CONTENT_TYPE: &str = "application/octet-stream";
const MIB: usize = 1024 * 1024;
const PART_ONE: (u8, usize) = (b'a', 5 * MIB);
const PART_TWO: (u8, usize) = (b'b', 2 * MIB);

const EXIT_SIZE_MISMATCH: u8 = 2;
const EXIT_CONTENT_MISMATCH: u8 = 3;

pub(super) fn scenario() -> Scenario {
    Scenario {
        name: ScenarioName::Multipart,
        description: "upload 5 MiB + 2 MiB as two parts, complete, then head and get",
        steps: vec![
            step!(create_bucket),
            step!(initiate_upload),
            step!(upload_part_one),
            step!(upload_part_two),
            step!(complete_upload),
            step!(head_object),
            step!(get_object),
        ],
    }
}

async fn create_bucket(state: &mut ScenarioState) -> StepResult {
    let name = common::bucket_name(state, DEFAULT_PREFIX);
    common::create_bucket(state, name).await
}

async fn initiate_upload(state: &mut ScenarioState) -> StepResult {
    let bucket = state.bucket()?.to_string();
    let upload_id =
        state.transport.create_multipart_upload(&bucket, KEY, Some(CONTENT_TYPE)).await?;
    let handle = ResourceHandle::multipart_upload(bucket.as_str(), KEY, upload_id.as_str());
    state.tracker.register(handle);
    info!(key = KEY, upload_id = %upload_id, "Initiated multipart upload");
    state.multipart = Some(MultipartSession::new(upload_id, bucket, KEY));
    Ok(())
}

async fn upload_part(state: &mut ScenarioState, (byte, len): (u8, usize)) -> StepResult {
    let body = common::filled(byte, len);
    let (bucket, upload_id, part_number) = {
        let session = state.multipart()?;
        (session.bucket.clone(), session.upload_id.clone(), session.next_part_number())
    };

    let etag = state
        .transport
        .upload_part(&bucket, KEY, &upload_id, part_number, body.clone())
        .await?;
    state.multipart()?.record_part(part_number, etag, len as u64)?;

    let mut payload = BytesMut::from(&state.payload[..]);
    payload.extend_from_slice(&body);
    state.payload = payload.freeze();
    info!(part_number, bytes = len, "Uploaded part");
    Ok(())
}

async fn upload_part_one(state: &mut ScenarioState) -> StepResult {
    upload_part(state, PART_ONE).await
}

async fn upload_part_two(state: &mut ScenarioState) -> StepResult {
    upload_part(state, PART_TWO).await
}

async fn complete_upload(state: &mut ScenarioState) -> StepResult {
    let session = state.multipart()?;
    let parts = session.completion_parts()?;
    let (bucket, upload_id) = (session.bucket.clone(), session.upload_id.clone());

    state.transport.complete_multipart_upload(&bucket, KEY, &upload_id, &parts).await?;
    state.tracker.register(ResourceHandle::object(bucket.as_str(), KEY));
    // The completed upload no longer exists; teardown must not abort it.
    let upload = ResourceHandle::multipart_upload(bucket.as_str(), KEY, upload_id.as_str());
    state.tracker.settle(&upload);
    state.multipart()?.mark_completed()?;
    state.key = Some(KEY.to_string());
    info!(key = KEY, parts = parts.len(), "Completed multipart upload");
    Ok(())
}

async fn head_object(state: &mut ScenarioState) -> StepResult {
    let head = state.transport.head_object(state.bucket()?, KEY).await?;
    let expected = (PART_ONE.1 + PART_TWO.1) as i64;
    let size = verifier::length_equals("object size", expected, head.content_length);
    check(size, EXIT_SIZE_MISMATCH)
}

async fn get_object(state: &mut ScenarioState) -> StepResult {
    common::verify_content(state, state.bucket()?, KEY, EXIT_CONTENT_MISMATCH).await
}
