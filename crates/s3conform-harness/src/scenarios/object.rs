//! Object put, head, get and prefix listing.

use bytes::Bytes;
use tracing::info;

use super::common;
use super::{Scenario, ScenarioName};
use crate::runner::{check, ScenarioState, StepResult};
use crate::transport::PutObject;
use crate::verifier;

const DEFAULT_PREFIX: &str = "objecttest";
const KEY: &str = "folder/hello.txt";
const LIST_PREFIX: &str = "folder/";
const BODY: &[u8] = b"hello object api\n";

const EXIT_HEAD_LENGTH: u8 = 2;
const EXIT_CONTENT_MISMATCH: u8 = 3;
const EXIT_NOT_LISTED: u8 = 4;

pub(super) fn scenario() -> Scenario {
    Scenario {
        name: ScenarioName::Object,
        description: "put an object with metadata, then head, get and list it",
        steps: vec![
            step!(create_bucket),
            step!(put_object),
            step!(head_object),
            step!(get_object),
            step!(list_objects),
        ],
    }
}

async fn create_bucket(state: &mut ScenarioState) -> StepResult {
    let name = common::bucket_name(state, DEFAULT_PREFIX);
    common::create_bucket(state, name).await
}

async fn put_object(state: &mut ScenarioState) -> StepResult {
    let bucket = state.bucket()?.to_string();
    let request = PutObject::new(&bucket, KEY, Bytes::from_static(BODY))
        .content_type("text/plain")
        .metadata("owner", "examples");
    common::put_object(state, request).await
}

async fn head_object(state: &mut ScenarioState) -> StepResult {
    let head = state.transport.head_object(state.bucket()?, KEY).await?;
    let length = verifier::length_equals("content length", BODY.len() as i64, head.content_length);
    check(length, EXIT_HEAD_LENGTH)?;
    info!(key = KEY, content_length = ?head.content_length, "Head object OK");
    Ok(())
}

async fn get_object(state: &mut ScenarioState) -> StepResult {
    common::verify_content(state, state.bucket()?, KEY, EXIT_CONTENT_MISMATCH).await
}

async fn list_objects(state: &mut ScenarioState) -> StepResult {
    let keys = state.transport.list_objects_v2(state.bucket()?, Some(LIST_PREFIX)).await?;
    check(verifier::contains("list-objects-v2", KEY, &keys), EXIT_NOT_LISTED)?;
    info!(prefix = LIST_PREFIX, count = keys.len(), "ListObjectsV2 OK");
    Ok(())
}
