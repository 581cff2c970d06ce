//! Put/get smoke test.

use bytes::Bytes;

use super::common;
use super::{Scenario, ScenarioName};
use crate::runner::{ScenarioState, StepResult};
use crate::transport::PutObject;

const DEFAULT_PREFIX: &str = "smoketest";
const KEY: &str = "hello.txt";
const BODY: &[u8] = b"hello world\n";

/// Content read back differs from what was written.
const EXIT_CONTENT_MISMATCH: u8 = 2;

pub(super) fn scenario() -> Scenario {
    Scenario {
        name: ScenarioName::Basics,
        description: "create a bucket, put hello.txt and read it back",
        steps: vec![step!(create_bucket), step!(put_object), step!(get_object)],
    }
}

async fn create_bucket(state: &mut ScenarioState) -> StepResult {
    let name = common::bucket_name(state, DEFAULT_PREFIX);
    common::create_bucket(state, name).await
}

async fn put_object(state: &mut ScenarioState) -> StepResult {
    let bucket = state.bucket()?.to_string();
    common::put_object(state, PutObject::new(&bucket, KEY, Bytes::from_static(BODY))).await
}

async fn get_object(state: &mut ScenarioState) -> StepResult {
    common::verify_content(state, state.bucket()?, KEY, EXIT_CONTENT_MISMATCH).await
}
