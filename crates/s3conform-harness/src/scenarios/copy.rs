//! Server-side copy within one bucket.

use bytes::Bytes;
use s3conform_core::ResourceHandle;
use tracing::info;

use super::common;
use super::{Scenario, ScenarioName};
use crate::runner::{ScenarioState, StepResult};
use crate::transport::PutObject;

const DEFAULT_PREFIX: &str = "copytest";
const SOURCE_KEY: &str = "src/hello.txt";
const DEST_KEY: &str = "dst/hello-copy.txt";
const BODY: &[u8] = b"hello copy api\n";

/// The copy's content differs from the source.
const EXIT_CONTENT_MISMATCH: u8 = 2;

pub(super) fn scenario() -> Scenario {
    Scenario {
        name: ScenarioName::Copy,
        description: "copy an object to a new key and read the copy back",
        steps: vec![
            step!(create_bucket),
            step!(put_source),
            step!(copy_object),
            step!(get_copy),
        ],
    }
}

async fn create_bucket(state: &mut ScenarioState) -> StepResult {
    let name = common::bucket_name(state, DEFAULT_PREFIX);
    common::create_bucket(state, name).await
}

async fn put_source(state: &mut ScenarioState) -> StepResult {
    let bucket = state.bucket()?.to_string();
    let request =
        PutObject::new(&bucket, SOURCE_KEY, Bytes::from_static(BODY)).content_type("text/plain");
    common::put_object(state, request).await
}

async fn copy_object(state: &mut ScenarioState) -> StepResult {
    let bucket = state.bucket()?.to_string();
    state.transport.copy_object(&bucket, SOURCE_KEY, &bucket, DEST_KEY).await?;
    state.tracker.register(ResourceHandle::object(bucket.as_str(), DEST_KEY));
    info!(from = SOURCE_KEY, to = DEST_KEY, "Copied object");
    Ok(())
}

async fn get_copy(state: &mut ScenarioState) -> StepResult {
    common::verify_content(state, state.bucket()?, DEST_KEY, EXIT_CONTENT_MISMATCH).await
}
