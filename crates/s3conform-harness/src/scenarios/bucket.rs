//! Bucket create, head and list.

use tracing::info;

use super::common;
use super::{Scenario, ScenarioName};
use crate::runner::{check, ScenarioState, StepResult};
use crate::verifier;

const DEFAULT_PREFIX: &str = "acs-bucket-test";

/// The new bucket is missing from the bucket list.
const EXIT_NOT_LISTED: u8 = 2;

pub(super) fn scenario() -> Scenario {
    Scenario {
        name: ScenarioName::Bucket,
        description: "create a bucket, head it and find it in the bucket list",
        steps: vec![step!(create_bucket), step!(head_bucket), step!(list_buckets)],
    }
}

async fn create_bucket(state: &mut ScenarioState) -> StepResult {
    let name = common::bucket_name(state, DEFAULT_PREFIX);
    common::create_bucket(state, name).await
}

async fn head_bucket(state: &mut ScenarioState) -> StepResult {
    let bucket = state.bucket()?;
    state.transport.head_bucket(bucket).await?;
    info!(bucket = %bucket, "Head bucket OK");
    Ok(())
}

async fn list_buckets(state: &mut ScenarioState) -> StepResult {
    let buckets = state.transport.list_buckets().await?;
    check(verifier::contains("bucket list", state.bucket()?, &buckets), EXIT_NOT_LISTED)
}
