//! Access key lifecycle: create, list, deactivate, delete.

use s3conform_core::{mask_key_id, AccessKeyStatus, ResourceHandle};
use tracing::info;

use super::{Scenario, ScenarioName};
use crate::runner::{check, ScenarioState, StepResult};
use crate::verifier;

/// The new key is missing from the key list.
const EXIT_NOT_LISTED: u8 = 2;

pub(super) fn scenario() -> Scenario {
    Scenario {
        name: ScenarioName::AccessKey,
        description: "create an access key, list it, deactivate and delete it",
        steps: vec![
            step!(create_access_key),
            step!(list_access_keys),
            step!(deactivate_access_key),
            step!(delete_access_key),
        ],
    }
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
    check(verifier::contains("access key list", expected, &ids), EXIT_NOT_LISTED)
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

async fn delete_access_key(state: &mut ScenarioState) -> StepResult {
    let id = state.credential()?.access_key_id.clone();
    state.transport.delete_access_key(&id).await?;
    state.tracker.settle(&ResourceHandle::access_key(id.as_str()));
    info!(access_key = %mask_key_id(&id), "Deleted access key");
    Ok(())
}
