//! Scenario runs against a real endpoint.
//!
//! Run with `cargo test -p s3conform-harness --test live -- --ignored` after
//! exporting `S3_ENDPOINT`, `S3_ACCESS_KEY` and `S3_SECRET_KEY`.

use std::sync::Arc;

use s3conform_core::{AddressingStyle, HarnessConfig, StaticCredentials};
use s3conform_harness::{AwsTransport, ScenarioName, ScenarioRunner};

fn config_from_env() -> Option<HarnessConfig> {
    let endpoint = std::env::var("S3_ENDPOINT").ok()?;
    let access_key_id = std::env::var("S3_ACCESS_KEY").ok()?;
    let secret_access_key = std::env::var("S3_SECRET_KEY").ok()?;

    let mut config = HarnessConfig {
        endpoint,
        iam_endpoint: std::env::var("IAM_ENDPOINT").ok(),
        credentials: StaticCredentials { access_key_id, secret_access_key },
        iam_user: std::env::var("IAM_USER").ok(),
        ..HarnessConfig::default()
    };
    if let Ok(region) = std::env::var("S3_REGION") {
        config.region = region;
    }
    if let Ok(style) = std::env::var("S3_ADDRESSING_STYLE") {
        config.addressing_style = AddressingStyle::parse_lenient(&style).0;
    }
    Some(config)
}

async fn run_live(name: ScenarioName) {
    let Some(config) = config_from_env() else {
        eprintln!("S3_ENDPOINT, S3_ACCESS_KEY and S3_SECRET_KEY must be set");
        return;
    };
    let config = Arc::new(config);
    let transport = Arc::new(AwsTransport::new(Arc::clone(&config)));
    let report = ScenarioRunner::new(config, transport).run(&name.scenario()).await;

    assert!(report.passed(), "{report}");
    assert!(report.teardown.is_clean(), "{}", report.teardown);
}

#[tokio::test]
#[ignore = "requires a live S3 endpoint"]
async fn live_basics() {
    run_live(ScenarioName::Basics).await;
}

#[tokio::test]
#[ignore = "requires a live S3 endpoint"]
async fn live_bucket() {
    run_live(ScenarioName::Bucket).await;
}

#[tokio::test]
#[ignore = "requires a live S3 endpoint"]
async fn live_object() {
    run_live(ScenarioName::Object).await;
}

#[tokio::test]
#[ignore = "requires a live S3 endpoint"]
async fn live_copy() {
    run_live(ScenarioName::Copy).await;
}

#[tokio::test]
#[ignore = "requires a live S3 endpoint"]
async fn live_multipart() {
    run_live(ScenarioName::Multipart).await;
}

#[tokio::test]
#[ignore = "requires a live S3/IAM endpoint"]
async fn live_access_key() {
    run_live(ScenarioName::AccessKey).await;
}

#[tokio::test]
#[ignore = "requires a live S3/IAM endpoint"]
async fn live_scoped_policy() {
    run_live(ScenarioName::ScopedPolicy).await;
}
