//! End-to-end scenario runs against the in-memory service.

use std::sync::Arc;

use s3conform_core::{DenialStrictness, Error, HarnessConfig, MAX_BUCKET_PREFIX_LEN};
use s3conform_harness::testing::{InMemoryService, Op, Quirks};
use s3conform_harness::{Outcome, ScenarioName, ScenarioReport, ScenarioRunner, Transport};

async fn run_with(
    service: &InMemoryService,
    config: HarnessConfig,
    name: ScenarioName,
) -> ScenarioReport {
    let runner = ScenarioRunner::new(Arc::new(config), Arc::new(service.clone()));
    runner.run(&name.scenario()).await
}

async fn run(service: &InMemoryService, name: ScenarioName) -> ScenarioReport {
    run_with(service, HarnessConfig::default(), name).await
}

fn quirky(quirks: Quirks) -> InMemoryService {
    InMemoryService::with_quirks(quirks)
}

#[tokio::test]
async fn test_every_scenario_passes_and_cleans_up() {
    for name in ScenarioName::ALL {
        let service = InMemoryService::new();
        let report = run(&service, name).await;

        assert_eq!(report.exit_code, 0, "{report}");
        assert!(report.passed());
        assert!(report.warnings.is_empty(), "{name}: {:?}", report.warnings);
        assert!(report.teardown.is_clean(), "{name}: {}", report.teardown);
        assert!(service.is_empty(), "{name} left resources behind");
        assert_eq!(report.steps_run, name.scenario().steps.len());
    }
}

#[tokio::test]
async fn test_run_all_reports_in_order() {
    let service = InMemoryService::new();
    let runner =
        ScenarioRunner::new(Arc::new(HarnessConfig::default()), Arc::new(service.clone()));

    let reports = runner.run_all(&s3conform_harness::catalogue()).await;

    let names: Vec<&str> = reports.iter().map(|r| r.scenario).collect();
    assert_eq!(
        names,
        vec!["basics", "bucket", "object", "copy", "multipart", "access-key", "scoped-policy"]
    );
    assert!(reports.iter().all(ScenarioReport::passed));
    assert!(service.is_empty());
}

#[tokio::test]
async fn test_basics_content_mismatch() {
    let service = quirky(Quirks { truncate_reads: true, ..Quirks::default() });

    let report = run(&service, ScenarioName::Basics).await;

    assert_eq!(report.exit_code, 2);
    assert!(matches!(
        &report.outcome,
        Outcome::AssertionFailed { message, .. } if message.contains("mismatch")
    ));
    assert!(service.is_empty());
}

#[tokio::test]
async fn test_bucket_listing_failure() {
    let service = InMemoryService::new();
    service.fail_on(Op::ListBuckets, Error::service("ListBuckets", "InternalError", "boom"));

    let report = run(&service, ScenarioName::Bucket).await;

    assert_eq!(report.exit_code, 1);
    assert_eq!(report.steps_run, 3);
    assert!(service.is_empty());
}

#[tokio::test]
async fn test_bucket_not_listed() {
    let service = quirky(Quirks { hide_buckets: true, ..Quirks::default() });

    let report = run(&service, ScenarioName::Bucket).await;

    assert_eq!(report.exit_code, 2);
    assert!(matches!(
        &report.outcome,
        Outcome::AssertionFailed { message, .. } if message.contains("not found in bucket list")
    ));
    assert!(service.is_empty());
}

#[tokio::test]
async fn test_longest_bucket_prefix_is_accepted() {
    let prefix = "a".repeat(MAX_BUCKET_PREFIX_LEN);
    for name in [ScenarioName::Bucket, ScenarioName::ScopedPolicy] {
        let service = InMemoryService::new();
        let config = HarnessConfig { bucket_prefix: Some(prefix.clone()), ..Default::default() };
        config.validate().unwrap();

        let report = run_with(&service, config, name).await;

        assert!(report.passed(), "{report}");
        assert!(service.is_empty(), "{name} left resources behind");
    }
}

#[tokio::test]
async fn test_object_exit_codes() {
    let cases = [
        (Quirks { head_length_override: Some(1), ..Quirks::default() }, 2),
        (Quirks { truncate_reads: true, ..Quirks::default() }, 3),
        (Quirks { hide_listed_objects: true, ..Quirks::default() }, 4),
    ];

    for (quirks, expected) in cases {
        let service = quirky(quirks);
        let report = run(&service, ScenarioName::Object).await;
        assert_eq!(report.exit_code, expected, "{report}");
        assert!(service.is_empty());
    }
}

#[tokio::test]
async fn test_copy_content_mismatch() {
    let service = quirky(Quirks { truncate_reads: true, ..Quirks::default() });

    let report = run(&service, ScenarioName::Copy).await;

    assert_eq!(report.exit_code, 2);
    assert!(service.is_empty());
}

#[tokio::test]
async fn test_copy_keeps_source_content_type() {
    let service = InMemoryService::new();
    // Keep the copy around so its stored metadata can be read back.
    service.fail_on(Op::DeleteObject, Error::service("DeleteObject", "InternalError", "boom"));

    let report = run(&service, ScenarioName::Copy).await;

    assert!(report.passed(), "{report}");
    let bucket = &service.bucket_names()[0];
    let copy = service.get_object(bucket, "dst/hello-copy.txt").await.unwrap();
    assert_eq!(copy.content_type.as_deref(), Some("text/plain"));
}

#[tokio::test]
async fn test_multipart_object_content_type() {
    let service = InMemoryService::new();
    service.fail_on(Op::DeleteObject, Error::service("DeleteObject", "InternalError", "boom"));

    let report = run(&service, ScenarioName::Multipart).await;

    assert!(report.passed(), "{report}");
    let bucket = &service.bucket_names()[0];
    let object = service.get_object(bucket, "large/data.bin").await.unwrap();
    assert_eq!(object.content_type.as_deref(), Some("application/octet-stream"));
}

#[tokio::test]
async fn test_multipart_exit_codes() {
    let service = quirky(Quirks { head_length_override: Some(5), ..Quirks::default() });
    assert_eq!(run(&service, ScenarioName::Multipart).await.exit_code, 2);
    assert!(service.is_empty());

    let service = quirky(Quirks { truncate_reads: true, ..Quirks::default() });
    assert_eq!(run(&service, ScenarioName::Multipart).await.exit_code, 3);
    assert!(service.is_empty());
}

#[tokio::test]
async fn test_failed_completion_aborts_the_upload() {
    let service = InMemoryService::new();
    service.fail_on(
        Op::CompleteMultipartUpload,
        Error::Dispatch { operation: "CompleteMultipartUpload", message: "reset".into() },
    );

    let report = run(&service, ScenarioName::Multipart).await;

    assert_eq!(report.exit_code, 1);
    assert_eq!(service.open_uploads(), 0);
    assert!(service.calls().contains(&Op::AbortMultipartUpload));
    assert!(service.is_empty());
}

#[tokio::test]
async fn test_access_key_not_listed() {
    let service = quirky(Quirks { hide_access_keys: true, ..Quirks::default() });

    let report = run(&service, ScenarioName::AccessKey).await;

    assert_eq!(report.exit_code, 2);
    assert!(service.access_key_ids().is_empty());
}

#[tokio::test]
async fn test_access_key_deleted_once() {
    let service = InMemoryService::new();

    let report = run(&service, ScenarioName::AccessKey).await;

    assert!(report.passed());
    // The scenario deletes the key itself; teardown has nothing left to do.
    assert!(report.teardown.entries.is_empty());
    let deletes = service.calls().iter().filter(|op| **op == Op::DeleteAccessKey).count();
    assert_eq!(deletes, 1);
}

#[tokio::test]
async fn test_scoped_policy_teardown_order() {
    let service = InMemoryService::new();

    let report = run(&service, ScenarioName::ScopedPolicy).await;

    assert!(report.passed(), "{report}");
    let calls = service.calls();
    assert_eq!(
        calls[calls.len() - 5..],
        [
            Op::DeleteObject,
            Op::DetachUserPolicy,
            Op::DeletePolicy,
            Op::DeleteAccessKey,
            Op::DeleteBucket,
        ]
    );
    assert!(service.is_empty());
}

#[tokio::test]
async fn test_scoped_policy_key_not_listed() {
    let service = quirky(Quirks { hide_access_keys: true, ..Quirks::default() });

    let report = run(&service, ScenarioName::ScopedPolicy).await;

    assert_eq!(report.exit_code, 2);
    assert!(service.is_empty());
}

#[tokio::test]
async fn test_scoped_policy_attachment_not_listed() {
    let service = quirky(Quirks { hide_attachments: true, ..Quirks::default() });

    let report = run(&service, ScenarioName::ScopedPolicy).await;

    assert_eq!(report.exit_code, 4);
    assert_eq!(report.steps_run, 6);
    assert!(service.is_empty());
}

#[tokio::test]
async fn test_scoped_policy_allowed_head_refused() {
    let service = InMemoryService::new();
    service.fail_on(Op::HeadBucket, Error::service("HeadBucket", "AccessDenied", "denied"));

    let report = run(&service, ScenarioName::ScopedPolicy).await;

    assert_eq!(report.exit_code, 6);
    assert!(matches!(
        &report.outcome,
        Outcome::AssertionFailed { message, .. } if message.contains("should allow access")
    ));
    assert!(service.is_empty());
}

#[tokio::test]
async fn test_scoped_policy_without_arn() {
    let service = quirky(Quirks { omit_policy_arn: true, ..Quirks::default() });

    let report = run(&service, ScenarioName::ScopedPolicy).await;

    assert_eq!(report.exit_code, 3);
    // Everything the harness could track is gone.
    assert!(service.bucket_names().is_empty());
    assert!(service.access_key_ids().is_empty());
}

#[tokio::test]
async fn test_scoped_policy_without_secret() {
    let service = quirky(Quirks { omit_secret: true, ..Quirks::default() });

    let report = run(&service, ScenarioName::ScopedPolicy).await;

    assert_eq!(report.exit_code, 5);
    assert!(service.is_empty());
}

#[tokio::test]
async fn test_scoped_policy_foreign_bucket_allowed() {
    let service = quirky(Quirks { enforce_policies: false, ..Quirks::default() });

    let report = run(&service, ScenarioName::ScopedPolicy).await;

    assert_eq!(report.exit_code, 7);
    assert!(matches!(
        &report.outcome,
        Outcome::AssertionFailed { message, .. } if message.contains("unauthorized-bucket-")
    ));
    // The bucket the policy failed to prevent is removed as well.
    assert!(service.is_empty());
}

#[tokio::test]
async fn test_scoped_policy_unexpected_denial_code() {
    let quirks = Quirks { denial_code: "Forbidden2".to_string(), ..Quirks::default() };

    let service = quirky(quirks.clone());
    let lenient = run(&service, ScenarioName::ScopedPolicy).await;
    assert!(lenient.passed(), "{lenient}");
    assert_eq!(lenient.warnings.len(), 1);
    assert!(lenient.warnings[0].contains("Forbidden2"));
    assert!(lenient.to_string().ends_with("[1 warnings]"));
    assert!(service.is_empty());

    let service = quirky(quirks);
    let mut config = HarnessConfig::default();
    config.denial.strictness = DenialStrictness::Strict;
    let strict = run_with(&service, config, ScenarioName::ScopedPolicy).await;
    assert_eq!(strict.exit_code, 7);
    assert!(service.is_empty());
}

#[tokio::test]
async fn test_scoped_policy_scoped_write_refused() {
    let service = InMemoryService::new();
    service.fail_on(Op::PutObject, Error::service("PutObject", "AccessDenied", "denied"));

    let report = run(&service, ScenarioName::ScopedPolicy).await;

    assert_eq!(report.exit_code, 8);
    assert!(service.is_empty());
}

#[tokio::test]
async fn test_scoped_policy_attached_to_configured_user() {
    let service = InMemoryService::new();
    let config =
        HarnessConfig { iam_user: Some(service.user_name().to_string()), ..Default::default() };

    let report = run_with(&service, config, ScenarioName::ScopedPolicy).await;

    assert!(report.passed(), "{report}");
    assert!(service.is_empty());
}

#[tokio::test]
async fn test_transport_error_still_tears_down() {
    let service = InMemoryService::new();
    service.fail_on(
        Op::GetObject,
        Error::Dispatch { operation: "GetObject", message: "connection reset".into() },
    );

    let report = run(&service, ScenarioName::Basics).await;

    assert_eq!(report.exit_code, 1);
    assert!(matches!(report.outcome, Outcome::TransportFailed(Error::Dispatch { .. })));
    assert_eq!(report.teardown.entries.len(), 2);
    assert!(service.is_empty());
}

#[tokio::test]
async fn test_teardown_failure_does_not_change_exit_code() {
    let service = InMemoryService::new();
    service.fail_on(Op::DeleteBucket, Error::service("DeleteBucket", "InternalError", "boom"));

    let report = run(&service, ScenarioName::Bucket).await;

    assert_eq!(report.exit_code, 0);
    assert!(!report.teardown.is_clean());
    assert_eq!(service.bucket_names().len(), 1);
}

#[tokio::test]
async fn test_bucket_prefix_is_applied() {
    let service = InMemoryService::new();
    service.fail_on(Op::ListBuckets, Error::service("ListBuckets", "InternalError", "boom"));
    let config = HarnessConfig { bucket_prefix: Some("ci-run".to_string()), ..Default::default() };

    let report = run_with(&service, config, ScenarioName::Bucket).await;

    let bucket = report.teardown.entries[0].handle.identifier().to_string();
    assert!(bucket.starts_with("ci-run-"), "{bucket}");
}
