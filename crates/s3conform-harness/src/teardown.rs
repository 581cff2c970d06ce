//! Best-effort removal of everything a scenario created.

use std::fmt;

use s3conform_core::{Error, ResourceHandle};
use tracing::{debug, info, warn};

use crate::tracker::Tracker;
use crate::transport::Transport;

/// What happened to one handle during teardown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// The deletion call succeeded.
    Deleted,
    /// The service reported the resource as already absent.
    AlreadyGone,
    /// The deletion call failed; the resource may be orphaned.
    Failed(String),
}

/// One attempted deletion.
#[derive(Debug, Clone)]
pub struct TeardownEntry {
    /// The handle teardown acted on.
    pub handle: ResourceHandle,
    /// The result.
    pub disposition: Disposition,
}

/// Outcome of a teardown pass, in the order deletions were attempted.
#[derive(Debug, Clone, Default)]
pub struct TeardownReport {
    /// One entry per non-settled handle.
    pub entries: Vec<TeardownEntry>,
}

impl TeardownReport {
    /// Returns the entries whose deletion failed.
    pub fn failures(&self) -> impl Iterator<Item = &TeardownEntry> + '_ {
        self.entries.iter().filter(|e| matches!(e.disposition, Disposition::Failed(_)))
    }

    /// Returns true if nothing failed.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures().next().is_none()
    }
}

impl fmt::Display for TeardownReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = |d: Disposition| self.entries.iter().filter(|e| e.disposition == d).count();
        let deleted = count(Disposition::Deleted);
        let gone = count(Disposition::AlreadyGone);
        let failed = self.entries.len() - deleted - gone;
        write!(f, "{deleted} deleted, {gone} already gone, {failed} failed")
    }
}

/// Deletes every non-settled tracked resource in reverse registration order.
///
/// Failures are recorded and logged, never raised, and do not stop the walk.
pub async fn teardown(tracker: &Tracker, transport: &dyn Transport) -> TeardownReport {
    let mut report = TeardownReport::default();

    for (handle, settled) in tracker.entries().rev() {
        if settled {
            debug!(resource = %handle, "Skipping settled resource");
            continue;
        }

        let disposition = match dispose(handle, transport).await {
            Ok(()) => {
                debug!(resource = %handle, "Deleted resource");
                Disposition::Deleted
            }
            Err(e) if e.is_not_found() => {
                debug!(resource = %handle, "Resource already gone");
                Disposition::AlreadyGone
            }
            Err(e) => {
                warn!(resource = %handle, error = %e, "Failed to delete resource");
                Disposition::Failed(e.to_string())
            }
        };
        report.entries.push(TeardownEntry { handle: handle.clone(), disposition });
    }

    info!(summary = %report, "Teardown finished");
    report
}

async fn dispose(handle: &ResourceHandle, transport: &dyn Transport) -> Result<(), Error> {
    match handle {
        ResourceHandle::MultipartUpload { bucket, key, upload_id } => {
            transport.abort_multipart_upload(bucket, key, upload_id).await
        }
        ResourceHandle::Object { bucket, key } => transport.delete_object(bucket, key).await,
        ResourceHandle::PolicyAttachment { user, policy_arn } => {
            transport.detach_user_policy(user, policy_arn).await
        }
        ResourceHandle::Policy { arn } => transport.delete_policy(arn).await,
        ResourceHandle::AccessKey { access_key_id } => {
            transport.delete_access_key(access_key_id).await
        }
        ResourceHandle::Bucket { bucket } => transport.delete_bucket(bucket).await,
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use proptest::prelude::*;

    use super::*;
    use crate::testing::{InMemoryService, Op};
    use crate::transport::PutObject;

    async fn seeded(service: &InMemoryService) -> Tracker {
        let mut tracker = Tracker::new();
        service.create_bucket("bkt").await.unwrap();
        tracker.register(ResourceHandle::bucket("bkt"));
        service.put_object(PutObject::new("bkt", "k", Bytes::from_static(b"hello"))).await.unwrap();
        tracker.register(ResourceHandle::object("bkt", "k"));
        tracker
    }

    #[tokio::test]
    async fn test_teardown_reverse_order() {
        let service = InMemoryService::new();
        let tracker = seeded(&service).await;
        service.clear_calls();

        let report = teardown(&tracker, &service).await;

        assert!(report.is_clean());
        assert_eq!(service.calls(), vec![Op::DeleteObject, Op::DeleteBucket]);
        assert!(service.is_empty());
        assert_eq!(report.to_string(), "2 deleted, 0 already gone, 0 failed");
    }

    #[tokio::test]
    async fn test_teardown_is_idempotent() {
        let service = InMemoryService::new();
        let tracker = seeded(&service).await;

        let first = teardown(&tracker, &service).await;
        let second = teardown(&tracker, &service).await;

        assert!(first.entries.iter().all(|e| e.disposition == Disposition::Deleted));
        assert!(second.entries.iter().all(|e| e.disposition == Disposition::AlreadyGone));
        assert!(second.is_clean());
    }

    #[tokio::test]
    async fn test_teardown_records_failures_and_continues() {
        let service = InMemoryService::new();
        let tracker = seeded(&service).await;
        service.fail_on(Op::DeleteObject, Error::service("DeleteObject", "InternalError", "boom"));

        let report = teardown(&tracker, &service).await;

        assert_eq!(report.failures().count(), 2);
        assert!(matches!(report.entries[0].disposition, Disposition::Failed(_)));
        // The bucket still holds the object, so its deletion fails too.
        assert!(matches!(
            &report.entries[1].disposition,
            Disposition::Failed(msg) if msg.contains("BucketNotEmpty")
        ));
    }

    #[tokio::test]
    async fn test_teardown_skips_settled() {
        let service = InMemoryService::new();
        let mut tracker = seeded(&service).await;
        service.delete_object("bkt", "k").await.unwrap();
        tracker.settle(&ResourceHandle::object("bkt", "k"));
        service.clear_calls();

        let report = teardown(&tracker, &service).await;

        assert_eq!(report.entries.len(), 1);
        assert_eq!(service.calls(), vec![Op::DeleteBucket]);
    }

    proptest! {
        #[test]
        fn prop_teardown_visits_in_reverse(count in 1usize..12) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            rt.block_on(async {
                let service = InMemoryService::new();
                let mut tracker = Tracker::new();
                for i in 0..count {
                    let name = format!("bucket-{i}");
                    service.create_bucket(&name).await.unwrap();
                    tracker.register(ResourceHandle::bucket(name));
                }

                let report = teardown(&tracker, &service).await;
                let order: Vec<String> =
                    report.entries.iter().map(|e| e.handle.identifier().to_string()).collect();
                let expected: Vec<String> =
                    (0..count).rev().map(|i| format!("bucket-{i}")).collect();
                assert_eq!(order, expected);
                assert!(service.is_empty());
            });
        }
    }
}
