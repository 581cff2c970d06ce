//! Append-only ledger of resources created during a scenario.

use s3conform_core::ResourceHandle;
use tracing::debug;

#[derive(Debug, Clone)]
struct Entry {
    handle: ResourceHandle,
    settled: bool,
}

/// Records every resource whose creation the service confirmed.
///
/// Handles are kept in registration order and never removed. Iteration does
/// not consume the ledger, so teardown can replay it as often as needed.
#[derive(Debug, Clone, Default)]
pub struct Tracker {
    entries: Vec<Entry>,
}

impl Tracker {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a handle. Call only after the creating call succeeded.
    pub fn register(&mut self, handle: ResourceHandle) {
        debug!(kind = %handle.kind(), resource = %handle, "Registered resource");
        self.entries.push(Entry { handle, settled: false });
    }

    /// Marks the most recent unsettled registration of `handle` as disposed of
    /// by the scenario itself. Teardown skips settled handles.
    ///
    /// Returns false if no such registration exists.
    pub fn settle(&mut self, handle: &ResourceHandle) -> bool {
        match self.entries.iter_mut().rev().find(|e| !e.settled && e.handle == *handle) {
            Some(entry) => {
                entry.settled = true;
                debug!(resource = %handle, "Settled resource");
                true
            }
            None => false,
        }
    }

    /// Returns true if the given handle was registered and later settled.
    #[must_use]
    pub fn is_settled(&self, handle: &ResourceHandle) -> bool {
        self.entries.iter().any(|e| e.settled && e.handle == *handle)
    }

    /// Iterates over all handles in registration order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &ResourceHandle> + '_ {
        self.entries.iter().map(|e| &e.handle)
    }

    /// Returns all handles in registration order.
    #[must_use]
    pub fn all(&self) -> Vec<ResourceHandle> {
        self.iter().cloned().collect()
    }

    /// Iterates over `(handle, settled)` pairs in registration order.
    pub fn entries(&self) -> impl DoubleEndedIterator<Item = (&ResourceHandle, bool)> + '_ {
        self.entries.iter().map(|e| (&e.handle, e.settled))
    }

    /// Returns the handles teardown still has to dispose of, in registration order.
    #[must_use]
    pub fn pending(&self) -> Vec<ResourceHandle> {
        self.entries.iter().filter(|e| !e.settled).map(|e| e.handle.clone()).collect()
    }

    /// Number of registered handles, settled or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing was registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_registration_order_is_kept() {
        let mut tracker = Tracker::new();
        tracker.register(ResourceHandle::bucket("b"));
        tracker.register(ResourceHandle::object("b", "k"));
        tracker.register(ResourceHandle::object("b", "k"));

        assert_eq!(tracker.len(), 3);
        assert_eq!(
            tracker.all(),
            vec![
                ResourceHandle::bucket("b"),
                ResourceHandle::object("b", "k"),
                ResourceHandle::object("b", "k"),
            ]
        );
        // Iteration is restartable.
        assert_eq!(tracker.iter().count(), 3);
        assert_eq!(tracker.iter().count(), 3);
    }

    #[test]
    fn test_settle_marks_latest_registration() {
        let mut tracker = Tracker::new();
        let upload = ResourceHandle::multipart_upload("b", "k", "u");
        tracker.register(ResourceHandle::bucket("b"));
        tracker.register(upload.clone());

        assert!(tracker.settle(&upload));
        assert!(!tracker.settle(&upload));
        assert!(tracker.is_settled(&upload));
        assert_eq!(tracker.pending(), vec![ResourceHandle::bucket("b")]);
        assert_eq!(tracker.len(), 2);
    }

    #[test]
    fn test_settle_unknown_handle() {
        let mut tracker = Tracker::new();
        assert!(tracker.is_empty());
        assert!(!tracker.settle(&ResourceHandle::bucket("missing")));
    }

    proptest! {
        #[test]
        fn prop_iteration_matches_registration(
            names in proptest::collection::vec("[a-z]{1,8}", 0..32)
        ) {
            let mut tracker = Tracker::new();
            for name in &names {
                tracker.register(ResourceHandle::bucket(name.clone()));
            }
            let seen: Vec<String> = tracker.iter().map(|h| h.identifier().to_string()).collect();
            prop_assert_eq!(&seen, &names);

            let reversed: Vec<String> =
                tracker.iter().rev().map(|h| h.identifier().to_string()).collect();
            let mut expected = names.clone();
            expected.reverse();
            prop_assert_eq!(reversed, expected);
        }
    }
}
