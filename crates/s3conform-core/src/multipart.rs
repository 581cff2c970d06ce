//! Client-side model of a multipart upload session.
//!
//! The session mirrors what the service will enforce at completion time so a
//! scenario can fail locally with a precise diagnostic instead of relying on
//! whatever error the service chooses to return.

use thiserror::Error;

/// Minimum size of every part except the last (5 MiB).
pub const MIN_PART_SIZE: u64 = 5 * 1024 * 1024;

/// Violations of the multipart protocol detected locally.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MultipartError {
    /// A part was numbered out of sequence.
    #[error("expected part number {expected}, got {actual}")]
    NonContiguousPart {
        /// The next number in sequence.
        expected: i32,
        /// The number supplied.
        actual: i32,
    },

    /// A non-final part is smaller than [`MIN_PART_SIZE`].
    #[error(
        "part {part_number} is {size} bytes, below the {min} byte minimum",
        min = MIN_PART_SIZE
    )]
    PartTooSmall {
        /// The offending part.
        part_number: i32,
        /// Its size in bytes.
        size: u64,
    },

    /// The session was already completed.
    #[error("upload {0} is already completed")]
    Completed(String),

    /// Completion requested with no parts.
    #[error("upload {0} has no parts")]
    Empty(String),
}

/// A part uploaded within a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedPart {
    /// 1-based part number.
    pub part_number: i32,
    /// ETag returned by the upload-part call.
    pub etag: String,
    /// Size of the part body in bytes.
    pub size: u64,
}

/// An in-progress multipart upload.
#[derive(Debug, Clone)]
pub struct MultipartSession {
    /// Upload id returned by the initiate call.
    pub upload_id: String,
    /// Target bucket.
    pub bucket: String,
    /// Target key.
    pub key: String,
    parts: Vec<UploadedPart>,
    completed: bool,
}

impl MultipartSession {
    /// Starts tracking a freshly initiated upload.
    pub fn new(
        upload_id: impl Into<String>,
        bucket: impl Into<String>,
        key: impl Into<String>,
    ) -> Self {
        Self {
            upload_id: upload_id.into(),
            bucket: bucket.into(),
            key: key.into(),
            parts: Vec::new(),
            completed: false,
        }
    }

    /// Returns the part number the next upload must use.
    #[must_use]
    pub fn next_part_number(&self) -> i32 {
        self.parts.last().map_or(1, |p| p.part_number + 1)
    }

    /// Returns true once the completion call succeeded.
    #[must_use]
    pub const fn is_completed(&self) -> bool {
        self.completed
    }

    /// Returns the uploaded parts in part-number order.
    #[must_use]
    pub fn parts(&self) -> &[UploadedPart] {
        &self.parts
    }

    /// Total bytes uploaded so far.
    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.parts.iter().map(|p| p.size).sum()
    }

    /// Records a part the service accepted.
    ///
    /// # Errors
    ///
    /// Returns an error if the session is completed or the number is out of sequence.
    pub fn record_part(
        &mut self,
        part_number: i32,
        etag: impl Into<String>,
        size: u64,
    ) -> Result<(), MultipartError> {
        self.ensure_open()?;
        let expected = self.next_part_number();
        if part_number != expected {
            return Err(MultipartError::NonContiguousPart { expected, actual: part_number });
        }
        self.parts.push(UploadedPart { part_number, etag: etag.into(), size });
        Ok(())
    }

    /// Returns the `(part_number, etag)` list to send with the completion call.
    ///
    /// # Errors
    ///
    /// Returns an error if the session is completed, empty, or a non-final part is too small.
    pub fn completion_parts(&self) -> Result<Vec<(i32, String)>, MultipartError> {
        self.ensure_open()?;
        let Some((_last, body)) = self.parts.split_last() else {
            return Err(MultipartError::Empty(self.upload_id.clone()));
        };
        if let Some(small) = body.iter().find(|p| p.size < MIN_PART_SIZE) {
            return Err(MultipartError::PartTooSmall {
                part_number: small.part_number,
                size: small.size,
            });
        }
        Ok(self.parts.iter().map(|p| (p.part_number, p.etag.clone())).collect())
    }

    /// Marks the session completed.
    ///
    /// # Errors
    ///
    /// Returns an error if the session is already completed.
    pub fn mark_completed(&mut self) -> Result<(), MultipartError> {
        self.ensure_open()?;
        self.completed = true;
        Ok(())
    }

    fn ensure_open(&self) -> Result<(), MultipartError> {
        if self.completed {
            return Err(MultipartError::Completed(self.upload_id.clone()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIB: u64 = 1024 * 1024;

    #[test]
    fn test_parts_are_contiguous_from_one() {
        let mut session = MultipartSession::new("u", "b", "k");
        assert_eq!(session.next_part_number(), 1);

        let err = session.record_part(2, "\"e2\"", MIB).unwrap_err();
        assert_eq!(err, MultipartError::NonContiguousPart { expected: 1, actual: 2 });

        session.record_part(1, "\"e1\"", 5 * MIB).unwrap();
        session.record_part(2, "\"e2\"", 2 * MIB).unwrap();
        assert_eq!(session.next_part_number(), 3);
        assert_eq!(session.total_size(), 7 * MIB);
    }

    #[test]
    fn test_completion_parts_in_order() {
        let mut session = MultipartSession::new("u", "b", "k");
        session.record_part(1, "e1", 5 * MIB).unwrap();
        session.record_part(2, "e2", 2 * MIB).unwrap();

        let parts = session.completion_parts().unwrap();
        assert_eq!(parts, vec![(1, "e1".to_string()), (2, "e2".to_string())]);
    }

    #[test]
    fn test_small_non_final_part_rejected() {
        let mut session = MultipartSession::new("u", "b", "k");
        session.record_part(1, "e1", MIB).unwrap();
        session.record_part(2, "e2", 5 * MIB).unwrap();

        let err = session.completion_parts().unwrap_err();
        assert_eq!(err, MultipartError::PartTooSmall { part_number: 1, size: MIB });
    }

    #[test]
    fn test_single_small_part_allowed() {
        let mut session = MultipartSession::new("u", "b", "k");
        session.record_part(1, "e1", 10).unwrap();
        assert_eq!(session.completion_parts().unwrap().len(), 1);
    }

    #[test]
    fn test_empty_session_cannot_complete() {
        let session = MultipartSession::new("u", "b", "k");
        assert_eq!(session.completion_parts().unwrap_err(), MultipartError::Empty("u".into()));
    }

    #[test]
    fn test_completed_session_rejects_parts() {
        let mut session = MultipartSession::new("u", "b", "k");
        session.record_part(1, "e1", 10).unwrap();
        assert!(!session.is_completed());
        session.mark_completed().unwrap();
        assert!(session.is_completed());

        let err = session.record_part(2, "e2", 10).unwrap_err();
        assert_eq!(err, MultipartError::Completed("u".into()));
        assert!(session.mark_completed().is_err());
        assert!(session.completion_parts().is_err());
    }
}
