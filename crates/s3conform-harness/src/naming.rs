//! Unique names for resources created by scenarios.

use chrono::Utc;
use uuid::Uuid;

/// Returns `{prefix}-{UTC yyyymmddHHMMSS}-{8 hex}` in lower case.
#[must_use]
pub fn timestamped_bucket_name(prefix: &str) -> String {
    let stamp = Utc::now().format("%Y%m%d%H%M%S");
    let uuid = Uuid::new_v4().simple().to_string();
    format!("{prefix}-{stamp}-{}", &uuid[..8]).to_ascii_lowercase()
}

/// Returns `{prefix}-{uuid}` in lower case.
#[must_use]
pub fn uuid_name(prefix: &str) -> String {
    format!("{prefix}-{}", Uuid::new_v4()).to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamped_bucket_name_shape() {
        let name = timestamped_bucket_name("SmokeTest");
        let parts: Vec<&str> = name.split('-').collect();

        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "smoketest");
        assert_eq!(parts[1].len(), 14);
        assert!(parts[1].chars().all(|c| c.is_ascii_digit()));
        assert_eq!(parts[2].len(), 8);
        assert!(parts[2].chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_names_are_unique() {
        assert_ne!(timestamped_bucket_name("b"), timestamped_bucket_name("b"));
        assert_ne!(uuid_name("iam-policy-test"), uuid_name("iam-policy-test"));
    }

    #[test]
    fn test_uuid_name_shape() {
        let name = uuid_name("unauthorized-bucket");
        assert!(name.starts_with("unauthorized-bucket-"));
        assert_eq!(name.len(), "unauthorized-bucket-".len() + 36);
    }
}
