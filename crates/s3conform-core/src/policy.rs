//! IAM identity policy documents.
//!
//! Identity policies have no `Principal` element: they apply to whoever they
//! are attached to. Evaluation follows the standard order: an explicit deny
//! wins, then any explicit allow, otherwise the request is implicitly denied.

use serde::{Deserialize, Serialize};

/// Policy language version emitted by the builders.
pub const POLICY_VERSION: &str = "2012-10-17";

/// The result of policy evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyDecision {
    /// An explicit Allow from a policy statement.
    Allow,
    /// An explicit Deny from a policy statement.
    Deny,
    /// No matching statement found (implicit deny).
    DefaultDeny,
}

impl PolicyDecision {
    /// Returns true if the request is allowed.
    #[must_use]
    pub const fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

/// An identity policy document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyDocument {
    /// The policy language version.
    pub version: String,
    /// An optional identifier for the policy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// The policy statements.
    pub statement: Vec<Statement>,
}

/// A single policy statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Statement {
    /// An optional identifier for the statement.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,
    /// Whether this statement allows or denies access.
    pub effect: Effect,
    /// The action(s) this statement covers.
    pub action: StringOrArray,
    /// The resource(s) this statement covers.
    pub resource: StringOrArray,
}

/// The effect of a policy statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    /// Allow the action.
    Allow,
    /// Deny the action.
    Deny,
}

/// Either a single string or an array of strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StringOrArray {
    /// A single string.
    Single(String),
    /// An array of strings.
    Array(Vec<String>),
}

impl StringOrArray {
    /// Returns an iterator over the values.
    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        let values: &[String] = match self {
            Self::Single(s) => std::slice::from_ref(s),
            Self::Array(v) => v.as_slice(),
        };
        values.iter().map(String::as_str)
    }

    /// Returns true if the given value matches any of the patterns.
    #[must_use]
    pub fn matches(&self, value: &str) -> bool {
        self.iter().any(|pattern| wildcard_match(pattern, value))
    }
}

impl PolicyDocument {
    /// Builds a policy allowing every S3 action on one bucket and its objects.
    #[must_use]
    pub fn bucket_scoped(bucket: &str) -> Self {
        Self {
            version: POLICY_VERSION.to_string(),
            id: None,
            statement: vec![Statement {
                sid: None,
                effect: Effect::Allow,
                action: StringOrArray::Single("s3:*".to_string()),
                resource: StringOrArray::Array(vec![
                    bucket_arn(bucket),
                    format!("{}/*", bucket_arn(bucket)),
                ]),
            }],
        }
    }

    /// Parses a policy from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON does not match the policy schema.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serializes the policy to pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Validates the policy structure.
    ///
    /// # Errors
    ///
    /// Returns a description of the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        if self.version != POLICY_VERSION && self.version != "2008-10-17" {
            return Err(format!("invalid policy version: {}", self.version));
        }
        if self.statement.is_empty() {
            return Err("policy must contain at least one statement".to_string());
        }
        for (i, stmt) in self.statement.iter().enumerate() {
            if stmt.action.iter().next().is_none() || stmt.resource.iter().next().is_none() {
                return Err(format!("statement {i} needs at least one action and resource"));
            }
        }
        Ok(())
    }

    /// Evaluates the policy for an action on a resource ARN.
    #[must_use]
    pub fn evaluate(&self, action: &str, resource: &str) -> PolicyDecision {
        let mut has_allow = false;

        for stmt in &self.statement {
            if !stmt.action.matches(action) || !stmt.resource.matches(resource) {
                continue;
            }
            match stmt.effect {
                Effect::Deny => return PolicyDecision::Deny,
                Effect::Allow => has_allow = true,
            }
        }

        if has_allow {
            PolicyDecision::Allow
        } else {
            PolicyDecision::DefaultDeny
        }
    }
}

/// Returns the ARN of a bucket.
#[must_use]
pub fn bucket_arn(bucket: &str) -> String {
    format!("arn:aws:s3:::{bucket}")
}

/// Returns the ARN of an object.
#[must_use]
pub fn object_arn(bucket: &str, key: &str) -> String {
    format!("arn:aws:s3:::{bucket}/{key}")
}

/// Glob match supporting `*` (any run) and `?` (one character).
fn wildcard_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    let (mut pi, mut ti) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while ti < t.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == t[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some((pi, ti));
            pi += 1;
        } else if let Some((sp, st)) = star {
            pi = sp + 1;
            ti = st + 1;
            star = Some((sp, st + 1));
        } else {
            return false;
        }
    }
    p[pi..].iter().all(|c| *c == '*')
}
