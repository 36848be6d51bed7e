// error.rs — Error types for the trust policy engine.
//
// Three families:
// - ValidationError: structural problems found by the schema before a policy
//   is ever handed to the evaluator. Collects every violation, not just the first.
// - EvaluationError: something went wrong while evaluating a condition. Never
//   escapes `PolicyEvaluator::evaluate()`; it is converted into a deny.
// - PolicyError: loading/parsing failures (files, JSON, YAML, TOML config).

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::condition::ComparisonOperator;

/// A single structural violation, located by its JSON path (e.g. `rules[2].priority`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    pub path: String,
    pub message: String,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Every structural violation found in a raw policy document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("policy failed validation with {} issue(s): {}", .issues.len(), summarize(.issues))]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationError {
    pub fn single(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            issues: vec![ValidationIssue {
                path: path.into(),
                message: message.into(),
            }],
        }
    }

    /// True if any issue is reported at exactly this path.
    pub fn has_issue_at(&self, path: &str) -> bool {
        self.issues.iter().any(|i| i.path == path)
    }
}

fn summarize(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors raised while evaluating a condition tree.
///
/// The evaluator treats all of these the same way: deny, with the error's
/// message as the reason.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvaluationError {
    /// The operator cannot be applied to the value shapes it was given.
    #[error("operator '{operator}' cannot compare {actual} with {expected}")]
    OperatorMismatch {
        operator: ComparisonOperator,
        actual: String,
        expected: String,
    },

    /// A `matches_regex` pattern failed to compile.
    #[error("invalid regex '{pattern}': {reason}")]
    InvalidRegex { pattern: String, reason: String },

    /// The condition tree is nested deeper than the configured bound.
    #[error("condition nesting exceeds maximum depth of {max_depth}")]
    DepthExceeded { max_depth: usize },

    /// The context carries more credentials than the configured scan bound.
    #[error("context carries {count} credentials, more than the limit of {limit}")]
    TooManyCredentials { count: usize, limit: usize },

    /// A logical expression with no operands reached the evaluator.
    #[error("logical expression '{operator}' has no operands")]
    EmptyExpression { operator: String },
}

/// Errors from loading policies and configuration.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// Failed to read a policy or config file.
    #[error("failed to read {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The file extension doesn't map to a supported format.
    #[error("unsupported policy file format for {path} (expected .json, .yaml or .yml)")]
    UnsupportedFormat { path: PathBuf },

    /// Malformed JSON.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// Malformed YAML.
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Malformed evaluator config.
    #[error("config parse error: {0}")]
    Config(#[from] toml::de::Error),

    /// The document parsed but is not a structurally valid policy.
    #[error(transparent)]
    Invalid(#[from] ValidationError),
}
