// condition.rs — Condition trees.
//
// A rule's condition is a tree: leaves are typed `Condition`s (one variant per
// thing we can inspect about a request), inner nodes are AND/OR/NOT
// `LogicalExpression`s. Every leaf carries a comparison operator and a value
// whose shape depends on the leaf type.
//
// Wire format (JSON/YAML):
//
// ```yaml
// operator: AND
// operands:
//   - type: trust_level
//     operator: greater_than_or_equal
//     value: VERIFIED
//   - type: tool
//     operator: contains
//     value: database
// ```

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::context::TrustLevel;

/// How a leaf condition compares the request's value against the expected one.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonOperator {
    Equals,
    NotEquals,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    MatchesRegex,
    InList,
    NotInList,
}

impl ComparisonOperator {
    pub const ALL: [ComparisonOperator; 13] = [
        Self::Equals,
        Self::NotEquals,
        Self::GreaterThan,
        Self::GreaterThanOrEqual,
        Self::LessThan,
        Self::LessThanOrEqual,
        Self::Contains,
        Self::NotContains,
        Self::StartsWith,
        Self::EndsWith,
        Self::MatchesRegex,
        Self::InList,
        Self::NotInList,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Equals => "equals",
            Self::NotEquals => "not_equals",
            Self::GreaterThan => "greater_than",
            Self::GreaterThanOrEqual => "greater_than_or_equal",
            Self::LessThan => "less_than",
            Self::LessThanOrEqual => "less_than_or_equal",
            Self::Contains => "contains",
            Self::NotContains => "not_contains",
            Self::StartsWith => "starts_with",
            Self::EndsWith => "ends_with",
            Self::MatchesRegex => "matches_regex",
            Self::InList => "in_list",
            Self::NotInList => "not_in_list",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.as_str() == name)
    }
}

impl fmt::Display for ComparisonOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A loosely-typed operand: the expected side of most comparisons.
///
/// Variant order matters for `#[serde(untagged)]`: booleans and numbers are
/// tried before strings so `5` never deserializes as text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum MatchValue {
    Flag(bool),
    Number(f64),
    Text(String),
    List(Vec<MatchValue>),
}

impl MatchValue {
    /// Short name of the value's shape, used in error messages.
    pub fn shape(&self) -> &'static str {
        match self {
            MatchValue::Flag(_) => "boolean",
            MatchValue::Number(_) => "number",
            MatchValue::Text(_) => "string",
            MatchValue::List(_) => "list",
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            MatchValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for MatchValue {
    fn from(s: &str) -> Self {
        MatchValue::Text(s.to_string())
    }
}

impl From<String> for MatchValue {
    fn from(s: String) -> Self {
        MatchValue::Text(s)
    }
}

impl From<f64> for MatchValue {
    fn from(n: f64) -> Self {
        MatchValue::Number(n)
    }
}

impl From<bool> for MatchValue {
    fn from(b: bool) -> Self {
        MatchValue::Flag(b)
    }
}

impl<T: Into<MatchValue>> From<Vec<T>> for MatchValue {
    fn from(items: Vec<T>) -> Self {
        MatchValue::List(items.into_iter().map(Into::into).collect())
    }
}

/// Expected value of a `trust_level` condition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum TrustLevelValue {
    /// Compared against the numeric trust score.
    Score(f64),
    /// Compared by ordinal score (UNKNOWN=0 … PRIVILEGED=4).
    Level(TrustLevel),
    /// Membership test against the raw trust level name.
    Levels(Vec<TrustLevel>),
}

/// Filters a `verifiable_credential` condition applies to each credential.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CredentialRequirement {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub credential_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    /// Every listed claim must be present on the credential with an equal value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claims: Option<BTreeMap<String, serde_json::Value>>,
    /// Skip credentials flagged as expired.
    #[serde(default)]
    pub expiration_check: bool,
}

/// Expected value of a `tool` condition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ToolMatch {
    Id(String),
    Ids(Vec<String>),
    Spec(ToolSpec),
}

/// Structured tool match; unset fields impose no constraint.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToolSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_id: Option<MatchValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_type: Option<MatchValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<MatchValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sensitivity: Option<MatchValue>,
}

/// One end of a time window: an absolute instant or a UTC time of day.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum TimeBound {
    Instant(DateTime<Utc>),
    TimeOfDay(NaiveTime),
}

/// Expected value of a `time` condition. Both checks must pass when present.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TimeWindow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<TimeBound>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<TimeBound>,
    /// 0 = Sunday … 6 = Saturday.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days_of_week: Option<Vec<u8>>,
}

/// Expected value of a `context` condition.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContextMatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<MatchValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<MatchValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<LocationMatch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_score: Option<MatchValue>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LocationMatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<MatchValue>,
}

/// Expected value of an `organization` condition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum OrganizationMatch {
    Id(String),
    Ids(Vec<String>),
    Spec(OrganizationSpec),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationSpec {
    pub org_id: MatchValue,
}

/// A leaf condition. The `type` field selects the variant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Condition {
    AgentDid {
        operator: ComparisonOperator,
        value: MatchValue,
    },
    TrustLevel {
        operator: ComparisonOperator,
        value: TrustLevelValue,
    },
    VerifiableCredential {
        operator: ComparisonOperator,
        value: CredentialRequirement,
    },
    Tool {
        operator: ComparisonOperator,
        value: ToolMatch,
    },
    Time {
        operator: ComparisonOperator,
        value: TimeWindow,
    },
    Context {
        operator: ComparisonOperator,
        value: ContextMatch,
    },
    Organization {
        operator: ComparisonOperator,
        value: OrganizationMatch,
    },
}

/// Discriminant of a leaf condition, for coverage reports.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ConditionKind {
    AgentDid,
    TrustLevel,
    VerifiableCredential,
    Tool,
    Time,
    Context,
    Organization,
}

impl ConditionKind {
    pub const ALL: [ConditionKind; 7] = [
        Self::AgentDid,
        Self::TrustLevel,
        Self::VerifiableCredential,
        Self::Tool,
        Self::Time,
        Self::Context,
        Self::Organization,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AgentDid => "agent_did",
            Self::TrustLevel => "trust_level",
            Self::VerifiableCredential => "verifiable_credential",
            Self::Tool => "tool",
            Self::Time => "time",
            Self::Context => "context",
            Self::Organization => "organization",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == name)
    }
}

impl Condition {
    pub fn kind(&self) -> ConditionKind {
        match self {
            Condition::AgentDid { .. } => ConditionKind::AgentDid,
            Condition::TrustLevel { .. } => ConditionKind::TrustLevel,
            Condition::VerifiableCredential { .. } => ConditionKind::VerifiableCredential,
            Condition::Tool { .. } => ConditionKind::Tool,
            Condition::Time { .. } => ConditionKind::Time,
            Condition::Context { .. } => ConditionKind::Context,
            Condition::Organization { .. } => ConditionKind::Organization,
        }
    }

    pub fn operator(&self) -> ComparisonOperator {
        match self {
            Condition::AgentDid { operator, .. }
            | Condition::TrustLevel { operator, .. }
            | Condition::VerifiableCredential { operator, .. }
            | Condition::Tool { operator, .. }
            | Condition::Time { operator, .. }
            | Condition::Context { operator, .. }
            | Condition::Organization { operator, .. } => *operator,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogicalOperator {
    And,
    Or,
    /// Negates the first operand; any further operands are ignored.
    Not,
}

impl fmt::Display for LogicalOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogicalOperator::And => write!(f, "AND"),
            LogicalOperator::Or => write!(f, "OR"),
            LogicalOperator::Not => write!(f, "NOT"),
        }
    }
}

/// An inner node of a condition tree.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogicalExpression {
    /// Optional node id; repeated ids along one branch are reported as cycles.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub operator: LogicalOperator,
    pub operands: Vec<ConditionNode>,
}

impl Drop for LogicalExpression {
    // Unlink children onto a flat stack so dropping a deep tree never recurses.
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.operands);
        while let Some(node) = pending.pop() {
            if let ConditionNode::Logical(mut expr) = node {
                pending.append(&mut expr.operands);
            }
        }
    }
}

/// A node of a condition tree.
///
/// `Logical` is listed first so `#[serde(untagged)]` only falls back to a
/// leaf when the node has no `operands`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ConditionNode {
    Logical(LogicalExpression),
    Leaf(Condition),
}

impl ConditionNode {
    // Trees assembled in code have no depth bound, so the walks below keep
    // an explicit stack instead of recursing.

    /// `1 + Σ(children)`; leaves score 1.
    pub fn complexity(&self) -> usize {
        let mut total = 0;
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            total += 1;
            if let ConditionNode::Logical(expr) = node {
                stack.extend(expr.operands.iter());
            }
        }
        total
    }

    /// Depth of the tree; a lone leaf has depth 1.
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut stack = vec![(self, 1)];
        while let Some((node, depth)) = stack.pop() {
            deepest = deepest.max(depth);
            if let ConditionNode::Logical(expr) = node {
                stack.extend(expr.operands.iter().map(|child| (child, depth + 1)));
            }
        }
        deepest
    }

    /// Visit every leaf condition, depth first, left to right.
    pub fn for_each_leaf<'a>(&'a self, f: &mut impl FnMut(&'a Condition)) {
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            match node {
                ConditionNode::Leaf(c) => f(c),
                ConditionNode::Logical(expr) => stack.extend(expr.operands.iter().rev()),
            }
        }
    }
}

impl From<Condition> for ConditionNode {
    fn from(c: Condition) -> Self {
        ConditionNode::Leaf(c)
    }
}

impl From<LogicalExpression> for ConditionNode {
    fn from(e: LogicalExpression) -> Self {
        ConditionNode::Logical(e)
    }
}
