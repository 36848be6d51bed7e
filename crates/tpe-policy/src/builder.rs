// builder.rs — Programmatic policy construction.
//
// `PolicyBuilder` / `RuleBuilder` chain `with_*` calls and finish with a
// validated `build()`. The free functions are shorthands for common
// conditions and actions:
//
// ```rust,ignore
// let policy = PolicyBuilder::new("db-access", "Database access")
//     .with_rule(
//         RuleBuilder::new("verified-db", 10)
//             .when(and(vec![trust_level_at_least(TrustLevel::Verified), tool_contains("database")]))
//             .then(allow_with_mfa()),
//     )
//     .build()?;
// ```

use chrono::NaiveTime;

use crate::action::{Action, AlertSeverity, AllowConditions, LogLevel, ThrottleLimits};
use crate::condition::{
    ComparisonOperator, Condition, ConditionNode, ContextMatch, CredentialRequirement,
    LocationMatch, LogicalExpression, LogicalOperator, MatchValue, OrganizationMatch, TimeBound,
    TimeWindow, ToolMatch, ToolSpec, TrustLevelValue,
};
use crate::context::{ToolSensitivity, TrustLevel};
use crate::error::{ValidationError, ValidationIssue};
use crate::policy::{DefaultAction, EvaluationMode, Policy, Rule};
use crate::schema;

/// Chained construction of a `Policy`.
#[derive(Debug, Clone)]
pub struct PolicyBuilder {
    id: String,
    name: String,
    description: Option<String>,
    version: Option<String>,
    default_action: DefaultAction,
    evaluation_mode: EvaluationMode,
    enabled: bool,
    rules: Vec<RuleBuilder>,
}

impl PolicyBuilder {
    /// Defaults: deny by default, priority_order, enabled.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            version: None,
            default_action: DefaultAction::Deny,
            evaluation_mode: EvaluationMode::PriorityOrder,
            enabled: true,
            rules: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_default_action(mut self, action: DefaultAction) -> Self {
        self.default_action = action;
        self
    }

    pub fn with_evaluation_mode(mut self, mode: EvaluationMode) -> Self {
        self.evaluation_mode = mode;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn with_rule(mut self, rule: RuleBuilder) -> Self {
        self.rules.push(rule);
        self
    }

    /// Assemble the policy and run it through schema validation.
    ///
    /// Rules missing a condition or action are reported alongside any
    /// schema issues, each at its `rules[i]` path.
    pub fn build(self) -> Result<Policy, ValidationError> {
        let mut issues = Vec::new();
        let mut rules = Vec::with_capacity(self.rules.len());
        for (i, builder) in self.rules.into_iter().enumerate() {
            match builder.build() {
                Ok(rule) => rules.push(rule),
                Err(e) => issues.extend(e.issues.into_iter().map(|issue| ValidationIssue {
                    path: format!("rules[{}].{}", i, issue.path),
                    message: issue.message,
                })),
            }
        }
        if !issues.is_empty() {
            return Err(ValidationError { issues });
        }

        let policy = Policy {
            id: self.id,
            name: self.name,
            description: self.description,
            version: self.version,
            rules,
            default_action: self.default_action,
            evaluation_mode: self.evaluation_mode,
            enabled: self.enabled,
        };
        schema::revalidate(&policy)?;
        Ok(policy)
    }
}

/// Chained construction of a single `Rule`.
#[derive(Debug, Clone)]
pub struct RuleBuilder {
    id: String,
    name: String,
    description: Option<String>,
    priority: u32,
    enabled: bool,
    condition: Option<ConditionNode>,
    action: Option<Action>,
}

impl RuleBuilder {
    pub fn new(id: impl Into<String>, priority: u32) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            description: None,
            priority,
            enabled: true,
            condition: None,
            action: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn when(mut self, condition: impl Into<ConditionNode>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    pub fn then(mut self, action: Action) -> Self {
        self.action = Some(action);
        self
    }

    /// Paths in the error are relative to the rule.
    pub fn build(self) -> Result<Rule, ValidationError> {
        let mut issues = Vec::new();
        if self.condition.is_none() {
            issues.push(ValidationIssue {
                path: "condition".into(),
                message: "missing required field".into(),
            });
        }
        if self.action.is_none() {
            issues.push(ValidationIssue {
                path: "action".into(),
                message: "missing required field".into(),
            });
        }
        match (self.condition, self.action) {
            (Some(condition), Some(action)) => Ok(Rule {
                id: self.id,
                name: self.name,
                description: self.description,
                priority: self.priority,
                enabled: self.enabled,
                condition,
                action,
            }),
            _ => Err(ValidationError { issues }),
        }
    }
}

// ── Condition helpers ──

fn logical(operator: LogicalOperator, operands: Vec<ConditionNode>) -> ConditionNode {
    ConditionNode::Logical(LogicalExpression {
        id: None,
        operator,
        operands,
    })
}

pub fn and(operands: Vec<ConditionNode>) -> ConditionNode {
    logical(LogicalOperator::And, operands)
}

pub fn or(operands: Vec<ConditionNode>) -> ConditionNode {
    logical(LogicalOperator::Or, operands)
}

pub fn not(operand: ConditionNode) -> ConditionNode {
    logical(LogicalOperator::Not, vec![operand])
}

pub fn agent_did(operator: ComparisonOperator, value: impl Into<MatchValue>) -> ConditionNode {
    Condition::AgentDid {
        operator,
        value: value.into(),
    }
    .into()
}

pub fn agent_did_is(did: &str) -> ConditionNode {
    agent_did(ComparisonOperator::Equals, did)
}

pub fn trust_level_at_least(level: TrustLevel) -> ConditionNode {
    Condition::TrustLevel {
        operator: ComparisonOperator::GreaterThanOrEqual,
        value: TrustLevelValue::Level(level),
    }
    .into()
}

pub fn trust_level_below(level: TrustLevel) -> ConditionNode {
    Condition::TrustLevel {
        operator: ComparisonOperator::LessThan,
        value: TrustLevelValue::Level(level),
    }
    .into()
}

pub fn trust_level_in(levels: Vec<TrustLevel>) -> ConditionNode {
    Condition::TrustLevel {
        operator: ComparisonOperator::InList,
        value: TrustLevelValue::Levels(levels),
    }
    .into()
}

/// Compares the explicit trust score (or the level's ordinal when absent).
pub fn trust_score_at_least(score: f64) -> ConditionNode {
    Condition::TrustLevel {
        operator: ComparisonOperator::GreaterThanOrEqual,
        value: TrustLevelValue::Score(score),
    }
    .into()
}

/// A non-expired, non-revoked credential of this type.
pub fn credential(credential_type: &str) -> ConditionNode {
    credential_matching(CredentialRequirement {
        credential_type: Some(credential_type.to_string()),
        expiration_check: true,
        ..CredentialRequirement::default()
    })
}

pub fn credential_matching(requirement: CredentialRequirement) -> ConditionNode {
    Condition::VerifiableCredential {
        operator: ComparisonOperator::Equals,
        value: requirement,
    }
    .into()
}

pub fn tool_id(id: &str) -> ConditionNode {
    Condition::Tool {
        operator: ComparisonOperator::Equals,
        value: ToolMatch::Id(id.to_string()),
    }
    .into()
}

pub fn tool_ids(ids: &[&str]) -> ConditionNode {
    Condition::Tool {
        operator: ComparisonOperator::InList,
        value: ToolMatch::Ids(ids.iter().map(|s| s.to_string()).collect()),
    }
    .into()
}

/// Tool id contains `fragment` as a substring.
pub fn tool_contains(fragment: &str) -> ConditionNode {
    Condition::Tool {
        operator: ComparisonOperator::Contains,
        value: ToolMatch::Id(fragment.to_string()),
    }
    .into()
}

pub fn tool_sensitivity(sensitivity: ToolSensitivity) -> ConditionNode {
    Condition::Tool {
        operator: ComparisonOperator::Equals,
        value: ToolMatch::Spec(ToolSpec {
            sensitivity: Some(sensitivity.as_str().into()),
            ..ToolSpec::default()
        }),
    }
    .into()
}

/// UTC time-of-day window, optionally limited to weekdays (0 = Sunday).
pub fn time_window(start: NaiveTime, end: NaiveTime, days_of_week: Option<Vec<u8>>) -> ConditionNode {
    Condition::Time {
        operator: ComparisonOperator::Equals,
        value: TimeWindow {
            start_time: Some(TimeBound::TimeOfDay(start)),
            end_time: Some(TimeBound::TimeOfDay(end)),
            days_of_week,
        },
    }
    .into()
}

pub fn risk_score_below(score: f64) -> ConditionNode {
    Condition::Context {
        operator: ComparisonOperator::LessThan,
        value: ContextMatch {
            risk_score: Some(MatchValue::Number(score)),
            ..ContextMatch::default()
        },
    }
    .into()
}

pub fn country_in(countries: &[&str]) -> ConditionNode {
    Condition::Context {
        operator: ComparisonOperator::InList,
        value: ContextMatch {
            location: Some(LocationMatch {
                country: Some(countries.to_vec().into()),
            }),
            ..ContextMatch::default()
        },
    }
    .into()
}

pub fn organization_is(org_id: &str) -> ConditionNode {
    Condition::Organization {
        operator: ComparisonOperator::Equals,
        value: OrganizationMatch::Id(org_id.to_string()),
    }
    .into()
}

pub fn organization_in(org_ids: &[&str]) -> ConditionNode {
    Condition::Organization {
        operator: ComparisonOperator::InList,
        value: OrganizationMatch::Ids(org_ids.iter().map(|s| s.to_string()).collect()),
    }
    .into()
}

// ── Action helpers ──

pub fn allow() -> Action {
    Action::allow()
}

pub fn allow_with_mfa() -> Action {
    Action::Allow {
        conditions: Some(AllowConditions {
            require_mfa: true,
            ..AllowConditions::default()
        }),
    }
}

pub fn allow_with(conditions: AllowConditions) -> Action {
    Action::Allow {
        conditions: Some(conditions),
    }
}

pub fn deny(reason: impl Into<String>) -> Action {
    Action::Deny {
        reason: Some(reason.into()),
    }
}

pub fn throttle_per_minute(requests: u32) -> Action {
    Action::Throttle {
        limits: ThrottleLimits {
            requests_per_minute: Some(requests),
            ..ThrottleLimits::default()
        },
    }
}

pub fn log(level: LogLevel) -> Action {
    Action::Log {
        level,
        include_context: true,
    }
}

pub fn alert(severity: AlertSeverity, channels: &[&str]) -> Action {
    Action::Alert {
        severity,
        channels: channels.iter().map(|s| s.to_string()).collect(),
        recipients: Vec::new(),
    }
}

pub fn require_approval(approvers: &[&str]) -> Action {
    Action::RequireApproval {
        approvers: approvers.iter().map(|s| s.to_string()).collect(),
        timeout: None,
        auto_approve_after: None,
    }
}
