// analysis.rs — Policy lint and consistency checks.
//
// Two entry points, both read-only and independent of any request:
//
// - `analyze_policy()` grades a policy: duplicate priorities, rules shadowed
//   by an unconditional deny, a permissive default, condition complexity and
//   what the rules actually cover.
// - `validate_policy_consistency()` looks for defects the evaluator would
//   trip over at runtime: cycles in condition trees, duplicate rule ids,
//   empty logical expressions, trees deeper than the evaluator allows and
//   regex sources that don't compile.
//
// The unreachability check is a heuristic. It only recognizes the canonical
// "match everything" leaf (`trust_level >= UNKNOWN`, or a score of 0).

use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::Serialize;

use crate::action::Action;
use crate::condition::{
    ComparisonOperator, Condition, ConditionKind, ConditionNode, LogicalOperator, MatchValue,
    OrganizationMatch, ToolMatch, TrustLevelValue,
};
use crate::config::EvaluatorConfig;
use crate::context::TrustLevel;
use crate::operators::compile_regex;
use crate::policy::{DefaultAction, EvaluationMode, Policy, Rule};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ComplexityLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ComplexityReport {
    pub rule_count: usize,
    /// Sum of `1 + Σ(children)` over every rule's condition tree.
    pub total: usize,
    pub average: f64,
    pub max: usize,
    pub level: ComplexityLevel,
}

/// What the rules reference, collected from every leaf condition.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CoverageReport {
    pub trust_levels: BTreeSet<TrustLevel>,
    pub tool_ids: BTreeSet<String>,
    pub condition_types: BTreeSet<ConditionKind>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PolicyAnalysis {
    pub issues: Vec<String>,
    pub warnings: Vec<String>,
    pub suggestions: Vec<String>,
    pub complexity: ComplexityReport,
    pub coverage: CoverageReport,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConsistencyReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ConsistencyReport {
    pub fn is_consistent(&self) -> bool {
        self.errors.is_empty()
    }
}

pub fn analyze_policy(policy: &Policy) -> PolicyAnalysis {
    let mut issues = Vec::new();
    let mut warnings = Vec::new();
    let mut suggestions = Vec::new();

    let mut by_priority: BTreeMap<u32, Vec<&str>> = BTreeMap::new();
    for rule in policy.rules.iter().filter(|r| r.enabled) {
        by_priority.entry(rule.priority).or_default().push(&rule.id);
    }
    for (priority, ids) in &by_priority {
        if ids.len() > 1 {
            warnings.push(format!(
                "Rules {} share priority {}; they are evaluated in declaration order",
                ids.join(", "),
                priority
            ));
        }
    }

    let active = policy.active_rules();
    if let Some(pos) = active.iter().position(|r| is_unconditional_deny(r)) {
        let shadowed: Vec<&str> = active[pos + 1..].iter().map(|r| r.id.as_str()).collect();
        if !shadowed.is_empty() {
            issues.push(format!(
                "Rule {} denies every request; lower-priority rules are unreachable: {}",
                active[pos].id,
                shadowed.join(", ")
            ));
        }
    }

    if policy.default_action == DefaultAction::Allow {
        warnings.push(
            "Default action is allow: requests that match no decisive rule are permitted"
                .to_string(),
        );
    }
    if policy.evaluation_mode != EvaluationMode::PriorityOrder
        && policy.default_action == DefaultAction::Allow
    {
        suggestions.push(format!(
            "defaultAction only applies in priority_order mode; {} denies when nothing matches",
            policy.evaluation_mode.as_str()
        ));
    }
    for rule in policy.rules.iter().filter(|r| !r.enabled) {
        suggestions.push(format!("Rule {} is disabled; remove it or re-enable it", rule.id));
    }

    let complexity = complexity_report(policy);
    if complexity.level == ComplexityLevel::High {
        suggestions.push(
            "Policy is highly complex; consider splitting it or simplifying condition trees"
                .to_string(),
        );
    }

    PolicyAnalysis {
        issues,
        warnings,
        suggestions,
        complexity,
        coverage: coverage_report(policy),
    }
}

/// Full consistency check using the default evaluator bounds.
pub fn validate_policy_consistency(policy: &Policy) -> ConsistencyReport {
    validate_policy_consistency_with(policy, &EvaluatorConfig::default())
}

pub fn validate_policy_consistency_with(
    policy: &Policy,
    config: &EvaluatorConfig,
) -> ConsistencyReport {
    let mut report = ConsistencyReport::default();

    let mut seen = HashSet::new();
    for rule in &policy.rules {
        if !seen.insert(rule.id.as_str()) {
            report
                .errors
                .push(format!("Duplicate rule id: {}", rule.id));
        }
    }
    if policy.rules.iter().all(|r| !r.enabled) {
        report
            .warnings
            .push("Policy has no enabled rules".to_string());
    }

    for rule in &policy.rules {
        let mut walk = TreeWalk {
            rule,
            max_depth: config.max_condition_depth,
            report: &mut report,
        };
        walk.node(&rule.condition, "condition", 1, &HashSet::new());
    }
    report
}

fn is_unconditional_deny(rule: &Rule) -> bool {
    if !matches!(rule.action, Action::Deny { .. }) {
        return false;
    }
    match &rule.condition {
        ConditionNode::Leaf(Condition::TrustLevel {
            operator: ComparisonOperator::GreaterThanOrEqual,
            value,
        }) => match value {
            TrustLevelValue::Level(level) => *level == TrustLevel::Unknown,
            TrustLevelValue::Score(score) => *score <= 0.0,
            TrustLevelValue::Levels(_) => false,
        },
        _ => false,
    }
}

fn complexity_report(policy: &Policy) -> ComplexityReport {
    let scores: Vec<usize> = policy.rules.iter().map(|r| r.condition.complexity()).collect();
    let rule_count = scores.len();
    let total: usize = scores.iter().sum();
    let average = if rule_count == 0 {
        0.0
    } else {
        total as f64 / rule_count as f64
    };
    let level = if rule_count > 20 || average > 10.0 {
        ComplexityLevel::High
    } else if rule_count > 10 || average > 5.0 {
        ComplexityLevel::Medium
    } else {
        ComplexityLevel::Low
    };
    ComplexityReport {
        rule_count,
        total,
        average,
        max: scores.into_iter().max().unwrap_or(0),
        level,
    }
}

fn coverage_report(policy: &Policy) -> CoverageReport {
    let mut coverage = CoverageReport::default();
    for rule in &policy.rules {
        rule.condition.for_each_leaf(&mut |leaf| {
            coverage.condition_types.insert(leaf.kind());
            match leaf {
                Condition::TrustLevel { value, .. } => match value {
                    TrustLevelValue::Level(level) => {
                        coverage.trust_levels.insert(*level);
                    }
                    TrustLevelValue::Levels(levels) => coverage.trust_levels.extend(levels),
                    TrustLevelValue::Score(_) => {}
                },
                Condition::Tool { value, .. } => match value {
                    ToolMatch::Id(id) => {
                        coverage.tool_ids.insert(id.clone());
                    }
                    ToolMatch::Ids(ids) => coverage.tool_ids.extend(ids.iter().cloned()),
                    ToolMatch::Spec(spec) => {
                        if let Some(id) = &spec.tool_id {
                            collect_texts(id, &mut coverage.tool_ids);
                        }
                    }
                },
                _ => {}
            }
        });
    }
    coverage
}

fn collect_texts(value: &MatchValue, out: &mut BTreeSet<String>) {
    match value {
        MatchValue::Text(s) => {
            out.insert(s.clone());
        }
        MatchValue::List(items) => items.iter().for_each(|item| collect_texts(item, out)),
        _ => {}
    }
}

/// Regex sources carried by a `matches_regex` leaf.
fn regex_sources(leaf: &Condition) -> Vec<&str> {
    if leaf.operator() != ComparisonOperator::MatchesRegex {
        return Vec::new();
    }
    let candidates: Vec<Option<&MatchValue>> = match leaf {
        Condition::AgentDid { value, .. } => vec![Some(value)],
        Condition::Tool {
            value: ToolMatch::Spec(spec),
            ..
        } => vec![
            spec.tool_id.as_ref(),
            spec.tool_type.as_ref(),
            spec.endpoint.as_ref(),
            spec.sensitivity.as_ref(),
        ],
        Condition::Context { value, .. } => vec![
            value.ip_address.as_ref(),
            value.user_agent.as_ref(),
            value.location.as_ref().and_then(|l| l.country.as_ref()),
            value.risk_score.as_ref(),
        ],
        Condition::Organization {
            value: OrganizationMatch::Spec(spec),
            ..
        } => vec![Some(&spec.org_id)],
        _ => Vec::new(),
    };
    let mut sources: Vec<&str> = candidates
        .into_iter()
        .flatten()
        .filter_map(MatchValue::as_text)
        .collect();
    match leaf {
        Condition::Tool {
            value: ToolMatch::Id(pattern),
            ..
        }
        | Condition::Organization {
            value: OrganizationMatch::Id(pattern),
            ..
        } => sources.push(pattern),
        _ => {}
    }
    sources
}

struct TreeWalk<'a> {
    rule: &'a Rule,
    max_depth: usize,
    report: &'a mut ConsistencyReport,
}

impl TreeWalk<'_> {
    fn node(&mut self, node: &ConditionNode, path: &str, depth: usize, ancestors: &HashSet<String>) {
        if depth > self.max_depth {
            self.report.errors.push(format!(
                "Rule {}: {} is nested deeper than the maximum of {} levels",
                self.rule.id, path, self.max_depth
            ));
            return;
        }
        let expr = match node {
            ConditionNode::Leaf(leaf) => {
                for pattern in regex_sources(leaf) {
                    if let Err(e) = compile_regex(pattern) {
                        self.report
                            .errors
                            .push(format!("Rule {}: {}: {}", self.rule.id, path, e));
                    }
                }
                return;
            }
            ConditionNode::Logical(expr) => expr,
        };

        // Visited ids are per ancestor chain: siblings may reuse an id.
        let mut chain = ancestors.clone();
        if let Some(id) = &expr.id {
            if !chain.insert(id.clone()) {
                self.report.errors.push(format!(
                    "Rule {}: circular reference detected at node {} ({})",
                    self.rule.id, id, path
                ));
                return;
            }
        }

        if expr.operands.is_empty() {
            self.report.errors.push(format!(
                "Rule {}: {} is a {} expression with no operands",
                self.rule.id, path, expr.operator
            ));
        }
        if expr.operator == LogicalOperator::Not && expr.operands.len() > 1 {
            self.report.warnings.push(format!(
                "Rule {}: {} is a NOT with {} operands; only the first is evaluated",
                self.rule.id,
                path,
                expr.operands.len()
            ));
        }
        for (i, operand) in expr.operands.iter().enumerate() {
            let child = format!("{}.operands[{}]", path, i);
            self.node(operand, &child, depth + 1, &chain);
        }
    }
}
