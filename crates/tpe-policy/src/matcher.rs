// matcher.rs — Condition tree evaluation.
//
// `evaluate_condition()` walks a condition tree against one request context.
// Logical nodes short-circuit (AND stops at the first false, OR at the first
// true); NOT looks only at its first operand. Leaves dispatch on their type.
//
// Two bounds keep a pathological policy or context from stalling the
// request path: tree depth and the number of credentials scanned. Crossing
// either is an error, which the evaluator turns into a deny.

use chrono::{DateTime, Datelike, Utc};

use crate::condition::{
    ComparisonOperator, Condition, ConditionNode, ContextMatch, CredentialRequirement,
    LogicalExpression, LogicalOperator, MatchValue, OrganizationMatch, TimeBound, TimeWindow,
    ToolMatch, ToolSpec, TrustLevelValue,
};
use crate::config::EvaluatorConfig;
use crate::context::{CredentialInfo, EvaluationContext};
use crate::error::EvaluationError;
use crate::operators::compare;

/// Evaluate a condition tree. Errors mean "cannot decide" and must fail closed.
pub fn evaluate_condition(
    node: &ConditionNode,
    ctx: &EvaluationContext,
    config: &EvaluatorConfig,
) -> Result<bool, EvaluationError> {
    eval_node(node, ctx, config, 1)
}

fn eval_node(
    node: &ConditionNode,
    ctx: &EvaluationContext,
    config: &EvaluatorConfig,
    depth: usize,
) -> Result<bool, EvaluationError> {
    if depth > config.max_condition_depth {
        return Err(EvaluationError::DepthExceeded {
            max_depth: config.max_condition_depth,
        });
    }
    match node {
        ConditionNode::Logical(expr) => eval_logical(expr, ctx, config, depth),
        ConditionNode::Leaf(condition) => eval_leaf(condition, ctx, config),
    }
}

fn eval_logical(
    expr: &LogicalExpression,
    ctx: &EvaluationContext,
    config: &EvaluatorConfig,
    depth: usize,
) -> Result<bool, EvaluationError> {
    let Some(first) = expr.operands.first() else {
        return Err(EvaluationError::EmptyExpression {
            operator: expr.operator.to_string(),
        });
    };
    match expr.operator {
        LogicalOperator::And => {
            for operand in &expr.operands {
                if !eval_node(operand, ctx, config, depth + 1)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        LogicalOperator::Or => {
            for operand in &expr.operands {
                if eval_node(operand, ctx, config, depth + 1)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        // Trailing operands are ignored.
        LogicalOperator::Not => Ok(!eval_node(first, ctx, config, depth + 1)?),
    }
}

fn eval_leaf(
    condition: &Condition,
    ctx: &EvaluationContext,
    config: &EvaluatorConfig,
) -> Result<bool, EvaluationError> {
    match condition {
        Condition::AgentDid { operator, value } => {
            compare(&MatchValue::Text(ctx.agent_did.clone()), *operator, value)
        }
        Condition::TrustLevel { operator, value } => trust_level_matches(ctx, *operator, value),
        Condition::VerifiableCredential { operator, value } => {
            credential_condition_matches(ctx, *operator, value, config)
        }
        Condition::Tool { operator, value } => tool_matches(ctx, *operator, value),
        Condition::Time { value, .. } => Ok(within_time_window(value, ctx.timestamp)),
        Condition::Context { operator, value } => context_matches(ctx, *operator, value),
        Condition::Organization { operator, value } => {
            let actual = MatchValue::Text(ctx.organization_id.clone());
            match value {
                OrganizationMatch::Id(id) => compare(&actual, *operator, &MatchValue::Text(id.clone())),
                OrganizationMatch::Ids(ids) => compare(&actual, *operator, &text_list(ids)),
                OrganizationMatch::Spec(spec) => compare(&actual, *operator, &spec.org_id),
            }
        }
    }
}

fn trust_level_matches(
    ctx: &EvaluationContext,
    operator: ComparisonOperator,
    value: &TrustLevelValue,
) -> Result<bool, EvaluationError> {
    match value {
        TrustLevelValue::Score(score) => compare(
            &MatchValue::Number(ctx.effective_trust_score()),
            operator,
            &MatchValue::Number(*score),
        ),
        TrustLevelValue::Level(level) => compare(
            &MatchValue::Number(f64::from(ctx.trust_level.score())),
            operator,
            &MatchValue::Number(f64::from(level.score())),
        ),
        // Membership on the level name, not its score.
        TrustLevelValue::Levels(levels) => compare(
            &MatchValue::Text(ctx.trust_level.as_str().to_string()),
            operator,
            &MatchValue::List(
                levels
                    .iter()
                    .map(|l| MatchValue::Text(l.as_str().to_string()))
                    .collect(),
            ),
        ),
    }
}

/// The operator doubles as an existence test over the whole credential set:
/// contains/equals → "some usable credential matches",
/// not_contains/not_equals → "no usable credential matches".
fn credential_condition_matches(
    ctx: &EvaluationContext,
    operator: ComparisonOperator,
    requirement: &CredentialRequirement,
    config: &EvaluatorConfig,
) -> Result<bool, EvaluationError> {
    if ctx.credentials.len() > config.max_credentials {
        return Err(EvaluationError::TooManyCredentials {
            count: ctx.credentials.len(),
            limit: config.max_credentials,
        });
    }

    let found = ctx
        .credentials
        .iter()
        .filter(|c| !c.is_revoked)
        .filter(|c| !(requirement.expiration_check && c.is_expired))
        .any(|c| credential_satisfies(c, requirement));

    Ok(if found {
        matches!(
            operator,
            ComparisonOperator::Contains | ComparisonOperator::Equals
        )
    } else {
        matches!(
            operator,
            ComparisonOperator::NotContains | ComparisonOperator::NotEquals
        )
    })
}

fn credential_satisfies(credential: &CredentialInfo, requirement: &CredentialRequirement) -> bool {
    if let Some(expected) = &requirement.credential_type {
        if &credential.credential_type != expected {
            return false;
        }
    }
    if let Some(expected) = &requirement.issuer {
        if &credential.issuer != expected {
            return false;
        }
    }
    match &requirement.claims {
        Some(claims) => claims
            .iter()
            .all(|(key, expected)| credential.claims.get(key) == Some(expected)),
        None => true,
    }
}

fn tool_matches(
    ctx: &EvaluationContext,
    operator: ComparisonOperator,
    value: &ToolMatch,
) -> Result<bool, EvaluationError> {
    let tool_id = MatchValue::Text(ctx.tool.id.clone());
    match value {
        ToolMatch::Id(id) => compare(&tool_id, operator, &MatchValue::Text(id.clone())),
        ToolMatch::Ids(ids) => compare(&tool_id, operator, &text_list(ids)),
        ToolMatch::Spec(spec) => tool_spec_matches(ctx, operator, spec),
    }
}

/// Conjunction over the sub-fields that are set; each uses the condition's operator.
fn tool_spec_matches(
    ctx: &EvaluationContext,
    operator: ComparisonOperator,
    spec: &ToolSpec,
) -> Result<bool, EvaluationError> {
    let tool = &ctx.tool;
    let checks: [(Option<&MatchValue>, Option<MatchValue>); 4] = [
        (spec.tool_id.as_ref(), Some(MatchValue::Text(tool.id.clone()))),
        (
            spec.tool_type.as_ref(),
            Some(MatchValue::Text(tool.tool_type.clone())),
        ),
        (
            spec.endpoint.as_ref(),
            tool.endpoint.clone().map(MatchValue::Text),
        ),
        (
            spec.sensitivity.as_ref(),
            Some(MatchValue::Text(tool.sensitivity.as_str().to_string())),
        ),
    ];
    all_present_match(&checks, operator)
}

fn context_matches(
    ctx: &EvaluationContext,
    operator: ComparisonOperator,
    value: &ContextMatch,
) -> Result<bool, EvaluationError> {
    if ctx.session_info.is_none() && ctx.request_context.is_none() {
        return Ok(false);
    }
    let session = ctx.session_info.as_ref();
    let country = session
        .and_then(|s| s.location.as_ref())
        .and_then(|l| l.country.clone())
        .map(MatchValue::Text);
    let checks: [(Option<&MatchValue>, Option<MatchValue>); 4] = [
        (
            value.ip_address.as_ref(),
            session.and_then(|s| s.ip_address.clone()).map(MatchValue::Text),
        ),
        (
            value.user_agent.as_ref(),
            session.and_then(|s| s.user_agent.clone()).map(MatchValue::Text),
        ),
        (
            value.location.as_ref().and_then(|l| l.country.as_ref()),
            country,
        ),
        (
            value.risk_score.as_ref(),
            ctx.request_context
                .as_ref()
                .and_then(|r| r.risk_score)
                .map(MatchValue::Number),
        ),
    ];
    all_present_match(&checks, operator)
}

/// Every `(expected, actual)` pair with an expected value must compare true.
/// A missing actual value fails the pair.
fn all_present_match(
    checks: &[(Option<&MatchValue>, Option<MatchValue>)],
    operator: ComparisonOperator,
) -> Result<bool, EvaluationError> {
    for (expected, actual) in checks {
        let Some(expected) = expected else {
            continue;
        };
        let Some(actual) = actual else {
            return Ok(false);
        };
        if !compare(actual, operator, expected)? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Inclusive window check plus optional day-of-week filter (0 = Sunday).
///
/// A time-of-day window whose start is after its end wraps midnight
/// (e.g. 22:00:00–06:00:00).
pub fn within_time_window(window: &TimeWindow, at: DateTime<Utc>) -> bool {
    let in_range = match (window.start_time, window.end_time) {
        (Some(TimeBound::TimeOfDay(start)), Some(TimeBound::TimeOfDay(end))) if start > end => {
            let t = at.time();
            t >= start || t <= end
        }
        (start, end) => {
            start.map_or(true, |b| !is_before_bound(at, b))
                && end.map_or(true, |b| !is_after_bound(at, b))
        }
    };
    let on_allowed_day = match &window.days_of_week {
        Some(days) => {
            let today = at.weekday().num_days_from_sunday();
            days.iter().any(|d| u32::from(*d) == today)
        }
        None => true,
    };
    in_range && on_allowed_day
}

fn is_before_bound(at: DateTime<Utc>, bound: TimeBound) -> bool {
    match bound {
        TimeBound::Instant(instant) => at < instant,
        TimeBound::TimeOfDay(time) => at.time() < time,
    }
}

fn is_after_bound(at: DateTime<Utc>, bound: TimeBound) -> bool {
    match bound {
        TimeBound::Instant(instant) => at > instant,
        TimeBound::TimeOfDay(time) => at.time() > time,
    }
}

fn text_list(items: &[String]) -> MatchValue {
    MatchValue::List(items.iter().cloned().map(MatchValue::Text).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use chrono::{NaiveTime, TimeZone};
    use serde_json::json;

    use crate::condition::{LocationMatch, OrganizationSpec};
    use crate::context::{
        Location, RequestContext, SessionInfo, ToolInfo, ToolSensitivity, TrustLevel,
    };

    fn ctx(level: TrustLevel) -> EvaluationContext {
        let mut ctx = EvaluationContext::new(
            "did:example:agent-7",
            level,
            ToolInfo {
                id: "database-prod".to_string(),
                tool_type: "database".to_string(),
                sensitivity: ToolSensitivity::High,
                endpoint: Some("https://db.internal/query".to_string()),
            },
            "org-acme",
        );
        // Monday 2026-03-02 10:30 UTC.
        ctx.timestamp = Utc.with_ymd_and_hms(2026, 3, 2, 10, 30, 0).unwrap();
        ctx
    }

    fn eval(node: ConditionNode, ctx: &EvaluationContext) -> Result<bool, EvaluationError> {
        evaluate_condition(&node, ctx, &EvaluatorConfig::default())
    }

    fn trust(operator: ComparisonOperator, value: TrustLevelValue) -> ConditionNode {
        ConditionNode::Leaf(Condition::TrustLevel { operator, value })
    }

    fn did(value: &str) -> ConditionNode {
        ConditionNode::Leaf(Condition::AgentDid {
            operator: ComparisonOperator::Equals,
            value: value.into(),
        })
    }

    fn logical(operator: LogicalOperator, operands: Vec<ConditionNode>) -> ConditionNode {
        ConditionNode::Logical(LogicalExpression {
            id: None,
            operator,
            operands,
        })
    }

    fn credential(id: &str, issuer: &str, claims: serde_json::Value) -> CredentialInfo {
        let claims: BTreeMap<String, serde_json::Value> =
            serde_json::from_value(claims).unwrap();
        CredentialInfo {
            id: id.to_string(),
            credential_type: "EmployeeCredential".to_string(),
            issuer: issuer.to_string(),
            claims,
            expires_at: None,
            is_expired: false,
            is_revoked: false,
        }
    }

    fn employee_requirement(expiration_check: bool) -> CredentialRequirement {
        CredentialRequirement {
            credential_type: Some("EmployeeCredential".to_string()),
            issuer: Some("did:example:hr".to_string()),
            claims: Some(BTreeMap::from([("department".to_string(), json!("eng"))])),
            expiration_check,
        }
    }

    fn vc(operator: ComparisonOperator, expiration_check: bool) -> ConditionNode {
        ConditionNode::Leaf(Condition::VerifiableCredential {
            operator,
            value: employee_requirement(expiration_check),
        })
    }

    #[test]
    fn trust_level_name_compares_ordinal_scores() {
        let at_least_verified = || {
            trust(
                ComparisonOperator::GreaterThanOrEqual,
                TrustLevelValue::Level(TrustLevel::Verified),
            )
        };
        for level in TrustLevel::ALL {
            let expected = level.score() >= 2;
            assert_eq!(eval(at_least_verified(), &ctx(level)).unwrap(), expected, "{level}");
        }
    }

    #[test]
    fn numeric_trust_value_uses_explicit_score() {
        let mut c = ctx(TrustLevel::Basic);
        let node = || trust(ComparisonOperator::GreaterThan, TrustLevelValue::Score(2.5));
        assert!(!eval(node(), &c).unwrap());
        c.trust_score = Some(2.75);
        assert!(eval(node(), &c).unwrap());
    }

    #[test]
    fn trust_level_list_is_membership_on_the_name() {
        let node = || {
            trust(
                ComparisonOperator::InList,
                TrustLevelValue::Levels(vec![TrustLevel::Trusted, TrustLevel::Privileged]),
            )
        };
        assert!(eval(node(), &ctx(TrustLevel::Trusted)).unwrap());
        assert!(!eval(node(), &ctx(TrustLevel::Verified)).unwrap());
    }

    #[test]
    fn not_negates_first_operand_only() {
        let c = ctx(TrustLevel::Basic);
        let single = logical(LogicalOperator::Not, vec![did("did:example:agent-7")]);
        assert!(!eval(single, &c).unwrap());
        // Second operand is ignored, even though it alone would be false.
        let extra = logical(
            LogicalOperator::Not,
            vec![did("did:example:other"), did("did:example:nobody")],
        );
        assert!(eval(extra, &c).unwrap());
    }

    #[test]
    fn and_or_combine_operands() {
        let c = ctx(TrustLevel::Basic);
        let yes = || did("did:example:agent-7");
        let no = || did("did:example:other");
        assert!(eval(logical(LogicalOperator::And, vec![yes(), yes()]), &c).unwrap());
        assert!(!eval(logical(LogicalOperator::And, vec![yes(), no()]), &c).unwrap());
        assert!(eval(logical(LogicalOperator::Or, vec![no(), yes()]), &c).unwrap());
        assert!(!eval(logical(LogicalOperator::Or, vec![no(), no()]), &c).unwrap());
    }

    #[test]
    fn empty_logical_expression_is_an_error() {
        let err = eval(logical(LogicalOperator::And, vec![]), &ctx(TrustLevel::Basic)).unwrap_err();
        assert!(matches!(err, EvaluationError::EmptyExpression { .. }));
    }

    #[test]
    fn depth_bound_is_enforced() {
        let mut node = did("did:example:agent-7");
        for _ in 0..10 {
            node = logical(LogicalOperator::And, vec![node]);
        }
        let config = EvaluatorConfig {
            max_condition_depth: 5,
            ..EvaluatorConfig::default()
        };
        let err = evaluate_condition(&node, &ctx(TrustLevel::Basic), &config).unwrap_err();
        assert_eq!(err, EvaluationError::DepthExceeded { max_depth: 5 });
        assert!(eval(node, &ctx(TrustLevel::Basic)).unwrap());
    }

    #[test]
    fn credential_exists_with_matching_claims() {
        let mut c = ctx(TrustLevel::Verified);
        c.credentials = vec![
            credential("vc-1", "did:example:other-hr", json!({"department": "eng"})),
            credential("vc-2", "did:example:hr", json!({"department": "eng", "level": 3})),
        ];
        assert!(eval(vc(ComparisonOperator::Equals, true), &c).unwrap());
        assert!(eval(vc(ComparisonOperator::Contains, true), &c).unwrap());
        assert!(!eval(vc(ComparisonOperator::NotEquals, true), &c).unwrap());
    }

    #[test]
    fn credential_claim_mismatch_means_none_exists() {
        let mut c = ctx(TrustLevel::Verified);
        c.credentials = vec![credential("vc-1", "did:example:hr", json!({"department": "sales"}))];
        assert!(!eval(vc(ComparisonOperator::Equals, true), &c).unwrap());
        assert!(eval(vc(ComparisonOperator::NotContains, true), &c).unwrap());
    }

    #[test]
    fn revoked_credentials_are_always_skipped() {
        let mut c = ctx(TrustLevel::Verified);
        let mut revoked = credential("vc-1", "did:example:hr", json!({"department": "eng"}));
        revoked.is_revoked = true;
        c.credentials = vec![revoked];
        assert!(!eval(vc(ComparisonOperator::Equals, false), &c).unwrap());
    }

    #[test]
    fn expired_credentials_are_skipped_only_with_expiration_check() {
        let mut c = ctx(TrustLevel::Verified);
        let mut expired = credential("vc-1", "did:example:hr", json!({"department": "eng"}));
        expired.is_expired = true;
        c.credentials = vec![expired];
        assert!(!eval(vc(ComparisonOperator::Equals, true), &c).unwrap());
        assert!(eval(vc(ComparisonOperator::Equals, false), &c).unwrap());
    }

    #[test]
    fn credential_other_operators_are_never_true() {
        let mut c = ctx(TrustLevel::Verified);
        c.credentials = vec![credential("vc-1", "did:example:hr", json!({"department": "eng"}))];
        assert!(!eval(vc(ComparisonOperator::GreaterThan, true), &c).unwrap());
        c.credentials.clear();
        assert!(!eval(vc(ComparisonOperator::GreaterThan, true), &c).unwrap());
    }

    #[test]
    fn credential_scan_is_bounded() {
        let mut c = ctx(TrustLevel::Verified);
        c.credentials = (0..5)
            .map(|i| credential(&format!("vc-{i}"), "did:example:hr", json!({})))
            .collect();
        let config = EvaluatorConfig {
            max_credentials: 4,
            ..EvaluatorConfig::default()
        };
        let err = evaluate_condition(&vc(ComparisonOperator::NotContains, true), &c, &config)
            .unwrap_err();
        assert!(matches!(err, EvaluationError::TooManyCredentials { count: 5, limit: 4 }));
    }

    #[test]
    fn tool_id_string_and_list() {
        let c = ctx(TrustLevel::Basic);
        let contains = ConditionNode::Leaf(Condition::Tool {
            operator: ComparisonOperator::Contains,
            value: ToolMatch::Id("database".to_string()),
        });
        assert!(eval(contains, &c).unwrap());
        let listed = ConditionNode::Leaf(Condition::Tool {
            operator: ComparisonOperator::InList,
            value: ToolMatch::Ids(vec!["search".to_string(), "database-prod".to_string()]),
        });
        assert!(eval(listed, &c).unwrap());
    }

    #[test]
    fn tool_spec_checks_only_given_fields() {
        let c = ctx(TrustLevel::Basic);
        let spec = |spec: ToolSpec| {
            ConditionNode::Leaf(Condition::Tool {
                operator: ComparisonOperator::Equals,
                value: ToolMatch::Spec(spec),
            })
        };
        assert!(eval(
            spec(ToolSpec {
                tool_type: Some("database".into()),
                sensitivity: Some("high".into()),
                ..Default::default()
            }),
            &c
        )
        .unwrap());
        assert!(!eval(
            spec(ToolSpec {
                tool_type: Some("database".into()),
                sensitivity: Some("low".into()),
                ..Default::default()
            }),
            &c
        )
        .unwrap());
    }

    #[test]
    fn tool_spec_endpoint_fails_when_context_has_none() {
        let mut c = ctx(TrustLevel::Basic);
        c.tool.endpoint = None;
        let node = ConditionNode::Leaf(Condition::Tool {
            operator: ComparisonOperator::StartsWith,
            value: ToolMatch::Spec(ToolSpec {
                endpoint: Some("https://".into()),
                ..Default::default()
            }),
        });
        assert!(!eval(node, &c).unwrap());
    }

    #[test]
    fn time_window_checks_range_and_weekday() {
        let at = Utc.with_ymd_and_hms(2026, 3, 2, 10, 30, 0).unwrap(); // Monday
        let business_hours = TimeWindow {
            start_time: Some(TimeBound::TimeOfDay(NaiveTime::from_hms_opt(9, 0, 0).unwrap())),
            end_time: Some(TimeBound::TimeOfDay(NaiveTime::from_hms_opt(17, 0, 0).unwrap())),
            days_of_week: Some(vec![1, 2, 3, 4, 5]),
        };
        assert!(within_time_window(&business_hours, at));
        let sunday = Utc.with_ymd_and_hms(2026, 3, 1, 10, 30, 0).unwrap();
        assert!(!within_time_window(&business_hours, sunday));
        let evening = Utc.with_ymd_and_hms(2026, 3, 2, 18, 0, 0).unwrap();
        assert!(!within_time_window(&business_hours, evening));
    }

    #[test]
    fn time_window_bounds_are_inclusive() {
        let start = Utc.with_ymd_and_hms(2026, 3, 2, 10, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2026, 3, 2, 11, 0, 0).unwrap();
        let window = TimeWindow {
            start_time: Some(TimeBound::Instant(start)),
            end_time: Some(TimeBound::Instant(end)),
            days_of_week: None,
        };
        assert!(within_time_window(&window, start));
        assert!(within_time_window(&window, end));
        assert!(!within_time_window(&window, end + chrono::Duration::seconds(1)));
    }

    #[test]
    fn overnight_window_wraps_midnight() {
        let window = TimeWindow {
            start_time: Some(TimeBound::TimeOfDay(NaiveTime::from_hms_opt(22, 0, 0).unwrap())),
            end_time: Some(TimeBound::TimeOfDay(NaiveTime::from_hms_opt(6, 0, 0).unwrap())),
            days_of_week: None,
        };
        assert!(within_time_window(&window, Utc.with_ymd_and_hms(2026, 3, 2, 23, 0, 0).unwrap()));
        assert!(within_time_window(&window, Utc.with_ymd_and_hms(2026, 3, 2, 5, 0, 0).unwrap()));
        assert!(!within_time_window(&window, Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap()));
    }

    #[test]
    fn context_condition_needs_session_or_request() {
        let mut c = ctx(TrustLevel::Basic);
        let node = || {
            ConditionNode::Leaf(Condition::Context {
                operator: ComparisonOperator::InList,
                value: ContextMatch {
                    location: Some(LocationMatch {
                        country: Some(vec!["DE", "FR"].into()),
                    }),
                    ..Default::default()
                },
            })
        };
        assert!(!eval(node(), &c).unwrap());

        c.session_info = Some(SessionInfo {
            ip_address: Some("10.0.0.8".to_string()),
            location: Some(Location {
                country: Some("DE".to_string()),
                region: None,
            }),
            ..Default::default()
        });
        assert!(eval(node(), &c).unwrap());
    }

    #[test]
    fn context_risk_score_and_missing_fields() {
        let mut c = ctx(TrustLevel::Basic);
        c.request_context = Some(RequestContext {
            request_id: None,
            risk_score: Some(0.3),
        });
        let low_risk = ConditionNode::Leaf(Condition::Context {
            operator: ComparisonOperator::LessThan,
            value: ContextMatch {
                risk_score: Some(MatchValue::Number(0.5)),
                ..Default::default()
            },
        });
        assert!(eval(low_risk, &c).unwrap());

        // userAgent is requested but the context has no session info.
        let needs_agent = ConditionNode::Leaf(Condition::Context {
            operator: ComparisonOperator::Contains,
            value: ContextMatch {
                user_agent: Some("curl".into()),
                ..Default::default()
            },
        });
        assert!(!eval(needs_agent, &c).unwrap());
    }

    #[test]
    fn organization_shapes() {
        let c = ctx(TrustLevel::Basic);
        let org = |value: OrganizationMatch, operator| {
            ConditionNode::Leaf(Condition::Organization { operator, value })
        };
        assert!(eval(
            org(OrganizationMatch::Id("org-acme".to_string()), ComparisonOperator::Equals),
            &c
        )
        .unwrap());
        assert!(!eval(
            org(
                OrganizationMatch::Ids(vec!["org-a".to_string(), "org-b".to_string()]),
                ComparisonOperator::InList
            ),
            &c
        )
        .unwrap());
        assert!(eval(
            org(
                OrganizationMatch::Spec(OrganizationSpec {
                    org_id: "org-".into()
                }),
                ComparisonOperator::StartsWith
            ),
            &c
        )
        .unwrap());
    }

    #[test]
    fn operator_mismatch_surfaces_as_error() {
        let c = ctx(TrustLevel::Basic);
        let node = ConditionNode::Leaf(Condition::AgentDid {
            operator: ComparisonOperator::InList,
            value: "did:example:agent-7".into(),
        });
        assert!(eval(node, &c).is_err());
    }
}
