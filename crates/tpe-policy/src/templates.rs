// templates.rs — Reference policies.
//
// Starting points for new deployments. Both are plain `Policy` values that
// pass schema validation; callers typically clone one and adjust rules.

use crate::action::{Action, AlertSeverity, AllowConditions};
use crate::builder::{
    alert, allow, allow_with, allow_with_mfa, and, deny, require_approval, throttle_per_minute,
    tool_sensitivity, trust_level_at_least, trust_level_below, trust_level_in,
};
use crate::condition::{
    ComparisonOperator, Condition, ConditionNode, ContextMatch, MatchValue, TrustLevelValue,
};
use crate::context::{ToolSensitivity, TrustLevel};
use crate::policy::{DefaultAction, EvaluationMode, Policy, Rule};

fn rule(id: &str, name: &str, priority: u32, condition: ConditionNode, action: Action) -> Rule {
    Rule {
        id: id.to_string(),
        name: name.to_string(),
        description: None,
        priority,
        enabled: true,
        condition,
        action,
    }
}

/// Allows every request. Intended for local development only; analysis
/// flags it as permissive.
pub fn allow_all() -> Policy {
    Policy {
        id: "allow-all".to_string(),
        name: "Allow all".to_string(),
        description: Some("Permits every request; development use only".to_string()),
        version: Some("1.0.0".to_string()),
        rules: vec![rule(
            "allow-everything",
            "Allow everything",
            0,
            Condition::TrustLevel {
                operator: ComparisonOperator::GreaterThanOrEqual,
                value: TrustLevelValue::Level(TrustLevel::Unknown),
            }
            .into(),
            allow(),
        )],
        default_action: DefaultAction::Allow,
        evaluation_mode: EvaluationMode::FirstMatch,
        enabled: true,
    }
}

/// Deny-by-default baseline:
///
/// | prio | rule                 | effect                                   |
/// |------|----------------------|------------------------------------------|
/// | 0    | untrusted agents     | deny below BASIC                         |
/// | 10   | high-risk requests   | deny when risk score is 0.8 or above     |
/// | 20   | critical tools       | require security-team approval           |
/// | 30   | high-sensitivity     | allow VERIFIED+ with MFA                 |
/// | 40   | basic agents         | throttle to 30/min and alert             |
/// | 50   | verified agents      | allow for one hour                       |
/// | 60   | basic, low tools     | allow                                    |
pub fn security_baseline() -> Policy {
    Policy {
        id: "security-baseline".to_string(),
        name: "Security baseline".to_string(),
        description: Some("Deny-by-default policy graded by trust level and tool sensitivity".to_string()),
        version: Some("1.0.0".to_string()),
        rules: vec![
            rule(
                "deny-untrusted",
                "Deny untrusted agents",
                0,
                trust_level_below(TrustLevel::Basic),
                deny("Agent trust level is below BASIC"),
            ),
            rule(
                "deny-high-risk",
                "Deny high-risk requests",
                10,
                Condition::Context {
                    operator: ComparisonOperator::GreaterThanOrEqual,
                    value: ContextMatch {
                        risk_score: Some(MatchValue::Number(0.8)),
                        ..ContextMatch::default()
                    },
                }
                .into(),
                deny("Request risk score is too high"),
            ),
            rule(
                "approve-critical-tools",
                "Critical tools need approval",
                20,
                tool_sensitivity(ToolSensitivity::Critical),
                require_approval(&["security-team"]),
            ),
            rule(
                "mfa-sensitive-tools",
                "High-sensitivity tools need MFA",
                30,
                and(vec![
                    tool_sensitivity(ToolSensitivity::High),
                    trust_level_at_least(TrustLevel::Verified),
                ]),
                allow_with_mfa(),
            ),
            rule(
                "throttle-basic",
                "Rate-limit basic agents",
                40,
                trust_level_in(vec![TrustLevel::Basic]),
                throttle_per_minute(30),
            ),
            rule(
                "alert-basic",
                "Alert on basic agents",
                41,
                trust_level_in(vec![TrustLevel::Basic]),
                alert(AlertSeverity::Low, &["security-log"]),
            ),
            rule(
                "allow-verified",
                "Allow verified agents",
                50,
                trust_level_at_least(TrustLevel::Verified),
                allow_with(AllowConditions {
                    time_limit: Some(3600),
                    ..AllowConditions::default()
                }),
            ),
            rule(
                "allow-basic-low",
                "Allow basic agents on low-sensitivity tools",
                60,
                and(vec![
                    trust_level_in(vec![TrustLevel::Basic]),
                    tool_sensitivity(ToolSensitivity::Low),
                ]),
                allow(),
            ),
        ],
        default_action: DefaultAction::Deny,
        evaluation_mode: EvaluationMode::PriorityOrder,
        enabled: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::Decision;
    use crate::context::{EvaluationContext, RequestContext, ToolInfo};
    use crate::engine::evaluate;
    use crate::obligation::ObligationType;
    use crate::schema::revalidate;

    fn ctx(level: TrustLevel, sensitivity: ToolSensitivity) -> EvaluationContext {
        let mut tool = ToolInfo::new("tool-1", "api");
        tool.sensitivity = sensitivity;
        EvaluationContext::new("did:example:agent", level, tool, "org-1")
    }

    #[test]
    fn templates_pass_schema_validation() {
        revalidate(&allow_all()).unwrap();
        revalidate(&security_baseline()).unwrap();
    }

    #[test]
    fn allow_all_allows_unknown_agents() {
        let result = evaluate(
            &allow_all(),
            &ctx(TrustLevel::Unknown, ToolSensitivity::Critical),
        );
        assert_eq!(result.decision, Decision::Allow);
    }

    #[test]
    fn baseline_denies_unknown_agents() {
        let result = evaluate(
            &security_baseline(),
            &ctx(TrustLevel::Unknown, ToolSensitivity::Low),
        );
        assert_eq!(result.decision, Decision::Deny);
        assert_eq!(result.matched_rule.unwrap().id, "deny-untrusted");
    }

    #[test]
    fn baseline_denies_high_risk_requests() {
        let mut context = ctx(TrustLevel::Privileged, ToolSensitivity::Low);
        context.request_context = Some(RequestContext {
            request_id: None,
            risk_score: Some(0.95),
        });
        let result = evaluate(&security_baseline(), &context);
        assert_eq!(result.decision, Decision::Deny);
        assert_eq!(result.matched_rule.unwrap().id, "deny-high-risk");
    }

    #[test]
    fn baseline_gates_critical_and_sensitive_tools() {
        let critical = evaluate(
            &security_baseline(),
            &ctx(TrustLevel::Privileged, ToolSensitivity::Critical),
        );
        assert_eq!(critical.decision, Decision::RequireApproval);

        let high = evaluate(
            &security_baseline(),
            &ctx(TrustLevel::Verified, ToolSensitivity::High),
        );
        assert_eq!(high.decision, Decision::Allow);
        assert!(high
            .obligations
            .iter()
            .any(|o| o.obligation_type == ObligationType::MfaRequired));
    }

    #[test]
    fn baseline_throttles_then_allows_basic_agents_on_low_tools() {
        let result = evaluate(
            &security_baseline(),
            &ctx(TrustLevel::Basic, ToolSensitivity::Low),
        );
        assert_eq!(result.decision, Decision::Allow);
        assert_eq!(result.matched_rule.unwrap().id, "allow-basic-low");
        assert!(result
            .obligations
            .iter()
            .any(|o| o.obligation_type == ObligationType::Throttle));
    }

    #[test]
    fn baseline_falls_back_to_deny_for_basic_agents_on_medium_tools() {
        let result = evaluate(
            &security_baseline(),
            &ctx(TrustLevel::Basic, ToolSensitivity::Medium),
        );
        assert_eq!(result.decision, Decision::Deny);
        assert!(result.matched_rule.is_none());
        // Throttle obligation collected on the way still travels with the deny.
        assert!(result
            .obligations
            .iter()
            .any(|o| o.obligation_type == ObligationType::Throttle));
    }

    #[test]
    fn baseline_allows_verified_agents_with_time_limit() {
        let result = evaluate(
            &security_baseline(),
            &ctx(TrustLevel::Verified, ToolSensitivity::Medium),
        );
        assert_eq!(result.decision, Decision::Allow);
        assert!(result
            .obligations
            .iter()
            .any(|o| o.obligation_type == ObligationType::TimeLimit));
    }
}
