// obligation.rs — Declarative side-constraints attached to a decision.
//
// The engine never enforces obligations. It extracts them from matched
// actions and hands them to the gateway, which routes them to the MFA,
// rate-limit, logging and alerting systems.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::action::{Action, ThrottleLimits};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ObligationType {
    Log,
    Alert,
    MfaRequired,
    TimeLimit,
    UsageLimit,
    Throttle,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Obligation {
    #[serde(rename = "type")]
    pub obligation_type: ObligationType,
    pub parameters: serde_json::Value,
    pub description: String,
}

/// Extract the obligations an action carries. Pure; one call per matched rule.
///
/// - allow: `requireMFA` → mfa_required, `timeLimit` → time_limit,
///   `usageLimit` → usage_limit
/// - throttle → throttle
/// - log → log
/// - alert → alert
/// - deny / require_approval → none
pub fn extract_obligations(action: &Action) -> Vec<Obligation> {
    match action {
        Action::Allow { conditions } => {
            let Some(conditions) = conditions else {
                return Vec::new();
            };
            let mut obligations = Vec::new();
            if conditions.require_mfa {
                obligations.push(Obligation {
                    obligation_type: ObligationType::MfaRequired,
                    parameters: json!({}),
                    description: "Multi-factor authentication required".to_string(),
                });
            }
            if let Some(seconds) = conditions.time_limit {
                obligations.push(Obligation {
                    obligation_type: ObligationType::TimeLimit,
                    parameters: json!({ "seconds": seconds }),
                    description: format!("Access limited to {} seconds", seconds),
                });
            }
            if let Some(limit) = conditions.usage_limit {
                obligations.push(Obligation {
                    obligation_type: ObligationType::UsageLimit,
                    parameters: json!({ "maxUses": limit }),
                    description: format!("Access limited to {} uses", limit),
                });
            }
            obligations
        }
        Action::Throttle { limits } => vec![Obligation {
            obligation_type: ObligationType::Throttle,
            parameters: serde_json::to_value(limits).unwrap_or_else(|_| json!({})),
            description: throttle_description(limits),
        }],
        Action::Log {
            level,
            include_context,
        } => vec![Obligation {
            obligation_type: ObligationType::Log,
            parameters: json!({ "level": level, "includeContext": include_context }),
            description: "Log this access attempt".to_string(),
        }],
        Action::Alert {
            severity,
            channels,
            recipients,
        } => vec![Obligation {
            obligation_type: ObligationType::Alert,
            parameters: json!({
                "severity": severity,
                "channels": channels,
                "recipients": recipients,
            }),
            description: format!("Send {} alert", severity.as_str()),
        }],
        Action::Deny { .. } | Action::RequireApproval { .. } => Vec::new(),
    }
}

fn throttle_description(limits: &ThrottleLimits) -> String {
    match limits.requests_per_minute {
        Some(rpm) => format!("Rate limit to {} requests per minute", rpm),
        None => "Apply rate limits".to_string(),
    }
}
