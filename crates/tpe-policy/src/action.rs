// action.rs — What a rule does when its condition matches.
//
// Six action kinds. Four of them map directly to a decision; `log` and
// `alert` are non-decisive: they never halt a priority scan and, when
// they're the first match in first_match mode, resolve to Allow. Every
// action may also carry obligations (see obligation.rs).

use std::fmt;

use serde::{Deserialize, Serialize};

/// The outcome of an evaluation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Allow,
    Deny,
    Throttle,
    RequireApproval,
}

impl Decision {
    /// Rank used when combining decisions in all_rules mode:
    /// deny > require_approval > throttle > allow.
    pub fn precedence(&self) -> u8 {
        match self {
            Decision::Deny => 3,
            Decision::RequireApproval => 2,
            Decision::Throttle => 1,
            Decision::Allow => 0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Allow => "allow",
            Decision::Deny => "deny",
            Decision::Throttle => "throttle",
            Decision::RequireApproval => "require_approval",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Constraints attached to an allow.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AllowConditions {
    /// Maximum session length, in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_limit: Option<u64>,
    /// Maximum number of invocations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage_limit: Option<u64>,
    #[serde(rename = "requireMFA", default)]
    pub require_mfa: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ThrottleLimits {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requests_per_minute: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requests_per_hour: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requests_per_day: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub burst_limit: Option<u32>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl AlertSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertSeverity::Low => "low",
            AlertSeverity::Medium => "medium",
            AlertSeverity::High => "high",
            AlertSeverity::Critical => "critical",
        }
    }
}

/// A rule's action. The `type` field selects the variant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum Action {
    Allow {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        conditions: Option<AllowConditions>,
    },
    Deny {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    Throttle {
        limits: ThrottleLimits,
    },
    Log {
        #[serde(default)]
        level: LogLevel,
        #[serde(default)]
        include_context: bool,
    },
    Alert {
        #[serde(default)]
        severity: AlertSeverity,
        #[serde(default)]
        channels: Vec<String>,
        #[serde(default)]
        recipients: Vec<String>,
    },
    RequireApproval {
        approvers: Vec<String>,
        /// Seconds to wait for an approver.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout: Option<u64>,
        /// Seconds after which the request is approved without an answer.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        auto_approve_after: Option<u64>,
    },
}

/// Discriminant of an action, for traces and reports.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Allow,
    Deny,
    Throttle,
    Log,
    Alert,
    RequireApproval,
}

impl ActionKind {
    pub const ALL: [ActionKind; 6] = [
        Self::Allow,
        Self::Deny,
        Self::Throttle,
        Self::Log,
        Self::Alert,
        Self::RequireApproval,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Allow => "allow",
            ActionKind::Deny => "deny",
            ActionKind::Throttle => "throttle",
            ActionKind::Log => "log",
            ActionKind::Alert => "alert",
            ActionKind::RequireApproval => "require_approval",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == name)
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Action {
    pub fn allow() -> Self {
        Action::Allow { conditions: None }
    }

    pub fn deny() -> Self {
        Action::Deny { reason: None }
    }

    pub fn kind(&self) -> ActionKind {
        match self {
            Action::Allow { .. } => ActionKind::Allow,
            Action::Deny { .. } => ActionKind::Deny,
            Action::Throttle { .. } => ActionKind::Throttle,
            Action::Log { .. } => ActionKind::Log,
            Action::Alert { .. } => ActionKind::Alert,
            Action::RequireApproval { .. } => ActionKind::RequireApproval,
        }
    }

    /// The decision this action renders when it is the one that decides.
    pub fn decision(&self) -> Decision {
        match self {
            Action::Allow { .. } | Action::Log { .. } | Action::Alert { .. } => Decision::Allow,
            Action::Deny { .. } => Decision::Deny,
            Action::Throttle { .. } => Decision::Throttle,
            Action::RequireApproval { .. } => Decision::RequireApproval,
        }
    }

    /// Whether a match halts a priority_order scan.
    pub fn is_decisive(&self) -> bool {
        matches!(
            self,
            Action::Allow { .. } | Action::Deny { .. } | Action::RequireApproval { .. }
        )
    }
}
