// policy.rs — Policy and Rule value objects.
//
// A Policy is an ordered set of rules plus a fallback action and an
// evaluation strategy. Policies are authored and versioned elsewhere and
// handed to the evaluator as immutable values; nothing in this crate
// mutates a Policy after it has been validated.

use serde::{Deserialize, Serialize};

use crate::action::{Action, Decision};
use crate::condition::ConditionNode;

/// Highest allowed rule priority. Lower numbers are evaluated first.
pub const MAX_PRIORITY: u32 = 1000;

/// How rules are combined into one decision.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationMode {
    /// The first matching rule decides; no match → deny.
    FirstMatch,
    /// Every rule is evaluated; matched decisions combine by precedence.
    AllRules,
    /// Ascending scan; the first allow/deny/require_approval match decides,
    /// throttle/log/alert matches only add obligations.
    #[default]
    PriorityOrder,
}

impl EvaluationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvaluationMode::FirstMatch => "first_match",
            EvaluationMode::AllRules => "all_rules",
            EvaluationMode::PriorityOrder => "priority_order",
        }
    }
}

/// Fallback applied when a priority_order scan finds no decisive rule.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DefaultAction {
    Allow,
    #[default]
    Deny,
}

impl DefaultAction {
    pub fn decision(&self) -> Decision {
        match self {
            DefaultAction::Allow => Decision::Allow,
            DefaultAction::Deny => Decision::Deny,
        }
    }

    pub fn to_action(&self) -> Action {
        match self {
            DefaultAction::Allow => Action::allow(),
            DefaultAction::Deny => Action::deny(),
        }
    }
}

fn default_true() -> bool {
    true
}

/// One rule: when `condition` holds, apply `action`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// 0..=1000; duplicates are allowed but flagged by analysis.
    pub priority: u32,
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub condition: ConditionNode,
    pub action: Action,
}

impl Rule {
    /// Name used in reasons and traces; falls back to the id.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        }
    }
}

/// A complete access-control policy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Policy {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub rules: Vec<Rule>,
    #[serde(default)]
    pub default_action: DefaultAction,
    #[serde(default)]
    pub evaluation_mode: EvaluationMode,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Policy {
    /// Enabled rules, stable-sorted ascending by priority.
    ///
    /// Rules sharing a priority keep their declaration order.
    pub fn active_rules(&self) -> Vec<&Rule> {
        let mut rules: Vec<&Rule> = self.rules.iter().filter(|r| r.enabled).collect();
        rules.sort_by_key(|r| r.priority);
        rules
    }
}
