//! # tpe-policy
//!
//! Trust policy evaluation for autonomous agents.
//!
//! A [`Policy`] is a prioritized list of rules. Each rule pairs a condition
//! tree (AND/OR/NOT over typed leaves: agent DID, trust level, verifiable
//! credentials, tool, time window, session context, organization) with an
//! [`Action`]. The [`PolicyEvaluator`] matches an [`EvaluationContext`]
//! against the rules and returns an [`EvaluationResult`]: a decision, the
//! reason, the rule that decided and any obligations (MFA, rate limits,
//! logging, alerts) the caller must enforce.
//!
//! ## Key invariants
//!
//! - **Fail closed**: any error while evaluating conditions yields Deny.
//!   `evaluate()` never returns an error.
//! - **Disabled policy denies**: a disabled policy never allows anything.
//! - **Validated input**: [`schema::validate`] rejects structurally invalid
//!   documents, reporting every issue with its path.
//! - **Bounded work**: condition depth and credential scans are capped by
//!   [`EvaluatorConfig`].

pub mod action;
pub mod analysis;
pub mod builder;
pub mod condition;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod matcher;
pub mod obligation;
pub mod operators;
pub mod policy;
pub mod schema;
pub mod templates;

pub use action::{Action, ActionKind, Decision};
pub use analysis::{analyze_policy, validate_policy_consistency, ConsistencyReport, PolicyAnalysis};
pub use builder::{PolicyBuilder, RuleBuilder};
pub use condition::{
    ComparisonOperator, Condition, ConditionKind, ConditionNode, LogicalExpression, LogicalOperator,
    MatchValue,
};
pub use config::EvaluatorConfig;
pub use context::{EvaluationContext, ToolInfo, TrustLevel};
pub use engine::{evaluate, EvaluationResult, MatchedRule, PolicyEvaluator, TraceStep};
pub use error::{EvaluationError, PolicyError, ValidationError, ValidationIssue};
pub use obligation::{extract_obligations, Obligation, ObligationType};
pub use policy::{DefaultAction, EvaluationMode, Policy, Rule};
pub use schema::{load_policy, parse_policy_json, parse_policy_yaml, validate};
