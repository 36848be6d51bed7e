// engine.rs — Policy evaluation engine.
//
// The PolicyEvaluator is the single chokepoint every tool-access attempt
// flows through. `evaluate()` checks:
//
// 1. Is the policy enabled? → No → Deny
// 2. Select enabled rules, stable-sorted by ascending priority
// 3. Dispatch on the policy's evaluation mode:
//    - first_match:    first matching rule decides; no match → Deny
//    - all_rules:      every rule evaluated; deny > require_approval > throttle > allow
//    - priority_order: allow/deny/require_approval halt the scan, throttle/log/alert
//                      only add obligations; nothing decisive → default action
//
// Fail closed: any EvaluationError anywhere in the scan becomes a Deny with
// the error as the reason. `evaluate()` never returns an error and never
// mutates its inputs, so one evaluator and one policy can serve any number
// of concurrent requests.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::action::{Action, ActionKind, Decision};
use crate::config::EvaluatorConfig;
use crate::context::EvaluationContext;
use crate::error::EvaluationError;
use crate::matcher::evaluate_condition;
use crate::obligation::{extract_obligations, Obligation};
use crate::policy::{EvaluationMode, Policy, Rule};

/// The rule that produced the decision.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MatchedRule {
    pub id: String,
    pub name: String,
    pub priority: u32,
}

impl From<&Rule> for MatchedRule {
    fn from(rule: &Rule) -> Self {
        Self {
            id: rule.id.clone(),
            name: rule.display_name().to_string(),
            priority: rule.priority,
        }
    }
}

/// One rule visited during evaluation (debug mode only).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TraceStep {
    pub rule_id: String,
    pub rule_name: String,
    pub priority: u32,
    pub condition_result: bool,
    /// The matched rule's action kind; `None` when the condition was false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_taken: Option<ActionKind>,
    /// Set when evaluating this rule's condition failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration: Duration,
}

/// The engine's answer for one request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationResult {
    pub decision: Decision,
    /// The action that decided (synthesized for defaults and failures).
    pub action: Action,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_rule: Option<MatchedRule>,
    pub reason: String,
    pub obligations: Vec<Obligation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace: Option<Vec<TraceStep>>,
    pub processing_time: Duration,
}

impl EvaluationResult {
    fn deny(reason: impl Into<String>) -> Self {
        Self {
            decision: Decision::Deny,
            action: Action::deny(),
            matched_rule: None,
            reason: reason.into(),
            obligations: Vec::new(),
            trace: None,
            processing_time: Duration::ZERO,
        }
    }

    fn from_rule(rule: &Rule, decision: Decision, obligations: Vec<Obligation>) -> Self {
        Self {
            decision,
            action: rule.action.clone(),
            matched_rule: Some(MatchedRule::from(rule)),
            reason: format!("Matched rule: {}", rule.display_name()),
            obligations,
            trace: None,
            processing_time: Duration::ZERO,
        }
    }

    pub fn is_allowed(&self) -> bool {
        self.decision == Decision::Allow
    }
}

/// Per-call trace accumulator. Allocated fresh for every evaluation.
struct Tracer {
    steps: Option<Vec<TraceStep>>,
}

impl Tracer {
    fn new(enabled: bool) -> Self {
        Self {
            steps: enabled.then(Vec::new),
        }
    }

    fn start(&self) -> Option<Instant> {
        self.steps.as_ref().map(|_| Instant::now())
    }

    fn record(
        &mut self,
        rule: &Rule,
        started: Option<Instant>,
        outcome: &Result<bool, EvaluationError>,
    ) {
        let Some(steps) = self.steps.as_mut() else {
            return;
        };
        let matched = matches!(outcome, Ok(true));
        steps.push(TraceStep {
            rule_id: rule.id.clone(),
            rule_name: rule.display_name().to_string(),
            priority: rule.priority,
            condition_result: matched,
            action_taken: matched.then(|| rule.action.kind()),
            error: outcome.as_ref().err().map(ToString::to_string),
            duration: started.map(|s| s.elapsed()).unwrap_or_default(),
        });
    }

    fn finish(self) -> Option<Vec<TraceStep>> {
        self.steps
    }
}

/// The policy evaluator. Stateless apart from its configuration.
#[derive(Debug, Clone, Default)]
pub struct PolicyEvaluator {
    config: EvaluatorConfig,
}

impl PolicyEvaluator {
    pub fn new(config: EvaluatorConfig) -> Self {
        Self { config }
    }

    /// Evaluate a request against a policy. Never fails: errors become Deny.
    ///
    /// A trace is attached only when the evaluator was configured with `debug`.
    pub fn evaluate(&self, policy: &Policy, ctx: &EvaluationContext) -> EvaluationResult {
        self.run(policy, ctx, self.config.debug)
    }

    /// Same as `evaluate()` but always records a per-rule trace.
    pub fn evaluate_with_trace(
        &self,
        policy: &Policy,
        ctx: &EvaluationContext,
    ) -> EvaluationResult {
        self.run(policy, ctx, true)
    }

    fn run(&self, policy: &Policy, ctx: &EvaluationContext, trace: bool) -> EvaluationResult {
        let started = Instant::now();
        let mut tracer = Tracer::new(trace);

        let outcome = if !policy.enabled {
            Ok(EvaluationResult::deny("Policy is disabled"))
        } else {
            let rules = policy.active_rules();
            match policy.evaluation_mode {
                EvaluationMode::FirstMatch => self.first_match(&rules, ctx, &mut tracer),
                EvaluationMode::AllRules => self.all_rules(&rules, ctx, &mut tracer),
                EvaluationMode::PriorityOrder => {
                    self.priority_order(policy, &rules, ctx, &mut tracer)
                }
            }
        };

        let mut result = outcome.unwrap_or_else(|err| {
            tracing::warn!(
                policy_id = %policy.id,
                agent = %ctx.agent_did,
                tool = %ctx.tool.id,
                "policy evaluation failed closed: {}",
                err
            );
            EvaluationResult::deny(format!("Evaluation error (failing closed): {}", err))
        });
        result.trace = tracer.finish();
        result.processing_time = started.elapsed();

        tracing::debug!(
            policy_id = %policy.id,
            agent = %ctx.agent_did,
            tool = %ctx.tool.id,
            decision = %result.decision,
            rule = result.matched_rule.as_ref().map(|r| r.id.as_str()).unwrap_or("-"),
            "policy decision: {}",
            result.reason
        );
        result
    }

    fn check(
        &self,
        rule: &Rule,
        ctx: &EvaluationContext,
        tracer: &mut Tracer,
    ) -> Result<bool, EvaluationError> {
        let started = tracer.start();
        let outcome = evaluate_condition(&rule.condition, ctx, &self.config);
        tracer.record(rule, started, &outcome);
        outcome
    }

    fn first_match(
        &self,
        rules: &[&Rule],
        ctx: &EvaluationContext,
        tracer: &mut Tracer,
    ) -> Result<EvaluationResult, EvaluationError> {
        for &rule in rules {
            if self.check(rule, ctx, tracer)? {
                return Ok(EvaluationResult::from_rule(
                    rule,
                    rule.action.decision(),
                    extract_obligations(&rule.action),
                ));
            }
        }
        Ok(EvaluationResult::deny("no rules matched"))
    }

    fn all_rules(
        &self,
        rules: &[&Rule],
        ctx: &EvaluationContext,
        tracer: &mut Tracer,
    ) -> Result<EvaluationResult, EvaluationError> {
        let mut obligations = Vec::new();
        let mut matched: Vec<&Rule> = Vec::new();
        let mut winner: Option<&Rule> = None;

        for &rule in rules {
            if !self.check(rule, ctx, tracer)? {
                continue;
            }
            obligations.extend(extract_obligations(&rule.action));
            matched.push(rule);
            // Ties keep the earliest (lowest priority number) rule.
            let outranks = winner.map_or(true, |w| {
                rule.action.decision().precedence() > w.action.decision().precedence()
            });
            if outranks {
                winner = Some(rule);
            }
        }

        let Some(winner) = winner else {
            return Ok(EvaluationResult::deny(format!(
                "no rules matched ({} evaluated)",
                rules.len()
            )));
        };

        let mut result =
            EvaluationResult::from_rule(winner, winner.action.decision(), obligations);
        let names: Vec<&str> = matched.iter().map(|r| r.display_name()).collect();
        result.reason = format!(
            "{} of {} rules matched ({}); decided by rule: {}",
            matched.len(),
            rules.len(),
            names.join(", "),
            winner.display_name()
        );
        Ok(result)
    }

    fn priority_order(
        &self,
        policy: &Policy,
        rules: &[&Rule],
        ctx: &EvaluationContext,
        tracer: &mut Tracer,
    ) -> Result<EvaluationResult, EvaluationError> {
        let mut obligations = Vec::new();

        for &rule in rules {
            if !self.check(rule, ctx, tracer)? {
                continue;
            }
            obligations.extend(extract_obligations(&rule.action));
            if rule.action.is_decisive() {
                return Ok(EvaluationResult::from_rule(
                    rule,
                    rule.action.decision(),
                    obligations,
                ));
            }
        }

        Ok(EvaluationResult {
            decision: policy.default_action.decision(),
            action: policy.default_action.to_action(),
            matched_rule: None,
            reason: "no decisive rules matched, applied default action".to_string(),
            obligations,
            trace: None,
            processing_time: Duration::ZERO,
        })
    }
}

/// Evaluate with a default-configured evaluator.
pub fn evaluate(policy: &Policy, ctx: &EvaluationContext) -> EvaluationResult {
    PolicyEvaluator::default().evaluate(policy, ctx)
}
