// eval.rs — `tpe eval`: evaluate a request context file against a policy.
//
// The context file uses the same camelCase wire format as the library.
// `timestamp` may be omitted, in which case the current time is used.

use std::path::Path;

use anyhow::Context;
use tpe_policy::{load_policy, EvaluationContext, EvaluatorConfig, PolicyEvaluator};

use super::print_json;

pub fn execute(
    policy_path: &Path,
    context_path: &Path,
    debug: bool,
    config_path: Option<&Path>,
) -> anyhow::Result<()> {
    let mut config = match config_path {
        Some(path) => EvaluatorConfig::load(path)?,
        None => EvaluatorConfig::default(),
    };
    config.debug |= debug;

    let policy = load_policy(policy_path)?;
    let context = load_context(context_path)?;

    let result = PolicyEvaluator::new(config).evaluate(&policy, &context);
    tracing::info!(
        policy_id = %policy.id,
        agent = %context.agent_did,
        decision = %result.decision,
        "evaluated {}",
        context_path.display()
    );
    print_json(&serde_json::to_value(&result)?)
}

fn load_context(path: &Path) -> anyhow::Result<EvaluationContext> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read context file {}", path.display()))?;
    let mut raw: serde_json::Value = match path.extension().and_then(|e| e.to_str()) {
        Some("yaml") | Some("yml") => serde_yaml::from_str(&content)?,
        _ => serde_json::from_str(&content)?,
    };
    if let Some(map) = raw.as_object_mut() {
        map.entry("timestamp")
            .or_insert_with(|| serde_json::Value::String(chrono::Utc::now().to_rfc3339()));
    }
    serde_json::from_value(raw)
        .with_context(|| format!("Invalid evaluation context in {}", path.display()))
}
