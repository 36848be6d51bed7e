// lint.rs — `tpe lint`: analysis findings plus consistency errors.
//
// Exits non-zero when the policy has consistency errors or analysis issues;
// warnings and suggestions are informational.

use std::path::Path;

use serde_json::json;
use tpe_policy::{analyze_policy, load_policy, validate_policy_consistency};

use super::print_json;

pub fn execute(path: &Path) -> anyhow::Result<()> {
    let policy = load_policy(path)?;
    let analysis = analyze_policy(&policy);
    let consistency = validate_policy_consistency(&policy);

    print_json(&json!({
        "policyId": policy.id,
        "analysis": analysis,
        "consistency": consistency,
    }))?;

    let problems = analysis.issues.len() + consistency.errors.len();
    if problems > 0 {
        anyhow::bail!("{} has {} problem(s)", path.display(), problems);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &tempfile::TempDir, body: serde_json::Value) -> std::path::PathBuf {
        let path = dir.path().join("policy.json");
        std::fs::write(&path, body.to_string()).unwrap();
        path
    }

    #[test]
    fn clean_policy_passes() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            json!({"id": "p", "rules": [
                {"id": "r", "priority": 1,
                 "condition": {"type": "tool", "operator": "equals", "value": "db"},
                 "action": {"type": "allow"}}
            ]}),
        );
        execute(&path).unwrap();
    }

    #[test]
    fn shadowing_deny_fails_lint() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            json!({"id": "p", "rules": [
                {"id": "lockdown", "priority": 0,
                 "condition": {"type": "trust_level", "operator": "greater_than_or_equal", "value": "UNKNOWN"},
                 "action": {"type": "deny"}},
                {"id": "r", "priority": 1,
                 "condition": {"type": "tool", "operator": "equals", "value": "db"},
                 "action": {"type": "allow"}}
            ]}),
        );
        let err = execute(&path).unwrap_err();
        assert!(err.to_string().contains("1 problem(s)"));
    }
}
