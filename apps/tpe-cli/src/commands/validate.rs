// validate.rs — `tpe validate`: schema-check a policy file.

use std::path::Path;

use serde_json::json;
use tpe_policy::{load_policy, PolicyError};

use super::print_json;

pub fn execute(path: &Path) -> anyhow::Result<()> {
    match load_policy(path) {
        Ok(policy) => print_json(&json!({
            "valid": true,
            "policyId": policy.id,
            "rules": policy.rules.len(),
            "evaluationMode": policy.evaluation_mode,
        })),
        Err(PolicyError::Invalid(err)) => {
            print_json(&json!({
                "valid": false,
                "issues": &err.issues,
            }))?;
            anyhow::bail!(
                "{} failed validation with {} issue(s)",
                path.display(),
                err.issues.len()
            )
        }
        Err(e) => Err(e.into()),
    }
}
