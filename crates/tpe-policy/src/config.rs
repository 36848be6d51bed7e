// config.rs — Evaluator configuration.
//
// Loaded from a small TOML file (e.g. `policy-engine.toml`) or built in code.
// Every field has a default so an empty file is a valid config:
//
// ```toml
// debug = false
// max_condition_depth = 32
// max_credentials = 256
// ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::PolicyError;

/// Resource bounds and diagnostics for a `PolicyEvaluator`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EvaluatorConfig {
    /// Attach per-rule trace steps to every result. Off in production:
    /// traces cost time and expose policy internals.
    #[serde(default)]
    pub debug: bool,

    /// Deepest condition tree the evaluator will walk before failing closed.
    #[serde(default = "default_max_condition_depth")]
    pub max_condition_depth: usize,

    /// Most credentials a single context may carry before failing closed.
    #[serde(default = "default_max_credentials")]
    pub max_credentials: usize,
}

fn default_max_condition_depth() -> usize {
    32
}

fn default_max_credentials() -> usize {
    256
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            debug: false,
            max_condition_depth: default_max_condition_depth(),
            max_credentials: default_max_credentials(),
        }
    }
}

impl EvaluatorConfig {
    /// Default bounds with tracing switched on.
    pub fn debug() -> Self {
        Self {
            debug: true,
            ..Self::default()
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self, PolicyError> {
        Ok(toml::from_str(content)?)
    }

    pub fn load(path: &Path) -> Result<Self, PolicyError> {
        let content = std::fs::read_to_string(path).map_err(|source| PolicyError::ReadFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let config = EvaluatorConfig::from_toml_str("").unwrap();
        assert_eq!(config, EvaluatorConfig::default());
        assert!(!config.debug);
        assert_eq!(config.max_condition_depth, 32);
    }

    #[test]
    fn partial_file_overrides_only_given_fields() {
        let config = EvaluatorConfig::from_toml_str("debug = true\nmax_credentials = 8\n").unwrap();
        assert!(config.debug);
        assert_eq!(config.max_credentials, 8);
        assert_eq!(config.max_condition_depth, 32);
    }

    #[test]
    fn malformed_toml_is_a_config_error() {
        let err = EvaluatorConfig::from_toml_str("debug = \"yes\"").unwrap_err();
        assert!(matches!(err, PolicyError::Config(_)));
    }

    #[test]
    fn load_from_tempfile() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.toml");
        std::fs::write(&path, "max_condition_depth = 4\n").unwrap();
        let config = EvaluatorConfig::load(&path).unwrap();
        assert_eq!(config.max_condition_depth, 4);
    }

    #[test]
    fn load_missing_file_reports_path() {
        let err = EvaluatorConfig::load(Path::new("/nonexistent/engine.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/engine.toml"));
    }
}
