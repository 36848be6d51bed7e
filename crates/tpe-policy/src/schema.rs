// schema.rs — Structural validation of raw policy documents.
//
// `validate()` walks a raw JSON document (YAML is converted to the same
// representation first) and records every structural violation it finds,
// each with the path where it occurred: unknown discriminants, missing
// fields, out-of-range priorities, malformed ids, values an operator cannot
// compare with the request field they target, bad regex sources. Only a
// document with zero issues is converted into a typed `Policy`.
//
// This is structure only. Policy-quality checks (duplicate priorities,
// unreachable rules, default-allow) belong to analysis.rs.

use std::fmt;
use std::path::Path;

use chrono::{DateTime, NaiveTime, Utc};
use serde_json::{Map, Value};

use crate::action::ActionKind;
use crate::condition::{ComparisonOperator, ConditionKind};
use crate::context::TrustLevel;
use crate::error::{PolicyError, ValidationError, ValidationIssue};
use crate::operators::compile_regex;
use crate::policy::{Policy, MAX_PRIORITY};

/// Longest accepted id.
pub const MAX_ID_LEN: usize = 128;

/// Deepest condition tree the validator will walk.
pub const MAX_SCHEMA_DEPTH: usize = 64;

const EVALUATION_MODES: &[&str] = &["first_match", "all_rules", "priority_order"];
const DEFAULT_ACTIONS: &[&str] = &["allow", "deny"];
const LOGICAL_OPERATORS: &[&str] = &["AND", "OR", "NOT"];
const LOG_LEVELS: &[&str] = &["debug", "info", "warn", "error"];
const ALERT_SEVERITIES: &[&str] = &["low", "medium", "high", "critical"];

/// Validate a raw policy document and convert it into a typed `Policy`.
pub fn validate(raw: &Value) -> Result<Policy, ValidationError> {
    let mut v = Validator::default();
    v.check_policy(raw);
    if !v.issues.is_empty() {
        return Err(ValidationError { issues: v.issues });
    }
    serde_json::from_value(raw.clone()).map_err(|e| ValidationError::single("$", e.to_string()))
}

/// Re-run validation on an in-memory policy (e.g. one assembled in code)
/// before it is activated.
pub fn revalidate(policy: &Policy) -> Result<(), ValidationError> {
    // Serialization recurses, so over-deep trees are refused first.
    let too_deep: Vec<ValidationIssue> = policy
        .rules
        .iter()
        .enumerate()
        .filter(|(_, rule)| rule.condition.depth() > MAX_SCHEMA_DEPTH)
        .map(|(i, _)| ValidationIssue {
            path: format!("rules[{}].condition", i),
            message: format!("condition nested deeper than {} levels", MAX_SCHEMA_DEPTH),
        })
        .collect();
    if !too_deep.is_empty() {
        return Err(ValidationError { issues: too_deep });
    }
    let raw = serde_json::to_value(policy).map_err(|e| ValidationError::single("$", e.to_string()))?;
    validate(&raw).map(|_| ())
}

pub fn parse_policy_json(content: &str) -> Result<Policy, PolicyError> {
    let raw: Value = serde_json::from_str(content)?;
    Ok(validate(&raw)?)
}

pub fn parse_policy_yaml(content: &str) -> Result<Policy, PolicyError> {
    let raw: Value = serde_yaml::from_str(content)?;
    Ok(validate(&raw)?)
}

/// Load and validate a policy file; the extension selects JSON or YAML.
pub fn load_policy(path: &Path) -> Result<Policy, PolicyError> {
    let content = std::fs::read_to_string(path).map_err(|source| PolicyError::ReadFailed {
        path: path.to_path_buf(),
        source,
    })?;
    let policy = match path.extension().and_then(|e| e.to_str()) {
        Some("json") => parse_policy_json(&content)?,
        Some("yaml") | Some("yml") => parse_policy_yaml(&content)?,
        _ => {
            return Err(PolicyError::UnsupportedFormat {
                path: path.to_path_buf(),
            })
        }
    };
    tracing::info!(
        policy_id = %policy.id,
        rules = policy.rules.len(),
        "loaded policy from {}",
        path.display()
    );
    Ok(policy)
}

/// Ids: 1..=128 ASCII alphanumerics, `-`, `_`, `.`, `:`.
pub fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_ID_LEN
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':'))
}

fn join(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", path, key)
    }
}

fn index(path: &str, i: usize) -> String {
    format!("{}[{}]", path, i)
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Type of the request field a leaf compares against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldType {
    Text,
    Number,
}

impl FieldType {
    fn accepts(self, value: &Value) -> bool {
        match self {
            FieldType::Text => value.is_string(),
            FieldType::Number => value.is_number(),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FieldType::Text => "string",
            FieldType::Number => "number",
        })
    }
}

#[derive(Default)]
struct Validator {
    issues: Vec<ValidationIssue>,
}

impl Validator {
    fn issue(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.issues.push(ValidationIssue {
            path: path.into(),
            message: message.into(),
        });
    }

    fn object<'a>(&mut self, path: &str, value: &'a Value) -> Option<&'a Map<String, Value>> {
        match value {
            Value::Object(map) => Some(map),
            other => {
                let at = if path.is_empty() { "$" } else { path };
                self.issue(at, format!("expected an object, found {}", describe(other)));
                None
            }
        }
    }

    fn required<'a>(
        &mut self,
        map: &'a Map<String, Value>,
        path: &str,
        key: &str,
    ) -> Option<&'a Value> {
        let value = map.get(key);
        if value.is_none() {
            self.issue(join(path, key), "missing required field");
        }
        value
    }

    fn id_field(&mut self, map: &Map<String, Value>, path: &str, key: &str, required: bool) {
        let field = join(path, key);
        match map.get(key) {
            None if required => self.issue(field, "missing required field"),
            None => {}
            Some(Value::String(id)) if is_valid_id(id) => {}
            Some(Value::String(id)) => self.issue(
                field,
                format!(
                    "malformed id '{}' (1-{} chars of A-Z, a-z, 0-9, '-', '_', '.', ':')",
                    id, MAX_ID_LEN
                ),
            ),
            Some(other) => self.issue(field, format!("expected a string, found {}", describe(other))),
        }
    }

    fn optional_string(&mut self, map: &Map<String, Value>, path: &str, key: &str) {
        if let Some(value) = map.get(key) {
            if !value.is_string() {
                self.issue(
                    join(path, key),
                    format!("expected a string, found {}", describe(value)),
                );
            }
        }
    }

    fn optional_bool(&mut self, map: &Map<String, Value>, path: &str, key: &str) {
        if let Some(value) = map.get(key) {
            if !value.is_boolean() {
                self.issue(
                    join(path, key),
                    format!("expected a boolean, found {}", describe(value)),
                );
            }
        }
    }

    fn optional_enum(&mut self, map: &Map<String, Value>, path: &str, key: &str, allowed: &[&str]) {
        let Some(value) = map.get(key) else {
            return;
        };
        match value.as_str() {
            Some(s) if allowed.contains(&s) => {}
            Some(s) => self.issue(
                join(path, key),
                format!("unknown value '{}' (expected one of: {})", s, allowed.join(", ")),
            ),
            None => self.issue(
                join(path, key),
                format!("expected a string, found {}", describe(value)),
            ),
        }
    }

    /// Positive integer no larger than `max`.
    fn optional_count(&mut self, map: &Map<String, Value>, path: &str, key: &str, max: u64) -> bool {
        let Some(value) = map.get(key) else {
            return false;
        };
        match value.as_u64() {
            Some(n) if n > 0 && n <= max => {}
            _ => self.issue(
                join(path, key),
                format!("expected a positive integer up to {}", max),
            ),
        }
        true
    }

    fn string_list(&mut self, path: &str, value: &Value, non_empty: bool) {
        match value {
            Value::Array(items) => {
                if non_empty && items.is_empty() {
                    self.issue(path, "must contain at least one entry");
                }
                for (i, item) in items.iter().enumerate() {
                    if !item.is_string() {
                        self.issue(
                            index(path, i),
                            format!("expected a string, found {}", describe(item)),
                        );
                    }
                }
            }
            other => self.issue(path, format!("expected an array, found {}", describe(other))),
        }
    }

    fn unknown_keys(&mut self, map: &Map<String, Value>, path: &str, known: &[&str]) {
        for key in map.keys() {
            if !known.contains(&key.as_str()) {
                self.issue(join(path, key), "unknown field");
            }
        }
    }

    // ── Policy / rules ──

    fn check_policy(&mut self, raw: &Value) {
        let Some(map) = self.object("", raw) else {
            return;
        };
        self.id_field(map, "", "id", true);
        self.optional_string(map, "", "name");
        self.optional_string(map, "", "description");
        self.optional_string(map, "", "version");
        self.optional_bool(map, "", "enabled");
        self.optional_enum(map, "", "defaultAction", DEFAULT_ACTIONS);
        self.optional_enum(map, "", "evaluationMode", EVALUATION_MODES);

        match self.required(map, "", "rules") {
            Some(Value::Array(rules)) => {
                if rules.is_empty() {
                    self.issue("rules", "a policy must contain at least one rule");
                }
                for (i, rule) in rules.iter().enumerate() {
                    self.check_rule(&index("rules", i), rule);
                }
            }
            Some(other) => {
                self.issue("rules", format!("expected an array, found {}", describe(other)))
            }
            None => {}
        }
    }

    fn check_rule(&mut self, path: &str, raw: &Value) {
        let Some(map) = self.object(path, raw) else {
            return;
        };
        self.id_field(map, path, "id", true);
        self.optional_string(map, path, "name");
        self.optional_string(map, path, "description");
        self.optional_bool(map, path, "enabled");

        if let Some(priority) = self.required(map, path, "priority") {
            match priority.as_u64() {
                Some(p) if p <= u64::from(MAX_PRIORITY) => {}
                _ => self.issue(
                    join(path, "priority"),
                    format!("priority must be an integer between 0 and {}", MAX_PRIORITY),
                ),
            }
        }
        if let Some(condition) = self.required(map, path, "condition") {
            self.check_node(&join(path, "condition"), condition, 1);
        }
        if let Some(action) = self.required(map, path, "action") {
            self.check_action(&join(path, "action"), action);
        }
    }

    // ── Condition trees ──

    fn check_node(&mut self, path: &str, raw: &Value, depth: usize) {
        if depth > MAX_SCHEMA_DEPTH {
            self.issue(
                path,
                format!("condition nested deeper than {} levels", MAX_SCHEMA_DEPTH),
            );
            return;
        }
        let Some(map) = self.object(path, raw) else {
            return;
        };
        let is_logical = map.contains_key("operands")
            || map
                .get("operator")
                .and_then(Value::as_str)
                .is_some_and(|op| LOGICAL_OPERATORS.contains(&op));
        if is_logical {
            self.check_logical(path, map, depth);
        } else {
            self.check_leaf(path, map);
        }
    }

    fn check_logical(&mut self, path: &str, map: &Map<String, Value>, depth: usize) {
        self.id_field(map, path, "id", false);
        self.unknown_keys(map, path, &["id", "operator", "operands"]);
        if let Some(op) = self.required(map, path, "operator") {
            match op.as_str() {
                Some(s) if LOGICAL_OPERATORS.contains(&s) => {}
                _ => self.issue(
                    join(path, "operator"),
                    "logical operator must be one of: AND, OR, NOT",
                ),
            }
        }
        match self.required(map, path, "operands") {
            Some(Value::Array(operands)) => {
                if operands.is_empty() {
                    self.issue(join(path, "operands"), "must contain at least one operand");
                }
                let operands_path = join(path, "operands");
                for (i, operand) in operands.iter().enumerate() {
                    self.check_node(&index(&operands_path, i), operand, depth + 1);
                }
            }
            Some(other) => self.issue(
                join(path, "operands"),
                format!("expected an array, found {}", describe(other)),
            ),
            None => {}
        }
    }

    fn check_leaf(&mut self, path: &str, map: &Map<String, Value>) {
        self.unknown_keys(map, path, &["type", "operator", "value"]);
        let kind = match self.required(map, path, "type") {
            Some(Value::String(name)) => match ConditionKind::parse(name) {
                Some(kind) => Some(kind),
                None => {
                    self.issue(
                        join(path, "type"),
                        format!("unknown condition type '{}'", name),
                    );
                    None
                }
            },
            Some(other) => {
                self.issue(
                    join(path, "type"),
                    format!("expected a string, found {}", describe(other)),
                );
                None
            }
            None => None,
        };
        let operator = match self.required(map, path, "operator") {
            Some(Value::String(name)) => match ComparisonOperator::parse(name) {
                Some(op) => Some(op),
                None => {
                    self.issue(
                        join(path, "operator"),
                        format!("unknown comparison operator '{}'", name),
                    );
                    None
                }
            },
            Some(other) => {
                self.issue(
                    join(path, "operator"),
                    format!("expected a string, found {}", describe(other)),
                );
                None
            }
            None => None,
        };
        let value = self.required(map, path, "value");

        // Shape checks need all three.
        let (Some(kind), Some(operator), Some(value)) = (kind, operator, value) else {
            return;
        };
        let value_path = join(path, "value");
        match kind {
            ConditionKind::AgentDid => {
                self.check_operand(&value_path, operator, FieldType::Text, value)
            }
            ConditionKind::TrustLevel => self.check_trust_value(&value_path, operator, value),
            ConditionKind::VerifiableCredential => {
                self.check_credential_value(&value_path, operator, value)
            }
            ConditionKind::Tool => self.check_tool_value(&value_path, operator, value),
            ConditionKind::Time => self.check_time_value(&value_path, value),
            ConditionKind::Context => self.check_context_value(&value_path, operator, value),
            ConditionKind::Organization => {
                self.check_organization_value(&value_path, operator, value)
            }
        }
    }

    /// A generic expected value checked against the type of the request
    /// field it is compared with. Any pairing `operators::compare` would
    /// reject, or that can never match, is reported here.
    fn check_operand(
        &mut self,
        path: &str,
        operator: ComparisonOperator,
        field: FieldType,
        value: &Value,
    ) {
        use crate::condition::ComparisonOperator::*;

        match value {
            Value::Null | Value::Object(_) => {
                self.issue(
                    path,
                    format!("expected a {} or array, found {}", field, describe(value)),
                );
                return;
            }
            Value::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    if !field.accepts(item) {
                        self.issue(
                            index(path, i),
                            format!("expected a {} list entry, found {}", field, describe(item)),
                        );
                    }
                }
            }
            _ => {}
        }

        match operator {
            InList | NotInList => {
                if !value.is_array() {
                    self.issue(path, format!("operator '{}' requires an array value", operator));
                }
            }
            Contains | NotContains => {
                // A list means membership; a scalar means substring.
                if !value.is_array() && !(field == FieldType::Text && value.is_string()) {
                    self.issue(
                        path,
                        format!(
                            "operator '{}' on a {} field requires {}",
                            operator,
                            field,
                            match field {
                                FieldType::Text => "a string or array value",
                                FieldType::Number => "an array value",
                            }
                        ),
                    );
                }
            }
            StartsWith | EndsWith => {
                if field != FieldType::Text {
                    self.issue(
                        path,
                        format!("operator '{}' cannot be applied to a {} field", operator, field),
                    );
                } else if !value.is_string() {
                    self.issue(path, format!("operator '{}' requires a string value", operator));
                }
            }
            MatchesRegex => match value.as_str() {
                Some(pattern) => {
                    if let Err(e) = compile_regex(pattern) {
                        self.issue(path, e.to_string());
                    }
                }
                None => self.issue(path, "operator 'matches_regex' requires a string pattern"),
            },
            Equals | NotEquals | GreaterThan | GreaterThanOrEqual | LessThan
            | LessThanOrEqual => {
                if !field.accepts(value) {
                    self.issue(
                        path,
                        format!(
                            "operator '{}' on a {} field requires a {} value, found {}",
                            operator,
                            field,
                            field,
                            describe(value)
                        ),
                    );
                }
            }
        }
    }

    fn check_trust_value(&mut self, path: &str, operator: ComparisonOperator, value: &Value) {
        use crate::condition::ComparisonOperator::*;

        let ordinal_ops = [
            Equals,
            NotEquals,
            GreaterThan,
            GreaterThanOrEqual,
            LessThan,
            LessThanOrEqual,
        ];
        match value {
            Value::Number(_) | Value::String(_) => {
                if let Value::String(name) = value {
                    if TrustLevel::parse(name).is_none() {
                        self.issue(path, format!("unknown trust level '{}'", name));
                    }
                }
                if !ordinal_ops.contains(&operator) {
                    self.issue(
                        path,
                        format!("operator '{}' cannot compare a single trust level", operator),
                    );
                }
            }
            Value::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    if item.as_str().and_then(TrustLevel::parse).is_none() {
                        self.issue(index(path, i), "expected a trust level name");
                    }
                }
                if !matches!(operator, InList | NotInList | Contains | NotContains) {
                    self.issue(
                        path,
                        format!("operator '{}' cannot test membership in a trust level list", operator),
                    );
                }
            }
            other => self.issue(
                path,
                format!(
                    "expected a trust score, trust level name or list of names, found {}",
                    describe(other)
                ),
            ),
        }
    }

    fn check_credential_value(&mut self, path: &str, operator: ComparisonOperator, value: &Value) {
        use crate::condition::ComparisonOperator::*;

        if !matches!(operator, Equals | Contains | NotEquals | NotContains) {
            self.issue(
                path,
                format!(
                    "operator '{}' is not supported for credentials (use equals, contains, not_equals or not_contains)",
                    operator
                ),
            );
        }
        let Some(map) = self.object(path, value) else {
            return;
        };
        self.unknown_keys(map, path, &["type", "issuer", "claims", "expirationCheck"]);
        self.optional_string(map, path, "type");
        self.optional_string(map, path, "issuer");
        self.optional_bool(map, path, "expirationCheck");
        if let Some(claims) = map.get("claims") {
            if !claims.is_object() {
                self.issue(
                    join(path, "claims"),
                    format!("expected an object, found {}", describe(claims)),
                );
            }
        }
    }

    fn check_tool_value(&mut self, path: &str, operator: ComparisonOperator, value: &Value) {
        match value {
            Value::String(_) => self.check_operand(path, operator, FieldType::Text, value),
            Value::Array(items) => {
                if items.is_empty() {
                    self.issue(path, "must contain at least one entry");
                }
                self.check_operand(path, operator, FieldType::Text, value);
            }
            Value::Object(map) => {
                let fields = ["toolId", "toolType", "endpoint", "sensitivity"];
                self.unknown_keys(map, path, &fields);
                self.check_sub_operands(path, operator, map, &fields);
            }
            other => self.issue(
                path,
                format!("expected a tool id, list of ids or object, found {}", describe(other)),
            ),
        }
    }

    fn check_context_value(&mut self, path: &str, operator: ComparisonOperator, value: &Value) {
        let Some(map) = self.object(path, value) else {
            return;
        };
        self.unknown_keys(map, path, &["ipAddress", "userAgent", "location", "riskScore"]);
        let mut specified = 0;
        let fields = [
            ("ipAddress", FieldType::Text),
            ("userAgent", FieldType::Text),
            ("riskScore", FieldType::Number),
        ];
        for (key, field) in fields {
            if let Some(sub) = map.get(key) {
                specified += 1;
                self.check_operand(&join(path, key), operator, field, sub);
            }
        }
        if let Some(location) = map.get("location") {
            let location_path = join(path, "location");
            if let Some(loc) = self.object(&location_path, location) {
                self.unknown_keys(loc, &location_path, &["country"]);
                match loc.get("country") {
                    Some(country) => {
                        specified += 1;
                        self.check_operand(
                            &join(&location_path, "country"),
                            operator,
                            FieldType::Text,
                            country,
                        );
                    }
                    None => self.issue(join(&location_path, "country"), "missing required field"),
                }
            }
        }
        if specified == 0 {
            self.issue(
                path,
                "context condition must specify at least one of: ipAddress, userAgent, location.country, riskScore",
            );
        }
    }

    fn check_organization_value(&mut self, path: &str, operator: ComparisonOperator, value: &Value) {
        match value {
            Value::String(_) => self.check_operand(path, operator, FieldType::Text, value),
            Value::Array(items) => {
                if items.is_empty() {
                    self.issue(path, "must contain at least one entry");
                }
                self.check_operand(path, operator, FieldType::Text, value);
            }
            Value::Object(map) => {
                self.unknown_keys(map, path, &["orgId"]);
                match map.get("orgId") {
                    Some(org) => {
                        self.check_operand(&join(path, "orgId"), operator, FieldType::Text, org)
                    }
                    None => self.issue(join(path, "orgId"), "missing required field"),
                }
            }
            other => self.issue(
                path,
                format!(
                    "expected an organization id, list of ids or object, found {}",
                    describe(other)
                ),
            ),
        }
    }

    fn check_sub_operands(
        &mut self,
        path: &str,
        operator: ComparisonOperator,
        map: &Map<String, Value>,
        fields: &[&str],
    ) {
        let mut specified = 0;
        for key in fields {
            if let Some(sub) = map.get(*key) {
                specified += 1;
                self.check_operand(&join(path, key), operator, FieldType::Text, sub);
            }
        }
        if specified == 0 {
            self.issue(
                path,
                format!("must specify at least one of: {}", fields.join(", ")),
            );
        }
    }

    fn check_time_value(&mut self, path: &str, value: &Value) {
        let Some(map) = self.object(path, value) else {
            return;
        };
        self.unknown_keys(map, path, &["startTime", "endTime", "daysOfWeek"]);
        let start = self.time_bound(map, path, "startTime");
        let end = self.time_bound(map, path, "endTime");
        if let (Some(start), Some(end)) = (start, end) {
            if start != end {
                self.issue(
                    path,
                    "startTime and endTime must both be timestamps or both be times of day",
                );
            }
        }
        if let Some(days) = map.get("daysOfWeek") {
            let days_path = join(path, "daysOfWeek");
            match days {
                Value::Array(items) if !items.is_empty() => {
                    for (i, day) in items.iter().enumerate() {
                        if !day.as_u64().is_some_and(|d| d <= 6) {
                            self.issue(index(&days_path, i), "day of week must be an integer 0-6 (0 = Sunday)");
                        }
                    }
                }
                Value::Array(_) => self.issue(days_path, "must contain at least one day"),
                other => self.issue(days_path, format!("expected an array, found {}", describe(other))),
            }
        }
        if map.is_empty() {
            self.issue(
                path,
                "time condition must specify startTime, endTime or daysOfWeek",
            );
        }
    }

    /// Returns the bound's kind (true = instant, false = time of day) when valid.
    fn time_bound(&mut self, map: &Map<String, Value>, path: &str, key: &str) -> Option<bool> {
        let value = map.get(key)?;
        let field = join(path, key);
        let Some(text) = value.as_str() else {
            self.issue(field, format!("expected a string, found {}", describe(value)));
            return None;
        };
        if text.parse::<DateTime<Utc>>().is_ok() {
            Some(true)
        } else if text.parse::<NaiveTime>().is_ok() {
            Some(false)
        } else {
            self.issue(
                field,
                format!("'{}' is neither an RFC 3339 timestamp nor an HH:MM:SS time", text),
            );
            None
        }
    }

    // ── Actions ──

    fn check_action(&mut self, path: &str, raw: &Value) {
        let Some(map) = self.object(path, raw) else {
            return;
        };
        let kind = match self.required(map, path, "type") {
            Some(Value::String(name)) => match ActionKind::parse(name) {
                Some(kind) => kind,
                None => {
                    self.issue(join(path, "type"), format!("unknown action type '{}'", name));
                    return;
                }
            },
            Some(other) => {
                self.issue(
                    join(path, "type"),
                    format!("expected a string, found {}", describe(other)),
                );
                return;
            }
            None => return,
        };

        match kind {
            ActionKind::Allow => {
                self.unknown_keys(map, path, &["type", "conditions"]);
                if let Some(conditions) = map.get("conditions") {
                    let cpath = join(path, "conditions");
                    if let Some(c) = self.object(&cpath, conditions) {
                        self.unknown_keys(c, &cpath, &["timeLimit", "usageLimit", "requireMFA"]);
                        self.optional_count(c, &cpath, "timeLimit", u64::MAX);
                        self.optional_count(c, &cpath, "usageLimit", u64::MAX);
                        self.optional_bool(c, &cpath, "requireMFA");
                    }
                }
            }
            ActionKind::Deny => {
                self.unknown_keys(map, path, &["type", "reason"]);
                self.optional_string(map, path, "reason");
            }
            ActionKind::Throttle => {
                self.unknown_keys(map, path, &["type", "limits"]);
                if let Some(limits) = self.required(map, path, "limits") {
                    let lpath = join(path, "limits");
                    if let Some(l) = self.object(&lpath, limits) {
                        let fields = [
                            "requestsPerMinute",
                            "requestsPerHour",
                            "requestsPerDay",
                            "burstLimit",
                        ];
                        self.unknown_keys(l, &lpath, &fields);
                        let mut any = false;
                        for key in fields {
                            any |= self.optional_count(l, &lpath, key, u64::from(u32::MAX));
                        }
                        if !any {
                            self.issue(
                                lpath,
                                format!("must specify at least one of: {}", fields.join(", ")),
                            );
                        }
                    }
                }
            }
            ActionKind::Log => {
                self.unknown_keys(map, path, &["type", "level", "includeContext"]);
                self.optional_enum(map, path, "level", LOG_LEVELS);
                self.optional_bool(map, path, "includeContext");
            }
            ActionKind::Alert => {
                self.unknown_keys(map, path, &["type", "severity", "channels", "recipients"]);
                self.optional_enum(map, path, "severity", ALERT_SEVERITIES);
                for key in ["channels", "recipients"] {
                    if let Some(list) = map.get(key) {
                        self.string_list(&join(path, key), list, false);
                    }
                }
            }
            ActionKind::RequireApproval => {
                self.unknown_keys(map, path, &["type", "approvers", "timeout", "autoApproveAfter"]);
                if let Some(approvers) = self.required(map, path, "approvers") {
                    self.string_list(&join(path, "approvers"), approvers, true);
                }
                self.optional_count(map, path, "timeout", u64::MAX);
                self.optional_count(map, path, "autoApproveAfter", u64::MAX);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::action::Action;
    use crate::condition::{Condition, ConditionNode, TrustLevelValue};
    use crate::policy::EvaluationMode;

    fn minimal_rule() -> Value {
        json!({
            "id": "r-1",
            "name": "Verified agents",
            "priority": 10,
            "condition": {"type": "trust_level", "operator": "greater_than_or_equal", "value": "VERIFIED"},
            "action": {"type": "allow", "conditions": {"requireMFA": true}}
        })
    }

    fn minimal_policy() -> Value {
        json!({
            "id": "policy-1",
            "name": "Baseline",
            "defaultAction": "deny",
            "evaluationMode": "first_match",
            "rules": [minimal_rule()]
        })
    }

    #[test]
    fn valid_policy_converts_to_typed_model() {
        let policy = validate(&minimal_policy()).unwrap();
        assert_eq!(policy.id, "policy-1");
        assert_eq!(policy.evaluation_mode, EvaluationMode::FirstMatch);
        match &policy.rules[0].condition {
            ConditionNode::Leaf(Condition::TrustLevel { value, .. }) => {
                assert_eq!(*value, TrustLevelValue::Level(TrustLevel::Verified));
            }
            other => panic!("expected trust_level leaf, got {:?}", other),
        }
        assert!(matches!(policy.rules[0].action, Action::Allow { .. }));
    }

    #[test]
    fn every_violation_is_reported() {
        let raw = json!({
            "id": "bad id!",
            "evaluationMode": "random",
            "rules": [{
                "id": "r-1",
                "priority": 1001,
                "condition": {"type": "mood", "operator": "equals", "value": "happy"},
                "action": {"type": "explode"}
            }]
        });
        let err = validate(&raw).unwrap_err();
        assert!(err.has_issue_at("id"));
        assert!(err.has_issue_at("evaluationMode"));
        assert!(err.has_issue_at("rules[0].priority"));
        assert!(err.has_issue_at("rules[0].condition.type"));
        assert!(err.has_issue_at("rules[0].action.type"));
        assert_eq!(err.issues.len(), 5);
    }

    #[test]
    fn empty_rules_and_missing_fields_are_rejected() {
        let err = validate(&json!({"id": "p", "rules": []})).unwrap_err();
        assert!(err.has_issue_at("rules"));

        let err = validate(&json!({"rules": [{"id": "r"}]})).unwrap_err();
        assert!(err.has_issue_at("id"));
        assert!(err.has_issue_at("rules[0].priority"));
        assert!(err.has_issue_at("rules[0].condition"));
        assert!(err.has_issue_at("rules[0].action"));
    }

    #[test]
    fn logical_expressions_need_operands() {
        let mut raw = minimal_policy();
        raw["rules"][0]["condition"] = json!({"operator": "AND", "operands": []});
        let err = validate(&raw).unwrap_err();
        assert!(err.has_issue_at("rules[0].condition.operands"));

        raw["rules"][0]["condition"] = json!({"operator": "XOR", "operands": [
            {"type": "agent_did", "operator": "equals", "value": "did:x"}
        ]});
        let err = validate(&raw).unwrap_err();
        assert!(err.has_issue_at("rules[0].condition.operator"));
    }

    #[test]
    fn not_with_trailing_operands_is_structurally_valid() {
        let mut raw = minimal_policy();
        raw["rules"][0]["condition"] = json!({"operator": "NOT", "operands": [
            {"type": "agent_did", "operator": "equals", "value": "did:a"},
            {"type": "agent_did", "operator": "equals", "value": "did:b"}
        ]});
        assert!(validate(&raw).is_ok());
    }

    #[test]
    fn nested_operand_paths_are_precise() {
        let mut raw = minimal_policy();
        raw["rules"][0]["condition"] = json!({"operator": "OR", "operands": [
            {"type": "agent_did", "operator": "equals", "value": "did:a"},
            {"operator": "NOT", "operands": [
                {"type": "tool", "operator": "approximately", "value": "db"}
            ]}
        ]});
        let err = validate(&raw).unwrap_err();
        assert!(err.has_issue_at("rules[0].condition.operands[1].operands[0].operator"));
    }

    #[test]
    fn operator_value_shapes_are_checked() {
        let mut raw = minimal_policy();
        raw["rules"][0]["condition"] =
            json!({"type": "organization", "operator": "in_list", "value": "org-1"});
        assert!(validate(&raw)
            .unwrap_err()
            .has_issue_at("rules[0].condition.value"));

        raw["rules"][0]["condition"] =
            json!({"type": "agent_did", "operator": "matches_regex", "value": "(did"});
        assert!(validate(&raw)
            .unwrap_err()
            .has_issue_at("rules[0].condition.value"));

        raw["rules"][0]["condition"] =
            json!({"type": "trust_level", "operator": "greater_than", "value": "SUPREME"});
        assert!(validate(&raw)
            .unwrap_err()
            .has_issue_at("rules[0].condition.value"));

        raw["rules"][0]["condition"] = json!({"type": "trust_level", "operator": "in_list", "value": ["TRUSTED", "PRIVILEGED"]});
        assert!(validate(&raw).is_ok());
    }

    #[test]
    fn operands_must_fit_the_compared_field() {
        let rejected = [
            json!({"type": "context", "operator": "less_than", "value": {"riskScore": "0.5"}}),
            json!({"type": "context", "operator": "contains", "value": {"riskScore": 0.5}}),
            json!({"type": "context", "operator": "starts_with", "value": {"riskScore": "0"}}),
            json!({"type": "context", "operator": "in_list", "value": {"location": {"country": ["US", 1]}}}),
            json!({"type": "agent_did", "operator": "greater_than", "value": 5}),
            json!({"type": "agent_did", "operator": "contains", "value": 7}),
            json!({"type": "agent_did", "operator": "equals", "value": true}),
            json!({"type": "tool", "operator": "greater_than", "value": ["db", "cache"]}),
            json!({"type": "tool", "operator": "equals", "value": {"endpoint": 443}}),
            json!({"type": "organization", "operator": "ends_with", "value": {"orgId": 3}}),
        ];
        for condition in rejected {
            let mut raw = minimal_policy();
            raw["rules"][0]["condition"] = condition.clone();
            match validate(&raw) {
                Err(err) => assert!(
                    err.issues
                        .iter()
                        .any(|i| i.path.starts_with("rules[0].condition.value")),
                    "{}: {:?}",
                    condition,
                    err.issues
                ),
                Ok(_) => panic!("expected {} to be rejected", condition),
            }
        }

        let accepted = [
            json!({"type": "context", "operator": "less_than", "value": {"riskScore": 0.5}}),
            json!({"type": "context", "operator": "in_list", "value": {"riskScore": [0.1, 0.2]}}),
            json!({"type": "context", "operator": "matches_regex", "value": {"riskScore": "^0\\.[0-4]"}}),
            json!({"type": "agent_did", "operator": "greater_than", "value": "did:m"}),
            json!({"type": "tool", "operator": "contains", "value": {"toolId": "db", "toolType": "sql"}}),
            json!({"type": "organization", "operator": "not_in_list", "value": ["org-a", "org-b"]}),
        ];
        for condition in accepted {
            let mut raw = minimal_policy();
            raw["rules"][0]["condition"] = condition.clone();
            assert!(validate(&raw).is_ok(), "{}", condition);
        }
    }

    #[test]
    fn revalidate_refuses_over_deep_trees_before_serializing() {
        let mut policy = validate(&minimal_policy()).unwrap();
        let mut node = policy.rules[0].condition.clone();
        for _ in 0..10_000 {
            node = ConditionNode::Logical(crate::condition::LogicalExpression {
                id: None,
                operator: crate::condition::LogicalOperator::Not,
                operands: vec![node],
            });
        }
        policy.rules[0].condition = node;
        let err = revalidate(&policy).unwrap_err();
        assert_eq!(err.issues.len(), 1);
        assert!(err.has_issue_at("rules[0].condition"));
    }

    #[test]
    fn time_values_are_checked() {
        let mut raw = minimal_policy();
        raw["rules"][0]["condition"] = json!({"type": "time", "operator": "equals", "value": {
            "startTime": "09:00:00", "endTime": "2026-01-01T00:00:00Z", "daysOfWeek": [1, 7]
        }});
        let err = validate(&raw).unwrap_err();
        assert!(err.has_issue_at("rules[0].condition.value"));
        assert!(err.has_issue_at("rules[0].condition.value.daysOfWeek[1]"));

        raw["rules"][0]["condition"] = json!({"type": "time", "operator": "equals", "value": {
            "startTime": "09:00:00", "endTime": "17:00:00", "daysOfWeek": [1, 2, 3, 4, 5]
        }});
        assert!(validate(&raw).is_ok());
    }

    #[test]
    fn action_parameters_are_checked() {
        let mut raw = minimal_policy();
        raw["rules"][0]["action"] = json!({"type": "throttle", "limits": {}});
        assert!(validate(&raw)
            .unwrap_err()
            .has_issue_at("rules[0].action.limits"));

        raw["rules"][0]["action"] = json!({"type": "require_approval", "approvers": []});
        assert!(validate(&raw)
            .unwrap_err()
            .has_issue_at("rules[0].action.approvers"));

        raw["rules"][0]["action"] = json!({"type": "alert", "severity": "apocalyptic"});
        assert!(validate(&raw)
            .unwrap_err()
            .has_issue_at("rules[0].action.severity"));

        raw["rules"][0]["action"] = json!({"type": "allow", "conditions": {"timeLimit": -5}});
        assert!(validate(&raw)
            .unwrap_err()
            .has_issue_at("rules[0].action.conditions.timeLimit"));
    }

    #[test]
    fn unknown_fields_in_condition_values_are_rejected() {
        let mut raw = minimal_policy();
        raw["rules"][0]["condition"] =
            json!({"type": "tool", "operator": "equals", "value": {"toolName": "db"}});
        let err = validate(&raw).unwrap_err();
        assert!(err.has_issue_at("rules[0].condition.value.toolName"));
        assert!(err.has_issue_at("rules[0].condition.value"));
    }

    #[test]
    fn id_rules() {
        assert!(is_valid_id("policy-1"));
        assert!(is_valid_id("org:acme.rule_7"));
        assert!(!is_valid_id(""));
        assert!(!is_valid_id("has space"));
        assert!(!is_valid_id(&"x".repeat(MAX_ID_LEN + 1)));
    }

    #[test]
    fn non_object_root_is_rejected() {
        let err = validate(&json!([1, 2, 3])).unwrap_err();
        assert!(err.has_issue_at("$"));
    }

    #[test]
    fn yaml_policies_parse() {
        let yaml = r#"
id: yaml-policy
defaultAction: deny
rules:
  - id: business-hours
    priority: 5
    condition:
      type: time
      operator: equals
      value:
        startTime: "09:00:00"
        endTime: "17:00:00"
    action:
      type: allow
"#;
        let policy = parse_policy_yaml(yaml).unwrap();
        assert_eq!(policy.rules[0].priority, 5);
    }

    #[test]
    fn load_policy_picks_format_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let json_path = dir.path().join("policy.json");
        std::fs::write(&json_path, minimal_policy().to_string()).unwrap();
        assert_eq!(load_policy(&json_path).unwrap().id, "policy-1");

        let txt_path = dir.path().join("policy.txt");
        std::fs::write(&txt_path, "{}").unwrap();
        assert!(matches!(
            load_policy(&txt_path).unwrap_err(),
            PolicyError::UnsupportedFormat { .. }
        ));

        let bad_path = dir.path().join("bad.json");
        std::fs::write(&bad_path, r#"{"id": "p", "rules": []}"#).unwrap();
        assert!(matches!(
            load_policy(&bad_path).unwrap_err(),
            PolicyError::Invalid(_)
        ));
    }
}
