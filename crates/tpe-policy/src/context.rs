// context.rs — The per-request input to the evaluator.
//
// An EvaluationContext is assembled by upstream collaborators (identity,
// session, credential resolution) for every tool-access attempt. The engine
// only reads it. Credential expiry and revocation arrive pre-resolved as
// flags; the engine trusts them and never recomputes them.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Ordinal classification of an agent's verified trustworthiness.
///
/// Declaration order is the ordinal order, so `derive(Ord)` agrees with `score()`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrustLevel {
    Unknown,
    Basic,
    Verified,
    Trusted,
    Privileged,
}

impl TrustLevel {
    pub const ALL: [TrustLevel; 5] = [
        Self::Unknown,
        Self::Basic,
        Self::Verified,
        Self::Trusted,
        Self::Privileged,
    ];

    pub fn score(&self) -> u8 {
        match self {
            TrustLevel::Unknown => 0,
            TrustLevel::Basic => 1,
            TrustLevel::Verified => 2,
            TrustLevel::Trusted => 3,
            TrustLevel::Privileged => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TrustLevel::Unknown => "UNKNOWN",
            TrustLevel::Basic => "BASIC",
            TrustLevel::Verified => "VERIFIED",
            TrustLevel::Trusted => "TRUSTED",
            TrustLevel::Privileged => "PRIVILEGED",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|l| l.as_str() == name)
    }
}

impl fmt::Display for TrustLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A verifiable credential presented by the agent, already resolved upstream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CredentialInfo {
    pub id: String,
    #[serde(rename = "type")]
    pub credential_type: String,
    pub issuer: String,
    #[serde(default)]
    pub claims: BTreeMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_expired: bool,
    #[serde(default)]
    pub is_revoked: bool,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ToolSensitivity {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

impl ToolSensitivity {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolSensitivity::Low => "low",
            ToolSensitivity::Medium => "medium",
            ToolSensitivity::High => "high",
            ToolSensitivity::Critical => "critical",
        }
    }
}

/// The tool the agent is trying to invoke.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToolInfo {
    pub id: String,
    #[serde(rename = "type")]
    pub tool_type: String,
    #[serde(default)]
    pub sensitivity: ToolSensitivity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RequestContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// 0.0 (benign) to 1.0 (hostile), scored upstream.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_score: Option<f64>,
}

/// Everything the evaluator may inspect about one request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationContext {
    #[serde(rename = "agentDID")]
    pub agent_did: String,
    pub trust_level: TrustLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trust_score: Option<f64>,
    #[serde(default)]
    pub credentials: Vec<CredentialInfo>,
    pub tool: ToolInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_info: Option<SessionInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_context: Option<RequestContext>,
    pub organization_id: String,
    pub timestamp: DateTime<Utc>,
}

impl EvaluationContext {
    /// A minimal context: no credentials, session or request info, timestamped now.
    pub fn new(
        agent_did: impl Into<String>,
        trust_level: TrustLevel,
        tool: ToolInfo,
        organization_id: impl Into<String>,
    ) -> Self {
        Self {
            agent_did: agent_did.into(),
            trust_level,
            trust_score: None,
            credentials: Vec::new(),
            tool,
            session_info: None,
            request_context: None,
            organization_id: organization_id.into(),
            timestamp: Utc::now(),
        }
    }

    /// The numeric trust score, falling back to the level's ordinal score.
    pub fn effective_trust_score(&self) -> f64 {
        self.trust_score
            .unwrap_or_else(|| f64::from(self.trust_level.score()))
    }
}

impl ToolInfo {
    pub fn new(id: impl Into<String>, tool_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tool_type: tool_type.into(),
            sensitivity: ToolSensitivity::default(),
            endpoint: None,
        }
    }
}
