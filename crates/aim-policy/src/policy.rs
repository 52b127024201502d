// policy.rs — Organization security policies.
//
// A security policy maps a violation category (`policy_type`) and an agent
// selector (`applies_to`) to an enforcement action. Policies are owned by an
// organization and are read-only to the engine.
//
// Policies can be authored by administrators as YAML:
//
// ```yaml
// organization_id: "org-1"
// policies:
//   - name: "Block untrusted MCP servers"
//     policy_type: capability_violation
//     enforcement_action: block_and_alert
//     applies_to: "agent_type:mcp_server"
//     priority: 2000
//     severity_threshold: high
// ```

use std::fmt;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::PolicyError;
use crate::selector::AppliesTo;

/// Threshold used by the seeded low-trust monitor, on the 0–100 trust scale.
pub const DEFAULT_LOW_TRUST_THRESHOLD: f64 = 30.0;

/// The violation category a policy governs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PolicyType {
    /// An agent attempted an action outside its granted capabilities.
    CapabilityViolation,
    /// An agent's trust score dropped below an acceptable level.
    TrustScoreLow,
    /// An agent appears to be moving data out of the organization.
    DataExfiltration,
}

impl fmt::Display for PolicyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyType::CapabilityViolation => write!(f, "capability_violation"),
            PolicyType::TrustScoreLow => write!(f, "trust_score_low"),
            PolicyType::DataExfiltration => write!(f, "data_exfiltration"),
        }
    }
}

/// Severity attached to policies and the alerts they produce.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    High,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::High => write!(f, "high"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

/// What happens when a policy matches a violation.
///
/// Unknown values coming from configuration are preserved verbatim in
/// `Unrecognized` and enforced as block-and-alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EnforcementAction {
    BlockAndAlert,
    AlertOnly,
    Allow,
    Unrecognized(String),
}

impl EnforcementAction {
    /// Map to `(should_block, should_alert)`.
    pub fn outcome(&self) -> (bool, bool) {
        match self {
            EnforcementAction::BlockAndAlert => (true, true),
            EnforcementAction::AlertOnly => (false, true),
            EnforcementAction::Allow => (false, false),
            EnforcementAction::Unrecognized(_) => (true, true),
        }
    }
}

impl From<String> for EnforcementAction {
    fn from(value: String) -> Self {
        match value.as_str() {
            "block_and_alert" => EnforcementAction::BlockAndAlert,
            "alert_only" => EnforcementAction::AlertOnly,
            "allow" => EnforcementAction::Allow,
            _ => EnforcementAction::Unrecognized(value),
        }
    }
}

impl From<EnforcementAction> for String {
    fn from(value: EnforcementAction) -> Self {
        value.to_string()
    }
}

impl fmt::Display for EnforcementAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnforcementAction::BlockAndAlert => write!(f, "block_and_alert"),
            EnforcementAction::AlertOnly => write!(f, "alert_only"),
            EnforcementAction::Allow => write!(f, "allow"),
            EnforcementAction::Unrecognized(raw) => write!(f, "{}", raw),
        }
    }
}

/// An organization-scoped security policy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SecurityPolicy {
    pub policy_id: Uuid,
    pub organization_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub policy_type: PolicyType,
    pub enforcement_action: EnforcementAction,
    pub applies_to: AppliesTo,
    /// Higher evaluates first.
    pub priority: i32,
    #[serde(default = "default_enabled")]
    pub is_enabled: bool,
    pub severity_threshold: Severity,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

fn default_enabled() -> bool {
    true
}

impl SecurityPolicy {
    /// Create an enabled policy with a fresh ID.
    pub fn new(
        organization_id: impl Into<String>,
        name: impl Into<String>,
        policy_type: PolicyType,
        enforcement_action: EnforcementAction,
        applies_to: AppliesTo,
        priority: i32,
        severity_threshold: Severity,
    ) -> Self {
        Self {
            policy_id: Uuid::new_v4(),
            organization_id: organization_id.into(),
            name: name.into(),
            description: String::new(),
            policy_type,
            enforcement_action,
            applies_to,
            priority,
            is_enabled: true,
            severity_threshold,
            created_at: Utc::now(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// The policies seeded for every new organization.
///
/// All three are alert-only: blocking must be opted into by an administrator.
pub fn default_policies(organization_id: &str) -> Vec<SecurityPolicy> {
    vec![
        SecurityPolicy::new(
            organization_id,
            "Capability Violation Monitor",
            PolicyType::CapabilityViolation,
            EnforcementAction::AlertOnly,
            AppliesTo::All,
            1000,
            Severity::High,
        )
        .with_description("Alerts when an agent attempts an action outside its granted capabilities"),
        SecurityPolicy::new(
            organization_id,
            "Low Trust Score Monitor",
            PolicyType::TrustScoreLow,
            EnforcementAction::AlertOnly,
            AppliesTo::TrustScoreBelow(DEFAULT_LOW_TRUST_THRESHOLD),
            500,
            Severity::Warning,
        )
        .with_description("Alerts when an agent's trust score falls below the acceptable level"),
        SecurityPolicy::new(
            organization_id,
            "Data Exfiltration Monitor",
            PolicyType::DataExfiltration,
            EnforcementAction::AlertOnly,
            AppliesTo::All,
            900,
            Severity::Critical,
        )
        .with_description("Alerts on suspected data exfiltration by an agent"),
    ]
}

/// A policy as written by an administrator (no IDs or timestamps).
#[derive(Debug, Clone, Deserialize)]
struct PolicyDefinition {
    name: String,
    #[serde(default)]
    description: String,
    policy_type: PolicyType,
    enforcement_action: EnforcementAction,
    applies_to: AppliesTo,
    priority: i32,
    #[serde(default = "default_enabled")]
    is_enabled: bool,
    severity_threshold: Severity,
}

#[derive(Debug, Clone, Deserialize)]
struct PolicyFile {
    organization_id: String,
    #[serde(default)]
    policies: Vec<PolicyDefinition>,
}

/// A validated set of policies for one organization, loaded from YAML.
#[derive(Debug, Clone)]
pub struct PolicySet {
    pub organization_id: String,
    pub policies: Vec<SecurityPolicy>,
}

impl PolicySet {
    /// Parse a policy set from YAML. Selectors are validated here.
    pub fn from_yaml(yaml: &str) -> Result<Self, PolicyError> {
        let file: PolicyFile = serde_yaml::from_str(yaml)?;
        let policies = file
            .policies
            .into_iter()
            .map(|def| SecurityPolicy {
                policy_id: Uuid::new_v4(),
                organization_id: file.organization_id.clone(),
                name: def.name,
                description: def.description,
                policy_type: def.policy_type,
                enforcement_action: def.enforcement_action,
                applies_to: def.applies_to,
                priority: def.priority,
                is_enabled: def.is_enabled,
                severity_threshold: def.severity_threshold,
                created_at: Utc::now(),
            })
            .collect();
        Ok(Self {
            organization_id: file.organization_id,
            policies,
        })
    }

    /// Load a policy set from a YAML file.
    pub fn load(path: &Path) -> Result<Self, PolicyError> {
        let content = std::fs::read_to_string(path).map_err(|source| PolicyError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&content).map_err(|e| match e {
            PolicyError::Yaml(inner) => PolicyError::InvalidPolicyFile {
                path: path.to_path_buf(),
                reason: inner.to_string(),
            },
            other => other,
        })
    }

    /// Enabled policies of one type, in file order.
    pub fn enabled_of_type(&self, policy_type: PolicyType) -> Vec<SecurityPolicy> {
        self.policies
            .iter()
            .filter(|p| p.is_enabled && p.policy_type == policy_type)
            .cloned()
            .collect()
    }
}
