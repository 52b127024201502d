// record.rs — Verification records.
//
// Every decision the action verifier makes, allow or deny, produces exactly
// one VerificationRecord. The record ID is what callers receive as the
// "audit ID", so a denial reported to a user can be traced back to the row
// that explains it.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::log::Chained;

/// Whether the verified action was permitted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VerificationOutcome {
    Allowed,
    Denied,
}

impl VerificationOutcome {
    pub fn from_allowed(allowed: bool) -> Self {
        if allowed {
            VerificationOutcome::Allowed
        } else {
            VerificationOutcome::Denied
        }
    }
}

impl fmt::Display for VerificationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerificationOutcome::Allowed => write!(f, "allowed"),
            VerificationOutcome::Denied => write!(f, "denied"),
        }
    }
}

/// One verification decision.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VerificationRecord {
    /// Unique ID, returned to callers as the audit ID.
    pub record_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub agent_id: String,
    pub organization_id: String,
    pub action_type: String,
    /// Target resource. Recorded for audit; not used for matching.
    pub resource: String,
    pub outcome: VerificationOutcome,
    /// Short, stable, human-readable explanation.
    pub reason: String,
    /// The policy that decided a capability violation, if one was evaluated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_policy: Option<String>,
    /// Caller-supplied request context.
    #[serde(default)]
    pub context: serde_json::Value,
    /// Hash of the preceding record in a chained log.
    #[serde(default)]
    pub previous_hash: Option<String>,
}

impl VerificationRecord {
    /// Start a record for a decision about to be made. The ID is fixed now so
    /// it can be referenced (e.g. by alerts) before the outcome is known.
    pub fn new(
        agent_id: impl Into<String>,
        organization_id: impl Into<String>,
        action_type: impl Into<String>,
        resource: impl Into<String>,
    ) -> Self {
        Self {
            record_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            agent_id: agent_id.into(),
            organization_id: organization_id.into(),
            action_type: action_type.into(),
            resource: resource.into(),
            outcome: VerificationOutcome::Denied,
            reason: String::new(),
            matched_policy: None,
            context: serde_json::Value::Null,
            previous_hash: None,
        }
    }

    /// Set the decision and return self.
    pub fn with_decision(mut self, allowed: bool, reason: impl Into<String>) -> Self {
        self.outcome = VerificationOutcome::from_allowed(allowed);
        self.reason = reason.into();
        self
    }

    pub fn with_policy(mut self, policy_name: impl Into<String>) -> Self {
        self.matched_policy = Some(policy_name.into());
        self
    }

    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = context;
        self
    }

    pub fn is_allowed(&self) -> bool {
        self.outcome == VerificationOutcome::Allowed
    }
}

impl Chained for VerificationRecord {
    fn previous_hash(&self) -> Option<&str> {
        self.previous_hash.as_deref()
    }

    fn set_previous_hash(&mut self, hash: Option<String>) {
        self.previous_hash = hash;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_default_to_denied() {
        let record = VerificationRecord::new("agent-1", "org-1", "file:read", "/tmp/x");
        assert_eq!(record.outcome, VerificationOutcome::Denied);
        assert!(!record.is_allowed());
    }

    #[test]
    fn builder_sets_decision_and_policy() {
        let record = VerificationRecord::new("agent-1", "org-1", "db:drop", "db://prod")
            .with_decision(true, "allowed by policy 'allow-all'")
            .with_policy("allow-all")
            .with_context(serde_json::json!({ "ip": "10.0.0.1" }));
        assert!(record.is_allowed());
        assert_eq!(record.matched_policy.as_deref(), Some("allow-all"));
        assert_eq!(record.context["ip"], "10.0.0.1");
    }

    #[test]
    fn record_ids_are_unique() {
        let a = VerificationRecord::new("agent-1", "org-1", "file:read", "");
        let b = VerificationRecord::new("agent-1", "org-1", "file:read", "");
        assert_ne!(a.record_id, b.record_id);
    }

    #[test]
    fn outcome_serializes_as_snake_case() {
        let json = serde_json::to_string(&VerificationOutcome::Denied).unwrap();
        assert_eq!(json, "\"denied\"");
    }

    #[test]
    fn matched_policy_omitted_when_absent() {
        let record = VerificationRecord::new("agent-1", "org-1", "file:read", "")
            .with_decision(true, "ok");
        let json = serde_json::to_string(&record).unwrap();
        assert!(!json.contains("matched_policy"));
    }
}
