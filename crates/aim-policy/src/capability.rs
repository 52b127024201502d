// capability.rs — Capability grants and the capability matcher.
//
// A capability grant ties one agent to one capability pattern string such as
// "file:read" or "file:*". Grants are immutable once issued; the only field
// that ever changes is `is_active`, so revocation leaves the grant history
// intact for audit.
//
// Matching is intentionally minimal:
//   - "ns:*"   matches any action starting with "ns:"
//   - anything else matches only on exact equality
// There is no substring matching, no multi-segment globbing, and a bare "*"
// is a literal, not a wildcard.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The namespace wildcard suffix. Only valid at the very end of a pattern.
const NAMESPACE_WILDCARD: &str = ":*";

/// A single capability granted to an agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CapabilityGrant {
    /// Unique ID for this grant.
    pub grant_id: Uuid,
    /// The agent this grant belongs to.
    pub agent_id: String,
    /// Capability pattern (e.g., "file:read", "file:*").
    pub capability: String,
    /// Identity that issued the grant (user ID, "system", etc.).
    pub granted_by: String,
    /// When the grant was issued.
    pub granted_at: DateTime<Utc>,
    /// Inactive grants are kept for history but never match.
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl CapabilityGrant {
    /// Issue a new active grant.
    pub fn new(
        agent_id: impl Into<String>,
        capability: impl Into<String>,
        granted_by: impl Into<String>,
    ) -> Self {
        Self {
            grant_id: Uuid::new_v4(),
            agent_id: agent_id.into(),
            capability: capability.into(),
            granted_by: granted_by.into(),
            granted_at: Utc::now(),
            is_active: true,
        }
    }

    /// Revoke this grant. Irreversible: there is no `activate()`.
    pub fn deactivate(&mut self) {
        self.is_active = false;
    }

    /// Does this grant cover the requested action?
    pub fn covers(&self, action_type: &str) -> bool {
        self.is_active && matches(action_type, &self.capability)
    }
}

/// Decide whether `action_type` is covered by `granted_pattern`.
///
/// ```
/// use aim_policy::capability::matches;
///
/// assert!(matches("file:read", "file:*"));
/// assert!(matches("file:read", "file:read"));
/// assert!(!matches("db:query", "file:*"));
/// ```
pub fn matches(action_type: &str, granted_pattern: &str) -> bool {
    match granted_pattern.strip_suffix('*') {
        // Keep the ':' in the prefix so "file:*" never matches "filesystem:read".
        Some(prefix) if granted_pattern.ends_with(NAMESPACE_WILDCARD) => {
            action_type.starts_with(prefix)
        }
        _ => action_type == granted_pattern,
    }
}

/// Return the first active grant that covers `action_type`, if any.
pub fn first_match<'a>(
    action_type: &str,
    grants: &'a [CapabilityGrant],
) -> Option<&'a CapabilityGrant> {
    grants.iter().find(|g| g.covers(action_type))
}
