// alert.rs — Security alerts.
//
// Alerts are created by the engine (capability violations) and the drift
// detector. Once created they are never modified by the engine; acknowledging
// an alert belongs to whichever system stores them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use aim_policy::Severity;

use crate::log::Chained;

/// Alert type for attempted actions outside granted capabilities.
pub const CAPABILITY_VIOLATION: &str = "capability_violation";
/// Alert type for runtime behavior diverging from registration.
pub const CONFIGURATION_DRIFT: &str = "configuration_drift";

/// A security-relevant event raised for human attention.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Alert {
    pub alert_id: Uuid,
    pub organization_id: String,
    /// Category, e.g. [`CAPABILITY_VIOLATION`] or [`CONFIGURATION_DRIFT`].
    pub alert_type: String,
    pub severity: Severity,
    pub title: String,
    pub description: String,
    /// Kind of resource implicated (e.g., "agent").
    pub resource_type: String,
    pub resource_id: String,
    #[serde(default)]
    pub is_acknowledged: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub previous_hash: Option<String>,
}

impl Alert {
    /// Create an unacknowledged alert about an agent.
    pub fn for_agent(
        organization_id: impl Into<String>,
        agent_id: impl Into<String>,
        alert_type: impl Into<String>,
        severity: Severity,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            alert_id: Uuid::new_v4(),
            organization_id: organization_id.into(),
            alert_type: alert_type.into(),
            severity,
            title: title.into(),
            description: description.into(),
            resource_type: "agent".to_string(),
            resource_id: agent_id.into(),
            is_acknowledged: false,
            created_at: Utc::now(),
            previous_hash: None,
        }
    }
}

impl Chained for Alert {
    fn previous_hash(&self) -> Option<&str> {
        self.previous_hash.as_deref()
    }

    fn set_previous_hash(&mut self, hash: Option<String>) {
        self.previous_hash = hash;
    }
}
