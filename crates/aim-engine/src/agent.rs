// agent.rs — The agent identity aggregate.
//
// Agents are created and deleted by external agent-management code. The
// engine only ever changes two things on an agent, and only through the
// repository: its trust score and its violation counter.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use aim_policy::PolicySubject;

/// Lifecycle status of an agent identity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    /// Registered, awaiting verification.
    Pending,
    /// Verified and allowed to act within its capabilities.
    Verified,
    /// Temporarily barred from acting.
    Suspended,
    /// Permanently barred from acting.
    Revoked,
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentStatus::Pending => write!(f, "pending"),
            AgentStatus::Verified => write!(f, "verified"),
            AgentStatus::Suspended => write!(f, "suspended"),
            AgentStatus::Revoked => write!(f, "revoked"),
        }
    }
}

/// What kind of autonomous identity this is.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AgentType {
    AiAgent,
    McpServer,
}

impl AgentType {
    /// The name used by `agent_type:<type>` policy selectors.
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentType::AiAgent => "ai_agent",
            AgentType::McpServer => "mcp_server",
        }
    }
}

impl fmt::Display for AgentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A registered agent identity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Agent {
    pub agent_id: String,
    pub organization_id: String,
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    pub agent_type: AgentType,
    pub status: AgentStatus,
    #[serde(default)]
    pub is_compromised: bool,
    pub trust_score: f64,
    /// Number of past capability violations. Never decreases.
    #[serde(default)]
    pub capability_violation_count: u32,
    /// MCP servers this agent is declared to talk to. Order is irrelevant.
    #[serde(default)]
    pub registered_mcp_servers: Vec<String>,
    /// Declared capability patterns.
    #[serde(default)]
    pub registered_capabilities: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Agent {
    /// Create a pending agent with the given starting trust score.
    pub fn new(
        agent_id: impl Into<String>,
        organization_id: impl Into<String>,
        name: impl Into<String>,
        agent_type: AgentType,
        trust_score: f64,
    ) -> Self {
        let now = Utc::now();
        let name = name.into();
        Self {
            agent_id: agent_id.into(),
            organization_id: organization_id.into(),
            display_name: name.clone(),
            name,
            agent_type,
            status: AgentStatus::Pending,
            is_compromised: false,
            trust_score,
            capability_violation_count: 0,
            registered_mcp_servers: Vec::new(),
            registered_capabilities: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_status(mut self, status: AgentStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_mcp_servers<S: Into<String>>(mut self, servers: impl IntoIterator<Item = S>) -> Self {
        self.registered_mcp_servers = servers.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_capabilities<S: Into<String>>(
        mut self,
        capabilities: impl IntoIterator<Item = S>,
    ) -> Self {
        self.registered_capabilities = capabilities.into_iter().map(Into::into).collect();
        self
    }

    pub fn is_verified(&self) -> bool {
        self.status == AgentStatus::Verified
    }

    /// The view of this agent that policy selectors evaluate.
    pub fn policy_subject(&self) -> PolicySubject {
        PolicySubject {
            agent_id: self.agent_id.clone(),
            agent_type: self.agent_type.as_str().to_string(),
            trust_score: self.trust_score,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_agents_start_pending_and_clean() {
        let agent = Agent::new("agent-1", "org-1", "Indexer", AgentType::AiAgent, 75.0);
        assert_eq!(agent.status, AgentStatus::Pending);
        assert!(!agent.is_verified());
        assert!(!agent.is_compromised);
        assert_eq!(agent.capability_violation_count, 0);
        assert_eq!(agent.display_name, "Indexer");
    }

    #[test]
    fn policy_subject_uses_selector_type_names() {
        let agent = Agent::new("srv-1", "org-1", "Files", AgentType::McpServer, 42.0);
        let subject = agent.policy_subject();
        assert_eq!(subject.agent_type, "mcp_server");
        assert_eq!(subject.trust_score, 42.0);
    }

    #[test]
    fn agent_json_uses_snake_case_enums() {
        let agent = Agent::new("a", "o", "n", AgentType::AiAgent, 50.0)
            .with_status(AgentStatus::Verified)
            .with_mcp_servers(["filesystem-mcp"]);
        let json = serde_json::to_string(&agent).unwrap();
        assert!(json.contains("\"agent_type\":\"ai_agent\""));
        assert!(json.contains("\"status\":\"verified\""));
        let restored: Agent = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.registered_mcp_servers, vec!["filesystem-mcp"]);
    }
}
