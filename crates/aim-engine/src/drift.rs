// drift.rs — Configuration drift detection.
//
// Compares what an agent is observed doing at runtime (the MCP servers it
// talks to, the capabilities it exercises) against what was registered for
// it. Anything observed but not registered is drift. Drift raises a
// `configuration_drift` alert and costs the agent one trust penalty.
//
// Only the agent lookup can fail `detect`. Alert delivery and the trust
// update are best-effort and surface as warnings on the result.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use aim_audit::alert::CONFIGURATION_DRIFT;
use aim_audit::Alert;
use aim_policy::{capability, Severity};

use crate::agent::Agent;
use crate::error::EngineError;
use crate::repository::AgentRepository;
use crate::sinks::AlertSink;
use crate::trust::TrustScoreModel;
use crate::warning::{best_effort, SideEffect, SideEffectWarning};

const REMEDIATION_STEPS: [&str; 4] = [
    "Review the agent's recent activity for unexpected behavior",
    "Register the new MCP servers or capabilities if the change is intended",
    "Otherwise revoke the agent's credentials and investigate the configuration change",
    "Re-run drift detection after remediation to confirm the agent is back in compliance",
];

/// Outcome of one drift check.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DriftResult {
    pub drift_detected: bool,
    /// Observed MCP servers that are not registered, sorted.
    pub mcp_server_drift: Vec<String>,
    /// Observed capabilities not covered by a declared pattern, sorted.
    pub capability_drift: Vec<String>,
    /// The alert raised, when drift was found.
    pub alert: Option<Alert>,
    /// Trust score after the penalty, when it was persisted.
    pub new_trust_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<SideEffectWarning>,
}

impl DriftResult {
    fn clean() -> Self {
        Self {
            drift_detected: false,
            mcp_server_drift: Vec::new(),
            capability_drift: Vec::new(),
            alert: None,
            new_trust_score: None,
            warnings: Vec::new(),
        }
    }
}

/// Observed MCP servers absent from the registered set. Duplicates collapse.
pub fn mcp_server_drift(registered: &[String], observed: &[String]) -> Vec<String> {
    let registered: BTreeSet<&str> = registered.iter().map(String::as_str).collect();
    observed
        .iter()
        .map(String::as_str)
        .filter(|server| !registered.contains(server))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}

/// Observed capabilities that no declared pattern covers.
pub fn capability_drift(declared: &[String], observed: &[String]) -> Vec<String> {
    observed
        .iter()
        .map(String::as_str)
        .filter(|action| !declared.iter().any(|p| capability::matches(action, p)))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}

fn drift_description(agent: &Agent, servers: &[String], capabilities: &[String]) -> String {
    let mut lines = vec![format!(
        "Agent '{}' is using configuration that was never registered.",
        agent.display_name
    )];

    if !servers.is_empty() {
        lines.push(String::new());
        lines.push("Unauthorized MCP servers:".to_string());
        lines.extend(servers.iter().map(|s| format!("  - {} (not registered)", s)));
    }
    if !capabilities.is_empty() {
        lines.push(String::new());
        lines.push("Undeclared capabilities:".to_string());
        lines.extend(capabilities.iter().map(|c| format!("  - {} (not declared)", c)));
    }

    lines.push(String::new());
    lines.push("Registered MCP servers:".to_string());
    if agent.registered_mcp_servers.is_empty() {
        lines.push("  None registered".to_string());
    } else {
        lines.extend(agent.registered_mcp_servers.iter().map(|s| format!("  - {}", s)));
    }

    lines.push(String::new());
    lines.push("Recommended actions:".to_string());
    lines.extend(
        REMEDIATION_STEPS
            .iter()
            .enumerate()
            .map(|(i, step)| format!("  {}. {}", i + 1, step)),
    );
    lines.join("\n")
}

/// Detects drift between runtime observations and agent registration.
pub struct DriftDetector {
    agents: Arc<dyn AgentRepository>,
    alerts: Arc<dyn AlertSink>,
    trust: TrustScoreModel,
}

impl DriftDetector {
    pub fn new(
        agents: Arc<dyn AgentRepository>,
        alerts: Arc<dyn AlertSink>,
        trust: TrustScoreModel,
    ) -> Self {
        Self {
            agents,
            alerts,
            trust,
        }
    }

    /// Check an agent's observed MCP servers and capabilities.
    ///
    /// Fails only when the agent cannot be loaded.
    pub fn detect(
        &self,
        agent_id: &str,
        current_mcp_servers: &[String],
        current_capabilities: &[String],
    ) -> Result<DriftResult, EngineError> {
        let agent = self.agents.get_by_id(agent_id)?;

        let servers = mcp_server_drift(&agent.registered_mcp_servers, current_mcp_servers);
        let capabilities =
            capability_drift(&agent.registered_capabilities, current_capabilities);

        if servers.is_empty() && capabilities.is_empty() {
            tracing::debug!(agent_id, "no configuration drift");
            return Ok(DriftResult::clean());
        }

        tracing::info!(
            agent_id,
            mcp_server_drift = servers.len(),
            capability_drift = capabilities.len(),
            "configuration drift detected"
        );

        let mut warnings = Vec::new();
        let alert = Alert::for_agent(
            &agent.organization_id,
            &agent.agent_id,
            CONFIGURATION_DRIFT,
            Severity::High,
            format!("Configuration drift detected for {}", agent.display_name),
            drift_description(&agent, &servers, &capabilities),
        );
        best_effort(
            &mut warnings,
            SideEffect::AlertDelivery,
            agent_id,
            self.alerts.create(&alert),
        );

        let new_trust_score = best_effort(
            &mut warnings,
            SideEffect::TrustScoreUpdate,
            agent_id,
            self.trust.penalize(self.agents.as_ref(), &agent),
        );

        Ok(DriftResult {
            drift_detected: true,
            mcp_server_drift: servers,
            capability_drift: capabilities,
            alert: Some(alert),
            new_trust_score,
            warnings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{AgentStatus, AgentType};
    use crate::repository::InMemoryAgentRepository;
    use crate::sinks::InMemoryAlertSink;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn setup(agent: Agent) -> (Arc<InMemoryAgentRepository>, Arc<InMemoryAlertSink>, DriftDetector) {
        let agents = Arc::new(InMemoryAgentRepository::with_agents([agent]));
        let alerts = Arc::new(InMemoryAlertSink::new());
        let detector = DriftDetector::new(agents.clone(), alerts.clone(), TrustScoreModel::default());
        (agents, alerts, detector)
    }

    fn agent() -> Agent {
        Agent::new("a", "org-1", "Indexer", AgentType::AiAgent, 85.0)
            .with_status(AgentStatus::Verified)
            .with_mcp_servers(["filesystem-mcp"])
            .with_capabilities(["file:*", "db:query"])
    }

    #[test]
    fn set_difference_ignores_order_and_duplicates() {
        let drift = mcp_server_drift(
            &strings(&["a", "b"]),
            &strings(&["c", "b", "c", "a", "d"]),
        );
        assert_eq!(drift, vec!["c", "d"]);
        assert!(mcp_server_drift(&strings(&["a"]), &[]).is_empty());
    }

    #[test]
    fn capability_drift_uses_matcher_semantics() {
        let declared = strings(&["file:*", "db:query"]);
        let drift = capability_drift(
            &declared,
            &strings(&["file:write", "db:query", "db:drop", "net:fetch"]),
        );
        assert_eq!(drift, vec!["db:drop", "net:fetch"]);
    }

    #[test]
    fn no_drift_touches_nothing() {
        let (agents, alerts, detector) = setup(agent());
        let result = detector
            .detect("a", &strings(&["filesystem-mcp"]), &strings(&["file:read"]))
            .unwrap();
        assert!(!result.drift_detected);
        assert!(result.mcp_server_drift.is_empty());
        assert!(result.capability_drift.is_empty());
        assert!(result.alert.is_none());
        assert!(alerts.alerts().is_empty());
        assert_eq!(agents.get_by_id("a").unwrap().trust_score, 85.0);
    }

    #[test]
    fn drift_alerts_and_penalizes_without_counting_a_violation() {
        let (agents, alerts, detector) = setup(agent());
        let result = detector
            .detect(
                "a",
                &strings(&["filesystem-mcp", "external-api-mcp"]),
                &strings(&["net:fetch"]),
            )
            .unwrap();

        assert!(result.drift_detected);
        assert_eq!(result.mcp_server_drift, vec!["external-api-mcp"]);
        assert_eq!(result.capability_drift, vec!["net:fetch"]);
        assert_eq!(result.new_trust_score, Some(80.0));
        assert!(result.warnings.is_empty());

        let sent = alerts.alerts();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].alert_type, "configuration_drift");
        assert_eq!(sent[0].severity, Severity::High);
        assert!(!sent[0].is_acknowledged);
        assert!(sent[0].description.contains("external-api-mcp (not registered)"));
        assert!(sent[0].description.contains("net:fetch (not declared)"));
        assert!(sent[0].description.contains("Recommended actions"));

        let stored = agents.get_by_id("a").unwrap();
        assert_eq!(stored.trust_score, 80.0);
        assert_eq!(stored.capability_violation_count, 0);
    }

    #[test]
    fn description_notes_missing_registration() {
        let bare = Agent::new("a", "org-1", "Bare", AgentType::McpServer, 50.0);
        let text = drift_description(&bare, &strings(&["x-mcp"]), &[]);
        assert!(text.contains("None registered"));
        assert!(!text.contains("Undeclared capabilities"));
    }

    #[test]
    fn unknown_agent_is_an_error() {
        let (_, _, detector) = setup(agent());
        assert!(matches!(
            detector.detect("ghost", &strings(&["x"]), &[]),
            Err(EngineError::NotFound { .. })
        ));
    }

    struct BrokenSink;

    impl AlertSink for BrokenSink {
        fn create(&self, _alert: &Alert) -> Result<(), EngineError> {
            Err(EngineError::Storage("alert store offline".to_string()))
        }
    }

    #[test]
    fn alert_failure_is_a_warning_not_an_error() {
        let agents = Arc::new(InMemoryAgentRepository::with_agents([agent()]));
        let detector =
            DriftDetector::new(agents.clone(), Arc::new(BrokenSink), TrustScoreModel::default());
        let result = detector.detect("a", &strings(&["rogue-mcp"]), &[]).unwrap();

        assert!(result.drift_detected);
        assert!(result.alert.is_some());
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.warnings[0].effect, SideEffect::AlertDelivery);
        assert_eq!(agents.get_by_id("a").unwrap().trust_score, 80.0);
    }

    struct ReadOnlyAgents(InMemoryAgentRepository);

    impl AgentRepository for ReadOnlyAgents {
        fn get_by_id(&self, agent_id: &str) -> Result<Agent, EngineError> {
            self.0.get_by_id(agent_id)
        }

        fn list_by_organization(&self, organization_id: &str) -> Result<Vec<Agent>, EngineError> {
            self.0.list_by_organization(organization_id)
        }

        fn update_trust_score(&self, _agent_id: &str, _score: f64) -> Result<(), EngineError> {
            Err(EngineError::Storage("agent store is read-only".to_string()))
        }

        fn increment_violation_count(&self, _agent_id: &str) -> Result<u32, EngineError> {
            Err(EngineError::Storage("agent store is read-only".to_string()))
        }
    }

    #[test]
    fn trust_update_failure_is_a_warning_not_an_error() {
        let agents = Arc::new(ReadOnlyAgents(InMemoryAgentRepository::with_agents([agent()])));
        let alerts = Arc::new(InMemoryAlertSink::new());
        let detector = DriftDetector::new(agents.clone(), alerts.clone(), TrustScoreModel::default());

        let result = detector.detect("a", &strings(&["rogue-mcp"]), &[]).unwrap();
        assert!(result.drift_detected);
        assert!(result.new_trust_score.is_none());
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.warnings[0].effect, SideEffect::TrustScoreUpdate);
        assert_eq!(alerts.alerts().len(), 1);
        assert_eq!(agents.get_by_id("a").unwrap().trust_score, 85.0);
    }
}
