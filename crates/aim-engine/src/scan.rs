// scan.rs — Security posture scan runs.
//
// A ScanRun records one pass over an organization's agents. The run is
// persisted before work starts and again when it ends, so a crashed or
// cancelled scan is visible as such instead of disappearing.
//
// Lifecycle:
//   Running → Completed { summary }
//   Running → Failed { reason }
// Both end states are terminal.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::agent::{Agent, AgentStatus};
use crate::error::EngineError;

/// Aggregate security posture of one organization.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct PostureSummary {
    pub total_agents: usize,
    /// Agent count per lifecycle status name.
    pub by_status: BTreeMap<String, usize>,
    pub compromised_agents: Vec<String>,
    /// Agents strictly below the low-trust threshold.
    pub low_trust_agents: Vec<String>,
    pub low_trust_threshold: f64,
    /// Mean trust score; zero when there are no agents.
    pub average_trust_score: f64,
    pub total_violations: u64,
}

impl PostureSummary {
    pub fn new(low_trust_threshold: f64) -> Self {
        Self {
            low_trust_threshold,
            ..Self::default()
        }
    }

    /// Fold one agent into the summary. `trust_score` is the agent's score
    /// after clamping into the legal range.
    pub fn record(&mut self, agent: &Agent, trust_score: f64) {
        let previous_total = self.average_trust_score * self.total_agents as f64;
        self.total_agents += 1;
        self.average_trust_score = (previous_total + trust_score) / self.total_agents as f64;

        *self.by_status.entry(agent.status.to_string()).or_insert(0) += 1;
        if agent.is_compromised {
            self.compromised_agents.push(agent.agent_id.clone());
        }
        if trust_score < self.low_trust_threshold {
            self.low_trust_agents.push(agent.agent_id.clone());
        }
        self.total_violations += u64::from(agent.capability_violation_count);
    }

    /// Number of agents with `status`.
    pub fn count(&self, status: AgentStatus) -> usize {
        self.by_status.get(&status.to_string()).copied().unwrap_or(0)
    }
}

/// Where a scan run is in its lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ScanState {
    Running,
    Completed { summary: PostureSummary },
    Failed { reason: String },
}

impl fmt::Display for ScanState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanState::Running => write!(f, "running"),
            ScanState::Completed { .. } => write!(f, "completed"),
            ScanState::Failed { .. } => write!(f, "failed"),
        }
    }
}

impl ScanState {
    pub fn can_transition_to(&self, next: &ScanState) -> bool {
        matches!(
            (self, next),
            (ScanState::Running, ScanState::Completed { .. })
                | (ScanState::Running, ScanState::Failed { .. })
        )
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ScanState::Running)
    }
}

/// One posture scan of one organization.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScanRun {
    pub scan_id: Uuid,
    pub organization_id: String,
    #[serde(flatten)]
    pub state: ScanState,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl ScanRun {
    /// A new run, already in the running state.
    pub fn start(organization_id: impl Into<String>) -> Self {
        Self {
            scan_id: Uuid::new_v4(),
            organization_id: organization_id.into(),
            state: ScanState::Running,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn transition(&mut self, next: ScanState) -> Result<(), EngineError> {
        if !self.state.can_transition_to(&next) {
            return Err(EngineError::InvalidTransition {
                scan_id: self.scan_id,
                from: self.state.to_string(),
                to: next.to_string(),
            });
        }
        self.state = next;
        self.finished_at = Some(Utc::now());
        Ok(())
    }

    pub fn summary(&self) -> Option<&PostureSummary> {
        match &self.state {
            ScanState::Completed { summary } => Some(summary),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentType;

    #[test]
    fn only_running_scans_can_finish() {
        let mut run = ScanRun::start("org-1");
        assert!(!run.state.is_terminal());
        run.transition(ScanState::Completed {
            summary: PostureSummary::new(30.0),
        })
        .unwrap();
        assert!(run.finished_at.is_some());
        assert!(run.summary().is_some());

        let err = run
            .transition(ScanState::Failed {
                reason: "late".to_string(),
            })
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidTransition { .. }));
        assert!(err.to_string().contains("completed"));
    }

    #[test]
    fn running_to_running_is_rejected() {
        let mut run = ScanRun::start("org-1");
        assert!(run.transition(ScanState::Running).is_err());
    }

    #[test]
    fn summary_aggregates_agents() {
        let mut summary = PostureSummary::new(30.0);
        let mut compromised = Agent::new("a", "o", "a", AgentType::AiAgent, 20.0)
            .with_status(AgentStatus::Suspended);
        compromised.is_compromised = true;
        compromised.capability_violation_count = 4;
        let healthy = Agent::new("b", "o", "b", AgentType::McpServer, 90.0)
            .with_status(AgentStatus::Verified);
        let borderline = Agent::new("c", "o", "c", AgentType::AiAgent, 30.0)
            .with_status(AgentStatus::Verified);

        for agent in [&compromised, &healthy, &borderline] {
            summary.record(agent, agent.trust_score);
        }

        assert_eq!(summary.total_agents, 3);
        assert_eq!(summary.count(AgentStatus::Verified), 2);
        assert_eq!(summary.count(AgentStatus::Revoked), 0);
        assert_eq!(summary.compromised_agents, vec!["a"]);
        assert_eq!(summary.low_trust_agents, vec!["a"]);
        assert!((summary.average_trust_score - 140.0 / 3.0).abs() < 1e-9);
        assert_eq!(summary.total_violations, 4);
    }

    #[test]
    fn state_is_flattened_in_json() {
        let run = ScanRun::start("org-1");
        let json = serde_json::to_value(&run).unwrap();
        assert_eq!(json["state"], "running");
        let back: ScanRun = serde_json::from_value(json).unwrap();
        assert_eq!(back, run);
    }
}
