// state.rs — JSON state snapshot backing the in-memory repositories.
//
// The CLI has no database. Agents, grants, and administrator policies live in
// one JSON document that is loaded into the engine's in-memory repositories
// and written back after commands that mutate agents. Seeded default policies
// and the YAML policy file are applied on load only and never written back.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use aim_engine::config::STATE_DIR;
use aim_engine::{
    Agent, EngineConfig, InMemoryAgentRepository, InMemoryCapabilityRepository,
    InMemoryPolicyRepository,
};
use aim_policy::{CapabilityGrant, PolicySet, SecurityPolicy};

pub fn default_path(project_root: &Path) -> PathBuf {
    project_root.join(STATE_DIR).join("state.json")
}

/// On-disk state document.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub agents: Vec<Agent>,
    #[serde(default)]
    pub grants: Vec<CapabilityGrant>,
    #[serde(default)]
    pub policies: Vec<SecurityPolicy>,
}

impl Snapshot {
    /// Load a snapshot. A missing file is an empty snapshot.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read state snapshot {}", path.display()))?;
        serde_json::from_str(&json)
            .with_context(|| format!("invalid state snapshot {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write state snapshot {}", path.display()))?;
        Ok(())
    }
}

/// Repositories populated from a snapshot.
pub struct State {
    path: PathBuf,
    pub agents: Arc<InMemoryAgentRepository>,
    pub grants: Arc<InMemoryCapabilityRepository>,
    pub policies: Arc<InMemoryPolicyRepository>,
    stored_policies: Vec<SecurityPolicy>,
}

impl State {
    pub fn open(config: &EngineConfig, path: &Path) -> anyhow::Result<Self> {
        let snapshot = Snapshot::load(path)?;

        let policies = InMemoryPolicyRepository::with_policies(snapshot.policies.clone());
        if config.policies.file.exists() {
            let set = PolicySet::load(&config.policies.file)?;
            tracing::debug!(
                file = %config.policies.file.display(),
                count = set.policies.len(),
                "loaded policy file"
            );
            for policy in set.policies {
                policies.add(policy)?;
            }
        }
        if config.policies.seed_defaults {
            let configured = policies.snapshot();
            let mut orgs: Vec<&str> = snapshot
                .agents
                .iter()
                .map(|a| a.organization_id.as_str())
                .collect();
            orgs.sort_unstable();
            orgs.dedup();
            for org in orgs {
                if !configured.iter().any(|p| p.organization_id == org) {
                    policies.seed_defaults(org)?;
                }
            }
        }

        Ok(Self {
            path: path.to_path_buf(),
            agents: Arc::new(InMemoryAgentRepository::with_agents(snapshot.agents)),
            grants: Arc::new(InMemoryCapabilityRepository::with_grants(snapshot.grants)),
            policies: Arc::new(policies),
            stored_policies: snapshot.policies,
        })
    }

    /// Write agents and grants back; stored policies are kept as loaded.
    pub fn save(&self) -> anyhow::Result<()> {
        Snapshot {
            agents: self.agents.snapshot(),
            grants: self.grants.snapshot(),
            policies: self.stored_policies.clone(),
        }
        .save(&self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aim_engine::{AgentRepository, AgentStatus, AgentType, PolicyRepository};
    use aim_policy::PolicyType;
    use tempfile::tempdir;

    fn write_snapshot(path: &Path) {
        Snapshot {
            agents: vec![
                Agent::new("a", "org-1", "A", AgentType::AiAgent, 70.0)
                    .with_status(AgentStatus::Verified),
            ],
            grants: vec![CapabilityGrant::new("a", "file:*", "admin")],
            policies: Vec::new(),
        }
        .save(path)
        .unwrap();
    }

    #[test]
    fn missing_snapshot_is_empty() {
        let dir = tempdir().unwrap();
        let snapshot = Snapshot::load(&dir.path().join("nope.json")).unwrap();
        assert!(snapshot.agents.is_empty());
    }

    #[test]
    fn defaults_are_seeded_but_not_persisted() {
        let dir = tempdir().unwrap();
        let config = EngineConfig::for_project(dir.path());
        let path = default_path(dir.path());
        write_snapshot(&path);

        let state = State::open(&config, &path).unwrap();
        let seeded = state
            .policies
            .get_enabled_policies_by_type("org-1", PolicyType::CapabilityViolation)
            .unwrap();
        assert_eq!(seeded.len(), 1);

        state.agents.update_trust_score("a", 42.0).unwrap();
        state.save().unwrap();

        let reloaded = Snapshot::load(&path).unwrap();
        assert!(reloaded.policies.is_empty());
        assert_eq!(reloaded.agents[0].trust_score, 42.0);
        assert_eq!(reloaded.grants.len(), 1);
    }

    #[test]
    fn policy_file_replaces_seeding() {
        let dir = tempdir().unwrap();
        let config = EngineConfig::for_project(dir.path());
        let path = default_path(dir.path());
        write_snapshot(&path);
        std::fs::write(
            &config.policies.file,
            r#"
organization_id: "org-1"
policies:
  - name: "Block everything"
    policy_type: capability_violation
    enforcement_action: block_and_alert
    applies_to: "all"
    priority: 10
    severity_threshold: high
"#,
        )
        .unwrap();

        let state = State::open(&config, &path).unwrap();
        let all = state.policies.snapshot();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].name, "Block everything");
    }
}
