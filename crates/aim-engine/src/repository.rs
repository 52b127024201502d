// repository.rs — The engine's view of persistence.
//
// The engine never owns agents, grants, or policies. It reaches them only
// through these narrow traits, so any storage backend (SQL, KV, remote API)
// can sit behind them. In-memory implementations back the tests and the CLI.
//
// Backends that need single-writer semantics for concurrent violations on
// one agent should implement `increment_violation_count` and
// `update_trust_score` atomically.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;

use aim_policy::{CapabilityGrant, PolicyType, SecurityPolicy};

use crate::agent::Agent;
use crate::error::EngineError;

/// Read and narrowly mutate agents.
pub trait AgentRepository: Send + Sync {
    fn get_by_id(&self, agent_id: &str) -> Result<Agent, EngineError>;

    fn list_by_organization(&self, organization_id: &str) -> Result<Vec<Agent>, EngineError>;

    /// Persist a new trust score. Callers validate or clamp first.
    fn update_trust_score(&self, agent_id: &str, trust_score: f64) -> Result<(), EngineError>;

    /// Add one to the violation counter and return the new value.
    fn increment_violation_count(&self, agent_id: &str) -> Result<u32, EngineError>;
}

/// Read an agent's capability grants.
pub trait CapabilityRepository: Send + Sync {
    /// Currently active grants only.
    fn get_active_grants(&self, agent_id: &str) -> Result<Vec<CapabilityGrant>, EngineError>;
}

/// Read an organization's policies.
pub trait PolicyRepository: Send + Sync {
    /// Enabled policies of one type. Order is not significant; the policy
    /// engine sorts by priority.
    fn get_enabled_policies_by_type(
        &self,
        organization_id: &str,
        policy_type: PolicyType,
    ) -> Result<Vec<SecurityPolicy>, EngineError>;
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, EngineError> {
    mutex
        .lock()
        .map_err(|_| EngineError::Storage("in-memory store lock poisoned".to_string()))
}

/// Agents held in memory, keyed by ID.
#[derive(Debug, Default)]
pub struct InMemoryAgentRepository {
    agents: Mutex<HashMap<String, Agent>>,
}

impl InMemoryAgentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_agents(agents: impl IntoIterator<Item = Agent>) -> Self {
        Self {
            agents: Mutex::new(
                agents
                    .into_iter()
                    .map(|agent| (agent.agent_id.clone(), agent))
                    .collect(),
            ),
        }
    }

    /// Insert or replace an agent.
    pub fn insert(&self, agent: Agent) -> Result<(), EngineError> {
        lock(&self.agents)?.insert(agent.agent_id.clone(), agent);
        Ok(())
    }

    /// All agents, sorted by ID.
    pub fn snapshot(&self) -> Vec<Agent> {
        let mut all: Vec<Agent> = self
            .agents
            .lock()
            .map(|agents| agents.values().cloned().collect())
            .unwrap_or_default();
        all.sort_by(|a, b| a.agent_id.cmp(&b.agent_id));
        all
    }

    fn with_agent<R>(
        &self,
        agent_id: &str,
        f: impl FnOnce(&mut Agent) -> R,
    ) -> Result<R, EngineError> {
        let mut agents = lock(&self.agents)?;
        let agent = agents
            .get_mut(agent_id)
            .ok_or_else(|| EngineError::agent_not_found(agent_id))?;
        let result = f(agent);
        agent.updated_at = Utc::now();
        Ok(result)
    }
}

impl AgentRepository for InMemoryAgentRepository {
    fn get_by_id(&self, agent_id: &str) -> Result<Agent, EngineError> {
        lock(&self.agents)?
            .get(agent_id)
            .cloned()
            .ok_or_else(|| EngineError::agent_not_found(agent_id))
    }

    fn list_by_organization(&self, organization_id: &str) -> Result<Vec<Agent>, EngineError> {
        let mut agents: Vec<Agent> = lock(&self.agents)?
            .values()
            .filter(|a| a.organization_id == organization_id)
            .cloned()
            .collect();
        agents.sort_by(|a, b| a.agent_id.cmp(&b.agent_id));
        Ok(agents)
    }

    fn update_trust_score(&self, agent_id: &str, trust_score: f64) -> Result<(), EngineError> {
        self.with_agent(agent_id, |agent| agent.trust_score = trust_score)
    }

    fn increment_violation_count(&self, agent_id: &str) -> Result<u32, EngineError> {
        self.with_agent(agent_id, |agent| {
            agent.capability_violation_count = agent.capability_violation_count.saturating_add(1);
            agent.capability_violation_count
        })
    }
}

/// Capability grants held in memory.
#[derive(Debug, Default)]
pub struct InMemoryCapabilityRepository {
    grants: Mutex<Vec<CapabilityGrant>>,
}

impl InMemoryCapabilityRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_grants(grants: impl IntoIterator<Item = CapabilityGrant>) -> Self {
        Self {
            grants: Mutex::new(grants.into_iter().collect()),
        }
    }

    pub fn grant(&self, grant: CapabilityGrant) -> Result<(), EngineError> {
        lock(&self.grants)?.push(grant);
        Ok(())
    }

    /// Deactivate every grant of `capability` held by `agent_id`.
    /// Returns how many grants were revoked.
    pub fn revoke(&self, agent_id: &str, capability: &str) -> Result<usize, EngineError> {
        let mut grants = lock(&self.grants)?;
        let mut revoked = 0;
        for g in grants
            .iter_mut()
            .filter(|g| g.is_active && g.agent_id == agent_id && g.capability == capability)
        {
            g.deactivate();
            revoked += 1;
        }
        Ok(revoked)
    }

    pub fn snapshot(&self) -> Vec<CapabilityGrant> {
        self.grants.lock().map(|g| g.clone()).unwrap_or_default()
    }
}

impl CapabilityRepository for InMemoryCapabilityRepository {
    fn get_active_grants(&self, agent_id: &str) -> Result<Vec<CapabilityGrant>, EngineError> {
        Ok(lock(&self.grants)?
            .iter()
            .filter(|g| g.is_active && g.agent_id == agent_id)
            .cloned()
            .collect())
    }
}

/// Security policies held in memory.
#[derive(Debug, Default)]
pub struct InMemoryPolicyRepository {
    policies: Mutex<Vec<SecurityPolicy>>,
}

impl InMemoryPolicyRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policies(policies: impl IntoIterator<Item = SecurityPolicy>) -> Self {
        Self {
            policies: Mutex::new(policies.into_iter().collect()),
        }
    }

    pub fn add(&self, policy: SecurityPolicy) -> Result<(), EngineError> {
        lock(&self.policies)?.push(policy);
        Ok(())
    }

    /// Seed the canonical default policies for a new organization.
    pub fn seed_defaults(&self, organization_id: &str) -> Result<(), EngineError> {
        lock(&self.policies)?.extend(aim_policy::default_policies(organization_id));
        Ok(())
    }

    pub fn snapshot(&self) -> Vec<SecurityPolicy> {
        self.policies.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

impl PolicyRepository for InMemoryPolicyRepository {
    fn get_enabled_policies_by_type(
        &self,
        organization_id: &str,
        policy_type: PolicyType,
    ) -> Result<Vec<SecurityPolicy>, EngineError> {
        Ok(lock(&self.policies)?
            .iter()
            .filter(|p| {
                p.is_enabled && p.organization_id == organization_id && p.policy_type == policy_type
            })
            .cloned()
            .collect())
    }
}
