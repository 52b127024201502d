// trust.rs — Trust score model.
//
// An agent's trust score is a bounded reputation value on a 0–100 scale.
// Violations and drift events cost a fixed penalty: a smaller one for the
// first offence, a larger one for every offence after that. Penalties clamp
// at the floor. Direct sets are validated and rejected, never clamped.
//
// Every penalty is exactly one persisted update so score history can be
// reconstructed from storage writes one-to-one.

use serde::{Deserialize, Serialize};

use crate::agent::Agent;
use crate::error::EngineError;
use crate::repository::AgentRepository;

/// Bounds and penalty magnitudes for trust scoring.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TrustConfig {
    pub floor: f64,
    pub ceiling: f64,
    /// Cost of an agent's first violation.
    pub first_violation_penalty: f64,
    /// Cost of every subsequent violation.
    pub repeated_violation_penalty: f64,
}

impl Default for TrustConfig {
    fn default() -> Self {
        Self {
            floor: 0.0,
            ceiling: 100.0,
            first_violation_penalty: 5.0,
            repeated_violation_penalty: 10.0,
        }
    }
}

impl TrustConfig {
    /// Reject configurations that would break the score invariants.
    pub fn validate(&self) -> Result<(), String> {
        let values = [
            self.floor,
            self.ceiling,
            self.first_violation_penalty,
            self.repeated_violation_penalty,
        ];
        if values.iter().any(|v| !v.is_finite()) {
            return Err("trust settings must be finite numbers".to_string());
        }
        if self.floor < 0.0 || self.floor >= self.ceiling {
            return Err(format!(
                "trust floor {} must be non-negative and below ceiling {}",
                self.floor, self.ceiling
            ));
        }
        if self.first_violation_penalty < 0.0
            || self.repeated_violation_penalty < self.first_violation_penalty
        {
            return Err(
                "penalties must be non-negative and repeated >= first violation penalty"
                    .to_string(),
            );
        }
        Ok(())
    }
}

/// Pure trust arithmetic plus the two persistence entry points.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrustScoreModel {
    config: TrustConfig,
}

impl TrustScoreModel {
    pub fn new(config: TrustConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrustConfig {
        &self.config
    }

    /// Penalty for a violation given how many came before it.
    pub fn penalty_for(&self, prior_violation_count: u32) -> f64 {
        if prior_violation_count == 0 {
            self.config.first_violation_penalty
        } else {
            self.config.repeated_violation_penalty
        }
    }

    /// Clamp a score read from storage into the legal range.
    pub fn clamp(&self, score: f64) -> f64 {
        if score.is_nan() {
            return self.config.floor;
        }
        score.clamp(self.config.floor, self.config.ceiling)
    }

    /// The score after one penalty. Never below the floor.
    pub fn apply_penalty(&self, old_score: f64, prior_violation_count: u32) -> f64 {
        let penalized = self.clamp(old_score) - self.penalty_for(prior_violation_count);
        penalized.max(self.config.floor)
    }

    /// Accept `score` only if it lies within `[floor, ceiling]`.
    pub fn validate(&self, score: f64) -> Result<f64, EngineError> {
        if score.is_finite() && score >= self.config.floor && score <= self.config.ceiling {
            Ok(score)
        } else {
            Err(EngineError::InvalidTrustScore {
                score,
                floor: self.config.floor,
                ceiling: self.config.ceiling,
            })
        }
    }

    /// Directly set an agent's trust score (maintenance flows).
    pub fn set_trust_score(
        &self,
        agents: &dyn AgentRepository,
        agent_id: &str,
        score: f64,
    ) -> Result<(), EngineError> {
        let score = self.validate(score)?;
        agents.update_trust_score(agent_id, score)?;
        tracing::info!(agent_id, trust_score = score, "trust score set");
        Ok(())
    }

    /// Apply one penalty to `agent` and persist it. Returns the new score.
    pub fn penalize(&self, agents: &dyn AgentRepository, agent: &Agent) -> Result<f64, EngineError> {
        let new_score = self.apply_penalty(agent.trust_score, agent.capability_violation_count);
        agents.update_trust_score(&agent.agent_id, new_score)?;
        tracing::info!(
            agent_id = %agent.agent_id,
            old_score = agent.trust_score,
            new_score,
            prior_violations = agent.capability_violation_count,
            "trust penalty applied"
        );
        Ok(new_score)
    }
}
