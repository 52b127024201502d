// verifier.rs — Action verification.
//
// ActionVerifier answers one question: may this agent perform this action
// right now? Checks run strictly in order and the first terminal one wins:
//
//   1. agent lookup            (failure propagates, nothing is audited)
//   2. status must be verified
//   3. agent must not be compromised
//   4. agent must hold at least one active grant
//   5. a grant covers the action -> allow
//   6. capability violation    -> security policy engine decides
//
// Every decision from step 2 onward is written to the audit sink before it
// is returned. If the audit write fails the decision is not returned at all.
// Violation side effects (counter, trust penalty, alert) are best-effort.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use aim_audit::alert::CAPABILITY_VIOLATION;
use aim_audit::{Alert, VerificationRecord};
use aim_policy::{
    capability, EvaluationStep, PolicyType, SecurityPolicyEngine, ViolationDecision,
};

use crate::agent::Agent;
use crate::error::EngineError;
use crate::repository::{AgentRepository, CapabilityRepository, PolicyRepository};
use crate::sinks::{AlertSink, AuditSink};
use crate::trust::TrustScoreModel;
use crate::warning::{best_effort, SideEffect, SideEffectWarning};

/// The verifier's answer for one requested action.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Verdict {
    pub allowed: bool,
    /// Short, stable, human-readable explanation.
    pub reason: String,
    /// ID of the audit record written for this decision.
    pub audit_id: Uuid,
    /// Deciding policy on a capability violation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_policy: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<SideEffectWarning>,
}

/// Orchestrates capability matching, policy evaluation, and auditing.
pub struct ActionVerifier {
    agents: Arc<dyn AgentRepository>,
    capabilities: Arc<dyn CapabilityRepository>,
    policies: Arc<dyn PolicyRepository>,
    alerts: Arc<dyn AlertSink>,
    audit: Arc<dyn AuditSink>,
    engine: SecurityPolicyEngine,
    trust: TrustScoreModel,
}

impl ActionVerifier {
    pub fn new(
        agents: Arc<dyn AgentRepository>,
        capabilities: Arc<dyn CapabilityRepository>,
        policies: Arc<dyn PolicyRepository>,
        alerts: Arc<dyn AlertSink>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            agents,
            capabilities,
            policies,
            alerts,
            audit,
            engine: SecurityPolicyEngine::new(),
            trust: TrustScoreModel::default(),
        }
    }

    pub fn with_trust_model(mut self, trust: TrustScoreModel) -> Self {
        self.trust = trust;
        self
    }

    /// Decide whether `agent_id` may perform `action_type` on `resource`.
    ///
    /// `context` is caller-supplied request metadata stored verbatim on the
    /// audit record. The resource is recorded but does not affect matching.
    pub fn verify(
        &self,
        agent_id: &str,
        action_type: &str,
        resource: &str,
        context: serde_json::Value,
    ) -> Result<Verdict, EngineError> {
        let agent = self.agents.get_by_id(agent_id)?;
        let record =
            VerificationRecord::new(&agent.agent_id, &agent.organization_id, action_type, resource)
                .with_context(context);

        if !agent.is_verified() {
            let reason = format!("agent is not verified (status: {})", agent.status);
            return self.finish(record, false, reason, None, Vec::new());
        }

        if agent.is_compromised {
            return self.finish(
                record,
                false,
                "agent is marked as compromised".to_string(),
                None,
                Vec::new(),
            );
        }

        let grants = self.capabilities.get_active_grants(agent_id)?;
        if grants.is_empty() {
            return self.finish(
                record,
                false,
                "agent has no granted capabilities".to_string(),
                None,
                Vec::new(),
            );
        }

        if let Some(grant) = capability::first_match(action_type, &grants) {
            let reason = format!(
                "action '{}' matches registered capabilities (grant '{}')",
                action_type, grant.capability
            );
            return self.finish(record, true, reason, None, Vec::new());
        }

        self.handle_violation(&agent, record, action_type, resource)
    }

    fn handle_violation(
        &self,
        agent: &Agent,
        mut record: VerificationRecord,
        action_type: &str,
        resource: &str,
    ) -> Result<Verdict, EngineError> {
        let mut warnings = Vec::new();

        // A failed lookup evaluates against no policies, which fails closed.
        let policies = best_effort(
            &mut warnings,
            SideEffect::PolicyLookup,
            &agent.agent_id,
            self.policies.get_enabled_policies_by_type(
                &agent.organization_id,
                PolicyType::CapabilityViolation,
            ),
        )
        .unwrap_or_default();

        // Selectors only ever see a score inside the legal range.
        let mut subject = agent.policy_subject();
        subject.trust_score = self.trust.clamp(subject.trust_score);
        let decision = self.engine.evaluate_violation(
            &policies,
            &subject,
            action_type,
            resource,
            record.record_id,
        );

        best_effort(
            &mut warnings,
            SideEffect::ViolationCount,
            &agent.agent_id,
            self.agents.increment_violation_count(&agent.agent_id),
        );
        best_effort(
            &mut warnings,
            SideEffect::TrustScoreUpdate,
            &agent.agent_id,
            self.trust.penalize(self.agents.as_ref(), agent),
        );

        if decision.should_alert {
            let alert = violation_alert(agent, action_type, resource, &decision);
            best_effort(
                &mut warnings,
                SideEffect::AlertDelivery,
                &agent.agent_id,
                self.alerts.create(&alert),
            );
        }

        let verdict = if decision.should_block {
            "blocked"
        } else {
            "allowed"
        };
        let reason = format!(
            "action '{}' is not covered by granted capabilities; {} by policy '{}'",
            action_type, verdict, decision.matched_policy
        );
        record = attach_steps(record, &decision.steps);
        self.finish(
            record,
            !decision.should_block,
            reason,
            Some(decision.matched_policy),
            warnings,
        )
    }

    /// Write the audit record, then hand the decision back.
    fn finish(
        &self,
        record: VerificationRecord,
        allowed: bool,
        reason: String,
        matched_policy: Option<String>,
        warnings: Vec<SideEffectWarning>,
    ) -> Result<Verdict, EngineError> {
        let mut record = record.with_decision(allowed, reason.clone());
        if let Some(policy) = &matched_policy {
            record = record.with_policy(policy.clone());
        }
        let audit_id = self.audit.create(&record)?;

        tracing::info!(
            agent_id = %record.agent_id,
            action_type = %record.action_type,
            %audit_id,
            allowed,
            reason = %reason,
            "action verified"
        );

        Ok(Verdict {
            allowed,
            reason,
            audit_id,
            matched_policy,
            warnings,
        })
    }
}

fn violation_alert(
    agent: &Agent,
    action_type: &str,
    resource: &str,
    decision: &ViolationDecision,
) -> Alert {
    let enforcement = if decision.should_block {
        "The action was blocked."
    } else {
        "The action was allowed; this alert is for monitoring only."
    };
    let description = format!(
        "Agent '{}' attempted action '{}' on resource '{}' without a matching capability grant.\n\
         Policy: {}\n\
         Prior violations: {}\n\
         {}",
        agent.display_name,
        action_type,
        resource,
        decision.matched_policy,
        agent.capability_violation_count,
        enforcement
    );
    Alert::for_agent(
        &agent.organization_id,
        &agent.agent_id,
        CAPABILITY_VIOLATION,
        decision.severity,
        format!("Capability violation by {}", agent.display_name),
        description,
    )
}

/// Add the policy evaluation trace to the record's context. A context that
/// is not a JSON object is kept under `request`.
fn attach_steps(mut record: VerificationRecord, steps: &[EvaluationStep]) -> VerificationRecord {
    let trace = match serde_json::to_value(steps) {
        Ok(trace) => trace,
        Err(e) => {
            tracing::debug!(error = %e, "policy evaluation trace not recorded");
            return record;
        }
    };
    match &mut record.context {
        serde_json::Value::Object(map) => {
            map.insert("policy_evaluation".to_string(), trace);
        }
        serde_json::Value::Null => {
            record.context = serde_json::json!({ "policy_evaluation": trace });
        }
        other => {
            let request = other.take();
            record.context = serde_json::json!({
                "request": request,
                "policy_evaluation": trace,
            });
        }
    }
    record
}
