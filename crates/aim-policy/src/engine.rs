// engine.rs — Security policy evaluation engine.
//
// When an agent attempts an action its capabilities do not cover, the
// SecurityPolicyEngine decides what to do about it:
//
// 1. No enabled policies of the relevant type? → Block + alert (default)
// 2. Sort by priority, highest first (stable: ties keep input order)
// 3. First policy whose selector matches the agent decides:
//      block_and_alert → block + alert
//      alert_only      → alert
//      allow           → nothing
//      unrecognized    → block + alert
// 4. No selector matched? → Block + alert (default)
//
// Absence of policy never silently permits a violation.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::policy::{SecurityPolicy, Severity};
use crate::selector::PolicySubject;

/// Policy name reported when no configured policy decided the outcome.
pub const DEFAULT_POLICY_NAME: &str = "default-deny (no policy configured)";

/// A step in the evaluation chain.
///
/// Captures what the engine checked at each stage so the decision trail
/// can be attached to audit records and alerts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EvaluationStep {
    /// Which check was performed (e.g., "policy_lookup", "selector").
    pub check: String,
    /// The outcome of this check.
    pub outcome: String,
    /// Whether this step was the terminal decision point.
    pub terminal: bool,
}

/// The engine's verdict on one capability violation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ViolationDecision {
    pub should_block: bool,
    pub should_alert: bool,
    /// Name of the deciding policy, or [`DEFAULT_POLICY_NAME`].
    pub matched_policy: String,
    /// Severity to use for any alert raised.
    pub severity: Severity,
    /// The verification record this decision belongs to.
    pub audit_id: Uuid,
    /// Ordered evaluation trace.
    pub steps: Vec<EvaluationStep>,
}

impl ViolationDecision {
    /// True when no configured policy matched and the default applied.
    pub fn is_default(&self) -> bool {
        self.matched_policy == DEFAULT_POLICY_NAME
    }
}

/// Evaluates capability violations against an organization's policies.
///
/// Stateless: policies are passed in per call so the caller controls how
/// they are fetched and cached.
#[derive(Debug, Clone, Default)]
pub struct SecurityPolicyEngine;

impl SecurityPolicyEngine {
    pub fn new() -> Self {
        Self
    }

    /// Decide the enforcement outcome for a violation by `subject`.
    ///
    /// `policies` should be the organization's enabled policies of the
    /// relevant type; disabled entries are skipped regardless.
    pub fn evaluate_violation(
        &self,
        policies: &[SecurityPolicy],
        subject: &PolicySubject,
        action_type: &str,
        resource: &str,
        audit_id: Uuid,
    ) -> ViolationDecision {
        let mut steps = Vec::new();

        let mut ordered: Vec<&SecurityPolicy> = policies.iter().filter(|p| p.is_enabled).collect();
        // `sort_by` is stable, so equal priorities keep their input order.
        ordered.sort_by(|a, b| b.priority.cmp(&a.priority));

        if ordered.is_empty() {
            steps.push(EvaluationStep {
                check: "policy_lookup".to_string(),
                outcome: "no enabled policies; applying default".to_string(),
                terminal: true,
            });
            return default_decision(subject, action_type, resource, audit_id, steps);
        }
        steps.push(EvaluationStep {
            check: "policy_lookup".to_string(),
            outcome: format!("{} enabled polic(ies)", ordered.len()),
            terminal: false,
        });

        for policy in ordered {
            if !policy.applies_to.matches(subject) {
                steps.push(EvaluationStep {
                    check: format!("selector '{}'", policy.name),
                    outcome: format!("skipped: '{}' does not match", policy.applies_to),
                    terminal: false,
                });
                continue;
            }

            let (should_block, should_alert) = policy.enforcement_action.outcome();
            steps.push(EvaluationStep {
                check: format!("selector '{}'", policy.name),
                outcome: format!(
                    "matched '{}': enforcement {}",
                    policy.applies_to, policy.enforcement_action
                ),
                terminal: true,
            });
            tracing::debug!(
                agent_id = %subject.agent_id,
                action_type,
                resource,
                policy = %policy.name,
                should_block,
                should_alert,
                "policy matched capability violation"
            );
            return ViolationDecision {
                should_block,
                should_alert,
                matched_policy: policy.name.clone(),
                severity: policy.severity_threshold,
                audit_id,
                steps,
            };
        }

        steps.push(EvaluationStep {
            check: "selector".to_string(),
            outcome: "no policy selector matched; applying default".to_string(),
            terminal: true,
        });
        default_decision(subject, action_type, resource, audit_id, steps)
    }
}

fn default_decision(
    subject: &PolicySubject,
    action_type: &str,
    resource: &str,
    audit_id: Uuid,
    steps: Vec<EvaluationStep>,
) -> ViolationDecision {
    tracing::debug!(
        agent_id = %subject.agent_id,
        action_type,
        resource,
        "no policy decided capability violation; blocking"
    );
    ViolationDecision {
        should_block: true,
        should_alert: true,
        matched_policy: DEFAULT_POLICY_NAME.to_string(),
        severity: Severity::High,
        audit_id,
        steps,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{EnforcementAction, PolicyType};
    use crate::selector::AppliesTo;

    fn subject(trust_score: f64) -> PolicySubject {
        PolicySubject {
            agent_id: "agent-1".to_string(),
            agent_type: "ai_agent".to_string(),
            trust_score,
        }
    }

    fn policy(
        name: &str,
        action: EnforcementAction,
        applies_to: AppliesTo,
        priority: i32,
    ) -> SecurityPolicy {
        SecurityPolicy::new(
            "org-1",
            name,
            PolicyType::CapabilityViolation,
            action,
            applies_to,
            priority,
            Severity::High,
        )
    }

    fn evaluate(policies: &[SecurityPolicy], trust_score: f64) -> ViolationDecision {
        SecurityPolicyEngine::new().evaluate_violation(
            policies,
            &subject(trust_score),
            "db:drop",
            "db://prod/users",
            Uuid::new_v4(),
        )
    }

    #[test]
    fn no_policies_blocks_and_alerts() {
        let decision = evaluate(&[], 90.0);
        assert!(decision.should_block);
        assert!(decision.should_alert);
        assert!(decision.is_default());
        assert_eq!(decision.steps.len(), 1);
        assert!(decision.steps[0].terminal);
    }

    #[test]
    fn single_allow_policy_for_all_allows_silently() {
        let decision = evaluate(
            &[policy("allow-all", EnforcementAction::Allow, AppliesTo::All, 1)],
            90.0,
        );
        assert!(!decision.should_block);
        assert!(!decision.should_alert);
        assert_eq!(decision.matched_policy, "allow-all");
    }

    #[test]
    fn alert_only_does_not_block() {
        let decision = evaluate(
            &[policy("watch", EnforcementAction::AlertOnly, AppliesTo::All, 1)],
            90.0,
        );
        assert!(!decision.should_block);
        assert!(decision.should_alert);
    }

    #[test]
    fn unrecognized_action_fails_closed() {
        let decision = evaluate(
            &[policy(
                "odd",
                EnforcementAction::Unrecognized("quarantine".into()),
                AppliesTo::All,
                1,
            )],
            90.0,
        );
        assert!(decision.should_block);
        assert!(decision.should_alert);
        assert_eq!(decision.matched_policy, "odd");
    }

    #[test]
    fn highest_priority_wins_regardless_of_input_order() {
        let policies = vec![
            policy("low", EnforcementAction::Allow, AppliesTo::All, 10),
            policy("high", EnforcementAction::BlockAndAlert, AppliesTo::All, 100),
        ];
        let decision = evaluate(&policies, 90.0);
        assert_eq!(decision.matched_policy, "high");
        assert!(decision.should_block);
    }

    #[test]
    fn equal_priority_keeps_first_encountered() {
        let policies = vec![
            policy("first", EnforcementAction::AlertOnly, AppliesTo::All, 50),
            policy("second", EnforcementAction::BlockAndAlert, AppliesTo::All, 50),
        ];
        for _ in 0..10 {
            assert_eq!(evaluate(&policies, 90.0).matched_policy, "first");
        }
    }

    #[test]
    fn non_matching_selector_falls_through() {
        let policies = vec![
            policy(
                "other-agent",
                EnforcementAction::Allow,
                AppliesTo::AgentId("agent-2".into()),
                100,
            ),
            policy(
                "low-trust",
                EnforcementAction::AlertOnly,
                AppliesTo::TrustScoreBelow(30.0),
                50,
            ),
        ];

        let trusted = evaluate(&policies, 90.0);
        assert!(trusted.is_default());
        assert!(trusted.should_block);
        assert_eq!(trusted.steps.len(), 4);

        let untrusted = evaluate(&policies, 10.0);
        assert_eq!(untrusted.matched_policy, "low-trust");
        assert!(!untrusted.should_block);
    }

    #[test]
    fn disabled_policies_are_ignored() {
        let mut disabled = policy("off", EnforcementAction::Allow, AppliesTo::All, 100);
        disabled.is_enabled = false;
        let decision = evaluate(&[disabled], 90.0);
        assert!(decision.is_default());
    }

    #[test]
    fn decision_carries_policy_severity_and_audit_id() {
        let mut p = policy("crit", EnforcementAction::AlertOnly, AppliesTo::All, 1);
        p.severity_threshold = Severity::Critical;
        let audit_id = Uuid::new_v4();
        let decision = SecurityPolicyEngine::new().evaluate_violation(
            &[p],
            &subject(90.0),
            "net:connect",
            "https://example.com",
            audit_id,
        );
        assert_eq!(decision.severity, Severity::Critical);
        assert_eq!(decision.audit_id, audit_id);
    }
}
