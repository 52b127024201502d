// warning.rs — Non-fatal side-effect failures.
//
// Drift handling and violation handling perform side effects (send an alert,
// persist a trust score, bump a counter) that must not change the primary
// result when they fail. Each failure is logged and also returned to the
// caller as a SideEffectWarning, so degraded persistence is visible without
// scraping logs.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Which best-effort side effect failed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SideEffect {
    AlertDelivery,
    TrustScoreUpdate,
    ViolationCount,
    PolicyLookup,
}

impl fmt::Display for SideEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SideEffect::AlertDelivery => write!(f, "alert_delivery"),
            SideEffect::TrustScoreUpdate => write!(f, "trust_score_update"),
            SideEffect::ViolationCount => write!(f, "violation_count"),
            SideEffect::PolicyLookup => write!(f, "policy_lookup"),
        }
    }
}

/// A side effect that failed without failing the operation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SideEffectWarning {
    pub effect: SideEffect,
    pub message: String,
}

impl SideEffectWarning {
    /// Record a failure, logging it at warn level.
    pub(crate) fn logged(effect: SideEffect, agent_id: &str, error: &EngineError) -> Self {
        tracing::warn!(agent_id, effect = %effect, error = %error, "best-effort side effect failed");
        Self {
            effect,
            message: error.to_string(),
        }
    }
}

/// Run a side effect; on failure push a warning instead of propagating.
pub(crate) fn best_effort<T>(
    warnings: &mut Vec<SideEffectWarning>,
    effect: SideEffect,
    agent_id: &str,
    result: Result<T, EngineError>,
) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            warnings.push(SideEffectWarning::logged(effect, agent_id, &e));
            None
        }
    }
}
