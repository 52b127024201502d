// error.rs — Error types for the enforcement engine.

use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced by engine operations.
///
/// Best-effort side effects (alert delivery, trust-score persistence during
/// drift or violation handling) never produce these; they are reported as
/// [`SideEffectWarning`](crate::SideEffectWarning)s instead.
#[derive(Debug, Error)]
pub enum EngineError {
    /// An agent, policy, grant, or scan lookup missed.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A directly set trust score lies outside the legal range.
    #[error("trust score {score} is outside the allowed range [{floor}, {ceiling}]")]
    InvalidTrustScore { score: f64, floor: f64, ceiling: f64 },

    /// A repository or sink backend failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// Writing or reading the audit trail failed.
    #[error("audit error: {0}")]
    Audit(#[from] aim_audit::AuditError),

    /// Loading policies failed.
    #[error("policy error: {0}")]
    Policy(#[from] aim_policy::PolicyError),

    /// Engine configuration is invalid.
    #[error("invalid configuration at {path}: {reason}")]
    Config { path: String, reason: String },

    /// A file I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    /// Failed to serialize/deserialize engine state.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid scan state transition.
    #[error("invalid transition from {from} to {to} for scan {scan_id}")]
    InvalidTransition {
        scan_id: Uuid,
        from: String,
        to: String,
    },
}

impl EngineError {
    pub fn agent_not_found(agent_id: &str) -> Self {
        EngineError::NotFound {
            entity: "agent",
            id: agent_id.to_string(),
        }
    }
}
