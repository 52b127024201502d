//! # aim-policy
//!
//! Capability matching and security policy evaluation for agent identity
//! management.
//!
//! Agents act only through capabilities explicitly granted to them. When an
//! action falls outside those grants, the [`SecurityPolicyEngine`] consults
//! the organization's [`SecurityPolicy`] set to decide whether the violation
//! is blocked, alerted on, or allowed.
//!
//! ## Key invariants
//!
//! - **Minimal matching**: `"ns:*"` covers the namespace; everything else is
//!   exact equality. Resources never widen a grant.
//! - **Fail closed**: no policy, no matching selector, or an unknown
//!   enforcement action all resolve to block + alert.
//! - **Parse once**: `applies_to` selectors are validated when a policy is
//!   loaded; evaluation never handles raw selector strings.

pub mod capability;
pub mod engine;
pub mod error;
pub mod policy;
pub mod selector;

pub use capability::CapabilityGrant;
pub use engine::{EvaluationStep, SecurityPolicyEngine, ViolationDecision, DEFAULT_POLICY_NAME};
pub use error::PolicyError;
pub use policy::{
    default_policies, EnforcementAction, PolicySet, PolicyType, SecurityPolicy, Severity,
    DEFAULT_LOW_TRUST_THRESHOLD,
};
pub use selector::{AppliesTo, PolicySubject};
