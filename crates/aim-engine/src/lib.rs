//! # aim-engine
//!
//! Agent trust and capability enforcement for agent identity management.
//!
//! The engine decides, per requested action, whether an agent may act. It
//! never owns agents, grants, or policies: everything is read through the
//! narrow traits in [`repository`] and every decision is written through an
//! [`AuditSink`].
//!
//! ## Key components
//!
//! - [`ActionVerifier`]: status, compromise, and grant checks, then policy
//!   evaluation on a capability miss
//! - [`DriftDetector`]: observed MCP servers and capabilities vs. registration
//! - [`TrustScoreModel`]: bounded trust score with first/repeated penalties
//! - [`SecurityScanner`]: cancellable posture scans persisted in a [`ScanStore`]
//! - [`EngineConfig`]: `.aim/engine.toml`
//!
//! ## Key invariants
//!
//! - Trust scores stay within `[floor, ceiling]`. Penalties clamp, direct
//!   sets are rejected when out of range.
//! - The violation counter only increases.
//! - Every verification decision after a successful agent lookup produces
//!   exactly one audit record; an unaudited decision is never returned.
//! - Alert delivery and trust persistence are best-effort and surface as
//!   [`SideEffectWarning`]s.

pub mod agent;
pub mod config;
pub mod drift;
pub mod error;
pub mod repository;
pub mod scan;
pub mod scan_store;
pub mod scanner;
pub mod sinks;
pub mod trust;
pub mod verifier;
pub mod warning;

pub use agent::{Agent, AgentStatus, AgentType};
pub use config::EngineConfig;
pub use drift::{DriftDetector, DriftResult};
pub use error::EngineError;
pub use repository::{
    AgentRepository, CapabilityRepository, InMemoryAgentRepository, InMemoryCapabilityRepository,
    InMemoryPolicyRepository, PolicyRepository,
};
pub use scan::{PostureSummary, ScanRun, ScanState};
pub use scan_store::ScanStore;
pub use scanner::{CancelFlag, ScanHandle, SecurityScanner};
pub use sinks::{
    AlertDispatcher, AlertSink, AuditSink, InMemoryAlertSink, InMemoryAuditSink, JsonlAlertSink,
    JsonlAuditSink, LogAlertSink,
};
pub use trust::{TrustConfig, TrustScoreModel};
pub use verifier::{ActionVerifier, Verdict};
pub use warning::{SideEffect, SideEffectWarning};
