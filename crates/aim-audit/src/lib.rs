//! # aim-audit
//!
//! Verification records, alerts, and tamper-evident logs for agent identity
//! management.
//!
//! Every verification decision is captured as a [`VerificationRecord`] whose
//! ID is handed back to the caller. Security-relevant events become
//! [`Alert`]s. Both can be persisted to append-only JSONL logs where each line
//! carries the SHA-256 of the line before it.
//!
//! ```rust,no_run
//! use aim_audit::{AuditLog, VerificationRecord};
//!
//! let mut log = AuditLog::open("/tmp/audit.jsonl").unwrap();
//! let mut record = VerificationRecord::new("agent-1", "org-1", "file:read", "/data")
//!     .with_decision(true, "action matches registered capabilities");
//! log.append(&mut record).unwrap();
//! ```

pub mod alert;
pub mod error;
pub mod log;
pub mod record;

pub use alert::Alert;
pub use error::AuditError;
pub use log::{AlertLog, AuditLog, Chained, ChainedLog};
pub use record::{VerificationOutcome, VerificationRecord};
