// sinks.rs — Where alerts and verification records go.
//
// Alert delivery is fire-and-forget from the engine's point of view: a
// failing AlertSink is reported as a warning and never changes a decision.
// The AuditSink is different. A decision that cannot be recorded is not
// returned to the caller.

use std::path::Path;
use std::sync::Mutex;

use uuid::Uuid;

use aim_audit::{Alert, AlertLog, AuditLog, VerificationRecord};

use crate::error::EngineError;

/// Receives alerts raised by the engine.
pub trait AlertSink: Send + Sync {
    fn create(&self, alert: &Alert) -> Result<(), EngineError>;
}

/// Receives one record per verification decision.
pub trait AuditSink: Send + Sync {
    /// Persist the record and return its ID.
    fn create(&self, record: &VerificationRecord) -> Result<Uuid, EngineError>;
}

/// Keeps alerts in memory.
#[derive(Debug, Default)]
pub struct InMemoryAlertSink {
    alerts: Mutex<Vec<Alert>>,
}

impl InMemoryAlertSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts.lock().map(|a| a.clone()).unwrap_or_default()
    }
}

impl AlertSink for InMemoryAlertSink {
    fn create(&self, alert: &Alert) -> Result<(), EngineError> {
        self.alerts
            .lock()
            .map_err(|_| EngineError::Storage("alert sink lock poisoned".to_string()))?
            .push(alert.clone());
        Ok(())
    }
}

/// Emits alerts as structured `tracing` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogAlertSink;

impl AlertSink for LogAlertSink {
    fn create(&self, alert: &Alert) -> Result<(), EngineError> {
        tracing::warn!(
            alert_id = %alert.alert_id,
            organization_id = %alert.organization_id,
            alert_type = %alert.alert_type,
            severity = %alert.severity,
            resource_id = %alert.resource_id,
            "{}",
            alert.title
        );
        Ok(())
    }
}

/// Appends alerts to a hash-chained JSONL file.
pub struct JsonlAlertSink {
    log: Mutex<AlertLog>,
}

impl JsonlAlertSink {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        Ok(Self {
            log: Mutex::new(AlertLog::open(path)?),
        })
    }
}

impl AlertSink for JsonlAlertSink {
    fn create(&self, alert: &Alert) -> Result<(), EngineError> {
        let mut log = self
            .log
            .lock()
            .map_err(|_| EngineError::Storage("alert log lock poisoned".to_string()))?;
        log.append(&mut alert.clone())?;
        Ok(())
    }
}

/// Fans an alert out to several sinks.
///
/// Every sink is attempted even if an earlier one fails; failures are
/// combined into a single error.
#[derive(Default)]
pub struct AlertDispatcher {
    sinks: Vec<Box<dyn AlertSink>>,
}

impl AlertDispatcher {
    pub fn new() -> Self {
        Self { sinks: Vec::new() }
    }

    pub fn add_sink(&mut self, sink: Box<dyn AlertSink>) {
        self.sinks.push(sink);
    }

    pub fn with_sink(mut self, sink: Box<dyn AlertSink>) -> Self {
        self.add_sink(sink);
        self
    }
}

impl AlertSink for AlertDispatcher {
    fn create(&self, alert: &Alert) -> Result<(), EngineError> {
        let failures: Vec<String> = self
            .sinks
            .iter()
            .filter_map(|sink| sink.create(alert).err().map(|e| e.to_string()))
            .collect();
        if failures.is_empty() {
            Ok(())
        } else {
            Err(EngineError::Storage(failures.join("; ")))
        }
    }
}

/// Keeps verification records in memory.
#[derive(Debug, Default)]
pub struct InMemoryAuditSink {
    records: Mutex<Vec<VerificationRecord>>,
}

impl InMemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<VerificationRecord> {
        self.records.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl AuditSink for InMemoryAuditSink {
    fn create(&self, record: &VerificationRecord) -> Result<Uuid, EngineError> {
        self.records
            .lock()
            .map_err(|_| EngineError::Storage("audit sink lock poisoned".to_string()))?
            .push(record.clone());
        Ok(record.record_id)
    }
}

/// Appends verification records to the hash-chained audit log.
pub struct JsonlAuditSink {
    log: Mutex<AuditLog>,
}

impl JsonlAuditSink {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        Ok(Self {
            log: Mutex::new(AuditLog::open(path)?),
        })
    }
}

impl AuditSink for JsonlAuditSink {
    fn create(&self, record: &VerificationRecord) -> Result<Uuid, EngineError> {
        let mut log = self
            .log
            .lock()
            .map_err(|_| EngineError::Storage("audit log lock poisoned".to_string()))?;
        let mut chained = record.clone();
        log.append(&mut chained)?;
        Ok(chained.record_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aim_policy::Severity;
    use tempfile::tempdir;

    struct FailingSink;

    impl AlertSink for FailingSink {
        fn create(&self, _alert: &Alert) -> Result<(), EngineError> {
            Err(EngineError::Storage("webhook unreachable".to_string()))
        }
    }

    fn alert() -> Alert {
        Alert::for_agent(
            "org-1",
            "agent-1",
            aim_audit::alert::CAPABILITY_VIOLATION,
            Severity::High,
            "Capability violation",
            "agent-1 attempted db:drop",
        )
    }

    #[test]
    fn dispatcher_reaches_every_sink_despite_failures() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("alerts.jsonl");
        let dispatcher = AlertDispatcher::new()
            .with_sink(Box::new(FailingSink))
            .with_sink(Box::new(JsonlAlertSink::open(&path).unwrap()))
            .with_sink(Box::new(LogAlertSink));

        let err = dispatcher.create(&alert()).unwrap_err();
        assert!(err.to_string().contains("webhook unreachable"));
        assert_eq!(AlertLog::read_all(&path).unwrap().len(), 1);
    }

    #[test]
    fn empty_dispatcher_succeeds() {
        assert!(AlertDispatcher::new().create(&alert()).is_ok());
    }

    #[test]
    fn jsonl_audit_sink_returns_record_id_and_chains() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        let sink = JsonlAuditSink::open(&path).unwrap();

        let first = VerificationRecord::new("agent-1", "org-1", "file:read", "/a")
            .with_decision(true, "ok");
        let second = VerificationRecord::new("agent-1", "org-1", "file:write", "/a")
            .with_decision(false, "no");
        assert_eq!(sink.create(&first).unwrap(), first.record_id);
        assert_eq!(sink.create(&second).unwrap(), second.record_id);

        assert_eq!(AuditLog::verify_chain(&path).unwrap(), 2);
    }

    #[test]
    fn in_memory_sinks_keep_everything() {
        let audit = InMemoryAuditSink::new();
        let record = VerificationRecord::new("a", "o", "x:y", "");
        assert_eq!(audit.create(&record).unwrap(), record.record_id);
        assert_eq!(audit.records().len(), 1);

        let alerts = InMemoryAlertSink::new();
        alerts.create(&alert()).unwrap();
        assert_eq!(alerts.alerts().len(), 1);
    }
}
