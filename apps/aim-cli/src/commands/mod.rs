pub mod audit;
pub mod drift;
pub mod grant;
pub mod policy;
pub mod scan;
pub mod state;
pub mod trust;
pub mod verify;

use std::sync::Arc;

use aim_engine::{AlertDispatcher, EngineConfig, JsonlAlertSink, LogAlertSink, TrustScoreModel};

/// Alerts go to the log and to the project's alert file.
pub fn alert_sink(config: &EngineConfig) -> anyhow::Result<Arc<AlertDispatcher>> {
    Ok(Arc::new(
        AlertDispatcher::new()
            .with_sink(Box::new(LogAlertSink))
            .with_sink(Box::new(JsonlAlertSink::open(&config.audit.alerts)?)),
    ))
}

pub fn trust_model(config: &EngineConfig) -> TrustScoreModel {
    TrustScoreModel::new(config.trust)
}
