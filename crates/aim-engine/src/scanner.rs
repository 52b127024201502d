// scanner.rs — Background security posture scanning.
//
// SecurityScanner walks every agent of an organization and folds them into a
// PostureSummary. The run is persisted as Running before the first agent is
// read, and as Completed or Failed afterwards. Cancellation is cooperative
// and checked between agents.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use uuid::Uuid;

use crate::error::EngineError;
use crate::repository::AgentRepository;
use crate::scan::{PostureSummary, ScanRun, ScanState};
use crate::scan_store::ScanStore;
use crate::trust::TrustScoreModel;

/// Reason recorded on runs stopped through a [`CancelFlag`].
pub const CANCELLED_REASON: &str = "cancelled";

/// Shared cancellation signal for a running scan.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Handle to a scan running on a background thread.
pub struct ScanHandle {
    scan_id: Uuid,
    cancel: CancelFlag,
    thread: JoinHandle<Result<ScanRun, EngineError>>,
}

impl ScanHandle {
    pub fn scan_id(&self) -> Uuid {
        self.scan_id
    }

    /// Ask the scan to stop at the next agent boundary.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the scan and return its final persisted state.
    pub fn join(self) -> Result<ScanRun, EngineError> {
        self.thread
            .join()
            .map_err(|_| EngineError::Storage(format!("scan {} worker panicked", self.scan_id)))?
    }
}

/// Computes and persists organization posture summaries.
#[derive(Clone)]
pub struct SecurityScanner {
    agents: Arc<dyn AgentRepository>,
    store: ScanStore,
    low_trust_threshold: f64,
    trust: TrustScoreModel,
}

impl SecurityScanner {
    pub fn new(agents: Arc<dyn AgentRepository>, store: ScanStore, low_trust_threshold: f64) -> Self {
        Self {
            agents,
            store,
            low_trust_threshold,
            trust: TrustScoreModel::default(),
        }
    }

    /// Bounds used to clamp stored scores before they are summarized.
    pub fn with_trust_model(mut self, trust: TrustScoreModel) -> Self {
        self.trust = trust;
        self
    }

    pub fn store(&self) -> &ScanStore {
        &self.store
    }

    /// Run a scan to completion on the calling thread.
    ///
    /// Returns the final run. A cancelled scan or a repository failure is a
    /// `Failed` run, not an error; only scan-store failures are errors.
    pub fn run(&self, organization_id: &str, cancel: &CancelFlag) -> Result<ScanRun, EngineError> {
        let run = self.begin(organization_id)?;
        self.finish(run, cancel)
    }

    /// Start a scan on a background thread.
    ///
    /// The Running record is persisted before this returns, so the scan is
    /// visible in the store as soon as the caller has its ID.
    pub fn spawn(&self, organization_id: &str) -> Result<ScanHandle, EngineError> {
        let run = self.begin(organization_id)?;
        let scan_id = run.scan_id;
        let cancel = CancelFlag::new();

        let scanner = self.clone();
        let worker_cancel = cancel.clone();
        let spawned = std::thread::Builder::new()
            .name(format!("aim-scan-{}", scan_id))
            .spawn(move || scanner.finish(run, &worker_cancel));
        let thread = match spawned {
            Ok(thread) => thread,
            Err(source) => return Err(self.abandon(scan_id, source)),
        };

        Ok(ScanHandle {
            scan_id,
            cancel,
            thread,
        })
    }

    fn begin(&self, organization_id: &str) -> Result<ScanRun, EngineError> {
        let run = ScanRun::start(organization_id);
        self.store.save(&run)?;
        tracing::info!(scan_id = %run.scan_id, organization_id, "posture scan started");
        Ok(run)
    }

    /// Close out a persisted Running run whose worker never started.
    fn abandon(&self, scan_id: Uuid, source: std::io::Error) -> EngineError {
        let reason = format!("scan worker failed to start: {}", source);
        tracing::warn!(%scan_id, reason = %reason, "posture scan abandoned");
        if let Err(e) = self.store.transition(scan_id, ScanState::Failed { reason }) {
            tracing::warn!(%scan_id, error = %e, "could not persist abandoned scan");
        }
        EngineError::Io {
            path: format!("scan thread {}", scan_id),
            source,
        }
    }

    fn finish(&self, run: ScanRun, cancel: &CancelFlag) -> Result<ScanRun, EngineError> {
        let next = match self.summarize(&run.organization_id, cancel) {
            Ok(summary) => {
                tracing::info!(
                    scan_id = %run.scan_id,
                    total_agents = summary.total_agents,
                    low_trust = summary.low_trust_agents.len(),
                    compromised = summary.compromised_agents.len(),
                    "posture scan completed"
                );
                ScanState::Completed { summary }
            }
            Err(reason) => {
                tracing::warn!(scan_id = %run.scan_id, reason = %reason, "posture scan failed");
                ScanState::Failed { reason }
            }
        };
        self.store.transition(run.scan_id, next)
    }

    fn summarize(&self, organization_id: &str, cancel: &CancelFlag) -> Result<PostureSummary, String> {
        let agents = self
            .agents
            .list_by_organization(organization_id)
            .map_err(|e| e.to_string())?;
        let mut summary = PostureSummary::new(self.low_trust_threshold);
        for agent in &agents {
            if cancel.is_cancelled() {
                return Err(CANCELLED_REASON.to_string());
            }
            summary.record(agent, self.trust.clamp(agent.trust_score));
        }
        Ok(summary)
    }
}
