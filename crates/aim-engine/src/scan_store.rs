// scan_store.rs — ScanStore: persistence for posture scan runs.
//
// Each ScanRun is stored as `<runs_dir>/<scan_id>.json`, rewritten on every
// state change. Files that fail to parse are skipped when listing.

use std::fs;
use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::error::EngineError;
use crate::scan::{ScanRun, ScanState};

/// Persistent store for ScanRun records.
#[derive(Debug, Clone)]
pub struct ScanStore {
    runs_dir: PathBuf,
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> EngineError + '_ {
    move |source| EngineError::Io {
        path: path.display().to_string(),
        source,
    }
}

impl ScanStore {
    /// Open a store rooted at `runs_dir`, creating the directory.
    pub fn new(runs_dir: impl AsRef<Path>) -> Result<Self, EngineError> {
        let runs_dir = runs_dir.as_ref().to_path_buf();
        fs::create_dir_all(&runs_dir).map_err(io_error(&runs_dir))?;
        Ok(Self { runs_dir })
    }

    pub fn save(&self, run: &ScanRun) -> Result<(), EngineError> {
        let path = self.run_file(run.scan_id);
        let json = serde_json::to_string_pretty(run)?;
        fs::write(&path, json).map_err(io_error(&path))?;
        Ok(())
    }

    pub fn get(&self, scan_id: Uuid) -> Result<Option<ScanRun>, EngineError> {
        let path = self.run_file(scan_id);
        if !path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(&path).map_err(io_error(&path))?;
        Ok(Some(serde_json::from_str(&json)?))
    }

    /// All runs, newest first.
    pub fn list(&self) -> Result<Vec<ScanRun>, EngineError> {
        let mut runs = Vec::new();
        for entry in fs::read_dir(&self.runs_dir).map_err(io_error(&self.runs_dir))? {
            let path = entry.map_err(io_error(&self.runs_dir))?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                let json = fs::read_to_string(&path).map_err(io_error(&path))?;
                match serde_json::from_str::<ScanRun>(&json) {
                    Ok(run) => runs.push(run),
                    Err(e) => tracing::warn!(path = %path.display(), error = %e, "skipping unreadable scan run"),
                }
            }
        }
        runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(runs)
    }

    /// Runs for one organization, newest first.
    pub fn list_for_organization(&self, organization_id: &str) -> Result<Vec<ScanRun>, EngineError> {
        Ok(self
            .list()?
            .into_iter()
            .filter(|r| r.organization_id == organization_id)
            .collect())
    }

    /// The newest completed run for an organization.
    pub fn latest_completed(&self, organization_id: &str) -> Result<Option<ScanRun>, EngineError> {
        Ok(self
            .list_for_organization(organization_id)?
            .into_iter()
            .find(|r| matches!(r.state, ScanState::Completed { .. })))
    }

    /// Move a stored run to `next` and persist it.
    pub fn transition(&self, scan_id: Uuid, next: ScanState) -> Result<ScanRun, EngineError> {
        let mut run = self.get(scan_id)?.ok_or_else(|| EngineError::NotFound {
            entity: "scan",
            id: scan_id.to_string(),
        })?;
        run.transition(next)?;
        self.save(&run)?;
        Ok(run)
    }

    fn run_file(&self, scan_id: Uuid) -> PathBuf {
        self.runs_dir.join(format!("{}.json", scan_id))
    }
}
