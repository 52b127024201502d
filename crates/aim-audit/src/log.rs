// log.rs — Append-only, hash-chained JSONL logs.
//
// Records are stored one JSON object per line. Each record carries the
// SHA-256 of the previous raw line in `previous_hash`, so inserting,
// deleting, or editing any line breaks the chain and is caught by
// `verify_chain`.
//
// The same mechanism backs both the verification audit log and the alert log.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::alert::Alert;
use crate::error::AuditError;
use crate::record::VerificationRecord;

/// A record type that can be linked into a hash chain.
pub trait Chained: Serialize + DeserializeOwned {
    fn previous_hash(&self) -> Option<&str>;
    fn set_previous_hash(&mut self, hash: Option<String>);
}

/// Verification records, one per decision.
pub type AuditLog = ChainedLog<VerificationRecord>;
/// Alerts raised by the engine.
pub type AlertLog = ChainedLog<Alert>;

/// An append-only log of `T` backed by a JSONL file.
pub struct ChainedLog<T: Chained> {
    writer: BufWriter<File>,
    path: PathBuf,
    /// Hash of the last line written; becomes the next record's `previous_hash`.
    last_hash: Option<String>,
    _record: PhantomData<T>,
}

/// Lowercase hex SHA-256 of one raw log line.
fn line_hash(line: &str) -> String {
    format!("{:x}", Sha256::digest(line.as_bytes()))
}

fn open_error(path: &Path) -> impl FnOnce(std::io::Error) -> AuditError + '_ {
    move |source| AuditError::OpenFailed {
        path: path.to_path_buf(),
        source,
    }
}

/// Non-blank lines of a log file, in order, with 1-based line numbers.
fn read_lines(path: &Path) -> Result<Vec<(usize, String)>, AuditError> {
    let file = File::open(path).map_err(open_error(path))?;
    let mut lines = Vec::new();
    for (idx, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if !line.trim().is_empty() {
            lines.push((idx + 1, line));
        }
    }
    Ok(lines)
}

impl<T: Chained> ChainedLog<T> {
    /// Open (or create) a log. Existing content is scanned to recover the
    /// chain head so new records link correctly.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AuditError> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(open_error(parent))?;
        }

        let last_hash = if path.exists() {
            let lines = read_lines(&path)?;
            tracing::debug!(path = %path.display(), records = lines.len(), "recovered chain head");
            lines.last().map(|(_, line)| line_hash(line))
        } else {
            None
        };

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(open_error(&path))?;

        Ok(Self {
            writer: BufWriter::new(file),
            path,
            last_hash,
            _record: PhantomData,
        })
    }

    /// Append a record, linking it to the chain head. Flushed before returning.
    pub fn append(&mut self, record: &mut T) -> Result<(), AuditError> {
        record.set_previous_hash(self.last_hash.clone());
        let json = serde_json::to_string(record)?;
        writeln!(self.writer, "{}", json)?;
        self.writer.flush()?;
        self.last_hash = Some(line_hash(&json));
        Ok(())
    }

    /// Read every record, oldest first.
    pub fn read_all(path: impl AsRef<Path>) -> Result<Vec<T>, AuditError> {
        read_lines(path.as_ref())?
            .into_iter()
            .map(|(_, line)| serde_json::from_str(&line).map_err(AuditError::from))
            .collect()
    }

    /// The most recent `n` records, oldest first.
    pub fn tail(path: impl AsRef<Path>, n: usize) -> Result<Vec<T>, AuditError> {
        let mut all = Self::read_all(path)?;
        let start = all.len().saturating_sub(n);
        Ok(all.split_off(start))
    }

    /// Check every link. Returns the number of records verified, or
    /// `IntegrityViolation` at the first broken link.
    pub fn verify_chain(path: impl AsRef<Path>) -> Result<usize, AuditError> {
        let mut expected: Option<String> = None;
        let mut count = 0;

        for (line_num, line) in read_lines(path.as_ref())? {
            let record: T = serde_json::from_str(&line)?;
            if record.previous_hash() != expected.as_deref() {
                return Err(AuditError::IntegrityViolation {
                    line: line_num,
                    expected: expected.unwrap_or_else(|| "None".to_string()),
                    actual: record.previous_hash().unwrap_or("None").to_string(),
                });
            }
            // Hash the raw line: re-serializing could reorder fields.
            expected = Some(line_hash(&line));
            count += 1;
        }

        Ok(count)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aim_policy::Severity;
    use tempfile::tempdir;

    fn record(agent: &str, allowed: bool) -> VerificationRecord {
        VerificationRecord::new(agent, "org-1", "file:read", "/srv/data.csv")
            .with_decision(allowed, if allowed { "ok" } else { "no" })
    }

    #[test]
    fn appended_records_read_back_in_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");

        let mut log = AuditLog::open(&path).unwrap();
        assert_eq!(log.path(), path.as_path());
        let mut first = record("agent-1", true);
        let mut second = record("agent-2", false);
        log.append(&mut first).unwrap();
        log.append(&mut second).unwrap();

        let records = AuditLog::read_all(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].record_id, first.record_id);
        assert!(records[0].previous_hash.is_none());
        assert!(records[1].previous_hash.is_some());
        assert!(!records[1].is_allowed());
    }

    #[test]
    fn chain_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("audit.jsonl");

        for i in 0..3 {
            let mut log = AuditLog::open(&path).unwrap();
            log.append(&mut record(&format!("agent-{}", i), true)).unwrap();
        }

        assert_eq!(AuditLog::verify_chain(&path).unwrap(), 3);
    }

    #[test]
    fn tampering_is_detected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        {
            let mut log = AuditLog::open(&path).unwrap();
            log.append(&mut record("agent-1", false)).unwrap();
            log.append(&mut record("agent-1", false)).unwrap();
            log.append(&mut record("agent-1", false)).unwrap();
        }

        // Flip the first denial into an allowance.
        let content = std::fs::read_to_string(&path).unwrap();
        let forged = content.replacen("\"denied\"", "\"allowed\"", 1);
        std::fs::write(&path, forged).unwrap();

        match AuditLog::verify_chain(&path) {
            Err(AuditError::IntegrityViolation { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected IntegrityViolation, got {:?}", other),
        }
    }

    #[test]
    fn tail_returns_most_recent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        let mut log = AuditLog::open(&path).unwrap();
        for i in 0..5 {
            log.append(&mut record(&format!("agent-{}", i), true)).unwrap();
        }

        let recent = AuditLog::tail(&path, 2).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].agent_id, "agent-3");
        assert_eq!(recent[1].agent_id, "agent-4");
        assert_eq!(AuditLog::tail(&path, 10).unwrap().len(), 5);
    }

    #[test]
    fn alert_log_uses_the_same_chain() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("alerts.jsonl");
        let mut log = AlertLog::open(&path).unwrap();
        let mut alert = Alert::for_agent(
            "org-1",
            "agent-1",
            crate::alert::CONFIGURATION_DRIFT,
            Severity::High,
            "drift",
            "details",
        );
        log.append(&mut alert).unwrap();
        log.append(&mut alert.clone()).unwrap();

        assert_eq!(AlertLog::verify_chain(&path).unwrap(), 2);
    }
}
