// audit.rs — Audit subcommands: verify, tail, alerts.

use std::path::{Path, PathBuf};

use clap::Subcommand;

use aim_audit::{AlertLog, AuditError, AuditLog};
use aim_engine::EngineConfig;

#[derive(Subcommand)]
pub enum AuditCommands {
    /// Verify the hash chains of the decision and alert logs.
    Verify {
        /// Path to the decision log (defaults to .aim/audit.jsonl).
        #[arg(long)]
        log: Option<PathBuf>,
    },
    /// Show recent verification decisions.
    Tail {
        /// Path to the decision log (defaults to .aim/audit.jsonl).
        #[arg(long)]
        log: Option<PathBuf>,
        /// Number of records to show.
        #[arg(short, default_value = "10")]
        n: usize,
    },
    /// Show recent alerts.
    Alerts {
        /// Number of alerts to show.
        #[arg(short, default_value = "10")]
        n: usize,
    },
}

pub fn execute(cmd: &AuditCommands, config: &EngineConfig) -> anyhow::Result<()> {
    match cmd {
        AuditCommands::Verify { log } => {
            let path = log.clone().unwrap_or_else(|| config.audit.log.clone());
            verify_one("Decision log", &path, |p| AuditLog::verify_chain(p))?;
            if log.is_none() {
                verify_one("Alert log", &config.audit.alerts, |p| {
                    AlertLog::verify_chain(p)
                })?;
            }
        }

        AuditCommands::Tail { log, n } => {
            let path = log.clone().unwrap_or_else(|| config.audit.log.clone());
            if !path.exists() {
                println!("No audit log found at {}", path.display());
                return Ok(());
            }

            let records = AuditLog::tail(&path, *n)?;
            if records.is_empty() {
                println!("No audit records.");
                return Ok(());
            }

            println!(
                "{:<20} {:<16} {:<16} {:<8} RESOURCE",
                "TIMESTAMP", "AGENT", "ACTION", "OUTCOME"
            );
            println!("{}", "-".repeat(80));
            for record in records {
                println!(
                    "{:<20} {:<16} {:<16} {:<8} {}",
                    record.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    record.agent_id,
                    record.action_type,
                    record.outcome.to_string(),
                    if record.resource.is_empty() {
                        "-"
                    } else {
                        &record.resource
                    },
                );
            }
        }

        AuditCommands::Alerts { n } => {
            let path = &config.audit.alerts;
            if !path.exists() {
                println!("No alert log found at {}", path.display());
                return Ok(());
            }
            for alert in AlertLog::tail(path, *n)? {
                println!(
                    "[{}] {} {}: {}",
                    alert.severity,
                    alert.created_at.format("%Y-%m-%d %H:%M:%S"),
                    alert.alert_type,
                    alert.title
                );
            }
        }
    }

    Ok(())
}

fn verify_one(
    label: &str,
    path: &Path,
    verify: impl FnOnce(&Path) -> Result<usize, AuditError>,
) -> anyhow::Result<()> {
    if !path.exists() {
        println!("{}: not found at {}", label, path.display());
        return Ok(());
    }
    match verify(path) {
        Ok(count) => {
            println!("{} verified: {} record(s), hash chain intact.", label, count);
            Ok(())
        }
        Err(AuditError::IntegrityViolation {
            line,
            expected,
            actual,
        }) => {
            println!("{}: INTEGRITY VIOLATION at line {}:", label, line);
            println!("  Expected previous_hash: {}", expected);
            println!("  Actual previous_hash:   {}", actual);
            println!();
            println!("The log may have been tampered with.");
            anyhow::bail!("{} integrity check failed", label)
        }
        Err(e) => Err(e.into()),
    }
}
