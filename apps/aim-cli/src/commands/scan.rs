// scan.rs — Scan subcommands: run, list, show.

use std::path::Path;

use clap::Subcommand;
use uuid::Uuid;

use aim_engine::{EngineConfig, PostureSummary, ScanRun, ScanState, ScanStore, SecurityScanner};

use super::trust_model;

use super::state::State;

#[derive(Subcommand)]
pub enum ScanCommands {
    /// Scan an organization's agents and persist a posture summary.
    Run {
        /// Organization to scan.
        #[arg(long)]
        org: String,
    },
    /// List scan runs, newest first.
    List {
        /// Only this organization.
        #[arg(long)]
        org: Option<String>,
    },
    /// Show one scan run.
    Show {
        /// Scan ID.
        #[arg(required_unless_present = "latest")]
        scan_id: Option<Uuid>,
        /// Show the organization's newest completed scan instead.
        #[arg(long, requires = "org", conflicts_with = "scan_id")]
        latest: bool,
        /// Organization for --latest.
        #[arg(long)]
        org: Option<String>,
    },
}

pub fn execute(cmd: &ScanCommands, config: &EngineConfig, state_path: &Path) -> anyhow::Result<()> {
    let store = ScanStore::new(&config.scan.runs_dir)?;

    match cmd {
        ScanCommands::Run { org } => {
            let state = State::open(config, state_path)?;
            let scanner =
                SecurityScanner::new(state.agents.clone(), store, config.scan.low_trust_threshold)
                    .with_trust_model(trust_model(config));
            let handle = scanner.spawn(org)?;
            println!("Scan {} started for {}.", handle.scan_id(), org);
            let run = handle.join()?;
            print_run(&run);
            if let ScanState::Failed { reason } = &run.state {
                anyhow::bail!("scan {} failed: {}", run.scan_id, reason);
            }
        }

        ScanCommands::List { org } => {
            let runs = match org {
                Some(org) => store.list_for_organization(org)?,
                None => store.list()?,
            };
            if runs.is_empty() {
                println!("No scan runs.");
                return Ok(());
            }
            println!(
                "{:<38} {:<12} {:<10} {:<20} AGENTS",
                "SCAN ID", "ORG", "STATE", "STARTED"
            );
            println!("{}", "-".repeat(90));
            for run in runs {
                println!(
                    "{:<38} {:<12} {:<10} {:<20} {}",
                    run.scan_id,
                    run.organization_id,
                    run.state.to_string(),
                    run.started_at.format("%Y-%m-%d %H:%M:%S"),
                    run.summary()
                        .map_or("-".to_string(), |s| s.total_agents.to_string()),
                );
            }
        }

        ScanCommands::Show {
            scan_id,
            latest,
            org,
        } => {
            let latest_org = if *latest { org.as_deref() } else { None };
            print_run(&find_run(&store, *scan_id, latest_org)?);
        }
    }

    Ok(())
}

/// Look up a run by ID, or the newest completed run of `latest_org`.
fn find_run(
    store: &ScanStore,
    scan_id: Option<Uuid>,
    latest_org: Option<&str>,
) -> anyhow::Result<ScanRun> {
    if let Some(org) = latest_org {
        return store
            .latest_completed(org)?
            .ok_or_else(|| anyhow::anyhow!("no completed scan for {}", org));
    }
    let Some(scan_id) = scan_id else {
        anyhow::bail!("a scan ID or --latest --org is required");
    };
    store
        .get(scan_id)?
        .ok_or_else(|| anyhow::anyhow!("scan {} not found", scan_id))
}

fn print_run(run: &ScanRun) {
    println!("Scan:     {}", run.scan_id);
    println!("Org:      {}", run.organization_id);
    println!("State:    {}", run.state);
    println!("Started:  {}", run.started_at.format("%Y-%m-%d %H:%M:%S"));
    if let Some(finished) = run.finished_at {
        println!("Finished: {}", finished.format("%Y-%m-%d %H:%M:%S"));
    }
    match &run.state {
        ScanState::Completed { summary } => print_summary(summary),
        ScanState::Failed { reason } => println!("Reason:   {}", reason),
        ScanState::Running => {}
    }
}

fn print_summary(summary: &PostureSummary) {
    println!();
    println!("Agents:             {}", summary.total_agents);
    for (status, count) in &summary.by_status {
        println!("  {:<16} {}", status, count);
    }
    println!("Average trust:      {:.1}", summary.average_trust_score);
    println!("Total violations:   {}", summary.total_violations);
    println!(
        "Low trust (< {:.1}): {}",
        summary.low_trust_threshold,
        list_or_none(&summary.low_trust_agents)
    );
    println!(
        "Compromised:        {}",
        list_or_none(&summary.compromised_agents)
    );
}

fn list_or_none(ids: &[String]) -> String {
    if ids.is_empty() {
        "none".to_string()
    } else {
        ids.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn latest_skips_unfinished_runs() {
        let dir = tempdir().unwrap();
        let store = ScanStore::new(dir.path()).unwrap();

        let done = ScanRun::start("org-1");
        store.save(&done).unwrap();
        store
            .transition(
                done.scan_id,
                ScanState::Completed {
                    summary: PostureSummary::new(30.0),
                },
            )
            .unwrap();
        store.save(&ScanRun::start("org-1")).unwrap();

        let found = find_run(&store, None, Some("org-1")).unwrap();
        assert_eq!(found.scan_id, done.scan_id);
        assert!(find_run(&store, None, Some("org-2")).is_err());
    }

    #[test]
    fn lookup_by_id() {
        let dir = tempdir().unwrap();
        let store = ScanStore::new(dir.path()).unwrap();
        let run = ScanRun::start("org-1");
        store.save(&run).unwrap();

        assert_eq!(find_run(&store, Some(run.scan_id), None).unwrap(), run);
        assert!(find_run(&store, Some(Uuid::new_v4()), None).is_err());
        assert!(find_run(&store, None, None).is_err());
    }
}
