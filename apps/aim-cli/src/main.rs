//! # aim-cli
//!
//! Command-line interface for agent trust and capability enforcement.
//!
//! Operates on a JSON state snapshot of agents, grants, and policies:
//! - `aim verify` — decide whether an agent may perform an action
//! - `aim drift` — compare observed MCP servers and capabilities to registration
//! - `aim trust show/set` — inspect or set an agent's trust score
//! - `aim grant add/revoke/list` — manage capability grants
//! - `aim policy defaults/check` — print seeded policies, validate a policy file
//! - `aim audit verify/tail/alerts` — inspect the tamper-evident decision and alert logs
//! - `aim scan run/list/show` — security posture scans (`show --latest` for an org's last completed scan)

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use aim_engine::EngineConfig;

/// Agent identity management CLI: verify actions, detect drift, scan posture.
#[derive(Parser)]
#[command(name = "aim", version, about)]
struct Cli {
    /// Project root directory (defaults to current directory).
    #[arg(long, default_value = ".")]
    project_root: PathBuf,

    /// State snapshot with agents, grants, and policies
    /// (defaults to .aim/state.json).
    #[arg(long)]
    state: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Verify whether an agent may perform an action.
    Verify(commands::verify::VerifyArgs),
    /// Detect configuration drift for an agent.
    Drift(commands::drift::DriftArgs),
    /// Inspect or set trust scores.
    Trust {
        #[command(subcommand)]
        command: commands::trust::TrustCommands,
    },
    /// Grant, revoke, and list capabilities.
    Grant {
        #[command(subcommand)]
        command: commands::grant::GrantCommands,
    },
    /// Work with security policies.
    Policy {
        #[command(subcommand)]
        command: commands::policy::PolicyCommands,
    },
    /// Inspect the audit trail.
    Audit {
        #[command(subcommand)]
        command: commands::audit::AuditCommands,
    },
    /// Run and inspect security posture scans.
    Scan {
        #[command(subcommand)]
        command: commands::scan::ScanCommands,
    },
}

fn main() -> anyhow::Result<()> {
    // Logs go to stderr so command output on stdout stays parseable.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("aim_engine=warn".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let project_root = cli.project_root.canonicalize().unwrap_or(cli.project_root);
    let config = EngineConfig::load_or_default(&project_root)?;
    let state_path = cli
        .state
        .unwrap_or_else(|| commands::state::default_path(&project_root));

    match &cli.command {
        Commands::Verify(args) => commands::verify::execute(args, &config, &state_path),
        Commands::Drift(args) => commands::drift::execute(args, &config, &state_path),
        Commands::Trust { command } => commands::trust::execute(command, &config, &state_path),
        Commands::Grant { command } => commands::grant::execute(command, &config, &state_path),
        Commands::Policy { command } => commands::policy::execute(command),
        Commands::Audit { command } => commands::audit::execute(command, &config),
        Commands::Scan { command } => commands::scan::execute(command, &config, &state_path),
    }
}
