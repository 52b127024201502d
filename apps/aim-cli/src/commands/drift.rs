// drift.rs — `aim drift`: compare runtime observations with registration.

use std::path::Path;

use clap::Args;

use aim_engine::{DriftDetector, EngineConfig};

use super::state::State;

#[derive(Args)]
pub struct DriftArgs {
    /// Agent to check.
    agent_id: String,
    /// MCP server observed at runtime (repeatable).
    #[arg(long = "mcp-server")]
    mcp_servers: Vec<String>,
    /// Capability observed at runtime (repeatable).
    #[arg(long = "capability")]
    capabilities: Vec<String>,
    /// Print the result as JSON.
    #[arg(long)]
    json: bool,
}

pub fn execute(args: &DriftArgs, config: &EngineConfig, state_path: &Path) -> anyhow::Result<()> {
    let state = State::open(config, state_path)?;
    let detector = DriftDetector::new(
        state.agents.clone(),
        super::alert_sink(config)?,
        super::trust_model(config),
    );

    let result = detector.detect(&args.agent_id, &args.mcp_servers, &args.capabilities)?;
    state.save()?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    if !result.drift_detected {
        println!("No drift detected for {}.", args.agent_id);
        return Ok(());
    }

    println!("Drift detected for {}:", args.agent_id);
    for server in &result.mcp_server_drift {
        println!("  MCP server:  {} (not registered)", server);
    }
    for capability in &result.capability_drift {
        println!("  Capability:  {} (not declared)", capability);
    }
    if let Some(alert) = &result.alert {
        println!("  Alert:       {} ({})", alert.alert_id, alert.severity);
    }
    if let Some(score) = result.new_trust_score {
        println!("  Trust score: {:.1}", score);
    }
    for warning in &result.warnings {
        println!("  Warning:     {} failed: {}", warning.effect, warning.message);
    }
    Ok(())
}
