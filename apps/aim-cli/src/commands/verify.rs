// verify.rs — `aim verify`: decide whether an agent may perform an action.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use clap::Args;

use aim_engine::{ActionVerifier, EngineConfig, JsonlAuditSink};

use super::state::State;

#[derive(Args)]
pub struct VerifyArgs {
    /// Agent performing the action.
    agent_id: String,
    /// Action type, e.g. "file:read".
    action: String,
    /// Resource the action targets (recorded, not matched).
    #[arg(long, default_value = "")]
    resource: String,
    /// Request context as a JSON object, stored on the audit record.
    #[arg(long)]
    context: Option<String>,
    /// Print the outcome as JSON.
    #[arg(long)]
    json: bool,
}

pub fn execute(args: &VerifyArgs, config: &EngineConfig, state_path: &Path) -> anyhow::Result<()> {
    let context = match &args.context {
        Some(raw) => serde_json::from_str(raw).context("--context must be valid JSON")?,
        None => serde_json::Value::Null,
    };

    let state = State::open(config, state_path)?;
    let verifier = ActionVerifier::new(
        state.agents.clone(),
        state.grants.clone(),
        state.policies.clone(),
        super::alert_sink(config)?,
        Arc::new(JsonlAuditSink::open(&config.audit.log)?),
    )
    .with_trust_model(super::trust_model(config));

    let outcome = verifier.verify(&args.agent_id, &args.action, &args.resource, context)?;
    state.save()?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        println!(
            "{}: {}",
            if outcome.allowed { "ALLOWED" } else { "DENIED" },
            outcome.reason
        );
        println!("  Audit ID: {}", outcome.audit_id);
        if let Some(policy) = &outcome.matched_policy {
            println!("  Policy:   {}", policy);
        }
        for warning in &outcome.warnings {
            println!("  Warning:  {} failed: {}", warning.effect, warning.message);
        }
    }

    if !outcome.allowed {
        anyhow::bail!("action '{}' denied for agent {}", args.action, args.agent_id);
    }
    Ok(())
}
