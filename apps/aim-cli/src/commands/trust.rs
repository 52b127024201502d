// trust.rs — Trust subcommands: show, set.

use std::path::Path;

use clap::Subcommand;

use aim_engine::{AgentRepository, EngineConfig};

use super::state::State;

#[derive(Subcommand)]
pub enum TrustCommands {
    /// Show trust scores, lowest first.
    Show {
        /// Only this organization.
        #[arg(long)]
        org: Option<String>,
    },
    /// Set an agent's trust score directly.
    Set {
        agent_id: String,
        score: f64,
    },
}

pub fn execute(cmd: &TrustCommands, config: &EngineConfig, state_path: &Path) -> anyhow::Result<()> {
    let state = State::open(config, state_path)?;

    match cmd {
        TrustCommands::Show { org } => {
            let mut agents: Vec<_> = state
                .agents
                .snapshot()
                .into_iter()
                .filter(|a| org.as_ref().map_or(true, |o| &a.organization_id == o))
                .collect();
            if agents.is_empty() {
                println!("No agents.");
                return Ok(());
            }
            agents.sort_by(|a, b| a.trust_score.total_cmp(&b.trust_score));

            println!(
                "{:<24} {:<12} {:<10} {:>7} {:>10}",
                "AGENT", "ORG", "STATUS", "TRUST", "VIOLATIONS"
            );
            println!("{}", "-".repeat(67));
            for agent in agents {
                println!(
                    "{:<24} {:<12} {:<10} {:>7.1} {:>10}",
                    agent.agent_id,
                    agent.organization_id,
                    agent.status.to_string(),
                    agent.trust_score,
                    agent.capability_violation_count,
                );
            }
        }

        TrustCommands::Set { agent_id, score } => {
            super::trust_model(config).set_trust_score(state.agents.as_ref(), agent_id, *score)?;
            state.save()?;
            let agent = state.agents.get_by_id(agent_id)?;
            println!("Trust score for {} set to {:.1}.", agent.agent_id, agent.trust_score);
        }
    }

    Ok(())
}
