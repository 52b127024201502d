// grant.rs — Capability grant subcommands: add, revoke, list.

use std::path::Path;

use clap::Subcommand;

use aim_engine::{AgentRepository, CapabilityRepository, EngineConfig};
use aim_policy::CapabilityGrant;

use super::state::State;

#[derive(Subcommand)]
pub enum GrantCommands {
    /// Grant a capability pattern (e.g. "file:read", "file:*") to an agent.
    Add {
        agent_id: String,
        capability: String,
        /// Identity issuing the grant.
        #[arg(long, default_value = "admin")]
        by: String,
    },
    /// Revoke every active grant of a capability pattern. History is kept.
    Revoke {
        agent_id: String,
        capability: String,
    },
    /// List an agent's grants, including revoked ones.
    List { agent_id: String },
}

pub fn execute(cmd: &GrantCommands, config: &EngineConfig, state_path: &Path) -> anyhow::Result<()> {
    let state = State::open(config, state_path)?;

    match cmd {
        GrantCommands::Add {
            agent_id,
            capability,
            by,
        } => {
            state.agents.get_by_id(agent_id)?;
            let grant = CapabilityGrant::new(agent_id.as_str(), capability.as_str(), by.as_str());
            let grant_id = grant.grant_id;
            state.grants.grant(grant)?;
            state.save()?;
            println!("Granted {} to {} ({}).", capability, agent_id, grant_id);
        }

        GrantCommands::Revoke {
            agent_id,
            capability,
        } => {
            let revoked = state.grants.revoke(agent_id, capability)?;
            if revoked == 0 {
                anyhow::bail!("{} holds no active grant for '{}'", agent_id, capability);
            }
            state.save()?;
            println!("Revoked {} grant(s) of {} from {}.", revoked, capability, agent_id);
        }

        GrantCommands::List { agent_id } => {
            let grants: Vec<CapabilityGrant> = state
                .grants
                .snapshot()
                .into_iter()
                .filter(|g| &g.agent_id == agent_id)
                .collect();
            if grants.is_empty() {
                println!("No grants for {}.", agent_id);
                return Ok(());
            }
            let active = state.grants.get_active_grants(agent_id)?.len();
            println!("{} grant(s) for {}, {} active.", grants.len(), agent_id, active);
            println!();
            println!("{:<24} {:<8} {:<12} GRANTED", "CAPABILITY", "ACTIVE", "BY");
            println!("{}", "-".repeat(66));
            for grant in grants {
                println!(
                    "{:<24} {:<8} {:<12} {}",
                    grant.capability,
                    if grant.is_active { "yes" } else { "no" },
                    grant.granted_by,
                    grant.granted_at.format("%Y-%m-%d %H:%M:%S"),
                );
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::state::{default_path, Snapshot};
    use aim_engine::{Agent, AgentType};
    use tempfile::tempdir;

    fn setup(dir: &Path) -> (EngineConfig, std::path::PathBuf) {
        let config = EngineConfig::for_project(dir);
        let path = default_path(dir);
        Snapshot {
            agents: vec![Agent::new("a", "org-1", "A", AgentType::AiAgent, 70.0)],
            ..Snapshot::default()
        }
        .save(&path)
        .unwrap();
        (config, path)
    }

    #[test]
    fn add_then_revoke_keeps_history() {
        let dir = tempdir().unwrap();
        let (config, path) = setup(dir.path());
        let add = GrantCommands::Add {
            agent_id: "a".to_string(),
            capability: "db:*".to_string(),
            by: "ops".to_string(),
        };
        execute(&add, &config, &path).unwrap();

        let revoke = GrantCommands::Revoke {
            agent_id: "a".to_string(),
            capability: "db:*".to_string(),
        };
        execute(&revoke, &config, &path).unwrap();

        let saved = Snapshot::load(&path).unwrap();
        assert_eq!(saved.grants.len(), 1);
        assert!(!saved.grants[0].is_active);
        assert_eq!(saved.grants[0].granted_by, "ops");

        // Nothing left to revoke.
        assert!(execute(&revoke, &config, &path).is_err());
    }

    #[test]
    fn granting_to_unknown_agent_fails() {
        let dir = tempdir().unwrap();
        let (config, path) = setup(dir.path());
        let add = GrantCommands::Add {
            agent_id: "ghost".to_string(),
            capability: "file:read".to_string(),
            by: "admin".to_string(),
        };
        assert!(execute(&add, &config, &path).is_err());
        assert!(Snapshot::load(&path).unwrap().grants.is_empty());
    }
}
