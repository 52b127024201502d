// policy.rs — Policy subcommands: defaults, check.

use std::path::PathBuf;

use clap::Subcommand;

use aim_policy::{default_policies, PolicySet, SecurityPolicy};

#[derive(Subcommand)]
pub enum PolicyCommands {
    /// Print the default policies seeded for a new organization.
    Defaults {
        /// Organization to seed for.
        #[arg(long, default_value = "default")]
        org: String,
    },
    /// Validate a YAML policy file and list its policies in evaluation order.
    Check {
        /// Path to the policy file.
        file: PathBuf,
    },
}

pub fn execute(cmd: &PolicyCommands) -> anyhow::Result<()> {
    match cmd {
        PolicyCommands::Defaults { org } => {
            print!("{}", serde_yaml::to_string(&default_policies(org))?);
        }

        PolicyCommands::Check { file } => {
            let set = PolicySet::load(file)?;
            println!(
                "{}: {} polic(ies) for organization {}",
                file.display(),
                set.policies.len(),
                set.organization_id
            );
            print_table(&set.policies);
        }
    }
    Ok(())
}

fn print_table(policies: &[SecurityPolicy]) {
    if policies.is_empty() {
        return;
    }
    let mut ordered: Vec<&SecurityPolicy> = policies.iter().collect();
    ordered.sort_by(|a, b| b.priority.cmp(&a.priority));

    println!();
    println!(
        "{:>8} {:<22} {:<16} {:<28} {:<9} NAME",
        "PRIORITY", "TYPE", "ACTION", "APPLIES TO", "ENABLED"
    );
    println!("{}", "-".repeat(100));
    for policy in ordered {
        println!(
            "{:>8} {:<22} {:<16} {:<28} {:<9} {}",
            policy.priority,
            policy.policy_type.to_string(),
            policy.enforcement_action.to_string(),
            policy.applies_to.to_string(),
            if policy.is_enabled { "yes" } else { "no" },
            policy.name,
        );
    }
}
