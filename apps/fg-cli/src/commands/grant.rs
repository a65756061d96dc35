// grant.rs — `fg grant`: temporary grants behind an unlock delay.

use std::sync::Arc;

use chrono::Utc;
use clap::Subcommand;

use fg_policy::{GrantNegotiator, UnlockStatus};

use crate::Context;

#[derive(Subcommand)]
pub enum GrantCommands {
    /// Start (or restart) the unlock countdown for a section.
    Start { section: String },
    /// Show where the countdown for a section stands.
    Status { section: String },
    /// Confirm the grant once the countdown has elapsed.
    Confirm { section: String },
    /// List live grants.
    List,
}

pub async fn execute(cmd: &GrantCommands, ctx: &Context) -> anyhow::Result<()> {
    let negotiator = GrantNegotiator::new(Arc::clone(&ctx.storage))
        .with_unlock_delay(ctx.config.grants.unlock_delay())
        .with_grant_ttl(ctx.config.grants.ttl());
    let now = Utc::now();

    match cmd {
        GrantCommands::Start { section } => {
            let section = negotiator.start(section, now)?;
            println!(
                "Unlock started for {section}; confirm in {}s with `fg grant confirm {section}`.",
                ctx.config.grants.unlock_delay().num_seconds()
            );
        }
        GrantCommands::Status { section } => match negotiator.status(section, now).await? {
            UnlockStatus::Locked => println!("Locked. Run `fg grant start {section}` first."),
            UnlockStatus::SectionChanged { pending } => {
                println!("Locked. The running countdown is for '{pending}'.")
            }
            UnlockStatus::Unlocking { remaining } => {
                println!("Unlocking: {}s remaining.", remaining.num_seconds().max(1))
            }
            UnlockStatus::Unlocked => println!("Unlocked. Confirm with `fg grant confirm {section}`."),
        },
        GrantCommands::Confirm { section } => {
            let entry = negotiator.confirm(section, now).await?;
            println!(
                "Granted {} until {}.",
                entry.section,
                entry.expires_at.format("%Y-%m-%d %H:%M:%S UTC")
            );
        }
        GrantCommands::List => {
            let grants = negotiator.active_grants(now).await?;
            if grants.is_empty() {
                println!("No active grants.");
                return Ok(());
            }
            println!("{:<24} EXPIRES", "SECTION");
            println!("{}", "-".repeat(48));
            for grant in grants {
                let left = grant.expires_at - now;
                println!(
                    "{:<24} {} ({}m left)",
                    grant.section,
                    grant.expires_at.format("%Y-%m-%d %H:%M:%S UTC"),
                    left.num_minutes()
                );
            }
        }
    }
    Ok(())
}
