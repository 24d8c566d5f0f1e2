//! Promote command: move the staged build onto the live path

use anyhow::{Context, Result};
use respawn_update::{Promoter, Promotion};

use crate::cli::PromoteArgs;
use crate::output;

/// What the promote command did
#[derive(Debug, PartialEq, Eq)]
enum Outcome {
    Promoted(Promotion),
    Discarded,
    NothingStaged,
}

pub fn run(args: PromoteArgs) -> Result<()> {
    let executable = std::env::current_exe().context("Failed to get current executable path")?;
    let promoter = Promoter::new(executable);

    match execute(&promoter, args.discard)? {
        Outcome::Promoted(promotion) => {
            output::success(&format!("Promoted staged build to {}", promotion.live.display()));
            if let Some(backup) = &promotion.backup {
                output::kv("Backup", &backup.display().to_string());
            }
            output::info("Run 'respawn apply' to restart into it");
        }
        Outcome::Discarded => output::success("Discarded staged build"),
        Outcome::NothingStaged => output::info("Nothing staged"),
    }

    Ok(())
}

fn execute(promoter: &Promoter, discard: bool) -> Result<Outcome> {
    if discard {
        return Ok(if promoter.discard_staged()? {
            Outcome::Discarded
        } else {
            Outcome::NothingStaged
        });
    }

    if !promoter.has_staged() {
        return Ok(Outcome::NothingStaged);
    }

    Ok(Outcome::Promoted(promoter.promote()?))
}
