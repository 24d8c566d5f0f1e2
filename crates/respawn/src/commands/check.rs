//! Check command: one poll cycle, now

use anyhow::Result;
use camino::Utf8Path;

use crate::cli::CheckArgs;
use crate::commands::{build_updater, load_runtime};
use crate::output;

pub async fn run(args: CheckArgs, config_dir: Option<&Utf8Path>) -> Result<()> {
    let runtime = load_runtime(config_dir, &args.upstream)?;
    let updater = build_updater(&runtime)?;

    let spinner = output::spinner(&format!("Fetching {}", updater.config().upstream()));
    let result = updater.poll_once().await;
    spinner.finish_and_clear();

    let report = result?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report.metadata)?);
        return Ok(());
    }

    output::success(&format!("Staged {}", report.metadata));
    output::release(&report.metadata);
    output::kv("Staged at", &report.staged_path.display().to_string());
    match &report.promotion {
        Some(promotion) => output::kv("Promoted to", &promotion.live.display().to_string()),
        None => output::info("Run 'respawn apply' to restart into the staged build"),
    }

    Ok(())
}
