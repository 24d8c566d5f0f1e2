//! Watch command: poll until interrupted, optionally restarting into new builds

use anyhow::Result;
use camino::Utf8Path;
use chrono::Local;
use respawn_update::{PollEvent, PollOutcome, Updater};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::cli::WatchArgs;
use crate::commands::{build_updater, load_runtime};
use crate::output;

pub async fn run(args: WatchArgs, config_dir: Option<&Utf8Path>) -> Result<()> {
    let mut runtime = load_runtime(config_dir, &args.upstream)?;
    if let Some(secs) = args.interval {
        runtime.polling.interval_secs = secs;
    }
    let updater = build_updater(&runtime)?;

    output::info(&format!(
        "Watching {} every {}s (Ctrl-C to stop)",
        updater.config().upstream(),
        updater.config().interval().as_secs()
    ));

    let cancel = CancellationToken::new();
    let mut poller = updater.start_polling(cancel.clone());

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c(), if !cancel.is_cancelled() => {
                output::info("Stopping after the current cycle");
                cancel.cancel();
            }
            event = poller.recv() => {
                let Some(event) = event else { break };
                print_event(&event);
                if args.apply && event.is_success() && !cancel.is_cancelled() {
                    restart(&updater);
                }
            }
        }
    }

    poller.join().await?;
    debug!("Watch finished");
    Ok(())
}

/// Restart into the new build; only returns if the restart failed
fn restart(updater: &Updater) {
    output::info("Restarting into the new build");
    let result = tokio::task::block_in_place(|| updater.restart_and_update());
    if let Err(e) = result {
        output::error(&format!("Restart failed, still running the current build: {}", e));
    }
}

fn print_event(event: &PollEvent) {
    match &event.outcome {
        PollOutcome::Staged(_) => output::success(&describe(event)),
        PollOutcome::Failed(_) => output::warning(&describe(event)),
    }
}

/// One-line summary of a poll event
fn describe(event: &PollEvent) -> String {
    let at = event.at.with_timezone(&Local).format("%H:%M:%S");
    match &event.outcome {
        PollOutcome::Staged(report) => {
            let promoted = if report.promotion.is_some() {
                " and promoted"
            } else {
                ""
            };
            format!(
                "[{}] cycle {}: staged{} {}",
                at, event.cycle, promoted, report.metadata
            )
        }
        PollOutcome::Failed(e) => format!(
            "[{}] cycle {}: {} error ({} in a row): {}",
            at,
            event.cycle,
            e.kind(),
            event.consecutive_failures,
            e
        ),
    }
}
