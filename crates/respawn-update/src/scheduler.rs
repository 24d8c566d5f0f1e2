//! Background poll loop
//!
//! One task per updater runs a cycle on every interval tick and publishes a
//! [`PollEvent`] for each cycle, successful or not. Cycles never overlap.
//! Cancellation is observed between ticks only: a cycle in flight runs to
//! completion and its event is still offered to the consumer.
//!
//! The event channel is bounded. With [`Backpressure::Block`] a slow
//! consumer delays the next tick; with [`Backpressure::Skip`] events that
//! do not fit are dropped and the tick cadence is kept.

use chrono::{DateTime, Utc};
use respawn_core::{Backpressure, ReleaseMetadata};
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{Result, UpdateError};
use crate::promote::Promotion;

/// What a successful cycle produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    /// Metadata of the staged build
    pub metadata: ReleaseMetadata,

    /// Path of the staged binary
    pub staged_path: PathBuf,

    /// Size of the staged binary in bytes
    pub staged_size: u64,

    /// Set when the cycle also promoted the build onto the live path
    pub promotion: Option<Promotion>,
}

/// Result of one poll cycle
#[derive(Debug)]
pub enum PollOutcome {
    Staged(CycleReport),
    Failed(UpdateError),
}

/// Event published once per poll cycle
#[derive(Debug)]
pub struct PollEvent {
    /// Cycle number, starting at 1
    pub cycle: u64,

    /// When the cycle finished
    pub at: DateTime<Utc>,

    pub outcome: PollOutcome,

    /// Failed cycles in a row, including this one (0 after a success)
    pub consecutive_failures: u32,
}

impl PollEvent {
    /// Metadata of the staged build, if the cycle succeeded
    pub fn metadata(&self) -> Option<&ReleaseMetadata> {
        match &self.outcome {
            PollOutcome::Staged(report) => Some(&report.metadata),
            PollOutcome::Failed(_) => None,
        }
    }

    /// Error of the cycle, if it failed
    pub fn error(&self) -> Option<&UpdateError> {
        match &self.outcome {
            PollOutcome::Staged(_) => None,
            PollOutcome::Failed(e) => Some(e),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, PollOutcome::Staged(_))
    }
}

/// Consumer side of a running poll loop
#[derive(Debug)]
pub struct Poller {
    events: mpsc::Receiver<PollEvent>,
    task: JoinHandle<()>,
}

impl Poller {
    /// Next event; `None` once the loop has stopped and all events were read
    pub async fn recv(&mut self) -> Option<PollEvent> {
        self.events.recv().await
    }

    /// Turn the poller into a stream of events, detaching the loop task
    pub fn into_stream(self) -> ReceiverStream<PollEvent> {
        ReceiverStream::new(self.events)
    }

    /// Whether the loop task has exited
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the loop task to exit
    ///
    /// Unread events are discarded, which also releases a loop blocked on
    /// publishing.
    pub async fn join(self) -> Result<()> {
        drop(self.events);
        self.task.await?;
        Ok(())
    }
}

/// Start the poll loop on the current runtime
pub(crate) fn spawn_poller<F, Fut>(
    interval: Duration,
    capacity: usize,
    backpressure: Backpressure,
    cancel: CancellationToken,
    run_cycle: F,
) -> Poller
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<CycleReport>> + Send + 'static,
{
    let (tx, events) = mpsc::channel(capacity.max(1));
    let task = tokio::spawn(poll_loop(interval, backpressure, cancel, tx, run_cycle));
    Poller { events, task }
}

async fn poll_loop<F, Fut>(
    interval: Duration,
    backpressure: Backpressure,
    cancel: CancellationToken,
    tx: mpsc::Sender<PollEvent>,
    mut run_cycle: F,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<CycleReport>>,
{
    // First cycle one interval after start.
    let mut ticker = time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut cycle: u64 = 0;
    let mut consecutive_failures: u32 = 0;
    info!("Polling for updates every {:?}", interval);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!("Poll loop cancelled after {} cycle(s)", cycle);
                break;
            }
            _ = ticker.tick() => {}
        }

        cycle += 1;
        debug!("Starting poll cycle {}", cycle);

        let outcome = match run_cycle().await {
            Ok(report) => {
                consecutive_failures = 0;
                info!("Cycle {} staged {}", cycle, report.metadata);
                PollOutcome::Staged(report)
            }
            Err(e) => {
                consecutive_failures = consecutive_failures.saturating_add(1);
                warn!(
                    "Cycle {} failed ({} in a row): {}",
                    cycle, consecutive_failures, e
                );
                PollOutcome::Failed(e)
            }
        };

        let event = PollEvent {
            cycle,
            at: Utc::now(),
            outcome,
            consecutive_failures,
        };

        if !publish(&tx, event, backpressure, &cancel).await {
            break;
        }
    }

    debug!("Poll loop stopped");
}

/// Offer an event to the consumer; false when the loop should stop
async fn publish(
    tx: &mpsc::Sender<PollEvent>,
    event: PollEvent,
    backpressure: Backpressure,
    cancel: &CancellationToken,
) -> bool {
    match backpressure {
        Backpressure::Block => {
            tokio::select! {
                biased;
                sent = tx.send(event) => {
                    if sent.is_err() {
                        debug!("Event receiver dropped; stopping poll loop");
                    }
                    sent.is_ok()
                }
                _ = cancel.cancelled() => {
                    debug!("Cancelled while waiting for the consumer");
                    false
                }
            }
        }
        Backpressure::Skip => match tx.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                warn!("Consumer is behind; dropped event for cycle {}", event.cycle);
                true
            }
            Err(TrySendError::Closed(_)) => {
                debug!("Event receiver dropped; stopping poll loop");
                false
            }
        },
    }
}
