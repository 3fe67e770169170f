//! Periodic progress reporting for directory transfers.
//!
//! A [`ProgressReporter`] polls a transfer's [`SyncState`] on a fixed
//! interval and prints it. It is started right before the transfer and
//! stopped (and joined) right after, so it never outlives the operation.

use std::future::Future;
use std::io::Write;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::sync::SyncState;

/// Format a transfer state the way the progress line shows it
pub fn format_state(state: &SyncState) -> String {
    format!(
        "progress: {:.2}% / rem. {} / tot. {}",
        state.progress, state.remain, state.total
    )
}

/// Background task printing transfer progress at a fixed cadence
pub struct ProgressReporter {
    cancel: CancellationToken,
    handle: JoinHandle<usize>,
}

impl ProgressReporter {
    /// Start polling `state` every `interval`.
    pub fn start(state: watch::Receiver<SyncState>, interval: Duration) -> Self {
        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            let mut reports = 0usize;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = task_cancel.cancelled() => { break; }
                }

                if task_cancel.is_cancelled() {
                    break;
                }

                let current = *state.borrow();
                let mut stdout = std::io::stdout();
                let _ = write!(stdout, "\r{}", format_state(&current));
                let _ = stdout.flush();
                reports += 1;
            }

            reports
        });

        Self { cancel, handle }
    }

    /// Stop polling and wait for the task to finish. Returns the number of
    /// progress lines printed.
    pub async fn stop(self) -> usize {
        self.cancel.cancel();
        let reports = match self.handle.await {
            Ok(reports) => reports,
            Err(e) => {
                warn!("Progress reporter failed: {}", e);
                0
            }
        };
        if reports > 0 {
            println!();
        }
        reports
    }
}

/// Run `transfer` while reporting progress from `state`.
pub async fn run_with_progress<F, T>(
    transfer: F,
    state: watch::Receiver<SyncState>,
    interval: Duration,
) -> T
where
    F: Future<Output = T>,
{
    let reporter = ProgressReporter::start(state, interval);
    let result = transfer.await;
    reporter.stop().await;
    result
}
