//! Per-job task that persists runner progress and watches the store for cancellation.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use crate::control::CancelToken;
use crate::store::{JobDb, JobId, JobStatus};

/// Progress stays below this until the job is marked completed.
const MAX_RUNNING_PERCENT: f64 = 99.0;

/// Smallest change worth a DB write.
const MIN_STEP_PERCENT: f64 = 0.5;

/// Runs until the runner drops its progress sender.
pub(super) async fn run_progress_loop(
    mut rx: mpsc::Receiver<f64>,
    db: JobDb,
    job_id: JobId,
    cancel: CancelToken,
    poll: Duration,
) {
    let mut last_written: Option<f64> = None;
    let mut ticker = tokio::time::interval(poll);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            msg = rx.recv() => {
                let Some(percent) = msg else { break };
                let percent = percent.clamp(0.0, MAX_RUNNING_PERCENT);
                if last_written.is_some_and(|l| (percent - l).abs() < MIN_STEP_PERCENT) {
                    continue;
                }
                if let Err(e) = db.set_progress(job_id, percent).await {
                    tracing::warn!(job_id, "progress update failed: {:#}", e);
                }
                last_written = Some(percent);
            }
            _ = ticker.tick() => {
                if cancel.is_cancelled() {
                    continue;
                }
                match db.get_status(job_id).await {
                    Ok(Some(JobStatus::Cancelled)) => {
                        tracing::info!(job_id, "cancellation observed in job store");
                        cancel.cancel();
                    }
                    Ok(None) => {
                        tracing::info!(job_id, "job removed from store, stopping it");
                        cancel.cancel();
                    }
                    _ => {}
                }
            }
        }
    }
}
