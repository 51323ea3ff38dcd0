//! Periodic removal of completed jobs past their retention period.

use anyhow::Result;
use std::io::ErrorKind;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use super::service::Shared;
use crate::store::unix_timestamp;

/// Remove completed jobs whose `completed_at` is at least the retention period ago,
/// together with their transcript files. Returns the number of jobs removed.
pub(super) async fn sweep(shared: &Shared) -> Result<usize> {
    let retention = shared.cleanup_after_secs.load(Ordering::Relaxed) as i64;
    let cutoff = unix_timestamp() - retention;
    let expired = shared.db.list_completed_before(cutoff + 1).await?;

    let mut removed = 0;
    for job in expired {
        if let Some(path) = &job.output_path {
            match tokio::fs::remove_file(path).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => tracing::warn!(job_id = job.id, "failed to remove {}: {}", path.display(), e),
            }
        }
        if shared.db.remove_job(job.id).await? {
            removed += 1;
        }
    }
    Ok(removed)
}

pub(super) async fn run_cleanup_loop(
    shared: Arc<Shared>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if !shared.auto_cleanup.load(Ordering::Relaxed) {
                    continue;
                }
                match sweep(&shared).await {
                    Ok(0) => {}
                    Ok(n) => tracing::info!(removed = n, "cleaned up completed jobs"),
                    Err(e) => tracing::warn!("cleanup sweep failed: {:#}", e),
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
}
