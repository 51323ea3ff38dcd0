//! Job worker loop: take a job from the queue, run it, persist the outcome.

use anyhow::{anyhow, Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

use super::progress_worker::run_progress_loop;
use super::runner::{JobContext, JobOutcome};
use super::service::{SchedulerError, Shared};
use crate::control::{CancelToken, JobCancelled};
use crate::store::{JobId, JobStatus};

/// Returns an error only for job store failures, after signalling shutdown.
pub(super) async fn run_worker(
    worker: usize,
    shared: Arc<Shared>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), SchedulerError> {
    tracing::debug!(worker, "job worker started");
    while let Some(queued) = shared.queue.pop_wait(&mut shutdown).await {
        let result = execute_job(&shared, queued.job_id).await;
        shared.queue.done();
        if let Err(e) = result {
            tracing::error!(worker, job_id = queued.job_id, "job store failure, stopping scheduler: {:#}", e);
            shared.shutdown_tx.send_replace(true);
            return Err(SchedulerError::Store(e));
        }
    }
    tracing::debug!(worker, "job worker stopped");
    Ok(())
}

/// Run one job. Errors are store failures; job failures are recorded on the job.
async fn execute_job(shared: &Shared, job_id: JobId) -> Result<()> {
    let Some(job) = shared.db.get_job(job_id).await? else {
        tracing::debug!(job_id, "job removed before it started");
        return Ok(());
    };
    if job.status != JobStatus::Pending {
        tracing::debug!(job_id, status = %job.status, "skipping job that is no longer pending");
        return Ok(());
    }
    if !shared.db.set_status(job_id, JobStatus::Running).await? {
        return Ok(());
    }

    let cancel = shared.control.register(job_id);
    if shared.db.get_status(job_id).await? == Some(JobStatus::Cancelled) {
        cancel.cancel();
    }

    let (tx, rx) = mpsc::channel(64);
    let progress_task = tokio::spawn(run_progress_loop(
        rx,
        shared.db.clone(),
        job_id,
        cancel.clone(),
        shared.progress_poll,
    ));

    let ctx = JobContext::new(job, cancel.clone(), tx);
    let runner = Arc::clone(&shared.runner);
    let joined = tokio::task::spawn_blocking(move || runner.run(&ctx)).await;
    shared.control.unregister(job_id);
    let _ = progress_task.await;

    let outcome = joined.unwrap_or_else(|e| Err(anyhow!("job runner panicked: {}", e)));
    finish_job(shared, job_id, outcome, &cancel).await
}

async fn finish_job(shared: &Shared, job_id: JobId, outcome: Result<JobOutcome>, cancel: &CancelToken) -> Result<()> {
    let transcript = match outcome {
        Ok(t) => t,
        Err(e) if e.downcast_ref::<JobCancelled>().is_some() => {
            shared.db.set_status(job_id, JobStatus::Cancelled).await?;
            tracing::info!(job_id, "job cancelled");
            return Ok(());
        }
        Err(e) => {
            let message = format!("{:#}", e);
            tracing::warn!(job_id, "job failed: {}", message);
            shared.db.set_error(job_id, &message).await?;
            shared.db.set_status(job_id, JobStatus::Failed).await?;
            return Ok(());
        }
    };

    // Cancelled or removed while the runner was finishing: keep nothing.
    if cancel.is_cancelled() || shared.db.get_status(job_id).await? != Some(JobStatus::Running) {
        shared.db.set_status(job_id, JobStatus::Cancelled).await?;
        tracing::info!(job_id, "job cancelled, discarding its transcript");
        return Ok(());
    }

    let output_path = if transcript.text.is_empty() {
        None
    } else {
        match write_transcript(shared, job_id, &transcript.text).await {
            Ok(path) => Some(path),
            Err(e) => {
                let message = format!("{:#}", e);
                tracing::warn!(job_id, "{}", message);
                shared.db.set_error(job_id, &message).await?;
                shared.db.set_status(job_id, JobStatus::Failed).await?;
                return Ok(());
            }
        }
    };
    shared
        .db
        .set_result(
            job_id,
            transcript.engine_used.as_deref(),
            Some(&transcript.report),
            output_path.as_deref(),
        )
        .await?;
    if shared.db.get_status(job_id).await?.is_none() {
        if let Some(path) = &output_path {
            let _ = tokio::fs::remove_file(path).await;
        }
        tracing::debug!(job_id, "job removed while its result was saved");
        return Ok(());
    }

    if !transcript.is_complete() {
        let message = format!(
            "{} of {} chunks failed: {}",
            transcript.failed_chunks.len(),
            transcript.report.total_chunks,
            transcript.error.as_deref().unwrap_or("unknown error")
        );
        tracing::warn!(job_id, "{}", message);
        shared.db.set_error(job_id, &message).await?;
        shared.db.set_status(job_id, JobStatus::Failed).await?;
        return Ok(());
    }

    shared.db.set_progress(job_id, 100.0).await?;
    if shared.db.set_status(job_id, JobStatus::Completed).await? {
        tracing::info!(
            job_id,
            engine = transcript.engine_used.as_deref().unwrap_or("-"),
            score = transcript.report.score,
            "job completed"
        );
    } else if cancel.is_cancelled() {
        tracing::info!(job_id, "job was cancelled before it could complete");
    }
    Ok(())
}

async fn write_transcript(shared: &Shared, job_id: JobId, text: &str) -> Result<PathBuf> {
    tokio::fs::create_dir_all(&shared.transcript_dir)
        .await
        .with_context(|| format!("create {}", shared.transcript_dir.display()))?;
    let path = shared.transcript_dir.join(format!("job-{}.txt", job_id));
    tokio::fs::write(&path, text)
        .await
        .with_context(|| format!("write transcript {}", path.display()))?;
    Ok(path)
}
