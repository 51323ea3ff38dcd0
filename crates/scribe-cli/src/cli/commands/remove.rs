//! `scribe remove <id>` – remove a job; its transcript is deleted unless --keep-files.

use anyhow::{bail, Result};
use scribe_core::store::{JobDb, JobStatus};

pub async fn run_remove(db: &JobDb, id: i64, keep_files: bool) -> Result<()> {
    let Some(job) = db.get_job(id).await? else {
        bail!("no job with id {}", id);
    };
    if job.status == JobStatus::Running {
        db.set_status(id, JobStatus::Cancelled).await?;
    }
    if !keep_files {
        if let Some(path) = &job.output_path {
            match tokio::fs::remove_file(path).await {
                Ok(()) => tracing::debug!(path = %path.display(), "deleted transcript"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => tracing::warn!(path = %path.display(), "could not delete transcript: {}", e),
            }
        }
    }

    db.remove_job(id).await?;
    println!("Removed job {id}");
    Ok(())
}
