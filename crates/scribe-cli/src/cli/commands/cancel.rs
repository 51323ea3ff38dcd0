//! `scribe cancel <id>` – cancel a job. A running `scribe run` stops it at the next chunk boundary.

use anyhow::{bail, Result};
use scribe_core::store::{JobDb, JobStatus};

pub async fn run_cancel(db: &JobDb, id: i64) -> Result<()> {
    if db.set_status(id, JobStatus::Cancelled).await? {
        println!("Cancelled job {id}");
        return Ok(());
    }
    match db.get_status(id).await? {
        Some(status) => println!("Job {id} is already {status}"),
        None => bail!("no job with id {}", id),
    }
    Ok(())
}
