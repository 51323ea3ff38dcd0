//! `scribe status [id]` – list jobs, or show one job with its quality report.

use anyhow::{bail, Result};
use scribe_core::store::{JobDb, JobRecord};

pub async fn run_status(db: &JobDb, id: Option<i64>) -> Result<()> {
    match id {
        Some(id) => match db.get_job(id).await? {
            Some(job) => print_job(&job),
            None => bail!("no job with id {}", id),
        },
        None => print_table(&db.list_jobs().await?),
    }
    Ok(())
}

fn print_table(jobs: &[JobRecord]) {
    if jobs.is_empty() {
        println!("No jobs in database.");
        return;
    }
    println!(
        "{:<6} {:<10} {:>6} {:<4} {:<14} {:<10} {}",
        "ID", "STATUS", "PROG", "PRI", "ENGINE", "QUALITY", "SOURCE"
    );
    for j in jobs {
        let quality = j
            .quality_report
            .as_ref()
            .map(|r| r.rating.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<6} {:<10} {:>5.1}% {:<4} {:<14} {:<10} {}",
            j.id,
            j.status,
            j.progress,
            j.priority,
            j.engine_used.as_deref().unwrap_or("-"),
            quality,
            j.source_ref
        );
    }
}

fn print_job(job: &JobRecord) {
    println!("Job {}: {}", job.id, job.source_ref);
    println!("  status:   {} ({:.1}%)", job.status, job.progress);
    println!("  priority: {}", job.priority);
    if !job.engine_chain.is_empty() {
        println!("  engines:  {}", job.engine_chain.join(", "));
    }
    for (key, value) in &job.options {
        println!("  option:   {}={}", key, value);
    }
    if let Some(engine) = &job.engine_used {
        println!("  engine:   {}", engine);
    }
    if let Some(path) = &job.output_path {
        println!("  output:   {}", path.display());
    }
    if let Some(err) = &job.error_message {
        println!("  error:    {}", err);
    }
    if let Some(report) = &job.quality_report {
        println!();
        print!("{}", report);
    }
}
